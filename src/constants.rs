//! Tuning constants shared by the collision pipeline and the solver.
//!
//! Lengths are in meters and times in seconds.

use crate::math::{PI, Scalar};

/// The collision and constraint tolerance used for keeping contacts and joints
/// from jittering. Chosen to be numerically significant but visually insignificant.
pub const LINEAR_SLOP: Scalar = 0.005;

/// The angular tolerance used by joint limits, in radians.
pub const ANGULAR_SLOP: Scalar = 2.0 / 180.0 * PI;

/// Contact points are generated for shapes that are closer than this distance,
/// allowing the solver to prevent penetration before it happens.
pub const SPECULATIVE_DISTANCE: Scalar = 4.0 * LINEAR_SLOP;

/// The margin by which broad-phase AABBs are fattened so that small movements
/// do not require a proxy update.
pub const AABB_MARGIN: Scalar = 0.1;

/// The maximum rotation of a body per time step, in radians.
pub const MAX_ROTATION: Scalar = 0.25 * PI;

/// The largest linear speed a body may reach, in meters per second.
pub const MAX_TRANSLATION_SPEED: Scalar = 400.0;

/// A body's linear speed must stay below this for it to fall asleep.
pub const LINEAR_SLEEP_TOLERANCE: Scalar = 0.05;

/// A body's angular speed must stay below this for it to fall asleep, in radians per second.
pub const ANGULAR_SLEEP_TOLERANCE: Scalar = 2.0 / 180.0 * PI;

/// The time that an island must be still before it is put to sleep.
pub const TIME_TO_SLEEP: Scalar = 0.5;
