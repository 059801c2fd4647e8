//! Soft constraints are spring-like constraints that dampen constraint responses
//! using intuitive tuning parameters, a damping ratio and a frequency in Hertz.
//!
//! This module also contains the [`spring_stiffness`] utility used to convert a frequency
//! and damping ratio into a physical stiffness and damping for a pair of bodies.

use crate::math::{Scalar, TAU};

/// Soft constraint tuning parameters used for dampening
/// constraint response and controlling stiffness.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SoftnessParameters {
    /// 2x the damping ratio (zeta ζ). Controls the amount of oscillation.
    ///
    /// This is stored as two times the damping ratio to avoid
    /// unnecessary computations in [`SoftnessParameters::compute_coefficients`].
    double_damping_ratio: Scalar,

    /// The angular frequency (omega ω). Controls the rate of oscillation.
    angular_frequency: Scalar,
}

impl SoftnessParameters {
    /// Creates a new [`SoftnessParameters`] configuration based on
    /// a given damping ratio and a frequency in Hertz.
    ///
    /// The damping ratio (zeta ζ) controls the amount of oscillation,
    /// and the frequency controls the constraint's cycles per second.
    #[inline]
    pub fn new(damping_ratio: Scalar, frequency_hz: Scalar) -> Self {
        Self {
            double_damping_ratio: 2.0 * damping_ratio,
            angular_frequency: TAU * frequency_hz,
        }
    }

    /// Returns the damping ratio that controls the amount of oscillation.
    #[inline]
    pub fn damping_ratio(self) -> Scalar {
        self.double_damping_ratio * 0.5
    }

    /// Returns the frequency that controls the rate of oscillation.
    #[inline]
    pub fn frequency(self) -> Scalar {
        self.angular_frequency / TAU
    }

    /// Returns the angular frequency that controls the rate of oscillation.
    /// This is the [`frequency`](Self::frequency) multiplied by `2.0 * PI`.
    #[inline]
    pub const fn angular_frequency(self) -> Scalar {
        self.angular_frequency
    }

    /// Computes [`SoftnessCoefficients`] based on the parameters in `self` and the time step.
    ///
    /// A frequency of zero produces [`SoftnessCoefficients::RIGID`].
    #[inline]
    pub fn compute_coefficients(self, delta_secs: Scalar) -> SoftnessCoefficients {
        if self.angular_frequency == 0.0 {
            return SoftnessCoefficients::RIGID;
        }

        // Expressions shared by computations.
        let a1 = self.double_damping_ratio + self.angular_frequency * delta_secs;
        let a2 = self.angular_frequency * delta_secs * a1;
        let a3 = 1.0 / (1.0 + a2);

        // The coefficients used for soft constraints.
        SoftnessCoefficients {
            bias: self.angular_frequency / a1,
            impulse_scale: a3,
            mass_scale: a2 * a3,
        }
    }
}

/// Coefficients used by soft constraints.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SoftnessCoefficients {
    /// The bias coefficient used for scaling how strongly impulses
    /// are biased based on the separation distance.
    pub bias: Scalar,

    /// The mass coefficient used for scaling the effective mass
    /// "seen" by the constraint.
    pub mass_scale: Scalar,

    /// The impulse coefficient used for scaling the accumulated impulse
    /// that is subtracted from the total impulse to prevent
    /// the total impulse from becoming too large.
    pub impulse_scale: Scalar,
}

impl SoftnessCoefficients {
    /// Coefficients for a rigid constraint with no position bias.
    pub const RIGID: Self = Self {
        bias: 0.0,
        mass_scale: 1.0,
        impulse_scale: 0.0,
    };
}

impl Default for SoftnessCoefficients {
    fn default() -> Self {
        Self::RIGID
    }
}

/// The stiffness and damping of a spring.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Stiffness {
    /// The spring stiffness, in N/m for linear springs or N·m/rad for angular springs.
    pub stiffness: Scalar,
    /// The damping coefficient, in N·s/m for linear springs or N·m·s/rad for angular springs.
    pub damping: Scalar,
}

/// Computes the reduced mass of two bodies.
///
/// If one of the masses is zero, the other mass is returned.
#[inline]
pub fn reduced_mass(mass_a: Scalar, mass_b: Scalar) -> Scalar {
    if mass_a > 0.0 && mass_b > 0.0 {
        mass_a * mass_b / (mass_a + mass_b)
    } else if mass_a > 0.0 {
        mass_a
    } else {
        mass_b
    }
}

/// Computes the stiffness and damping of a spring acting on the given `mass`,
/// oscillating at `frequency_hz` with the given `damping_ratio`.
///
/// With `ω = 2π f`, the stiffness is `m ω²` and the damping is `2 m ζ ω`.
#[inline]
pub fn spring_stiffness(mass: Scalar, frequency_hz: Scalar, damping_ratio: Scalar) -> Stiffness {
    let omega = TAU * frequency_hz;
    Stiffness {
        stiffness: mass * omega * omega,
        damping: 2.0 * mass * damping_ratio * omega,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_frequency_is_rigid() {
        let coefficients = SoftnessParameters::new(1.0, 0.0).compute_coefficients(1.0 / 60.0);
        assert_eq!(coefficients, SoftnessCoefficients::RIGID);
    }

    #[test]
    fn soft_coefficients() {
        let h = 1.0 / 60.0;
        let coefficients = SoftnessParameters::new(10.0, 30.0).compute_coefficients(h);
        let omega = TAU * 30.0;
        let a1 = 20.0 + omega * h;
        let a2 = omega * h * a1;
        assert_relative_eq!(coefficients.bias, omega / a1);
        assert_relative_eq!(coefficients.mass_scale, a2 / (1.0 + a2));
        assert_relative_eq!(coefficients.impulse_scale, 1.0 / (1.0 + a2));
        assert_relative_eq!(coefficients.mass_scale + coefficients.impulse_scale, 1.0);
    }

    #[test]
    fn stiffness_of_equal_masses() {
        let mass = reduced_mass(2.0, 2.0);
        assert_relative_eq!(mass, 1.0);
        let stiffness = spring_stiffness(mass, 1.0, 1.0);
        assert_relative_eq!(stiffness.stiffness, 39.478, epsilon = 1e-3);
        assert_relative_eq!(stiffness.damping, 12.566, epsilon = 1e-3);
    }

    #[test]
    fn reduced_mass_falls_back_to_nonzero_mass() {
        assert_eq!(reduced_mass(0.0, 3.0), 3.0);
        assert_eq!(reduced_mass(3.0, 0.0), 3.0);
        assert_eq!(reduced_mass(0.0, 0.0), 0.0);
    }
}
