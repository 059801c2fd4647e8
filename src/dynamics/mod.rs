//! Rigid body dynamics: bodies, joints, islands, and the soft step solver.

pub mod rigid_body;
pub mod solver;

pub use solver::joints;
