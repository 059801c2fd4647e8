//! Errors returned by fallible [`World`](crate::world::World) operations.

use thiserror::Error;

use crate::{
    dynamics::solver::joints::JointType,
    id::{BodyId, JointId, ShapeId},
};

/// An error returned by a [`World`](crate::world::World) operation.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    /// The world is in the middle of a step and cannot be modified.
    #[error("the world is locked while stepping")]
    Locked,
    /// The body handle is stale or belongs to another world.
    #[error("invalid body handle {0:?}")]
    InvalidBody(BodyId),
    /// The shape handle is stale or belongs to another world.
    #[error("invalid shape handle {0:?}")]
    InvalidShape(ShapeId),
    /// The joint handle is stale or belongs to another world.
    #[error("invalid joint handle {0:?}")]
    InvalidJoint(JointId),
    /// Both bodies of a joint are the same body.
    #[error("a joint cannot connect a body to itself")]
    SameBody,
    /// The joint exists but is not of the requested type.
    #[error("expected a {expected:?} joint, found a {found:?} joint")]
    JointTypeMismatch {
        /// The joint type the operation requires.
        expected: JointType,
        /// The actual type of the joint.
        found: JointType,
    },
}
