//! # pivot2d
//!
//! **pivot2d** is the core of a 2D rigid body physics engine. It owns bodies, shapes, joints,
//! and contacts in a [`World`](world::World), and advances them with a soft step solver
//! whose constraints are partitioned by a colored constraint graph.
//!
//! The main pieces are:
//!
//! - [Pools](data_structures::pool) of bodies, shapes, joints, and contacts, addressed through
//!   revisioned [handles](id) that detect use after destruction.
//! - Per-body [edge lists](data_structures::edge_list) of joints and contacts.
//! - Persistent [simulation islands](dynamics::solver::islands) that merge when bodies become
//!   connected, split when they come apart, and fall asleep as a unit.
//! - A [constraint graph](dynamics::solver::constraint_graph) that assigns every awake constraint
//!   to one of 12 colors, so that constraints of the same color share no dynamic body and can be
//!   solved in parallel. Constraints that fit in no color go to an overflow bucket that is solved serially.
//! - Seven [joint types](dynamics::joints), each solved with soft constraints like contacts.
//! - [Debug rendering](debug_render) through a user-provided [`DebugDraw`](debug_render::DebugDraw) sink.
//!
//! # Example
//!
//! ```
//! use pivot2d::prelude::*;
//!
//! let mut world = World::new(WorldDef::default());
//!
//! let ground = world.create_body(&BodyDef::fixed(Vector::ZERO)).unwrap();
//! world
//!     .create_capsule_shape(ground, &ShapeDef::default(), Vector::new(-20.0, 0.0), Vector::new(20.0, 0.0), 0.1)
//!     .unwrap();
//!
//! let ball = world.create_body(&BodyDef::dynamic(Vector::new(0.0, 4.0))).unwrap();
//! world.create_circle_shape(ball, &ShapeDef::default(), Vector::ZERO, 0.5).unwrap();
//!
//! for _ in 0..120 {
//!     world.step(1.0 / 60.0, 4, 2).unwrap();
//! }
//!
//! assert!(world.body_position(ball).unwrap().y < 1.0);
//! ```
//!
//! # Features
//!
//! - `parallel`: solves graph colors and the narrow phase on a `bevy_tasks` task pool
//!   when [`WorldDef::worker_count`](world::WorldDef::worker_count) is larger than one.
//! - `serialize`: implements `serde` traits for definitions, handles, and math types.

pub mod collision;
pub mod constants;
pub mod data_structures;
pub mod debug_render;
pub mod dynamics;
pub mod error;
pub mod id;
pub mod math;
pub mod world;

/// Re-exports the types needed to build and step a world.
pub mod prelude {
    pub use crate::{
        collision::{
            ContactBeginTouchEvent, ContactEndTouchEvent, ContactEvents, Filter, Manifold, ManifoldPoint, ShapeDef,
            ShapeGeometry,
        },
        debug_render::{DebugDraw, DebugDrawFlags, HexColor},
        dynamics::{
            joints::*,
            rigid_body::{BodyDef, BodyType},
        },
        error::WorldError,
        id::{BodyId, ContactId, JointId, ShapeId},
        math::{Aabb, Rotation, Scalar, Transform, Vector},
        world::{Counters, StepDiagnostics, World, WorldDef},
    };
}

#[cfg(test)]
mod tests;
