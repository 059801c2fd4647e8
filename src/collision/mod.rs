//! Collision detection for shapes attached to rigid bodies.
//!
//! Collision detection is split into two parts:
//!
//! - The [broad phase](broad_phase) finds pairs of shapes with overlapping fat AABBs.
//!   A persistent [`Contact`](contact) is created for each new pair.
//! - The narrow phase updates the [`Manifold`] of every contact with an awake body.
//!   Contacts that start touching are linked into an island and added to the constraint graph,
//!   and contacts that stop touching are removed from both.
//!
//! # Contact Events
//!
//! Shapes created with [`ShapeDef::enable_contact_events`] report [`ContactBeginTouchEvent`]s
//! and [`ContactEndTouchEvent`]s. The events of the last step can be read with
//! [`World::contact_events`](crate::world::World::contact_events).

pub mod broad_phase;
pub(crate) mod contact;
pub mod manifold;
pub mod shape;

pub use contact::{ContactBeginTouchEvent, ContactEndTouchEvent, ContactEvents, ContactFlags};
pub use manifold::{Manifold, ManifoldPoint};
pub use shape::{Filter, MassData, ShapeDef, ShapeGeometry};
