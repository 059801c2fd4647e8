//! Renders physics objects and properties for debugging purposes.
//!
//! Drawing goes through a user-implemented [`DebugDraw`] sink, so any renderer can be used.
//! [`World::draw`] walks the world and emits primitives for the categories enabled in
//! [`DebugDrawFlags`].
//!
//! Currently, the following are supported for debug rendering:
//!
//! - Shapes, colored by the state of their body (static, kinematic, sleeping, or awake)
//! - The transforms and centers of mass of bodies
//! - [Joints](crate::dynamics::joints)
//! - [AABBs](crate::math::Aabb) of shapes
//! - Contact points and normals
//! - The constraint graph color of each contact
//!
//! # Example
//!
//! ```
//! use pivot2d::prelude::*;
//!
//! #[derive(Default)]
//! struct SegmentCounter(usize);
//!
//! impl DebugDraw for SegmentCounter {
//!     fn draw_segment(&mut self, _a: Vector, _b: Vector, _color: HexColor) {
//!         self.0 += 1;
//!     }
//!     fn draw_point(&mut self, _point: Vector, _size: Scalar, _color: HexColor) {}
//!     fn draw_string(&mut self, _position: Vector, _text: &str) {}
//! }
//!
//! let mut world = World::new(WorldDef::default());
//! let body = world.create_body(&BodyDef::dynamic(Vector::ZERO)).unwrap();
//! world.create_circle_shape(body, &ShapeDef::default(), Vector::ZERO, 0.5).unwrap();
//!
//! let mut counter = SegmentCounter::default();
//! world.draw(&mut counter, DebugDrawFlags::SHAPES);
//! assert!(counter.0 > 0);
//! ```

mod color;
mod draw;

pub use color::*;
pub use draw::*;

use bitflags::bitflags;

use crate::{
    collision::shape::ShapeGeometry,
    dynamics::{joints::JointDrawContext, rigid_body::Body},
    math::{Scalar, Transform, Vector},
    world::World,
};

bitflags! {
    /// The categories of objects drawn by [`World::draw`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
    pub struct DebugDrawFlags: u32 {
        /// Draw the outlines of shapes.
        const SHAPES = 1 << 0;
        /// Draw joints.
        const JOINTS = 1 << 1;
        /// Draw the tight AABBs of shapes.
        const AABBS = 1 << 2;
        /// Draw body transforms and centers of mass.
        const MASS = 1 << 3;
        /// Draw contact points and normals.
        const CONTACTS = 1 << 4;
        /// Draw contact points in the color of their constraint graph color.
        const GRAPH_COLORS = 1 << 5;
        /// Draw the accumulated contact impulses as text.
        const CONTACT_IMPULSES = 1 << 6;
    }
}

impl Default for DebugDrawFlags {
    fn default() -> Self {
        Self::SHAPES | Self::JOINTS
    }
}

const STATIC_COLOR: HexColor = HexColor::PALE_GREEN;
const KINEMATIC_COLOR: HexColor = HexColor(0x4D4DE6);
const SLEEPING_COLOR: HexColor = HexColor::GRAY;
const AWAKE_COLOR: HexColor = HexColor::PINK;
const DISABLED_COLOR: HexColor = HexColor::SLATE_GRAY2;

const AABB_COLOR: HexColor = HexColor::GOLDENROD;
const ADD_POINT_COLOR: HexColor = HexColor::LIGHT_GREEN;
const PERSIST_POINT_COLOR: HexColor = HexColor::BLUE;
const NORMAL_COLOR: HexColor = HexColor(0xE6E64D);

const POINT_SIZE: Scalar = 5.0;
const NORMAL_LENGTH: Scalar = 0.5;

fn body_color(body: &Body) -> HexColor {
    if !body.is_enabled {
        DISABLED_COLOR
    } else if body.body_type.is_static() {
        STATIC_COLOR
    } else if body.body_type.is_kinematic() {
        KINEMATIC_COLOR
    } else if !body.is_awake {
        SLEEPING_COLOR
    } else {
        AWAKE_COLOR
    }
}

impl World {
    /// Draws the world with the given sink.
    pub fn draw(&self, draw: &mut dyn DebugDraw, flags: DebugDrawFlags) {
        let state = &self.state;

        if flags.contains(DebugDrawFlags::SHAPES) {
            for (_, body) in state.bodies.iter() {
                let color = body_color(body);
                for &shape_index in &body.shapes {
                    let Some(shape) = state.shapes.get(shape_index) else {
                        continue;
                    };
                    draw_geometry(draw, &shape.geometry, &body.transform, color);
                }
            }
        }

        if flags.contains(DebugDrawFlags::AABBS) {
            for (_, shape) in state.shapes.iter() {
                let (min, max) = (shape.aabb.min, shape.aabb.max);
                let corners = [min, Vector::new(max.x, min.y), max, Vector::new(min.x, max.y)];
                for i in 0..4 {
                    draw.draw_segment(corners[i], corners[(i + 1) % 4], AABB_COLOR);
                }
            }
        }

        if flags.contains(DebugDrawFlags::MASS) {
            for (_, body) in state.bodies.iter() {
                draw.draw_transform(body.transform);
                draw.draw_point(body.center, POINT_SIZE, HexColor::WHITE);
                draw.draw_string(body.center, &format!("{:.2}", body.mass));
            }
        }

        if flags.contains(DebugDrawFlags::JOINTS) {
            for (_, joint) in state.joints.iter() {
                let (Some(body_a), Some(body_b)) = (state.bodies.get(joint.body_a()), state.bodies.get(joint.body_b()))
                else {
                    continue;
                };
                if !body_a.is_enabled || !body_b.is_enabled {
                    continue;
                }

                let context = JointDrawContext {
                    transform_a: body_a.transform,
                    transform_b: body_b.transform,
                    anchor_a: body_a.transform.transform_point(joint.local_anchor_a),
                    anchor_b: body_b.transform.transform_point(joint.local_anchor_b),
                    local_anchor_a: joint.local_anchor_a,
                    local_anchor_b: joint.local_anchor_b,
                    draw_size: joint.draw_size,
                };
                joint.kind.solver().draw(draw, &context);
            }
        }

        if flags.intersects(DebugDrawFlags::CONTACTS | DebugDrawFlags::GRAPH_COLORS | DebugDrawFlags::CONTACT_IMPULSES)
        {
            for (_, contact) in state.contacts.iter() {
                if !contact.is_touching() {
                    continue;
                }
                let manifold = &contact.manifold;
                let color_index = contact.color_index;

                for point in &manifold.points {
                    if flags.contains(DebugDrawFlags::GRAPH_COLORS)
                        && let Some(color_index) = color_index
                    {
                        draw.draw_point(point.point, POINT_SIZE, GRAPH_COLORS[color_index]);
                    } else if flags.contains(DebugDrawFlags::CONTACTS) {
                        let color = if point.persisted {
                            PERSIST_POINT_COLOR
                        } else {
                            ADD_POINT_COLOR
                        };
                        draw.draw_point(point.point, POINT_SIZE, color);
                    }

                    if flags.contains(DebugDrawFlags::CONTACTS) {
                        let tip = point.point + NORMAL_LENGTH * manifold.normal;
                        draw.draw_segment(point.point, tip, NORMAL_COLOR);
                    }

                    if flags.contains(DebugDrawFlags::CONTACT_IMPULSES) {
                        let text = format!("{:.2}, {:.2}", point.normal_impulse, point.tangent_impulse);
                        draw.draw_string(point.point, &text);
                    }
                }
            }
        }
    }
}

fn draw_geometry(draw: &mut dyn DebugDraw, geometry: &ShapeGeometry, transform: &Transform, color: HexColor) {
    match *geometry {
        ShapeGeometry::Circle { center, radius } => {
            let center = transform.transform_point(center);
            draw.draw_solid_circle(Transform::new(center, transform.rotation), radius, color);
        }
        ShapeGeometry::Capsule {
            center1,
            center2,
            radius,
        } => {
            let a = transform.transform_point(center1);
            let b = transform.transform_point(center2);
            draw.draw_solid_capsule(a, b, radius, color);
        }
    }
}
