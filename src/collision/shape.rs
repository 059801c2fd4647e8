//! Shapes attached to rigid bodies, their collision filters, and mass properties.

use crate::math::{Aabb, PI, Scalar, Transform, Vector};

/// The geometry of a shape, in the local space of its body.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ShapeGeometry {
    /// A solid circle.
    Circle {
        /// The local center of the circle.
        center: Vector,
        /// The radius of the circle.
        radius: Scalar,
    },
    /// A line segment with rounded ends, or a "stadium".
    Capsule {
        /// The local center of the first semicircle.
        center1: Vector,
        /// The local center of the second semicircle.
        center2: Vector,
        /// The radius of the semicircles.
        radius: Scalar,
    },
}

impl ShapeGeometry {
    /// Creates a circle centered at the body origin.
    pub const fn circle(radius: Scalar) -> Self {
        Self::Circle {
            center: Vector::ZERO,
            radius,
        }
    }

    /// Creates a capsule between two local points.
    pub const fn capsule(center1: Vector, center2: Vector, radius: Scalar) -> Self {
        Self::Capsule {
            center1,
            center2,
            radius,
        }
    }

    /// Returns the radius of the rounded part of the shape.
    pub fn radius(&self) -> Scalar {
        match *self {
            Self::Circle { radius, .. } | Self::Capsule { radius, .. } => radius,
        }
    }

    /// Computes the mass properties of the shape for the given density.
    ///
    /// The rotational inertia is about the shape's own center of mass.
    pub fn compute_mass(&self, density: Scalar) -> MassData {
        match *self {
            Self::Circle { center, radius } => {
                let rr = radius * radius;
                let mass = density * PI * rr;
                MassData {
                    mass,
                    center,
                    rotational_inertia: mass * 0.5 * rr,
                }
            }
            Self::Capsule {
                center1,
                center2,
                radius,
            } => {
                let rr = radius * radius;
                let length = center1.distance(center2);
                let ll = length * length;

                let circle_mass = density * PI * rr;
                let box_mass = density * (2.0 * radius * length);

                // Each semicircle centroid sits `lc` beyond the end of the box.
                let lc = 4.0 * radius / (3.0 * PI);
                let h = 0.5 * length;

                let circle_inertia = circle_mass * (0.5 * rr + h * h + 2.0 * h * lc);
                let box_inertia = box_mass * (4.0 * rr + ll) / 12.0;

                MassData {
                    mass: circle_mass + box_mass,
                    center: 0.5 * (center1 + center2),
                    rotational_inertia: circle_inertia + box_inertia,
                }
            }
        }
    }

    /// Computes the world-space AABB of the shape.
    pub fn compute_aabb(&self, transform: &Transform) -> Aabb {
        match *self {
            Self::Circle { center, radius } => {
                let p = transform.transform_point(center);
                Aabb::new(p - Vector::splat(radius), p + Vector::splat(radius))
            }
            Self::Capsule {
                center1,
                center2,
                radius,
            } => {
                let p1 = transform.transform_point(center1);
                let p2 = transform.transform_point(center2);
                Aabb::new(
                    p1.min(p2) - Vector::splat(radius),
                    p1.max(p2) + Vector::splat(radius),
                )
            }
        }
    }

    /// Returns the local center of mass of the geometry.
    pub fn centroid(&self) -> Vector {
        match *self {
            Self::Circle { center, .. } => center,
            Self::Capsule {
                center1, center2, ..
            } => 0.5 * (center1 + center2),
        }
    }
}

/// The mass properties of a shape.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MassData {
    /// The mass of the shape, usually in kilograms.
    pub mass: Scalar,
    /// The local center of mass of the shape.
    pub center: Vector,
    /// The rotational inertia of the shape about its center of mass.
    pub rotational_inertia: Scalar,
}

/// Collision filtering data for a shape.
///
/// Two shapes in the same non-zero group always collide if the group index is positive,
/// and never collide if it is negative. Otherwise, each shape's category must be in the
/// other shape's mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Filter {
    /// The collision category bits. Normally only one bit is set.
    pub category_bits: u32,
    /// The categories this shape accepts collisions with.
    pub mask_bits: u32,
    /// Collision group index. Overrides the category and mask bits when non-zero and shared.
    pub group_index: i32,
}

impl Filter {
    /// The default filter: category `1`, colliding with everything, no group.
    pub const DEFAULT: Self = Self {
        category_bits: 1,
        mask_bits: u32::MAX,
        group_index: 0,
    };

    /// Returns `true` if shapes with these two filters should collide.
    pub fn should_collide(self, other: Self) -> bool {
        if self.group_index == other.group_index && self.group_index != 0 {
            return self.group_index > 0;
        }

        (self.mask_bits & other.category_bits) != 0 && (self.category_bits & other.mask_bits) != 0
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Parameters for creating a shape.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ShapeDef {
    /// The density, usually in kg/m².
    pub density: Scalar,
    /// The Coulomb friction coefficient, usually in the range `[0, 1]`.
    pub friction: Scalar,
    /// The restitution (bounciness), usually in the range `[0, 1]`.
    pub restitution: Scalar,
    /// The collision filter.
    pub filter: Filter,
    /// Whether contacts involving this shape report begin and end touch events.
    pub enable_contact_events: bool,
}

impl Default for ShapeDef {
    fn default() -> Self {
        Self {
            density: 1.0,
            friction: 0.6,
            restitution: 0.0,
            filter: Filter::DEFAULT,
            enable_contact_events: true,
        }
    }
}

/// A shape stored in the world's shape pool.
#[derive(Clone, Debug)]
pub(crate) struct Shape {
    pub body_index: u32,
    pub geometry: ShapeGeometry,
    pub density: Scalar,
    pub friction: Scalar,
    pub restitution: Scalar,
    pub filter: Filter,
    pub enable_contact_events: bool,
    /// The tight world-space bounds of the shape.
    pub aabb: Aabb,
    /// The fattened bounds used by the broad phase.
    pub fat_aabb: Aabb,
}

impl Shape {
    pub fn new(body_index: u32, def: &ShapeDef, geometry: ShapeGeometry, transform: &Transform) -> Self {
        let aabb = geometry.compute_aabb(transform);
        Self {
            body_index,
            geometry,
            density: def.density,
            friction: def.friction,
            restitution: def.restitution,
            filter: def.filter,
            enable_contact_events: def.enable_contact_events,
            aabb,
            fat_aabb: aabb.grow(crate::constants::AABB_MARGIN),
        }
    }

    /// Recomputes the tight AABB and fattens the broad-phase AABB if the shape left it.
    ///
    /// Returns `true` if the fat AABB was enlarged.
    pub fn update_aabb(&mut self, transform: &Transform) -> bool {
        self.aabb = self.geometry.compute_aabb(transform);
        if self.fat_aabb.contains(&self.aabb) {
            return false;
        }
        self.fat_aabb = self.aabb.grow(crate::constants::AABB_MARGIN);
        true
    }
}

/// Mixes the friction of two shapes with the geometric mean.
#[inline]
pub(crate) fn mix_friction(friction_a: Scalar, friction_b: Scalar) -> Scalar {
    (friction_a * friction_b).sqrt()
}

/// Mixes the restitution of two shapes by taking the larger value.
#[inline]
pub(crate) fn mix_restitution(restitution_a: Scalar, restitution_b: Scalar) -> Scalar {
    restitution_a.max(restitution_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn circle_mass() {
        let mass = ShapeGeometry::circle(0.5).compute_mass(2.0);
        assert_relative_eq!(mass.mass, 2.0 * PI * 0.25);
        assert_relative_eq!(mass.rotational_inertia, mass.mass * 0.125);
        assert_eq!(mass.center, Vector::ZERO);
    }

    #[test]
    fn capsule_mass_is_box_plus_circle() {
        let capsule = ShapeGeometry::capsule(Vector::new(-1.0, 0.0), Vector::new(1.0, 0.0), 0.5);
        let mass = capsule.compute_mass(1.0);
        assert_relative_eq!(mass.mass, PI * 0.25 + 2.0, epsilon = 1e-5);
        assert_relative_eq!(mass.center.x, 0.0);
        assert!(mass.rotational_inertia > 0.0);
    }

    #[test]
    fn filter_groups_override_masks() {
        let a = Filter {
            group_index: -1,
            ..Filter::DEFAULT
        };
        assert!(!a.should_collide(a));

        let b = Filter {
            category_bits: 0b10,
            mask_bits: 0b01,
            group_index: 0,
        };
        assert!(b.should_collide(Filter::DEFAULT));

        let c = Filter {
            category_bits: 0b10,
            mask_bits: 0b10,
            group_index: 0,
        };
        assert!(!c.should_collide(Filter::DEFAULT));

        let d = Filter {
            group_index: 3,
            mask_bits: 0,
            ..Filter::DEFAULT
        };
        assert!(d.should_collide(d));
    }

    #[test]
    fn fat_aabb_is_only_enlarged_when_needed() {
        let def = ShapeDef::default();
        let mut shape = Shape::new(0, &def, ShapeGeometry::circle(1.0), &Transform::IDENTITY);
        let moved = Transform::new(Vector::new(0.05, 0.0), Default::default());
        assert!(!shape.update_aabb(&moved));
        let far = Transform::new(Vector::new(3.0, 0.0), Default::default());
        assert!(shape.update_aabb(&far));
        assert!(shape.fat_aabb.contains(&shape.aabb));
    }
}
