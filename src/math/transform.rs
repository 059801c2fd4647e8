//! Rigid transforms and axis-aligned bounding boxes.

use super::{Rotation, Scalar, Vector};

/// A rigid 2D transform made of a translation and a rotation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Transform {
    /// The translation of the transform.
    pub position: Vector,
    /// The rotation of the transform.
    pub rotation: Rotation,
}

impl Transform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        position: Vector::ZERO,
        rotation: Rotation::IDENTITY,
    };

    /// Creates a new [`Transform`] from a position and a rotation.
    #[inline]
    pub const fn new(position: Vector, rotation: Rotation) -> Self {
        Self { position, rotation }
    }

    /// Transforms a point from local space into world space.
    #[inline]
    pub fn transform_point(&self, local_point: Vector) -> Vector {
        self.rotation * local_point + self.position
    }

    /// Transforms a point from world space into local space.
    #[inline]
    pub fn inverse_transform_point(&self, world_point: Vector) -> Vector {
        self.rotation.inverse_rotate(world_point - self.position)
    }
}

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb {
    /// The minimum point of the box.
    pub min: Vector,
    /// The maximum point of the box.
    pub max: Vector,
}

impl Aabb {
    /// Creates a new [`Aabb`] from its corners.
    #[inline]
    pub const fn new(min: Vector, max: Vector) -> Self {
        Self { min, max }
    }

    /// Returns `true` if the two boxes overlap.
    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        !(other.min.x > self.max.x
            || other.min.y > self.max.y
            || self.min.x > other.max.x
            || self.min.y > other.max.y)
    }

    /// Returns `true` if `self` fully contains `other`.
    #[inline]
    pub fn contains(&self, other: &Self) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    /// Grows the box by `margin` on every side.
    #[inline]
    #[must_use]
    pub fn grow(&self, margin: Scalar) -> Self {
        Self {
            min: self.min - Vector::splat(margin),
            max: self.max + Vector::splat(margin),
        }
    }

    /// Returns the center of the box.
    #[inline]
    pub fn center(&self) -> Vector {
        0.5 * (self.min + self.max)
    }
}
