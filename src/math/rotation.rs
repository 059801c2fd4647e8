//! The [`Rotation`] type, a 2D rotation stored as a unit complex number.

use core::ops::{Mul, MulAssign};

use super::{Scalar, Vector};

/// A counterclockwise 2D rotation.
///
/// The rotation is stored as the cosine and sine of the rotation angle,
/// which is equivalent to a unit complex number.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Rotation {
    /// The cosine of the rotation angle in radians.
    pub cos: Scalar,
    /// The sine of the rotation angle in radians.
    pub sin: Scalar,
}

impl Default for Rotation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Rotation {
    /// No rotation.
    pub const IDENTITY: Self = Self { cos: 1.0, sin: 0.0 };

    /// A counterclockwise rotation of π/2 radians.
    pub const FRAC_PI_2: Self = Self { cos: 0.0, sin: 1.0 };

    /// Creates a [`Rotation`] from a counterclockwise angle in radians.
    #[inline]
    pub fn radians(radians: Scalar) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self::from_sin_cos(sin, cos)
    }

    /// Creates a [`Rotation`] from a counterclockwise angle in degrees.
    #[inline]
    pub fn degrees(degrees: Scalar) -> Self {
        Self::radians(degrees.to_radians())
    }

    /// Creates a [`Rotation`] from the sine and cosine of an angle in radians.
    ///
    /// The rotation is only valid if `sin * sin + cos * cos == 1.0`.
    #[inline]
    pub fn from_sin_cos(sin: Scalar, cos: Scalar) -> Self {
        let rotation = Self { sin, cos };
        debug_assert!(
            rotation.is_normalized(),
            "the given sine and cosine produce an invalid rotation"
        );
        rotation
    }

    /// Returns the rotation in radians in the `(-pi, pi]` range.
    #[inline]
    pub fn as_radians(self) -> Scalar {
        Scalar::atan2(self.sin, self.cos)
    }

    /// Returns the rotation in degrees in the `(-180, 180]` range.
    #[inline]
    pub fn as_degrees(self) -> Scalar {
        self.as_radians().to_degrees()
    }

    /// Computes the length of the complex number used to represent the rotation.
    #[inline]
    pub fn length(self) -> Scalar {
        Vector::new(self.sin, self.cos).length()
    }

    /// Returns `true` if the rotation is approximately of unit length.
    #[inline]
    pub fn is_normalized(self) -> bool {
        (self.length() - 1.0).abs() <= 2e-4
    }

    /// Returns the angle in radians needed to make `self` and `other` coincide.
    ///
    /// This is the relative angle of `other` with respect to `self`.
    #[inline]
    pub fn angle_between(self, other: Self) -> Scalar {
        (other * self.inverse()).as_radians()
    }

    /// Returns the inverse of the rotation. This is also the conjugate
    /// of the unit complex number representing the rotation.
    #[inline]
    #[must_use]
    pub fn inverse(self) -> Self {
        Self {
            cos: self.cos,
            sin: -self.sin,
        }
    }

    /// Rotates a vector by the inverse of `self`.
    #[inline]
    pub fn inverse_rotate(self, v: Vector) -> Vector {
        Vector::new(self.cos * v.x + self.sin * v.y, -self.sin * v.x + self.cos * v.y)
    }

    /// Adds the given counterclockwise angle in radians to the [`Rotation`].
    /// Uses small-angle approximation and renormalizes the result.
    #[inline]
    #[must_use]
    pub fn add_angle(&self, radians: Scalar) -> Self {
        let (sin, cos) = (self.sin + radians * self.cos, self.cos - radians * self.sin);
        let magnitude_squared = sin * sin + cos * cos;
        let magnitude_recip = if magnitude_squared > 0.0 {
            magnitude_squared.sqrt().recip()
        } else {
            0.0
        };
        Rotation::from_sin_cos(sin * magnitude_recip, cos * magnitude_recip)
    }

    /// Returns the rotation scaled to unit length, or the identity if it has zero length.
    #[inline]
    pub fn normalize(self) -> Self {
        let length = self.length();
        if length <= Scalar::EPSILON {
            return Self::IDENTITY;
        }
        Self {
            sin: self.sin / length,
            cos: self.cos / length,
        }
    }

    /// Performs a normalized linear interpolation between `self` and `end`.
    ///
    /// Falls back to `self` if the interpolated rotation cannot be normalized.
    #[inline]
    pub fn nlerp(self, end: Self, s: Scalar) -> Self {
        let sin = self.sin + (end.sin - self.sin) * s;
        let cos = self.cos + (end.cos - self.cos) * s;
        let length = Vector::new(sin, cos).length();
        if length <= Scalar::EPSILON {
            return self;
        }
        Self {
            sin: sin / length,
            cos: cos / length,
        }
    }
}

impl Mul<Rotation> for Rotation {
    type Output = Self;

    fn mul(self, rhs: Rotation) -> Self::Output {
        Self {
            cos: self.cos * rhs.cos - self.sin * rhs.sin,
            sin: self.sin * rhs.cos + self.cos * rhs.sin,
        }
    }
}

impl MulAssign<Rotation> for Rotation {
    fn mul_assign(&mut self, rhs: Rotation) {
        *self = *self * rhs;
    }
}

impl Mul<Vector> for Rotation {
    type Output = Vector;

    /// Rotates a [`Vector`] by a [`Rotation`].
    fn mul(self, rhs: Vector) -> Self::Output {
        Vector::new(
            rhs.x * self.cos - rhs.y * self.sin,
            rhs.x * self.sin + rhs.y * self.cos,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn angle_between_is_relative_angle() {
        let a = Rotation::degrees(30.0);
        let b = Rotation::degrees(75.0);
        assert_relative_eq!(a.angle_between(b), 45f32.to_radians(), epsilon = 1e-5);
        assert_relative_eq!(b.angle_between(a), -45f32.to_radians(), epsilon = 1e-5);
    }

    #[test]
    fn inverse_rotate_undoes_rotation() {
        let rot = Rotation::degrees(123.0);
        let v = Vector::new(1.5, -2.0);
        let back = rot.inverse_rotate(rot * v);
        assert_relative_eq!(back.x, v.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, v.y, epsilon = 1e-5);
    }

    #[test]
    fn add_angle_stays_normalized() {
        let mut rot = Rotation::IDENTITY;
        for _ in 0..100 {
            rot = rot.add_angle(0.05);
        }
        assert!(rot.is_normalized());
    }
}
