//! Math types and traits used by the crate.
//!
//! The crate is 2D and single precision only. Vectors and matrices come from [`bevy_math`].

mod rotation;
mod transform;

pub use rotation::Rotation;
pub use transform::{Aabb, Transform};

pub use bevy_math::{Mat2, Vec2};

/// The floating point number type used by the engine.
pub type Scalar = f32;
/// The vector type used by the engine.
pub type Vector = Vec2;
/// The 2x2 matrix type used by the engine.
pub type Matrix = Mat2;

/// The Archimedes' constant (π).
pub const PI: Scalar = core::f32::consts::PI;
/// The full circle constant (τ = 2π).
pub const TAU: Scalar = core::f32::consts::TAU;

/// A large number used as an upper bound for lengths and impulses.
pub const HUGE: Scalar = 100_000.0;

/// The 2D cross product `a.x * b.y - a.y * b.x` of two vectors.
#[inline]
pub fn cross(a: Vector, b: Vector) -> Scalar {
    a.perp_dot(b)
}

/// Crosses a scalar with a vector, `s × v = (-s * v.y, s * v.x)`.
#[inline]
pub fn cross_sv(s: Scalar, v: Vector) -> Vector {
    Vector::new(-s * v.y, s * v.x)
}

/// Crosses a vector with a scalar, `v × s = (s * v.y, -s * v.x)`.
#[inline]
pub fn cross_vs(v: Vector, s: Scalar) -> Vector {
    Vector::new(s * v.y, -s * v.x)
}

/// Inverts a 2x2 matrix, returning the zero matrix if it is singular.
#[inline]
pub fn invert_or_zero(m: Matrix) -> Matrix {
    let det = m.determinant();
    if det == 0.0 {
        return Matrix::ZERO;
    }
    m.inverse()
}

/// Solves `m * x = b` for `x`, returning zero if `m` is singular.
#[inline]
pub fn solve22(m: Matrix, b: Vector) -> Vector {
    let [a11, a21] = m.x_axis.to_array();
    let [a12, a22] = m.y_axis.to_array();
    let det = (a11 * a22 - a12 * a21).recip_or_zero();
    Vector::new(det * (a22 * b.x - a12 * b.y), det * (a11 * b.y - a21 * b.x))
}

/// Computes the reciprocal of a value, returning zero for zero.
pub trait RecipOrZero {
    /// Computes the reciprocal of `self` if `self` is not zero,
    /// and returns zero otherwise to avoid division by zero.
    fn recip_or_zero(self) -> Self;
}

impl RecipOrZero for f32 {
    #[inline]
    fn recip_or_zero(self) -> Self {
        if self != 0.0 { self.recip() } else { 0.0 }
    }
}

impl RecipOrZero for Vec2 {
    #[inline]
    fn recip_or_zero(self) -> Self {
        Self::new(self.x.recip_or_zero(), self.y.recip_or_zero())
    }
}

/// Returns the normalized vector along with its original length,
/// or `(Vector::ZERO, 0.0)` if the vector is too short.
#[inline]
pub fn normalize_and_length(v: Vector) -> (Vector, Scalar) {
    let length = v.length();
    if length < Scalar::EPSILON {
        return (Vector::ZERO, 0.0);
    }
    (v / length, length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cross_products_match_3d_definitions() {
        let a = Vector::new(1.0, 2.0);
        let b = Vector::new(3.0, -1.0);
        assert_relative_eq!(cross(a, b), -7.0);
        assert_eq!(cross_sv(2.0, a), Vector::new(-4.0, 2.0));
        assert_eq!(cross_vs(a, 2.0), Vector::new(4.0, -2.0));
    }

    #[test]
    fn solve22_inverts_matrix() {
        let m = Matrix::from_cols(Vector::new(4.0, 1.0), Vector::new(2.0, 3.0));
        let b = Vector::new(1.0, 2.0);
        let x = solve22(m, b);
        let back = m * x;
        assert_relative_eq!(back.x, b.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, b.y, epsilon = 1e-5);

        assert_eq!(solve22(Matrix::ZERO, b), Vector::ZERO);
        assert_eq!(invert_or_zero(Matrix::ZERO), Matrix::ZERO);
    }
}
