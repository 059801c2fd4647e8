use crate::math::{Rotation, Scalar, Transform, Vector};

use super::HexColor;

/// A sink for debug drawing primitives, implemented by the user's renderer.
///
/// Only [`draw_segment`](Self::draw_segment), [`draw_point`](Self::draw_point), and
/// [`draw_string`](Self::draw_string) are required. The remaining primitives are built from segments.
pub trait DebugDraw {
    /// Draws a line from `a` to `b`.
    fn draw_segment(&mut self, a: Vector, b: Vector, color: HexColor);

    /// Draws a point with the given size in pixels.
    fn draw_point(&mut self, point: Vector, size: Scalar, color: HexColor);

    /// Draws a string at the given world position.
    fn draw_string(&mut self, position: Vector, text: &str);

    /// Draws the outline of a circle.
    fn draw_circle(&mut self, center: Vector, radius: Scalar, color: HexColor) {
        const SEGMENTS: usize = 16;
        let step = Rotation::radians(crate::math::TAU / SEGMENTS as Scalar);
        let mut rotation = Rotation::IDENTITY;
        let mut previous = center + radius * Vector::X;
        for _ in 0..SEGMENTS {
            rotation = step * rotation;
            let next = center + rotation * Vector::new(radius, 0.0);
            self.draw_segment(previous, next, color);
            previous = next;
        }
    }

    /// Draws a filled circle. The transform's rotation is shown with a line from the center.
    fn draw_solid_circle(&mut self, transform: Transform, radius: Scalar, color: HexColor) {
        self.draw_circle(transform.position, radius, color);
        let axis = transform.rotation * Vector::new(radius, 0.0);
        self.draw_segment(transform.position, transform.position + axis, color);
    }

    /// Draws a filled capsule between the centers `a` and `b`.
    fn draw_solid_capsule(&mut self, a: Vector, b: Vector, radius: Scalar, color: HexColor) {
        let axis = (b - a).normalize_or_zero();
        let offset = radius * axis.perp();
        self.draw_circle(a, radius, color);
        self.draw_circle(b, radius, color);
        self.draw_segment(a + offset, b + offset, color);
        self.draw_segment(a - offset, b - offset, color);
        self.draw_segment(a, b, color);
    }

    /// Draws a transform as a pair of axes.
    fn draw_transform(&mut self, transform: Transform) {
        const AXIS_SCALE: Scalar = 0.2;
        let origin = transform.position;
        self.draw_segment(origin, origin + AXIS_SCALE * (transform.rotation * Vector::X), HexColor::RED);
        self.draw_segment(origin, origin + AXIS_SCALE * (transform.rotation * Vector::Y), HexColor::GREEN);
    }

    /// Draws an arrow from `a` to `b` with an arrowhead that has a length of `head_length`.
    fn draw_arrow(&mut self, a: Vector, b: Vector, head_length: Scalar, color: HexColor) {
        self.draw_segment(a, b, color);

        let dir = (b - a).normalize_or_zero();
        if dir == Vector::ZERO {
            return;
        }

        let back = -head_length * dir;
        let side = 0.5 * head_length * dir.perp();
        self.draw_segment(b, b + back + side, color);
        self.draw_segment(b, b + back - side, color);
    }
}
