//! Contact manifolds between pairs of shapes.
//!
//! Manifolds are computed in world space. Every point stores its anchors relative to the
//! centers of mass of both bodies, which is the form the contact solver consumes.

use crate::{
    constants::{LINEAR_SLOP, SPECULATIVE_DISTANCE},
    data_structures::ArrayVec,
    math::{Scalar, Transform, Vector, cross},
};

use super::shape::ShapeGeometry;

/// A contact point in a [`Manifold`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ManifoldPoint {
    /// The world-space contact point, midway between the two surfaces.
    pub point: Vector,
    /// The contact point relative to the center of mass of body A.
    pub anchor_a: Vector,
    /// The contact point relative to the center of mass of body B.
    pub anchor_b: Vector,
    /// The signed distance between the surfaces. Negative when overlapping.
    pub separation: Scalar,
    /// The accumulated normal impulse from the last step.
    pub normal_impulse: Scalar,
    /// The accumulated friction impulse from the last step.
    pub tangent_impulse: Scalar,
    /// The largest incremental normal impulse applied during the last step.
    pub max_normal_impulse: Scalar,
    /// The relative normal velocity before the last solve. Negative when approaching.
    pub normal_velocity: Scalar,
    /// Identifies the geometric feature pair that produced this point, for warm starting.
    pub id: u16,
    /// `true` if the point matched a point from the previous step.
    pub persisted: bool,
}

/// A contact manifold with up to two points sharing one normal.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Manifold {
    /// The world-space normal pointing from shape A to shape B.
    pub normal: Vector,
    /// The contact points.
    pub points: ArrayVec<ManifoldPoint, 2>,
}

impl Manifold {
    /// Returns the number of contact points.
    #[inline]
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    fn push_point(&mut self, point: Vector, separation: Scalar, id: u16) {
        if separation > SPECULATIVE_DISTANCE {
            return;
        }
        self.points.push(ManifoldPoint {
            point,
            separation,
            id,
            ..Default::default()
        });
    }

    /// Carries accumulated impulses over from the points of `old` that share a feature id.
    pub(crate) fn match_points(&mut self, old: &Manifold) {
        for point in self.points.iter_mut() {
            if let Some(old_point) = old.points.iter().find(|p| p.id == point.id) {
                point.normal_impulse = old_point.normal_impulse;
                point.tangent_impulse = old_point.tangent_impulse;
                point.persisted = true;
            }
        }
    }
}

/// Computes the manifold between two shapes.
///
/// `center_a` and `center_b` are the world-space centers of mass of the bodies,
/// used to compute the point anchors.
pub fn collide_shapes(
    geometry_a: &ShapeGeometry,
    transform_a: &Transform,
    center_a: Vector,
    geometry_b: &ShapeGeometry,
    transform_b: &Transform,
    center_b: Vector,
) -> Manifold {
    use ShapeGeometry::*;

    let mut manifold = match (*geometry_a, *geometry_b) {
        (
            Circle {
                center: ca,
                radius: ra,
            },
            Circle {
                center: cb,
                radius: rb,
            },
        ) => collide_circles(
            transform_a.transform_point(ca),
            ra,
            transform_b.transform_point(cb),
            rb,
        ),
        (
            Capsule {
                center1,
                center2,
                radius: ra,
            },
            Circle {
                center: cb,
                radius: rb,
            },
        ) => collide_capsule_circle(
            transform_a.transform_point(center1),
            transform_a.transform_point(center2),
            ra,
            transform_b.transform_point(cb),
            rb,
        ),
        (
            Circle {
                center: ca,
                radius: ra,
            },
            Capsule {
                center1,
                center2,
                radius: rb,
            },
        ) => {
            let mut manifold = collide_capsule_circle(
                transform_b.transform_point(center1),
                transform_b.transform_point(center2),
                rb,
                transform_a.transform_point(ca),
                ra,
            );
            manifold.normal = -manifold.normal;
            manifold
        }
        (
            Capsule {
                center1: a1,
                center2: a2,
                radius: ra,
            },
            Capsule {
                center1: b1,
                center2: b2,
                radius: rb,
            },
        ) => collide_capsules(
            transform_a.transform_point(a1),
            transform_a.transform_point(a2),
            ra,
            transform_b.transform_point(b1),
            transform_b.transform_point(b2),
            rb,
        ),
    };

    for point in manifold.points.iter_mut() {
        point.anchor_a = point.point - center_a;
        point.anchor_b = point.point - center_b;
    }

    manifold
}

/// Computes the manifold between two circles given in world space.
pub fn collide_circles(center_a: Vector, radius_a: Scalar, center_b: Vector, radius_b: Scalar) -> Manifold {
    let mut manifold = Manifold::default();
    let offset = center_b - center_a;
    let distance = offset.length();

    if distance - radius_a - radius_b > SPECULATIVE_DISTANCE {
        return manifold;
    }

    let normal = if distance > Scalar::EPSILON {
        offset / distance
    } else {
        Vector::Y
    };

    let surface_a = center_a + radius_a * normal;
    let surface_b = center_b - radius_b * normal;

    manifold.normal = normal;
    manifold.push_point(
        0.5 * (surface_a + surface_b),
        distance - radius_a - radius_b,
        0,
    );
    manifold
}

/// Computes the manifold between a capsule and a circle given in world space.
pub fn collide_capsule_circle(
    p1: Vector,
    p2: Vector,
    radius_a: Scalar,
    center_b: Vector,
    radius_b: Scalar,
) -> Manifold {
    let closest = closest_point_on_segment(p1, p2, center_b);
    collide_circles(closest, radius_a, center_b, radius_b)
}

/// Computes the manifold between two capsules given in world space.
///
/// Nearly parallel, overlapping capsules produce two points so that they can rest on each other.
pub fn collide_capsules(
    p1: Vector,
    q1: Vector,
    radius_a: Scalar,
    p2: Vector,
    q2: Vector,
    radius_b: Scalar,
) -> Manifold {
    let mut manifold = Manifold::default();

    let (closest_a, closest_b) = closest_points_between_segments(p1, q1, p2, q2);
    let offset = closest_b - closest_a;
    let distance = offset.length();

    if distance - radius_a - radius_b > SPECULATIVE_DISTANCE {
        return manifold;
    }

    let segment_a = q1 - p1;
    let length_a = segment_a.length();
    let axis_a = if length_a > Scalar::EPSILON {
        segment_a / length_a
    } else {
        Vector::X
    };

    let normal = if distance > Scalar::EPSILON {
        offset / distance
    } else {
        // The segments intersect. Push along the perpendicular of A, toward B.
        let perp = axis_a.perp();
        if perp.dot(0.5 * (p2 + q2) - 0.5 * (p1 + q1)) < 0.0 {
            -perp
        } else {
            perp
        }
    };
    manifold.normal = normal;

    let segment_b = q2 - p2;
    let length_b = segment_b.length();

    if length_a > LINEAR_SLOP && length_b > LINEAR_SLOP {
        let axis_b = segment_b / length_b;
        let is_parallel = cross(axis_a, axis_b).abs() < 0.05 && normal.dot(axis_a).abs() < 0.1;

        if is_parallel {
            // Clip segment B against the extent of segment A.
            let t1 = (p2 - p1).dot(axis_a);
            let t2 = (q2 - p1).dot(axis_a);
            let lower = t1.min(t2).max(0.0);
            let upper = t1.max(t2).min(length_a);

            if upper - lower > LINEAR_SLOP {
                for (id, t) in [(0, lower), (1, upper)] {
                    let on_a = p1 + t * axis_a;
                    let on_b = closest_point_on_segment(p2, q2, on_a);
                    let separation = (on_b - on_a).dot(normal) - radius_a - radius_b;
                    let point = on_a + (radius_a + 0.5 * separation) * normal;
                    manifold.push_point(point, separation, id);
                }
                return manifold;
            }
        }
    }

    let separation = distance - radius_a - radius_b;
    let point = closest_a + (radius_a + 0.5 * separation) * normal;
    manifold.push_point(point, separation, 0);
    manifold
}

/// Returns the point on the segment `[a, b]` closest to `q`.
pub fn closest_point_on_segment(a: Vector, b: Vector, q: Vector) -> Vector {
    let ab = b - a;
    let length_squared = ab.length_squared();
    if length_squared < Scalar::EPSILON {
        return a;
    }
    let t = ((q - a).dot(ab) / length_squared).clamp(0.0, 1.0);
    a + t * ab
}

/// Returns the closest pair of points between the segments `[p1, q1]` and `[p2, q2]`.
pub fn closest_points_between_segments(
    p1: Vector,
    q1: Vector,
    p2: Vector,
    q2: Vector,
) -> (Vector, Vector) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    if a <= Scalar::EPSILON && e <= Scalar::EPSILON {
        return (p1, p2);
    }

    let (s, t);
    if a <= Scalar::EPSILON {
        s = 0.0;
        t = (f / e).clamp(0.0, 1.0);
    } else {
        let c = d1.dot(r);
        if e <= Scalar::EPSILON {
            t = 0.0;
            s = (-c / a).clamp(0.0, 1.0);
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;

            let mut s0 = if denom != 0.0 {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t0 = (b * s0 + f) / e;

            if t0 < 0.0 {
                t0 = 0.0;
                s0 = (-c / a).clamp(0.0, 1.0);
            } else if t0 > 1.0 {
                t0 = 1.0;
                s0 = ((b - c) / a).clamp(0.0, 1.0);
            }

            s = s0;
            t = t0;
        }
    }

    (p1 + s * d1, p2 + t * d2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn overlapping_circles() {
        let manifold = collide_circles(Vector::ZERO, 1.0, Vector::new(1.5, 0.0), 1.0);
        assert_eq!(manifold.point_count(), 1);
        assert_eq!(manifold.normal, Vector::X);
        assert_relative_eq!(manifold.points[0].separation, -0.5);
        assert_relative_eq!(manifold.points[0].point.x, 0.75);
    }

    #[test]
    fn distant_circles_have_no_points() {
        let manifold = collide_circles(Vector::ZERO, 1.0, Vector::new(3.0, 0.0), 1.0);
        assert_eq!(manifold.point_count(), 0);
    }

    #[test]
    fn circle_on_capsule_normal_points_from_a_to_b() {
        let circle = ShapeGeometry::circle(0.5);
        let capsule = ShapeGeometry::capsule(Vector::new(-2.0, 0.0), Vector::new(2.0, 0.0), 0.25);
        let circle_transform = Transform::new(Vector::new(1.0, 0.7), Default::default());

        let manifold = collide_shapes(
            &circle,
            &circle_transform,
            circle_transform.position,
            &capsule,
            &Transform::IDENTITY,
            Vector::ZERO,
        );

        assert_eq!(manifold.point_count(), 1);
        assert_relative_eq!(manifold.normal.y, -1.0, epsilon = 1e-6);
        assert_relative_eq!(manifold.points[0].separation, -0.05, epsilon = 1e-5);
        let anchor_b = manifold.points[0].anchor_b;
        assert_relative_eq!(anchor_b.x, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn parallel_capsules_produce_two_points() {
        let manifold = collide_capsules(
            Vector::new(-1.0, 0.0),
            Vector::new(1.0, 0.0),
            0.25,
            Vector::new(-0.5, 0.49),
            Vector::new(2.0, 0.49),
            0.25,
        );
        assert_eq!(manifold.point_count(), 2);
        assert_relative_eq!(manifold.normal.y, 1.0, epsilon = 1e-5);
        for point in &manifold.points {
            assert_relative_eq!(point.separation, -0.01, epsilon = 1e-5);
        }
        assert_relative_eq!(manifold.points[0].point.x, -0.5, epsilon = 1e-5);
        assert_relative_eq!(manifold.points[1].point.x, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn matching_points_keeps_impulses() {
        let mut old = collide_circles(Vector::ZERO, 1.0, Vector::new(1.9, 0.0), 1.0);
        old.points[0].normal_impulse = 3.0;
        let mut new = collide_circles(Vector::ZERO, 1.0, Vector::new(1.8, 0.0), 1.0);
        new.match_points(&old);
        assert!(new.points[0].persisted);
        assert_eq!(new.points[0].normal_impulse, 3.0);
    }
}
