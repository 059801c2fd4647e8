//! Constraints and other types used for solving contacts.

mod normal_part;
mod tangent_part;

pub use normal_part::ContactNormalPart;
pub use tangent_part::ContactTangentPart;

use crate::{
    collision::contact::Contact,
    data_structures::ArrayVec,
    math::{Scalar, Vector, cross},
};

use super::{
    StepContext,
    solver_body::{SolverBody, SolverBodyData, SolverBodyIndex},
};

/// Data and logic for solving a single contact point for a [`ContactConstraint`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactConstraintPoint {
    /// The normal part of the contact constraint.
    pub normal_part: ContactNormalPart,

    /// The tangential friction part of the contact constraint.
    pub tangent_part: ContactTangentPart,

    /// The largest incremental contact impulse magnitude along the contact normal during this step.
    ///
    /// This is used for determining whether restitution should be applied.
    pub max_normal_impulse: Scalar,

    /// The world-space contact point relative to the center of mass of body A.
    pub anchor_a: Vector,

    /// The world-space contact point relative to the center of mass of body B.
    pub anchor_b: Vector,

    /// The relative velocity of the bodies along the normal at the contact point,
    /// before the solve.
    pub normal_speed: Scalar,

    /// The separation at the start of the step minus the separation of the centers of mass
    /// along the normal, so that the current separation can be computed from the body deltas.
    pub adjusted_separation: Scalar,
}

/// A contact constraint used for resolving inter-penetration between two bodies.
///
/// The contact points are stored in `points`, and they all share the same `normal`.
#[derive(Clone, Debug, PartialEq)]
pub struct ContactConstraint {
    /// The index of the contact in the contact pool.
    pub contact_index: u32,
    pub index_a: SolverBodyIndex,
    pub index_b: SolverBodyIndex,
    pub inv_mass_a: Scalar,
    pub inv_mass_b: Scalar,
    pub inv_inertia_a: Scalar,
    pub inv_inertia_b: Scalar,
    /// The mixed coefficient of friction of the shapes.
    pub friction: Scalar,
    /// The mixed coefficient of restitution of the shapes.
    pub restitution: Scalar,
    /// The world-space contact normal shared by all points in the contact manifold.
    pub normal: Vector,
    /// The contact points in the manifold. Each point shares the same `normal`.
    pub points: ArrayVec<ContactConstraintPoint, 2>,
}

/// The solver data of one body of a constraint.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ConstraintBody {
    pub index: SolverBodyIndex,
    pub data: SolverBodyData,
    pub state: SolverBody,
}

impl ConstraintBody {
    /// The constraint data of a static body.
    pub const STATIC: Self = Self {
        index: SolverBodyIndex::INVALID,
        data: SolverBodyData {
            body_index: u32::MAX,
            inv_mass: 0.0,
            inv_inertia: 0.0,
            force: Vector::ZERO,
            torque: 0.0,
            gravity_scale: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            is_kinematic: false,
        },
        state: SolverBody::DUMMY,
    };
}

impl ContactConstraint {
    /// Prepares a constraint for a touching contact.
    pub(crate) fn generate(
        contact_index: u32,
        contact: &Contact,
        body_a: &ConstraintBody,
        body_b: &ConstraintBody,
        context: &StepContext,
    ) -> Self {
        let manifold = &contact.manifold;
        let normal = manifold.normal;
        let tangent = tangent_direction(normal);

        let (m_a, i_a) = (body_a.data.inv_mass, body_a.data.inv_inertia);
        let (m_b, i_b) = (body_b.data.inv_mass, body_b.data.inv_inertia);

        // Stiffer for static contacts to avoid bodies getting pushed through the ground.
        let softness = if m_a == 0.0 || m_b == 0.0 {
            context.static_softness
        } else {
            context.contact_softness
        };

        let warm_start_scale = if context.enable_warm_starting { 1.0 } else { 0.0 };
        let inv_mass_sum = m_a + m_b;

        let points = manifold
            .points
            .iter()
            .map(|point| {
                let r_a = point.anchor_a;
                let r_b = point.anchor_b;

                let relative_velocity =
                    body_b.state.velocity_at_point(r_b) - body_a.state.velocity_at_point(r_a);

                ContactConstraintPoint {
                    normal_part: ContactNormalPart::generate(
                        inv_mass_sum,
                        i_a,
                        i_b,
                        r_a,
                        r_b,
                        normal,
                        warm_start_scale * point.normal_impulse,
                        softness,
                    ),
                    tangent_part: ContactTangentPart::generate(
                        inv_mass_sum,
                        i_a,
                        i_b,
                        r_a,
                        r_b,
                        tangent,
                        warm_start_scale * point.tangent_impulse,
                    ),
                    max_normal_impulse: 0.0,
                    anchor_a: r_a,
                    anchor_b: r_b,
                    normal_speed: relative_velocity.dot(normal),
                    adjusted_separation: point.separation - (r_b - r_a).dot(normal),
                }
            })
            .collect();

        Self {
            contact_index,
            index_a: body_a.index,
            index_b: body_b.index,
            inv_mass_a: m_a,
            inv_mass_b: m_b,
            inv_inertia_a: i_a,
            inv_inertia_b: i_b,
            friction: contact.friction,
            restitution: contact.restitution,
            normal,
            points,
        }
    }

    #[inline]
    fn apply_impulse(&self, body_a: &mut SolverBody, body_b: &mut SolverBody, point: (Vector, Vector), impulse: Vector) {
        let (r_a, r_b) = point;
        body_a.linear_velocity -= impulse * self.inv_mass_a;
        body_a.angular_velocity -= self.inv_inertia_a * cross(r_a, impulse);
        body_b.linear_velocity += impulse * self.inv_mass_b;
        body_b.angular_velocity += self.inv_inertia_b * cross(r_b, impulse);
    }

    /// Warm starts the contact constraint by applying the impulses from the previous step.
    pub fn warm_start(&self, body_a: &mut SolverBody, body_b: &mut SolverBody) {
        let tangent = tangent_direction(self.normal);

        for point in self.points.iter() {
            let p = point.normal_part.impulse * self.normal + point.tangent_part.impulse * tangent;
            self.apply_impulse(body_a, body_b, (point.anchor_a, point.anchor_b), p);
        }
    }

    /// Solves the [`ContactConstraint`], applying an impulse to the given bodies.
    pub fn solve(
        &mut self,
        body_a: &mut SolverBody,
        body_b: &mut SolverBody,
        context: &StepContext,
        use_bias: bool,
    ) {
        let normal = self.normal;
        let delta_translation = body_b.delta_position - body_a.delta_position;

        // Normal impulses
        for i in 0..self.points.len() {
            let point = self.points[i];
            let (r_a, r_b) = (point.anchor_a, point.anchor_b);

            // Compute the current separation from the body deltas.
            let delta_separation =
                delta_translation + (body_b.delta_rotation * r_b - body_a.delta_rotation * r_a);
            let separation = delta_separation.dot(normal) + point.adjusted_separation;

            // Relative velocity at contact point
            let relative_velocity = body_b.velocity_at_point(r_b) - body_a.velocity_at_point(r_a);

            let point = &mut self.points[i];
            let impulse_magnitude = point.normal_part.solve_impulse(
                separation,
                relative_velocity,
                normal,
                use_bias,
                context.max_biased_push,
                context.dt,
            );

            // Store the maximum impulse for restitution.
            point.max_normal_impulse = impulse_magnitude.max(point.max_normal_impulse);

            self.apply_impulse(body_a, body_b, (r_a, r_b), impulse_magnitude * normal);
        }

        let tangent = tangent_direction(normal);

        // Friction
        for i in 0..self.points.len() {
            let (r_a, r_b) = (self.points[i].anchor_a, self.points[i].anchor_b);
            let relative_velocity = body_b.velocity_at_point(r_b) - body_a.velocity_at_point(r_a);

            let friction = self.friction;
            let point = &mut self.points[i];
            let impulse = point.tangent_part.solve_impulse(
                tangent,
                relative_velocity,
                friction,
                point.normal_part.impulse,
            );

            self.apply_impulse(body_a, body_b, (r_a, r_b), impulse * tangent);
        }
    }

    /// Applies restitution if the relative speed along the contact normal exceeds the given `threshold`.
    pub fn apply_restitution(&mut self, body_a: &mut SolverBody, body_b: &mut SolverBody, threshold: Scalar) {
        if self.restitution == 0.0 {
            return;
        }

        for i in 0..self.points.len() {
            let point = self.points[i];

            // Skip restitution for speeds below the threshold.
            // We also skip contacts that don't apply an impulse to account for speculative contacts.
            if point.normal_speed > -threshold || point.max_normal_impulse == 0.0 {
                continue;
            }

            let (r_a, r_b) = (point.anchor_a, point.anchor_b);

            // Relative velocity at contact point
            let relative_velocity = body_b.velocity_at_point(r_b) - body_a.velocity_at_point(r_a);
            let normal_speed = relative_velocity.dot(self.normal);

            // Compute the incremental normal impulse to account for restitution.
            let mut impulse = -point.normal_part.effective_mass
                * (normal_speed + self.restitution * point.normal_speed);

            // Clamp the accumulated impulse.
            let point = &mut self.points[i];
            let new_impulse = (point.normal_part.impulse + impulse).max(0.0);
            impulse = new_impulse - point.normal_part.impulse;
            point.normal_part.impulse = new_impulse;
            point.max_normal_impulse = impulse.max(point.max_normal_impulse);

            self.apply_impulse(body_a, body_b, (r_a, r_b), impulse * self.normal);
        }
    }

    /// Writes the accumulated impulses back into the manifold for warm starting the next step.
    pub(crate) fn store_impulses(&self, contact: &mut Contact) {
        for (point, manifold_point) in self.points.iter().zip(contact.manifold.points.iter_mut()) {
            manifold_point.normal_impulse = point.normal_part.impulse;
            manifold_point.tangent_impulse = point.tangent_part.impulse;
            manifold_point.max_normal_impulse = point.max_normal_impulse;
            manifold_point.normal_velocity = point.normal_speed;
        }
    }
}

/// Returns the friction direction for the given contact normal.
#[inline]
pub fn tangent_direction(normal: Vector) -> Vector {
    Vector::new(normal.y, -normal.x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collision::manifold::collide_circles,
        dynamics::solver::{StepContext, softness_parameters::SoftnessCoefficients},
    };

    fn dynamic_body(index: usize, velocity: Vector) -> ConstraintBody {
        ConstraintBody {
            index: SolverBodyIndex(index),
            data: SolverBodyData {
                inv_mass: 1.0,
                ..Default::default()
            },
            state: SolverBody {
                linear_velocity: velocity,
                ..SolverBody::DUMMY
            },
        }
    }

    #[test]
    fn head_on_collision_stops_approach() {
        let mut contact = Contact::new(0, 0, 1, 1, 0.0, 0.0, false);
        contact.manifold = collide_circles(Vector::ZERO, 0.5, Vector::new(0.99, 0.0), 0.5);
        for point in contact.manifold.points.iter_mut() {
            point.anchor_a = point.point;
            point.anchor_b = point.point - Vector::new(0.99, 0.0);
        }

        let context = StepContext {
            contact_softness: SoftnessCoefficients::RIGID,
            static_softness: SoftnessCoefficients::RIGID,
            ..StepContext::new(1.0 / 60.0)
        };

        let a = dynamic_body(0, Vector::new(1.0, 0.0));
        let b = dynamic_body(1, Vector::new(-1.0, 0.0));
        let mut constraint = ContactConstraint::generate(0, &contact, &a, &b, &context);
        assert_eq!(constraint.points[0].normal_speed, -2.0);

        let (mut state_a, mut state_b) = (a.state, b.state);
        constraint.solve(&mut state_a, &mut state_b, &context, false);

        let relative = state_b.linear_velocity - state_a.linear_velocity;
        assert!(relative.x.abs() < 1e-5);
        assert!(constraint.points[0].normal_part.impulse > 0.0);

        let mut stored = contact.clone();
        constraint.store_impulses(&mut stored);
        assert_eq!(
            stored.manifold.points[0].normal_impulse,
            constraint.points[0].normal_part.impulse
        );
    }
}
