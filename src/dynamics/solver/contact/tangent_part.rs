use crate::math::{RecipOrZero, Scalar, Vector, cross};

/// The tangential friction part of a [`ContactConstraintPoint`](super::ContactConstraintPoint).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ContactTangentPart {
    /// The contact impulse magnitude along the contact tangent.
    ///
    /// This corresponds to the magnitude of the friction impulse.
    pub impulse: Scalar,

    /// The inertial properties of the bodies projected onto the contact tangent,
    /// or in other words, the mass "seen" by the constraint along the tangent.
    pub effective_mass: Scalar,
}

impl ContactTangentPart {
    /// Generates a new [`ContactTangentPart`].
    pub fn generate(
        inv_mass_sum: Scalar,
        inv_inertia_a: Scalar,
        inv_inertia_b: Scalar,
        r_a: Vector,
        r_b: Vector,
        tangent: Vector,
        warm_start_impulse: Scalar,
    ) -> Self {
        // Friction prevents relative motion along the tangent, so the Jacobian is
        //
        //      linear_a  angular_a   linear_b  angular_b
        // J = [ -t,      -(r_a x t),  t,        r_b x t ]
        let rt_a = cross(r_a, tangent);
        let rt_b = cross(r_b, tangent);
        let k = inv_mass_sum + inv_inertia_a * rt_a * rt_a + inv_inertia_b * rt_b * rt_b;

        Self {
            impulse: warm_start_impulse,
            effective_mass: k.recip_or_zero(),
        }
    }

    /// Solves the friction constraint, updating the total impulse in `self` and returning
    /// the incremental impulse to apply to each body.
    ///
    /// The accumulated impulse is clamped to the friction cone `[-μ λn, μ λn]`.
    pub fn solve_impulse(
        &mut self,
        tangent: Vector,
        relative_velocity: Vector,
        friction: Scalar,
        normal_impulse: Scalar,
    ) -> Scalar {
        let tangent_speed = relative_velocity.dot(tangent);
        let impulse = -self.effective_mass * tangent_speed;

        let max_friction = friction * normal_impulse;
        let new_impulse = (self.impulse + impulse).clamp(-max_friction, max_friction);
        let impulse = new_impulse - self.impulse;
        self.impulse = new_impulse;

        impulse
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friction_is_clamped_by_normal_impulse() {
        let mut part = ContactTangentPart::generate(1.0, 0.0, 0.0, Vector::ZERO, Vector::ZERO, Vector::X, 0.0);
        let impulse = part.solve_impulse(Vector::X, Vector::new(5.0, 0.0), 0.5, 2.0);
        assert_eq!(impulse, -1.0);
        assert_eq!(part.impulse, -1.0);

        // No normal impulse means no friction.
        let impulse = part.solve_impulse(Vector::X, Vector::new(5.0, 0.0), 0.5, 0.0);
        assert_eq!(impulse, 1.0);
        assert_eq!(part.impulse, 0.0);
    }
}
