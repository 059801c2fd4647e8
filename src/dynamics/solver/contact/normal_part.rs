use crate::{
    dynamics::solver::softness_parameters::SoftnessCoefficients,
    math::{RecipOrZero, Scalar, Vector, cross},
};

/// The normal part of a [`ContactConstraintPoint`](super::ContactConstraintPoint).
/// Aims to resolve overlap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactNormalPart {
    /// The magnitude of the contact impulse along the contact normal.
    pub impulse: Scalar,

    /// The inertial properties of the bodies projected onto the contact normal,
    /// or in other words, the mass "seen" by the constraint along the normal.
    pub effective_mass: Scalar,

    /// The softness parameters used for tuning contact response.
    pub softness: SoftnessCoefficients,
}

impl ContactNormalPart {
    /// Generates a new [`ContactNormalPart`].
    #[allow(clippy::too_many_arguments)]
    pub fn generate(
        inv_mass_sum: Scalar,
        inv_inertia_a: Scalar,
        inv_inertia_b: Scalar,
        r_a: Vector,
        r_b: Vector,
        normal: Vector,
        warm_start_impulse: Scalar,
        softness: SoftnessCoefficients,
    ) -> Self {
        // The Jacobian of the non-penetration constraint is
        //
        //      linear_a  angular_a   linear_b  angular_b
        // J = [ -n,      -(r_a x n),  n,        r_b x n ]
        //
        // so the effective inverse mass is
        //
        // K = 1/m_a + 1/m_b + i_a * (r_a x n)^2 + i_b * (r_b x n)^2
        let rn_a = cross(r_a, normal);
        let rn_b = cross(r_b, normal);
        let k = inv_mass_sum + inv_inertia_a * rn_a * rn_a + inv_inertia_b * rn_b * rn_b;

        Self {
            impulse: warm_start_impulse,
            effective_mass: k.recip_or_zero(),
            softness,
        }
    }

    /// Solves the non-penetration constraint, updating the total impulse in `self` and returning
    /// the incremental impulse to apply to each body.
    pub fn solve_impulse(
        &mut self,
        separation: Scalar,
        relative_velocity: Vector,
        normal: Vector,
        use_bias: bool,
        max_overlap_solve_speed: Scalar,
        delta_secs: Scalar,
    ) -> Scalar {
        // Compute the relative velocity along the normal.
        let normal_speed = relative_velocity.dot(normal);

        // Compute the incremental normal impulse.
        let mut impulse = if separation > 0.0 {
            // Speculative contact: Push back the part of the velocity that would cause penetration.
            -self.effective_mass * (normal_speed + separation / delta_secs)
        } else if use_bias {
            // Soft contact: the bias pushes the bodies apart, while the mass and impulse
            // scales keep the response spring-like.
            let bias = (self.softness.bias * separation).max(-max_overlap_solve_speed);
            let scaled_mass = self.softness.mass_scale * self.effective_mass;
            let scaled_impulse = self.softness.impulse_scale * self.impulse;

            -scaled_mass * (normal_speed + bias) - scaled_impulse
        } else {
            // Relaxation: remove the velocity introduced by the bias.
            -self.effective_mass * normal_speed
        };

        // Clamp the accumulated impulse.
        let new_impulse = (self.impulse + impulse).max(0.0);
        impulse = new_impulse - self.impulse;
        self.impulse = new_impulse;

        // Return the clamped incremental normal impulse.
        impulse
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulated_impulse_never_pulls() {
        let mut part = ContactNormalPart::generate(
            1.0,
            0.0,
            0.0,
            Vector::ZERO,
            Vector::ZERO,
            Vector::Y,
            0.5,
            SoftnessCoefficients::RIGID,
        );

        // Separating velocity removes the accumulated impulse but never goes negative.
        let impulse = part.solve_impulse(-0.01, Vector::new(0.0, 10.0), Vector::Y, false, 3.0, 1.0 / 60.0);
        assert_eq!(impulse, -0.5);
        assert_eq!(part.impulse, 0.0);
    }

    #[test]
    fn speculative_contact_allows_approach_up_to_the_gap() {
        let mut part = ContactNormalPart::generate(
            1.0,
            0.0,
            0.0,
            Vector::ZERO,
            Vector::ZERO,
            Vector::Y,
            0.0,
            SoftnessCoefficients::RIGID,
        );

        // Closing the 0.01 gap in one step of 0.1 seconds needs 0.1 m/s.
        let impulse = part.solve_impulse(0.01, Vector::new(0.0, -0.05), Vector::Y, true, 3.0, 0.1);
        assert_eq!(impulse, 0.0);

        let impulse = part.solve_impulse(0.01, Vector::new(0.0, -0.3), Vector::Y, true, 3.0, 0.1);
        assert!((impulse - 0.2).abs() < 1e-6);
    }
}
