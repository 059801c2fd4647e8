//! [`WeldJoint`] and [`WeldJointDef`].

use crate::{
    debug_render::DebugDraw,
    dynamics::solver::{
        StepContext,
        softness_parameters::{SoftnessCoefficients, SoftnessParameters},
        solver_body::SolverBody,
    },
    id::BodyId,
    math::{RecipOrZero, Scalar, Vector, solve22},
};

use super::{JointBlueprint, JointDrawContext, JointFrame, JointSolver};

/// Parameters for creating a [`WeldJoint`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct WeldJointDef {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub local_anchor_a: Vector,
    pub local_anchor_b: Vector,
    /// The angle of body B relative to body A that is held by the joint.
    pub reference_angle: Scalar,
    /// The linear stiffness in Hertz. Zero uses the world's joint softness.
    pub linear_hertz: Scalar,
    /// The angular stiffness in Hertz. Zero uses the world's joint softness.
    pub angular_hertz: Scalar,
    pub linear_damping_ratio: Scalar,
    pub angular_damping_ratio: Scalar,
    pub collide_connected: bool,
}

impl Default for WeldJointDef {
    fn default() -> Self {
        Self {
            body_a: BodyId::NULL,
            body_b: BodyId::NULL,
            local_anchor_a: Vector::ZERO,
            local_anchor_b: Vector::ZERO,
            reference_angle: 0.0,
            linear_hertz: 0.0,
            angular_hertz: 0.0,
            linear_damping_ratio: 1.0,
            angular_damping_ratio: 1.0,
            collide_connected: false,
        }
    }
}

impl WeldJointDef {
    pub fn new(body_a: BodyId, body_b: BodyId, local_anchor_a: Vector, local_anchor_b: Vector) -> Self {
        Self {
            body_a,
            body_b,
            local_anchor_a,
            local_anchor_b,
            ..Default::default()
        }
    }

    pub(crate) fn build(&self) -> JointBlueprint {
        let joint = WeldJoint {
            reference_angle: self.reference_angle,
            linear_hertz: self.linear_hertz.max(0.0),
            angular_hertz: self.angular_hertz.max(0.0),
            linear_damping_ratio: self.linear_damping_ratio.max(0.0),
            angular_damping_ratio: self.angular_damping_ratio.max(0.0),
            linear_impulse: Vector::ZERO,
            angular_impulse: 0.0,
            axial_mass: 0.0,
            linear_softness: SoftnessCoefficients::RIGID,
            angular_softness: SoftnessCoefficients::RIGID,
            angle: 0.0,
        };

        JointBlueprint {
            kind: joint.into(),
            local_anchor_a: self.local_anchor_a,
            local_anchor_b: self.local_anchor_b,
            collide_connected: self.collide_connected,
            draw_size: 1.0,
        }
    }
}

/// Glues two bodies together, optionally with soft linear and angular springs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeldJoint {
    reference_angle: Scalar,
    linear_hertz: Scalar,
    angular_hertz: Scalar,
    linear_damping_ratio: Scalar,
    angular_damping_ratio: Scalar,

    linear_impulse: Vector,
    angular_impulse: Scalar,

    axial_mass: Scalar,
    linear_softness: SoftnessCoefficients,
    angular_softness: SoftnessCoefficients,
    angle: Scalar,
}

impl WeldJoint {
    #[inline]
    pub fn reference_angle(&self) -> Scalar {
        self.reference_angle
    }

    #[inline]
    pub fn linear_hertz(&self) -> Scalar {
        self.linear_hertz
    }

    #[inline]
    pub fn angular_hertz(&self) -> Scalar {
        self.angular_hertz
    }

    #[inline]
    pub fn linear_damping_ratio(&self) -> Scalar {
        self.linear_damping_ratio
    }

    #[inline]
    pub fn angular_damping_ratio(&self) -> Scalar {
        self.angular_damping_ratio
    }

    /// Sets the linear stiffness and damping ratio. A frequency of zero uses the world's joint softness.
    pub fn set_linear_tuning(&mut self, hertz: Scalar, damping_ratio: Scalar) {
        self.linear_hertz = hertz.max(0.0);
        self.linear_damping_ratio = damping_ratio.max(0.0);
    }

    /// Sets the angular stiffness and damping ratio. A frequency of zero uses the world's joint softness.
    pub fn set_angular_tuning(&mut self, hertz: Scalar, damping_ratio: Scalar) {
        self.angular_hertz = hertz.max(0.0);
        self.angular_damping_ratio = damping_ratio.max(0.0);
    }

    #[inline]
    pub fn constraint_force(&self, inv_dt: Scalar) -> Vector {
        inv_dt * self.linear_impulse
    }

    #[inline]
    pub fn constraint_torque(&self, inv_dt: Scalar) -> Scalar {
        inv_dt * self.angular_impulse
    }
}

impl JointSolver for WeldJoint {
    fn prepare(&mut self, frame: &JointFrame, context: &StepContext) {
        self.angle = frame.rotation_a.angle_between(frame.rotation_b) - self.reference_angle;
        self.axial_mass = (frame.inv_inertia_a + frame.inv_inertia_b).recip_or_zero();

        self.linear_softness = if self.linear_hertz == 0.0 {
            context.joint_softness
        } else {
            SoftnessParameters::new(self.linear_damping_ratio, self.linear_hertz).compute_coefficients(context.dt)
        };
        self.angular_softness = if self.angular_hertz == 0.0 {
            context.joint_softness
        } else {
            SoftnessParameters::new(self.angular_damping_ratio, self.angular_hertz).compute_coefficients(context.dt)
        };

        if !context.enable_warm_starting {
            self.linear_impulse = Vector::ZERO;
            self.angular_impulse = 0.0;
        }
    }

    fn warm_start(&mut self, frame: &JointFrame, body_a: &mut SolverBody, body_b: &mut SolverBody) {
        let (r_a, r_b) = frame.current_anchors(body_a, body_b);
        frame.apply_linear_impulse(body_a, body_b, r_a, r_b, self.linear_impulse);
        frame.apply_angular_impulse(body_a, body_b, self.angular_impulse);
    }

    fn solve(
        &mut self,
        frame: &JointFrame,
        body_a: &mut SolverBody,
        body_b: &mut SolverBody,
        _context: &StepContext,
        use_bias: bool,
    ) {
        // Angular constraint
        {
            let (bias, softness) = if use_bias || self.angular_hertz > 0.0 {
                let c = self.angle + frame.delta_angle(body_a, body_b);
                (self.angular_softness.bias * c, self.angular_softness)
            } else {
                (0.0, SoftnessCoefficients::RIGID)
            };

            let speed = body_b.angular_velocity - body_a.angular_velocity;
            let impulse = -self.axial_mass * softness.mass_scale * (speed + bias)
                - softness.impulse_scale * self.angular_impulse;
            self.angular_impulse += impulse;

            frame.apply_angular_impulse(body_a, body_b, impulse);
        }

        // Linear constraint
        {
            let (r_a, r_b) = frame.current_anchors(body_a, body_b);

            let (bias, softness) = if use_bias || self.linear_hertz > 0.0 {
                let c = frame.separation(body_a, body_b, r_a, r_b);
                (self.linear_softness.bias * c, self.linear_softness)
            } else {
                (Vector::ZERO, SoftnessCoefficients::RIGID)
            };

            let velocity = frame.relative_velocity(body_a, body_b, r_a, r_b);
            let k = frame.point_mass_matrix(r_a, r_b);
            let b = solve22(k, velocity + bias);
            let impulse = -softness.mass_scale * b - softness.impulse_scale * self.linear_impulse;
            self.linear_impulse += impulse;

            frame.apply_linear_impulse(body_a, body_b, r_a, r_b, impulse);
        }
    }

    fn draw(&self, draw: &mut dyn DebugDraw, context: &JointDrawContext) {
        context.draw_default(draw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dynamics::{joints::JointKind, solver::solver_body::SolverBodyIndex},
        math::Rotation,
    };
    use approx::assert_relative_eq;

    fn joint(def: WeldJointDef) -> WeldJoint {
        match def.build().kind {
            JointKind::Weld(joint) => joint,
            kind => panic!("expected a weld joint, got {kind:?}"),
        }
    }

    #[test]
    fn rigid_weld_removes_relative_motion() {
        let mut joint = joint(WeldJointDef::default());
        let frame = JointFrame {
            index_a: SolverBodyIndex::INVALID,
            index_b: SolverBodyIndex(0),
            inv_mass_a: 0.0,
            inv_mass_b: 1.0,
            inv_inertia_a: 0.0,
            inv_inertia_b: 1.0,
            anchor_a: Vector::ZERO,
            anchor_b: Vector::ZERO,
            center_a: Vector::ZERO,
            center_b: Vector::ZERO,
            delta_center: Vector::ZERO,
            rotation_a: Rotation::IDENTITY,
            rotation_b: Rotation::IDENTITY,
        };
        let context = StepContext::new(1.0 / 60.0);
        joint.prepare(&frame, &context);

        let mut a = SolverBody::DUMMY;
        let mut b = SolverBody {
            linear_velocity: Vector::new(1.0, -2.0),
            angular_velocity: 3.0,
            ..SolverBody::DUMMY
        };
        joint.solve(&frame, &mut a, &mut b, &context, false);

        assert_relative_eq!(b.linear_velocity.length(), 0.0, epsilon = 1e-5);
        assert_relative_eq!(b.angular_velocity, 0.0, epsilon = 1e-5);
        assert_relative_eq!(joint.constraint_torque(60.0), -180.0, epsilon = 1e-3);
    }

    #[test]
    fn zero_hertz_uses_joint_softness() {
        let mut joint = joint(WeldJointDef {
            linear_hertz: 5.0,
            ..Default::default()
        });
        let frame = JointFrame {
            index_a: SolverBodyIndex::INVALID,
            index_b: SolverBodyIndex::INVALID,
            inv_mass_a: 0.0,
            inv_mass_b: 0.0,
            inv_inertia_a: 0.0,
            inv_inertia_b: 0.0,
            anchor_a: Vector::ZERO,
            anchor_b: Vector::ZERO,
            center_a: Vector::ZERO,
            center_b: Vector::ZERO,
            delta_center: Vector::ZERO,
            rotation_a: Rotation::IDENTITY,
            rotation_b: Rotation::IDENTITY,
        };
        let context = StepContext::new(1.0 / 60.0);
        joint.prepare(&frame, &context);

        assert_eq!(joint.angular_softness, context.joint_softness);
        assert_ne!(joint.linear_softness, context.joint_softness);
    }
}
