//! [`MotorJoint`] and [`MotorJointDef`].

use crate::{
    debug_render::DebugDraw,
    dynamics::solver::{StepContext, solver_body::SolverBody},
    id::BodyId,
    math::{Matrix, RecipOrZero, Scalar, Vector, invert_or_zero},
};

use super::{JointBlueprint, JointDrawContext, JointFrame, JointSolver};

/// Parameters for creating a [`MotorJoint`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorJointDef {
    pub body_a: BodyId,
    pub body_b: BodyId,
    /// The target position of body B in the frame of body A.
    pub linear_offset: Vector,
    /// The target angle of body B relative to body A, in radians.
    pub angular_offset: Scalar,
    /// The maximum force used to reach the linear offset.
    pub max_force: Scalar,
    /// The maximum torque used to reach the angular offset.
    pub max_torque: Scalar,
    /// The fraction of the position error corrected per step, in `[0, 1]`.
    pub correction_factor: Scalar,
}

impl Default for MotorJointDef {
    fn default() -> Self {
        Self {
            body_a: BodyId::NULL,
            body_b: BodyId::NULL,
            linear_offset: Vector::ZERO,
            angular_offset: 0.0,
            max_force: 1.0,
            max_torque: 1.0,
            correction_factor: 0.3,
        }
    }
}

impl MotorJointDef {
    /// Creates a definition that drives `body_b` toward its current pose relative to `body_a`.
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            ..Default::default()
        }
    }

    pub(crate) fn build(&self) -> JointBlueprint {
        let joint = MotorJoint {
            linear_offset: self.linear_offset,
            angular_offset: self.angular_offset,
            max_force: self.max_force.max(0.0),
            max_torque: self.max_torque.max(0.0),
            correction_factor: self.correction_factor.clamp(0.0, 1.0),
            linear_impulse: Vector::ZERO,
            angular_impulse: 0.0,
            linear_mass: Matrix::ZERO,
            angular_mass: 0.0,
            angle: 0.0,
        };

        JointBlueprint {
            kind: joint.into(),
            local_anchor_a: Vector::ZERO,
            local_anchor_b: Vector::ZERO,
            collide_connected: true,
            draw_size: 1.0,
        }
    }
}

/// Drives body B toward a target pose relative to body A with a limited force and torque.
///
/// The connected bodies always collide with each other.
///
/// Useful for top-down friction and for animated characters that still respond to collisions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotorJoint {
    linear_offset: Vector,
    angular_offset: Scalar,
    max_force: Scalar,
    max_torque: Scalar,
    correction_factor: Scalar,

    linear_impulse: Vector,
    angular_impulse: Scalar,

    linear_mass: Matrix,
    angular_mass: Scalar,
    /// The relative angle of the bodies at the start of the step.
    angle: Scalar,
}

impl MotorJoint {
    #[inline]
    pub fn linear_offset(&self) -> Vector {
        self.linear_offset
    }

    #[inline]
    pub fn set_linear_offset(&mut self, offset: Vector) {
        self.linear_offset = offset;
    }

    #[inline]
    pub fn angular_offset(&self) -> Scalar {
        self.angular_offset
    }

    #[inline]
    pub fn set_angular_offset(&mut self, offset: Scalar) {
        self.angular_offset = offset;
    }

    #[inline]
    pub fn max_force(&self) -> Scalar {
        self.max_force
    }

    #[inline]
    pub fn set_max_force(&mut self, max_force: Scalar) {
        self.max_force = max_force.max(0.0);
    }

    #[inline]
    pub fn max_torque(&self) -> Scalar {
        self.max_torque
    }

    #[inline]
    pub fn set_max_torque(&mut self, max_torque: Scalar) {
        self.max_torque = max_torque.max(0.0);
    }

    #[inline]
    pub fn correction_factor(&self) -> Scalar {
        self.correction_factor
    }

    /// Sets the position correction factor, clamped to `[0, 1]`.
    #[inline]
    pub fn set_correction_factor(&mut self, factor: Scalar) {
        self.correction_factor = factor.clamp(0.0, 1.0);
    }

    /// Returns the force applied during the last step.
    #[inline]
    pub fn constraint_force(&self, inv_dt: Scalar) -> Vector {
        inv_dt * self.linear_impulse
    }

    /// Returns the torque applied during the last step.
    #[inline]
    pub fn constraint_torque(&self, inv_dt: Scalar) -> Scalar {
        inv_dt * self.angular_impulse
    }
}

impl JointSolver for MotorJoint {
    fn prepare(&mut self, frame: &JointFrame, context: &StepContext) {
        self.angle = frame.rotation_a.angle_between(frame.rotation_b);
        self.linear_mass = invert_or_zero(frame.point_mass_matrix(frame.anchor_a, frame.anchor_b));
        self.angular_mass = (frame.inv_inertia_a + frame.inv_inertia_b).recip_or_zero();

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
        context: &StepContext,
        _use_bias: bool,
    ) {
        // The motor always corrects position error, limited by its maximum force and torque.
        let h = context.dt;
        let inv_h = context.inv_dt;

        // Angular constraint
        {
            let c = self.angle + frame.delta_angle(body_a, body_b) - self.angular_offset;
            let bias = inv_h * self.correction_factor * c;
            let speed = body_b.angular_velocity - body_a.angular_velocity;

            let impulse = -self.angular_mass * (speed + bias);
            let old_impulse = self.angular_impulse;
            let max_impulse = h * self.max_torque;
            self.angular_impulse = (old_impulse + impulse).clamp(-max_impulse, max_impulse);

            frame.apply_angular_impulse(body_a, body_b, self.angular_impulse - old_impulse);
        }

        // Linear constraint
        {
            let (r_a, r_b) = frame.current_anchors(body_a, body_b);
            let rotation_a = body_a.delta_rotation * frame.rotation_a;
            let c = frame.separation(body_a, body_b, r_a, r_b) - rotation_a * self.linear_offset;
            let bias = inv_h * self.correction_factor * c;
            let velocity = frame.relative_velocity(body_a, body_b, r_a, r_b);

            let impulse = -(self.linear_mass * (velocity + bias));
            let old_impulse = self.linear_impulse;
            let max_impulse = h * self.max_force;
            self.linear_impulse = (old_impulse + impulse).clamp_length_max(max_impulse);

            frame.apply_linear_impulse(body_a, body_b, r_a, r_b, self.linear_impulse - old_impulse);
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

    fn frame() -> JointFrame {
        JointFrame {
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
        }
    }

    fn joint(def: MotorJointDef) -> MotorJoint {
        match def.build().kind {
            JointKind::Motor(joint) => joint,
            kind => panic!("expected a motor joint, got {kind:?}"),
        }
    }

    #[test]
    fn impulse_is_limited_by_max_force() {
        let mut joint = joint(MotorJointDef {
            linear_offset: Vector::new(10.0, 0.0),
            angular_offset: 10.0,
            max_force: 2.0,
            max_torque: 3.0,
            ..Default::default()
        });
        let frame = frame();
        let context = StepContext::new(0.5);
        joint.prepare(&frame, &context);

        let mut a = SolverBody::DUMMY;
        let mut b = SolverBody::DUMMY;
        joint.solve(&frame, &mut a, &mut b, &context, true);

        // Pulled toward the offset, but with at most `h * max_force` of impulse.
        assert_relative_eq!(b.linear_velocity.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(b.linear_velocity.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(b.angular_velocity, 1.5, epsilon = 1e-5);
        assert_relative_eq!(joint.constraint_force(2.0).x, 2.0, epsilon = 1e-5);
        assert_relative_eq!(joint.constraint_torque(2.0), 3.0, epsilon = 1e-5);
    }

    #[test]
    fn setters_clamp() {
        let mut joint = joint(MotorJointDef::default());
        joint.set_correction_factor(2.0);
        joint.set_max_force(-1.0);
        assert_eq!(joint.correction_factor(), 1.0);
        assert_eq!(joint.max_force(), 0.0);
    }
}
