//! [`RevoluteJoint`] and [`RevoluteJointDef`].

use crate::{
    debug_render::{DebugDraw, HexColor},
    dynamics::solver::{StepContext, softness_parameters::SoftnessCoefficients, solver_body::SolverBody},
    id::BodyId,
    math::{PI, Rotation, Scalar, Vector, solve22},
};

use super::{JointBlueprint, JointDrawContext, JointFrame, JointSolver, limit_impulse};

/// Parameters for creating a [`RevoluteJoint`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct RevoluteJointDef {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub local_anchor_a: Vector,
    pub local_anchor_b: Vector,
    /// The angle of body B relative to body A that is considered zero.
    pub reference_angle: Scalar,
    pub enable_limit: bool,
    /// The lower angle limit, in radians.
    pub lower_angle: Scalar,
    /// The upper angle limit, in radians.
    pub upper_angle: Scalar,
    pub enable_motor: bool,
    /// The maximum torque of the motor.
    pub max_motor_torque: Scalar,
    /// The target angular speed of the motor, in radians per second.
    pub motor_speed: Scalar,
    /// The radius of the joint's debug visuals.
    pub draw_size: Scalar,
    pub collide_connected: bool,
}

impl Default for RevoluteJointDef {
    fn default() -> Self {
        Self {
            body_a: BodyId::NULL,
            body_b: BodyId::NULL,
            local_anchor_a: Vector::ZERO,
            local_anchor_b: Vector::ZERO,
            reference_angle: 0.0,
            enable_limit: false,
            lower_angle: 0.0,
            upper_angle: 0.0,
            enable_motor: false,
            max_motor_torque: 0.0,
            motor_speed: 0.0,
            draw_size: 0.25,
            collide_connected: false,
        }
    }
}

impl RevoluteJointDef {
    /// Creates a definition pinning `body_a` and `body_b` together at the given local anchors.
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
        let mut joint = RevoluteJoint {
            reference_angle: self.reference_angle,
            enable_limit: self.enable_limit,
            lower_angle: 0.0,
            upper_angle: 0.0,
            enable_motor: self.enable_motor,
            max_motor_torque: self.max_motor_torque.max(0.0),
            motor_speed: self.motor_speed,
            linear_impulse: Vector::ZERO,
            motor_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            axial_mass: 0.0,
            axial_coupling: Vector::ZERO,
            angle: 0.0,
        };
        joint.set_limits(self.lower_angle, self.upper_angle);

        JointBlueprint {
            kind: joint.into(),
            local_anchor_a: self.local_anchor_a,
            local_anchor_b: self.local_anchor_b,
            collide_connected: self.collide_connected,
            draw_size: self.draw_size,
        }
    }
}

/// Pins two bodies together at a shared anchor, letting them rotate relative to each other.
///
/// The rotation can be limited to a range of angles and driven by a motor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RevoluteJoint {
    reference_angle: Scalar,
    enable_limit: bool,
    lower_angle: Scalar,
    upper_angle: Scalar,
    enable_motor: bool,
    max_motor_torque: Scalar,
    motor_speed: Scalar,

    linear_impulse: Vector,
    motor_impulse: Scalar,
    lower_impulse: Scalar,
    upper_impulse: Scalar,

    axial_mass: Scalar,
    /// The anchor impulse applied with a unit axial impulse, so that the motor and the limits
    /// rotate the bodies about the anchor instead of pulling the anchors apart.
    axial_coupling: Vector,
    /// The joint angle at the start of the step.
    angle: Scalar,
}

impl RevoluteJoint {
    #[inline]
    pub fn reference_angle(&self) -> Scalar {
        self.reference_angle
    }

    /// Computes the joint angle from the rotations of the bodies.
    #[inline]
    pub fn joint_angle(&self, rotation_a: Rotation, rotation_b: Rotation) -> Scalar {
        let angle = rotation_a.angle_between(rotation_b) - self.reference_angle;
        Rotation::radians(angle).as_radians()
    }

    #[inline]
    pub fn is_limit_enabled(&self) -> bool {
        self.enable_limit
    }

    pub fn enable_limit(&mut self, enable: bool) {
        if enable != self.enable_limit {
            self.enable_limit = enable;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    #[inline]
    pub fn lower_limit(&self) -> Scalar {
        self.lower_angle
    }

    #[inline]
    pub fn upper_limit(&self) -> Scalar {
        self.upper_angle
    }

    /// Sets the angle limits. The limits are ordered and clamped to `[-π, π]`.
    pub fn set_limits(&mut self, lower: Scalar, upper: Scalar) {
        self.lower_angle = lower.min(upper).clamp(-PI, PI);
        self.upper_angle = lower.max(upper).clamp(-PI, PI);
        self.lower_impulse = 0.0;
        self.upper_impulse = 0.0;
    }

    #[inline]
    pub fn is_motor_enabled(&self) -> bool {
        self.enable_motor
    }

    pub fn enable_motor(&mut self, enable: bool) {
        if enable != self.enable_motor {
            self.enable_motor = enable;
            self.motor_impulse = 0.0;
        }
    }

    #[inline]
    pub fn motor_speed(&self) -> Scalar {
        self.motor_speed
    }

    #[inline]
    pub fn set_motor_speed(&mut self, speed: Scalar) {
        self.motor_speed = speed;
    }

    #[inline]
    pub fn max_motor_torque(&self) -> Scalar {
        self.max_motor_torque
    }

    #[inline]
    pub fn set_max_motor_torque(&mut self, torque: Scalar) {
        self.max_motor_torque = torque.max(0.0);
    }

    /// Returns the torque applied by the motor during the last step.
    #[inline]
    pub fn motor_torque(&self, inv_dt: Scalar) -> Scalar {
        inv_dt * self.motor_impulse
    }

    /// Returns the force applied at the anchor during the last step.
    #[inline]
    pub fn constraint_force(&self, inv_dt: Scalar) -> Vector {
        inv_dt * self.linear_impulse
    }

    /// Returns the torque applied by the motor and the limits during the last step.
    #[inline]
    pub fn constraint_torque(&self, inv_dt: Scalar) -> Scalar {
        inv_dt * (self.motor_impulse + self.lower_impulse - self.upper_impulse)
    }

    /// Applies an impulse to the relative rotation of the bodies, together with
    /// the anchor impulse that leaves the relative anchor velocity unchanged.
    #[inline]
    fn apply_axial_impulse(&self, frame: &JointFrame, body_a: &mut SolverBody, body_b: &mut SolverBody, impulse: Scalar) {
        let (r_a, r_b) = frame.current_anchors(body_a, body_b);
        frame.apply_linear_impulse(body_a, body_b, r_a, r_b, impulse * self.axial_coupling);
        frame.apply_angular_impulse(body_a, body_b, impulse);
    }
}

impl JointSolver for RevoluteJoint {
    fn prepare(&mut self, frame: &JointFrame, context: &StepContext) {
        self.angle = self.joint_angle(frame.rotation_a, frame.rotation_b);

        // The axial rows are solved with the anchors held together. The effective mass is then
        // the rotational mass of the bodies about the anchor, not about their centers.
        let (r_a, r_b) = (frame.anchor_a, frame.anchor_b);
        let (i_a, i_b) = (frame.inv_inertia_a, frame.inv_inertia_b);
        let anchor_response = Vector::new(-r_a.y * i_a - r_b.y * i_b, r_a.x * i_a + r_b.x * i_b);
        self.axial_coupling = -solve22(frame.point_mass_matrix(r_a, r_b), anchor_response);
        let k = i_a + i_b + anchor_response.dot(self.axial_coupling);
        self.axial_mass = if k > 0.0 { k.recip() } else { 0.0 };

        if !context.enable_warm_starting {
            self.linear_impulse = Vector::ZERO;
            self.motor_impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    fn warm_start(&mut self, frame: &JointFrame, body_a: &mut SolverBody, body_b: &mut SolverBody) {
        let (r_a, r_b) = frame.current_anchors(body_a, body_b);
        let axial_impulse = self.motor_impulse + self.lower_impulse - self.upper_impulse;
        frame.apply_linear_impulse(body_a, body_b, r_a, r_b, self.linear_impulse);
        self.apply_axial_impulse(frame, body_a, body_b, axial_impulse);
    }

    fn solve(
        &mut self,
        frame: &JointFrame,
        body_a: &mut SolverBody,
        body_b: &mut SolverBody,
        context: &StepContext,
        use_bias: bool,
    ) {
        let fixed_rotation = frame.inv_inertia_a + frame.inv_inertia_b == 0.0;

        if self.enable_motor && !fixed_rotation {
            let speed = body_b.angular_velocity - body_a.angular_velocity - self.motor_speed;
            let impulse = -self.axial_mass * speed;
            let old_impulse = self.motor_impulse;
            let max_impulse = context.dt * self.max_motor_torque;
            self.motor_impulse = (old_impulse + impulse).clamp(-max_impulse, max_impulse);

            self.apply_axial_impulse(frame, body_a, body_b, self.motor_impulse - old_impulse);
        }

        if self.enable_limit && !fixed_rotation {
            let joint_angle = self.angle + frame.delta_angle(body_a, body_b);

            // Lower limit
            {
                let c = joint_angle - self.lower_angle;
                let speed = body_b.angular_velocity - body_a.angular_velocity;
                let impulse = limit_impulse(c, speed, self.lower_impulse, self.axial_mass, context, use_bias);
                let new_impulse = (self.lower_impulse + impulse).max(0.0);
                let impulse = new_impulse - self.lower_impulse;
                self.lower_impulse = new_impulse;

                self.apply_axial_impulse(frame, body_a, body_b, impulse);
            }

            // Upper limit, with the signs flipped so that the impulse stays positive.
            {
                let c = self.upper_angle - joint_angle;
                let speed = body_a.angular_velocity - body_b.angular_velocity;
                let impulse = limit_impulse(c, speed, self.upper_impulse, self.axial_mass, context, use_bias);
                let new_impulse = (self.upper_impulse + impulse).max(0.0);
                let impulse = new_impulse - self.upper_impulse;
                self.upper_impulse = new_impulse;

                self.apply_axial_impulse(frame, body_a, body_b, -impulse);
            }
        }

        // Point constraint
        {
            let (r_a, r_b) = frame.current_anchors(body_a, body_b);
            let velocity = frame.relative_velocity(body_a, body_b, r_a, r_b);

            let (bias, softness) = if use_bias {
                let separation = frame.separation(body_a, body_b, r_a, r_b);
                (context.joint_softness.bias * separation, context.joint_softness)
            } else {
                (Vector::ZERO, SoftnessCoefficients::RIGID)
            };

            let k = frame.point_mass_matrix(r_a, r_b);
            let b = solve22(k, velocity + bias);
            let impulse = -softness.mass_scale * b - softness.impulse_scale * self.linear_impulse;
            self.linear_impulse += impulse;

            frame.apply_linear_impulse(body_a, body_b, r_a, r_b, impulse);
        }
    }

    fn draw(&self, draw: &mut dyn DebugDraw, context: &JointDrawContext) {
        let p_b = context.anchor_b;
        let radius = context.draw_size;
        let gray = HexColor::from_rgb(0.7, 0.7, 0.7);
        let rotation_a = context.transform_a.rotation;
        let arm = |angle: Scalar| rotation_a * (Rotation::radians(angle) * Vector::new(radius, 0.0));

        draw.draw_circle(p_b, radius, gray);

        let angle = self.joint_angle(context.transform_a.rotation, context.transform_b.rotation);
        draw.draw_segment(p_b, p_b + arm(angle), gray);

        if self.enable_limit {
            draw.draw_segment(p_b, p_b + arm(self.lower_angle), HexColor::GREEN);
            draw.draw_segment(p_b, p_b + arm(self.upper_angle), HexColor::RED);
        }

        context.draw_default(draw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::{joints::JointKind, solver::solver_body::SolverBodyIndex};
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
            anchor_b: Vector::new(-1.0, 0.0),
            center_a: Vector::ZERO,
            center_b: Vector::new(1.0, 0.0),
            delta_center: Vector::new(1.0, 0.0),
            rotation_a: Rotation::IDENTITY,
            rotation_b: Rotation::IDENTITY,
        }
    }

    fn joint(def: RevoluteJointDef) -> RevoluteJoint {
        match def.build().kind {
            JointKind::Revolute(joint) => joint,
            kind => panic!("expected a revolute joint, got {kind:?}"),
        }
    }

    #[test]
    fn limits_are_ordered_and_clamped() {
        let joint = joint(RevoluteJointDef {
            lower_angle: 4.0,
            upper_angle: -0.5,
            ..Default::default()
        });
        assert_eq!(joint.lower_limit(), -0.5);
        assert_eq!(joint.upper_limit(), PI);
    }

    #[test]
    fn anchor_velocity_is_removed() {
        let mut joint = joint(RevoluteJointDef::default());
        let frame = frame();
        let context = StepContext::new(1.0 / 60.0);
        joint.prepare(&frame, &context);

        let mut a = SolverBody::DUMMY;
        let mut b = SolverBody {
            linear_velocity: Vector::new(0.0, -1.0),
            ..SolverBody::DUMMY
        };
        for _ in 0..20 {
            joint.solve(&frame, &mut a, &mut b, &context, false);
        }

        // Body B swings around the pivot, so its anchor is at rest.
        let anchor_velocity = b.velocity_at_point(frame.anchor_b);
        assert_relative_eq!(anchor_velocity.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(anchor_velocity.y, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn motor_turns_an_offset_body_about_the_anchor() {
        let mut joint = joint(RevoluteJointDef {
            enable_motor: true,
            motor_speed: 1.0,
            max_motor_torque: 1000.0,
            ..Default::default()
        });
        let frame = frame();
        let context = StepContext::new(1.0 / 60.0);
        joint.prepare(&frame, &context);

        // Unit mass and inertia one unit away from the anchor.
        assert_relative_eq!(joint.axial_mass, 2.0, epsilon = 1e-5);

        let mut a = SolverBody::DUMMY;
        let mut b = SolverBody::DUMMY;
        joint.solve(&frame, &mut a, &mut b, &context, false);

        assert_relative_eq!(b.angular_velocity, 1.0, epsilon = 1e-5);
        let anchor_velocity = b.velocity_at_point(frame.anchor_b);
        assert_relative_eq!(anchor_velocity.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(anchor_velocity.y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn motor_torque_is_limited() {
        let mut joint = joint(RevoluteJointDef {
            enable_motor: true,
            motor_speed: 10.0,
            max_motor_torque: 6.0,
            ..Default::default()
        });
        let frame = JointFrame {
            anchor_b: Vector::ZERO,
            center_b: Vector::ZERO,
            delta_center: Vector::ZERO,
            ..frame()
        };
        let context = StepContext::new(0.5);
        joint.prepare(&frame, &context);

        let mut a = SolverBody::DUMMY;
        let mut b = SolverBody::DUMMY;
        joint.solve(&frame, &mut a, &mut b, &context, true);

        assert_relative_eq!(b.angular_velocity, 3.0, epsilon = 1e-5);
        assert_relative_eq!(joint.motor_torque(2.0), 6.0, epsilon = 1e-5);
    }
}
