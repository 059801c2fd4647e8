//! [`WheelJoint`] and [`WheelJointDef`].

use crate::{
    debug_render::{DebugDraw, HexColor},
    dynamics::solver::{StepContext, softness_parameters::SoftnessCoefficients, solver_body::SolverBody},
    id::BodyId,
    math::{RecipOrZero, Scalar, Vector, cross},
};

use super::{JointBlueprint, JointDrawContext, JointFrame, JointSolver, limit_impulse};

/// Parameters for creating a [`WheelJoint`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct WheelJointDef {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub local_anchor_a: Vector,
    pub local_anchor_b: Vector,
    /// The suspension axis in the frame of body A. Normalized when the joint is created.
    pub local_axis_a: Vector,
    /// The suspension spring stiffness, in N/m. Zero disables the spring.
    pub stiffness: Scalar,
    /// The suspension spring damping, in N·s/m.
    pub damping: Scalar,
    pub enable_limit: bool,
    pub lower_translation: Scalar,
    pub upper_translation: Scalar,
    pub enable_motor: bool,
    pub max_motor_torque: Scalar,
    /// The target angular speed of the wheel, in radians per second.
    pub motor_speed: Scalar,
    pub collide_connected: bool,
}

impl Default for WheelJointDef {
    fn default() -> Self {
        Self {
            body_a: BodyId::NULL,
            body_b: BodyId::NULL,
            local_anchor_a: Vector::ZERO,
            local_anchor_b: Vector::ZERO,
            local_axis_a: Vector::Y,
            stiffness: 0.0,
            damping: 0.0,
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            max_motor_torque: 0.0,
            motor_speed: 0.0,
            collide_connected: false,
        }
    }
}

impl WheelJointDef {
    pub fn new(body_a: BodyId, body_b: BodyId, local_anchor_a: Vector, local_axis_a: Vector) -> Self {
        Self {
            body_a,
            body_b,
            local_anchor_a,
            local_axis_a,
            ..Default::default()
        }
    }

    pub(crate) fn build(&self) -> JointBlueprint {
        let mut joint = WheelJoint {
            local_axis_a: self.local_axis_a.normalize_or(Vector::Y),
            stiffness: self.stiffness.max(0.0),
            damping: self.damping.max(0.0),
            enable_limit: self.enable_limit,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: self.enable_motor,
            max_motor_torque: self.max_motor_torque.max(0.0),
            motor_speed: self.motor_speed,
            perp_impulse: 0.0,
            motor_impulse: 0.0,
            spring_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            axis_a: Vector::Y,
            perp_mass: 0.0,
            motor_mass: 0.0,
            axial_mass: 0.0,
            spring_mass: 0.0,
            gamma: 0.0,
            bias_coefficient: 0.0,
        };
        joint.set_limits(self.lower_translation, self.upper_translation);

        JointBlueprint {
            kind: joint.into(),
            local_anchor_a: self.local_anchor_a,
            local_anchor_b: self.local_anchor_b,
            collide_connected: self.collide_connected,
            draw_size: 1.0,
        }
    }
}

/// A wheel on a suspension: body B slides along an axis fixed in body A and rotates freely.
///
/// The suspension has an optional spring and translation limits, and the rotation can be
/// driven by a motor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WheelJoint {
    local_axis_a: Vector,
    stiffness: Scalar,
    damping: Scalar,
    enable_limit: bool,
    lower_translation: Scalar,
    upper_translation: Scalar,
    enable_motor: bool,
    max_motor_torque: Scalar,
    motor_speed: Scalar,

    perp_impulse: Scalar,
    motor_impulse: Scalar,
    spring_impulse: Scalar,
    lower_impulse: Scalar,
    upper_impulse: Scalar,

    axis_a: Vector,
    perp_mass: Scalar,
    motor_mass: Scalar,
    axial_mass: Scalar,
    spring_mass: Scalar,
    gamma: Scalar,
    bias_coefficient: Scalar,
}

impl WheelJoint {
    #[inline]
    pub fn local_axis_a(&self) -> Vector {
        self.local_axis_a
    }

    #[inline]
    pub fn stiffness(&self) -> Scalar {
        self.stiffness
    }

    #[inline]
    pub fn damping(&self) -> Scalar {
        self.damping
    }

    /// Sets the suspension spring stiffness and damping.
    pub fn set_tuning(&mut self, stiffness: Scalar, damping: Scalar) {
        self.stiffness = stiffness.max(0.0);
        self.damping = damping.max(0.0);
    }

    pub fn set_stiffness(&mut self, stiffness: Scalar) {
        self.stiffness = stiffness.max(0.0);
    }

    pub fn set_damping(&mut self, damping: Scalar) {
        self.damping = damping.max(0.0);
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
        self.lower_translation
    }

    #[inline]
    pub fn upper_limit(&self) -> Scalar {
        self.upper_translation
    }

    /// Sets the suspension limits. The limits are ordered so that `lower <= upper`.
    pub fn set_limits(&mut self, lower: Scalar, upper: Scalar) {
        self.lower_translation = lower.min(upper);
        self.upper_translation = lower.max(upper);
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

    /// Returns the force applied during the last step.
    pub fn constraint_force(&self, inv_dt: Scalar) -> Vector {
        let axial_impulse = self.spring_impulse + self.lower_impulse - self.upper_impulse;
        inv_dt * (self.perp_impulse * self.axis_a.perp() + axial_impulse * self.axis_a)
    }

    /// Returns the torque applied during the last step.
    #[inline]
    pub fn constraint_torque(&self, inv_dt: Scalar) -> Scalar {
        inv_dt * self.motor_impulse
    }
}

impl JointSolver for WheelJoint {
    fn prepare(&mut self, frame: &JointFrame, context: &StepContext) {
        let (r_a, r_b) = (frame.anchor_a, frame.anchor_b);
        let (m_a, m_b) = (frame.inv_mass_a, frame.inv_mass_b);
        let (i_a, i_b) = (frame.inv_inertia_a, frame.inv_inertia_b);

        self.axis_a = frame.rotation_a * self.local_axis_a;
        let perp = self.axis_a.perp();
        let d = frame.delta_center + r_b - r_a;

        let s1 = cross(d + r_a, perp);
        let s2 = cross(r_b, perp);
        self.perp_mass = (m_a + m_b + i_a * s1 * s1 + i_b * s2 * s2).recip_or_zero();

        let a1 = cross(d + r_a, self.axis_a);
        let a2 = cross(r_b, self.axis_a);
        let ka = m_a + m_b + i_a * a1 * a1 + i_b * a2 * a2;
        self.axial_mass = ka.recip_or_zero();

        self.motor_mass = (i_a + i_b).recip_or_zero();

        if self.stiffness > 0.0 {
            let h = context.dt;
            self.gamma = (h * (self.damping + h * self.stiffness)).recip_or_zero();
            self.bias_coefficient = h * self.stiffness * self.gamma;
            self.spring_mass = (ka + self.gamma).recip_or_zero();
        } else {
            self.gamma = 0.0;
            self.bias_coefficient = 0.0;
            self.spring_mass = 0.0;
            self.spring_impulse = 0.0;
        }

        if !context.enable_warm_starting {
            self.perp_impulse = 0.0;
            self.motor_impulse = 0.0;
            self.spring_impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    fn warm_start(&mut self, frame: &JointFrame, body_a: &mut SolverBody, body_b: &mut SolverBody) {
        let (r_a, r_b) = frame.current_anchors(body_a, body_b);
        let d = frame.separation(body_a, body_b, r_a, r_b);
        let axis = body_a.delta_rotation * self.axis_a;
        let perp = axis.perp();

        let a1 = cross(d + r_a, axis);
        let a2 = cross(r_b, axis);
        let s1 = cross(d + r_a, perp);
        let s2 = cross(r_b, perp);

        let axial_impulse = self.spring_impulse + self.lower_impulse - self.upper_impulse;
        let linear = axial_impulse * axis + self.perp_impulse * perp;
        let moment_a = axial_impulse * a1 + self.perp_impulse * s1 + self.motor_impulse;
        let moment_b = axial_impulse * a2 + self.perp_impulse * s2 + self.motor_impulse;

        frame.apply_impulse_with_moments(body_a, body_b, linear, moment_a, moment_b);
    }

    fn solve(
        &mut self,
        frame: &JointFrame,
        body_a: &mut SolverBody,
        body_b: &mut SolverBody,
        context: &StepContext,
        use_bias: bool,
    ) {
        let (r_a, r_b) = frame.current_anchors(body_a, body_b);
        let d = frame.separation(body_a, body_b, r_a, r_b);
        let axis = body_a.delta_rotation * self.axis_a;
        let translation = axis.dot(d);

        let a1 = cross(d + r_a, axis);
        let a2 = cross(r_b, axis);

        let axial_speed = |a: &SolverBody, b: &SolverBody| {
            axis.dot(b.linear_velocity - a.linear_velocity) + a2 * b.angular_velocity - a1 * a.angular_velocity
        };

        // Motor
        if self.enable_motor {
            let speed = body_b.angular_velocity - body_a.angular_velocity - self.motor_speed;
            let impulse = -self.motor_mass * speed;
            let old_impulse = self.motor_impulse;
            let max_impulse = context.dt * self.max_motor_torque;
            self.motor_impulse = (old_impulse + impulse).clamp(-max_impulse, max_impulse);

            frame.apply_angular_impulse(body_a, body_b, self.motor_impulse - old_impulse);
        }

        // Suspension spring
        if self.stiffness > 0.0 {
            let bias = self.bias_coefficient * translation;
            let speed = axial_speed(body_a, body_b);
            let impulse = -self.spring_mass * (speed + bias + self.gamma * self.spring_impulse);
            self.spring_impulse += impulse;

            frame.apply_impulse_with_moments(body_a, body_b, impulse * axis, impulse * a1, impulse * a2);
        }

        if self.enable_limit {
            // Lower limit
            {
                let c = translation - self.lower_translation;
                let speed = axial_speed(body_a, body_b);
                let impulse = limit_impulse(c, speed, self.lower_impulse, self.axial_mass, context, use_bias);
                let new_impulse = (self.lower_impulse + impulse).max(0.0);
                let impulse = new_impulse - self.lower_impulse;
                self.lower_impulse = new_impulse;

                frame.apply_impulse_with_moments(body_a, body_b, impulse * axis, impulse * a1, impulse * a2);
            }

            // Upper limit
            {
                let c = self.upper_translation - translation;
                let speed = -axial_speed(body_a, body_b);
                let impulse = limit_impulse(c, speed, self.upper_impulse, self.axial_mass, context, use_bias);
                let new_impulse = (self.upper_impulse + impulse).max(0.0);
                let impulse = new_impulse - self.upper_impulse;
                self.upper_impulse = new_impulse;

                frame.apply_impulse_with_moments(body_a, body_b, -impulse * axis, -impulse * a1, -impulse * a2);
            }
        }

        // Point to line constraint
        {
            let perp = axis.perp();
            let s1 = cross(d + r_a, perp);
            let s2 = cross(r_b, perp);
            let speed = perp.dot(body_b.linear_velocity - body_a.linear_velocity) + s2 * body_b.angular_velocity
                - s1 * body_a.angular_velocity;

            let (bias, softness) = if use_bias {
                let c = perp.dot(d);
                (context.joint_softness.bias * c, context.joint_softness)
            } else {
                (0.0, SoftnessCoefficients::RIGID)
            };

            let impulse = -softness.mass_scale * self.perp_mass * (speed + bias)
                - softness.impulse_scale * self.perp_impulse;
            self.perp_impulse += impulse;

            frame.apply_impulse_with_moments(body_a, body_b, impulse * perp, impulse * s1, impulse * s2);
        }
    }

    fn draw(&self, draw: &mut dyn DebugDraw, context: &JointDrawContext) {
        let (p_a, p_b) = (context.anchor_a, context.anchor_b);
        let axis = context.transform_a.rotation * self.local_axis_a;
        let light_gray = HexColor::from_rgb(0.7, 0.7, 0.7);
        let blue = HexColor::from_rgb(0.3, 0.3, 0.9);

        draw.draw_segment(p_a, p_b, blue);

        if self.enable_limit {
            let lower = p_a + self.lower_translation * axis;
            let upper = p_a + self.upper_translation * axis;
            let perp = axis.perp();
            draw.draw_segment(lower, upper, light_gray);
            draw.draw_segment(lower - 0.1 * perp, lower + 0.1 * perp, HexColor::GREEN);
            draw.draw_segment(upper - 0.1 * perp, upper + 0.1 * perp, HexColor::RED);
        } else {
            draw.draw_segment(p_a - axis, p_a + axis, light_gray);
        }

        draw.draw_point(p_a, 5.0, light_gray);
        draw.draw_point(p_b, 5.0, blue);
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

    fn joint(def: WheelJointDef) -> WheelJoint {
        match def.build().kind {
            JointKind::Wheel(joint) => joint,
            kind => panic!("expected a wheel joint, got {kind:?}"),
        }
    }

    #[test]
    fn wheel_spins_and_slides_along_axis() {
        let mut joint = joint(WheelJointDef::default());
        let frame = frame();
        let context = StepContext::new(1.0 / 60.0);
        joint.prepare(&frame, &context);

        let mut a = SolverBody::DUMMY;
        let mut b = SolverBody {
            linear_velocity: Vector::new(4.0, 2.0),
            angular_velocity: 5.0,
            ..SolverBody::DUMMY
        };
        joint.solve(&frame, &mut a, &mut b, &context, false);

        // The default axis is vertical, so only the horizontal motion is removed.
        assert_relative_eq!(b.linear_velocity.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(b.linear_velocity.y, 2.0, epsilon = 1e-5);
        assert_relative_eq!(b.angular_velocity, 5.0, epsilon = 1e-5);
    }

    #[test]
    fn motor_drives_rotation() {
        let mut joint = joint(WheelJointDef {
            enable_motor: true,
            motor_speed: -2.0,
            max_motor_torque: 1000.0,
            ..Default::default()
        });
        let frame = frame();
        let context = StepContext::new(1.0 / 60.0);
        joint.prepare(&frame, &context);

        let mut a = SolverBody::DUMMY;
        let mut b = SolverBody::DUMMY;
        joint.solve(&frame, &mut a, &mut b, &context, true);

        assert_relative_eq!(b.angular_velocity, -2.0, epsilon = 1e-5);
        assert_relative_eq!(joint.motor_torque(60.0), -120.0, epsilon = 1e-3);
    }

    #[test]
    fn spring_pushes_toward_rest() {
        let mut joint = joint(WheelJointDef {
            stiffness: 100.0,
            damping: 1.0,
            ..Default::default()
        });
        // Body B sits below its anchor on the suspension axis.
        let frame = JointFrame {
            center_b: Vector::new(0.0, -0.5),
            delta_center: Vector::new(0.0, -0.5),
            ..frame()
        };
        let context = StepContext::new(1.0 / 60.0);
        joint.prepare(&frame, &context);

        let mut a = SolverBody::DUMMY;
        let mut b = SolverBody::DUMMY;
        joint.solve(&frame, &mut a, &mut b, &context, true);

        assert!(b.linear_velocity.y > 0.0);
    }
}
