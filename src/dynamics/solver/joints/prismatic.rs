//! [`PrismaticJoint`] and [`PrismaticJointDef`].

use crate::{
    debug_render::{DebugDraw, HexColor},
    dynamics::solver::{StepContext, softness_parameters::SoftnessCoefficients, solver_body::SolverBody},
    id::BodyId,
    math::{Matrix, RecipOrZero, Scalar, Vector, cross, solve22},
};

use super::{JointBlueprint, JointDrawContext, JointFrame, JointSolver, limit_impulse};

/// Parameters for creating a [`PrismaticJoint`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PrismaticJointDef {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub local_anchor_a: Vector,
    pub local_anchor_b: Vector,
    /// The translation axis in the frame of body A. Normalized when the joint is created.
    pub local_axis_a: Vector,
    /// The angle of body B relative to body A that is held by the joint.
    pub reference_angle: Scalar,
    pub enable_limit: bool,
    pub lower_translation: Scalar,
    pub upper_translation: Scalar,
    pub enable_motor: bool,
    pub max_motor_force: Scalar,
    /// The target speed of the motor along the axis.
    pub motor_speed: Scalar,
    pub collide_connected: bool,
}

impl Default for PrismaticJointDef {
    fn default() -> Self {
        Self {
            body_a: BodyId::NULL,
            body_b: BodyId::NULL,
            local_anchor_a: Vector::ZERO,
            local_anchor_b: Vector::ZERO,
            local_axis_a: Vector::X,
            reference_angle: 0.0,
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            max_motor_force: 0.0,
            motor_speed: 0.0,
            collide_connected: false,
        }
    }
}

impl PrismaticJointDef {
    pub fn new(body_a: BodyId, body_b: BodyId, local_axis_a: Vector) -> Self {
        Self {
            body_a,
            body_b,
            local_axis_a,
            ..Default::default()
        }
    }

    pub(crate) fn build(&self) -> JointBlueprint {
        let mut joint = PrismaticJoint {
            local_axis_a: self.local_axis_a.normalize_or(Vector::X),
            reference_angle: self.reference_angle,
            enable_limit: self.enable_limit,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: self.enable_motor,
            max_motor_force: self.max_motor_force.max(0.0),
            motor_speed: self.motor_speed,
            impulse: Vector::ZERO,
            motor_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            axis_a: Vector::X,
            axial_mass: 0.0,
            angle: 0.0,
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

/// Lets body B slide along an axis fixed in body A, with no relative rotation.
///
/// The translation can be limited to a range and driven by a motor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PrismaticJoint {
    local_axis_a: Vector,
    reference_angle: Scalar,
    enable_limit: bool,
    lower_translation: Scalar,
    upper_translation: Scalar,
    enable_motor: bool,
    max_motor_force: Scalar,
    motor_speed: Scalar,

    /// The perpendicular and angular impulses.
    impulse: Vector,
    motor_impulse: Scalar,
    lower_impulse: Scalar,
    upper_impulse: Scalar,

    /// The world-space axis at the start of the step.
    axis_a: Vector,
    axial_mass: Scalar,
    angle: Scalar,
}

impl PrismaticJoint {
    /// Returns the normalized translation axis in the frame of body A.
    #[inline]
    pub fn local_axis_a(&self) -> Vector {
        self.local_axis_a
    }

    #[inline]
    pub fn reference_angle(&self) -> Scalar {
        self.reference_angle
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

    /// Sets the translation limits. The limits are ordered so that `lower <= upper`.
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
    pub fn max_motor_force(&self) -> Scalar {
        self.max_motor_force
    }

    #[inline]
    pub fn set_max_motor_force(&mut self, force: Scalar) {
        self.max_motor_force = force.max(0.0);
    }

    /// Returns the force applied by the motor during the last step.
    #[inline]
    pub fn motor_force(&self, inv_dt: Scalar) -> Scalar {
        inv_dt * self.motor_impulse
    }

    /// Returns the force applied during the last step.
    pub fn constraint_force(&self, inv_dt: Scalar) -> Vector {
        let axial_impulse = self.motor_impulse + self.lower_impulse - self.upper_impulse;
        inv_dt * (self.impulse.x * self.axis_a.perp() + axial_impulse * self.axis_a)
    }

    /// Returns the torque applied during the last step.
    #[inline]
    pub fn constraint_torque(&self, inv_dt: Scalar) -> Scalar {
        inv_dt * self.impulse.y
    }
}

impl JointSolver for PrismaticJoint {
    fn prepare(&mut self, frame: &JointFrame, context: &StepContext) {
        let (r_a, r_b) = (frame.anchor_a, frame.anchor_b);
        self.axis_a = frame.rotation_a * self.local_axis_a;
        self.angle = frame.rotation_a.angle_between(frame.rotation_b) - self.reference_angle;

        let d = frame.delta_center + r_b - r_a;
        let a1 = cross(d + r_a, self.axis_a);
        let a2 = cross(r_b, self.axis_a);
        let k = frame.inv_mass_a
            + frame.inv_mass_b
            + frame.inv_inertia_a * a1 * a1
            + frame.inv_inertia_b * a2 * a2;
        self.axial_mass = k.recip_or_zero();

        if !context.enable_warm_starting {
            self.impulse = Vector::ZERO;
            self.motor_impulse = 0.0;
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

        let axial_impulse = self.motor_impulse + self.lower_impulse - self.upper_impulse;
        let linear = axial_impulse * axis + self.impulse.x * perp;
        let moment_a = axial_impulse * a1 + self.impulse.x * s1 + self.impulse.y;
        let moment_b = axial_impulse * a2 + self.impulse.x * s2 + self.impulse.y;

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

        if self.enable_motor {
            let speed = axial_speed(body_a, body_b);
            let impulse = self.axial_mass * (self.motor_speed - speed);
            let old_impulse = self.motor_impulse;
            let max_impulse = context.dt * self.max_motor_force;
            self.motor_impulse = (old_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.motor_impulse - old_impulse;

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

        // Solve the perpendicular and angular constraints as a block.
        {
            let perp = axis.perp();
            let s1 = cross(d + r_a, perp);
            let s2 = cross(r_b, perp);

            let velocity = Vector::new(
                perp.dot(body_b.linear_velocity - body_a.linear_velocity) + s2 * body_b.angular_velocity
                    - s1 * body_a.angular_velocity,
                body_b.angular_velocity - body_a.angular_velocity,
            );

            let (bias, softness) = if use_bias {
                let c = Vector::new(perp.dot(d), self.angle + frame.delta_angle(body_a, body_b));
                (context.joint_softness.bias * c, context.joint_softness)
            } else {
                (Vector::ZERO, SoftnessCoefficients::RIGID)
            };

            let (m_a, m_b) = (frame.inv_mass_a, frame.inv_mass_b);
            let (i_a, i_b) = (frame.inv_inertia_a, frame.inv_inertia_b);
            let k11 = m_a + m_b + i_a * s1 * s1 + i_b * s2 * s2;
            let k12 = i_a * s1 + i_b * s2;
            let mut k22 = i_a + i_b;
            if k22 == 0.0 {
                // For bodies with fixed rotation.
                k22 = 1.0;
            }
            let k = Matrix::from_cols(Vector::new(k11, k12), Vector::new(k12, k22));

            let b = solve22(k, velocity + bias);
            let impulse = -softness.mass_scale * b - softness.impulse_scale * self.impulse;
            self.impulse += impulse;

            let linear = impulse.x * perp;
            let moment_a = impulse.x * s1 + impulse.y;
            let moment_b = impulse.x * s2 + impulse.y;
            frame.apply_impulse_with_moments(body_a, body_b, linear, moment_a, moment_b);
        }
    }

    fn draw(&self, draw: &mut dyn DebugDraw, context: &JointDrawContext) {
        let (p_a, p_b) = (context.anchor_a, context.anchor_b);
        let axis = context.transform_a.rotation * self.local_axis_a;
        let light_gray = HexColor::from_rgb(0.7, 0.7, 0.7);

        draw.draw_segment(p_a, p_b, HexColor::from_rgb(0.4, 0.4, 0.4));

        if self.enable_limit {
            let lower = p_a + self.lower_translation * axis;
            let upper = p_a + self.upper_translation * axis;
            let perp = axis.perp();
            draw.draw_segment(lower, upper, light_gray);
            draw.draw_segment(lower - 0.5 * perp, lower + 0.5 * perp, HexColor::GREEN);
            draw.draw_segment(upper - 0.5 * perp, upper + 0.5 * perp, HexColor::RED);
        } else {
            draw.draw_segment(p_a - axis, p_a + axis, light_gray);
        }

        draw.draw_point(p_a, 5.0, light_gray);
        draw.draw_point(p_b, 5.0, HexColor::from_rgb(0.3, 0.3, 0.9));
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

    fn joint(def: PrismaticJointDef) -> PrismaticJoint {
        match def.build().kind {
            JointKind::Prismatic(joint) => joint,
            kind => panic!("expected a prismatic joint, got {kind:?}"),
        }
    }

    #[test]
    fn axis_is_normalized() {
        let joint = joint(PrismaticJointDef {
            local_axis_a: Vector::new(0.0, 3.0),
            ..Default::default()
        });
        assert_eq!(joint.local_axis_a(), Vector::Y);
    }

    #[test]
    fn only_axial_motion_remains() {
        let mut joint = joint(PrismaticJointDef::default());
        let frame = frame();
        let context = StepContext::new(1.0 / 60.0);
        joint.prepare(&frame, &context);

        let mut a = SolverBody::DUMMY;
        let mut b = SolverBody {
            linear_velocity: Vector::new(2.0, 3.0),
            angular_velocity: 1.0,
            ..SolverBody::DUMMY
        };
        joint.solve(&frame, &mut a, &mut b, &context, false);

        assert_relative_eq!(b.linear_velocity.x, 2.0, epsilon = 1e-5);
        assert_relative_eq!(b.linear_velocity.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(b.angular_velocity, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn upper_limit_stops_motion() {
        let mut joint = joint(PrismaticJointDef {
            enable_limit: true,
            lower_translation: -1.0,
            upper_translation: 0.0,
            ..Default::default()
        });
        let frame = frame();
        let context = StepContext::new(1.0 / 60.0);
        joint.prepare(&frame, &context);

        let mut a = SolverBody::DUMMY;
        let mut b = SolverBody {
            linear_velocity: Vector::new(5.0, 0.0),
            ..SolverBody::DUMMY
        };
        joint.solve(&frame, &mut a, &mut b, &context, false);

        assert_relative_eq!(b.linear_velocity.x, 0.0, epsilon = 1e-5);
        assert!(joint.constraint_force(60.0).x < 0.0);
    }
}
