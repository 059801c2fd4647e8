//! [`DistanceJoint`] and [`DistanceJointDef`].

use crate::{
    constants::LINEAR_SLOP,
    debug_render::{DebugDraw, HexColor},
    dynamics::solver::{
        StepContext,
        softness_parameters::{SoftnessCoefficients, SoftnessParameters},
        solver_body::SolverBody,
    },
    id::BodyId,
    math::{HUGE, RecipOrZero, Scalar, Vector, cross, normalize_and_length},
};

use super::{JointBlueprint, JointDrawContext, JointFrame, JointSolver, limit_impulse};

/// Parameters for creating a [`DistanceJoint`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DistanceJointDef {
    pub body_a: BodyId,
    pub body_b: BodyId,
    /// The anchor on body A, relative to its origin.
    pub local_anchor_a: Vector,
    /// The anchor on body B, relative to its origin.
    pub local_anchor_b: Vector,
    /// The rest length of the joint.
    pub length: Scalar,
    /// The minimum length. Clamped to a small positive value.
    pub min_length: Scalar,
    /// The maximum length.
    pub max_length: Scalar,
    /// The spring frequency. Zero makes the joint rigid.
    pub hertz: Scalar,
    /// The spring damping ratio.
    pub damping_ratio: Scalar,
    /// Whether the connected bodies collide with each other.
    pub collide_connected: bool,
}

impl Default for DistanceJointDef {
    fn default() -> Self {
        Self {
            body_a: BodyId::NULL,
            body_b: BodyId::NULL,
            local_anchor_a: Vector::ZERO,
            local_anchor_b: Vector::ZERO,
            length: 1.0,
            min_length: 0.0,
            max_length: HUGE,
            hertz: 0.0,
            damping_ratio: 0.0,
            collide_connected: false,
        }
    }
}

impl DistanceJointDef {
    /// Creates a definition connecting the given bodies at their origins.
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            ..Default::default()
        }
    }

    pub(crate) fn build(&self) -> JointBlueprint {
        let mut joint = DistanceJoint {
            length: 1.0,
            min_length: 0.0,
            max_length: HUGE,
            hertz: self.hertz.max(0.0),
            damping_ratio: self.damping_ratio.max(0.0),
            impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            axial_mass: 0.0,
            distance_softness: SoftnessCoefficients::RIGID,
        };
        joint.set_length(self.length, self.min_length, self.max_length);

        JointBlueprint {
            kind: joint.into(),
            local_anchor_a: self.local_anchor_a,
            local_anchor_b: self.local_anchor_b,
            collide_connected: self.collide_connected,
            draw_size: 1.0,
        }
    }
}

/// Keeps the anchors of two bodies at a distance from each other, optionally with a spring
/// and a range of allowed lengths.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceJoint {
    length: Scalar,
    min_length: Scalar,
    max_length: Scalar,
    hertz: Scalar,
    damping_ratio: Scalar,

    impulse: Scalar,
    lower_impulse: Scalar,
    upper_impulse: Scalar,

    axial_mass: Scalar,
    distance_softness: SoftnessCoefficients,
}

impl DistanceJoint {
    /// Returns the rest length.
    #[inline]
    pub fn length(&self) -> Scalar {
        self.length
    }

    /// Returns the minimum length.
    #[inline]
    pub fn min_length(&self) -> Scalar {
        self.min_length
    }

    /// Returns the maximum length.
    #[inline]
    pub fn max_length(&self) -> Scalar {
        self.max_length
    }

    /// Returns the spring frequency in Hertz.
    #[inline]
    pub fn hertz(&self) -> Scalar {
        self.hertz
    }

    /// Returns the spring damping ratio.
    #[inline]
    pub fn damping_ratio(&self) -> Scalar {
        self.damping_ratio
    }

    /// Sets the rest, minimum, and maximum lengths. All lengths are clamped to `[LINEAR_SLOP, HUGE]`,
    /// and the maximum is kept at or above the minimum.
    pub fn set_length(&mut self, length: Scalar, min_length: Scalar, max_length: Scalar) {
        self.length = length.clamp(LINEAR_SLOP, HUGE);
        self.min_length = min_length.clamp(LINEAR_SLOP, HUGE);
        self.max_length = max_length.clamp(LINEAR_SLOP, HUGE).max(self.min_length);
        self.impulse = 0.0;
        self.lower_impulse = 0.0;
        self.upper_impulse = 0.0;
    }

    /// Sets the spring frequency and damping ratio. A frequency of zero makes the joint rigid.
    pub fn set_tuning(&mut self, hertz: Scalar, damping_ratio: Scalar) {
        self.hertz = hertz.max(0.0);
        self.damping_ratio = damping_ratio.max(0.0);
    }

    /// Returns `true` if the joint has a range of allowed lengths.
    #[inline]
    pub fn has_limits(&self) -> bool {
        self.min_length < self.max_length
    }

    /// Returns `true` if the joint acts as a spring rather than a rigid rod.
    #[inline]
    pub fn is_spring(&self) -> bool {
        self.hertz > 0.0 && self.has_limits()
    }

    /// Returns the force applied along the joint axis during the last step.
    #[inline]
    pub fn constraint_force(&self, inv_dt: Scalar) -> Scalar {
        (self.impulse + self.lower_impulse - self.upper_impulse) * inv_dt
    }
}

impl JointSolver for DistanceJoint {
    fn prepare(&mut self, frame: &JointFrame, context: &StepContext) {
        let (r_a, r_b) = (frame.anchor_a, frame.anchor_b);
        let axis = (frame.delta_center + r_b - r_a).normalize_or_zero();

        let cr_a = cross(r_a, axis);
        let cr_b = cross(r_b, axis);
        let k = frame.inv_mass_a
            + frame.inv_mass_b
            + frame.inv_inertia_a * cr_a * cr_a
            + frame.inv_inertia_b * cr_b * cr_b;
        self.axial_mass = k.recip_or_zero();

        self.distance_softness =
            SoftnessParameters::new(self.damping_ratio, self.hertz).compute_coefficients(context.dt);

        if !context.enable_warm_starting {
            self.impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    fn warm_start(&mut self, frame: &JointFrame, body_a: &mut SolverBody, body_b: &mut SolverBody) {
        let (r_a, r_b) = frame.current_anchors(body_a, body_b);
        let axis = frame.separation(body_a, body_b, r_a, r_b).normalize_or_zero();

        let axial_impulse = self.impulse + self.lower_impulse - self.upper_impulse;
        frame.apply_linear_impulse(body_a, body_b, r_a, r_b, axial_impulse * axis);
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
        let (axis, length) = normalize_and_length(frame.separation(body_a, body_b, r_a, r_b));

        // Spring or rigid rod toward the rest length.
        {
            let c = length - self.length;
            let softness = if self.is_spring() {
                self.distance_softness
            } else if use_bias {
                context.joint_softness
            } else {
                SoftnessCoefficients::RIGID
            };

            let speed = axis.dot(frame.relative_velocity(body_a, body_b, r_a, r_b));
            let impulse = -softness.mass_scale * self.axial_mass * (speed + softness.bias * c)
                - softness.impulse_scale * self.impulse;
            self.impulse += impulse;

            frame.apply_linear_impulse(body_a, body_b, r_a, r_b, impulse * axis);
        }

        if !self.has_limits() {
            return;
        }

        // Lower limit
        {
            let c = length - self.min_length;
            let speed = axis.dot(frame.relative_velocity(body_a, body_b, r_a, r_b));
            let impulse = limit_impulse(c, speed, self.lower_impulse, self.axial_mass, context, use_bias);
            let new_impulse = (self.lower_impulse + impulse).max(0.0);
            let impulse = new_impulse - self.lower_impulse;
            self.lower_impulse = new_impulse;

            frame.apply_linear_impulse(body_a, body_b, r_a, r_b, impulse * axis);
        }

        // Upper limit
        {
            let c = self.max_length - length;
            let speed = -axis.dot(frame.relative_velocity(body_a, body_b, r_a, r_b));
            let impulse = limit_impulse(c, speed, self.upper_impulse, self.axial_mass, context, use_bias);
            let new_impulse = (self.upper_impulse + impulse).max(0.0);
            let impulse = new_impulse - self.upper_impulse;
            self.upper_impulse = new_impulse;

            frame.apply_linear_impulse(body_a, body_b, r_a, r_b, -impulse * axis);
        }
    }

    fn draw(&self, draw: &mut dyn DebugDraw, context: &JointDrawContext) {
        let (p_a, p_b) = (context.anchor_a, context.anchor_b);
        let axis = (p_b - p_a).normalize_or_zero();

        if self.has_limits() {
            let p_min = p_a + self.min_length * axis;
            let p_max = p_a + self.max_length * axis;
            let offset = 0.05 * -axis.perp();

            if self.min_length > LINEAR_SLOP {
                draw.draw_segment(p_min - offset, p_min + offset, HexColor::LIGHT_GREEN);
            }
            if self.max_length < HUGE {
                draw.draw_segment(p_max - offset, p_max + offset, HexColor::RED);
            }
            if self.min_length > LINEAR_SLOP && self.max_length < HUGE {
                draw.draw_segment(p_min, p_max, HexColor::GRAY);
            }
        }

        draw.draw_segment(p_a, p_b, HexColor::WHITE);
        draw.draw_point(p_a, 4.0, HexColor::WHITE);
        draw.draw_point(p_b, 4.0, HexColor::WHITE);

        if self.is_spring() {
            draw.draw_point(p_a + self.length * axis, 4.0, HexColor::BLUE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dynamics::{
            joints::JointKind,
            solver::solver_body::SolverBodyIndex,
        },
        math::Rotation,
    };
    use approx::assert_relative_eq;

    fn frame(delta_center: Vector) -> JointFrame {
        JointFrame {
            index_a: SolverBodyIndex::INVALID,
            index_b: SolverBodyIndex(0),
            inv_mass_a: 0.0,
            inv_mass_b: 1.0,
            inv_inertia_a: 0.0,
            inv_inertia_b: 0.0,
            anchor_a: Vector::ZERO,
            anchor_b: Vector::ZERO,
            center_a: Vector::ZERO,
            center_b: delta_center,
            delta_center,
            rotation_a: Rotation::IDENTITY,
            rotation_b: Rotation::IDENTITY,
        }
    }

    fn joint(def: DistanceJointDef) -> DistanceJoint {
        match def.build().kind {
            JointKind::Distance(joint) => joint,
            kind => panic!("expected a distance joint, got {kind:?}"),
        }
    }

    #[test]
    fn lengths_are_clamped() {
        let joint = joint(DistanceJointDef {
            length: -1.0,
            min_length: -5.0,
            max_length: 2.0 * HUGE,
            ..Default::default()
        });
        assert_eq!(joint.length(), LINEAR_SLOP);
        assert_eq!(joint.min_length(), LINEAR_SLOP);
        assert_eq!(joint.max_length(), HUGE);
    }

    #[test]
    fn rigid_rod_removes_stretching_velocity() {
        let mut joint = joint(DistanceJointDef::default());
        let frame = frame(Vector::new(1.0, 0.0));
        let context = StepContext::new(1.0 / 60.0);
        joint.prepare(&frame, &context);

        let mut a = SolverBody::DUMMY;
        let mut b = SolverBody {
            linear_velocity: Vector::new(2.0, 1.0),
            ..SolverBody::DUMMY
        };
        joint.solve(&frame, &mut a, &mut b, &context, false);

        assert_relative_eq!(b.linear_velocity.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(b.linear_velocity.y, 1.0, epsilon = 1e-5);
        assert_relative_eq!(joint.constraint_force(60.0), -120.0, epsilon = 1e-3);
    }

    #[test]
    fn soft_spring_barely_resists_inside_its_range() {
        let mut joint = joint(DistanceJointDef {
            length: 1.0,
            min_length: 0.5,
            max_length: 2.0,
            hertz: 1.0,
            damping_ratio: 0.0,
            ..Default::default()
        });
        assert!(joint.is_spring());

        let frame = frame(Vector::new(1.0, 0.0));
        let context = StepContext::new(1.0 / 60.0);
        joint.prepare(&frame, &context);

        let mut a = SolverBody::DUMMY;
        let mut b = SolverBody {
            linear_velocity: Vector::new(3.0, 0.0),
            ..SolverBody::DUMMY
        };
        joint.solve(&frame, &mut a, &mut b, &context, true);

        // The limits are far away, and a 1 Hz spring at rest length only slightly slows the body.
        assert!(b.linear_velocity.x < 3.0);
        assert!(b.linear_velocity.x > 2.9);
    }
}
