//! [`MouseJoint`] and [`MouseJointDef`].

use crate::{
    debug_render::{DebugDraw, HexColor},
    dynamics::solver::{StepContext, solver_body::SolverBody},
    id::BodyId,
    math::{Matrix, RecipOrZero, Scalar, Transform, Vector, cross, invert_or_zero},
};

use super::{JointBlueprint, JointDrawContext, JointFrame, JointSolver};

/// Parameters for creating a [`MouseJoint`].
///
/// Body A is usually a static ground body. Only body B is moved by the joint.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MouseJointDef {
    pub body_a: BodyId,
    pub body_b: BodyId,
    /// The initial world-space target. Body B is grabbed at this point.
    pub target: Vector,
    /// The maximum force used to pull body B.
    pub max_force: Scalar,
    /// The spring stiffness, in N/m.
    pub stiffness: Scalar,
    /// The spring damping, in N·s/m.
    pub damping: Scalar,
}

impl Default for MouseJointDef {
    fn default() -> Self {
        Self {
            body_a: BodyId::NULL,
            body_b: BodyId::NULL,
            target: Vector::ZERO,
            max_force: 1.0,
            stiffness: 0.0,
            damping: 0.0,
        }
    }
}

impl MouseJointDef {
    /// Creates a definition that grabs `body_b` at the world point `target`.
    pub fn new(body_a: BodyId, body_b: BodyId, target: Vector) -> Self {
        Self {
            body_a,
            body_b,
            target,
            ..Default::default()
        }
    }

    pub(crate) fn build(&self, transform_a: &Transform, transform_b: &Transform) -> JointBlueprint {
        let joint = MouseJoint {
            target: self.target,
            max_force: self.max_force.max(0.0),
            stiffness: self.stiffness.max(0.0),
            damping: self.damping.max(0.0),
            linear_impulse: Vector::ZERO,
            linear_mass: Matrix::ZERO,
            gamma: 0.0,
            beta: 0.0,
        };

        JointBlueprint {
            kind: joint.into(),
            local_anchor_a: transform_a.inverse_transform_point(self.target),
            local_anchor_b: transform_b.inverse_transform_point(self.target),
            collide_connected: true,
            draw_size: 1.0,
        }
    }
}

/// Pulls a point on body B toward a world-space target with a soft spring.
///
/// The connected bodies always collide with each other.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MouseJoint {
    target: Vector,
    max_force: Scalar,
    stiffness: Scalar,
    damping: Scalar,

    linear_impulse: Vector,
    linear_mass: Matrix,
    gamma: Scalar,
    beta: Scalar,
}

impl MouseJoint {
    /// Returns the world-space target.
    #[inline]
    pub fn target(&self) -> Vector {
        self.target
    }

    /// Moves the target.
    #[inline]
    pub fn set_target(&mut self, target: Vector) {
        self.target = target;
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
    pub fn stiffness(&self) -> Scalar {
        self.stiffness
    }

    #[inline]
    pub fn damping(&self) -> Scalar {
        self.damping
    }

    /// Sets the spring stiffness and damping.
    pub fn set_tuning(&mut self, stiffness: Scalar, damping: Scalar) {
        self.stiffness = stiffness.max(0.0);
        self.damping = damping.max(0.0);
    }

    /// Returns the force applied to body B during the last step.
    #[inline]
    pub fn constraint_force(&self, inv_dt: Scalar) -> Vector {
        inv_dt * self.linear_impulse
    }
}

impl JointSolver for MouseJoint {
    fn prepare(&mut self, frame: &JointFrame, context: &StepContext) {
        let h = context.dt;
        let (k, d) = (self.stiffness, self.damping);

        self.gamma = (h * (d + h * k)).recip_or_zero();
        self.beta = h * k * self.gamma;

        let r_b = frame.anchor_b;
        let (m_b, i_b) = (frame.inv_mass_b, frame.inv_inertia_b);
        let k11 = m_b + i_b * r_b.y * r_b.y + self.gamma;
        let k12 = -i_b * r_b.x * r_b.y;
        let k22 = m_b + i_b * r_b.x * r_b.x + self.gamma;
        self.linear_mass = invert_or_zero(Matrix::from_cols(Vector::new(k11, k12), Vector::new(k12, k22)));

        if !context.enable_warm_starting {
            self.linear_impulse = Vector::ZERO;
        }
    }

    fn warm_start(&mut self, frame: &JointFrame, _body_a: &mut SolverBody, body_b: &mut SolverBody) {
        // Light angular damping keeps a grabbed body from spinning indefinitely.
        body_b.angular_velocity *= 0.98;

        let r_b = body_b.delta_rotation * frame.anchor_b;
        body_b.linear_velocity += frame.inv_mass_b * self.linear_impulse;
        body_b.angular_velocity += frame.inv_inertia_b * cross(r_b, self.linear_impulse);
    }

    fn solve(
        &mut self,
        frame: &JointFrame,
        _body_a: &mut SolverBody,
        body_b: &mut SolverBody,
        context: &StepContext,
        _use_bias: bool,
    ) {
        let r_b = body_b.delta_rotation * frame.anchor_b;
        let velocity = body_b.velocity_at_point(r_b);
        let c = self.beta * (frame.center_b + body_b.delta_position + r_b - self.target);

        let impulse = -(self.linear_mass * (velocity + c + self.gamma * self.linear_impulse));
        let old_impulse = self.linear_impulse;
        let max_impulse = context.dt * self.max_force;
        self.linear_impulse = (old_impulse + impulse).clamp_length_max(max_impulse);
        let impulse = self.linear_impulse - old_impulse;

        body_b.linear_velocity += frame.inv_mass_b * impulse;
        body_b.angular_velocity += frame.inv_inertia_b * cross(r_b, impulse);
    }

    fn draw(&self, draw: &mut dyn DebugDraw, context: &JointDrawContext) {
        draw.draw_point(self.target, 4.0, HexColor::GREEN);
        draw.draw_point(context.anchor_b, 4.0, HexColor::GREEN);
        draw.draw_segment(self.target, context.anchor_b, HexColor::from_rgb(0.8, 0.8, 0.8));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dynamics::{joints::JointKind, solver::solver_body::SolverBodyIndex},
        math::Rotation,
    };

    #[test]
    fn pulls_body_toward_target() {
        let def = MouseJointDef {
            target: Vector::new(0.0, 1.0),
            max_force: 1000.0,
            stiffness: 100.0,
            damping: 10.0,
            ..Default::default()
        };
        let blueprint = def.build(&Transform::IDENTITY, &Transform::IDENTITY);
        assert_eq!(blueprint.local_anchor_b, Vector::new(0.0, 1.0));

        let JointKind::Mouse(mut joint) = blueprint.kind else {
            panic!("expected a mouse joint");
        };

        // Body B has moved away from the grab point.
        let frame = JointFrame {
            index_a: SolverBodyIndex::INVALID,
            index_b: SolverBodyIndex(0),
            inv_mass_a: 0.0,
            inv_mass_b: 1.0,
            inv_inertia_a: 0.0,
            inv_inertia_b: 0.0,
            anchor_a: Vector::new(0.0, 1.0),
            anchor_b: Vector::ZERO,
            center_a: Vector::ZERO,
            center_b: Vector::new(2.0, 1.0),
            delta_center: Vector::new(2.0, 1.0),
            rotation_a: Rotation::IDENTITY,
            rotation_b: Rotation::IDENTITY,
        };
        let context = StepContext::new(1.0 / 60.0);
        joint.prepare(&frame, &context);

        let mut a = SolverBody::DUMMY;
        let mut b = SolverBody::DUMMY;
        joint.solve(&frame, &mut a, &mut b, &context, true);

        assert!(b.linear_velocity.x < 0.0);
        assert!(b.linear_velocity.y.abs() < 1e-5);
        assert!(joint.constraint_force(60.0).length() <= 1000.0 + 1e-3);
    }
}
