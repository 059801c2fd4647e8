//! **Joints** connect two bodies in a way that restricts their movement relative to each other.
//!
//! Each joint is an edge between two bodies. It is linked into the joint lists of both bodies,
//! into the island of its bodies, and into a color of the constraint graph while it is awake.
//!
//! Below is a table containing the joints that are currently implemented.
//!
//! | Joint               | Allowed DOF                           |
//! | ------------------- | ------------------------------------- |
//! | [`DistanceJoint`]   | 1 Rotation, 1 Translation (ranged)    |
//! | [`MotorJoint`]      | Driven toward a target offset         |
//! | [`MouseJoint`]      | Soft pull of one point to a target    |
//! | [`PrismaticJoint`]  | 1 Translation                         |
//! | [`RevoluteJoint`]   | 1 Rotation                            |
//! | [`WeldJoint`]       | None (optionally soft)                |
//! | [`WheelJoint`]      | 1 Rotation, 1 Translation (suspended) |
//!
//! # Solving
//!
//! Joints are solved with soft step, like contacts. Every joint type implements [`JointSolver`]:
//!
//! 1. [`prepare`](JointSolver::prepare) computes the effective masses and softness for the step.
//! 2. [`warm_start`](JointSolver::warm_start) applies the impulses accumulated in the previous step.
//! 3. [`solve`](JointSolver::solve) runs once per iteration, with position bias while `use_bias` is `true`
//!    and without it during relaxation.
//!
//! Position errors are computed from the body deltas of the [`SolverBody`]s, so the anchors
//! are stored relative to the centers of mass at the start of the step in a [`JointFrame`].

mod distance;
mod motor;
mod mouse;
mod prismatic;
mod revolute;
mod weld;
mod wheel;

pub use distance::{DistanceJoint, DistanceJointDef};
pub use motor::{MotorJoint, MotorJointDef};
pub use mouse::{MouseJoint, MouseJointDef};
pub use prismatic::{PrismaticJoint, PrismaticJointDef};
pub use revolute::{RevoluteJoint, RevoluteJointDef};
pub use weld::{WeldJoint, WeldJointDef};
pub use wheel::{WheelJoint, WheelJointDef};

use derive_more::From;

use crate::{
    data_structures::edge_list::{Edge, EdgeOwner},
    debug_render::{DebugDraw, HexColor},
    dynamics::solver::islands::{IslandMember, IslandNode},
    id::BodyId,
    math::{Matrix, Rotation, Scalar, Transform, Vector, cross},
};

use super::{
    StepContext,
    solver_body::{SolverBody, SolverBodyIndex},
};

/// The type of a joint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum JointType {
    Distance,
    Motor,
    Mouse,
    Prismatic,
    Revolute,
    Weld,
    Wheel,
}

/// The solver interface shared by all joint types.
pub trait JointSolver {
    /// Computes effective masses and softness for the step.
    ///
    /// Accumulated impulses are reset here if warm starting is disabled.
    fn prepare(&mut self, frame: &JointFrame, context: &StepContext);

    /// Applies the impulses accumulated in the previous step.
    fn warm_start(&mut self, frame: &JointFrame, body_a: &mut SolverBody, body_b: &mut SolverBody);

    /// Solves the joint constraints, applying impulses to the given bodies.
    ///
    /// If `use_bias` is `false`, the position error is not corrected.
    fn solve(
        &mut self,
        frame: &JointFrame,
        body_a: &mut SolverBody,
        body_b: &mut SolverBody,
        context: &StepContext,
        use_bias: bool,
    );

    /// Draws the joint.
    fn draw(&self, draw: &mut dyn DebugDraw, context: &JointDrawContext);
}

/// The per-step data shared by all joint types.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JointFrame {
    pub index_a: SolverBodyIndex,
    pub index_b: SolverBodyIndex,
    pub inv_mass_a: Scalar,
    pub inv_mass_b: Scalar,
    pub inv_inertia_a: Scalar,
    pub inv_inertia_b: Scalar,
    /// The anchor on body A relative to its center of mass, in world space at the start of the step.
    pub anchor_a: Vector,
    /// The anchor on body B relative to its center of mass, in world space at the start of the step.
    pub anchor_b: Vector,
    /// The world-space center of mass of body A.
    pub center_a: Vector,
    /// The world-space center of mass of body B.
    pub center_b: Vector,
    /// `center_b - center_a`.
    pub delta_center: Vector,
    pub rotation_a: Rotation,
    pub rotation_b: Rotation,
}

impl JointFrame {
    /// Returns the anchors rotated by the rotation each body has accumulated during the step.
    #[inline]
    pub fn current_anchors(&self, body_a: &SolverBody, body_b: &SolverBody) -> (Vector, Vector) {
        (
            body_a.delta_rotation * self.anchor_a,
            body_b.delta_rotation * self.anchor_b,
        )
    }

    /// Returns the current vector from anchor A to anchor B.
    #[inline]
    pub fn separation(&self, body_a: &SolverBody, body_b: &SolverBody, r_a: Vector, r_b: Vector) -> Vector {
        (body_b.delta_position - body_a.delta_position) + self.delta_center + (r_b - r_a)
    }

    /// Returns the change in the relative angle of the bodies during the step.
    #[inline]
    pub fn delta_angle(&self, body_a: &SolverBody, body_b: &SolverBody) -> Scalar {
        body_a.delta_rotation.angle_between(body_b.delta_rotation)
    }

    /// Returns the relative velocity of anchor B with respect to anchor A.
    #[inline]
    pub fn relative_velocity(&self, body_a: &SolverBody, body_b: &SolverBody, r_a: Vector, r_b: Vector) -> Vector {
        body_b.velocity_at_point(r_b) - body_a.velocity_at_point(r_a)
    }

    /// Returns the inverse effective mass matrix of a point-to-point constraint.
    #[inline]
    pub fn point_mass_matrix(&self, r_a: Vector, r_b: Vector) -> Matrix {
        let (m_a, m_b) = (self.inv_mass_a, self.inv_mass_b);
        let (i_a, i_b) = (self.inv_inertia_a, self.inv_inertia_b);

        let k11 = m_a + m_b + r_a.y * r_a.y * i_a + r_b.y * r_b.y * i_b;
        let k12 = -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b;
        let k22 = m_a + m_b + r_a.x * r_a.x * i_a + r_b.x * r_b.x * i_b;

        Matrix::from_cols(Vector::new(k11, k12), Vector::new(k12, k22))
    }

    /// Applies a linear impulse at the anchors, negatively to body A and positively to body B.
    #[inline]
    pub fn apply_linear_impulse(
        &self,
        body_a: &mut SolverBody,
        body_b: &mut SolverBody,
        r_a: Vector,
        r_b: Vector,
        impulse: Vector,
    ) {
        body_a.linear_velocity -= self.inv_mass_a * impulse;
        body_a.angular_velocity -= self.inv_inertia_a * cross(r_a, impulse);
        body_b.linear_velocity += self.inv_mass_b * impulse;
        body_b.angular_velocity += self.inv_inertia_b * cross(r_b, impulse);
    }

    /// Applies a linear impulse with precomputed angular moments, negatively to body A
    /// and positively to body B. Used by constraints along an axis fixed in body A.
    #[inline]
    pub fn apply_impulse_with_moments(
        &self,
        body_a: &mut SolverBody,
        body_b: &mut SolverBody,
        impulse: Vector,
        moment_a: Scalar,
        moment_b: Scalar,
    ) {
        body_a.linear_velocity -= self.inv_mass_a * impulse;
        body_a.angular_velocity -= self.inv_inertia_a * moment_a;
        body_b.linear_velocity += self.inv_mass_b * impulse;
        body_b.angular_velocity += self.inv_inertia_b * moment_b;
    }

    /// Applies an angular impulse, negatively to body A and positively to body B.
    #[inline]
    pub fn apply_angular_impulse(&self, body_a: &mut SolverBody, body_b: &mut SolverBody, impulse: Scalar) {
        body_a.angular_velocity -= self.inv_inertia_a * impulse;
        body_b.angular_velocity += self.inv_inertia_b * impulse;
    }
}

/// The world-space data used to draw a joint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JointDrawContext {
    pub transform_a: Transform,
    pub transform_b: Transform,
    /// The world-space anchor on body A.
    pub anchor_a: Vector,
    /// The world-space anchor on body B.
    pub anchor_b: Vector,
    /// The local anchor on body A.
    pub local_anchor_a: Vector,
    /// The local anchor on body B.
    pub local_anchor_b: Vector,
    /// The size of the joint's visuals.
    pub draw_size: Scalar,
}

impl JointDrawContext {
    /// Draws the default visuals of a joint: lines from each body origin to its anchor,
    /// and a line between the anchors.
    pub fn draw_default(&self, draw: &mut dyn DebugDraw) {
        let color = HexColor::from_rgb(0.5, 0.8, 0.8);
        draw.draw_segment(self.transform_a.position, self.anchor_a, color);
        draw.draw_segment(self.anchor_a, self.anchor_b, color);
        draw.draw_segment(self.transform_b.position, self.anchor_b, color);
    }
}

/// The type-specific data of a joint.
#[derive(Clone, Copy, Debug, PartialEq, From)]
pub enum JointKind {
    Distance(DistanceJoint),
    Motor(MotorJoint),
    Mouse(MouseJoint),
    Prismatic(PrismaticJoint),
    Revolute(RevoluteJoint),
    Weld(WeldJoint),
    Wheel(WheelJoint),
}

impl JointKind {
    /// Returns the type of the joint.
    pub fn joint_type(&self) -> JointType {
        match self {
            Self::Distance(_) => JointType::Distance,
            Self::Motor(_) => JointType::Motor,
            Self::Mouse(_) => JointType::Mouse,
            Self::Prismatic(_) => JointType::Prismatic,
            Self::Revolute(_) => JointType::Revolute,
            Self::Weld(_) => JointType::Weld,
            Self::Wheel(_) => JointType::Wheel,
        }
    }

    /// Returns the solver of the joint.
    pub fn solver(&self) -> &dyn JointSolver {
        match self {
            Self::Distance(joint) => joint,
            Self::Motor(joint) => joint,
            Self::Mouse(joint) => joint,
            Self::Prismatic(joint) => joint,
            Self::Revolute(joint) => joint,
            Self::Weld(joint) => joint,
            Self::Wheel(joint) => joint,
        }
    }

    /// Returns the solver of the joint mutably.
    pub fn solver_mut(&mut self) -> &mut dyn JointSolver {
        match self {
            Self::Distance(joint) => joint,
            Self::Motor(joint) => joint,
            Self::Mouse(joint) => joint,
            Self::Prismatic(joint) => joint,
            Self::Revolute(joint) => joint,
            Self::Weld(joint) => joint,
            Self::Wheel(joint) => joint,
        }
    }

    /// Solves the joint. The mouse joint is skipped by the relaxation iterations.
    #[inline]
    pub(crate) fn solve(
        &mut self,
        frame: &JointFrame,
        body_a: &mut SolverBody,
        body_b: &mut SolverBody,
        context: &StepContext,
        use_bias: bool,
    ) {
        if matches!(self, Self::Mouse(_)) && !use_bias {
            return;
        }
        self.solver_mut().solve(frame, body_a, body_b, context, use_bias);
    }
}

/// A joint stored in the world's joint pool.
#[derive(Clone, Debug)]
pub(crate) struct Joint {
    pub kind: JointKind,
    /// Edge `0` links into the joint list of body A, edge `1` into the list of body B.
    pub edges: [Edge; 2],
    pub island: Option<IslandNode>,
    pub color_index: Option<usize>,
    pub color_sub_index: Option<usize>,
    pub local_anchor_a: Vector,
    pub local_anchor_b: Vector,
    pub collide_connected: bool,
    pub draw_size: Scalar,
    /// Scratch flag for graph traversals.
    pub is_marked: bool,
}

impl Joint {
    pub fn new(body_a: u32, body_b: u32, blueprint: JointBlueprint) -> Self {
        Self {
            kind: blueprint.kind,
            edges: [Edge::new(body_a), Edge::new(body_b)],
            island: None,
            color_index: None,
            color_sub_index: None,
            local_anchor_a: blueprint.local_anchor_a,
            local_anchor_b: blueprint.local_anchor_b,
            collide_connected: blueprint.collide_connected,
            draw_size: blueprint.draw_size,
            is_marked: false,
        }
    }

    #[inline]
    pub fn body_a(&self) -> u32 {
        self.edges[0].body_index
    }

    #[inline]
    pub fn body_b(&self) -> u32 {
        self.edges[1].body_index
    }
}

impl EdgeOwner for Joint {
    #[inline]
    fn edges(&self) -> &[Edge; 2] {
        &self.edges
    }

    #[inline]
    fn edges_mut(&mut self) -> &mut [Edge; 2] {
        &mut self.edges
    }
}

impl IslandMember for Joint {
    #[inline]
    fn island(&self) -> Option<&IslandNode> {
        self.island.as_ref()
    }

    #[inline]
    fn island_mut(&mut self) -> &mut Option<IslandNode> {
        &mut self.island
    }
}

/// The type-independent result of building a joint from its definition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct JointBlueprint {
    pub kind: JointKind,
    pub local_anchor_a: Vector,
    pub local_anchor_b: Vector,
    pub collide_connected: bool,
    pub draw_size: Scalar,
}

/// The definition of a joint of any type.
#[derive(Clone, Copy, Debug, PartialEq, From)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum JointDef {
    Distance(DistanceJointDef),
    Motor(MotorJointDef),
    Mouse(MouseJointDef),
    Prismatic(PrismaticJointDef),
    Revolute(RevoluteJointDef),
    Weld(WeldJointDef),
    Wheel(WheelJointDef),
}

impl JointDef {
    /// Returns the type of the joint described by the definition.
    pub fn joint_type(&self) -> JointType {
        match self {
            Self::Distance(_) => JointType::Distance,
            Self::Motor(_) => JointType::Motor,
            Self::Mouse(_) => JointType::Mouse,
            Self::Prismatic(_) => JointType::Prismatic,
            Self::Revolute(_) => JointType::Revolute,
            Self::Weld(_) => JointType::Weld,
            Self::Wheel(_) => JointType::Wheel,
        }
    }

    /// Returns the handles of the two bodies to connect.
    pub fn bodies(&self) -> (BodyId, BodyId) {
        match self {
            Self::Distance(def) => (def.body_a, def.body_b),
            Self::Motor(def) => (def.body_a, def.body_b),
            Self::Mouse(def) => (def.body_a, def.body_b),
            Self::Prismatic(def) => (def.body_a, def.body_b),
            Self::Revolute(def) => (def.body_a, def.body_b),
            Self::Weld(def) => (def.body_a, def.body_b),
            Self::Wheel(def) => (def.body_a, def.body_b),
        }
    }

    /// Builds the joint from the definition and the current transforms of its bodies.
    pub(crate) fn build(&self, transform_a: &Transform, transform_b: &Transform) -> JointBlueprint {
        match self {
            Self::Distance(def) => def.build(),
            Self::Motor(def) => def.build(),
            Self::Mouse(def) => def.build(transform_a, transform_b),
            Self::Prismatic(def) => def.build(),
            Self::Revolute(def) => def.build(),
            Self::Weld(def) => def.build(),
            Self::Wheel(def) => def.build(),
        }
    }
}

/// A joint prepared for solving in one color of the constraint graph.
///
/// The joint's solver state is copied in when the step starts and written back when it ends.
#[derive(Clone, Debug, PartialEq)]
pub struct JointConstraint {
    /// The index of the joint in the joint pool.
    pub joint_index: u32,
    pub frame: JointFrame,
    pub kind: JointKind,
}

impl JointConstraint {
    #[inline]
    pub fn warm_start(&mut self, body_a: &mut SolverBody, body_b: &mut SolverBody) {
        self.kind.solver_mut().warm_start(&self.frame, body_a, body_b);
    }

    #[inline]
    pub fn solve(&mut self, body_a: &mut SolverBody, body_b: &mut SolverBody, context: &StepContext, use_bias: bool) {
        self.kind.solve(&self.frame, body_a, body_b, context, use_bias);
    }
}

/// A joint type that can be borrowed out of a [`JointKind`].
pub trait TypedJoint: Sized {
    /// The type of the joint.
    const TYPE: JointType;

    fn from_kind(kind: &JointKind) -> Option<&Self>;

    fn from_kind_mut(kind: &mut JointKind) -> Option<&mut Self>;
}

macro_rules! impl_typed_joint {
    ($($variant:ident => $joint:ty),* $(,)?) => {
        $(
            impl TypedJoint for $joint {
                const TYPE: JointType = JointType::$variant;

                #[inline]
                fn from_kind(kind: &JointKind) -> Option<&Self> {
                    match kind {
                        JointKind::$variant(joint) => Some(joint),
                        _ => None,
                    }
                }

                #[inline]
                fn from_kind_mut(kind: &mut JointKind) -> Option<&mut Self> {
                    match kind {
                        JointKind::$variant(joint) => Some(joint),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_typed_joint!(
    Distance => DistanceJoint,
    Motor => MotorJoint,
    Mouse => MouseJoint,
    Prismatic => PrismaticJoint,
    Revolute => RevoluteJoint,
    Weld => WeldJoint,
    Wheel => WheelJoint,
);

/// Computes the incremental impulse of a one-sided limit with the given position error `c`.
///
/// A positive `c` means the limit is not yet reached, which is handled speculatively.
#[inline]
pub(crate) fn limit_impulse(
    c: Scalar,
    speed: Scalar,
    accumulated: Scalar,
    axial_mass: Scalar,
    context: &StepContext,
    use_bias: bool,
) -> Scalar {
    let mut bias = 0.0;
    let mut mass_scale = 1.0;
    let mut impulse_scale = 0.0;

    if c > 0.0 {
        // Speculative
        bias = c * context.inv_dt;
    } else if use_bias {
        bias = context.joint_softness.bias * c;
        mass_scale = context.joint_softness.mass_scale;
        impulse_scale = context.joint_softness.impulse_scale;
    }

    -axial_mass * mass_scale * (speed + bias) - impulse_scale * accumulated
}
