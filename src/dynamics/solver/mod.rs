//! The soft step constraint solver.
//!
//! Each step, the solver:
//!
//! 1. Splits the pending split candidate island, if any.
//! 2. Builds a [`SolverBody`] for every awake, enabled, non-static body.
//! 3. Prepares the joints and touching contacts of every [color](constraint_graph::GraphColor).
//! 4. Integrates velocities with gravity, external forces, and damping.
//! 5. Warm starts the constraints with the impulses of the previous step.
//! 6. Solves the constraints with position bias `velocity_iterations` times.
//! 7. Integrates positions as deltas from the start of the step.
//! 8. Relaxes the constraints without bias `relax_iterations` times.
//! 9. Applies restitution and stores the accumulated impulses for warm starting.
//! 10. Writes the results back to the bodies and puts resting islands to sleep.
//!
//! The constraints of one color never share a non-static body, so each color is solved
//! in parallel with the `parallel` feature. The overflow color is always solved serially.
//!
//! # References
//!
//! - [Solver2D](https://box2d.org/posts/2024/02/solver2d/) by Erin Catto

pub mod constraint_graph;
pub mod contact;
pub mod islands;
pub mod joints;
pub mod softness_parameters;
pub mod solver_body;

use bevy_log::{trace, warn};
use bevy_platform::time::Instant;

use crate::{
    collision::contact::ContactFlags,
    constants::{MAX_ROTATION, MAX_TRANSLATION_SPEED, TIME_TO_SLEEP},
    math::{Scalar, Transform, Vector},
    world::{SimulationState, StepDiagnostics},
};

use constraint_graph::{ConstraintGraph, OVERFLOW_INDEX};
use contact::{ConstraintBody, ContactConstraint};
use islands::{
    AwakeIslandBitVec,
    sleeping::{keep_neighbors_awake, update_body_sleep_state},
};
use joints::{JointConstraint, JointFrame};
use softness_parameters::{SoftnessCoefficients, SoftnessParameters};
use solver_body::{SolverBodies, SolverBodiesView, SolverBody, SolverBodyData, SolverBodyIndex};

/// The number of constraints handed to one task when a color is solved in parallel.
#[cfg(feature = "parallel")]
const CONSTRAINTS_PER_TASK: usize = 64;

/// The configuration and derived coefficients of a single time step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepContext {
    /// The time step.
    pub dt: Scalar,
    /// The inverse time step, or zero if the time step is zero.
    pub inv_dt: Scalar,
    pub gravity: Vector,
    /// The number of solver iterations with position bias.
    pub velocity_iterations: usize,
    /// The number of solver iterations without position bias.
    pub relax_iterations: usize,
    /// The softness of contacts between two dynamic bodies.
    pub contact_softness: SoftnessCoefficients,
    /// The softness of contacts with a static or kinematic body. Stiffer than `contact_softness`.
    pub static_softness: SoftnessCoefficients,
    /// The softness used to correct the position error of rigid joints.
    pub joint_softness: SoftnessCoefficients,
    /// Contacts approaching faster than this use restitution.
    pub restitution_threshold: Scalar,
    /// The maximum speed at which overlapping shapes are pushed apart.
    pub max_biased_push: Scalar,
    pub enable_warm_starting: bool,
    pub enable_sleep: bool,
}

impl StepContext {
    /// Creates a step context with the default world tuning.
    pub fn new(dt: Scalar) -> Self {
        Self {
            dt,
            inv_dt: if dt > 0.0 { 1.0 / dt } else { 0.0 },
            gravity: Vector::new(0.0, -10.0),
            velocity_iterations: 4,
            relax_iterations: 2,
            contact_softness: SoftnessParameters::new(10.0, 30.0).compute_coefficients(dt),
            static_softness: SoftnessParameters::new(10.0, 60.0).compute_coefficients(dt),
            joint_softness: SoftnessParameters::new(2.0, 60.0).compute_coefficients(dt),
            restitution_threshold: 1.0,
            max_biased_push: 3.0,
            enable_warm_starting: true,
            enable_sleep: true,
        }
    }
}

/// The constraint solver stages that iterate over the constraint graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SolverStage {
    WarmStart,
    Solve,
    Relax,
    Restitution,
}

/// The solver state that persists across steps to reuse allocations.
#[derive(Default)]
pub(crate) struct Solver {
    bodies: SolverBodies,
    /// The solver body index of each body, indexed by body pool index.
    body_indices: Vec<SolverBodyIndex>,
    pub(crate) awake_islands: AwakeIslandBitVec,
    #[cfg(feature = "parallel")]
    task_pool: Option<bevy_tasks::TaskPool>,
}

impl Solver {
    /// Creates a solver. With the `parallel` feature, a task pool is created
    /// when more than one worker is requested.
    pub(crate) fn new(worker_count: usize) -> Self {
        #[cfg(feature = "parallel")]
        let task_pool = (worker_count > 1).then(|| {
            bevy_tasks::TaskPoolBuilder::new()
                .num_threads(worker_count)
                .thread_name("pivot2d solver".into())
                .build()
        });
        #[cfg(not(feature = "parallel"))]
        let _ = worker_count;

        Self {
            #[cfg(feature = "parallel")]
            task_pool,
            ..Default::default()
        }
    }

    /// Returns the task pool used for parallel work, if any.
    #[cfg(feature = "parallel")]
    pub(crate) fn task_pool(&self) -> Option<&bevy_tasks::TaskPool> {
        self.task_pool.as_ref()
    }

    /// Advances the awake bodies by one time step.
    pub(crate) fn step(
        &mut self,
        state: &mut SimulationState,
        context: &StepContext,
        diagnostics: &mut StepDiagnostics,
    ) {
        let start = Instant::now();
        if let Some(island_id) = state.islands.split_candidate.take() {
            state
                .islands
                .split_island(island_id, &mut state.bodies, &mut state.contacts, &mut state.joints);
        }
        diagnostics.split_island = start.elapsed();

        let start = Instant::now();
        self.build_solver_bodies(state);
        self.prepare_constraints(state, context);
        diagnostics.prepare = start.elapsed();

        let start = Instant::now();
        self.integrate_velocities(context);
        diagnostics.integrate_velocities = start.elapsed();

        let start = Instant::now();
        if context.enable_warm_starting {
            self.solve_graph(&mut state.graph, SolverStage::WarmStart, context);
        }
        diagnostics.warm_start = start.elapsed();

        let start = Instant::now();
        for _ in 0..context.velocity_iterations {
            self.solve_graph(&mut state.graph, SolverStage::Solve, context);
        }
        diagnostics.solve = start.elapsed();

        let start = Instant::now();
        self.integrate_positions(context);
        diagnostics.integrate_positions = start.elapsed();

        let start = Instant::now();
        for _ in 0..context.relax_iterations {
            self.solve_graph(&mut state.graph, SolverStage::Relax, context);
        }
        diagnostics.relax = start.elapsed();

        let start = Instant::now();
        self.solve_graph(&mut state.graph, SolverStage::Restitution, context);
        diagnostics.restitution = start.elapsed();

        let start = Instant::now();
        store_impulses(state);
        diagnostics.store_impulses = start.elapsed();

        let start = Instant::now();
        self.finalize_bodies(state, context);
        diagnostics.finalize = start.elapsed();

        let start = Instant::now();
        // With sleeping disabled, every body keeps its island marked awake.
        state.islands.sleep_islands(
            &mut self.awake_islands,
            &mut state.bodies,
            &mut state.contacts,
            &mut state.joints,
            &mut state.graph,
        );
        diagnostics.sleep_islands = start.elapsed();

        trace!(
            "solved {} bodies over {} velocity and {} relax iterations",
            self.bodies.len(),
            context.velocity_iterations,
            context.relax_iterations
        );
    }

    /// Creates a solver body for every simulated body.
    fn build_solver_bodies(&mut self, state: &SimulationState) {
        self.bodies.clear();
        self.body_indices.clear();
        self.body_indices
            .resize(state.bodies.capacity(), SolverBodyIndex::INVALID);

        for (body_index, body) in state.bodies.iter() {
            if !body.is_simulated() {
                continue;
            }

            let solver_body = SolverBody {
                linear_velocity: body.linear_velocity,
                angular_velocity: body.angular_velocity,
                ..SolverBody::DUMMY
            };
            let data = SolverBodyData {
                body_index,
                inv_mass: body.inv_mass,
                inv_inertia: body.inv_inertia,
                force: body.force,
                torque: body.torque,
                gravity_scale: body.gravity_scale,
                linear_damping: body.linear_damping,
                angular_damping: body.angular_damping,
                is_kinematic: body.body_type.is_kinematic(),
            };
            self.body_indices[body_index as usize] = self.bodies.push(solver_body, data);
        }
    }

    /// Returns the solver data of a body, or the static dummy if the body is not simulated.
    fn constraint_body(&self, body_index: u32) -> ConstraintBody {
        let index = self
            .body_indices
            .get(body_index as usize)
            .copied()
            .unwrap_or(SolverBodyIndex::INVALID);
        if !index.is_valid() {
            return ConstraintBody::STATIC;
        }

        let (bodies, data) = (self.bodies.get(index), self.bodies.data(index));
        match (bodies, data) {
            (Some(state), Some(data)) => ConstraintBody {
                index,
                data: *data,
                state: *state,
            },
            _ => ConstraintBody::STATIC,
        }
    }

    /// Prepares the joint and contact constraints of every color.
    fn prepare_constraints(&mut self, state: &mut SimulationState, context: &StepContext) {
        let SimulationState {
            bodies,
            contacts,
            joints,
            graph,
            ..
        } = state;

        for color in graph.colors.iter_mut() {
            color.joint_constraints.clear();
            color.contact_constraints.clear();

            for &joint_index in &color.joints {
                let Some(joint) = joints.get(joint_index) else {
                    continue;
                };
                let (Some(body_a), Some(body_b)) = (bodies.get(joint.body_a()), bodies.get(joint.body_b()))
                else {
                    continue;
                };

                let solver_a = self.constraint_body(joint.body_a());
                let solver_b = self.constraint_body(joint.body_b());

                let rotation_a = body_a.transform.rotation;
                let rotation_b = body_b.transform.rotation;
                let frame = JointFrame {
                    index_a: solver_a.index,
                    index_b: solver_b.index,
                    inv_mass_a: solver_a.data.inv_mass,
                    inv_mass_b: solver_b.data.inv_mass,
                    inv_inertia_a: solver_a.data.inv_inertia,
                    inv_inertia_b: solver_b.data.inv_inertia,
                    anchor_a: rotation_a * (joint.local_anchor_a - body_a.local_center),
                    anchor_b: rotation_b * (joint.local_anchor_b - body_b.local_center),
                    center_a: body_a.center,
                    center_b: body_b.center,
                    delta_center: body_b.center - body_a.center,
                    rotation_a,
                    rotation_b,
                };

                let mut kind = joint.kind;
                kind.solver_mut().prepare(&frame, context);
                color.joint_constraints.push(JointConstraint {
                    joint_index,
                    frame,
                    kind,
                });
            }

            for &contact_index in &color.contacts {
                let Some(contact) = contacts.get(contact_index) else {
                    continue;
                };
                if contact.flags.contains(ContactFlags::DISABLED) || contact.manifold.points.is_empty() {
                    continue;
                }

                let body_a = self.constraint_body(contact.body_a());
                let body_b = self.constraint_body(contact.body_b());
                color.contact_constraints.push(ContactConstraint::generate(
                    contact_index,
                    contact,
                    &body_a,
                    &body_b,
                    context,
                ));
            }
        }

        let overflow = graph.overflow();
        let overflow_count = overflow.contacts.len() + overflow.joints.len();
        if overflow_count > 0 {
            warn!("{overflow_count} constraints overflowed the graph colors and are solved serially");
        }
    }

    /// Integrates velocities with gravity, external forces, and damping.
    fn integrate_velocities(&mut self, context: &StepContext) {
        let h = context.dt;
        let max_linear_speed = MAX_TRANSLATION_SPEED;
        let max_angular_speed = MAX_ROTATION * context.inv_dt;
        let (bodies, data) = self.bodies.split_mut();

        for (body, data) in bodies.iter_mut().zip(data) {
            if data.is_kinematic {
                // Kinematic bodies move with the velocity they were given.
                continue;
            }

            let linear_damping = 1.0 / (1.0 + h * data.linear_damping);
            let angular_damping = 1.0 / (1.0 + h * data.angular_damping);

            // The gravity term is `mass * gravity_scale * gravity`, which is scaled back by the inverse mass.
            let gravity = if data.inv_mass > 0.0 {
                data.gravity_scale * context.gravity
            } else {
                Vector::ZERO
            };
            let linear_acceleration = data.inv_mass * data.force + gravity;
            let angular_acceleration = data.inv_inertia * data.torque;

            let mut v = linear_damping * body.linear_velocity + h * linear_acceleration;
            let mut w = angular_damping * body.angular_velocity + h * angular_acceleration;

            if v.length_squared() > max_linear_speed * max_linear_speed {
                v = v.clamp_length_max(max_linear_speed);
            }
            if w * w > max_angular_speed * max_angular_speed {
                w = w.clamp(-max_angular_speed, max_angular_speed);
            }

            body.linear_velocity = v;
            body.angular_velocity = w;
        }
    }

    /// Integrates the position deltas of the solver bodies.
    fn integrate_positions(&mut self, context: &StepContext) {
        let h = context.dt;
        let (bodies, _) = self.bodies.split_mut();

        for body in bodies.iter_mut() {
            body.delta_rotation = body.delta_rotation.add_angle(h * body.angular_velocity);
            body.delta_position += h * body.linear_velocity;
        }
    }

    /// Runs a solver stage over every color, then over the overflow color.
    fn solve_graph(&mut self, graph: &mut ConstraintGraph, stage: SolverStage, context: &StepContext) {
        let view = self.bodies.view();

        for (color_index, color) in graph.colors.iter_mut().enumerate() {
            if color_index == OVERFLOW_INDEX {
                continue;
            }

            #[cfg(feature = "parallel")]
            if let Some(task_pool) = self.task_pool.as_ref() {
                use bevy_tasks::ParallelSliceMut;

                color
                    .joint_constraints
                    .par_chunk_map_mut(task_pool, CONSTRAINTS_PER_TASK, |_, chunk| {
                        solve_joints(chunk, view, stage, context);
                    });
                color
                    .contact_constraints
                    .par_chunk_map_mut(task_pool, CONSTRAINTS_PER_TASK, |_, chunk| {
                        solve_contacts(chunk, view, stage, context);
                    });
                continue;
            }

            solve_joints(&mut color.joint_constraints, view, stage, context);
            solve_contacts(&mut color.contact_constraints, view, stage, context);
        }

        let overflow = &mut graph.colors[OVERFLOW_INDEX];
        solve_joints(&mut overflow.joint_constraints, view, stage, context);
        solve_contacts(&mut overflow.contact_constraints, view, stage, context);
    }

    /// Writes the solver results back to the bodies, updates sleep timers and AABBs, and clears forces.
    fn finalize_bodies(&mut self, state: &mut SimulationState, context: &StepContext) {
        let SimulationState {
            bodies,
            shapes,
            contacts,
            joints,
            islands,
            ..
        } = state;

        islands.split_candidate_sleep_timer = 0.0;
        self.awake_islands.set_bit_count_and_clear(islands.capacity());

        let mut moving_kinematic_bodies = Vec::new();

        for (solver_body, data) in self.bodies.iter() {
            let Some(body) = bodies.get_mut(data.body_index) else {
                continue;
            };

            body.linear_velocity = solver_body.linear_velocity;
            body.angular_velocity = solver_body.angular_velocity;

            let rotation = (solver_body.delta_rotation * body.transform.rotation).normalize();
            body.center += solver_body.delta_position;
            body.transform = Transform::new(body.center - rotation * body.local_center, rotation);

            update_body_sleep_state(body, islands, &mut self.awake_islands, context.dt, context.enable_sleep);

            if data.is_kinematic && body.sleep_time < TIME_TO_SLEEP {
                moving_kinematic_bodies.push(data.body_index);
            }

            body.force = Vector::ZERO;
            body.torque = 0.0;

            for &shape_index in &body.shapes {
                if let Some(shape) = shapes.get_mut(shape_index) {
                    shape.update_aabb(&body.transform);
                }
            }
        }

        for body_index in moving_kinematic_bodies {
            keep_neighbors_awake(body_index, bodies, contacts, joints, &mut self.awake_islands);
        }
    }
}

/// Writes the accumulated impulses of the prepared constraints back into the joint and contact pools.
fn store_impulses(state: &mut SimulationState) {
    for color in state.graph.colors.iter() {
        for constraint in &color.joint_constraints {
            if let Some(joint) = state.joints.get_mut(constraint.joint_index) {
                joint.kind = constraint.kind;
            }
        }
        for constraint in &color.contact_constraints {
            if let Some(contact) = state.contacts.get_mut(constraint.contact_index) {
                constraint.store_impulses(contact);
            }
        }
    }
}

fn solve_joints(
    constraints: &mut [JointConstraint],
    view: SolverBodiesView<'_>,
    stage: SolverStage,
    context: &StepContext,
) {
    for constraint in constraints {
        let (a, b) = (constraint.frame.index_a, constraint.frame.index_b);
        // SAFETY: The joints of one color never share a non-static body, and a joint never
        // connects a body to itself. Colors are solved one at a time.
        unsafe {
            view.with_pair(a, b, |body_a, body_b| match stage {
                SolverStage::WarmStart => constraint.warm_start(body_a, body_b),
                SolverStage::Solve => constraint.solve(body_a, body_b, context, true),
                SolverStage::Relax => constraint.solve(body_a, body_b, context, false),
                SolverStage::Restitution => {}
            });
        }
    }
}

fn solve_contacts(
    constraints: &mut [ContactConstraint],
    view: SolverBodiesView<'_>,
    stage: SolverStage,
    context: &StepContext,
) {
    for constraint in constraints {
        let (a, b) = (constraint.index_a, constraint.index_b);
        // SAFETY: The contacts of one color never share a non-static body, and a contact never
        // connects a body to itself. Colors are solved one at a time.
        unsafe {
            view.with_pair(a, b, |body_a, body_b| match stage {
                SolverStage::WarmStart => constraint.warm_start(body_a, body_b),
                SolverStage::Solve => constraint.solve(body_a, body_b, context, true),
                SolverStage::Relax => constraint.solve(body_a, body_b, context, false),
                SolverStage::Restitution => {
                    constraint.apply_restitution(body_a, body_b, context.restitution_threshold)
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn step_context_defaults() {
        let context = StepContext::new(1.0 / 60.0);
        assert_relative_eq!(context.inv_dt, 60.0, epsilon = 1e-3);
        assert!(context.static_softness.mass_scale > context.contact_softness.mass_scale);
        assert_ne!(context.joint_softness, SoftnessCoefficients::RIGID);

        let zero = StepContext::new(0.0);
        assert_eq!(zero.inv_dt, 0.0);
    }
}
