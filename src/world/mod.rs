//! The [`World`] owns every body, shape, contact, and joint, and advances them in time.
//!
//! Objects are referred to with handles such as [`BodyId`] that carry the revision of their
//! pool slot, so a handle to a destroyed object is never mistaken for a new one.
//!
//! # Stepping
//!
//! [`World::step`] runs the broad phase, then locks the world, updates the contacts, and solves.
//! While the world is locked, every operation that would change the topology of the simulation
//! returns [`WorldError::Locked`]. This is observable from the [pre-solve callback](World::set_pre_solve_callback),
//! which runs in the middle of the step.

mod body;
mod collide;
mod diagnostics;
mod joint;
mod shape;
mod state;

pub use diagnostics::{Counters, StepDiagnostics};
pub(crate) use state::SimulationState;

use bevy_log::{debug, trace, warn};
use bevy_platform::time::Instant;

use crate::{
    collision::{contact::ContactEvents, manifold::Manifold},
    data_structures::{bit_vec::BitVec, edge_list::iter_edges},
    dynamics::solver::{
        Solver, StepContext,
        softness_parameters::{SoftnessParameters, Stiffness, reduced_mass, spring_stiffness},
    },
    error::WorldError,
    id::{BodyId, JointId, ShapeId, next_world_index},
    math::{Scalar, Vector},
};

/// A callback invoked for every touching contact after its manifold is updated.
///
/// Returning `false` disables the contact for the current step. The world is locked
/// while the callback runs.
pub type PreSolveFn = dyn FnMut(&mut World, ShapeId, ShapeId, &Manifold) -> bool;

/// Parameters for creating a [`World`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct WorldDef {
    pub gravity: Vector,
    /// Contacts approaching faster than this, in m/s, use restitution.
    pub restitution_threshold: Scalar,
    /// The stiffness of contacts, in Hertz.
    pub contact_hertz: Scalar,
    /// The damping ratio of contacts. Values above `1` are overdamped.
    pub contact_damping_ratio: Scalar,
    /// The maximum speed, in m/s, at which overlapping shapes are pushed apart.
    pub contact_push_velocity: Scalar,
    /// The stiffness used to correct the position error of rigid joints, in Hertz.
    pub joint_hertz: Scalar,
    pub joint_damping_ratio: Scalar,
    pub enable_sleep: bool,
    pub enable_warm_starting: bool,
    /// The number of worker threads used by the solver with the `parallel` feature.
    pub worker_count: usize,
    pub body_capacity: usize,
    pub shape_capacity: usize,
    pub contact_capacity: usize,
    pub joint_capacity: usize,
}

impl Default for WorldDef {
    fn default() -> Self {
        Self {
            gravity: Vector::new(0.0, -10.0),
            restitution_threshold: 1.0,
            contact_hertz: 30.0,
            contact_damping_ratio: 10.0,
            contact_push_velocity: 3.0,
            joint_hertz: 60.0,
            joint_damping_ratio: 2.0,
            enable_sleep: true,
            enable_warm_starting: true,
            worker_count: 1,
            body_capacity: 16,
            shape_capacity: 16,
            contact_capacity: 16,
            joint_capacity: 16,
        }
    }
}

/// A simulation of rigid bodies connected by joints and contacts.
pub struct World {
    pub(crate) state: SimulationState,
    solver: Solver,
    locked: bool,
    def: WorldDef,
    /// The inverse time step of the last step, used to convert impulses into forces.
    inv_dt: Scalar,
    pre_solve: Option<Box<PreSolveFn>>,
    diagnostics: StepDiagnostics,
    counters: Counters,
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldDef::default())
    }
}

impl World {
    /// Creates a new empty world.
    pub fn new(def: WorldDef) -> Self {
        let index = next_world_index();
        debug!("created world {index}");

        Self {
            state: SimulationState::new(index, &def),
            solver: Solver::new(def.worker_count),
            locked: false,
            def,
            inv_dt: 0.0,
            pre_solve: None,
            diagnostics: StepDiagnostics::default(),
            counters: Counters::default(),
        }
    }

    /// Returns `true` while the world is in the middle of a step.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Returns an error if the world is locked.
    pub(crate) fn check_unlocked(&self) -> Result<(), WorldError> {
        if self.locked {
            warn!("the world cannot be modified while it is stepping");
            return Err(WorldError::Locked);
        }
        Ok(())
    }

    /// Advances the simulation by `dt` seconds.
    ///
    /// The constraints are solved with position correction `velocity_iterations` times,
    /// and relaxed without it `relax_iterations` times. A time step of zero does nothing.
    pub fn step(
        &mut self,
        dt: Scalar,
        velocity_iterations: usize,
        relax_iterations: usize,
    ) -> Result<(), WorldError> {
        self.check_unlocked()?;

        if dt == 0.0 {
            return Ok(());
        }

        let step_start = Instant::now();

        let start = Instant::now();
        self.state.update_pairs();
        self.diagnostics.broad_phase = start.elapsed();

        self.locked = true;

        let context = self.step_context(dt, velocity_iterations, relax_iterations);
        self.inv_dt = context.inv_dt;

        let start = Instant::now();
        self.collide();
        self.diagnostics.collide = start.elapsed();

        self.solver
            .step(&mut self.state, &context, &mut self.diagnostics);

        self.locked = false;

        self.diagnostics.step = step_start.elapsed();
        self.update_counters();

        trace!(
            "stepped {} bodies, {} contacts, {} joints in {:?}",
            self.counters.body_count, self.counters.contact_count, self.counters.joint_count, self.diagnostics.step
        );

        Ok(())
    }

    /// Builds the configuration of a step from the world settings.
    fn step_context(&self, dt: Scalar, velocity_iterations: usize, relax_iterations: usize) -> StepContext {
        let def = &self.def;
        let contact_softness =
            SoftnessParameters::new(def.contact_damping_ratio, def.contact_hertz).compute_coefficients(dt);
        let static_softness =
            SoftnessParameters::new(def.contact_damping_ratio, 2.0 * def.contact_hertz).compute_coefficients(dt);
        let joint_softness =
            SoftnessParameters::new(def.joint_damping_ratio, def.joint_hertz).compute_coefficients(dt);

        StepContext {
            gravity: def.gravity,
            velocity_iterations,
            relax_iterations,
            contact_softness,
            static_softness,
            joint_softness,
            restitution_threshold: def.restitution_threshold,
            max_biased_push: def.contact_push_velocity,
            enable_warm_starting: def.enable_warm_starting,
            enable_sleep: def.enable_sleep,
            ..StepContext::new(dt)
        }
    }

    fn update_counters(&mut self) {
        let state = &self.state;
        self.counters = Counters {
            body_count: state.bodies.len(),
            shape_count: state.shapes.len(),
            contact_count: state.contacts.len(),
            joint_count: state.joints.len(),
            island_count: state.islands.len(),
            awake_island_count: state.islands.iter().filter(|island| !island.is_sleeping()).count(),
            color_counts: state.graph.color_counts(),
        };
    }

    /// Returns the timings of the last step.
    #[inline]
    pub fn diagnostics(&self) -> &StepDiagnostics {
        &self.diagnostics
    }

    /// Returns the object counts recorded after the last step.
    #[inline]
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Returns the contact events of the last step.
    #[inline]
    pub fn contact_events(&self) -> &ContactEvents {
        &self.state.contact_events
    }

    /// Sets the callback invoked for every touching contact before it is solved.
    pub fn set_pre_solve_callback(
        &mut self,
        callback: impl FnMut(&mut World, ShapeId, ShapeId, &Manifold) -> bool + 'static,
    ) {
        self.pre_solve = Some(Box::new(callback));
    }

    pub fn clear_pre_solve_callback(&mut self) {
        self.pre_solve = None;
    }

    #[inline]
    pub fn gravity(&self) -> Vector {
        self.def.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vector) {
        self.def.gravity = gravity;
    }

    /// Enables or disables sleeping. Disabling sleep wakes every island.
    pub fn enable_sleeping(&mut self, enable: bool) -> Result<(), WorldError> {
        self.check_unlocked()?;

        if self.def.enable_sleep == enable {
            return Ok(());
        }
        self.def.enable_sleep = enable;

        if !enable {
            let state = &mut self.state;
            state.islands.wake_all(
                &mut state.bodies,
                &mut state.contacts,
                &mut state.joints,
                &mut state.graph,
            );
        }

        Ok(())
    }

    #[inline]
    pub fn is_sleeping_enabled(&self) -> bool {
        self.def.enable_sleep
    }

    pub fn enable_warm_starting(&mut self, enable: bool) {
        self.def.enable_warm_starting = enable;
    }

    #[inline]
    pub fn is_warm_starting_enabled(&self) -> bool {
        self.def.enable_warm_starting
    }

    pub fn set_restitution_threshold(&mut self, threshold: Scalar) {
        self.def.restitution_threshold = threshold.max(0.0);
    }

    /// Sets the stiffness and damping ratio of contacts, and the maximum speed at which
    /// overlapping shapes are pushed apart.
    pub fn set_contact_tuning(&mut self, hertz: Scalar, damping_ratio: Scalar, push_velocity: Scalar) {
        self.def.contact_hertz = hertz.max(0.0);
        self.def.contact_damping_ratio = damping_ratio.max(0.0);
        self.def.contact_push_velocity = push_velocity.max(0.0);
    }

    /// Sets the stiffness and damping ratio used to correct the position error of rigid joints.
    pub fn set_joint_tuning(&mut self, hertz: Scalar, damping_ratio: Scalar) {
        self.def.joint_hertz = hertz.max(0.0);
        self.def.joint_damping_ratio = damping_ratio.max(0.0);
    }

    /// Returns the inverse time step of the last step.
    #[inline]
    pub fn inv_dt(&self) -> Scalar {
        self.inv_dt
    }

    pub fn is_body_valid(&self, id: BodyId) -> bool {
        id.world == self.state.world_index && self.state.bodies.is_valid(id.index, id.revision)
    }

    pub fn is_shape_valid(&self, id: ShapeId) -> bool {
        id.world == self.state.world_index && self.state.shapes.is_valid(id.index, id.revision)
    }

    pub fn is_joint_valid(&self, id: JointId) -> bool {
        id.world == self.state.world_index && self.state.joints.is_valid(id.index, id.revision)
    }

    pub(crate) fn body_index(&self, id: BodyId) -> Result<u32, WorldError> {
        if self.is_body_valid(id) {
            Ok(id.index)
        } else {
            Err(WorldError::InvalidBody(id))
        }
    }

    pub(crate) fn shape_index(&self, id: ShapeId) -> Result<u32, WorldError> {
        if self.is_shape_valid(id) {
            Ok(id.index)
        } else {
            Err(WorldError::InvalidShape(id))
        }
    }

    pub(crate) fn joint_index(&self, id: JointId) -> Result<u32, WorldError> {
        if self.is_joint_valid(id) {
            Ok(id.index)
        } else {
            Err(WorldError::InvalidJoint(id))
        }
    }

    /// Returns the number of contacts between two bodies, touching or not.
    pub fn contact_count_between(&self, body_a: BodyId, body_b: BodyId) -> Result<usize, WorldError> {
        let (a, b) = (self.body_index(body_a)?, self.body_index(body_b)?);
        Ok(self.state.contact_count_between(a, b))
    }

    /// Computes the stiffness and damping of a linear spring between two bodies
    /// that oscillates at `hertz` with the given damping ratio.
    ///
    /// The spring acts on the reduced mass of the bodies.
    pub fn linear_stiffness(
        &self,
        hertz: Scalar,
        damping_ratio: Scalar,
        body_a: BodyId,
        body_b: BodyId,
    ) -> Result<Stiffness, WorldError> {
        let (a, b) = (self.body_index(body_a)?, self.body_index(body_b)?);
        let (mass_a, mass_b) = (
            self.state.bodies.get(a).map_or(0.0, |body| body.mass),
            self.state.bodies.get(b).map_or(0.0, |body| body.mass),
        );
        Ok(spring_stiffness(reduced_mass(mass_a, mass_b), hertz, damping_ratio))
    }

    /// Computes the stiffness and damping of an angular spring between two bodies
    /// that oscillates at `hertz` with the given damping ratio.
    ///
    /// The spring acts on the reduced rotational inertia of the bodies.
    pub fn angular_stiffness(
        &self,
        hertz: Scalar,
        damping_ratio: Scalar,
        body_a: BodyId,
        body_b: BodyId,
    ) -> Result<Stiffness, WorldError> {
        let (a, b) = (self.body_index(body_a)?, self.body_index(body_b)?);
        let (inertia_a, inertia_b) = (
            self.state.bodies.get(a).map_or(0.0, |body| body.inertia),
            self.state.bodies.get(b).map_or(0.0, |body| body.inertia),
        );
        Ok(spring_stiffness(reduced_mass(inertia_a, inertia_b), hertz, damping_ratio))
    }

    /// Checks the consistency of the joint lists, islands, and constraint graph.
    ///
    /// # Panics
    ///
    /// Panics if an invariant is broken.
    pub fn validate(&mut self) {
        let state = &mut self.state;

        for (_, joint) in state.joints.iter_mut() {
            joint.is_marked = false;
        }

        // Every joint is reached exactly once from each of its two bodies.
        for body_index in state.bodies.indices() {
            let Some(body) = state.bodies.get(body_index) else {
                continue;
            };
            let keys: Vec<_> = iter_edges(&state.joints, body.joints).collect();
            assert_eq!(keys.len(), body.joints.count as usize, "joint count of body {body_index} is wrong");

            for key in keys {
                let joint = state
                    .joints
                    .get_mut(key.index)
                    .unwrap_or_else(|| panic!("body {body_index} links to freed joint {}", key.index));
                assert_eq!(joint.edges[key.side as usize].body_index, body_index);
                assert_ne!(joint.body_a(), joint.body_b());
                joint.is_marked = !joint.is_marked;
            }
        }

        for (joint_index, joint) in state.joints.iter() {
            assert!(!joint.is_marked, "joint {joint_index} is not linked into both bodies");
        }

        let mut contact_seen = BitVec::default();
        for (_, body) in state.bodies.iter() {
            for key in iter_edges(&state.contacts, body.contacts) {
                contact_seen.set_and_grow(key.index as usize);
            }
        }
        for (contact_index, _) in state.contacts.iter() {
            assert!(contact_seen.get(contact_index as usize), "contact {contact_index} is not linked");
        }

        for island in state.islands.iter() {
            island.validate(&state.bodies, &state.contacts, &state.joints);
        }
        state
            .graph
            .validate(&state.contacts, &state.joints, &state.bodies);
    }
}
