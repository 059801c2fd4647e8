//! The narrow phase: updates contact manifolds and processes contact state changes.

use bevy_log::trace;

use crate::{
    collision::{
        contact::{ContactBeginTouchEvent, ContactEndTouchEvent, ContactFlags},
        manifold::{Manifold, collide_shapes},
        shape::ShapeGeometry,
    },
    math::{Transform, Vector},
};

use super::World;

/// The number of manifold updates handed to one task with the `parallel` feature.
#[cfg(feature = "parallel")]
const TASKS_PER_CHUNK: usize = 32;

/// The inputs of one contact update, copied out of the pools so that
/// manifolds can be computed in parallel.
#[derive(Clone, Copy, Debug)]
struct CollideTask {
    contact_index: u32,
    /// `false` if the fat AABBs of the shapes no longer overlap.
    overlaps: bool,
    geometry_a: ShapeGeometry,
    transform_a: Transform,
    center_a: Vector,
    geometry_b: ShapeGeometry,
    transform_b: Transform,
    center_b: Vector,
}

impl CollideTask {
    /// Returns the new manifold, or `None` if the shapes are disjoint.
    fn run(&self) -> Option<Manifold> {
        self.overlaps.then(|| {
            collide_shapes(
                &self.geometry_a,
                &self.transform_a,
                self.center_a,
                &self.geometry_b,
                &self.transform_b,
                self.center_b,
            )
        })
    }
}

impl World {
    /// Updates every contact with at least one awake body.
    ///
    /// Disjoint contacts are destroyed, and contacts that start or stop touching are
    /// linked into or removed from their island and the constraint graph.
    pub(crate) fn collide(&mut self) {
        self.state.contact_events.clear();

        let tasks = self.gather_collide_tasks();
        let manifolds = self.compute_manifolds(&tasks);

        let mut disjoint = Vec::new();
        let mut started = Vec::new();
        let mut stopped = Vec::new();

        for (task, manifold) in tasks.iter().zip(manifolds) {
            let Some(contact) = self.state.contacts.get_mut(task.contact_index) else {
                continue;
            };

            let Some(mut manifold) = manifold else {
                contact.flags.insert(ContactFlags::DISJOINT);
                disjoint.push(task.contact_index);
                continue;
            };

            manifold.match_points(&contact.manifold);
            let was_touching = contact.is_touching();
            let touching = manifold.point_count() > 0;
            contact.manifold = manifold;

            contact.flags.remove(ContactFlags::DISABLED);
            contact.flags.set(ContactFlags::TOUCHING, touching);

            if touching && !was_touching {
                contact.flags.insert(ContactFlags::STARTED_TOUCHING);
                started.push(task.contact_index);
            } else if !touching && was_touching {
                contact.flags.insert(ContactFlags::STOPPED_TOUCHING);
                stopped.push(task.contact_index);
            }
        }

        self.run_pre_solve(&tasks);

        for &contact_index in &disjoint {
            self.state.destroy_contact(contact_index, false);
        }
        for &contact_index in &started {
            self.begin_touch(contact_index);
        }
        for &contact_index in &stopped {
            self.end_touch(contact_index);
        }

        trace!(
            "updated {} contacts: {} disjoint, {} started touching, {} stopped touching",
            tasks.len(),
            disjoint.len(),
            started.len(),
            stopped.len()
        );
    }

    fn gather_collide_tasks(&self) -> Vec<CollideTask> {
        let state = &self.state;
        let mut tasks = Vec::with_capacity(state.contacts.len());

        for (contact_index, contact) in state.contacts.iter() {
            let (Some(body_a), Some(body_b)) = (state.bodies.get(contact.body_a()), state.bodies.get(contact.body_b()))
            else {
                continue;
            };
            if !body_a.is_simulated() && !body_b.is_simulated() {
                continue;
            }
            let (Some(shape_a), Some(shape_b)) = (state.shapes.get(contact.shape_a), state.shapes.get(contact.shape_b))
            else {
                continue;
            };

            tasks.push(CollideTask {
                contact_index,
                overlaps: shape_a.fat_aabb.overlaps(&shape_b.fat_aabb),
                geometry_a: shape_a.geometry,
                transform_a: body_a.transform,
                center_a: body_a.center,
                geometry_b: shape_b.geometry,
                transform_b: body_b.transform,
                center_b: body_b.center,
            });
        }

        tasks
    }

    fn compute_manifolds(&self, tasks: &[CollideTask]) -> Vec<Option<Manifold>> {
        #[cfg(feature = "parallel")]
        if let Some(task_pool) = self.solver.task_pool() {
            use bevy_tasks::ParallelSlice;

            return tasks
                .par_chunk_map(task_pool, TASKS_PER_CHUNK, |_, chunk| {
                    chunk.iter().map(CollideTask::run).collect::<Vec<_>>()
                })
                .into_iter()
                .flatten()
                .collect();
        }

        tasks.iter().map(CollideTask::run).collect()
    }

    /// Calls the pre-solve callback for every updated touching contact.
    /// A contact is disabled for this step if the callback returns `false`.
    fn run_pre_solve(&mut self, tasks: &[CollideTask]) {
        let Some(mut callback) = self.pre_solve.take() else {
            return;
        };

        for task in tasks {
            let Some(contact) = self.state.contacts.get(task.contact_index) else {
                continue;
            };
            if !contact.is_touching() || contact.flags.contains(ContactFlags::DISJOINT) {
                continue;
            }

            let shape_a = self.state.shape_id(contact.shape_a);
            let shape_b = self.state.shape_id(contact.shape_b);
            let manifold = contact.manifold.clone();

            if !callback(self, shape_a, shape_b, &manifold)
                && let Some(contact) = self.state.contacts.get_mut(task.contact_index)
            {
                contact.flags.insert(ContactFlags::DISABLED);
            }
        }

        // Keep a callback that was replaced from inside the callback.
        if self.pre_solve.is_none() {
            self.pre_solve = Some(callback);
        }
    }

    /// Links a contact that started touching into its island and the constraint graph.
    fn begin_touch(&mut self, contact_index: u32) {
        let state = &mut self.state;
        let Some(contact) = state.contacts.get_mut(contact_index) else {
            return;
        };
        contact.flags.remove(ContactFlags::STARTED_TOUCHING);
        let (body_a, body_b) = (contact.body_a(), contact.body_b());
        let (shape_a, shape_b) = (contact.shape_a, contact.shape_b);
        let report = contact.flags.contains(ContactFlags::ENABLE_CONTACT_EVENTS);

        // A sleeping body touched by an awake body wakes up.
        for body_index in [body_a, body_b] {
            state.islands.wake_body_island(
                body_index,
                &mut state.bodies,
                &mut state.contacts,
                &mut state.joints,
                &mut state.graph,
            );
        }

        state
            .islands
            .link_contact(contact_index, &mut state.bodies, &mut state.contacts, &mut state.joints);
        state
            .graph
            .add_contact(contact_index, &mut state.contacts, &state.bodies);

        if report {
            let event = ContactBeginTouchEvent {
                contact: state.contact_id(contact_index),
                shape_a: state.shape_id(shape_a),
                shape_b: state.shape_id(shape_b),
            };
            state.contact_events.begin_touch.push(event);
        }
    }

    /// Removes a contact that stopped touching from its island and the constraint graph.
    fn end_touch(&mut self, contact_index: u32) {
        let state = &mut self.state;
        let Some(contact) = state.contacts.get_mut(contact_index) else {
            return;
        };
        contact.flags.remove(ContactFlags::STOPPED_TOUCHING);
        let (shape_a, shape_b) = (contact.shape_a, contact.shape_b);
        let report = contact.flags.contains(ContactFlags::ENABLE_CONTACT_EVENTS);

        state
            .islands
            .unlink_contact(contact_index, &state.bodies, &mut state.contacts, &state.joints);
        state.graph.remove_contact(contact_index, &mut state.contacts);

        if report {
            let event = ContactEndTouchEvent {
                shape_a: state.shape_id(shape_a),
                shape_b: state.shape_id(shape_b),
            };
            state.contact_events.end_touch.push(event);
        }
    }
}
