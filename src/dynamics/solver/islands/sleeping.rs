//! Sleeping and waking for [`PhysicsIsland`](super::PhysicsIsland)s.
//!
//! Every step, each awake body updates its sleep timer in [`update_body_sleep_state`].
//! A body that has not been resting long enough marks its island in the [`AwakeIslandBitVec`].
//! Islands that are left unmarked at the end of the step are put to sleep by
//! [`PhysicsIslands::sleep_islands`], which removes their constraints from the
//! [`ConstraintGraph`] so that the solver never visits them.

use bevy_log::trace;
use derive_more::{Deref, DerefMut};

use crate::{
    collision::contact::Contact,
    constants::{ANGULAR_SLEEP_TOLERANCE, LINEAR_SLEEP_TOLERANCE, TIME_TO_SLEEP},
    data_structures::{bit_vec::BitVec, edge_list::iter_edges, pool::Pool},
    dynamics::{
        rigid_body::Body,
        solver::{constraint_graph::ConstraintGraph, joints::Joint},
    },
    math::Scalar,
};

use super::PhysicsIslands;

/// A bit vector that stores which islands are kept awake and which are allowed to sleep.
#[derive(Clone, Debug, Default, Deref, DerefMut)]
pub(crate) struct AwakeIslandBitVec(pub(crate) BitVec);

/// Updates the sleep timer of an awake body after its velocity has been integrated.
///
/// If the body has not rested for long enough, its island is kept awake. Otherwise, if the island
/// has removed constraints, it becomes the split candidate when it holds the sleepiest body so far.
pub(crate) fn update_body_sleep_state(
    body: &mut Body,
    islands: &mut PhysicsIslands,
    awake_islands: &mut AwakeIslandBitVec,
    delta_secs: Scalar,
    enable_sleep: bool,
) {
    let is_resting = body.linear_velocity.length_squared()
        < LINEAR_SLEEP_TOLERANCE * LINEAR_SLEEP_TOLERANCE
        && body.angular_velocity * body.angular_velocity
            < ANGULAR_SLEEP_TOLERANCE * ANGULAR_SLEEP_TOLERANCE;

    if !enable_sleep || !body.enable_sleep || !is_resting {
        body.sleep_time = 0.0;
    } else {
        body.sleep_time += delta_secs;
    }

    // Kinematic bodies are not in islands.
    let Some(island_id) = body.island.map(|node| node.island_id) else {
        return;
    };

    if body.sleep_time < TIME_TO_SLEEP {
        // Any single body in an island can keep it awake.
        awake_islands.set_and_grow(island_id as usize);
    } else if let Some(island) = islands.get(island_id)
        && island.constraints_removed > 0
        && body.sleep_time > islands.split_candidate_sleep_timer
    {
        // The body wants to sleep, but its island needs splitting first.
        islands.split_candidate = Some(island_id);
        islands.split_candidate_sleep_timer = body.sleep_time;
    }
}

/// Keeps the islands of everything a moving kinematic body touches or is jointed to awake.
///
/// Kinematic bodies are not part of islands, so without this a body resting on a moving
/// platform could fall asleep and stop following it.
pub(crate) fn keep_neighbors_awake(
    body_index: u32,
    bodies: &mut Pool<Body>,
    contacts: &Pool<Contact>,
    joints: &Pool<Joint>,
    awake_islands: &mut AwakeIslandBitVec,
) {
    let Some(body) = bodies.get(body_index) else {
        return;
    };

    let mut neighbors: Vec<u32> = iter_edges(contacts, body.contacts)
        .filter_map(|key| {
            let contact = contacts.get(key.index)?;
            contact
                .is_touching()
                .then(|| contact.edges[key.other_side().side as usize].body_index)
        })
        .collect();
    neighbors.extend(iter_edges(joints, body.joints).filter_map(|key| {
        let joint = joints.get(key.index)?;
        Some(joint.edges[key.other_side().side as usize].body_index)
    }));

    for other in neighbors {
        let Some(other) = bodies.get_mut(other) else {
            continue;
        };
        if let Some(node) = other.island {
            other.sleep_time = 0.0;
            awake_islands.set_and_grow(node.island_id as usize);
        }
    }
}

impl PhysicsIslands {
    /// Puts the island with the given ID to sleep.
    ///
    /// The velocities of its bodies are zeroed, and its contacts and joints are removed
    /// from the constraint graph.
    pub(crate) fn sleep_island(
        &mut self,
        island_id: u32,
        bodies: &mut Pool<Body>,
        contacts: &mut Pool<Contact>,
        joints: &mut Pool<Joint>,
        graph: &mut ConstraintGraph,
    ) {
        let Some(island) = self.get_mut(island_id) else {
            return;
        };

        if island.is_sleeping {
            return;
        }

        island.is_sleeping = true;

        for body_index in island.bodies.collect(bodies) {
            if let Some(body) = bodies.get_mut(body_index) {
                body.is_awake = false;
                body.linear_velocity = Default::default();
                body.angular_velocity = 0.0;
                body.force = Default::default();
                body.torque = 0.0;
            }
        }

        for contact_index in island.contacts.collect(contacts) {
            if contacts
                .get(contact_index)
                .is_some_and(|contact| contact.color_index.is_some())
            {
                graph.remove_contact(contact_index, contacts);
            }
        }

        for joint_index in island.joints.collect(joints) {
            if joints
                .get(joint_index)
                .is_some_and(|joint| joint.color_index.is_some())
            {
                graph.remove_joint(joint_index, joints);
            }
        }

        if self.split_candidate == Some(island_id) {
            self.split_candidate = None;
        }

        trace!("island {island_id} fell asleep");
    }

    /// Wakes up the island with the given ID.
    ///
    /// Its bodies get their sleep timers reset, and its touching contacts and joints
    /// are added back to the constraint graph.
    pub(crate) fn wake_island(
        &mut self,
        island_id: u32,
        bodies: &mut Pool<Body>,
        contacts: &mut Pool<Contact>,
        joints: &mut Pool<Joint>,
        graph: &mut ConstraintGraph,
    ) {
        let Some(island) = self.get_mut(island_id) else {
            return;
        };

        if !island.is_sleeping {
            return;
        }

        island.is_sleeping = false;

        for body_index in island.bodies.collect(bodies) {
            if let Some(body) = bodies.get_mut(body_index) {
                body.wake();
            }
        }

        for contact_index in island.contacts.collect(contacts) {
            if contacts
                .get(contact_index)
                .is_some_and(|contact| contact.color_index.is_none() && contact.is_touching())
            {
                graph.add_contact(contact_index, contacts, bodies);
            }
        }

        for joint_index in island.joints.collect(joints) {
            if joints
                .get(joint_index)
                .is_some_and(|joint| joint.color_index.is_none())
            {
                graph.add_joint(joint_index, joints, bodies);
            }
        }

        trace!("island {island_id} woke up");
    }

    /// Wakes up the island of the given body, if it has one and it is sleeping.
    ///
    /// Returns `true` if an island was woken up.
    pub(crate) fn wake_body_island(
        &mut self,
        body_index: u32,
        bodies: &mut Pool<Body>,
        contacts: &mut Pool<Contact>,
        joints: &mut Pool<Joint>,
        graph: &mut ConstraintGraph,
    ) -> bool {
        let Some(island_id) = bodies
            .get(body_index)
            .and_then(|body| body.island.map(|node| node.island_id))
        else {
            return false;
        };

        if !self.get(island_id).is_some_and(|island| island.is_sleeping) {
            return false;
        }

        self.wake_island(island_id, bodies, contacts, joints, graph);
        true
    }

    /// Wakes up every sleeping island.
    pub(crate) fn wake_all(
        &mut self,
        bodies: &mut Pool<Body>,
        contacts: &mut Pool<Contact>,
        joints: &mut Pool<Joint>,
        graph: &mut ConstraintGraph,
    ) {
        let sleeping: Vec<u32> = self
            .iter()
            .filter(|island| island.is_sleeping)
            .map(|island| island.id)
            .collect();

        for island_id in sleeping {
            self.wake_island(island_id, bodies, contacts, joints, graph);
        }
    }

    /// Sleeps the awake islands that no body kept awake this step, and wakes the sleeping
    /// islands that were marked awake, for example by a moving kinematic body.
    ///
    /// Islands with pending splits stay awake until they have been split.
    /// The awake bit vector is cleared for the next step.
    pub(crate) fn sleep_islands(
        &mut self,
        awake_islands: &mut AwakeIslandBitVec,
        bodies: &mut Pool<Body>,
        contacts: &mut Pool<Contact>,
        joints: &mut Pool<Joint>,
        graph: &mut ConstraintGraph,
    ) {
        let mut sleep_buffer = Vec::new();
        let mut wake_buffer = Vec::new();

        for island in self.iter() {
            if awake_islands.get(island.id as usize) {
                if island.is_sleeping {
                    wake_buffer.push(island.id);
                }
            } else if !island.is_sleeping && island.constraints_removed == 0 {
                // The island does not have a pending split, so it can go to sleep.
                sleep_buffer.push(island.id);
            }
        }

        for island_id in sleep_buffer {
            self.sleep_island(island_id, bodies, contacts, joints, graph);
        }

        for island_id in wake_buffer {
            self.wake_island(island_id, bodies, contacts, joints, graph);
        }

        // Reset the awake island bit vector.
        awake_islands.set_bit_count_and_clear(self.capacity());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::rigid_body::BodyDef;
    use crate::math::Vector;

    fn island_with_body(islands: &mut PhysicsIslands, bodies: &mut Pool<Body>) -> (u32, u32) {
        let (body_index, _) = bodies.alloc(Body::new(&BodyDef::dynamic(Vector::ZERO)));
        let island_id = islands.create_island_for_body(bodies, body_index);
        (body_index, island_id)
    }

    #[test]
    fn resting_body_lets_island_sleep() {
        let mut islands = PhysicsIslands::default();
        let mut bodies = Pool::default();
        let mut contacts = Pool::default();
        let mut joints = Pool::default();
        let mut graph = ConstraintGraph::default();
        let mut awake = AwakeIslandBitVec::default();

        let (body_index, island_id) = island_with_body(&mut islands, &mut bodies);

        // Still within the time to sleep.
        let body = bodies.get_mut(body_index).unwrap();
        update_body_sleep_state(body, &mut islands, &mut awake, 0.25, true);
        islands.sleep_islands(&mut awake, &mut bodies, &mut contacts, &mut joints, &mut graph);
        assert!(!islands.get(island_id).unwrap().is_sleeping());

        let body = bodies.get_mut(body_index).unwrap();
        update_body_sleep_state(body, &mut islands, &mut awake, 0.25, true);
        islands.sleep_islands(&mut awake, &mut bodies, &mut contacts, &mut joints, &mut graph);
        assert!(islands.get(island_id).unwrap().is_sleeping());
        assert!(!bodies.get(body_index).unwrap().is_awake);

        islands.wake_island(island_id, &mut bodies, &mut contacts, &mut joints, &mut graph);
        let body = bodies.get(body_index).unwrap();
        assert!(body.is_awake);
        assert_eq!(body.sleep_time, 0.0);
    }

    #[test]
    fn moving_body_keeps_island_awake() {
        let mut islands = PhysicsIslands::default();
        let mut bodies = Pool::default();
        let mut contacts = Pool::default();
        let mut joints = Pool::default();
        let mut graph = ConstraintGraph::default();
        let mut awake = AwakeIslandBitVec::default();

        let (body_index, island_id) = island_with_body(&mut islands, &mut bodies);
        bodies.get_mut(body_index).unwrap().linear_velocity = Vector::new(1.0, 0.0);

        for _ in 0..10 {
            let body = bodies.get_mut(body_index).unwrap();
            update_body_sleep_state(body, &mut islands, &mut awake, 0.25, true);
            islands.sleep_islands(&mut awake, &mut bodies, &mut contacts, &mut joints, &mut graph);
        }

        assert!(!islands.get(island_id).unwrap().is_sleeping());
        assert_eq!(bodies.get(body_index).unwrap().sleep_time, 0.0);
    }

    #[test]
    fn disabled_sleeping_resets_timer() {
        let mut islands = PhysicsIslands::default();
        let mut bodies = Pool::default();
        let mut awake = AwakeIslandBitVec::default();

        let (body_index, island_id) = island_with_body(&mut islands, &mut bodies);
        let body = bodies.get_mut(body_index).unwrap();
        body.sleep_time = 10.0;
        update_body_sleep_state(body, &mut islands, &mut awake, 0.25, false);

        assert_eq!(bodies.get(body_index).unwrap().sleep_time, 0.0);
        assert!(awake.get(island_id as usize));
    }
}
