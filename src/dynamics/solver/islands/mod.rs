//! Persistent simulation islands for sleeping and waking.
//!
//! Islands are retained across time steps. Each dynamic body starts with its own island,
//! and when a constraint between two dynamic bodies is created, the islands are merged with union find.
//!
//! Splitting is deferred and done using depth-first search (DFS). Only one island is split per time step,
//! choosing the sleepiest island with one or more constraints removed as the candidate.
//!
//! Islands are only used for sleeping and waking. Solver parallelism is achieved with [graph coloring](super::constraint_graph)
//! using the [`ConstraintGraph`](super::constraint_graph::ConstraintGraph).
//!
//! # References
//!
//! - [Box2D - Simulation Islands] by [Erin Catto]
//!
//! [Box2D - Simulation Islands]: https://box2d.org/posts/2023/10/simulation-islands/
//! [Erin Catto]: https://github.com/erincatto

pub(crate) mod sleeping;

pub(crate) use sleeping::AwakeIslandBitVec;

use bevy_log::debug;
use slab::Slab;

use crate::{
    collision::contact::Contact,
    data_structures::{edge_list::iter_edges, pool::Pool},
    dynamics::{rigid_body::Body, solver::joints::Joint},
};

/// A node in a linked list in a [`PhysicsIsland`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IslandNode {
    /// The ID of the island that the node belongs to.
    pub(crate) island_id: u32,
    /// The pool index of the previous node in the linked list.
    pub(crate) prev: Option<u32>,
    /// The pool index of the next node in the linked list.
    pub(crate) next: Option<u32>,
    /// A flag to mark the node as visited during depth-first traversal (DFS) for island splitting.
    pub(crate) is_visited: bool,
}

impl IslandNode {
    const fn new(island_id: u32) -> Self {
        Self {
            island_id,
            prev: None,
            next: None,
            is_visited: false,
        }
    }
}

/// An object that can be linked into an island: a body, a contact, or a joint.
pub(crate) trait IslandMember {
    /// Returns the island node, or `None` if the object is not in an island.
    fn island(&self) -> Option<&IslandNode>;

    /// Returns the island node slot.
    fn island_mut(&mut self) -> &mut Option<IslandNode>;
}

fn node<T: IslandMember>(pool: &Pool<T>, index: u32) -> &IslandNode {
    pool.get(index)
        .and_then(IslandMember::island)
        .unwrap_or_else(|| panic!("island member {index} has no island"))
}

fn node_mut<T: IslandMember>(pool: &mut Pool<T>, index: u32) -> &mut IslandNode {
    pool.get_mut(index)
        .and_then(|member| member.island_mut().as_mut())
        .unwrap_or_else(|| panic!("island member {index} has no island"))
}

/// A doubly-linked list of bodies, contacts, or joints in a [`PhysicsIsland`].
///
/// The links are stored in the [`IslandNode`] of each member.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IslandList {
    pub(crate) head: Option<u32>,
    pub(crate) tail: Option<u32>,
    pub(crate) count: u32,
}

impl IslandList {
    /// Returns the number of members in the list.
    #[inline]
    pub const fn len(&self) -> u32 {
        self.count
    }

    /// Returns `true` if the list is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Links `index` at the head of the list.
    fn push_front<T: IslandMember>(&mut self, pool: &mut Pool<T>, index: u32, island_id: u32) {
        let mut new_node = IslandNode::new(island_id);

        if let Some(head) = self.head {
            new_node.next = Some(head);
            node_mut(pool, head).prev = Some(index);
        }

        *pool
            .get_mut(index)
            .unwrap_or_else(|| panic!("island member {index} does not exist"))
            .island_mut() = Some(new_node);

        self.head = Some(index);
        if self.tail.is_none() {
            self.tail = self.head;
        }
        self.count += 1;
    }

    /// Links `index` at the tail of the list, reusing its visited flag.
    fn push_back<T: IslandMember>(&mut self, pool: &mut Pool<T>, index: u32, island_id: u32) {
        if let Some(tail) = self.tail {
            node_mut(pool, tail).next = Some(index);
        }

        let slot = pool
            .get_mut(index)
            .unwrap_or_else(|| panic!("island member {index} does not exist"))
            .island_mut();
        let is_visited = slot.is_some_and(|node| node.is_visited);
        *slot = Some(IslandNode {
            island_id,
            prev: self.tail,
            next: None,
            is_visited,
        });

        self.tail = Some(index);
        if self.head.is_none() {
            self.head = Some(index);
        }
        self.count += 1;
    }

    /// Unlinks `index` from the list and clears its island node.
    fn remove<T: IslandMember>(&mut self, pool: &mut Pool<T>, index: u32) -> IslandNode {
        let removed = pool
            .get_mut(index)
            .and_then(|member| member.island_mut().take())
            .unwrap_or_else(|| panic!("island member {index} has no island"));

        if let Some(prev) = removed.prev {
            let prev_node = node_mut(pool, prev);
            debug_assert!(prev_node.next == Some(index));
            prev_node.next = removed.next;
        }

        if let Some(next) = removed.next {
            let next_node = node_mut(pool, next);
            debug_assert!(next_node.prev == Some(index));
            next_node.prev = removed.prev;
        }

        if self.head == Some(index) {
            self.head = removed.next;
        }

        if self.tail == Some(index) {
            self.tail = removed.prev;
        }

        debug_assert!(self.count > 0);
        self.count -= 1;

        removed
    }

    /// Moves all members of `other` to the end of this list, remapping their island ID.
    fn append<T: IslandMember>(&mut self, pool: &mut Pool<T>, other: IslandList, island_id: u32) {
        // Remap IDs.
        let mut next = other.head;
        while let Some(index) = next {
            let member = node_mut(pool, index);
            member.island_id = island_id;
            next = member.next;
        }

        let Some(other_head) = other.head else {
            return;
        };

        match self.tail {
            None => {
                // This list is empty.
                debug_assert!(self.head.is_none() && self.count == 0);
                *self = other;
                return;
            }
            Some(tail) => {
                let tail_node = node_mut(pool, tail);
                debug_assert!(tail_node.next.is_none());
                tail_node.next = Some(other_head);

                let head_node = node_mut(pool, other_head);
                debug_assert!(head_node.prev.is_none());
                head_node.prev = Some(tail);
            }
        }

        self.tail = other.tail;
        self.count += other.count;
    }

    /// Collects the indices of the members in order.
    pub(crate) fn collect<T: IslandMember>(&self, pool: &Pool<T>) -> Vec<u32> {
        let mut indices = Vec::with_capacity(self.count as usize);
        let mut next = self.head;
        while let Some(index) = next {
            indices.push(index);
            next = node(pool, index).next;
        }
        indices
    }

    fn clear_visited<T: IslandMember>(&self, pool: &mut Pool<T>) {
        let mut next = self.head;
        while let Some(index) = next {
            let member = node_mut(pool, index);
            member.is_visited = false;
            next = member.next;
        }
    }

    /// Validates the linked list.
    pub fn validate<T: IslandMember>(&self, pool: &Pool<T>, island_id: u32) {
        if self.head.is_none() {
            assert!(self.tail.is_none());
            assert_eq!(self.count, 0);
            return;
        }

        assert!(self.tail.is_some());
        assert!(self.count > 0);

        if self.count > 1 {
            assert_ne!(self.head, self.tail);
        }

        let mut count = 0;
        let mut prev = None;
        let mut next = self.head;

        while let Some(index) = next {
            let member = node(pool, index);
            assert_eq!(member.island_id, island_id);
            assert_eq!(member.prev, prev);

            count += 1;

            if count == self.count {
                assert_eq!(next, self.tail);
            }

            prev = next;
            next = member.next;
        }

        assert_eq!(count, self.count);
    }
}

/// A [simulation island](self) that contains bodies, contacts, and joints. Used for sleeping and waking.
///
/// Bodies, contacts, and joints are linked to islands using linked lists for efficient addition, removal,
/// and merging. Each island stores the head and tail of each list, while each member stores an
/// [`IslandNode`] that links it to the next and previous item in the list.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicsIsland {
    pub(crate) id: u32,
    pub(crate) bodies: IslandList,
    pub(crate) contacts: IslandList,
    pub(crate) joints: IslandList,
    pub(crate) is_sleeping: bool,
    pub(crate) constraints_removed: u32,
}

impl PhysicsIsland {
    /// Creates a new empty [`PhysicsIsland`] with the given ID.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self {
            id,
            bodies: IslandList {
                head: None,
                tail: None,
                count: 0,
            },
            contacts: IslandList {
                head: None,
                tail: None,
                count: 0,
            },
            joints: IslandList {
                head: None,
                tail: None,
                count: 0,
            },
            is_sleeping: false,
            constraints_removed: 0,
        }
    }

    /// Returns the island ID.
    #[inline]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Returns the number of bodies in the island.
    #[inline]
    pub const fn body_count(&self) -> u32 {
        self.bodies.count
    }

    /// Returns the number of contacts in the island.
    #[inline]
    pub const fn contact_count(&self) -> u32 {
        self.contacts.count
    }

    /// Returns the number of joints in the island.
    #[inline]
    pub const fn joint_count(&self) -> u32 {
        self.joints.count
    }

    /// Returns `true` if the island is sleeping.
    #[inline]
    pub const fn is_sleeping(&self) -> bool {
        self.is_sleeping
    }

    /// Returns the number of constraints that have been removed from the island
    /// since it was last split.
    #[inline]
    pub const fn constraints_removed(&self) -> u32 {
        self.constraints_removed
    }

    /// Validates the island.
    pub(crate) fn validate(&self, bodies: &Pool<Body>, contacts: &Pool<Contact>, joints: &Pool<Joint>) {
        self.bodies.validate(bodies, self.id);
        self.contacts.validate(contacts, self.id);
        self.joints.validate(joints, self.id);
    }
}

/// The [`PhysicsIsland`]s in the simulation.
#[derive(Debug, Default, Clone)]
pub struct PhysicsIslands {
    islands: Slab<PhysicsIsland>,
    /// The current island candidate for splitting.
    ///
    /// This is chosen based on which island with one or more constraints removed
    /// has the sleepiest body.
    pub split_candidate: Option<u32>,
    /// The sleep time of the sleepiest body in the split candidate.
    pub split_candidate_sleep_timer: f32,
}

impl PhysicsIslands {
    /// Returns the next available island ID.
    #[inline]
    fn next_id(&self) -> u32 {
        self.islands.vacant_key() as u32
    }

    /// Removes the island with the given ID. The island is assumed to be empty.
    fn remove_island(&mut self, island_id: u32) -> PhysicsIsland {
        if self.split_candidate == Some(island_id) {
            self.split_candidate = None;
        }
        self.islands.remove(island_id as usize)
    }

    /// Returns a reference to the [`PhysicsIsland`] with the given ID.
    #[inline]
    pub fn get(&self, island_id: u32) -> Option<&PhysicsIsland> {
        self.islands.get(island_id as usize)
    }

    /// Returns a mutable reference to the [`PhysicsIsland`] with the given ID.
    #[inline]
    pub(crate) fn get_mut(&mut self, island_id: u32) -> Option<&mut PhysicsIsland> {
        self.islands.get_mut(island_id as usize)
    }

    fn expect_mut(&mut self, island_id: u32) -> &mut PhysicsIsland {
        self.islands
            .get_mut(island_id as usize)
            .unwrap_or_else(|| panic!("Island {island_id} does not exist"))
    }

    /// Returns an iterator over all [`PhysicsIsland`]s.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &PhysicsIsland> {
        self.islands.iter().map(|(_, island)| island)
    }

    /// Returns the number of [`PhysicsIsland`]s.
    #[inline]
    pub fn len(&self) -> usize {
        self.islands.len()
    }

    /// Returns `true` if there are no [`PhysicsIsland`]s.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.islands.is_empty()
    }

    /// Returns the number of slots the islands occupy, for sizing bit vectors indexed by island ID.
    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.islands.capacity()
    }

    /// Creates a new island containing only the given body.
    pub(crate) fn create_island_for_body(&mut self, bodies: &mut Pool<Body>, body_index: u32) -> u32 {
        let mut island = PhysicsIsland::new(self.next_id());
        island.bodies.push_front(bodies, body_index, island.id);
        self.islands.insert(island) as u32
    }

    /// Removes a body from its island, removing the island if it becomes empty.
    ///
    /// The body's constraints must already have been unlinked.
    pub(crate) fn remove_body(&mut self, bodies: &mut Pool<Body>, body_index: u32) {
        let Some(island_id) = bodies
            .get(body_index)
            .and_then(|body| body.island.map(|node| node.island_id))
        else {
            return;
        };

        let island = self.expect_mut(island_id);
        island.bodies.remove(bodies, body_index);

        if island.bodies.is_empty() {
            debug_assert!(island.contacts.is_empty());
            debug_assert!(island.joints.is_empty());
            self.remove_island(island_id);
        } else {
            #[cfg(debug_assertions)]
            island.bodies.validate(bodies, island_id);
        }
    }

    /// Adds a touching contact to the island of its bodies. Returns the ID of the island.
    ///
    /// This will merge the islands of the bodies involved in the contact,
    /// and link the contact to the resulting island.
    pub(crate) fn link_contact(
        &mut self,
        contact_index: u32,
        bodies: &mut Pool<Body>,
        contacts: &mut Pool<Contact>,
        joints: &mut Pool<Joint>,
    ) -> Option<u32> {
        let contact = contacts
            .get(contact_index)
            .unwrap_or_else(|| panic!("contact {contact_index} does not exist"));

        debug_assert!(contact.island.is_none());
        debug_assert!(contact.is_touching());

        let (body_a, body_b) = (contact.body_a(), contact.body_b());
        let island_id = self.merge_islands(body_a, body_b, bodies, contacts, joints)?;

        let island = self.expect_mut(island_id);
        island.contacts.push_front(contacts, contact_index, island_id);

        #[cfg(debug_assertions)]
        island.validate(bodies, contacts, joints);

        Some(island_id)
    }

    /// Removes a contact from its island.
    ///
    /// The [`PhysicsIsland::constraints_removed`] counter is incremented.
    pub(crate) fn unlink_contact(
        &mut self,
        contact_index: u32,
        bodies: &Pool<Body>,
        contacts: &mut Pool<Contact>,
        joints: &Pool<Joint>,
    ) {
        let Some(island_id) = contacts
            .get(contact_index)
            .and_then(|contact| contact.island.map(|node| node.island_id))
        else {
            return;
        };

        let island = self.expect_mut(island_id);
        island.contacts.remove(contacts, contact_index);
        island.constraints_removed += 1;

        #[cfg(debug_assertions)]
        island.validate(bodies, contacts, joints);
        #[cfg(not(debug_assertions))]
        let _ = (bodies, joints);
    }

    /// Adds a joint to the island of its bodies. Returns the ID of the island.
    ///
    /// This will merge the islands of the bodies connected by the joint,
    /// and link the joint to the resulting island.
    pub(crate) fn link_joint(
        &mut self,
        joint_index: u32,
        bodies: &mut Pool<Body>,
        contacts: &mut Pool<Contact>,
        joints: &mut Pool<Joint>,
    ) -> Option<u32> {
        let joint = joints
            .get(joint_index)
            .unwrap_or_else(|| panic!("joint {joint_index} does not exist"));

        debug_assert!(joint.island.is_none());

        let (body_a, body_b) = (joint.body_a(), joint.body_b());
        let island_id = self.merge_islands(body_a, body_b, bodies, contacts, joints)?;

        let island = self.expect_mut(island_id);
        island.joints.push_front(joints, joint_index, island_id);

        #[cfg(debug_assertions)]
        island.validate(bodies, contacts, joints);

        Some(island_id)
    }

    /// Removes a joint from its island.
    ///
    /// The [`PhysicsIsland::constraints_removed`] counter is incremented.
    pub(crate) fn unlink_joint(
        &mut self,
        joint_index: u32,
        bodies: &Pool<Body>,
        contacts: &Pool<Contact>,
        joints: &mut Pool<Joint>,
    ) {
        let Some(island_id) = joints
            .get(joint_index)
            .and_then(|joint| joint.island.map(|node| node.island_id))
        else {
            return;
        };

        let island = self.expect_mut(island_id);
        island.joints.remove(joints, joint_index);
        island.constraints_removed += 1;

        #[cfg(debug_assertions)]
        island.validate(bodies, contacts, joints);
        #[cfg(not(debug_assertions))]
        let _ = (bodies, contacts);
    }

    /// Merges the [`PhysicsIsland`]s associated with the given bodies. Returns the ID of the resulting island,
    /// or `None` if neither body is in an island.
    ///
    /// If an awake island is merged with a sleeping island, the resulting island will remain sleeping.
    /// It is up to the caller to wake up the resulting island if needed.
    ///
    /// The members of the smaller island are transferred to the larger island,
    /// and the smaller island is removed.
    pub(crate) fn merge_islands(
        &mut self,
        body_a: u32,
        body_b: u32,
        bodies: &mut Pool<Body>,
        contacts: &mut Pool<Contact>,
        joints: &mut Pool<Joint>,
    ) -> Option<u32> {
        let island_of = |bodies: &Pool<Body>, index: u32| {
            bodies
                .get(index)
                .and_then(|body| body.island.map(|node| node.island_id))
        };

        let (island_id_a, island_id_b) = match (island_of(bodies, body_a), island_of(bodies, body_b)) {
            (Some(a), Some(b)) => (a, b),
            (Some(id), None) | (None, Some(id)) => return Some(id),
            (None, None) => return None,
        };

        if island_id_a == island_id_b {
            // Merging an island with itself is a no-op.
            return Some(island_id_a);
        }

        // Keep the bigger island to reduce cache misses.
        let [mut big, mut small] = self
            .islands
            .get_disjoint_mut([island_id_a as usize, island_id_b as usize])
            .unwrap_or_else(|_| panic!("Islands {island_id_a} and {island_id_b} do not exist"));
        if big.bodies.count < small.bodies.count {
            core::mem::swap(&mut big, &mut small);
        }

        let big_id = big.id;
        big.bodies.append(bodies, small.bodies, big_id);
        big.contacts.append(contacts, small.contacts, big_id);
        big.joints.append(joints, small.joints, big_id);

        // Track removed constraints.
        big.constraints_removed += small.constraints_removed;

        if small.is_sleeping {
            // If the small island is sleeping, the big island will remain sleeping.
            big.is_sleeping = true;
        }

        #[cfg(debug_assertions)]
        big.validate(bodies, contacts, joints);

        let small_id = small.id;
        debug!("merged island {small_id} into island {big_id}");
        self.remove_island(small_id);

        Some(big_id)
    }

    /// Splits the [`PhysicsIsland`] associated with the given ID into its connected components.
    pub(crate) fn split_island(
        &mut self,
        island_id: u32,
        bodies: &mut Pool<Body>,
        contacts: &mut Pool<Contact>,
        joints: &mut Pool<Joint>,
    ) {
        let Some(island) = self.get(island_id) else {
            return;
        };

        if island.is_sleeping {
            // Only awake islands can be split.
            return;
        }

        if island.constraints_removed == 0 {
            // No constraints have been removed, so no need to split the island.
            return;
        }

        #[cfg(debug_assertions)]
        island.validate(bodies, contacts, joints);

        // The bodies of the base island are the seeds for the depth-first search (DFS).
        let seeds = island.bodies.collect(bodies);
        island.bodies.clear_visited(bodies);
        island.contacts.clear_visited(contacts);
        island.joints.clear_visited(joints);

        // Destroy the base island.
        self.remove_island(island_id);

        let mut stack = Vec::with_capacity(seeds.len());
        let mut created = 0;

        for seed in seeds {
            let seed_node = node_mut(bodies, seed);
            if seed_node.is_visited {
                // The body has already been visited.
                continue;
            }
            seed_node.is_visited = true;

            // Create a new island.
            let mut island = PhysicsIsland::new(self.next_id());
            let new_id = island.id;

            stack.push(seed);

            while let Some(body_index) = stack.pop() {
                debug_assert!(node(bodies, body_index).is_visited);

                // Add the body to the new island.
                island.bodies.push_back(bodies, body_index, new_id);

                let body = bodies
                    .get(body_index)
                    .unwrap_or_else(|| panic!("body {body_index} does not exist"));
                let (contact_list, joint_list) = (body.contacts, body.joints);

                // Traverse the touching contacts of the body.
                let contact_edges: Vec<(u32, u32)> = iter_edges(contacts, contact_list)
                    .filter_map(|key| {
                        let contact = contacts.get(key.index)?;
                        let contact_island = contact.island?;
                        if contact_island.is_visited {
                            return None;
                        }
                        let other = contact.edges[key.other_side().side as usize].body_index;
                        Some((key.index, other))
                    })
                    .collect();

                for (contact_index, other_body) in contact_edges {
                    visit_body(bodies, other_body, &mut stack);

                    if let Some(node) = contacts
                        .get_mut(contact_index)
                        .and_then(|contact| contact.island.as_mut())
                    {
                        node.is_visited = true;
                    }
                    island.contacts.push_back(contacts, contact_index, new_id);
                }

                // Traverse the joints of the body.
                let joint_edges: Vec<(u32, u32)> = iter_edges(joints, joint_list)
                    .filter_map(|key| {
                        let joint = joints.get(key.index)?;
                        let joint_island = joint.island?;
                        if joint_island.is_visited {
                            return None;
                        }
                        let other = joint.edges[key.other_side().side as usize].body_index;
                        Some((key.index, other))
                    })
                    .collect();

                for (joint_index, other_body) in joint_edges {
                    visit_body(bodies, other_body, &mut stack);

                    if let Some(node) = joints
                        .get_mut(joint_index)
                        .and_then(|joint| joint.island.as_mut())
                    {
                        node.is_visited = true;
                    }
                    island.joints.push_back(joints, joint_index, new_id);
                }
            }

            #[cfg(debug_assertions)]
            island.validate(bodies, contacts, joints);

            // Add the new island to the list.
            let inserted = self.islands.insert(island) as u32;
            debug_assert_eq!(inserted, new_id);
            created += 1;
        }

        debug!("split island {island_id} into {created} islands");
    }
}

/// Pushes `body_index` to the DFS stack if it is in an island and has not been visited.
fn visit_body(bodies: &mut Pool<Body>, body_index: u32, stack: &mut Vec<u32>) {
    if let Some(node) = bodies
        .get_mut(body_index)
        .and_then(|body| body.island.as_mut())
        && !node.is_visited
    {
        node.is_visited = true;
        stack.push(body_index);
    }
}
