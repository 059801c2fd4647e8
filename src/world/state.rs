//! The pools of a [`World`](super::World) and the operations that keep them consistent.

use bevy_log::trace;
use bevy_platform::collections::HashMap;

use crate::{
    collision::{
        broad_phase::{BroadPhase, Proxy, ProxyFlags},
        contact::{Contact, ContactEndTouchEvent, ContactEvents, ContactFlags},
        shape::{Shape, mix_friction, mix_restitution},
    },
    data_structures::{
        edge_list::{EdgeKey, iter_edges, link_edge, unlink_edge},
        pair_key::PairKey,
        pool::Pool,
    },
    dynamics::{
        rigid_body::Body,
        solver::{constraint_graph::ConstraintGraph, islands::PhysicsIslands, joints::Joint},
    },
    id::{BodyId, ContactId, JointId, ShapeId},
};

/// Everything the solver reads and writes during a step.
pub(crate) struct SimulationState {
    pub world_index: u16,
    pub bodies: Pool<Body>,
    pub shapes: Pool<Shape>,
    pub contacts: Pool<Contact>,
    pub joints: Pool<Joint>,
    pub islands: PhysicsIslands,
    pub graph: ConstraintGraph,
    pub broad_phase: BroadPhase,
    /// Maps a pair of shape indices to the index of their contact.
    pub contact_pairs: HashMap<PairKey, u32>,
    pub contact_events: ContactEvents,
}

impl SimulationState {
    pub fn new(world_index: u16, capacities: &super::WorldDef) -> Self {
        Self {
            world_index,
            bodies: Pool::with_capacity(capacities.body_capacity),
            shapes: Pool::with_capacity(capacities.shape_capacity),
            contacts: Pool::with_capacity(capacities.contact_capacity),
            joints: Pool::with_capacity(capacities.joint_capacity),
            islands: PhysicsIslands::default(),
            graph: ConstraintGraph::new(capacities.body_capacity),
            broad_phase: BroadPhase::with_capacity(capacities.shape_capacity),
            contact_pairs: HashMap::default(),
            contact_events: ContactEvents::default(),
        }
    }

    pub fn body_id(&self, index: u32) -> BodyId {
        BodyId::new(index, self.world_index, self.bodies.revision(index).unwrap_or(0))
    }

    pub fn shape_id(&self, index: u32) -> ShapeId {
        ShapeId::new(index, self.world_index, self.shapes.revision(index).unwrap_or(0))
    }

    pub fn joint_id(&self, index: u32) -> JointId {
        JointId::new(index, self.world_index, self.joints.revision(index).unwrap_or(0))
    }

    pub fn contact_id(&self, index: u32) -> ContactId {
        ContactId::new(index, self.world_index, self.contacts.revision(index).unwrap_or(0))
    }

    /// Wakes the given body and its island. Returns `true` if a sleeping island was woken.
    pub fn wake_body(&mut self, body_index: u32) -> bool {
        let woke_island = self.islands.wake_body_island(
            body_index,
            &mut self.bodies,
            &mut self.contacts,
            &mut self.joints,
            &mut self.graph,
        );

        if let Some(body) = self.bodies.get_mut(body_index)
            && body.is_enabled
        {
            body.wake();
        }

        woke_island
    }

    /// Creates the broad-phase proxy of a shape.
    pub fn create_proxy(&mut self, shape_index: u32) {
        let Some(shape) = self.shapes.get(shape_index) else {
            return;
        };
        let Some(body) = self.bodies.get(shape.body_index) else {
            return;
        };

        self.broad_phase.add_proxy(Proxy {
            shape: shape_index,
            body: shape.body_index,
            aabb: shape.fat_aabb,
            filter: shape.filter,
            flags: proxy_flags(body),
        });
    }

    /// Creates a non-touching contact between two shapes and links it into both bodies.
    pub fn create_contact(&mut self, shape_a: u32, shape_b: u32) {
        let (Some(a), Some(b)) = (self.shapes.get(shape_a), self.shapes.get(shape_b)) else {
            return;
        };

        let (body_a, body_b) = (a.body_index, b.body_index);
        let contact = Contact::new(
            shape_a,
            body_a,
            shape_b,
            body_b,
            mix_friction(a.friction, b.friction),
            mix_restitution(a.restitution, b.restitution),
            a.enable_contact_events || b.enable_contact_events,
        );
        let (contact_index, _) = self.contacts.alloc(contact);

        for (side, body_index) in [(0, body_a), (1, body_b)] {
            let body = self
                .bodies
                .get_mut(body_index)
                .unwrap_or_else(|| panic!("shape {shape_a} or {shape_b} points to a freed body"));
            link_edge(&mut self.contacts, &mut body.contacts, EdgeKey::new(contact_index, side));
        }

        self.contact_pairs
            .insert(PairKey::new(shape_a, shape_b), contact_index);
    }

    /// Destroys a contact, removing it from the graph, its island, and both bodies.
    ///
    /// A touching contact with events enabled reports an end touch event.
    pub fn destroy_contact(&mut self, contact_index: u32, wake_bodies: bool) {
        let Some(contact) = self.contacts.get(contact_index) else {
            return;
        };
        let (shape_a, shape_b) = (contact.shape_a, contact.shape_b);
        let (body_a, body_b) = (contact.body_a(), contact.body_b());

        if contact.is_touching() && contact.flags.contains(ContactFlags::ENABLE_CONTACT_EVENTS) {
            let event = ContactEndTouchEvent {
                shape_a: self.shape_id(shape_a),
                shape_b: self.shape_id(shape_b),
            };
            self.contact_events.end_touch.push(event);
        }

        self.contact_pairs.remove(&PairKey::new(shape_a, shape_b));
        self.graph.remove_contact(contact_index, &mut self.contacts);
        self.islands
            .unlink_contact(contact_index, &self.bodies, &mut self.contacts, &self.joints);

        for (side, body_index) in [(0, body_a), (1, body_b)] {
            let body = self
                .bodies
                .get_mut(body_index)
                .unwrap_or_else(|| panic!("contact {contact_index} points to a freed body"));
            unlink_edge(&mut self.contacts, &mut body.contacts, EdgeKey::new(contact_index, side));
        }

        self.contacts.free(contact_index);

        if wake_bodies {
            self.wake_body(body_a);
            self.wake_body(body_b);
        }
    }

    /// Destroys every contact of a body.
    pub fn destroy_body_contacts(&mut self, body_index: u32, wake_bodies: bool) {
        let Some(body) = self.bodies.get(body_index) else {
            return;
        };
        let contact_indices: Vec<u32> = iter_edges(&self.contacts, body.contacts)
            .map(|key| key.index)
            .collect();

        for contact_index in contact_indices {
            self.destroy_contact(contact_index, wake_bodies);
        }
    }

    /// Destroys every contact of a shape.
    pub fn destroy_shape_contacts(&mut self, shape_index: u32, wake_bodies: bool) {
        let Some(shape) = self.shapes.get(shape_index) else {
            return;
        };
        let Some(body) = self.bodies.get(shape.body_index) else {
            return;
        };
        let contact_indices: Vec<u32> = iter_edges(&self.contacts, body.contacts)
            .filter(|key| {
                self.contacts
                    .get(key.index)
                    .is_some_and(|contact| contact.shape_a == shape_index || contact.shape_b == shape_index)
            })
            .map(|key| key.index)
            .collect();

        for contact_index in contact_indices {
            self.destroy_contact(contact_index, wake_bodies);
        }
    }

    /// Destroys every contact between two bodies. The shorter contact list is walked.
    pub fn destroy_contacts_between(&mut self, body_a: u32, body_b: u32) {
        let (Some(a), Some(b)) = (self.bodies.get(body_a), self.bodies.get(body_b)) else {
            return;
        };
        let (body, other) = if a.contacts.count <= b.contacts.count {
            (a, body_b)
        } else {
            (b, body_a)
        };

        let contact_indices: Vec<u32> = iter_edges(&self.contacts, body.contacts)
            .filter(|key| {
                self.contacts
                    .get(key.index)
                    .is_some_and(|contact| contact.edges[key.other_side().side as usize].body_index == other)
            })
            .map(|key| key.index)
            .collect();

        for contact_index in contact_indices {
            self.destroy_contact(contact_index, false);
        }
    }

    /// Returns the number of contacts between two bodies, touching or not.
    pub fn contact_count_between(&self, body_a: u32, body_b: u32) -> usize {
        let (Some(a), Some(b)) = (self.bodies.get(body_a), self.bodies.get(body_b)) else {
            return 0;
        };
        let (body, other) = if a.contacts.count <= b.contacts.count {
            (a, body_b)
        } else {
            (b, body_a)
        };

        iter_edges(&self.contacts, body.contacts)
            .filter(|key| {
                self.contacts
                    .get(key.index)
                    .is_some_and(|contact| contact.edges[key.other_side().side as usize].body_index == other)
            })
            .count()
    }

    /// Returns `false` if a joint between the bodies disables collision between them.
    pub fn should_bodies_collide(&self, body_a: u32, body_b: u32) -> bool {
        let (Some(a), Some(b)) = (self.bodies.get(body_a), self.bodies.get(body_b)) else {
            return false;
        };
        let (body, other) = if a.joints.count <= b.joints.count {
            (a, body_b)
        } else {
            (b, body_a)
        };

        !iter_edges(&self.joints, body.joints).any(|key| {
            self.joints.get(key.index).is_some_and(|joint| {
                !joint.collide_connected && joint.edges[key.other_side().side as usize].body_index == other
            })
        })
    }

    /// Links a joint into the island of its bodies and into the constraint graph.
    ///
    /// If either body is awake, the island of the other body is woken up first.
    pub fn link_joint(&mut self, joint_index: u32) {
        let Some(joint) = self.joints.get(joint_index) else {
            return;
        };
        let (index_a, index_b) = (joint.body_a(), joint.body_b());
        let (Some(body_a), Some(body_b)) = (self.bodies.get(index_a), self.bodies.get(index_b)) else {
            return;
        };

        let both_enabled = body_a.is_enabled && body_b.is_enabled;
        let any_dynamic = body_a.body_type.is_dynamic() || body_b.body_type.is_dynamic();
        let any_awake = body_a.is_simulated() || body_b.is_simulated();

        // Joints without a dynamic body are neither in an island nor in the graph.
        if !both_enabled || !any_dynamic {
            return;
        }

        if any_awake {
            self.wake_body(index_a);
            self.wake_body(index_b);
        }

        self.islands
            .link_joint(joint_index, &mut self.bodies, &mut self.contacts, &mut self.joints);

        if any_awake {
            self.graph.add_joint(joint_index, &mut self.joints, &self.bodies);
        }
    }

    /// Removes a joint from the constraint graph and its island.
    pub fn unlink_joint(&mut self, joint_index: u32) {
        self.graph.remove_joint(joint_index, &mut self.joints);
        self.islands
            .unlink_joint(joint_index, &self.bodies, &self.contacts, &mut self.joints);
    }

    /// Destroys a joint, unlinking it from both bodies, its island, and the graph.
    pub fn destroy_joint(&mut self, joint_index: u32, wake_bodies: bool) {
        let Some(joint) = self.joints.get(joint_index) else {
            return;
        };
        let (body_a, body_b) = (joint.body_a(), joint.body_b());

        self.unlink_joint(joint_index);

        for (side, body_index) in [(0, body_a), (1, body_b)] {
            let body = self
                .bodies
                .get_mut(body_index)
                .unwrap_or_else(|| panic!("joint {joint_index} points to a freed body"));
            unlink_edge(&mut self.joints, &mut body.joints, EdgeKey::new(joint_index, side));
        }

        self.joints.free(joint_index);

        if wake_bodies {
            self.wake_body(body_a);
            self.wake_body(body_b);
        }
    }

    /// Refreshes the broad-phase proxies and creates a contact for every new overlapping shape pair.
    pub fn update_pairs(&mut self) {
        let Self {
            bodies,
            shapes,
            broad_phase,
            contact_pairs,
            ..
        } = self;

        broad_phase.update_proxies(|proxy| {
            if let Some(shape) = shapes.get(proxy.shape) {
                proxy.aabb = shape.fat_aabb;
                proxy.filter = shape.filter;
            }
            if let Some(body) = bodies.get(proxy.body) {
                proxy.flags = proxy_flags(body);
            }
        });

        let mut pairs = Vec::new();
        broad_phase.sweep_and_prune(|proxy1, proxy2| {
            let key = PairKey::new(proxy1.shape, proxy2.shape);
            if !contact_pairs.contains_key(&key) {
                pairs.push(key.get());
            }
        });

        // Create contacts in a deterministic order.
        pairs.sort_unstable();

        let mut created = 0;
        for (shape_a, shape_b) in pairs {
            let (Some(a), Some(b)) = (self.shapes.get(shape_a), self.shapes.get(shape_b)) else {
                continue;
            };
            if !self.should_bodies_collide(a.body_index, b.body_index) {
                continue;
            }
            self.create_contact(shape_a, shape_b);
            created += 1;
        }

        if created > 0 {
            trace!("broad phase created {created} contacts");
        }
    }
}

/// Returns the broad-phase flags for the shapes of a body.
pub(crate) fn proxy_flags(body: &Body) -> ProxyFlags {
    let mut flags = ProxyFlags::empty();
    if !body.is_simulated() {
        flags |= ProxyFlags::IS_INACTIVE;
    }
    if !body.body_type.is_dynamic() {
        flags |= ProxyFlags::IS_NOT_DYNAMIC;
    }
    flags
}
