//! Graph coloring of awake constraints for the solver.
//!
//! Each awake touching contact and each awake joint is assigned a color such that no two
//! constraints of the same color share a non-static body. The constraints of one color can
//! then be solved in any order, or in parallel, without data races on the bodies.
//!
//! Constraints that cannot find a free color end up in the overflow color, which is solved serially.

use bevy_log::trace;

use crate::{
    collision::contact::Contact,
    data_structures::{bit_vec::BitVec, pool::Pool},
    dynamics::rigid_body::Body,
};

use super::{contact::ContactConstraint, joints::Joint, joints::JointConstraint};

/// The number of regular colors in the constraint graph.
pub const GRAPH_COLOR_COUNT: usize = 12;

/// The index of the overflow color, used for constraints that don't fit in the regular colors.
/// This can happen when a single body is interacting with many other bodies.
pub const OVERFLOW_INDEX: usize = GRAPH_COLOR_COUNT;

// Solver using graph coloring. Islands are only used for sleep.
// High-Performance Physical Simulations on Next-Generation Architecture with Many Cores
// http://web.eecs.umich.edu/~msmelyan/papers/physsim_onmanycore_itj.pdf

// Kinematic bodies have to be treated like dynamic bodies in graph coloring. Unlike static bodies,
// they cannot share a dummy solver body, because their velocity is read by every constraint they take part in.

/// A color in the graph. Each color is a set of constraints that can be solved together.
#[derive(Clone, Debug, Default)]
pub struct GraphColor {
    /// A bit vector representing the bodies that are part of this color.
    ///
    /// The bit vector is indexed by the body pool index. Static bodies are never set.
    pub body_set: BitVec,
    /// The pool indices of the contacts in this color.
    pub contacts: Vec<u32>,
    /// The pool indices of the joints in this color.
    pub joints: Vec<u32>,
    /// The contact constraints prepared for the current step.
    pub contact_constraints: Vec<ContactConstraint>,
    /// The joint constraints prepared for the current step.
    pub joint_constraints: Vec<JointConstraint>,
}

/// The constraint graph: [`GRAPH_COLOR_COUNT`] regular colors and one overflow color.
#[derive(Clone, Debug)]
pub struct ConstraintGraph {
    /// The colors in the graph, with the overflow color at [`OVERFLOW_INDEX`].
    pub colors: Vec<GraphColor>,
}

impl Default for ConstraintGraph {
    fn default() -> Self {
        Self::new(16)
    }
}

impl ConstraintGraph {
    /// Creates a new constraint graph with room for the given number of bodies.
    pub fn new(body_capacity: usize) -> Self {
        let bit_capacity = body_capacity.max(8);

        let colors = (0..=GRAPH_COLOR_COUNT)
            .map(|_| {
                let mut body_set = BitVec::new(bit_capacity);
                body_set.set_bit_count_and_clear(bit_capacity);
                GraphColor {
                    body_set,
                    ..Default::default()
                }
            })
            .collect();

        Self { colors }
    }

    /// Returns the overflow color.
    #[inline]
    pub fn overflow(&self) -> &GraphColor {
        &self.colors[OVERFLOW_INDEX]
    }

    /// Returns the number of constraints in each color, with the overflow color last.
    pub fn color_counts(&self) -> [usize; GRAPH_COLOR_COUNT + 1] {
        core::array::from_fn(|i| self.colors[i].contacts.len() + self.colors[i].joints.len())
    }

    /// Finds a color for a constraint between the given bodies and marks the bodies in it.
    ///
    /// `first_static_color` is the first color to try when one of the bodies is static.
    fn assign_color(
        &mut self,
        body_a: (u32, bool),
        body_b: (u32, bool),
        first_static_color: usize,
    ) -> usize {
        let (index_a, static_a) = (body_a.0 as usize, body_a.1);
        let (index_b, static_b) = (body_b.0 as usize, body_b.1);

        match (static_a, static_b) {
            (false, false) => {
                for (i, color) in self.colors[..OVERFLOW_INDEX].iter_mut().enumerate() {
                    if color.body_set.get(index_a) || color.body_set.get(index_b) {
                        continue;
                    }

                    color.body_set.set_and_grow(index_a);
                    color.body_set.set_and_grow(index_b);
                    return i;
                }
            }
            (false, true) | (true, false) => {
                let index = if static_a { index_b } else { index_a };
                for i in first_static_color..OVERFLOW_INDEX {
                    let color = &mut self.colors[i];
                    if color.body_set.get(index) {
                        continue;
                    }

                    color.body_set.set_and_grow(index);
                    return i;
                }
            }
            (true, true) => {}
        }

        OVERFLOW_INDEX
    }

    /// Clears the bits of the given bodies in a color.
    fn release_color(&mut self, color_index: usize, body_a: u32, body_b: u32) {
        if color_index == OVERFLOW_INDEX {
            return;
        }

        let color = &mut self.colors[color_index];
        color.body_set.unset(body_a as usize);
        color.body_set.unset(body_b as usize);
    }

    /// Adds a touching contact to the graph.
    ///
    /// Contacts with a static body never use color `0`, leaving it for the
    /// contacts between two dynamic bodies, which are the most common.
    pub(crate) fn add_contact(
        &mut self,
        contact_index: u32,
        contacts: &mut Pool<Contact>,
        bodies: &Pool<Body>,
    ) {
        let Some(contact) = contacts.get_mut(contact_index) else {
            return;
        };

        debug_assert!(contact.color_index.is_none());
        debug_assert!(contact.is_touching());

        let (body_a, body_b) = (contact.body_a(), contact.body_b());
        let color_index = self.assign_color(
            (body_a, is_static(bodies, body_a)),
            (body_b, is_static(bodies, body_b)),
            1,
        );

        let color = &mut self.colors[color_index];
        contact.color_index = Some(color_index);
        contact.color_sub_index = Some(color.contacts.len());
        color.contacts.push(contact_index);

        trace!("added contact {contact_index} to color {color_index}");
    }

    /// Removes a contact from the graph.
    pub(crate) fn remove_contact(&mut self, contact_index: u32, contacts: &mut Pool<Contact>) {
        let Some(contact) = contacts.get_mut(contact_index) else {
            return;
        };
        let (Some(color_index), Some(sub_index)) =
            (contact.color_index.take(), contact.color_sub_index.take())
        else {
            return;
        };
        let (body_a, body_b) = (contact.body_a(), contact.body_b());

        debug_assert!(color_index <= OVERFLOW_INDEX);
        self.release_color(color_index, body_a, body_b);

        let color = &mut self.colors[color_index];
        debug_assert_eq!(color.contacts[sub_index], contact_index);
        color.contacts.swap_remove(sub_index);

        if let Some(&moved) = color.contacts.get(sub_index) {
            // Fix the moved contact.
            let moved_contact = contacts
                .get_mut(moved)
                .unwrap_or_else(|| panic!("contact {moved} in color {color_index} does not exist"));
            debug_assert_eq!(moved_contact.color_index, Some(color_index));
            moved_contact.color_sub_index = Some(sub_index);
        }
    }

    /// Adds a joint to the graph.
    pub(crate) fn add_joint(&mut self, joint_index: u32, joints: &mut Pool<Joint>, bodies: &Pool<Body>) {
        let Some(joint) = joints.get_mut(joint_index) else {
            return;
        };

        debug_assert!(joint.color_index.is_none());

        let (body_a, body_b) = (joint.body_a(), joint.body_b());
        let color_index = self.assign_color(
            (body_a, is_static(bodies, body_a)),
            (body_b, is_static(bodies, body_b)),
            0,
        );

        let color = &mut self.colors[color_index];
        joint.color_index = Some(color_index);
        joint.color_sub_index = Some(color.joints.len());
        color.joints.push(joint_index);

        trace!("added joint {joint_index} to color {color_index}");
    }

    /// Removes a joint from the graph.
    pub(crate) fn remove_joint(&mut self, joint_index: u32, joints: &mut Pool<Joint>) {
        let Some(joint) = joints.get_mut(joint_index) else {
            return;
        };
        let (Some(color_index), Some(sub_index)) =
            (joint.color_index.take(), joint.color_sub_index.take())
        else {
            return;
        };
        let (body_a, body_b) = (joint.body_a(), joint.body_b());

        self.release_color(color_index, body_a, body_b);

        let color = &mut self.colors[color_index];
        debug_assert_eq!(color.joints[sub_index], joint_index);
        color.joints.swap_remove(sub_index);

        if let Some(&moved) = color.joints.get(sub_index) {
            // Fix the moved joint.
            let moved_joint = joints
                .get_mut(moved)
                .unwrap_or_else(|| panic!("joint {moved} in color {color_index} does not exist"));
            debug_assert_eq!(moved_joint.color_index, Some(color_index));
            moved_joint.color_sub_index = Some(sub_index);
        }
    }

    /// Checks that every constraint in the graph points back at its slot and that no two
    /// constraints of a regular color share a non-static body.
    ///
    /// A regular color must mark exactly the bodies of its constraints.
    pub(crate) fn validate(&self, contacts: &Pool<Contact>, joints: &Pool<Joint>, bodies: &Pool<Body>) {
        for (color_index, color) in self.colors.iter().enumerate() {
            let mut seen = BitVec::default();

            let mut check_body = |body_index: u32| {
                if color_index == OVERFLOW_INDEX || is_static(bodies, body_index) {
                    return;
                }
                assert!(
                    !seen.get(body_index as usize),
                    "body {body_index} appears twice in color {color_index}"
                );
                assert!(color.body_set.get(body_index as usize));
                seen.set_and_grow(body_index as usize);
            };

            for (sub_index, &contact_index) in color.contacts.iter().enumerate() {
                let contact = contacts
                    .get(contact_index)
                    .unwrap_or_else(|| panic!("contact {contact_index} does not exist"));
                assert_eq!(contact.color_index, Some(color_index));
                assert_eq!(contact.color_sub_index, Some(sub_index));
                check_body(contact.body_a());
                check_body(contact.body_b());
            }

            for (sub_index, &joint_index) in color.joints.iter().enumerate() {
                let joint = joints
                    .get(joint_index)
                    .unwrap_or_else(|| panic!("joint {joint_index} does not exist"));
                assert_eq!(joint.color_index, Some(color_index));
                assert_eq!(joint.color_sub_index, Some(sub_index));
                check_body(joint.body_a());
                check_body(joint.body_b());
            }

            if color_index != OVERFLOW_INDEX && seen.count_ones() != color.body_set.count_ones() {
                let stale: Vec<usize> = color.body_set.iter_ones().filter(|&i| !seen.get(i)).collect();
                panic!("color {color_index} marks bodies {stale:?} without a constraint");
            }
        }
    }
}

#[inline]
fn is_static(bodies: &Pool<Body>, body_index: u32) -> bool {
    bodies
        .get(body_index)
        .is_none_or(|body| body.body_type.is_static())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{collision::contact::ContactFlags, dynamics::rigid_body::BodyDef, math::Vector};

    fn touching(contacts: &mut Pool<Contact>, body_a: u32, body_b: u32) -> u32 {
        let mut contact = Contact::new(0, body_a, 0, body_b, 0.6, 0.0, false);
        contact.flags |= ContactFlags::TOUCHING;
        contacts.alloc(contact).0
    }

    #[test]
    fn contacts_sharing_a_body_get_different_colors() {
        let mut bodies = Pool::default();
        let ground = bodies.alloc(Body::new(&BodyDef::fixed(Vector::ZERO))).0;
        let a = bodies.alloc(Body::new(&BodyDef::dynamic(Vector::ZERO))).0;
        let b = bodies.alloc(Body::new(&BodyDef::dynamic(Vector::ZERO))).0;
        let c = bodies.alloc(Body::new(&BodyDef::dynamic(Vector::ZERO))).0;

        let mut contacts = Pool::default();
        let joints = Pool::default();
        let mut graph = ConstraintGraph::default();

        let ab = touching(&mut contacts, a, b);
        let bc = touching(&mut contacts, b, c);
        let ground_a = touching(&mut contacts, ground, a);

        for contact in [ab, bc, ground_a] {
            graph.add_contact(contact, &mut contacts, &bodies);
        }

        assert_eq!(contacts.get(ab).unwrap().color_index, Some(0));
        assert_eq!(contacts.get(bc).unwrap().color_index, Some(1));
        // Static contacts skip color 0, and body `a` is already in color 0.
        assert_eq!(contacts.get(ground_a).unwrap().color_index, Some(1));
        graph.validate(&contacts, &joints, &bodies);

        graph.remove_contact(ab, &mut contacts);
        assert_eq!(contacts.get(ab).unwrap().color_index, None);
        assert!(!graph.colors[0].body_set.get(a as usize));
        assert_eq!(graph.color_counts()[1], 2);
        graph.validate(&contacts, &joints, &bodies);
    }

    #[test]
    fn removal_fixes_moved_sub_index() {
        let mut bodies = Pool::default();
        let ground = bodies.alloc(Body::new(&BodyDef::fixed(Vector::ZERO))).0;
        let dynamic: Vec<u32> = (0..3)
            .map(|_| bodies.alloc(Body::new(&BodyDef::dynamic(Vector::ZERO))).0)
            .collect();

        let mut contacts = Pool::default();
        let joints = Pool::default();
        let mut graph = ConstraintGraph::default();

        let ids: Vec<u32> = dynamic
            .iter()
            .map(|&body| touching(&mut contacts, ground, body))
            .collect();
        for &id in &ids {
            graph.add_contact(id, &mut contacts, &bodies);
        }
        assert_eq!(graph.colors[1].contacts, ids);

        graph.remove_contact(ids[0], &mut contacts);
        assert_eq!(contacts.get(ids[2]).unwrap().color_sub_index, Some(0));
        graph.validate(&contacts, &joints, &bodies);
    }

    #[test]
    fn saturated_body_overflows() {
        let mut bodies = Pool::default();
        let hub = bodies.alloc(Body::new(&BodyDef::dynamic(Vector::ZERO))).0;
        let mut contacts = Pool::default();
        let joints = Pool::default();
        let mut graph = ConstraintGraph::default();

        for _ in 0..GRAPH_COLOR_COUNT + 2 {
            let other = bodies.alloc(Body::new(&BodyDef::dynamic(Vector::ZERO))).0;
            let contact = touching(&mut contacts, hub, other);
            graph.add_contact(contact, &mut contacts, &bodies);
        }

        let counts = graph.color_counts();
        assert!(counts[..GRAPH_COLOR_COUNT].iter().all(|&count| count == 1));
        assert_eq!(counts[OVERFLOW_INDEX], 2);
        graph.validate(&contacts, &joints, &bodies);
    }

    #[test]
    #[should_panic(expected = "without a constraint")]
    fn stale_color_bits_fail_validation() {
        let mut bodies = Pool::default();
        let a = bodies.alloc(Body::new(&BodyDef::dynamic(Vector::ZERO))).0;
        let b = bodies.alloc(Body::new(&BodyDef::dynamic(Vector::ZERO))).0;
        let c = bodies.alloc(Body::new(&BodyDef::dynamic(Vector::ZERO))).0;
        let mut contacts = Pool::default();
        let joints = Pool::default();
        let mut graph = ConstraintGraph::default();

        let ab = touching(&mut contacts, a, b);
        graph.add_contact(ab, &mut contacts, &bodies);
        graph.validate(&contacts, &joints, &bodies);

        graph.colors[0].body_set.set_and_grow(c as usize);
        graph.validate(&contacts, &joints, &bodies);
    }
}
