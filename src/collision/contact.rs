//! Persistent contacts between pairs of shapes, and contact events.

use crate::{
    data_structures::edge_list::{Edge, EdgeOwner},
    dynamics::solver::islands::{IslandMember, IslandNode},
    id::{ContactId, ShapeId},
    math::Scalar,
};

use super::manifold::Manifold;

/// Flags indicating the status of a [`Contact`].
#[repr(transparent)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[derive(Hash, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ContactFlags(u16);

bitflags::bitflags! {
    impl ContactFlags: u16 {
        /// Set if the manifold has at least one point.
        const TOUCHING = 0b0000_0001;
        /// Set if the shapes started touching this step.
        const STARTED_TOUCHING = 0b0000_0010;
        /// Set if the shapes stopped touching this step.
        const STOPPED_TOUCHING = 0b0000_0100;
        /// Set if the fat AABBs of the shapes no longer overlap. The contact is destroyed.
        const DISJOINT = 0b0000_1000;
        /// Set if the contact reports begin and end touch events.
        const ENABLE_CONTACT_EVENTS = 0b0001_0000;
        /// Set if the pre-solve callback disabled the contact for this step.
        const DISABLED = 0b0010_0000;
    }
}

/// A contact between two shapes, stored in the world's contact pool.
///
/// A contact exists while the fat AABBs of its shapes overlap. It is only solved
/// while it is touching, and it is linked into an island and the constraint graph
/// for as long as it touches.
#[derive(Clone, Debug)]
pub(crate) struct Contact {
    pub flags: ContactFlags,
    pub shape_a: u32,
    pub shape_b: u32,
    /// Edge `0` links into the contact list of body A, edge `1` into the list of body B.
    pub edges: [Edge; 2],
    pub island: Option<IslandNode>,
    pub color_index: Option<usize>,
    pub color_sub_index: Option<usize>,
    pub manifold: Manifold,
    pub friction: Scalar,
    pub restitution: Scalar,
}

impl Contact {
    pub fn new(
        shape_a: u32,
        body_a: u32,
        shape_b: u32,
        body_b: u32,
        friction: Scalar,
        restitution: Scalar,
        enable_contact_events: bool,
    ) -> Self {
        let mut flags = ContactFlags::empty();
        flags.set(ContactFlags::ENABLE_CONTACT_EVENTS, enable_contact_events);

        Self {
            flags,
            shape_a,
            shape_b,
            edges: [Edge::new(body_a), Edge::new(body_b)],
            island: None,
            color_index: None,
            color_sub_index: None,
            manifold: Manifold::default(),
            friction,
            restitution,
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

    #[inline]
    pub fn is_touching(&self) -> bool {
        self.flags.contains(ContactFlags::TOUCHING)
    }
}

impl EdgeOwner for Contact {
    #[inline]
    fn edges(&self) -> &[Edge; 2] {
        &self.edges
    }

    #[inline]
    fn edges_mut(&mut self) -> &mut [Edge; 2] {
        &mut self.edges
    }
}

impl IslandMember for Contact {
    #[inline]
    fn island(&self) -> Option<&IslandNode> {
        self.island.as_ref()
    }

    #[inline]
    fn island_mut(&mut self) -> &mut Option<IslandNode> {
        &mut self.island
    }
}

/// Sent when two shapes start touching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ContactBeginTouchEvent {
    /// The contact between the shapes. Valid until the shapes stop overlapping.
    pub contact: ContactId,
    /// The first shape.
    pub shape_a: ShapeId,
    /// The second shape.
    pub shape_b: ShapeId,
}

/// Sent when two shapes stop touching.
///
/// The shapes may have been destroyed, so their handles can be stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ContactEndTouchEvent {
    /// The first shape.
    pub shape_a: ShapeId,
    /// The second shape.
    pub shape_b: ShapeId,
}

/// Contact events collected during the last step.
#[derive(Clone, Debug, Default)]
pub struct ContactEvents {
    /// Shape pairs that started touching.
    pub begin_touch: Vec<ContactBeginTouchEvent>,
    /// Shape pairs that stopped touching.
    pub end_touch: Vec<ContactEndTouchEvent>,
}

impl ContactEvents {
    pub(crate) fn clear(&mut self) {
        self.begin_touch.clear();
        self.end_touch.clear();
    }
}
