//! Per-body doubly linked lists of constraint edges.
//!
//! Every joint and contact connects exactly two bodies and owns two [`Edge`]s,
//! one per side. The edges of all constraints attached to a body form a doubly linked
//! list whose head is stored in the body's [`EdgeList`]. Links are [`EdgeKey`]s that
//! name a constraint slot and a side, so a constraint can be spliced out of both of its
//! lists in constant time without moving anything.

use super::pool::Pool;

/// A reference to one side of a two-sided constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EdgeKey {
    /// The index of the constraint in its pool.
    pub index: u32,
    /// The side of the constraint, `0` for body A and `1` for body B.
    pub side: u8,
}

impl EdgeKey {
    /// Creates a new [`EdgeKey`].
    #[inline]
    pub const fn new(index: u32, side: u8) -> Self {
        debug_assert!(side < 2);
        Self { index, side }
    }

    /// Returns the key of the opposite side of the same constraint.
    #[inline]
    pub const fn other_side(self) -> Self {
        Self {
            index: self.index,
            side: self.side ^ 1,
        }
    }
}

/// A node in a body's constraint list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    /// The index of the body this side of the constraint is attached to.
    pub body_index: u32,
    /// The previous edge in the body's list.
    pub prev_key: Option<EdgeKey>,
    /// The next edge in the body's list.
    pub next_key: Option<EdgeKey>,
}

impl Edge {
    /// Creates an unlinked edge attached to the given body.
    #[inline]
    pub const fn new(body_index: u32) -> Self {
        Self {
            body_index,
            prev_key: None,
            next_key: None,
        }
    }
}

/// The head of a body's constraint list and the number of constraints in it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EdgeList {
    /// The first edge in the list.
    pub head: Option<EdgeKey>,
    /// The number of edges in the list.
    pub count: u32,
}

/// A constraint stored in a [`Pool`] that has one [`Edge`] per attached body.
pub trait EdgeOwner {
    /// Returns the two edges of the constraint.
    fn edges(&self) -> &[Edge; 2];

    /// Returns the two edges of the constraint mutably.
    fn edges_mut(&mut self) -> &mut [Edge; 2];
}

fn edge_mut<T: EdgeOwner>(pool: &mut Pool<T>, key: EdgeKey) -> &mut Edge {
    let owner = pool
        .get_mut(key.index)
        .unwrap_or_else(|| panic!("edge {key:?} points to a freed slot"));
    &mut owner.edges_mut()[key.side as usize]
}

/// Inserts the edge named by `key` at the head of `list`.
///
/// The edge's `body_index` must already be set.
pub fn link_edge<T: EdgeOwner>(pool: &mut Pool<T>, list: &mut EdgeList, key: EdgeKey) {
    let old_head = list.head;

    {
        let edge = edge_mut(pool, key);
        edge.prev_key = None;
        edge.next_key = old_head;
    }

    if let Some(head_key) = old_head {
        edge_mut(pool, head_key).prev_key = Some(key);
    }

    list.head = Some(key);
    list.count += 1;
}

/// Removes the edge named by `key` from `list`, repairing its neighbors.
pub fn unlink_edge<T: EdgeOwner>(pool: &mut Pool<T>, list: &mut EdgeList, key: EdgeKey) {
    let edge = *edge_mut(pool, key);

    if let Some(prev_key) = edge.prev_key {
        edge_mut(pool, prev_key).next_key = edge.next_key;
    }

    if let Some(next_key) = edge.next_key {
        edge_mut(pool, next_key).prev_key = edge.prev_key;
    }

    if list.head == Some(key) {
        list.head = edge.next_key;
    }

    debug_assert!(list.count > 0);
    list.count -= 1;

    let edge = edge_mut(pool, key);
    edge.prev_key = None;
    edge.next_key = None;
}

/// An iterator over the edge keys of a body's constraint list.
pub struct EdgeIter<'a, T> {
    pool: &'a Pool<T>,
    next: Option<EdgeKey>,
}

impl<T: EdgeOwner> Iterator for EdgeIter<'_, T> {
    type Item = EdgeKey;

    fn next(&mut self) -> Option<EdgeKey> {
        let key = self.next?;
        let owner = self
            .pool
            .get(key.index)
            .unwrap_or_else(|| panic!("edge {key:?} points to a freed slot"));
        self.next = owner.edges()[key.side as usize].next_key;
        Some(key)
    }
}

/// Iterates over the edge keys of `list`, from head to tail.
pub fn iter_edges<T: EdgeOwner>(pool: &Pool<T>, list: EdgeList) -> EdgeIter<'_, T> {
    EdgeIter {
        pool,
        next: list.head,
    }
}
