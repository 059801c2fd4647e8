//! A [`Pool`] of revisioned slots, used to store bodies, shapes, contacts, and joints.
//!
//! Each slot has a stable index and a revision counter. The revision is bumped every time
//! the slot is freed, so handles that captured an older revision can be detected as stale
//! even after the index has been reused.

use std::collections::BinaryHeap;
use core::cmp::Reverse;

/// A pool for efficient allocation and reuse of `u32` indices.
///
/// Freed indices are stored in a min-heap, and reused such that the lowest available indices are allocated first.
#[derive(Clone, Debug, Default)]
pub struct IdPool {
    /// A min-heap of free indices. The lowest free indices are allocated first.
    free_ids: BinaryHeap<Reverse<u32>>,
    /// The next index to be allocated. Only incremented when no free indices are available.
    next_index: u32,
}

impl IdPool {
    /// Creates a new empty [`IdPool`].
    #[inline]
    pub const fn new() -> Self {
        Self {
            free_ids: BinaryHeap::new(),
            next_index: 0,
        }
    }

    /// Allocates a new index.
    ///
    /// If there are free indices available, the lowest free index is reused.
    #[inline]
    pub fn alloc(&mut self) -> u32 {
        if let Some(id) = self.free_ids.pop() {
            id.0
        } else {
            let id = self.next_index;
            self.next_index += 1;
            id
        }
    }

    /// Frees an index, making it available for reuse.
    ///
    /// The index is assumed to not already be freed.
    #[inline]
    pub fn free(&mut self, id: u32) {
        debug_assert!(id < self.next_index);
        self.free_ids.push(Reverse(id));
    }

    /// Returns the number of allocated indices.
    #[inline]
    pub fn len(&self) -> usize {
        self.next_index as usize - self.free_ids.len()
    }

    /// Returns the total number of indices (allocated + free).
    #[inline]
    pub fn total_len(&self) -> usize {
        self.next_index as usize
    }

    /// Returns `true` if the pool is empty (no allocated indices).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug)]
struct Slot<T> {
    revision: u16,
    value: Option<T>,
}

/// A slot allocator that stores values at stable indices with revision counters.
#[derive(Clone, Debug)]
pub struct Pool<T> {
    slots: Vec<Slot<T>>,
    ids: IdPool,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl<T> Pool<T> {
    /// Creates a new empty [`Pool`] with room for `capacity` values.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            ids: IdPool::new(),
        }
    }

    /// Stores a value in a free slot, returning its index and current revision.
    pub fn alloc(&mut self, value: T) -> (u32, u16) {
        let index = self.ids.alloc();

        if index as usize == self.slots.len() {
            self.slots.push(Slot {
                revision: 0,
                value: Some(value),
            });
            return (index, 0);
        }

        let slot = &mut self.slots[index as usize];
        debug_assert!(slot.value.is_none(), "slot {index} allocated twice");
        slot.value = Some(value);
        (index, slot.revision)
    }

    /// Frees the slot at `index`, bumping its revision and returning the stored value.
    ///
    /// Returns `None` if the slot is not occupied.
    pub fn free(&mut self, index: u32) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;
        let value = slot.value.take()?;
        slot.revision = slot.revision.wrapping_add(1);
        self.ids.free(index);
        Some(value)
    }

    /// Returns `true` if the slot at `index` is occupied and has the given revision.
    #[inline]
    pub fn is_valid(&self, index: u32, revision: u16) -> bool {
        self.slots
            .get(index as usize)
            .is_some_and(|slot| slot.value.is_some() && slot.revision == revision)
    }

    /// Returns the current revision of the slot at `index`.
    #[inline]
    pub fn revision(&self, index: u32) -> Option<u16> {
        self.slots.get(index as usize).map(|slot| slot.revision)
    }

    /// Returns a reference to the value at `index`, if the slot is occupied.
    #[inline]
    pub fn get(&self, index: u32) -> Option<&T> {
        self.slots.get(index as usize)?.value.as_ref()
    }

    /// Returns a mutable reference to the value at `index`, if the slot is occupied.
    #[inline]
    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.slots.get_mut(index as usize)?.value.as_mut()
    }

    /// Returns a reference to the value at `index` if the slot has the given revision.
    #[inline]
    pub fn get_checked(&self, index: u32, revision: u16) -> Option<&T> {
        let slot = self.slots.get(index as usize)?;
        if slot.revision != revision {
            return None;
        }
        slot.value.as_ref()
    }

    /// Returns a mutable reference to the value at `index` if the slot has the given revision.
    #[inline]
    pub fn get_checked_mut(&mut self, index: u32, revision: u16) -> Option<&mut T> {
        let slot = self.slots.get_mut(index as usize)?;
        if slot.revision != revision {
            return None;
        }
        slot.value.as_mut()
    }

    /// Returns an iterator over the occupied slots and their indices.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.value.as_ref().map(|value| (i as u32, value)))
    }

    /// Returns a mutable iterator over the occupied slots and their indices.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.value.as_mut().map(|value| (i as u32, value)))
    }

    /// Returns the indices of all occupied slots.
    pub fn indices(&self) -> Vec<u32> {
        self.iter().map(|(i, _)| i).collect()
    }

    /// Returns the number of occupied slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` if no slots are occupied.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns the number of slots ever created, occupied or free.
    ///
    /// Valid indices are always below this value.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.ids.total_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowest_free_index_is_reused() {
        let mut pool = Pool::default();
        let (a, _) = pool.alloc("a");
        let (b, _) = pool.alloc("b");
        let (c, _) = pool.alloc("c");
        assert_eq!((a, b, c), (0, 1, 2));

        pool.free(c);
        pool.free(a);

        let (d, _) = pool.alloc("d");
        assert_eq!(d, 0);
        let (e, _) = pool.alloc("e");
        assert_eq!(e, 2);
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.capacity(), 3);
    }

    #[test]
    fn freeing_bumps_revision() {
        let mut pool = Pool::default();
        let (index, revision) = pool.alloc(10);
        assert!(pool.is_valid(index, revision));

        assert_eq!(pool.free(index), Some(10));
        assert!(!pool.is_valid(index, revision));
        assert!(pool.get_checked(index, revision).is_none());

        let (reused, new_revision) = pool.alloc(20);
        assert_eq!(reused, index);
        assert_ne!(new_revision, revision);
        assert!(!pool.is_valid(index, revision));
        assert_eq!(pool.get_checked(index, new_revision), Some(&20));
    }

    #[test]
    fn double_free_is_rejected() {
        let mut pool = Pool::default();
        let (index, _) = pool.alloc(1);
        assert!(pool.free(index).is_some());
        assert!(pool.free(index).is_none());
        assert!(pool.free(99).is_none());
        assert!(pool.is_empty());
    }
}
