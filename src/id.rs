//! Opaque handles to objects owned by a [`World`](crate::world::World).
//!
//! A handle stores the pool index of the object, the index of the world that owns it,
//! and the revision of the pool slot at the time the object was created. Destroying an
//! object bumps the slot's revision, so old handles are detected as stale even when
//! the slot is reused.

use core::sync::atomic::{AtomicU16, Ordering};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name {
            /// The index of the object in its pool.
            pub index: u32,
            /// The index of the world that owns the object.
            pub world: u16,
            /// The revision of the pool slot when the object was created.
            pub revision: u16,
        }

        impl $name {
            /// A handle that never refers to a live object.
            pub const NULL: Self = Self {
                index: u32::MAX,
                world: u16::MAX,
                revision: 0,
            };

            #[inline]
            pub(crate) const fn new(index: u32, world: u16, revision: u16) -> Self {
                Self {
                    index,
                    world,
                    revision,
                }
            }

            /// Returns `true` if this is the [null](Self::NULL) handle.
            #[inline]
            pub const fn is_null(self) -> bool {
                self.index == u32::MAX && self.world == u16::MAX
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::NULL
            }
        }
    };
}

define_id!(
    /// A handle to a rigid body.
    BodyId
);
define_id!(
    /// A handle to a shape attached to a rigid body.
    ShapeId
);
define_id!(
    /// A handle to a joint between two rigid bodies.
    JointId
);
define_id!(
    /// A handle to a contact between two shapes.
    ContactId
);

static NEXT_WORLD_INDEX: AtomicU16 = AtomicU16::new(0);

/// Allocates a process-wide unique world index.
///
/// Handles from one world are never valid in another, even if the pool indices match.
pub(crate) fn next_world_index() -> u16 {
    NEXT_WORLD_INDEX.fetch_add(1, Ordering::Relaxed)
}
