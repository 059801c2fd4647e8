//! A unique key for an unordered pair of shape indices.

/// A unique key for an unordered pair of pool indices.
///
/// Used to look up whether a contact already exists between two shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PairKey(pub u64);

impl PairKey {
    /// Creates a new pair key from two indices. The order of the indices does not matter.
    #[inline]
    pub const fn new(id1: u32, id2: u32) -> Self {
        if id1 < id2 {
            Self(((id1 as u64) << 32) | id2 as u64)
        } else {
            Self(((id2 as u64) << 32) | id1 as u64)
        }
    }

    /// Gets the two indices stored in the pair key in ascending order.
    #[inline]
    pub fn get(&self) -> (u32, u32) {
        (
            ((self.0 >> 32) & 0xFFFF_FFFF) as u32,
            (self.0 & 0xFFFF_FFFF) as u32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::PairKey;

    #[test]
    fn pair_key_is_order_independent() {
        assert_eq!(PairKey::new(7, 3), PairKey::new(3, 7));
        assert_eq!(PairKey::new(7, 3).get(), (3, 7));
    }
}
