//! A minimalistic dynamically sized compact bit vector with a fixed block size of 64 bits.
//!
//! Only a very limited set of operations are supported.

use core::ops::BitOrAssign;
use core::slice;

/// A dynamically sized compact bit vector with a fixed block size of 64 bits.
#[derive(Clone, Debug, Default)]
pub struct BitVec {
    blocks: Vec<u64>,
    block_count: usize,
}

#[inline]
fn bits_to_blocks(bits: usize) -> usize {
    bits.div_ceil(u64::BITS as usize)
}

impl BitVec {
    /// Creates a new [`BitVec`] with the specified bit capacity.
    ///
    /// All bits within the capacity are addressable and unset.
    #[inline]
    pub fn new(bit_capacity: usize) -> Self {
        let block_count = bits_to_blocks(bit_capacity);

        Self {
            blocks: vec![0; block_count],
            block_count,
        }
    }

    /// Sets the bit count of the [`BitVec`] and clears all bits.
    ///
    /// If the new bit count exceeds the current block capacity, the block capacity is increased.
    #[inline]
    pub fn set_bit_count_and_clear(&mut self, bit_count: usize) {
        let block_count = bits_to_blocks(bit_count);

        if self.blocks.len() < block_count {
            let new_bit_capacity = bit_count + (bit_count >> 1);
            self.blocks.resize(bits_to_blocks(new_bit_capacity), 0);
        }

        self.block_count = block_count;
        self.blocks.iter_mut().for_each(|b| *b = 0);
    }

    /// Sets the bit at the specified index.
    ///
    /// # Panics
    ///
    /// Panics if the index exceeds the current bit count with `debug_assertions` enabled.
    #[inline]
    pub fn set(&mut self, index: usize) {
        let block_index = index / 64;
        debug_assert!(block_index < self.block_count);
        let bit_index = index % 64;
        let mask = 1 << bit_index;
        self.blocks[block_index] |= mask;
    }

    /// Sets the bit at the specified index, growing the bit vector if needed.
    #[inline]
    pub fn set_and_grow(&mut self, index: usize) {
        let block_index = index / 64;

        if block_index >= self.block_count {
            let new_block_count = block_index + 1;
            if self.blocks.len() < new_block_count {
                self.blocks.resize(new_block_count + (new_block_count >> 1), 0);
            }
            self.block_count = new_block_count;
        }

        self.set(index);
    }

    /// Unsets the bit at the specified index.
    #[inline]
    pub fn unset(&mut self, index: usize) {
        let block_index = index / 64;
        if block_index >= self.block_count {
            return;
        }
        let bit_index = index % 64;
        let mask = 1 << bit_index;
        self.blocks[block_index] &= !mask;
    }

    /// Gets the bit at the specified index.
    ///
    /// Returns `false` if the index is out of bounds or the bit is unset.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        let block_index = index / 64;
        if block_index >= self.block_count {
            return false;
        }
        let bit_index = index % 64;
        let mask = 1 << bit_index;
        (self.blocks[block_index] & mask) != 0
    }

    /// Returns the block count of the [`BitVec`].
    #[inline]
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Returns the number of set bits.
    #[inline]
    pub fn count_ones(&self) -> usize {
        self.blocks().map(|block| block.count_ones() as usize).sum()
    }

    /// Clears all bits in the [`BitVec`].
    #[inline]
    pub fn clear(&mut self) {
        self.blocks.iter_mut().for_each(|b| *b = 0);
    }

    /// Returns an iterator over the blocks of the [`BitVec`].
    #[inline]
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            iter: self.blocks[..self.block_count].iter(),
        }
    }

    /// Returns an iterator over the indices of the set bits, in ascending order.
    #[inline]
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.blocks().enumerate().flat_map(|(k, block)| {
            let mut word = block;
            core::iter::from_fn(move || {
                if word == 0 {
                    return None;
                }
                let index = 64 * k + word.trailing_zeros() as usize;
                // Clear the lowest set bit.
                word &= word - 1;
                Some(index)
            })
        })
    }

    /// Performs an in-place bitwise OR operation with another [`BitVec`].
    #[inline]
    pub fn or(&mut self, other: &Self) {
        debug_assert!(
            self.block_count == other.block_count,
            "block counts do not match for `BitVec::or` ({} != {})",
            self.block_count,
            other.block_count
        );

        for i in 0..self.block_count {
            self.blocks[i] |= other.blocks[i];
        }
    }
}

impl BitOrAssign<&BitVec> for BitVec {
    #[inline]
    fn bitor_assign(&mut self, rhs: &BitVec) {
        self.or(rhs);
    }
}

/// An iterator over the blocks of a [`BitVec`].
#[derive(Clone)]
pub struct Blocks<'a> {
    iter: slice::Iter<'a, u64>,
}

impl Iterator for Blocks<'_> {
    type Item = u64;

    #[inline]
    fn next(&mut self) -> Option<u64> {
        self.iter.next().cloned()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl ExactSizeIterator for Blocks<'_> {}

#[cfg(test)]
mod tests {
    use super::BitVec;

    #[test]
    fn set_and_grow_extends_bit_count() {
        let mut bits = BitVec::new(8);
        assert!(!bits.get(200));

        bits.set_and_grow(200);
        bits.set_and_grow(3);

        assert!(bits.get(200));
        assert!(bits.get(3));
        assert!(!bits.get(4));
        assert_eq!(bits.iter_ones().collect::<Vec<_>>(), vec![3, 200]);

        bits.unset(200);
        assert!(!bits.get(200));
        assert_eq!(bits.count_ones(), 1);
    }

    #[test]
    fn or_combines_bits() {
        let mut a = BitVec::new(128);
        let mut b = BitVec::new(128);
        a.set(1);
        b.set(100);
        a |= &b;
        assert_eq!(a.iter_ones().collect::<Vec<_>>(), vec![1, 100]);
    }
}
