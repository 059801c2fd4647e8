//! Specialized data structures used by the engine.

pub mod bit_vec;
pub mod edge_list;
pub mod pair_key;
pub mod pool;

pub use arrayvec::ArrayVec;
