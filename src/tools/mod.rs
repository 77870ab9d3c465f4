//! modules shared by the two coders

pub mod bits;
pub mod symbol;
pub mod block;
pub mod huffman_tree;
pub mod adaptive_tree;
