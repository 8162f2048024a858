//! Answering "what keeps this object alive?" for a parsed heap: target
//! selection, the root search itself, and the tree and DOT renderings of the
//! resulting paths.

pub mod analysis;
pub mod dot_output;
pub mod labels;
pub mod path_tree;
pub mod reachability;
pub mod shape_compression;
pub mod targets;
pub mod union_find;
