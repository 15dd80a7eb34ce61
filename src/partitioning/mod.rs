//! Spatial partitioning tools.

pub use self::bvh::{
    Bvh, BvhOptions, ImplicitTree, IndexPair, Traversal, TraversalCache, TraversalError,
};

mod bvh;
