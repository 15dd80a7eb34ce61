pub use bvh_bvtt::{IndexPair, Traversal, TraversalCache, TraversalError};
pub use bvh_tree::{Bvh, BvhOptions, ImplicitTree};

#[cfg(feature = "parallel")]
use bvh_partition::TaskPartition;

mod bvh_build;
mod bvh_bvtt;
#[cfg(feature = "parallel")]
mod bvh_partition;
mod bvh_traverse;
mod bvh_traverse_rays;
mod bvh_tree;
