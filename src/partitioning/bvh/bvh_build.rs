use super::{Bvh, BvhOptions, ImplicitTree};
use crate::bounding_volume::BoundingVolume;
use crate::math::{Real, Vector, DIM};
use crate::utils::morton;

impl<N, L> Bvh<N, L>
where
    N: BoundingVolume + From<L>,
    L: BoundingVolume,
{
    /// Builds a hierarchy over the given leaf volumes with default options.
    ///
    /// Each leaf keeps the index it has in the input slice; traversal results
    /// are reported in terms of these indices.
    pub fn new(leaves: &[L]) -> Self {
        Self::with_options(leaves, BvhOptions::default())
    }

    /// Builds a hierarchy over the given leaf volumes.
    ///
    /// Leaves are ranked along a 64-bit Morton curve of their centers, then
    /// the node volumes are merged bottom-up from the leaf level to
    /// `options.built_level`.
    pub fn with_options(leaves: &[L], options: BvhOptions) -> Self {
        let tree = ImplicitTree::new(leaves.len());
        let built_level = options.built_level.clamp(1, tree.levels());

        let mut result = Self {
            tree,
            built_level,
            nodes: vec![N::default(); tree.num_internal() as usize],
            order: morton_order(leaves),
            leaves: leaves.to_vec(),
            options,
        };
        result.build_node_volumes();
        result
    }

    /// Materializes the internal-node volumes from the deepest internal level
    /// up to `built_level`, in place.
    fn build_node_volumes(&mut self) {
        let levels = self.tree.levels();
        if levels < 2 {
            return;
        }

        // The deepest internal level merges the (converted) leaf volumes.
        let deepest = levels - 1;
        if self.built_level > deepest {
            return;
        }

        let first = 1u32 << (deepest - 1);
        for k in first..first + self.tree.real_nodes_at_level(deepest) {
            let left = N::from(self.leaves[self.leaf_id(2 * k) as usize]);
            let volume = if self.tree.is_virtual(2 * k + 1) {
                left
            } else {
                left.merged(&N::from(self.leaves[self.leaf_id(2 * k + 1) as usize]))
            };
            self.nodes[self.tree.memory_index(k)] = volume;
        }

        // Every other level merges the volumes of its children.
        for level in (self.built_level..deepest).rev() {
            let first = 1u32 << (level - 1);
            for k in first..first + self.tree.real_nodes_at_level(level) {
                let left = self.nodes[self.tree.memory_index(2 * k)];
                let volume = if self.tree.is_virtual(2 * k + 1) {
                    left
                } else {
                    left.merged(&self.nodes[self.tree.memory_index(2 * k + 1)])
                };
                self.nodes[self.tree.memory_index(k)] = volume;
            }
        }
    }
}

/// The permutation sorting the leaves by the Morton code of their center.
fn morton_order<L: BoundingVolume>(leaves: &[L]) -> Vec<u32> {
    let mut order: Vec<u32> = (0..leaves.len() as u32).collect();
    if leaves.len() <= 1 {
        return order;
    }

    let mut mins = Vector::repeat(Real::MAX);
    let mut maxs = Vector::repeat(-Real::MAX);
    for leaf in leaves {
        let center = leaf.center().coords;
        mins = mins.inf(&center);
        maxs = maxs.sup(&center);
    }

    let mut extents = maxs - mins;
    for i in 0..DIM {
        if !(extents[i] > 0.0) {
            // Zero (or NaN) extent along this axis; every center collapses
            // onto morton coordinate 0 there.
            log::debug!("Degenerate leaf-center extent along axis {i}.");
            extents[i] = 1.0;
        }
    }

    let codes: Vec<u64> = leaves
        .iter()
        .map(|leaf| morton::morton_encode_unorm((leaf.center().coords - mins).component_div(&extents)))
        .collect();

    order.sort_unstable_by_key(|&i| codes[i as usize]);
    order
}
