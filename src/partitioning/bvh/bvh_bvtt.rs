use super::Bvh;
use crate::bounding_volume::BoundingVolume;

/// A pair of indices in a traversal work queue or in a contact list.
///
/// Inside the traversal this is either a pair of implicit node indices
/// `(u, v)` with `u <= v` (`u == v` marks a *self-check*, i.e. the
/// descendants of `u` still have to be tested against each other), or a
/// `(node, ray)` pair. In a [`Traversal`] contact list it is a pair of
/// original leaf indices, or a `(leaf, ray)` pair.
pub type IndexPair = (u32, u32);

/// Reusable scratch buffers for BVH traversals.
///
/// A traversal needs two index-pair buffers which it alternately reads and
/// writes while expanding the work queue level by level. Passing the cache of
/// a previous [`Traversal`] (see [`Traversal::into_cache`]) to the next call
/// reuses its allocations; buffer capacities only ever grow. Caches are
/// query-agnostic: a cache produced by a self-traversal may be handed to a
/// ray traversal and vice versa.
#[derive(Clone, Debug, Default)]
pub struct TraversalCache {
    pub(super) cache1: Vec<IndexPair>,
    pub(super) cache2: Vec<IndexPair>,
}

impl TraversalCache {
    /// A cache with no pre-allocated buffers.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Grows `buf` so it holds at least `len` items. Buffers never shrink.
pub(super) fn ensure_len(buf: &mut Vec<IndexPair>, len: usize) {
    if buf.len() < len {
        buf.resize(len, (0, 0));
    }
}

/// The result of a BVH traversal.
///
/// The contact pairs are the dense prefix of the first internal buffer,
/// exposed by [`Self::contacts`]. Call [`Self::into_cache`] once done with
/// them to recover the buffers for a later traversal.
#[derive(Clone, Debug)]
pub struct Traversal {
    pub(super) start_level: u32,
    pub(super) num_checks: usize,
    pub(super) num_contacts: usize,
    pub(super) cache1: Vec<IndexPair>,
    pub(super) cache2: Vec<IndexPair>,
}

impl Traversal {
    /// An empty result recycling the given cache untouched.
    pub(super) fn empty(start_level: u32, cache: TraversalCache) -> Self {
        Self {
            start_level,
            num_checks: 0,
            num_contacts: 0,
            cache1: cache.cache1,
            cache2: cache.cache2,
        }
    }

    /// The contact pairs found by the traversal, in no particular order.
    ///
    /// For self-traversals each pair holds two original leaf indices with
    /// `pair.0 < pair.1`; for ray traversals it is `(leaf, ray)`.
    #[inline]
    pub fn contacts(&self) -> &[IndexPair] {
        &self.cache1[..self.num_contacts]
    }

    /// The level the traversal started at.
    #[inline]
    pub fn start_level(&self) -> u32 {
        self.start_level
    }

    /// The total number of work items processed across all levels. Mostly
    /// useful for profiling.
    #[inline]
    pub fn num_checks(&self) -> usize {
        self.num_checks
    }

    /// The number of contact pairs found.
    #[inline]
    pub fn num_contacts(&self) -> usize {
        self.num_contacts
    }

    /// Recovers the scratch buffers for reuse by a later traversal.
    pub fn into_cache(self) -> TraversalCache {
        TraversalCache {
            cache1: self.cache1,
            cache2: self.cache2,
        }
    }
}

/// Errors detected before any traversal work is performed.
#[derive(thiserror::Error, Copy, Clone, Debug, PartialEq, Eq)]
pub enum TraversalError {
    /// The requested start level lies outside `built_level..=levels`.
    #[error("start level {start_level} is outside the valid range {built_level}..={levels}")]
    StartLevelOutOfRange {
        /// The offending start level.
        start_level: u32,
        /// The shallowest level with materialized node volumes.
        built_level: u32,
        /// The number of levels of the tree.
        levels: u32,
    },
    /// The ray origin and direction slices have different lengths.
    #[error("mismatched ray arrays: {points} origins for {directions} directions")]
    MismatchedRayCounts {
        /// The number of ray origin points.
        points: usize,
        /// The number of ray directions.
        directions: usize,
    },
}

impl<N, L> Bvh<N, L>
where
    N: BoundingVolume + From<L>,
    L: BoundingVolume,
{
    /// Writes the initial self-traversal work set into `bvtt` and returns its
    /// length.
    ///
    /// The work set holds every unordered pair of distinct real nodes of
    /// `start_level`, plus one self-check per node when the start level is
    /// not the leaf level. The buffer is pre-sized to absorb one full
    /// expansion without a mid-level resize.
    pub(super) fn seed_self(&self, start_level: u32, bvtt: &mut Vec<IndexPair>) -> usize {
        let levels = self.tree.levels();
        let first = 1u32 << (start_level - 1);
        let real = self.tree.real_nodes_at_level(start_level) as usize;
        debug_assert!(real > 0);

        let with_self_checks = start_level < levels;
        let count = real * (real - 1) / 2 + if with_self_checks { real } else { 0 };
        ensure_len(bvtt, if with_self_checks { 4 * count } else { count });

        let mut i = 0;
        for u in first..first + real as u32 {
            if with_self_checks {
                bvtt[i] = (u, u);
                i += 1;
            }
            for v in u + 1..first + real as u32 {
                bvtt[i] = (u, v);
                i += 1;
            }
        }
        debug_assert_eq!(i, count);
        count
    }

    /// Writes the initial ray-traversal work set (every real node of
    /// `start_level` paired with every ray) into `bvtt` and returns its
    /// length.
    pub(super) fn seed_rays(
        &self,
        start_level: u32,
        num_rays: usize,
        bvtt: &mut Vec<IndexPair>,
    ) -> usize {
        let first = 1u32 << (start_level - 1);
        let real = self.tree.real_nodes_at_level(start_level) as usize;

        let count = real * num_rays;
        let expanding = start_level < self.tree.levels();
        ensure_len(bvtt, if expanding { 2 * count } else { count });

        let mut i = 0;
        for u in first..first + real as u32 {
            for ray in 0..num_rays as u32 {
                bvtt[i] = (u, ray);
                i += 1;
            }
        }
        debug_assert_eq!(i, count);
        count
    }
}
