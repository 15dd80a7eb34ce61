use super::bvh_bvtt::ensure_len;
use super::{Bvh, IndexPair, Traversal, TraversalCache, TraversalError};
use crate::bounding_volume::BoundingVolume;
#[cfg(feature = "parallel")]
use {
    super::TaskPartition,
    rayon::prelude::*,
    smallvec::{smallvec, SmallVec},
};

/// Per-call task bookkeeping stays inline up to this many workers and only
/// spills to the heap on wider machines.
#[cfg(feature = "parallel")]
const INLINE_TASK_COUNT: usize = 16;

impl<N, L> Bvh<N, L>
where
    N: BoundingVolume + From<L>,
    L: BoundingVolume,
{
    /// Traverses the tree against itself and collects every pair of leaves
    /// with intersecting volumes.
    ///
    /// Contact pairs hold original leaf indices and are canonicalized so that
    /// the first index is the smaller one; their order within the result is
    /// unspecified. Starts at [`Self::default_start_level`] with fresh
    /// buffers; use [`Self::traverse_with_cache`] to control the start level
    /// or to reuse the buffers of a previous traversal.
    ///
    /// ```
    /// # use implicit_bvh::bounding_volume::BoundingSphere;
    /// # use implicit_bvh::partitioning::Bvh;
    /// # use implicit_bvh::na::Point3;
    /// let spheres = [
    ///     BoundingSphere::new(Point3::new(0.0, 0.0, 0.0), 0.6),
    ///     BoundingSphere::new(Point3::new(0.0, 0.0, 1.0), 0.6),
    ///     BoundingSphere::new(Point3::new(0.0, 0.0, 9.0), 0.6),
    /// ];
    /// let bvh: Bvh<BoundingSphere> = Bvh::new(&spheres);
    /// assert_eq!(bvh.traverse().contacts(), [(0, 1)]);
    /// ```
    pub fn traverse(&self) -> Traversal {
        // The default start level is always inside the valid range.
        self.traverse_self(self.default_start_level(), TraversalCache::new())
    }

    /// Traverses the tree against itself, starting the level-synchronous
    /// expansion at `start_level` and reusing the buffers of `cache`.
    ///
    /// The start level must lie in `built_level..=levels`; any start level in
    /// that range yields the same contact set.
    pub fn traverse_with_cache(
        &self,
        start_level: u32,
        cache: TraversalCache,
    ) -> Result<Traversal, TraversalError> {
        self.check_start_level(start_level)?;
        Ok(self.traverse_self(start_level, cache))
    }

    pub(super) fn check_start_level(&self, start_level: u32) -> Result<(), TraversalError> {
        if start_level < self.built_level || start_level > self.tree.levels() {
            return Err(TraversalError::StartLevelOutOfRange {
                start_level,
                built_level: self.built_level,
                levels: self.tree.levels(),
            });
        }
        Ok(())
    }

    fn traverse_self(&self, start_level: u32, cache: TraversalCache) -> Traversal {
        if self.tree.real_nodes() <= 1 {
            // A single leaf (or no leaf at all) cannot be in contact.
            return Traversal::empty(start_level, cache);
        }

        let TraversalCache {
            cache1: mut src,
            cache2: mut dst,
        } = cache;

        let mut num = self.seed_self(start_level, &mut src);
        let mut num_checks = num;

        for level in start_level..self.tree.levels() {
            ensure_len(&mut dst, 4 * num);
            num = self.expand_level(&src[..num], &mut dst[..4 * num], level);
            num_checks += num;
            core::mem::swap(&mut src, &mut dst);
            if num == 0 {
                break;
            }
        }

        // `src` now holds the leaf-level BVTT; the final overlap test writes
        // the dense contact prefix into `dst`, which becomes `cache1`.
        ensure_len(&mut dst, num);
        let num_contacts = self.collect_leaf_contacts(&src[..num], &mut dst[..num]);
        dst.truncate(num_contacts);

        Traversal {
            start_level,
            num_checks,
            num_contacts,
            cache1: dst,
            cache2: src,
        }
    }

    /// Expands the node-pair BVTT of `level` into the BVTT of the next level,
    /// returning the number of items produced.
    ///
    /// `dst` must hold four items per source item (the worst-case fanout);
    /// the output is its dense prefix.
    pub(super) fn expand_level(&self, src: &[IndexPair], dst: &mut [IndexPair], level: u32) -> usize {
        assert!(
            dst.len() >= 4 * src.len(),
            "BVTT destination buffer too small at level {level}"
        );

        // Self-checks sprouted while expanding the second-to-last level would
        // only produce pointless leaf-on-self pairs; suppress them there.
        let self_checks = level < self.tree.levels() - 1;
        self.run_tasks(src, dst, 4, |chunk, region| {
            self.expand_range(chunk, region, self_checks)
        })
    }

    /// Sequential expansion kernel for one chunk of the BVTT.
    fn expand_range(&self, src: &[IndexPair], region: &mut [IndexPair], self_checks: bool) -> usize {
        let tree = &self.tree;
        let mut n = 0;

        for &(u, v) in src {
            if u == v {
                // A self-check: the descendants of `u` must still be tested
                // against each other. Its children always overlap, so no
                // intersection test is needed before sprouting.
                let (left, right) = (2 * u, 2 * u + 1);
                if tree.is_virtual(right) {
                    if self_checks {
                        region[n] = (left, left);
                        n += 1;
                    }
                } else {
                    if self_checks {
                        region[n] = (left, left);
                        region[n + 1] = (right, right);
                        n += 2;
                    }
                    region[n] = (left, right);
                    n += 1;
                }
            } else {
                if !self.node_volume(u).intersects(self.node_volume(v)) {
                    continue;
                }

                // `u < v` and virtual nodes are packed to the right, so of
                // the four children only `v`'s right child can be virtual.
                let (vl, vr) = (2 * v, 2 * v + 1);
                region[n] = (2 * u, vl);
                region[n + 1] = (2 * u + 1, vl);
                n += 2;
                if !tree.is_virtual(vr) {
                    region[n] = (2 * u, vr);
                    region[n + 1] = (2 * u + 1, vr);
                    n += 2;
                }
            }
        }

        n
    }

    /// Runs the final overlap test on the leaf-level BVTT, writing the
    /// canonicalized `(i, j)` contact pairs into `dst` (one slot per source
    /// item) and returning the contact count.
    fn collect_leaf_contacts(&self, src: &[IndexPair], dst: &mut [IndexPair]) -> usize {
        assert!(
            dst.len() >= src.len(),
            "BVTT destination buffer too small at the leaf level"
        );

        self.run_tasks(src, dst, 1, |chunk, region| {
            let mut n = 0;
            for &(u, v) in chunk {
                let a = self.leaf_id(u);
                let b = self.leaf_id(v);
                if self.leaves[a as usize].intersects(&self.leaves[b as usize]) {
                    region[n] = (a.min(b), a.max(b));
                    n += 1;
                }
            }
            n
        })
    }

    /// Expands `src` into `dst` through `expand`, fanning the work out over a
    /// partition of the source range when it is large enough.
    ///
    /// `dst` must hold exactly `fanout * src.len()` items. Each task writes
    /// into the disjoint destination region matching its source chunk and
    /// reports how many items it produced; the regions are then compacted
    /// into a dense prefix of `dst`. Returns the total item count.
    pub(super) fn run_tasks<F>(
        &self,
        src: &[IndexPair],
        dst: &mut [IndexPair],
        fanout: usize,
        expand: F,
    ) -> usize
    where
        F: Fn(&[IndexPair], &mut [IndexPair]) -> usize + Sync,
    {
        #[cfg(feature = "parallel")]
        {
            let partition = TaskPartition::new(
                src.len(),
                self.options.parallelism,
                self.options.min_items_per_task,
            );
            if partition.num_tasks() > 1 {
                return run_tasks_parallel(src, dst, fanout, partition, &expand);
            }
        }

        // Small workloads (and builds without `parallel`) skip the task
        // machinery entirely.
        expand(src, dst)
    }
}

#[cfg(feature = "parallel")]
fn run_tasks_parallel<F>(
    src: &[IndexPair],
    dst: &mut [IndexPair],
    fanout: usize,
    partition: TaskPartition,
    expand: &F,
) -> usize
where
    F: Fn(&[IndexPair], &mut [IndexPair]) -> usize + Sync,
{
    let num_tasks = partition.num_tasks();

    // Carve the destination into one disjoint region per task, sized to the
    // worst-case fanout of the matching source chunk. Disjointness is what
    // makes the expansion lock-free.
    let mut jobs: SmallVec<[(&[IndexPair], &mut [IndexPair]); INLINE_TASK_COUNT]> =
        SmallVec::with_capacity(num_tasks);
    let mut rest = &mut *dst;
    for t in 0..num_tasks {
        let range = partition.task_range(t);
        let (region, tail) = core::mem::take(&mut rest).split_at_mut(fanout * range.len());
        jobs.push((&src[range], region));
        rest = tail;
    }

    let mut counts: SmallVec<[usize; INLINE_TASK_COUNT]> = smallvec![0; num_tasks];
    counts
        .par_iter_mut()
        .zip(jobs.par_iter_mut())
        .for_each(|(count, job)| *count = expand(job.0, &mut *job.1));

    // The regions borrow `dst`; release them before compacting.
    drop(jobs);

    // Compact each task's dense prefix onto the running tail. Task 0 already
    // starts at offset 0 and does not move.
    let mut total = counts[0];
    for t in 1..num_tasks {
        let start = fanout * partition.task_range(t).start;
        dst.copy_within(start..start + counts[t], total);
        total += counts[t];
    }
    total
}
