use super::bvh_bvtt::ensure_len;
use super::{Bvh, IndexPair, Traversal, TraversalCache, TraversalError};
use crate::bounding_volume::BoundingVolume;
use crate::math::{Point, Real, Vector};

impl<N, L> Bvh<N, L>
where
    N: BoundingVolume + From<L>,
    L: BoundingVolume,
{
    /// Traverses the tree against a batch of rays and collects every
    /// `(leaf, ray)` pair such that the forward half-line starting at
    /// `points[ray]` with direction `directions[ray]` intersects the leaf
    /// volume.
    ///
    /// Directions do not need to be normalized. The two slices must have the
    /// same length. Starts at [`Self::built_level`] with fresh buffers; use
    /// [`Self::traverse_rays_with_cache`] to control the start level or to
    /// reuse the buffers of a previous traversal (self- and ray-traversal
    /// caches are interchangeable).
    ///
    /// ```
    /// # use implicit_bvh::bounding_volume::BoundingSphere;
    /// # use implicit_bvh::partitioning::Bvh;
    /// # use implicit_bvh::na::{Point3, Vector3};
    /// let spheres = [
    ///     BoundingSphere::new(Point3::new(0.0, 0.0, 0.0), 0.5),
    ///     BoundingSphere::new(Point3::new(0.0, 0.0, 9.0), 0.5),
    /// ];
    /// let bvh: Bvh<BoundingSphere> = Bvh::new(&spheres);
    /// let traversal = bvh
    ///     .traverse_rays(&[Point3::new(0.0, 0.0, -1.0)], &[Vector3::z()])
    ///     .unwrap();
    /// // The ray shoots through both spheres.
    /// assert_eq!(traversal.num_contacts(), 2);
    /// ```
    pub fn traverse_rays(
        &self,
        points: &[Point<Real>],
        directions: &[Vector<Real>],
    ) -> Result<Traversal, TraversalError> {
        self.traverse_rays_with_cache(points, directions, self.built_level, TraversalCache::new())
    }

    /// Traverses the tree against a batch of rays, starting the
    /// level-synchronous expansion at `start_level` and reusing the buffers
    /// of `cache`.
    pub fn traverse_rays_with_cache(
        &self,
        points: &[Point<Real>],
        directions: &[Vector<Real>],
        start_level: u32,
        cache: TraversalCache,
    ) -> Result<Traversal, TraversalError> {
        if points.len() != directions.len() {
            return Err(TraversalError::MismatchedRayCounts {
                points: points.len(),
                directions: directions.len(),
            });
        }
        self.check_start_level(start_level)?;

        if points.is_empty() || self.tree.real_nodes() == 0 {
            return Ok(Traversal::empty(start_level, cache));
        }

        Ok(self.traverse_rays_inner(points, directions, start_level, cache))
    }

    fn traverse_rays_inner(
        &self,
        points: &[Point<Real>],
        directions: &[Vector<Real>],
        start_level: u32,
        cache: TraversalCache,
    ) -> Traversal {
        let TraversalCache {
            cache1: mut src,
            cache2: mut dst,
        } = cache;

        let mut num = self.seed_rays(start_level, points.len(), &mut src);
        let mut num_checks = num;

        for level in start_level..self.tree.levels() {
            ensure_len(&mut dst, 2 * num);
            num = self.expand_ray_level(&src[..num], &mut dst[..2 * num], level, points, directions);
            num_checks += num;
            core::mem::swap(&mut src, &mut dst);
            if num == 0 {
                break;
            }
        }

        // Final leaf-level hit test, mirroring the self-traversal driver.
        ensure_len(&mut dst, num);
        let num_contacts = self.run_tasks(&src[..num], &mut dst[..num], 1, |chunk, region| {
            let mut n = 0;
            for &(u, ray) in chunk {
                let id = self.leaf_id(u);
                let leaf = &self.leaves[id as usize];
                if leaf.intersects_ray(&points[ray as usize], &directions[ray as usize]) {
                    region[n] = (id, ray);
                    n += 1;
                }
            }
            n
        });
        dst.truncate(num_contacts);

        Traversal {
            start_level,
            num_checks,
            num_contacts,
            cache1: dst,
            cache2: src,
        }
    }

    /// Expands the node-ray BVTT of `level` into the BVTT of the next level,
    /// returning the number of items produced.
    ///
    /// `dst` must hold two items per source item (the worst-case fanout).
    pub(super) fn expand_ray_level(
        &self,
        src: &[IndexPair],
        dst: &mut [IndexPair],
        level: u32,
        points: &[Point<Real>],
        directions: &[Vector<Real>],
    ) -> usize {
        assert!(
            dst.len() >= 2 * src.len(),
            "BVTT destination buffer too small at level {level}"
        );

        self.run_tasks(src, dst, 2, |chunk, region| {
            self.expand_ray_range(chunk, region, points, directions)
        })
    }

    /// Sequential ray-expansion kernel for one chunk of the BVTT: nodes not
    /// hit by their ray are pruned, hit nodes sprout their real children.
    fn expand_ray_range(
        &self,
        src: &[IndexPair],
        region: &mut [IndexPair],
        points: &[Point<Real>],
        directions: &[Vector<Real>],
    ) -> usize {
        let tree = &self.tree;
        let mut n = 0;

        for &(u, ray) in src {
            let volume = self.node_volume(u);
            if volume.intersects_ray(&points[ray as usize], &directions[ray as usize]) {
                region[n] = (2 * u, ray);
                n += 1;
                if !tree.is_virtual(2 * u + 1) {
                    region[n] = (2 * u + 1, ray);
                    n += 1;
                }
            }
        }

        n
    }
}
