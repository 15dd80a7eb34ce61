//! Axis Aligned Bounding Box.

use crate::bounding_volume::{BoundingSphere, BoundingVolume};
use crate::math::{Point, Real, Vector};

/// An Axis Aligned Bounding Box.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Copy, Clone)]
#[repr(C)]
pub struct Aabb {
    pub mins: Point<Real>,
    pub maxs: Point<Real>,
}

impl Aabb {
    /// Creates a new Aabb.
    ///
    /// # Arguments:
    ///   * `mins` - position of the point with the smallest coordinates.
    ///   * `maxs` - position of the point with the highest coordinates. Each
    ///     component of `mins` must be smaller than the related components of
    ///     `maxs`.
    #[inline]
    pub fn new(mins: Point<Real>, maxs: Point<Real>) -> Aabb {
        Aabb { mins, maxs }
    }

    /// Creates an invalid Aabb with `mins` components set to `Real::MAX` and
    /// `maxs` components set to `-Real::MAX`.
    ///
    /// This is often used as the initial value of some Aabb merging algorithms.
    #[inline]
    pub fn new_invalid() -> Self {
        Self::new(
            Vector::repeat(Real::MAX).into(),
            Vector::repeat(-Real::MAX).into(),
        )
    }

    /// Creates a new Aabb from its center and its half-extents.
    #[inline]
    pub fn from_half_extents(center: Point<Real>, half_extents: Vector<Real>) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    /// Creates a new Aabb from a set of points.
    pub fn from_points<'a, I>(pts: I) -> Self
    where
        I: IntoIterator<Item = &'a Point<Real>>,
    {
        let mut result = Aabb::new_invalid();
        for pt in pts {
            result.mins = result.mins.inf(pt);
            result.maxs = result.maxs.sup(pt);
        }
        result
    }

    /// The half extents of this Aabb.
    #[inline]
    pub fn half_extents(&self) -> Vector<Real> {
        (self.maxs - self.mins) * 0.5
    }

    /// The extents of this Aabb.
    #[inline]
    pub fn extents(&self) -> Vector<Real> {
        self.maxs - self.mins
    }

    /// The volume of this Aabb.
    #[inline]
    pub fn volume(&self) -> Real {
        let extents = self.extents();
        extents.x * extents.y * extents.z
    }

    /// Does this Aabb contain the given point?
    #[inline]
    pub fn contains_local_point(&self, pt: &Point<Real>) -> bool {
        na::partial_le(&self.mins, pt) && na::partial_ge(&self.maxs, pt)
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::new_invalid()
    }
}

impl From<BoundingSphere> for Aabb {
    #[inline]
    fn from(sphere: BoundingSphere) -> Self {
        Aabb::from_half_extents(sphere.center, Vector::repeat(sphere.radius))
    }
}

impl BoundingVolume for Aabb {
    #[inline]
    fn center(&self) -> Point<Real> {
        na::center(&self.mins, &self.maxs)
    }

    #[inline]
    fn intersects(&self, other: &Self) -> bool {
        na::partial_le(&self.mins, &other.maxs) && na::partial_ge(&self.maxs, &other.mins)
    }

    #[inline]
    fn merged(&self, other: &Self) -> Self {
        Aabb {
            mins: self.mins.inf(&other.mins),
            maxs: self.maxs.sup(&other.maxs),
        }
    }

    #[inline]
    fn intersects_ray(&self, origin: &Point<Real>, dir: &Vector<Real>) -> bool {
        // Slab test on the inverted direction. Near-zero components are
        // replaced by a huge finite inverse with the same sign so that
        // axis-parallel rays stay NaN-free.
        let inv_dir = dir.map(|d| {
            if d.abs() < Real::EPSILON {
                d.signum() / Real::EPSILON
            } else {
                1.0 / d
            }
        });

        let t1 = (self.mins - origin).component_mul(&inv_dir);
        let t2 = (self.maxs - origin).component_mul(&inv_dir);

        let tmin = t1.inf(&t2).max();
        let tmax = t1.sup(&t2).min();

        tmax >= tmin && tmax >= 0.0
    }
}
