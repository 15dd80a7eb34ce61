//! Bounding sphere.

use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::math::{Point, Real, Vector};

/// A Bounding Sphere.
///
/// Unlike an [`Aabb`], a bounding sphere is rotation-invariant and only
/// stores four scalars, at the price of looser bounds for elongated shapes.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Copy, Clone)]
#[repr(C)]
pub struct BoundingSphere {
    pub center: Point<Real>,
    pub radius: Real,
}

impl BoundingSphere {
    /// Creates a new bounding sphere.
    #[inline]
    pub fn new(center: Point<Real>, radius: Real) -> BoundingSphere {
        BoundingSphere { center, radius }
    }

    /// The bounding sphere center.
    #[inline]
    pub fn center(&self) -> &Point<Real> {
        &self.center
    }

    /// The bounding sphere radius.
    #[inline]
    pub fn radius(&self) -> Real {
        self.radius
    }

    /// Does this sphere contain the given point?
    #[inline]
    pub fn contains_local_point(&self, pt: &Point<Real>) -> bool {
        (pt - self.center).norm_squared() <= self.radius * self.radius
    }
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self::new(Point::origin(), 0.0)
    }
}

impl From<Aabb> for BoundingSphere {
    #[inline]
    fn from(aabb: Aabb) -> Self {
        BoundingSphere::new(BoundingVolume::center(&aabb), aabb.half_extents().norm())
    }
}

impl BoundingVolume for BoundingSphere {
    #[inline]
    fn center(&self) -> Point<Real> {
        self.center
    }

    #[inline]
    fn intersects(&self, other: &Self) -> bool {
        let sum_radius = self.radius + other.radius;
        (other.center - self.center).norm_squared() <= sum_radius * sum_radius
    }

    fn merged(&self, other: &Self) -> Self {
        let dir = other.center - self.center;
        let dist = dir.norm();

        if dist + other.radius <= self.radius {
            *self
        } else if dist + self.radius <= other.radius {
            *other
        } else {
            let radius = (dist + self.radius + other.radius) * 0.5;
            let center = self.center + dir * ((radius - self.radius) / dist);
            BoundingSphere::new(center, radius)
        }
    }

    #[inline]
    fn intersects_ray(&self, origin: &Point<Real>, dir: &Vector<Real>) -> bool {
        let delta = origin - self.center;
        let c = delta.norm_squared() - self.radius * self.radius;

        if c <= 0.0 {
            // The ray starts inside the sphere.
            return true;
        }

        // Half-b form of the quadratic. A forward hit requires the ray to
        // point towards the sphere and the discriminant to be non-negative.
        let b = delta.dot(dir);
        b < 0.0 && b * b >= dir.norm_squared() * c
    }
}
