//! Bounding volume primitives: axis-aligned boxes and spheres.

pub use self::aabb::Aabb;
pub use self::bounding_sphere::BoundingSphere;
pub use self::bounding_volume::BoundingVolume;

mod aabb;
mod bounding_sphere;
mod bounding_volume;
