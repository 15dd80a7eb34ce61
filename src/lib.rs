/*!
implicit-bvh
============

**implicit-bvh** is a contact-detection library built around bounding volume
hierarchies with an implicit perfect-binary-tree topology. Leaves are ordered
along a Morton curve and nodes are addressed by pure index arithmetic, so the
tree stores no pointers at all. Traversals are breadth-first and
level-synchronous: the work queue of candidate node pairs (the bounding-volume
test tree, BVTT) is expanded one level at a time into pre-sized double
buffers, optionally fanning each level out across a rayon worker set.

Two queries are supported:
- [`partitioning::Bvh::traverse`] enumerates all pairs of leaves with
  intersecting volumes.
- [`partitioning::Bvh::traverse_rays`] enumerates all `(leaf, ray)` pairs such
  that the ray, treated as a forward half-line, intersects the leaf volume.

# Example

```
use implicit_bvh::bounding_volume::{Aabb, BoundingSphere};
use implicit_bvh::partitioning::Bvh;
use implicit_bvh::na::Point3;

let spheres = [
    BoundingSphere::new(Point3::new(0.0, 0.0, 0.0), 0.5),
    BoundingSphere::new(Point3::new(0.0, 0.0, 1.0), 0.6),
    BoundingSphere::new(Point3::new(0.0, 0.0, 2.0), 0.5),
];

// Box-shaped internal nodes over sphere-shaped leaves.
let bvh: Bvh<Aabb, BoundingSphere> = Bvh::new(&spheres);
let traversal = bvh.traverse();

// Contact pairs are canonicalized: `i < j`, indices into `spheres`.
assert_eq!(traversal.contacts(), [(0, 1), (1, 2)]);
```
*/

#![deny(non_camel_case_types)]
#![deny(unused_parens)]
#![deny(non_upper_case_globals)]
#![deny(unused_results)]
#![warn(missing_docs)]
#![warn(unused_imports)]
#![allow(missing_copy_implementations)]
#![allow(clippy::module_inception)]

#[cfg(not(any(feature = "f32", feature = "f64")))]
std::compile_error!("Either the `f32` or the `f64` feature must be enabled.");

#[cfg(feature = "serde-serialize")]
#[macro_use]
extern crate serde;

pub extern crate nalgebra as na;

pub mod bounding_volume;
pub mod partitioning;
pub mod utils;

mod real {
    /// The scalar type used throughout this crate.
    #[cfg(feature = "f64")]
    pub use f64 as Real;

    /// The scalar type used throughout this crate.
    #[cfg(all(feature = "f32", not(feature = "f64")))]
    pub use f32 as Real;
}

/// Aliases for the mathematical types used throughout this crate.
pub mod math {
    pub use super::real::*;
    pub use na::{Point3, Vector3};

    /// The dimension of the space.
    pub const DIM: usize = 3;

    /// The point type.
    pub use Point3 as Point;

    /// The vector type.
    pub use Vector3 as Vector;
}
