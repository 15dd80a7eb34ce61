use implicit_bvh::bounding_volume::{Aabb, BoundingSphere, BoundingVolume};
use implicit_bvh::math::Real;
use implicit_bvh::na::{Point3, Vector3};
use implicit_bvh::partitioning::{Bvh, BvhOptions, Traversal, TraversalCache, TraversalError};
use rand::{Rng, SeedableRng};
use rand_isaac::IsaacRng;

/// Five spheres strung along the z axis with assorted radii. Exactly the
/// pairs (0, 1), (1, 2) and (3, 4) touch.
fn contact_spheres() -> Vec<BoundingSphere> {
    [0.5, 0.6, 0.5, 0.4, 0.6]
        .iter()
        .enumerate()
        .map(|(k, &radius)| BoundingSphere::new(Point3::new(0.0, 0.0, k as Real), radius))
        .collect()
}

/// Random spheres on a quarter-unit grid. The quantized coordinates keep
/// every overlap predicate exact in floating point, so the brute-force
/// reference below agrees with the tree traversal even for volumes that
/// touch exactly.
fn random_spheres(rng: &mut IsaacRng, n: usize) -> Vec<BoundingSphere> {
    (0..n)
        .map(|_| {
            let x = rng.gen_range(-40i32..=40) as Real * 0.25;
            let y = rng.gen_range(-40i32..=40) as Real * 0.25;
            let z = rng.gen_range(-40i32..=40) as Real * 0.25;
            let radius = rng.gen_range(1i32..=6) as Real * 0.25;
            BoundingSphere::new(Point3::new(x, y, z), radius)
        })
        .collect()
}

fn sorted_contacts(traversal: &Traversal) -> Vec<(u32, u32)> {
    let mut contacts = traversal.contacts().to_vec();
    contacts.sort_unstable();
    contacts
}

/// The `O(n²)` reference answer for self-contacts.
fn brute_force_contacts(spheres: &[BoundingSphere]) -> Vec<(u32, u32)> {
    let mut contacts = Vec::new();
    for i in 0..spheres.len() {
        for j in i + 1..spheres.len() {
            if spheres[i].intersects(&spheres[j]) {
                contacts.push((i as u32, j as u32));
            }
        }
    }
    contacts
}

/// The brute-force reference answer for ray contacts.
fn brute_force_ray_contacts(
    spheres: &[BoundingSphere],
    points: &[Point3<Real>],
    directions: &[Vector3<Real>],
) -> Vec<(u32, u32)> {
    let mut contacts = Vec::new();
    for (i, sphere) in spheres.iter().enumerate() {
        for ray in 0..points.len() {
            if sphere.intersects_ray(&points[ray], &directions[ray]) {
                contacts.push((i as u32, ray as u32));
            }
        }
    }
    contacts
}

#[test]
fn contiguous_spheres_self_contacts() {
    let spheres = contact_spheres();
    let bvh: Bvh<Aabb, BoundingSphere> = Bvh::new(&spheres);
    let traversal = bvh.traverse();

    assert_eq!(sorted_contacts(&traversal), [(0, 1), (1, 2), (3, 4)]);
    assert_eq!(traversal.num_contacts(), 3);
    for &(i, j) in traversal.contacts() {
        assert!(i < j);
    }
}

#[test]
fn rays_hit_forward_only() {
    let spheres = contact_spheres();
    let bvh: Bvh<Aabb, BoundingSphere> = Bvh::new(&spheres);

    // Both rays start below the sphere string; only the first one points at it.
    let points = [Point3::new(0.0, 0.0, -1.0), Point3::new(0.0, 0.0, -1.0)];
    let directions = [Vector3::new(0.0, 0.0, 1.0), Vector3::new(0.0, 0.0, -1.0)];

    let traversal = bvh.traverse_rays(&points, &directions).unwrap();
    assert_eq!(
        sorted_contacts(&traversal),
        [(0, 0), (1, 0), (2, 0), (3, 0), (4, 0)]
    );
}

#[test]
fn cache_reuse_matches_fresh_run() {
    let spheres = contact_spheres();
    let bvh: Bvh<Aabb, BoundingSphere> = Bvh::new(&spheres);

    let first = bvh.traverse();
    let expected = sorted_contacts(&first);

    let second = bvh.traverse_with_cache(2, first.into_cache()).unwrap();
    assert_eq!(sorted_contacts(&second), expected);
}

#[test]
fn caches_are_query_agnostic() {
    let spheres = contact_spheres();
    let bvh: Bvh<Aabb, BoundingSphere> = Bvh::new(&spheres);
    let points = [Point3::new(0.0, 0.0, -1.0)];
    let directions = [Vector3::new(0.0, 0.0, 1.0)];

    // Self-traversal cache handed to a ray traversal, and back again.
    let cache = bvh.traverse().into_cache();
    let rays = bvh
        .traverse_rays_with_cache(&points, &directions, bvh.built_level(), cache)
        .unwrap();
    assert_eq!(
        sorted_contacts(&rays),
        [(0, 0), (1, 0), (2, 0), (3, 0), (4, 0)]
    );

    let this = bvh
        .traverse_with_cache(bvh.default_start_level(), rays.into_cache())
        .unwrap();
    assert_eq!(sorted_contacts(&this), [(0, 1), (1, 2), (3, 4)]);
}

// Three leaves force one virtual leaf (and one virtual internal node); no
// contact may ever mention an index past the real leaves.
#[test]
fn virtual_nodes_are_never_reported() {
    let spheres = [
        BoundingSphere::new(Point3::new(0.0, 0.0, 0.0), 0.6),
        BoundingSphere::new(Point3::new(0.0, 0.0, 1.0), 0.6),
        BoundingSphere::new(Point3::new(0.0, 0.0, 2.0), 0.6),
    ];
    let bvh: Bvh<Aabb, BoundingSphere> = Bvh::new(&spheres);
    assert_eq!(bvh.tree().virtual_leaves(), 1);

    let traversal = bvh.traverse();
    for &(i, j) in traversal.contacts() {
        assert!(i < 3 && j < 3);
    }
    assert_eq!(sorted_contacts(&traversal), [(0, 1), (1, 2)]);
}

#[test]
fn all_disjoint_spheres_yield_no_contact() {
    let spheres: Vec<_> = (0..10)
        .map(|k| BoundingSphere::new(Point3::new(0.0, 0.0, 10.0 * k as Real), 0.1))
        .collect();
    let bvh: Bvh<Aabb, BoundingSphere> = Bvh::new(&spheres);

    let traversal = bvh.traverse();
    assert_eq!(traversal.num_contacts(), 0);
    assert!(traversal.contacts().is_empty());
    assert!(traversal.num_checks() > 0);
}

#[test]
fn start_level_invariance() {
    let mut rng = IsaacRng::seed_from_u64(7);
    let spheres = random_spheres(&mut rng, 33);
    let bvh: Bvh<Aabb, BoundingSphere> = Bvh::new(&spheres);

    let expected = sorted_contacts(&bvh.traverse());
    for start_level in bvh.built_level()..=bvh.tree().levels() {
        let traversal = bvh
            .traverse_with_cache(start_level, TraversalCache::new())
            .unwrap();
        assert_eq!(sorted_contacts(&traversal), expected, "start level {start_level}");
    }
}

#[test]
fn thread_count_invariance() {
    let mut rng = IsaacRng::seed_from_u64(11);
    let spheres = random_spheres(&mut rng, 200);

    // A chunk floor of 1 forces the task machinery even on shallow levels.
    let mut results = Vec::new();
    for parallelism in [1, 2, 8] {
        let options = BvhOptions {
            parallelism,
            min_items_per_task: 1,
            ..BvhOptions::default()
        };
        let bvh: Bvh<Aabb, BoundingSphere> = Bvh::with_options(&spheres, options);
        results.push(sorted_contacts(&bvh.traverse()));
    }
    assert_eq!(results[0], results[1]);
    assert_eq!(results[0], results[2]);
    assert_eq!(results[0], brute_force_contacts(&spheres));
}

#[test]
fn matches_brute_force_self() {
    let mut rng = IsaacRng::seed_from_u64(42);
    for n in [1, 2, 3, 7, 16, 33, 100] {
        let spheres = random_spheres(&mut rng, n);
        let bvh: Bvh<Aabb, BoundingSphere> = Bvh::new(&spheres);
        assert_eq!(
            sorted_contacts(&bvh.traverse()),
            brute_force_contacts(&spheres),
            "n: {n}"
        );
    }
}

#[test]
fn matches_brute_force_self_with_sphere_nodes() {
    // Continuous coordinates here: exact tangencies (which sphere-shaped
    // internal nodes cannot bound exactly) have probability zero.
    let mut rng = IsaacRng::seed_from_u64(43);
    let spheres: Vec<_> = (0..60)
        .map(|_| {
            let x: Real = rng.gen_range(-10.0..10.0);
            let y: Real = rng.gen_range(-10.0..10.0);
            let z: Real = rng.gen_range(-10.0..10.0);
            let radius: Real = rng.gen_range(0.2..1.5);
            BoundingSphere::new(Point3::new(x, y, z), radius)
        })
        .collect();

    let bvh: Bvh<BoundingSphere> = Bvh::new(&spheres);
    assert_eq!(
        sorted_contacts(&bvh.traverse()),
        brute_force_contacts(&spheres)
    );
}

#[test]
fn matches_brute_force_rays() {
    let mut rng = IsaacRng::seed_from_u64(1234);
    for n in [1, 3, 16, 50] {
        let spheres = random_spheres(&mut rng, n);
        let mut points = Vec::new();
        let mut directions = Vec::new();
        for _ in 0..20 {
            let x: Real = rng.gen_range(-15.0..15.0);
            let y: Real = rng.gen_range(-15.0..15.0);
            let z: Real = rng.gen_range(-15.0..15.0);
            points.push(Point3::new(x, y, z));
            let dx: Real = rng.gen_range(-1.0..1.0);
            let dy: Real = rng.gen_range(-1.0..1.0);
            let dz: Real = rng.gen_range(-1.0..1.0);
            directions.push(Vector3::new(dx, dy, dz));
        }

        let bvh: Bvh<Aabb, BoundingSphere> = Bvh::new(&spheres);
        let traversal = bvh.traverse_rays(&points, &directions).unwrap();
        let mut expected = brute_force_ray_contacts(&spheres, &points, &directions);
        expected.sort_unstable();
        assert_eq!(sorted_contacts(&traversal), expected, "n: {n}");
    }
}

#[test]
fn empty_and_degenerate_inputs() {
    // A hierarchy without any leaf yields nothing.
    let none: [BoundingSphere; 0] = [];
    let bvh: Bvh<Aabb, BoundingSphere> = Bvh::new(&none);
    assert_eq!(bvh.traverse().num_contacts(), 0);
    assert_eq!(
        bvh.traverse_rays(&[Point3::origin()], &[Vector3::z()])
            .unwrap()
            .num_contacts(),
        0
    );

    // A single leaf can never be in self-contact.
    let one = [BoundingSphere::new(Point3::origin(), 1.0)];
    let bvh: Bvh<Aabb, BoundingSphere> = Bvh::new(&one);
    assert_eq!(bvh.traverse().num_contacts(), 0);

    // But a ray can still hit it.
    let traversal = bvh
        .traverse_rays(&[Point3::new(0.0, 0.0, -5.0)], &[Vector3::z()])
        .unwrap();
    assert_eq!(traversal.contacts(), [(0, 0)]);

    // No rays, no work.
    let traversal = bvh.traverse_rays(&[], &[]).unwrap();
    assert_eq!(traversal.num_contacts(), 0);
    assert_eq!(traversal.num_checks(), 0);
}

#[test]
fn precondition_errors() {
    let spheres = contact_spheres();
    let bvh: Bvh<Aabb, BoundingSphere> = Bvh::new(&spheres);
    let levels = bvh.tree().levels();

    assert_eq!(
        bvh.traverse_with_cache(0, TraversalCache::new()).unwrap_err(),
        TraversalError::StartLevelOutOfRange {
            start_level: 0,
            built_level: 1,
            levels,
        }
    );
    assert!(bvh
        .traverse_with_cache(levels + 1, TraversalCache::new())
        .is_err());

    assert_eq!(
        bvh.traverse_rays(&[Point3::origin()], &[]).unwrap_err(),
        TraversalError::MismatchedRayCounts {
            points: 1,
            directions: 0,
        }
    );
}

#[test]
fn partially_built_tree() {
    let mut rng = IsaacRng::seed_from_u64(99);
    let spheres = random_spheres(&mut rng, 40);

    let options = BvhOptions {
        built_level: 3,
        ..BvhOptions::default()
    };
    let bvh: Bvh<Aabb, BoundingSphere> = Bvh::with_options(&spheres, options);
    assert_eq!(bvh.built_level(), 3);

    // Starting shallower than the built level is a precondition violation.
    assert!(matches!(
        bvh.traverse_with_cache(2, TraversalCache::new()),
        Err(TraversalError::StartLevelOutOfRange { .. })
    ));

    // The default start level clamps to the built range and still sees
    // every contact.
    assert_eq!(
        sorted_contacts(&bvh.traverse()),
        brute_force_contacts(&spheres)
    );
}
