//! Broad-phase pair discovery
//!
//! Per tier, smallest cell size first:
//! 1. every unordered pair inside each occupied cell;
//! 2. each occupied cell against the first 4 entries of its neighborhood
//!    (the other 4 are covered when the neighbor is the current cell);
//! 3. every object of the tier against the full 3x3 neighborhood, in each
//!    larger tier, of the cell its AABB min corner hashes to there.
//!
//! Pairs are only ever formed from the smaller tier outward, so each
//! overlapping pair is reported once.

use crate::hshg::collider::Collider;
use crate::hshg::constants::query::PAIR_BUFFER_INITIAL_CAPACITY;
use crate::hshg::hierarchy::Hshg;
use crate::hshg::registry::{Entry, ObjectHandle};

impl<T: Collider> Hshg<T> {
    /// Candidate pairs under the default AABB overlap test
    ///
    /// Both members of each pair are notified through [`Collider::collided`].
    pub fn query_for_collision_pairs(&self) -> Vec<(&T, &T)> {
        self.collect_pairs(entries_overlap)
    }

    /// Candidate pairs under a caller-supplied inclusion test
    ///
    /// Pair discovery is unchanged; only the test differs. The static-static
    /// exclusion of the default test does not apply unless `overlap_test`
    /// implements it.
    pub fn query_for_collision_pairs_with<F>(&self, mut overlap_test: F) -> Vec<(&T, &T)>
    where
        F: FnMut(&T, &T) -> bool,
    {
        self.collect_pairs(|a: &Entry<T>, b: &Entry<T>| overlap_test(&a.object, &b.object))
    }

    /// Same as [`Hshg::query_for_collision_pairs`], as handles
    ///
    /// Handles stay valid after the borrow ends, so callers can queue
    /// removals and apply them once the query is done.
    pub fn query_handle_pairs(&self) -> Vec<(ObjectHandle, ObjectHandle)> {
        let mut pairs = Vec::with_capacity(PAIR_BUFFER_INITIAL_CAPACITY);
        self.visit_pairs(entries_overlap, |handle_a, a, handle_b, b| {
            notify(a, b);
            pairs.push((handle_a, handle_b));
        });
        pairs
    }

    /// Visit each candidate pair without collecting (no `collided` calls)
    #[inline]
    pub fn for_each_collision_pair<F>(&self, mut callback: F)
    where
        F: FnMut(&T, &T),
    {
        self.visit_pairs(entries_overlap, |_, a, _, b| callback(&a.object, &b.object));
    }

    fn collect_pairs<'a, P>(&'a self, overlap: P) -> Vec<(&'a T, &'a T)>
    where
        P: FnMut(&Entry<T>, &Entry<T>) -> bool,
    {
        let mut pairs = Vec::with_capacity(PAIR_BUFFER_INITIAL_CAPACITY);
        self.visit_pairs(overlap, |_, a, _, b| {
            notify(a, b);
            pairs.push((&a.object, &b.object));
        });
        pairs
    }

    fn visit_pairs<'a, P, V>(&'a self, mut overlap: P, mut visit: V)
    where
        P: FnMut(&Entry<T>, &Entry<T>) -> bool,
        V: FnMut(ObjectHandle, &'a Entry<T>, ObjectHandle, &'a Entry<T>),
    {
        let registry = &self.registry;
        let mut test = |handle_a: ObjectHandle, handle_b: ObjectHandle| {
            let a = registry.entry(handle_a);
            let b = registry.entry(handle_b);
            if overlap(a, b) {
                visit(handle_a, a, handle_b, b);
            }
        };

        for (position, &id) in self.tiers.iter().enumerate() {
            let grid = &self.grids[id];

            for &hash in grid.occupied_cells() {
                let objects = grid.cell(hash).objects();

                for (k, &a) in objects.iter().enumerate() {
                    for &b in &objects[k + 1..] {
                        test(a, b);
                    }
                }

                for neighbor in grid.half_neighborhood(hash) {
                    for &a in objects {
                        for &b in neighbor.objects() {
                            test(a, b);
                        }
                    }
                }
            }

            for &a in grid.objects() {
                let min = registry.entry(a).aabb.min();
                for &larger_id in &self.tiers[position + 1..] {
                    let larger = &self.grids[larger_id];
                    let hash = larger.to_hash(min.x, min.y);
                    for cell in larger.neighborhood(hash) {
                        for &b in cell.objects() {
                            test(a, b);
                        }
                    }
                }
            }
        }
    }
}

#[inline]
fn notify<T: Collider>(a: &Entry<T>, b: &Entry<T>) {
    a.object.collided(&b.object);
    b.object.collided(&a.object);
}

/// Default test on the index's cached AABBs
#[inline]
fn entries_overlap<T>(a: &Entry<T>, b: &Entry<T>) -> bool {
    if a.is_static && b.is_static {
        return false;
    }
    a.aabb.overlaps(&b.aabb)
}

/// The default inclusion test, on live AABBs
///
/// Inclusive 2D AABB overlap; two static objects never pair. Useful as the
/// base of a custom test passed to [`Hshg::query_for_collision_pairs_with`].
pub fn aabb_overlap_test<T: Collider>(a: &T, b: &T) -> bool {
    if a.is_static() && b.is_static() {
        return false;
    }
    a.aabb().overlaps(&b.aabb())
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::config::HshgConfig;
    use crate::geom::Aabb;
    use crate::hshg::test_support::{body, ids, reference_pairs, static_body, Body};
    use crate::util::vec2::Vec2;

    fn pair_ids(pairs: &[(&Rc<Body>, &Rc<Body>)]) -> hashbrown::HashSet<(u32, u32)> {
        ids(pairs.iter().map(|(a, b)| (a.id, b.id)))
    }

    /// Query and check the result against brute force, with no duplicates
    fn assert_matches_reference(hshg: &Hshg<Rc<Body>>, bodies: &[Rc<Body>]) -> usize {
        let pairs = hshg.query_for_collision_pairs();
        let found = pair_ids(&pairs);
        assert_eq!(found.len(), pairs.len(), "duplicate pair reported");
        assert_eq!(found, reference_pairs(bodies));
        pairs.len()
    }

    fn random_bodies(rng: &mut StdRng, count: u32, span: f32, sizes: &[f32]) -> Vec<Rc<Body>> {
        (0..count)
            .map(|id| {
                let size = sizes[rng.gen_range(0..sizes.len())];
                let x = rng.gen_range(-span..span);
                let y = rng.gen_range(-span..span);
                body(id, x, y, size, size * rng.gen_range(0.5..1.0))
            })
            .collect()
    }

    #[test]
    fn test_empty_index() {
        let hshg: Hshg<Rc<Body>> = Hshg::new();
        assert!(hshg.query_for_collision_pairs().is_empty());
        assert!(hshg.query_handle_pairs().is_empty());
    }

    #[test]
    fn test_same_cell_pairs() {
        let mut hshg = Hshg::new();
        let bodies: Vec<_> = (0..6)
            .map(|i| body(i, i as f32 * 0.1, i as f32 * 0.1, 10.0, 10.0))
            .collect();
        for b in &bodies {
            hshg.add_object(b.clone());
        }

        assert_eq!(hshg.tier_count(), 1);
        let grid = hshg.tiers().next().unwrap();
        assert_eq!(grid.occupied_cells().len(), 1);
        // n * (n - 1) / 2
        assert_eq!(assert_matches_reference(&hshg, &bodies), 15);
    }

    #[test]
    fn test_same_tier_overlap() {
        let mut hshg = Hshg::new();
        let a = body(1, 0.0, 0.0, 10.0, 10.0);
        let b = body(2, 5.0, 5.0, 10.0, 10.0);
        hshg.add_object(a.clone());
        hshg.add_object(b.clone());

        assert_eq!(hshg.tier_count(), 1);
        let pairs = hshg.query_for_collision_pairs();
        assert_eq!(pairs.len(), 1);

        // Both sides are notified once
        assert_eq!(*a.hits.borrow(), vec![2]);
        assert_eq!(*b.hits.borrow(), vec![1]);
    }

    #[test]
    fn test_adjacent_cell_overlap() {
        let mut hshg = Hshg::new();
        // Cell size 10 * sqrt(2); mins straddle a cell boundary
        let bodies = vec![
            body(1, 10.0, 10.0, 10.0, 10.0),
            body(2, 18.0, 12.0, 10.0, 10.0),
            body(3, 12.0, 18.0, 10.0, 10.0),
            body(4, 4.0, 16.0, 10.0, 10.0),
        ];
        for b in &bodies {
            hshg.add_object(b.clone());
        }
        assert_eq!(assert_matches_reference(&hshg, &bodies), 5);
    }

    #[test]
    fn test_cross_tier_overlap() {
        let mut hshg = Hshg::new();
        let small = body(1, 0.0, 0.0, 10.0, 10.0);
        let large = body(2, -50.0, -50.0, 300.0, 300.0);
        hshg.add_object(small.clone());
        hshg.add_object(large.clone());

        assert_eq!(hshg.tier_count(), 2);
        let pairs = hshg.query_for_collision_pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!(*small.hits.borrow(), vec![2]);
        assert_eq!(*large.hits.borrow(), vec![1]);
    }

    #[test]
    fn test_cross_tier_from_either_insert_order() {
        let mut hshg = Hshg::new();
        let bodies = vec![
            body(1, -50.0, -50.0, 300.0, 300.0),
            body(2, 0.0, 0.0, 10.0, 10.0),
            body(3, 100.0, 100.0, 40.0, 40.0),
            body(4, 500.0, 500.0, 10.0, 10.0),
        ];
        for b in &bodies {
            hshg.add_object(b.clone());
        }
        assert_eq!(hshg.tier_count(), 3);
        assert_eq!(assert_matches_reference(&hshg, &bodies), 2);
    }

    #[test]
    fn test_disjoint_objects() {
        let mut hshg = Hshg::new();
        hshg.add_object(body(1, 0.0, 0.0, 10.0, 10.0));
        hshg.add_object(body(2, 1000.0, 1000.0, 10.0, 10.0));
        assert!(hshg.query_for_collision_pairs().is_empty());
    }

    #[test]
    fn test_aliased_cells_filtered() {
        let mut hshg = Hshg::new();
        hshg.add_object(body(1, 0.0, 0.0, 10.0, 10.0));
        let span = hshg.tier_cell_sizes()[0] * 16.0;
        // One full grid span away hashes to the same cell
        let far = body(2, span + 1.0, 1.0, 10.0, 10.0);
        hshg.add_object(far);

        let grid = hshg.tiers().next().unwrap();
        assert_eq!(grid.occupied_cells().len(), 1);
        assert!(hshg.query_for_collision_pairs().is_empty());
    }

    #[test]
    fn test_static_pairs() {
        let mut hshg = Hshg::new();
        hshg.add_object(static_body(1, 0.0, 0.0, 10.0));
        hshg.add_object(static_body(2, 5.0, 5.0, 10.0));
        assert!(hshg.query_for_collision_pairs().is_empty());

        hshg.add_object(body(3, 2.0, 2.0, 10.0, 10.0));
        let found = pair_ids(&hshg.query_for_collision_pairs());
        assert_eq!(found, ids([(1, 3), (2, 3)]));
    }

    #[test]
    fn test_custom_overlap_test() {
        let mut hshg = Hshg::new();
        let bodies: Vec<_> = (0..4)
            .map(|i| body(i, i as f32, 0.0, 10.0, 10.0))
            .collect();
        for b in &bodies {
            hshg.add_object(b.clone());
        }

        assert!(hshg.query_for_collision_pairs_with(|_, _| false).is_empty());
        assert!(bodies.iter().all(|b| b.hits.borrow().is_empty()));

        // Discovery topology is independent of the test
        let even = hshg.query_for_collision_pairs_with(|a, b| (a.id + b.id) % 2 == 0);
        assert_eq!(pair_ids(&even), ids([(0, 2), (1, 3)]));

        let live = hshg.query_for_collision_pairs_with(aabb_overlap_test);
        assert_eq!(live.len(), 6);
    }

    #[test]
    fn test_custom_test_sees_static_pairs() {
        let mut hshg = Hshg::new();
        hshg.add_object(static_body(1, 0.0, 0.0, 10.0));
        hshg.add_object(static_body(2, 5.0, 5.0, 10.0));
        let pairs = hshg.query_for_collision_pairs_with(|a, b| a.aabb().overlaps(&b.aabb()));
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn test_handle_pairs() {
        let mut hshg = Hshg::new();
        let a = hshg.add_object(body(1, 0.0, 0.0, 10.0, 10.0));
        let b = hshg.add_object(body(2, 5.0, 5.0, 10.0, 10.0));
        hshg.add_object(body(3, 500.0, 5.0, 10.0, 10.0));

        let pairs = hshg.query_handle_pairs();
        assert_eq!(pairs.len(), 1);
        let (x, y) = pairs[0];
        assert!((x, y) == (a, b) || (x, y) == (b, a));

        // Deferred removal after the query
        for (x, _) in pairs {
            hshg.remove_object(x);
        }
        assert!(hshg.query_handle_pairs().is_empty());
    }

    #[test]
    fn test_for_each_matches_query() {
        let mut rng = StdRng::seed_from_u64(7);
        let bodies = random_bodies(&mut rng, 80, 120.0, &[4.0, 12.0, 40.0]);
        let mut hshg = Hshg::new();
        for b in &bodies {
            hshg.add_object(b.clone());
        }

        let mut count = 0;
        hshg.for_each_collision_pair(|_, _| count += 1);
        assert_eq!(count, hshg.query_for_collision_pairs().len());
        // for_each does not notify; the query above notified each pair twice
        let notified: usize = bodies.iter().map(|b| b.hits.borrow().len()).sum();
        assert_eq!(notified, count * 2);
    }

    #[test]
    fn test_swap_remove_consistency() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut bodies = random_bodies(&mut rng, 150, 200.0, &[2.0, 5.0, 10.0, 30.0, 90.0]);
        let mut hshg = Hshg::new();
        let mut handles: Vec<_> = bodies.iter().map(|b| hshg.add_object(b.clone())).collect();
        assert!(hshg.tier_count() >= 3);
        assert_matches_reference(&hshg, &bodies);

        // Remove interior-indexed objects one at a time and re-check
        for &index in &[75usize, 3, 100, 50, 0] {
            let removed = hshg.remove_object(handles[index]);
            assert_eq!(removed.map(|b| b.id), Some(bodies[index].id));
            handles.remove(index);
            bodies.remove(index);
            assert_eq!(hshg.len(), bodies.len());
            assert_matches_reference(&hshg, &bodies);
        }
    }

    #[test]
    fn test_expansion_preserves_pairs() {
        let mut rng = StdRng::seed_from_u64(3);
        let bodies: Vec<_> = (0..40)
            .map(|id| body(id, rng.gen_range(0.0..150.0), rng.gen_range(0.0..150.0), 10.0, 10.0))
            .collect();
        let mut hshg = Hshg::new();
        for b in &bodies {
            hshg.add_object(b.clone());
        }

        assert_eq!(hshg.tier_count(), 1);
        assert!(hshg.grid_expansions() >= 1);
        assert!(hshg.tiers().next().unwrap().cell_count() > 256);
        assert_matches_reference(&hshg, &bodies);
    }

    #[test]
    fn test_pairs_follow_update() {
        let mut rng = StdRng::seed_from_u64(11);
        let bodies = random_bodies(&mut rng, 120, 150.0, &[3.0, 8.0, 25.0, 70.0]);
        let mut hshg = Hshg::new();
        for b in &bodies {
            hshg.add_object(b.clone());
        }

        for _ in 0..5 {
            for b in &bodies {
                let step = Vec2::new(rng.gen_range(-6.0..6.0), rng.gen_range(-6.0..6.0));
                b.aabb.set(b.aabb.get().translated(step));
            }
            hshg.update();
            assert_matches_reference(&hshg, &bodies);
        }
    }

    #[test]
    fn test_small_grid_config() {
        let config = HshgConfig {
            initial_grid_length: 16,
            ..HshgConfig::default()
        };
        let mut hshg = Hshg::with_config(config).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let bodies = random_bodies(&mut rng, 60, 80.0, &[5.0, 20.0]);
        for b in &bodies {
            hshg.add_object(b.clone());
        }
        assert_matches_reference(&hshg, &bodies);
    }

    #[test]
    fn test_live_overlap_test() {
        let a = body(1, 0.0, 0.0, 10.0, 10.0);
        let b = body(2, 10.0, 0.0, 10.0, 10.0);
        assert!(aabb_overlap_test(&a, &b));
        b.aabb.set(Aabb::from_min_size(Vec2::new(10.5, 0.0), Vec2::splat(10.0)));
        assert!(!aabb_overlap_test(&a, &b));
        assert!(!aabb_overlap_test(&static_body(3, 0.0, 0.0, 5.0), &static_body(4, 0.0, 0.0, 5.0)));
    }
}
