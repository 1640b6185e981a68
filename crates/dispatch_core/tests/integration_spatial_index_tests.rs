mod support;

use dispatch_core::point::Point;
use dispatch_core::spatial::{IndexConfig, SpatialIndex, TreeMetrics};
use dispatch_core::test_helpers::{brute_force_distances, random_points, TEST_SEED};
use dispatch_core::DispatchError;
use proptest::prelude::*;
use rstest::rstest;

use support::fleets::{lattice, plain_index, sorted};

fn coordinate() -> impl Strategy<Value = f64> {
    // Small integer range so duplicates and split-plane ties are common.
    (-20i32..20).prop_map(f64::from)
}

fn point() -> impl Strategy<Value = Point> {
    (coordinate(), coordinate()).prop_map(|(x, y)| Point::new(x, y))
}

proptest! {
    #[test]
    fn invariants_hold_after_mixed_mutations(
        initial in prop::collection::vec(point(), 0..60),
        removals in prop::collection::vec(any::<prop::sample::Index>(), 0..30),
        additions in prop::collection::vec(point(), 0..30),
        rebuild in any::<bool>(),
    ) {
        let config = IndexConfig {
            rebuild_height_factor: rebuild.then_some(1.0),
        };
        let mut index = SpatialIndex::new(config);
        let mut live = Vec::new();
        for p in &initial {
            index.insert(*p);
            live.push(*p);
            prop_assert!(index.validate().is_ok());
        }
        for removal in &removals {
            if live.is_empty() {
                break;
            }
            let target = live.remove(removal.index(live.len()));
            prop_assert!(index.delete(target).is_ok());
            prop_assert!(index.validate().is_ok());
        }
        for p in &additions {
            index.insert(*p);
            live.push(*p);
        }
        prop_assert!(index.validate().is_ok());
        prop_assert_eq!(index.len(), live.len());
        prop_assert_eq!(sorted(index.points()), sorted(live));
    }

    #[test]
    fn insert_then_delete_restores_structure(
        initial in prop::collection::vec(point(), 0..40),
        extra in point(),
    ) {
        // With a duplicate present, delete takes the copy nearest the root.
        prop_assume!(!initial.contains(&extra));
        let mut index = plain_index(&initial);
        let before = index.points();
        let metrics = index.metrics();
        index.insert(extra);
        prop_assert!(index.delete(extra).is_ok());
        prop_assert_eq!(index.metrics(), metrics);
        prop_assert_eq!(index.points(), before);
    }

    #[test]
    fn k_nearest_matches_brute_force(
        fleet in prop::collection::vec(point(), 1..80),
        query in point(),
        k in 1usize..12,
    ) {
        let index = SpatialIndex::from_points(&fleet, IndexConfig::default());
        let got: Vec<f64> = index.k_nearest(query, k).iter().map(|n| n.distance).collect();
        prop_assert_eq!(got, brute_force_distances(&fleet, query, k));
    }

    #[test]
    fn k_nearest_breaks_ties_by_insertion_order_after_churn(
        initial in prop::collection::vec(point(), 0..40),
        steps in prop::collection::vec((any::<bool>(), point(), any::<prop::sample::Index>()), 0..80),
        query in point(),
        k in 1usize..16,
        rebuild in any::<bool>(),
    ) {
        // Distinct positions keep the ticket of every live taxi unambiguous.
        let mut live: Vec<(Point, u64)> = Vec::new();
        for p in initial {
            if !live.iter().any(|(q, _)| *q == p) {
                live.push((p, live.len() as u64));
            }
        }
        let config = IndexConfig {
            rebuild_height_factor: rebuild.then_some(1.0),
        };
        let seed: Vec<Point> = live.iter().map(|(p, _)| *p).collect();
        let mut index = SpatialIndex::from_points(&seed, config);
        let mut next_ticket = live.len() as u64;

        for (insert, p, pick) in steps {
            if insert || live.is_empty() {
                if live.iter().any(|(q, _)| *q == p) {
                    continue;
                }
                index.insert(p);
                live.push((p, next_ticket));
                next_ticket += 1;
            } else {
                let (target, _) = live.remove(pick.index(live.len()));
                prop_assert!(index.delete(target).is_ok());
            }
        }
        prop_assert!(index.validate().is_ok());

        let mut expected = live.clone();
        expected.sort_by(|(a, ta), (b, tb)| {
            a.distance_squared(&query)
                .total_cmp(&b.distance_squared(&query))
                .then(ta.cmp(tb))
        });
        expected.truncate(k);
        let got: Vec<(Point, u64)> = index
            .k_nearest(query, k)
            .iter()
            .map(|n| (n.point, n.ticket))
            .collect();
        prop_assert_eq!(got, expected);
    }
}

#[rstest]
#[case::empty(0, 0)]
#[case::single(1, 1)]
#[case::pair(2, 2)]
#[case::seven(7, 3)]
#[case::fifteen(15, 4)]
fn balanced_build_height(#[case] size: usize, #[case] height: usize) {
    let points = random_points(size, 100.0, TEST_SEED);
    let index = SpatialIndex::from_points(&points, IndexConfig::default());
    assert_eq!(index.metrics(), TreeMetrics { height, size });
}

#[rstest]
#[case::rebuild_enabled(Some(2.0))]
#[case::rebuild_disabled(None)]
fn lattice_churn_keeps_every_taxi(#[case] factor: Option<f64>) {
    let fleet = lattice(8);
    let mut index = SpatialIndex::new(IndexConfig {
        rebuild_height_factor: factor,
    });
    for p in &fleet {
        index.insert(*p);
    }
    // Shift every taxi one column right, one at a time.
    for p in fleet.iter().rev() {
        index.delete(*p).expect("taxi present");
        index.insert(Point::new(p.x + 1.0, p.y));
    }
    index.validate().expect("valid");
    assert_eq!(index.len(), 64);
    for p in &fleet {
        assert!(index.contains(Point::new(p.x + 1.0, p.y)));
    }
}

#[test]
fn rebuild_bounds_height_for_sorted_input() {
    let mut index = SpatialIndex::new(IndexConfig::default());
    let mut plain = plain_index(&[]);
    for i in 0..500 {
        let p = Point::new(i as f64, 0.5 * i as f64);
        index.insert(p);
        plain.insert(p);
    }
    assert_eq!(plain.metrics().height, 500);
    // ceil(2 * log2(501)) + 1
    assert!(index.metrics().height <= 19);
    index.validate().expect("valid");
}

#[test]
fn delete_of_missing_taxi_keeps_tree() {
    let mut index = plain_index(&lattice(4));
    let before = index.points();
    let err = index.delete(Point::new(0.5, 0.5)).expect_err("not a taxi");
    assert_eq!(
        err,
        DispatchError::TaxiNotFound {
            point: Point::new(0.5, 0.5)
        }
    );
    assert_eq!(index.points(), before);
}

#[test]
fn k_nearest_scenario_prefers_straight_line() {
    let index = plain_index(&[Point::new(0.0, 0.0), Point::new(10.0, 10.0)]);
    let nearest = index.k_nearest(Point::new(1.0, 1.0), 1);
    assert_eq!(nearest.len(), 1);
    assert_eq!(nearest[0].point, Point::new(0.0, 0.0));
}

#[test]
fn delete_everything_then_refill() {
    let fleet = random_points(200, 50.0, TEST_SEED);
    let mut index = SpatialIndex::from_points(&fleet, IndexConfig::default());
    for p in &fleet {
        index.delete(*p).expect("present");
    }
    assert_eq!(index.metrics(), TreeMetrics { height: 0, size: 0 });
    for p in &fleet {
        index.insert(*p);
    }
    index.validate().expect("valid");
    assert_eq!(index.len(), 200);
}
