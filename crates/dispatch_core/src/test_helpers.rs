//! Test helpers for common fleet and network setup.
//!
//! Shared by unit tests, integration tests and benches so every test reuses the
//! same geography.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::api::Dispatcher;
use crate::config::DispatchConfig;
use crate::point::Point;
use crate::routing::{NetworkConfig, RoadNetwork};
use crate::spatial::{IndexConfig, SpatialIndex};
use crate::state::FleetState;

/// Seed used by every helper below.
pub const TEST_SEED: u64 = 42;

/// `count` points with real coordinates in `[0, extent)`, seeded.
pub fn random_points(count: usize, extent: f64, seed: u64) -> Vec<Point> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| Point::new(rng.gen_range(0.0..extent), rng.gen_range(0.0..extent)))
        .collect()
}

/// Taxis at `(0, 0)` and `(10, 10)`, pickup at `(1, 1)`. The straight-line
/// nearest taxi sits behind an expensive road (weight 100); the far one has a
/// cheap one (weight 5).
pub fn walled_fleet() -> (Vec<Point>, Point, RoadNetwork) {
    let near = Point::new(0.0, 0.0);
    let far = Point::new(10.0, 10.0);
    let pickup = Point::new(1.0, 1.0);
    let network = RoadNetwork::from_edges(
        NetworkConfig::default(),
        &[(near, pickup, 100.0), (far, pickup, 5.0)],
    )
    .expect("walled network edges are valid");
    (vec![near, far], pickup, network)
}

/// Dispatcher over the walled fleet, using the hand-built network.
pub fn walled_dispatcher() -> (Dispatcher, Point) {
    let (taxis, pickup, network) = walled_fleet();
    let index = SpatialIndex::from_points(&taxis, IndexConfig::default());
    let state = FleetState::new(index, network);
    let dispatcher = Dispatcher::new(std::sync::Arc::new(state), DispatchConfig::default());
    (dispatcher, pickup)
}

/// Dispatcher over the default seeded 50-taxi fleet.
pub fn seeded_dispatcher() -> Dispatcher {
    let config = DispatchConfig::default();
    let taxis = config.fleet.generate();
    Dispatcher::with_fleet(config, &taxis).expect("default config is valid")
}

/// Brute-force k nearest distances, for checking the tree.
pub fn brute_force_distances(points: &[Point], query: Point, k: usize) -> Vec<f64> {
    let mut distances: Vec<f64> = points.iter().map(|p| p.distance(&query)).collect();
    distances.sort_by(f64::total_cmp);
    distances.truncate(k);
    distances
}
