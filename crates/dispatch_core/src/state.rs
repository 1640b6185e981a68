//! Process-wide fleet state: the spatial index and the road network behind
//! reader/writer locks.
//!
//! Lock order is index, then network. Poisoned locks surface as
//! [`DispatchError::LockPoisoned`] rather than panicking the caller.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::point::Point;
use crate::routing::RoadNetwork;
use crate::spatial::{SpatialIndex, TreeMetrics};

fn poisoned<G>(context: &'static str) -> impl Fn(PoisonError<G>) -> DispatchError {
    move |_| DispatchError::LockPoisoned(context)
}

#[derive(Debug)]
pub struct FleetState {
    index: RwLock<SpatialIndex>,
    network: RwLock<RoadNetwork>,
}

impl FleetState {
    pub fn new(index: SpatialIndex, network: RoadNetwork) -> Self {
        Self {
            index: RwLock::new(index),
            network: RwLock::new(network),
        }
    }

    /// Balanced index over `taxis` and a network already linking every taxi.
    pub fn from_fleet(taxis: &[Point], config: &DispatchConfig) -> Result<Self, DispatchError> {
        for taxi in taxis {
            taxi.ensure_valid("taxi")?;
        }
        let index = SpatialIndex::from_points(taxis, config.index.clone());
        let mut network = RoadNetwork::new(config.network.clone());
        network.ensure_connected(taxis)?;
        Ok(Self::new(index, network))
    }

    pub fn read_index(&self) -> Result<RwLockReadGuard<'_, SpatialIndex>, DispatchError> {
        self.index.read().map_err(poisoned("reading the spatial index"))
    }

    pub fn write_index(&self) -> Result<RwLockWriteGuard<'_, SpatialIndex>, DispatchError> {
        self.index.write().map_err(poisoned("writing the spatial index"))
    }

    pub fn read_network(&self) -> Result<RwLockReadGuard<'_, RoadNetwork>, DispatchError> {
        self.network.read().map_err(poisoned("reading the road network"))
    }

    pub fn write_network(&self) -> Result<RwLockWriteGuard<'_, RoadNetwork>, DispatchError> {
        self.network.write().map_err(poisoned("writing the road network"))
    }

    /// Link any of `points` the network does not know yet. Takes the write lock
    /// only when something is missing.
    pub fn connect(&self, points: &[Point]) -> Result<(), DispatchError> {
        {
            let network = self.read_network()?;
            if points.iter().all(|p| network.contains_vertex(*p)) {
                return Ok(());
            }
        }
        self.write_network()?.ensure_connected(points)?;
        Ok(())
    }

    pub fn metrics(&self) -> Result<TreeMetrics, DispatchError> {
        Ok(self.read_index()?.metrics())
    }

    /// Current taxi positions, for snapshots.
    pub fn taxis(&self) -> Result<Vec<Point>, DispatchError> {
        Ok(self.read_index()?.points())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn from_fleet_links_every_taxi() {
        let taxis = [Point::new(0.0, 0.0), Point::new(4.0, 3.0), Point::new(9.0, 9.0)];
        let state = FleetState::from_fleet(&taxis, &DispatchConfig::default()).expect("state");
        assert_eq!(state.metrics().expect("metrics").size, 3);
        let network = state.read_network().expect("network");
        assert_eq!(network.vertex_count(), 3);
        network
            .shortest_path(taxis[0], taxis[2])
            .expect("connected");
    }

    #[test]
    fn rejects_non_finite_taxis() {
        let taxis = [Point::new(f64::NAN, 0.0)];
        assert!(FleetState::from_fleet(&taxis, &DispatchConfig::default()).is_err());
    }

    #[test]
    fn poisoned_index_lock_is_reported() {
        let state = Arc::new(
            FleetState::from_fleet(&[Point::new(1.0, 1.0)], &DispatchConfig::default())
                .expect("state"),
        );
        let clone = Arc::clone(&state);
        let _ = thread::spawn(move || {
            let _guard = clone.write_index().expect("lock");
            panic!("poison the index lock");
        })
        .join();
        assert!(matches!(
            state.metrics(),
            Err(DispatchError::LockPoisoned(_))
        ));
    }

    #[test]
    fn queries_keep_the_index_snapshot_until_they_answer() {
        use std::time::Duration;

        use crate::api::Dispatcher;
        use crate::contract::QueryRequest;

        let config = DispatchConfig::default();
        let taxis = [Point::new(0.0, 0.0), Point::new(5.0, 5.0)];
        let state = Arc::new(FleetState::from_fleet(&taxis, &config).expect("state"));
        let dispatcher = Dispatcher::new(Arc::clone(&state), config);

        // The pickup is a new vertex, so the query stalls on the network lock.
        let network = state.write_network().expect("network");
        let query = thread::spawn(move || {
            dispatcher.query(QueryRequest {
                pickup: Point::new(1.0, 1.0),
                dropoff: None,
            })
        });

        let mut index_held = false;
        for _ in 0..2_000 {
            if state.index.try_write().is_err() {
                index_held = true;
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        drop(network);
        let response = query.join().expect("query thread").expect("query");

        assert!(index_held, "query released the index before ranking");
        assert_eq!(response.nearest_taxis.len(), 2);
    }
}
