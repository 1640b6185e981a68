//! Taxi relocation: move one taxi in the index and report the trip it made.
//!
//! A relocation is planned first (taxi present, road route found) and only then
//! applied (delete + insert), so every failure leaves the index untouched.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::point::Point;
use crate::routing::{RoadNetwork, Route};
use crate::spatial::SpatialIndex;

/// Outcome of a successful relocation. Tree metrics are taken after the insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relocation {
    pub moved_from: Point,
    pub moved_to: Point,
    pub distance: f64,
    /// Minutes.
    pub time: f64,
    pub path: Vec<Point>,
    pub tree_height: usize,
    pub tree_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelocationController {
    speed_units_per_minute: f64,
}

impl Default for RelocationController {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default())
    }
}

impl RelocationController {
    pub fn new(speed_units_per_minute: f64) -> Self {
        Self {
            speed_units_per_minute,
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(config.speed_units_per_minute)
    }

    /// Check the taxi exists and find the road route for the move. Extends the
    /// network with `from` and `to` when needed; never touches the index.
    pub fn plan(
        &self,
        index: &SpatialIndex,
        network: &mut RoadNetwork,
        from: Point,
        to: Point,
    ) -> Result<Route, DispatchError> {
        from.ensure_valid("from")?;
        to.ensure_valid("to")?;
        if !index.contains(from) {
            return Err(DispatchError::TaxiNotFound { point: from });
        }
        network.ensure_connected(&[from, to])?;
        network.shortest_path(from, to)
    }

    /// Move the taxi along an already planned `route`.
    pub fn apply(
        &self,
        index: &mut SpatialIndex,
        from: Point,
        to: Point,
        route: Route,
    ) -> Result<Relocation, DispatchError> {
        index.delete(from)?;
        index.insert(to);
        let metrics = index.metrics();
        info!(
            %from,
            %to,
            distance = route.distance,
            tree_height = metrics.height,
            tree_size = metrics.size,
            "relocated taxi"
        );
        Ok(Relocation {
            moved_from: from,
            moved_to: to,
            distance: route.distance,
            time: route.distance / self.speed_units_per_minute,
            path: route.path,
            tree_height: metrics.height,
            tree_size: metrics.size,
        })
    }

    /// Plan and apply in one step.
    pub fn relocate(
        &self,
        index: &mut SpatialIndex,
        network: &mut RoadNetwork,
        from: Point,
        to: Point,
    ) -> Result<Relocation, DispatchError> {
        let route = self.plan(index, network, from, to)?;
        self.apply(index, from, to, route)
    }
}
