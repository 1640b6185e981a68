use ordered_float::OrderedFloat;
use tracing::debug;

use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::point::{Bounds, Point};
use crate::routing::{RoadEdge, RoadNetwork};
use crate::spatial::{Neighbor, SpatialIndex};

use super::types::RankedTaxi;

/// Fuses the spatial index (candidate generation) with the road network
/// (authoritative ranking).
#[derive(Debug, Clone, Default)]
pub struct DispatchEngine {
    config: DispatchConfig,
}

impl DispatchEngine {
    pub fn new(config: DispatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// How many straight-line candidates to fetch before road ranking.
    ///
    /// Small fleets are ranked exhaustively. Larger ones over-fetch by
    /// `oversample_factor`, since road distance can reorder the straight-line
    /// order.
    pub fn candidate_count(&self, fleet_size: usize, desired: usize) -> usize {
        if fleet_size <= self.config.small_fleet_threshold {
            fleet_size.max(desired)
        } else {
            desired
                .saturating_mul(self.config.oversample_factor)
                .max(desired)
        }
    }

    /// Straight-line candidates for `pickup`.
    pub fn candidates(&self, index: &SpatialIndex, pickup: Point, desired: usize) -> Vec<Neighbor> {
        let m = self.candidate_count(index.len(), desired);
        index.k_nearest(pickup, m)
    }

    /// Rank `candidates` by road distance to `pickup` and keep the best
    /// `desired`. Candidates without a road route are left out.
    ///
    /// The network must already contain the pickup and every candidate; see
    /// [`RoadNetwork::ensure_connected`].
    pub fn rank(
        &self,
        network: &RoadNetwork,
        pickup: Point,
        candidates: &[Neighbor],
        desired: usize,
    ) -> Vec<RankedTaxi> {
        let mut reachable = Vec::with_capacity(candidates.len());
        for (order, candidate) in candidates.iter().enumerate() {
            match network.shortest_path(candidate.point, pickup) {
                Ok(route) => reachable.push((order, candidate, route)),
                Err(err) => {
                    debug!(taxi = %candidate.point, %pickup, %err, "excluding unreachable candidate");
                }
            }
        }

        reachable.sort_by_key(|(order, candidate, route)| {
            (
                OrderedFloat(route.distance),
                OrderedFloat(candidate.distance),
                *order,
            )
        });
        reachable.truncate(desired);

        reachable
            .into_iter()
            .enumerate()
            .map(|(position, (_, candidate, route))| RankedTaxi {
                location: candidate.point,
                rank: position + 1,
                euclidean_distance: candidate.distance,
                graph_distance: route.distance,
                estimated_time: route.distance / self.config.speed_units_per_minute,
                path: route.path,
            })
            .collect()
    }

    /// Single-owner version of the whole query: candidates, network extension
    /// and ranking.
    pub fn find_nearest_taxis(
        &self,
        index: &SpatialIndex,
        network: &mut RoadNetwork,
        pickup: Point,
        desired: usize,
    ) -> Result<Vec<RankedTaxi>, DispatchError> {
        pickup.ensure_valid("pickup")?;
        let candidates = self.candidates(index, pickup, desired);
        network.ensure_connected(&Self::points_to_connect(pickup, None, &candidates))?;
        Ok(self.rank(network, pickup, &candidates, desired))
    }

    /// Pickup, then the dropoff if any, then the candidates.
    pub fn points_to_connect(
        pickup: Point,
        dropoff: Option<Point>,
        candidates: &[Neighbor],
    ) -> Vec<Point> {
        let mut points = Vec::with_capacity(candidates.len() + 2);
        points.push(pickup);
        points.extend(dropoff);
        points.extend(candidates.iter().map(|c| c.point));
        points
    }

    /// Road edges around the trip, for display: both endpoints inside the
    /// bounding box of pickup, dropoff and ranked taxis, grown per axis by half
    /// its range or `display_margin`, whichever is larger.
    pub fn display_edges(
        &self,
        network: &RoadNetwork,
        pickup: Point,
        dropoff: Option<Point>,
        ranked: &[RankedTaxi],
    ) -> Vec<RoadEdge> {
        let mut points = vec![pickup];
        points.extend(dropoff);
        points.extend(ranked.iter().map(|taxi| taxi.location));
        match Bounds::around(points.iter()) {
            Some(bounds) => network.edges_within(&bounds.expanded(self.config.display_margin)),
            None => Vec::new(),
        }
    }
}
