//! Road network: weighted undirected graph over points, with shortest paths.
//!
//! - **RoadNetwork**: vertices keyed by exact coordinates, adjacency lists, and an
//!   LRU cache of computed routes (evicted when a new edge could shorten them)
//! - **EdgePolicy**: how [`RoadNetwork::ensure_connected`] wires new points into
//!   the graph
//!
//! Edge generation is a deterministic function of the configured seed, the policy
//! and the order in which points are connected.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use ordered_float::OrderedFloat;
use pathfinding::prelude::dijkstra;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DispatchError;
use crate::point::{Axis, Bounds, Point, PointKey};

/// Default number of routes kept in the LRU cache.
pub const DEFAULT_ROUTE_CACHE_CAPACITY: usize = 4_096;

/// Relative slack on the eviction bound, absorbing rounding in summed lengths.
const ROUTE_BOUND_SLACK: f64 = 1e-9;

/// How new points are linked to the existing graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EdgePolicy {
    /// Link to the `neighbors` straight-line-nearest existing vertices.
    Proximity { neighbors: usize },
    /// Link to every existing vertex.
    Complete,
    /// Walk a unit staircase (x first, then y) from the nearest existing vertex,
    /// adding lattice vertices on the way. Falls back to a direct edge when the
    /// walk would take more than `max_steps` steps.
    Grid { max_steps: usize },
}

impl Default for EdgePolicy {
    fn default() -> Self {
        EdgePolicy::Proximity { neighbors: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub policy: EdgePolicy,
    /// Seed for the per-edge detour factors.
    pub seed: u64,
    /// Generated edge weights are the straight-line length times a factor in
    /// `[1, 1 + detour_jitter]`.
    pub detour_jitter: f64,
    pub route_cache_capacity: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            policy: EdgePolicy::default(),
            seed: 42,
            detour_jitter: 0.25,
            route_cache_capacity: DEFAULT_ROUTE_CACHE_CAPACITY,
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<(), DispatchError> {
        if !(self.detour_jitter.is_finite() && self.detour_jitter >= 0.0) {
            return Err(DispatchError::InvalidInput(format!(
                "detour_jitter must be a non-negative finite number, got {}",
                self.detour_jitter
            )));
        }
        if let EdgePolicy::Proximity { neighbors: 0 } = self.policy {
            return Err(DispatchError::InvalidInput(
                "proximity policy needs at least one neighbor".to_string(),
            ));
        }
        Ok(())
    }
}

/// Shortest route between two points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub distance: f64,
    /// Vertices from start to end, both included.
    pub path: Vec<Point>,
}

impl Route {
    fn stationary(at: Point) -> Self {
        Self {
            distance: 0.0,
            path: vec![at],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoadEdge {
    pub from: Point,
    pub to: Point,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy)]
struct EdgeRecord {
    a: usize,
    b: usize,
    weight: f64,
}

/// Weighted undirected road graph.
pub struct RoadNetwork {
    config: NetworkConfig,
    vertices: Vec<Point>,
    lookup: HashMap<PointKey, usize>,
    adjacency: Vec<Vec<(usize, f64)>>,
    edges: Vec<EdgeRecord>,
    edge_lookup: HashMap<(usize, usize), usize>,
    route_cache: Mutex<LruCache<(usize, usize), Route>>,
    /// Every edge is at least as long as the straight line between its ends.
    euclidean_bounded: bool,
}

impl fmt::Debug for RoadNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoadNetwork")
            .field("config", &self.config)
            .field("vertices", &self.vertices.len())
            .field("edges", &self.edges.len())
            .finish()
    }
}

impl Default for RoadNetwork {
    fn default() -> Self {
        Self::new(NetworkConfig::default())
    }
}

impl RoadNetwork {
    pub fn new(config: NetworkConfig) -> Self {
        let capacity = NonZeroUsize::new(config.route_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            vertices: Vec::new(),
            lookup: HashMap::new(),
            adjacency: Vec::new(),
            edges: Vec::new(),
            edge_lookup: HashMap::new(),
            route_cache: Mutex::new(LruCache::new(capacity)),
            euclidean_bounded: true,
        }
    }

    /// Build a network from explicit `(from, to, weight)` edges.
    pub fn from_edges(
        config: NetworkConfig,
        edges: &[(Point, Point, f64)],
    ) -> Result<Self, DispatchError> {
        let mut network = Self::new(config);
        for &(from, to, weight) in edges {
            network.add_edge(from, to, weight)?;
        }
        Ok(network)
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains_vertex(&self, point: Point) -> bool {
        self.lookup.contains_key(&point.key())
    }

    /// Add `point` as an isolated vertex; a no-op when it already exists.
    pub fn add_vertex(&mut self, point: Point) -> Result<usize, DispatchError> {
        point.ensure_valid("vertex")?;
        Ok(self.vertex_id(point))
    }

    /// Add an undirected edge or overwrite the weight of an existing one.
    /// Self loops are ignored.
    pub fn add_edge(&mut self, from: Point, to: Point, weight: f64) -> Result<(), DispatchError> {
        from.ensure_valid("edge start")?;
        to.ensure_valid("edge end")?;
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(DispatchError::InvalidInput(format!(
                "edge weight must be a non-negative finite number, got {weight}"
            )));
        }
        let a = self.vertex_id(from);
        let b = self.vertex_id(to);
        self.link(a, b, weight);
        Ok(())
    }

    /// Shortest road route from `from` to `to` (Dijkstra).
    pub fn shortest_path(&self, from: Point, to: Point) -> Result<Route, DispatchError> {
        if from == to {
            return Ok(Route::stationary(from));
        }
        let unreachable = || DispatchError::Unreachable { from, to };
        let start = *self.lookup.get(&from.key()).ok_or_else(unreachable)?;
        let goal = *self.lookup.get(&to.key()).ok_or_else(unreachable)?;

        if let Ok(mut cache) = self.route_cache.lock() {
            if let Some(route) = cache.get(&(start, goal)) {
                return Ok(route.clone());
            }
        }

        let (ids, cost) = dijkstra(
            &start,
            |&node| {
                self.adjacency[node]
                    .iter()
                    .map(|&(next, weight)| (next, OrderedFloat(weight)))
            },
            |&node| node == goal,
        )
        .ok_or_else(unreachable)?;

        let route = Route {
            distance: cost.into_inner(),
            path: ids.into_iter().map(|id| self.vertices[id]).collect(),
        };
        if let Ok(mut cache) = self.route_cache.lock() {
            cache.put((start, goal), route.clone());
        }
        Ok(route)
    }

    /// Make every point in `points` a vertex linked into the graph according to
    /// the configured [`EdgePolicy`]. Points already present are left alone.
    /// Returns the number of points that were new.
    pub fn ensure_connected(&mut self, points: &[Point]) -> Result<usize, DispatchError> {
        for point in points {
            point.ensure_valid("point")?;
        }
        let mut added = 0;
        for &point in points {
            if self.contains_vertex(point) {
                continue;
            }
            self.connect_new(point);
            added += 1;
        }
        if added > 0 {
            debug!(
                added,
                vertices = self.vertices.len(),
                edges = self.edges.len(),
                "extended road network"
            );
        }
        Ok(added)
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> Vec<RoadEdge> {
        self.edges.iter().map(|e| self.road_edge(e)).collect()
    }

    /// Edges whose two endpoints both lie inside `bounds`.
    pub fn edges_within(&self, bounds: &Bounds) -> Vec<RoadEdge> {
        self.edges
            .iter()
            .filter(|e| bounds.contains(&self.vertices[e.a]) && bounds.contains(&self.vertices[e.b]))
            .map(|e| self.road_edge(e))
            .collect()
    }

    fn road_edge(&self, edge: &EdgeRecord) -> RoadEdge {
        RoadEdge {
            from: self.vertices[edge.a],
            to: self.vertices[edge.b],
            weight: edge.weight,
        }
    }

    fn vertex_id(&mut self, point: Point) -> usize {
        if let Some(&id) = self.lookup.get(&point.key()) {
            return id;
        }
        let id = self.vertices.len();
        self.vertices.push(point);
        self.adjacency.push(Vec::new());
        self.lookup.insert(point.key(), id);
        id
    }

    fn link(&mut self, a: usize, b: usize, weight: f64) {
        if a == b {
            return;
        }
        let (pa, pb) = (self.vertices[a], self.vertices[b]);
        if weight < pa.distance(&pb) {
            self.euclidean_bounded = false;
        }
        let key = (a.min(b), a.max(b));
        match self.edge_lookup.get(&key) {
            Some(&edge) => {
                self.edges[edge].weight = weight;
                for (from, to) in [(a, b), (b, a)] {
                    if let Some(slot) = self.adjacency[from].iter_mut().find(|(n, _)| *n == to) {
                        slot.1 = weight;
                    }
                }
                self.clear_route_cache();
            }
            None => {
                self.edge_lookup.insert(key, self.edges.len());
                self.edges.push(EdgeRecord { a, b, weight });
                self.adjacency[a].push((b, weight));
                self.adjacency[b].push((a, weight));
                self.evict_routes_through(pa, pb, weight);
            }
        }
    }

    /// Drop cached routes that the new edge `a`-`b` could shorten. With every
    /// edge at least as long as its straight line, a route from `s` to `t` over
    /// the edge costs at least |s a| + weight + |b t| (or the mirrored sum).
    fn evict_routes_through(&mut self, a: Point, b: Point, weight: f64) {
        if !self.euclidean_bounded {
            self.clear_route_cache();
            return;
        }
        let cache = match self.route_cache.get_mut() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        };
        let stale: Vec<(usize, usize)> = cache
            .iter()
            .filter(|(_, route)| {
                let (Some(s), Some(t)) = (route.path.first(), route.path.last()) else {
                    return true;
                };
                let detour = (s.distance(&a) + b.distance(t)).min(s.distance(&b) + a.distance(t));
                detour + weight < route.distance * (1.0 + ROUTE_BOUND_SLACK)
            })
            .map(|(key, _)| *key)
            .collect();
        for key in stale {
            cache.pop(&key);
        }
    }

    fn clear_route_cache(&mut self) {
        match self.route_cache.get_mut() {
            Ok(cache) => cache.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    fn connect_new(&mut self, point: Point) {
        if self.vertices.is_empty() {
            self.vertex_id(point);
            return;
        }
        match self.config.policy.clone() {
            EdgePolicy::Proximity { neighbors } => {
                let nearest = self.nearest_vertices(point, neighbors.max(1));
                let id = self.vertex_id(point);
                for other in nearest {
                    self.link_generated(id, other);
                }
            }
            EdgePolicy::Complete => {
                let id = self.vertex_id(point);
                for other in 0..id {
                    self.link_generated(id, other);
                }
            }
            EdgePolicy::Grid { max_steps } => {
                let anchor = self.nearest_vertices(point, 1);
                let id = self.vertex_id(point);
                let Some(&anchor) = anchor.first() else {
                    return;
                };
                let start = self.vertices[anchor];
                let walk = if grid_steps(start, point) > max_steps {
                    None
                } else {
                    staircase(start, point, max_steps)
                };
                let Some(walk) = walk else {
                    self.link_generated(anchor, id);
                    return;
                };
                let mut previous = anchor;
                for waypoint in walk.into_iter().skip(1) {
                    let next = self.vertex_id(waypoint);
                    self.link_generated(previous, next);
                    previous = next;
                }
            }
        }
    }

    /// Existing vertices ordered by distance to `point`, ties by vertex id.
    fn nearest_vertices(&self, point: Point, count: usize) -> Vec<usize> {
        let mut ranked: Vec<(OrderedFloat<f64>, usize)> = self
            .vertices
            .iter()
            .enumerate()
            .map(|(id, v)| (OrderedFloat(v.distance_squared(&point)), id))
            .collect();
        ranked.sort_unstable();
        ranked.into_iter().take(count).map(|(_, id)| id).collect()
    }

    fn link_generated(&mut self, a: usize, b: usize) {
        let (pa, pb) = (self.vertices[a], self.vertices[b]);
        let weight = pa.distance(&pb) * self.detour_factor(pa, pb);
        self.link(a, b, weight);
    }

    fn detour_factor(&self, a: Point, b: Point) -> f64 {
        if self.config.detour_jitter == 0.0 {
            return 1.0;
        }
        let (lo, hi) = {
            let (ka, kb) = (a.key(), b.key());
            if ka <= kb {
                (ka, kb)
            } else {
                (kb, ka)
            }
        };
        let mut seed = self.config.seed;
        for word in [lo.0, lo.1, hi.0, hi.1] {
            seed = splitmix64(seed ^ word);
        }
        let mut rng = StdRng::seed_from_u64(seed);
        1.0 + rng.gen::<f64>() * self.config.detour_jitter
    }
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn grid_steps(from: Point, to: Point) -> usize {
    ((to.x - from.x).abs().ceil() + (to.y - from.y).abs().ceil()) as usize
}

/// Unit-step walk from `from` to `to`, x first. The last step on each axis is
/// shortened to land exactly on the target coordinate. `None` when the walk
/// needs more than `max_steps` steps or a unit step no longer moves the
/// coordinate (magnitudes past 2^53).
fn staircase(from: Point, to: Point, max_steps: usize) -> Option<Vec<Point>> {
    let mut waypoints = vec![from];
    let mut cursor = from;
    for axis in [Axis::X, Axis::Y] {
        let target = to.coord(axis);
        loop {
            let current = cursor.coord(axis);
            let remaining = target - current;
            if remaining == 0.0 {
                break;
            }
            let next = if remaining.abs() <= 1.0 {
                target
            } else {
                current + remaining.signum()
            };
            if next == current || waypoints.len() > max_steps {
                return None;
            }
            cursor = match axis {
                Axis::X => Point::new(next, cursor.y),
                Axis::Y => Point::new(cursor.x, next),
            };
            waypoints.push(cursor);
        }
    }
    Some(waypoints)
}
