//! Caller-facing operations over one shared [`FleetState`].
//!
//! [`Dispatcher`] is cheap to clone; every clone serves the same fleet.

use std::sync::Arc;

use tracing::debug;

use crate::config::DispatchConfig;
use crate::contract::{
    BookRequest, HealthResponse, MetricsResponse, QueryRequest, QueryResponse, RelocateRequest,
    RoadSegment, StartRideRequest, CONTRACT_VERSION,
};
use crate::error::DispatchError;
use crate::matching::DispatchEngine;
use crate::point::Point;
use crate::relocation::{Relocation, RelocationController};
use crate::state::FleetState;

#[derive(Debug, Clone)]
pub struct Dispatcher {
    state: Arc<FleetState>,
    engine: DispatchEngine,
    relocation: RelocationController,
}

impl Dispatcher {
    pub fn new(state: Arc<FleetState>, config: DispatchConfig) -> Self {
        Self {
            state,
            relocation: RelocationController::from_config(&config),
            engine: DispatchEngine::new(config),
        }
    }

    /// Validate `config` and build fresh state over `taxis`.
    pub fn with_fleet(config: DispatchConfig, taxis: &[Point]) -> Result<Self, DispatchError> {
        config.validate()?;
        let state = FleetState::from_fleet(taxis, &config)?;
        Ok(Self::new(Arc::new(state), config))
    }

    pub fn state(&self) -> &Arc<FleetState> {
        &self.state
    }

    pub fn config(&self) -> &DispatchConfig {
        self.engine.config()
    }

    /// Nearest taxis to the pickup, ranked by road distance. Never mutates the
    /// index; may extend the road network.
    ///
    /// The index read lock is held until the answer is built, so every returned
    /// taxi is where the index put it for the whole query. Relocations wait.
    pub fn query(&self, request: QueryRequest) -> Result<QueryResponse, DispatchError> {
        let QueryRequest { pickup, dropoff } = request;
        pickup.ensure_valid("pickup")?;
        if let Some(dropoff) = dropoff {
            dropoff.ensure_valid("dropoff")?;
        }
        let desired = self.config().desired_count;

        let index = self.state.read_index()?;
        let candidates = self.engine.candidates(&index, pickup, desired);
        self.state
            .connect(&DispatchEngine::points_to_connect(pickup, dropoff, &candidates))?;

        let network = self.state.read_network()?;
        let ranked = self.engine.rank(&network, pickup, &candidates, desired);
        let road_network = self
            .engine
            .display_edges(&network, pickup, dropoff, &ranked)
            .into_iter()
            .map(RoadSegment::from)
            .collect();
        debug!(
            %pickup,
            candidates = candidates.len(),
            ranked = ranked.len(),
            "answered nearest-taxi query"
        );
        drop(network);
        drop(index);

        Ok(QueryResponse {
            pickup,
            dropoff,
            nearest_taxi: ranked.first().cloned(),
            nearest_taxis: ranked,
            road_network,
        })
    }

    /// Move the taxi at `from` to `to`. Holds the index write lock throughout,
    /// so concurrent moves of the same taxi serialize and the later one fails
    /// with [`DispatchError::TaxiNotFound`].
    pub fn relocate(&self, request: RelocateRequest) -> Result<Relocation, DispatchError> {
        let RelocateRequest { from, to } = request;
        let mut index = self.state.write_index()?;
        let route = {
            let mut network = self.state.write_network()?;
            self.relocation.plan(&index, &mut network, from, to)?
        };
        self.relocation.apply(&mut index, from, to, route)
    }

    /// Send the taxi to the rider.
    pub fn book(&self, request: BookRequest) -> Result<Relocation, DispatchError> {
        self.relocate(request.into())
    }

    /// Carry the rider to the dropoff.
    pub fn start_ride(&self, request: StartRideRequest) -> Result<Relocation, DispatchError> {
        self.relocate(request.into())
    }

    pub fn metrics(&self) -> Result<MetricsResponse, DispatchError> {
        Ok(self.state.metrics()?.into())
    }

    pub fn health(&self) -> Result<HealthResponse, DispatchError> {
        let metrics = self.state.metrics()?;
        let network = self.state.read_network()?;
        Ok(HealthResponse {
            status: "ok".to_string(),
            contract_version: CONTRACT_VERSION.to_string(),
            taxis: metrics.size,
            tree_height: metrics.height,
            road_vertices: network.vertex_count(),
            road_edges: network.edge_count(),
        })
    }
}
