//! JSON shapes exchanged with callers and the visualisation layer.

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::matching::RankedTaxi;
use crate::point::Point;
use crate::relocation::Relocation;
use crate::routing::RoadEdge;
use crate::spatial::TreeMetrics;

pub const CONTRACT_VERSION: &str = "v1";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub pickup: Point,
    /// Only bounds the returned road network; ranking ignores it.
    #[serde(default)]
    pub dropoff: Option<Point>,
}

/// Road segment drawn by the display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoadSegment {
    pub from: Point,
    pub to: Point,
}

impl From<RoadEdge> for RoadSegment {
    fn from(edge: RoadEdge) -> Self {
        Self {
            from: edge.from,
            to: edge.to,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub pickup: Point,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dropoff: Option<Point>,
    /// Rank 1 entry, `null` when no taxi is reachable.
    pub nearest_taxi: Option<RankedTaxi>,
    pub nearest_taxis: Vec<RankedTaxi>,
    pub road_network: Vec<RoadSegment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelocateRequest {
    pub from: Point,
    pub to: Point,
}

/// Taxi heads to the rider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookRequest {
    pub pickup: Point,
    pub taxi: Point,
}

/// Taxi carries the rider to the dropoff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StartRideRequest {
    pub dropoff: Point,
    pub taxi: Point,
}

impl From<BookRequest> for RelocateRequest {
    fn from(request: BookRequest) -> Self {
        Self {
            from: request.taxi,
            to: request.pickup,
        }
    }
}

impl From<StartRideRequest> for RelocateRequest {
    fn from(request: StartRideRequest) -> Self {
        Self {
            from: request.taxi,
            to: request.dropoff,
        }
    }
}

pub type RelocateResponse = Relocation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<&DispatchError> for ErrorResponse {
    fn from(err: &DispatchError) -> Self {
        Self {
            error: err.to_string(),
            code: err.code().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub contract_version: String,
    pub taxis: usize,
    pub tree_height: usize,
    pub road_vertices: usize,
    pub road_edges: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    pub tree_height: usize,
    pub tree_size: usize,
}

impl From<TreeMetrics> for MetricsResponse {
    fn from(metrics: TreeMetrics) -> Self {
        Self {
            tree_height: metrics.height,
            tree_size: metrics.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_query_response_shape() {
        let response = QueryResponse {
            pickup: Point::new(1.0, 2.0),
            dropoff: None,
            nearest_taxi: None,
            nearest_taxis: Vec::new(),
            road_network: Vec::new(),
        };
        let value = serde_json::to_value(&response).expect("json");
        assert_eq!(
            value,
            json!({
                "pickup": {"x": 1.0, "y": 2.0},
                "nearestTaxi": null,
                "nearestTaxis": [],
                "roadNetwork": []
            })
        );
    }

    #[test]
    fn query_request_dropoff_is_optional() {
        let request: QueryRequest =
            serde_json::from_str(r#"{"pickup": {"x": 3, "y": 4}}"#).expect("request");
        assert_eq!(request.pickup, Point::new(3.0, 4.0));
        assert!(request.dropoff.is_none());
    }

    #[test]
    fn book_and_start_ride_map_to_relocations() {
        let book = BookRequest {
            pickup: Point::new(1.0, 1.0),
            taxi: Point::new(5.0, 5.0),
        };
        assert_eq!(
            RelocateRequest::from(book),
            RelocateRequest {
                from: Point::new(5.0, 5.0),
                to: Point::new(1.0, 1.0)
            }
        );
        let ride = StartRideRequest {
            dropoff: Point::new(9.0, 0.0),
            taxi: Point::new(1.0, 1.0),
        };
        assert_eq!(RelocateRequest::from(ride).to, Point::new(9.0, 0.0));
    }

    #[test]
    fn error_response_carries_code() {
        let err = DispatchError::TaxiNotFound {
            point: Point::new(0.0, 0.0),
        };
        let value = serde_json::to_value(ErrorResponse::from(&err)).expect("json");
        assert_eq!(
            value,
            json!({"error": "no taxi available at (0, 0)", "code": "taxi_not_found"})
        );
    }
}
