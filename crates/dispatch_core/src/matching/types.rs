use serde::{Deserialize, Serialize};

use crate::point::Point;

/// A taxi ranked by road distance to the pickup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedTaxi {
    pub location: Point,
    /// 1-based position in the ranking.
    pub rank: usize,
    pub euclidean_distance: f64,
    pub graph_distance: f64,
    /// Minutes.
    pub estimated_time: f64,
    /// Road path from the taxi to the pickup.
    pub path: Vec<Point>,
}
