use thiserror::Error;

use crate::point::Point;

/// Errors surfaced by the dispatch core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// No taxi sits exactly at the requested point.
    #[error("no taxi available at {point}")]
    TaxiNotFound { point: Point },
    /// The road network has no path between the two points.
    #[error("no road route from {from} to {to}")]
    Unreachable { from: Point, to: Point },
    /// Malformed caller input (non-finite coordinates, bad weights, bad config).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A writer panicked while holding a fleet lock.
    #[error("fleet state lock poisoned while {0}")]
    LockPoisoned(&'static str),
}

impl DispatchError {
    /// Stable machine-readable code used in wire responses.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::TaxiNotFound { .. } => "taxi_not_found",
            DispatchError::Unreachable { .. } => "unreachable",
            DispatchError::InvalidInput(_) => "invalid_input",
            DispatchError::LockPoisoned(_) => "internal",
        }
    }
}
