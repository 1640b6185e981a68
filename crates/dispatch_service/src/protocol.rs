//! Line protocol: one JSON request in, one JSON response out.
//!
//! Requests are tagged by `"command"`:
//!
//! ```json
//! {"command": "query", "pickup": {"x": 1, "y": 2}, "dropoff": {"x": 9, "y": 9}}
//! {"command": "book", "pickup": {"x": 1, "y": 2}, "taxi": {"x": 4, "y": 4}}
//! ```
//!
//! Failures come back as `{"error": "...", "code": "..."}`.

use dispatch_core::contract::{
    BookRequest, ErrorResponse, QueryRequest, RelocateRequest, StartRideRequest,
};
use dispatch_core::DispatchError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ServiceContext;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Request {
    Health,
    Query(QueryRequest),
    Relocate(RelocateRequest),
    Book(BookRequest),
    StartRide(StartRideRequest),
    Metrics,
}

impl Request {
    fn name(&self) -> &'static str {
        match self {
            Request::Health => "health",
            Request::Query(_) => "query",
            Request::Relocate(_) => "relocate",
            Request::Book(_) => "book",
            Request::StartRide(_) => "start_ride",
            Request::Metrics => "metrics",
        }
    }
}

/// Run one request against the shared fleet. Successful moves are persisted.
pub fn handle_request(ctx: &ServiceContext, request: Request) -> Result<Value, DispatchError> {
    let dispatcher = ctx.dispatcher();
    let value = match request {
        Request::Health => to_value(&dispatcher.health()?)?,
        Request::Metrics => to_value(&dispatcher.metrics()?)?,
        Request::Query(query) => to_value(&dispatcher.query(query)?)?,
        Request::Relocate(relocate) => {
            let moved = dispatcher.relocate(relocate)?;
            ctx.persist();
            to_value(&moved)?
        }
        Request::Book(book) => {
            let moved = dispatcher.book(book)?;
            ctx.persist();
            to_value(&moved)?
        }
        Request::StartRide(ride) => {
            let moved = dispatcher.start_ride(ride)?;
            ctx.persist();
            to_value(&moved)?
        }
    };
    Ok(value)
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, DispatchError> {
    serde_json::to_value(value)
        .map_err(|err| DispatchError::InvalidInput(format!("unserialisable response: {err}")))
}

/// Parse, run and serialise one protocol line.
pub fn handle_line(ctx: &ServiceContext, line: &str) -> String {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            debug!(%err, "rejecting malformed request");
            return error_line(&ErrorResponse {
                error: format!("malformed request: {err}"),
                code: "invalid_input".to_string(),
            });
        }
    };
    let command = request.name();
    match handle_request(ctx, request) {
        Ok(value) => value.to_string(),
        Err(err) => {
            if matches!(err, DispatchError::LockPoisoned(_)) {
                warn!(command, %err, "request failed on shared state");
            } else {
                debug!(command, %err, "request failed");
            }
            error_line(&ErrorResponse::from(&err))
        }
    }
}

/// Response for a handler that never returned.
pub fn internal_error_line() -> String {
    error_line(&ErrorResponse {
        error: "request handler failed".to_string(),
        code: "internal".to_string(),
    })
}

fn error_line(response: &ErrorResponse) -> String {
    serde_json::to_string(response)
        .unwrap_or_else(|_| r#"{"error":"unserialisable error","code":"internal"}"#.to_string())
}
