//! Nearest-taxi ranking: straight-line candidates from the spatial index,
//! reordered by road distance.

pub mod engine;
pub mod types;

pub use engine::DispatchEngine;
pub use types::RankedTaxi;
