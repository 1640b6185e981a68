//! Dynamic spatial dispatch: a k-d tree over taxi positions fused with a
//! weighted road network to rank taxis by real travel cost.

pub mod api;
pub mod config;
pub mod contract;
pub mod error;
pub mod fleet;
pub mod matching;
pub mod point;
pub mod relocation;
pub mod routing;
pub mod spatial;
pub mod state;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;

pub use api::Dispatcher;
pub use config::DispatchConfig;
pub use error::DispatchError;
pub use point::Point;
