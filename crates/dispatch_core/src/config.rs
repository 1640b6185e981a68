//! Engine configuration: ETA speed, candidate over-fetch, display clipping and
//! the nested index/network settings.
//!
//! Every struct is `#[serde(default)]`, so a JSON config file only needs the
//! fields it overrides.

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::fleet::FleetConfig;
use crate::routing::{EdgePolicy, NetworkConfig};
use crate::spatial::IndexConfig;

/// Default travel speed: two minutes per distance unit.
pub const DEFAULT_SPEED_UNITS_PER_MINUTE: f64 = 0.5;

/// Number of ranked taxis returned to the rider.
pub const DEFAULT_DESIRED_COUNT: usize = 5;

/// Fleets at or below this size are fetched in full before road ranking.
pub const DEFAULT_SMALL_FLEET_THRESHOLD: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Distance units travelled per minute; `estimatedTime = distance / speed`.
    pub speed_units_per_minute: f64,
    /// Ranked taxis returned per query.
    pub desired_count: usize,
    /// Straight-line candidates fetched per desired taxi on large fleets.
    pub oversample_factor: usize,
    /// Fleets up to this size are ranked exhaustively.
    pub small_fleet_threshold: usize,
    /// Minimum padding around the trip when clipping the returned road network.
    pub display_margin: f64,
    pub index: IndexConfig,
    pub network: NetworkConfig,
    pub fleet: FleetConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            speed_units_per_minute: DEFAULT_SPEED_UNITS_PER_MINUTE,
            desired_count: DEFAULT_DESIRED_COUNT,
            oversample_factor: 2,
            small_fleet_threshold: DEFAULT_SMALL_FLEET_THRESHOLD,
            display_margin: 15.0,
            index: IndexConfig::default(),
            network: NetworkConfig::default(),
            fleet: FleetConfig::default(),
        }
    }
}

impl DispatchConfig {
    pub fn with_speed(mut self, units_per_minute: f64) -> Self {
        self.speed_units_per_minute = units_per_minute;
        self
    }

    pub fn with_desired_count(mut self, count: usize) -> Self {
        self.desired_count = count;
        self
    }

    pub fn with_oversample(mut self, factor: usize, small_fleet_threshold: usize) -> Self {
        self.oversample_factor = factor;
        self.small_fleet_threshold = small_fleet_threshold;
        self
    }

    pub fn with_edge_policy(mut self, policy: EdgePolicy) -> Self {
        self.network.policy = policy;
        self
    }

    pub fn with_network_seed(mut self, seed: u64) -> Self {
        self.network.seed = seed;
        self
    }

    pub fn with_detour_jitter(mut self, jitter: f64) -> Self {
        self.network.detour_jitter = jitter;
        self
    }

    /// `None` keeps the tree exactly as insert/delete leave it.
    pub fn with_rebuild_height_factor(mut self, factor: Option<f64>) -> Self {
        self.index.rebuild_height_factor = factor;
        self
    }

    pub fn with_fleet(mut self, fleet: FleetConfig) -> Self {
        self.fleet = fleet;
        self
    }

    /// Reject settings that would make ETAs or ranking meaningless.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if !(self.speed_units_per_minute.is_finite() && self.speed_units_per_minute > 0.0) {
            return Err(DispatchError::InvalidInput(format!(
                "speed_units_per_minute must be a positive finite number, got {}",
                self.speed_units_per_minute
            )));
        }
        if self.desired_count == 0 {
            return Err(DispatchError::InvalidInput(
                "desired_count must be at least 1".to_string(),
            ));
        }
        if self.oversample_factor == 0 {
            return Err(DispatchError::InvalidInput(
                "oversample_factor must be at least 1".to_string(),
            ));
        }
        if !(self.display_margin.is_finite() && self.display_margin >= 0.0) {
            return Err(DispatchError::InvalidInput(
                "display_margin must be a non-negative finite number".to_string(),
            ));
        }
        self.index.validate()?;
        self.network.validate()?;
        self.fleet.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        DispatchConfig::default().validate().expect("default config");
    }

    #[test]
    fn rejects_zero_speed() {
        let config = DispatchConfig::default().with_speed(0.0);
        assert!(matches!(
            config.validate(),
            Err(DispatchError::InvalidInput(_))
        ));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: DispatchConfig =
            serde_json::from_str(r#"{"desired_count": 3, "network": {"seed": 9}}"#)
                .expect("config json");
        assert_eq!(config.desired_count, 3);
        assert_eq!(config.network.seed, 9);
        assert_eq!(config.speed_units_per_minute, DEFAULT_SPEED_UNITS_PER_MINUTE);
        assert_eq!(config.network.policy, EdgePolicy::default());
    }
}
