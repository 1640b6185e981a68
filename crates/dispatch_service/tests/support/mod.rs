#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use dispatch_core::fleet::FleetConfig;
use dispatch_core::DispatchConfig;
use dispatch_service::config::ServiceContext;

/// Small seeded fleet so tests stay fast.
pub fn small_config() -> DispatchConfig {
    DispatchConfig::default().with_fleet(FleetConfig {
        size: 12,
        ..FleetConfig::default()
    })
}

pub fn context(fleet_file: Option<PathBuf>) -> Arc<ServiceContext> {
    Arc::new(ServiceContext::from_options(small_config(), fleet_file).expect("context"))
}
