//! Long-lived dispatch service: one shared fleet, newline-delimited JSON over
//! TCP or stdio.

pub mod config;
pub mod protocol;
pub mod server;
