#![allow(dead_code)]

pub mod fleets;
pub mod routes;
