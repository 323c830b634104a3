//! Simulated IoT device fleet: device state, command processing and
//! command history on top of a key-value store.

pub mod command;
pub mod config;
pub mod errors;
pub mod fleet;
pub mod history;
pub mod kv;
pub mod metrics;
pub mod model;
pub mod profile;
pub mod rest;
pub mod service;
pub mod simulator;
pub mod store;
