pub mod config;
pub mod models;
pub mod persistence;
pub mod telemetry;
