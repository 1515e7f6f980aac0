pub mod config;
pub mod error;
pub mod ingest;
pub mod listings;
pub mod store;
pub mod telemetry;
