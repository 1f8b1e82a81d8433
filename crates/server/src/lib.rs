//! Resolve API Server Library
//!
//! Host bootstrap for the Resolve issue tracker web API: layered
//! configuration, logging sinks, CORS, API versioning, OpenAPI documents and
//! the request pipeline. Domain endpoints live in their own crates and plug
//! into the router assembled here.

pub mod config;
pub mod documentation;
pub mod logging;
pub mod reload;
pub mod response;
pub mod routes;
pub mod versioning;

// Re-export for convenience
pub use config::Settings;
pub use routes::{app, AppState};
