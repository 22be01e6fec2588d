//! HTTP reporting server.

pub mod routes;

pub use routes::{ApiState, api_routes, cors_layer};

use std::sync::Arc;

use axum::Router;

use crate::error::ConfigError;
use crate::store::RegistrationStore;

/// Reporting router with CORS applied.
pub fn router(store: Arc<dyn RegistrationStore>, cors_origin: &str) -> Result<Router, ConfigError> {
    Ok(api_routes(ApiState { store }).layer(cors_layer(cors_origin)?))
}
