//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use coursegen_core::pipeline::GenerationServices;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all
/// handlers. The service bundle is the same one every spawned generation
/// job runs over; all clients behind it are stateless and reusable.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub services: Arc<GenerationServices>,
}
