//! Central application state
//!
//! The coordinator instance is built once at startup and shared by
//! reference; handlers, the sweeper and tests all see the same one.

use crate::config::Config;
use crate::services::streaming::StreamCoordinator;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<StreamCoordinator>,
    pub config: Arc<Config>,
}
