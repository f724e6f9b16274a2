pub mod app_state;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod services;

pub use app_state::AppState;
pub use config::Config;
pub use error::{AppError, Result};
