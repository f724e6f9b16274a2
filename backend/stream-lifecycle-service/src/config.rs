use crate::services::streaming::{
    DEFAULT_HEARTBEAT_TIMEOUT_SECS, DEFAULT_MAX_ACTIVE_STREAMS_PER_OWNER,
    DEFAULT_SWEEP_PERIOD_SECS,
};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub limits: LimitsConfig,
    pub sweeper: SweeperConfig,
    pub integrations: IntegrationsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_env")]
    pub env: String,

    #[serde(default = "default_app_host")]
    pub host: String,

    #[serde(default = "default_app_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_active_streams")]
    pub max_active_streams_per_owner: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    #[serde(default = "default_sweep_period_secs")]
    pub period_secs: u64,

    #[serde(default = "default_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: i64,
}

/// Optional downstream endpoints. When unset, the service falls back to
/// logging implementations so local runs need no collaborators.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntegrationsConfig {
    pub delivery_base_url: Option<String>,
    pub notification_webhook_url: Option<String>,
}

// Default value functions
fn default_app_env() -> String {
    "development".to_string()
}

fn default_app_host() -> String {
    "0.0.0.0".to_string()
}

fn default_app_port() -> u16 {
    8086
}

fn default_max_active_streams() -> u32 {
    DEFAULT_MAX_ACTIVE_STREAMS_PER_OWNER
}

fn default_sweep_period_secs() -> u64 {
    DEFAULT_SWEEP_PERIOD_SECS
}

fn default_heartbeat_timeout_secs() -> i64 {
    DEFAULT_HEARTBEAT_TIMEOUT_SECS
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let app = AppConfig {
            env: env::var("APP_ENV").unwrap_or_else(|_| default_app_env()),
            host: env::var("APP_HOST").unwrap_or_else(|_| default_app_host()),
            port: env::var("APP_PORT")
                .unwrap_or_else(|_| default_app_port().to_string())
                .parse()
                .unwrap_or(default_app_port()),
        };

        let limits = LimitsConfig {
            max_active_streams_per_owner: env::var("MAX_ACTIVE_STREAMS_PER_OWNER")
                .unwrap_or_else(|_| default_max_active_streams().to_string())
                .parse()
                .unwrap_or(default_max_active_streams()),
        };

        let sweeper = SweeperConfig {
            period_secs: env::var("SWEEP_PERIOD_SECS")
                .unwrap_or_else(|_| default_sweep_period_secs().to_string())
                .parse()
                .unwrap_or(default_sweep_period_secs()),
            heartbeat_timeout_secs: env::var("HEARTBEAT_TIMEOUT_SECS")
                .unwrap_or_else(|_| default_heartbeat_timeout_secs().to_string())
                .parse()
                .unwrap_or(default_heartbeat_timeout_secs()),
        };

        let integrations = IntegrationsConfig {
            delivery_base_url: env::var("DELIVERY_BASE_URL").ok(),
            notification_webhook_url: env::var("NOTIFICATION_WEBHOOK_URL").ok(),
        };

        Config {
            app,
            limits,
            sweeper,
            integrations,
        }
    }

    pub fn is_production(&self) -> bool {
        self.app.env == "production"
    }
}
