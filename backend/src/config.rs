//! Application configuration
//!
//! Centralized configuration management with environment variable support
//! and sensible defaults.

use crate::gateway::GatewaySettings;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Persistence configuration
    pub persistence: PersistenceConfig,
    /// Gateway defaults, used until settings are saved
    pub gateway: GatewayConfig,
    /// Gateway CLI configuration
    pub cli: CliConfig,
    /// Dashboard polling configuration
    pub dashboard: DashboardConfig,
    /// Root of the agent runtime's files
    pub workspace_dir: PathBuf,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host address to bind to
    pub host: String,
}

/// Persistence configuration
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Directory holding the saved gateway settings
    pub data_dir: PathBuf,
}

/// Default gateway endpoint
#[derive(Clone)]
pub struct GatewayConfig {
    /// Endpoint URL
    pub url: String,
    /// Token; empty means none
    pub token: String,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("url", &self.url)
            .field("token_set", &!self.token.is_empty())
            .finish()
    }
}

/// Gateway CLI configuration
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Executable name or path
    pub program: String,
    /// Timeout for each CLI invocation (in seconds)
    pub timeout_secs: u64,
}

/// Dashboard polling configuration
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Seconds between automatic refreshes
    pub refresh_interval_secs: u64,
    /// Seconds after which an agent with no activity counts as idle
    pub idle_threshold_secs: u64,
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn home_dir_join(name: &str) -> PathBuf {
    match env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(name),
        None => PathBuf::from(name),
    }
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                port: env_parsed("PORT", 8080),
                host: env_or("HOST", "0.0.0.0"),
            },
            persistence: PersistenceConfig {
                data_dir: env::var_os("DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| home_dir_join(".agent-dashboard")),
            },
            gateway: GatewayConfig {
                url: env_or("GATEWAY_URL", "ws://127.0.0.1:18789"),
                token: env_or("GATEWAY_TOKEN", ""),
            },
            cli: CliConfig {
                program: env_or("GATEWAY_CLI", "openclaw"),
                timeout_secs: env_parsed("CLI_TIMEOUT_SECS", 10),
            },
            dashboard: DashboardConfig {
                refresh_interval_secs: env_parsed("REFRESH_INTERVAL_SECS", 30),
                idle_threshold_secs: env_parsed("IDLE_THRESHOLD_SECS", 600),
            },
            workspace_dir: env::var_os("WORKSPACE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| home_dir_join(".openclaw")),
        }
    }

    /// Get the server address as a string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Gateway settings to use when none have been saved
    pub fn default_gateway_settings(&self) -> GatewaySettings {
        GatewaySettings::new(self.gateway.url.clone(), Some(&self.gateway.token))
    }

    /// Refresh period of the dashboard poller (never zero)
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.dashboard.refresh_interval_secs.max(1))
    }

    /// Inactivity period after which an agent is shown as idle
    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.dashboard.idle_threshold_secs)
    }

    /// Path of the saved gateway settings file
    pub fn settings_path(&self) -> PathBuf {
        self.persistence.data_dir.join("gateway.json")
    }
}
