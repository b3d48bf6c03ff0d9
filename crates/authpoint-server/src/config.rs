use authpoint_auth::{AuthConfig, RegisteredClient};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Authorization endpoint configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Pending approval snapshots
    #[serde(default)]
    pub snapshots: SnapshotConfig,
    /// Issued authorization codes
    #[serde(default)]
    pub codes: CodeConfig,
    /// Client registrations served from memory
    #[serde(default)]
    pub clients: Vec<RegisteredClient>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Snapshot validations
        if self.snapshots.max_age_secs == 0 {
            return Err("snapshots.max_age_secs must be > 0".into());
        }
        if self.snapshots.cleanup_interval_secs == 0 {
            return Err("snapshots.cleanup_interval_secs must be > 0".into());
        }
        if self.codes.max_age_secs == 0 {
            return Err("codes.max_age_secs must be > 0".into());
        }
        self.auth.validate().map_err(|e| format!("auth: {e}"))?;
        // Client registrations
        let mut seen = HashSet::new();
        for client in &self.clients {
            client
                .validate()
                .map_err(|e| format!("clients[{}]: {e}", client.client_id))?;
            if !seen.insert(client.client_id.as_str()) {
                return Err(format!("duplicate client_id: {}", client.client_id));
            }
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        let ip = self
            .server
            .host
            .parse()
            .unwrap_or(std::net::IpAddr::from([0, 0, 0, 0]));
        SocketAddr::new(ip, self.server.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// How long an approval page stays answerable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}
fn default_max_age_secs() -> u64 {
    600
}
fn default_cleanup_interval_secs() -> u64 {
    60
}
impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_age_secs: default_max_age_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

/// How long an issued authorization code stays redeemable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeConfig {
    #[serde(default = "default_code_max_age_secs")]
    pub max_age_secs: u64,
}
fn default_code_max_age_secs() -> u64 {
    300
}
impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            max_age_secs: default_code_max_age_secs(),
        }
    }
}

/// Converts configured seconds, saturating on overflow.
pub(crate) fn seconds(secs: u64) -> time::Duration {
    time::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or("authpoint.toml"));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., AUTHPOINT__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("AUTHPOINT")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
