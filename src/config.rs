//! Run configuration
//!
//! CLI flags override values from an optional config.toml, which overrides
//! built-in defaults. Everything is resolved once at startup into an
//! immutable `Options` that the rest of the run only reads.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Fully-resolved run configuration.
#[derive(Debug, Clone)]
pub struct Options {
    /// Gateway address on the bench LAN
    pub address: String,
    pub username: String,
    pub password: String,
    /// Update the ssh settings and reboot even if already compliant
    pub force: bool,
    /// Dry run: probe and report, mutate nothing
    pub noop: bool,
    /// Assume the admin credentials are already set
    pub skip_password: bool,
    /// Expected product type (e.g. `mtcdt`); run aborts on mismatch
    pub product_type: Option<String>,
    /// Expected full product id (e.g. `mtcdt-l4n1-247a`); run aborts on mismatch
    pub product_id: Option<String>,
    /// Image path; `{product_type}` is replaced with the discovered type
    pub image_pattern: String,
    /// Budget for the gateway to come back after a reboot
    pub reboot_time: Duration,
    pub ssh_port: u16,
    pub http: HttpConfig,
    pub log_level: String,
}

/// Root of the optional config.toml.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Defaults for the gateway being commissioned.
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_username")]
    pub username: String,

    /// Image path pattern; `{product_type}` substituted at phase 5
    #[serde(default = "default_image_pattern")]
    pub image: String,

    /// Reboot budget in seconds
    #[serde(default = "default_reboot_time")]
    pub reboot_time: u64,

    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            username: default_username(),
            image: default_image_pattern(),
            reboot_time: default_reboot_time(),
            ssh_port: default_ssh_port(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level when RUST_LOG and the verbosity flags are absent
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_address() -> String {
    "192.168.2.1".to_string()
}

fn default_username() -> String {
    "mtadm".to_string()
}

fn default_image_pattern() -> String {
    "/tmp/ttni-base-image-{product_type}-upgrade.bin".to_string()
}

fn default_reboot_time() -> u64 {
    5 * 60
}

fn default_ssh_port() -> u16 {
    22
}

fn default_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl FileConfig {
    /// Load configuration from `path` if given, else from the first
    /// candidate location that exists, else defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        if let Some(path) = path {
            return Self::read(&PathBuf::from(path));
        }

        let config_paths = vec![
            PathBuf::from("config.toml"),
            PathBuf::from("/etc/conduit-commission/config.toml"),
            dirs::home_dir()
                .map(|h| h.join(".config/conduit-commission/config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.exists() {
                return Self::read(path);
            }
        }

        tracing::debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    fn read(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: FileConfig = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_bench_setup() {
        let cfg = FileConfig::default();
        assert_eq!(cfg.gateway.address, "192.168.2.1");
        assert_eq!(cfg.gateway.username, "mtadm");
        assert_eq!(cfg.gateway.reboot_time, 300);
        assert_eq!(cfg.gateway.ssh_port, 22);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let cfg: FileConfig = toml::from_str(
            r#"
            [gateway]
            address = "10.0.0.9"
            reboot_time = 120
            "#,
        )
        .unwrap();
        assert_eq!(cfg.gateway.address, "10.0.0.9");
        assert_eq!(cfg.gateway.reboot_time, 120);
        assert_eq!(cfg.gateway.username, "mtadm");
        assert_eq!(cfg.http.timeout, 10);
    }
}
