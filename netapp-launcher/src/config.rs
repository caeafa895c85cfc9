use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use anyhow::{Context, Result};
use shared::protocol::{DEFAULT_ICON_SIZE, NET_APP_SERVICE_TYPE};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/netapp-launcher/launcher.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub launcher: LauncherConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_service_types")]
    pub service_types: Vec<String>,
    /// Restrict mDNS to one interface; all interfaces when unset
    pub interface: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_icon_size")]
    pub icon_size: String,
    /// Per-request timeout; requests may block indefinitely when unset
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LauncherConfig {
    /// Replaces the platform URL opener (xdg-open, open, start)
    pub command: Option<String>,
    #[serde(default = "default_hide_on_launch")]
    pub hide_on_launch: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_service_types() -> Vec<String> {
    vec![NET_APP_SERVICE_TYPE.to_string()]
}

fn default_icon_size() -> String {
    DEFAULT_ICON_SIZE.to_string()
}

fn default_hide_on_launch() -> bool {
    true
}

fn default_listen() -> String {
    "127.0.0.1:8054".to_string()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            service_types: default_service_types(),
            interface: None,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            icon_size: default_icon_size(),
            timeout_secs: None,
        }
    }
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            command: None,
            hide_on_launch: default_hide_on_launch(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl ResolverConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Like `load`, but a missing file yields the built-in defaults.
    /// Used for the default path only; an explicit path must exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        if config.discovery.service_types.is_empty() {
            anyhow::bail!("discovery.service_types must not be empty");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.discovery.service_types, vec!["_http._tcp.local.".to_string()]);
        assert_eq!(config.discovery.interface, None);
        assert_eq!(config.resolver.icon_size, "64");
        assert_eq!(config.resolver.timeout(), None);
        assert!(config.launcher.hide_on_launch);
        assert_eq!(config.api.listen, "127.0.0.1:8054");
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
            [discovery]
            service_types = ["_http._tcp.local.", "_https._tcp.local."]
            interface = "eth0"

            [resolver]
            icon_size = "128"
            timeout_secs = 5

            [launcher]
            command = "firefox"
            hide_on_launch = false

            [api]
            listen = "127.0.0.1:9000"
            "#,
        )
        .unwrap();

        assert_eq!(config.discovery.service_types.len(), 2);
        assert_eq!(config.discovery.interface.as_deref(), Some("eth0"));
        assert_eq!(config.resolver.icon_size, "128");
        assert_eq!(config.resolver.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.launcher.command.as_deref(), Some("firefox"));
        assert!(!config.launcher.hide_on_launch);
        assert_eq!(config.api.listen, "127.0.0.1:9000");
    }

    #[test]
    fn test_rejects_empty_service_types() {
        let result = Config::parse("[discovery]\nservice_types = []\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file() {
        let missing = std::env::temp_dir().join("netapp-launcher-does-not-exist.toml");
        assert!(Config::load(&missing).is_err());
        let config = Config::load_or_default(&missing).unwrap();
        assert_eq!(config.resolver.icon_size, "64");
    }
}
