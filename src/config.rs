//! Configuration Management
//!
//! Connection settings for the FortiGate: a JSON file in the user config
//! directory, overridden by `FORTIOS_*` environment variables, overridden in
//! turn by CLI flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProviderConfig {
    /// FortiGate address, optionally with a port (`192.0.2.1:8443`)
    #[serde(default)]
    pub hostname: Option<String>,
    /// REST API administrator token
    #[serde(default)]
    pub token: Option<String>,
    /// VDOM used when a resource does not name one
    #[serde(default)]
    pub vdom: Option<String>,
    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: Option<bool>,
    /// PEM bundle used to verify the device certificate
    #[serde(default)]
    pub cabundlefile: Option<PathBuf>,
    /// `https` unless set
    #[serde(default)]
    pub scheme: Option<String>,
}

impl ProviderConfig {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("fortios-provider").join("config.json"))
    }

    /// Load configuration from disk, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring unreadable config {:?}: {:#}", path, e);
                Self::default()
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path().context("No config directory on this platform")?;

        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(path)
    }

    /// Apply `FORTIOS_*` environment overrides
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("FORTIOS_ACCESS_HOSTNAME") {
            self.hostname = Some(v);
        }
        if let Some(v) = get("FORTIOS_ACCESS_TOKEN") {
            self.token = Some(v);
        }
        if let Some(v) = get("FORTIOS_VDOM") {
            self.vdom = Some(v);
        }
        if let Some(v) = get("FORTIOS_INSECURE") {
            self.insecure = Some(matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"));
        }
        if let Some(v) = get("FORTIOS_CA_CABUNDLE") {
            self.cabundlefile = Some(PathBuf::from(v));
        }
        self
    }

    /// `scheme://hostname` of the device
    pub fn base_url(&self) -> Result<String> {
        let hostname = self
            .hostname
            .as_deref()
            .filter(|h| !h.is_empty())
            .context("No FortiGate hostname configured. Set FORTIOS_ACCESS_HOSTNAME or use --hostname")?;
        let scheme = self.scheme.as_deref().unwrap_or("https");
        Ok(format!("{}://{}", scheme, hostname.trim_end_matches('/')))
    }

    pub fn effective_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .context("No API token configured. Set FORTIOS_ACCESS_TOKEN or use --token")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("FORTIOS_ACCESS_HOSTNAME", "192.0.2.10:8443"),
            ("FORTIOS_INSECURE", "TRUE"),
            ("FORTIOS_VDOM", ""),
        ]
        .into_iter()
        .collect();

        let config = ProviderConfig {
            hostname: Some("old".to_string()),
            vdom: Some("root".to_string()),
            ..Default::default()
        }
        .with_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.hostname.as_deref(), Some("192.0.2.10:8443"));
        assert_eq!(config.insecure, Some(true));
        assert_eq!(config.vdom.as_deref(), Some("root"));
    }

    #[test]
    fn test_base_url() {
        let config = ProviderConfig {
            hostname: Some("fgt.example.net/".to_string()),
            ..Default::default()
        };
        assert_eq!(config.base_url().unwrap(), "https://fgt.example.net");

        let config = ProviderConfig {
            hostname: Some("10.0.0.1".to_string()),
            scheme: Some("http".to_string()),
            ..Default::default()
        };
        assert_eq!(config.base_url().unwrap(), "http://10.0.0.1");
    }

    #[test]
    fn test_missing_credentials() {
        let config = ProviderConfig::default();
        assert!(config.base_url().is_err());
        assert!(config.effective_token().is_err());
    }

    #[test]
    fn test_parse_partial_file() {
        let config: ProviderConfig = serde_json::from_str(r#"{"hostname": "fgt", "insecure": true}"#).unwrap();
        assert_eq!(config.hostname.as_deref(), Some("fgt"));
        assert_eq!(config.insecure, Some(true));
        assert!(config.token.is_none());
    }
}
