//! Host configuration, read from a JSON file.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use wifimgr_core::ManagerConfig;

/// A network the simulated radio can join.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownNetwork {
    pub ssid: String,
    pub password: String,
}

impl std::fmt::Debug for KnownNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnownNetwork")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub manager: ManagerConfig,

    /// Where the portal's HTTP server listens.
    pub http_addr: SocketAddr,

    /// Where the captive DNS responder listens. Port 53 needs privileges.
    pub dns_addr: SocketAddr,

    /// Image file standing in for the device's durable region.
    pub storage_path: PathBuf,

    /// Networks in range of the simulated radio.
    pub known_networks: Vec<KnownNetwork>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            manager: ManagerConfig::default(),
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            dns_addr: SocketAddr::from(([0, 0, 0, 0], 5353)),
            storage_path: PathBuf::from("wifimgr.bin"),
            known_networks: Vec::new(),
        }
    }
}

impl HostConfig {
    /// Load from `path`, or use the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wifimgr_core::NotFoundPolicy;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: HostConfig = serde_json::from_str(
            r#"{
                "http_addr": "127.0.0.1:9000",
                "manager": { "ap_ssid": "Garden_Setup", "not_found": "not_found" },
                "known_networks": [{ "ssid": "home", "password": "secret" }]
            }"#,
        )
        .unwrap();

        assert_eq!(config.http_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.dns_addr, HostConfig::default().dns_addr);
        assert_eq!(config.manager.ap_ssid, "Garden_Setup");
        assert_eq!(config.manager.not_found, NotFoundPolicy::NotFound);
        assert_eq!(config.manager.region_size, 640);
        assert_eq!(config.known_networks.len(), 1);
    }

    #[test]
    fn test_load_without_file() {
        assert_eq!(HostConfig::load(None).unwrap(), HostConfig::default());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = HostConfig::load(Some(Path::new("/nonexistent/wifimgr.json"))).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn test_network_password_not_in_debug() {
        let network = KnownNetwork {
            ssid: "home".to_string(),
            password: "secret".to_string(),
        };
        assert!(!format!("{:?}", network).contains("secret"));
    }
}
