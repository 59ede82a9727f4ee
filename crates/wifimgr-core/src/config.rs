//! Runtime settings for the connectivity manager.
//!
//! These are build- or deploy-time settings, not the persisted
//! [`ConfigRecord`](crate::record::ConfigRecord). Platforms load them the way
//! they load everything else (a JSON file on Linux, constants on ESP32).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::schema::DEFAULT_REGION_SIZE;

/// What the portal answers for paths other than `/` and `/save`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundPolicy {
    /// 302 back to `/`, which makes OS captive-portal probes open the form.
    #[default]
    Redirect,
    /// Plain 404.
    NotFound,
}

/// Which lookups the captive DNS responder answers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DnsPolicy {
    /// Every A query resolves to the access point.
    #[default]
    Wildcard,
    /// Only the portal domain (and its subdomains) resolves; the rest get
    /// NXDOMAIN.
    Domain(String),
}

impl DnsPolicy {
    /// Whether a query for `name` is answered with the access point address.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            DnsPolicy::Wildcard => true,
            DnsPolicy::Domain(domain) => {
                let name = name.trim_end_matches('.');
                let domain = domain.trim_end_matches('.');
                name.eq_ignore_ascii_case(domain)
                    || name
                        .len()
                        .checked_sub(domain.len() + 1)
                        .is_some_and(|split| {
                            name.as_bytes()[split] == b'.'
                                && name[split + 1..].eq_ignore_ascii_case(domain)
                        })
            }
        }
    }
}

/// Connectivity manager settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Name of the configuration access point.
    pub ap_ssid: String,

    /// Password of the configuration access point (8+ chars for WPA2).
    pub ap_password: String,

    /// Domain announced for the portal.
    pub ap_domain: String,

    /// Size of the durable region in bytes.
    pub region_size: usize,

    /// How long one connect attempt may wait for the link, in seconds.
    pub connection_timeout_secs: u64,

    /// Delay between link status polls, in milliseconds.
    pub poll_interval_ms: u64,

    /// Quiet time before staged writes are committed, in milliseconds.
    pub commit_interval_ms: u64,

    pub not_found: NotFoundPolicy,

    pub dns: DnsPolicy,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            ap_ssid: "ESP32_Config".to_string(),
            ap_password: "12345678".to_string(),
            ap_domain: "wifi.config".to_string(),
            region_size: DEFAULT_REGION_SIZE,
            connection_timeout_secs: 20,
            poll_interval_ms: 1000,
            commit_interval_ms: 5000,
            not_found: NotFoundPolicy::Redirect,
            dns: DnsPolicy::Wildcard,
        }
    }
}

impl ManagerConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn commit_interval(&self) -> Duration {
        Duration::from_millis(self.commit_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.connection_timeout(), Duration::from_secs(20));
        assert_eq!(config.commit_interval(), Duration::from_secs(5));
        assert_eq!(config.not_found, NotFoundPolicy::Redirect);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ManagerConfig = serde_json::from_str(
            r#"{ "ap_ssid": "Lab_Setup", "not_found": "not_found", "dns": { "domain": "setup.lan" } }"#,
        )
        .unwrap();
        assert_eq!(config.ap_ssid, "Lab_Setup");
        assert_eq!(config.not_found, NotFoundPolicy::NotFound);
        assert_eq!(config.dns, DnsPolicy::Domain("setup.lan".to_string()));
        assert_eq!(config.connection_timeout_secs, 20);
    }

    #[test]
    fn test_dns_policy_matching() {
        assert!(DnsPolicy::Wildcard.matches("connectivitycheck.gstatic.com"));

        let policy = DnsPolicy::Domain("setup.lan".to_string());
        assert!(policy.matches("setup.lan"));
        assert!(policy.matches("SETUP.lan."));
        assert!(policy.matches("www.setup.lan"));
        assert!(!policy.matches("evilsetup.lan"));
        assert!(!policy.matches("example.com"));
        assert!(!policy.matches("lan"));
    }
}
