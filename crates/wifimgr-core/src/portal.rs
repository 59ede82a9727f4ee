//! Portal intake: the framework-agnostic side of the configuration portal.
//!
//! Web servers translate HTTP requests into [`PortalRequest`] values and
//! render the returned [`PortalResponse`], typically with [`crate::page`].
//! Parsing of form bodies stays in the web layer; deciding what a submission
//! means stays here.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::NotFoundPolicy;
use crate::error::SubmissionError;
use crate::record::{ConfigRecord, ConfigUpdate};

/// Body text for a `/save` request lacking ssid or password.
pub const MISSING_PARAMETERS: &str = "Missing required parameters";

/// Decoded form fields of a `/save` submission.
pub type FormFields = HashMap<String, String>;

/// Form field names used by the portal page.
pub mod fields {
    pub const SSID: &str = "ssid";
    pub const PASSWORD: &str = "password";
    pub const ENABLE_MQTT: &str = "enableMQTT";
    pub const MQTT_SERVER: &str = "mqttServer";
    pub const MQTT_PORT: &str = "mqttPort";
    pub const MQTT_USERNAME: &str = "mqttUsername";
    pub const MQTT_PASSWORD: &str = "mqttPassword";
    pub const MQTT_CLIENT_ID: &str = "mqttClientID";
    pub const ENABLE_UDP: &str = "enableUDP";
    pub const UDP_PORT: &str = "udpPort";
    pub const DEVICE_NAME: &str = "deviceName";
}

/// A request routed to the portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalRequest {
    /// `GET /`
    Root,
    /// `POST /save`
    Save(FormFields),
    /// Any other path.
    Other { path: String },
}

/// What the web layer should send back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalResponse {
    /// Render the configuration form with these values.
    Form(PortalView),
    /// Render the "configuration saved" page.
    Saved,
    /// Plain-text response with a status code.
    Text { status: u16, body: String },
    /// 302 to `location`.
    Redirect { location: String },
}

impl PortalResponse {
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        PortalResponse::Text {
            status,
            body: body.into(),
        }
    }

    /// Response for paths the portal does not serve.
    pub fn not_found(policy: NotFoundPolicy) -> Self {
        match policy {
            NotFoundPolicy::Redirect => PortalResponse::Redirect {
                location: "/".to_string(),
            },
            NotFoundPolicy::NotFound => PortalResponse::text(404, "Not found"),
        }
    }
}

/// Current values shown in the portal form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PortalView {
    pub ssid: String,
    pub password: String,
    pub mqtt_enabled: bool,
    pub mqtt_server: String,
    pub mqtt_port: String,
    pub mqtt_username: String,
    pub mqtt_password: String,
    pub mqtt_client_id: String,
    pub udp_enabled: bool,
    pub udp_port: String,
    pub device_name: String,
}

impl From<&ConfigRecord> for PortalView {
    fn from(record: &ConfigRecord) -> Self {
        Self {
            ssid: record.ssid.clone(),
            password: record.password.clone(),
            mqtt_enabled: record.mqtt_enabled,
            mqtt_server: record.mqtt_server.clone(),
            mqtt_port: record.mqtt_port.clone(),
            mqtt_username: record.mqtt_username.clone(),
            mqtt_password: record.mqtt_password.clone(),
            mqtt_client_id: record.mqtt_client_id.clone(),
            udp_enabled: record.udp_enabled,
            udp_port: record.udp_port.clone(),
            device_name: record.device_name.clone(),
        }
    }
}

/// Turn a `/save` form into a record update.
///
/// `ssid` and `password` are required. A service checkbox is "on" when its
/// field is present at all; the service's parameters are only taken when it
/// is on, and absent ones count as empty.
pub fn parse_submission(form: &FormFields) -> Result<ConfigUpdate, SubmissionError> {
    let ssid = form
        .get(fields::SSID)
        .ok_or(SubmissionError::MissingField(fields::SSID))?;
    let password = form
        .get(fields::PASSWORD)
        .ok_or(SubmissionError::MissingField(fields::PASSWORD))?;

    let arg = |name: &str| Some(form.get(name).cloned().unwrap_or_default());

    let mut update = ConfigUpdate::credentials(ssid.as_str(), password.as_str());

    let mqtt_enabled = form.contains_key(fields::ENABLE_MQTT);
    update.mqtt_enabled = Some(mqtt_enabled);
    if mqtt_enabled {
        update.mqtt_server = arg(fields::MQTT_SERVER);
        update.mqtt_port = arg(fields::MQTT_PORT);
        update.mqtt_username = arg(fields::MQTT_USERNAME);
        update.mqtt_password = arg(fields::MQTT_PASSWORD);
        update.mqtt_client_id = arg(fields::MQTT_CLIENT_ID);
    }

    let udp_enabled = form.contains_key(fields::ENABLE_UDP);
    update.udp_enabled = Some(udp_enabled);
    if udp_enabled {
        update.udp_port = arg(fields::UDP_PORT);
        update.device_name = arg(fields::DEVICE_NAME);
    }

    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn form(pairs: &[(&str, &str)]) -> FormFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_minimal_submission() {
        let update = parse_submission(&form(&[("ssid", "net"), ("password", "pw")])).unwrap();
        assert_eq!(
            update,
            ConfigUpdate {
                mqtt_enabled: Some(false),
                udp_enabled: Some(false),
                ..ConfigUpdate::credentials("net", "pw")
            }
        );
    }

    #[test]
    fn test_missing_password() {
        assert_eq!(
            parse_submission(&form(&[("ssid", "net")])),
            Err(SubmissionError::MissingField("password"))
        );
    }

    #[test]
    fn test_missing_ssid() {
        assert_eq!(
            parse_submission(&form(&[("password", "pw")])),
            Err(SubmissionError::MissingField("ssid"))
        );
    }

    #[test]
    fn test_enabled_service_reads_parameters() {
        let update = parse_submission(&form(&[
            ("ssid", "net"),
            ("password", "pw"),
            ("enableMQTT", "on"),
            ("mqttServer", "broker.local"),
            ("mqttPort", "1883"),
        ]))
        .unwrap();
        assert_eq!(update.mqtt_enabled, Some(true));
        assert_eq!(update.mqtt_server.as_deref(), Some("broker.local"));
        assert_eq!(update.mqtt_port.as_deref(), Some("1883"));
        // absent parameters of an enabled service are cleared
        assert_eq!(update.mqtt_username.as_deref(), Some(""));
        assert_eq!(update.udp_port, None);
    }

    #[test]
    fn test_disabled_service_ignores_parameters() {
        let update = parse_submission(&form(&[
            ("ssid", "net"),
            ("password", "pw"),
            ("udpPort", "4210"),
            ("deviceName", "shed"),
        ]))
        .unwrap();
        assert_eq!(update.udp_enabled, Some(false));
        assert_eq!(update.udp_port, None);
        assert_eq!(update.device_name, None);
    }

    #[test]
    fn test_not_found_policies() {
        assert_eq!(
            PortalResponse::not_found(NotFoundPolicy::Redirect),
            PortalResponse::Redirect {
                location: "/".to_string()
            }
        );
        assert_eq!(
            PortalResponse::not_found(NotFoundPolicy::NotFound),
            PortalResponse::text(404, "Not found")
        );
    }
}
