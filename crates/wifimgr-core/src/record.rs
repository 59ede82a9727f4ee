//! Typed view of the persisted configuration.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StorageError;
use crate::schema::{self, FieldDescriptor};
use crate::store::{truncate_to_capacity, FieldStore, StorageMedium};

const FLAG_ON: &str = "1";
const FLAG_OFF: &str = "0";

/// All persisted configuration values.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRecord {
    /// Enter the portal on next boot regardless of stored credentials.
    pub forced_portal: bool,
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

impl fmt::Debug for ConfigRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigRecord")
            .field("forced_portal", &self.forced_portal)
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .field("mqtt_enabled", &self.mqtt_enabled)
            .field("mqtt_server", &self.mqtt_server)
            .field("mqtt_port", &self.mqtt_port)
            .field("mqtt_username", &self.mqtt_username)
            .field("mqtt_password", &"<redacted>")
            .field("mqtt_client_id", &self.mqtt_client_id)
            .field("udp_enabled", &self.udp_enabled)
            .field("udp_port", &self.udp_port)
            .field("device_name", &self.device_name)
            .finish()
    }
}

/// A partial change to the record. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub ssid: Option<String>,
    pub password: Option<String>,
    pub mqtt_enabled: Option<bool>,
    pub mqtt_server: Option<String>,
    pub mqtt_port: Option<String>,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_client_id: Option<String>,
    pub udp_enabled: Option<bool>,
    pub udp_port: Option<String>,
    pub device_name: Option<String>,
}

impl ConfigUpdate {
    /// Update carrying only Wi-Fi credentials.
    pub fn credentials(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: Some(ssid.into()),
            password: Some(password.into()),
            ..Default::default()
        }
    }

    /// Update that forgets the stored network.
    pub fn cleared_credentials() -> Self {
        Self::credentials("", "")
    }
}

/// What an [`ConfigRecord::apply_and_persist`] call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// At least one field differed and was staged.
    pub changed: bool,
    /// The ssid or password differed.
    pub credentials_changed: bool,
}

impl ConfigRecord {
    /// Read every field from the store in schema order.
    pub fn load<M: StorageMedium>(store: &FieldStore<M>) -> Self {
        Self {
            forced_portal: store.read_byte(&schema::FORCED_PORTAL) == 1,
            ssid: store.read(&schema::SSID),
            password: store.read(&schema::PASSWORD),
            mqtt_enabled: decode_flag(&store.read(&schema::MQTT_ENABLED)),
            mqtt_client_id: store.read(&schema::MQTT_CLIENT_ID),
            mqtt_server: store.read(&schema::MQTT_SERVER),
            mqtt_port: store.read(&schema::MQTT_PORT),
            mqtt_username: store.read(&schema::MQTT_USERNAME),
            mqtt_password: store.read(&schema::MQTT_PASSWORD),
            udp_enabled: decode_flag(&store.read(&schema::UDP_ENABLED)),
            device_name: store.read(&schema::DEVICE_NAME),
            udp_port: store.read(&schema::UDP_PORT),
        }
    }

    /// A target network is on record.
    pub fn has_credentials(&self) -> bool {
        !self.ssid.is_empty()
    }

    pub fn mqtt_port_number(&self) -> Option<u16> {
        self.mqtt_port.trim().parse().ok()
    }

    pub fn udp_port_number(&self) -> Option<u16> {
        self.udp_port.trim().parse().ok()
    }

    /// Merge `update` into the record, staging every field that differs.
    ///
    /// Values longer than their slot are stored truncated, and the in-memory
    /// copy is truncated the same way so it matches what a reboot would load.
    /// Nothing is committed here.
    pub fn apply_and_persist<M: StorageMedium>(
        &mut self,
        update: &ConfigUpdate,
        store: &mut FieldStore<M>,
    ) -> Result<ApplyOutcome, StorageError> {
        let ssid = apply_text(&mut self.ssid, update.ssid.as_deref(), &schema::SSID, store)?;
        let password = apply_text(
            &mut self.password,
            update.password.as_deref(),
            &schema::PASSWORD,
            store,
        )?;

        let mut changed = ssid | password;
        changed |= apply_flag(
            &mut self.mqtt_enabled,
            update.mqtt_enabled,
            &schema::MQTT_ENABLED,
            store,
        )?;
        changed |= apply_text(
            &mut self.mqtt_server,
            update.mqtt_server.as_deref(),
            &schema::MQTT_SERVER,
            store,
        )?;
        changed |= apply_text(
            &mut self.mqtt_port,
            update.mqtt_port.as_deref(),
            &schema::MQTT_PORT,
            store,
        )?;
        changed |= apply_text(
            &mut self.mqtt_username,
            update.mqtt_username.as_deref(),
            &schema::MQTT_USERNAME,
            store,
        )?;
        changed |= apply_text(
            &mut self.mqtt_password,
            update.mqtt_password.as_deref(),
            &schema::MQTT_PASSWORD,
            store,
        )?;
        changed |= apply_text(
            &mut self.mqtt_client_id,
            update.mqtt_client_id.as_deref(),
            &schema::MQTT_CLIENT_ID,
            store,
        )?;
        changed |= apply_flag(
            &mut self.udp_enabled,
            update.udp_enabled,
            &schema::UDP_ENABLED,
            store,
        )?;
        changed |= apply_text(
            &mut self.udp_port,
            update.udp_port.as_deref(),
            &schema::UDP_PORT,
            store,
        )?;
        changed |= apply_text(
            &mut self.device_name,
            update.device_name.as_deref(),
            &schema::DEVICE_NAME,
            store,
        )?;

        Ok(ApplyOutcome {
            changed,
            credentials_changed: ssid || password,
        })
    }
}

fn decode_flag(raw: &str) -> bool {
    raw == FLAG_ON
}

fn encode_flag(value: bool) -> &'static str {
    if value {
        FLAG_ON
    } else {
        FLAG_OFF
    }
}

fn apply_text<M: StorageMedium>(
    current: &mut String,
    incoming: Option<&str>,
    field: &FieldDescriptor,
    store: &mut FieldStore<M>,
) -> Result<bool, StorageError> {
    let Some(incoming) = incoming else {
        return Ok(false);
    };
    let bounded = truncate_to_capacity(incoming, field.max_length);
    if bounded == current.as_str() {
        return Ok(false);
    }
    store.write(field, incoming)?;
    debug!("Field '{}' updated", field.name);
    *current = bounded.to_string();
    Ok(true)
}

fn apply_flag<M: StorageMedium>(
    current: &mut bool,
    incoming: Option<bool>,
    field: &FieldDescriptor,
    store: &mut FieldStore<M>,
) -> Result<bool, StorageError> {
    match incoming {
        Some(value) if value != *current => {
            store.write(field, encode_flag(value))?;
            debug!("Field '{}' set to {}", field.name, value);
            *current = value;
            Ok(true)
        }
        _ => Ok(false),
    }
}
