//! Static layout of the durable configuration region.
//!
//! Every persisted value lives in a fixed-offset, fixed-capacity slot. The
//! table below is the on-flash format: changing an offset or a capacity
//! breaks compatibility with devices that already carry a saved region.

use crate::error::SchemaError;

/// Default size of the durable region in bytes.
pub const DEFAULT_REGION_SIZE: usize = 640;

/// Byte value terminating a bounded string. Unused slot bytes hold it too.
pub const TERMINATOR: u8 = 0;

/// How a slot is encoded on the medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Up to `max_length` payload bytes followed by a terminator.
    Text,
    /// A single raw byte.
    Byte,
}

/// One named slot in the durable region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub offset: usize,
    pub max_length: usize,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub const fn text(name: &'static str, offset: usize, max_length: usize) -> Self {
        Self {
            name,
            offset,
            max_length,
            kind: FieldKind::Text,
        }
    }

    pub const fn byte(name: &'static str, offset: usize) -> Self {
        Self {
            name,
            offset,
            max_length: 1,
            kind: FieldKind::Byte,
        }
    }

    /// Number of bytes the slot occupies on the medium.
    pub const fn slot_len(&self) -> usize {
        match self.kind {
            FieldKind::Text => self.max_length + 1,
            FieldKind::Byte => 1,
        }
    }

    /// First byte past the slot.
    pub const fn end(&self) -> usize {
        self.offset + self.slot_len()
    }
}

pub const FORCED_PORTAL: FieldDescriptor = FieldDescriptor::byte("forced_portal", 0);
pub const SSID: FieldDescriptor = FieldDescriptor::text("ssid", 1, 32);
pub const PASSWORD: FieldDescriptor = FieldDescriptor::text("password", 34, 32);
pub const MQTT_ENABLED: FieldDescriptor = FieldDescriptor::text("mqtt_enabled", 67, 1);
pub const MQTT_CLIENT_ID: FieldDescriptor = FieldDescriptor::text("mqtt_client_id", 69, 100);
pub const MQTT_SERVER: FieldDescriptor = FieldDescriptor::text("mqtt_server", 170, 31);
pub const MQTT_PORT: FieldDescriptor = FieldDescriptor::text("mqtt_port", 202, 5);
pub const MQTT_USERNAME: FieldDescriptor = FieldDescriptor::text("mqtt_username", 208, 100);
pub const MQTT_PASSWORD: FieldDescriptor = FieldDescriptor::text("mqtt_password", 309, 256);
pub const UDP_ENABLED: FieldDescriptor = FieldDescriptor::text("udp_enabled", 566, 1);
pub const DEVICE_NAME: FieldDescriptor = FieldDescriptor::text("device_name", 568, 31);
pub const UDP_PORT: FieldDescriptor = FieldDescriptor::text("udp_port", 600, 5);

/// All fields in load order.
pub const FIELDS: [FieldDescriptor; 12] = [
    FORCED_PORTAL,
    SSID,
    PASSWORD,
    MQTT_ENABLED,
    MQTT_CLIENT_ID,
    MQTT_SERVER,
    MQTT_PORT,
    MQTT_USERNAME,
    MQTT_PASSWORD,
    UDP_ENABLED,
    DEVICE_NAME,
    UDP_PORT,
];

/// Check that every descriptor fits in `capacity` bytes and that no two
/// slots share a byte.
pub fn validate(fields: &[FieldDescriptor], capacity: usize) -> Result<(), SchemaError> {
    if fields.is_empty() {
        return Err(SchemaError::Empty);
    }

    for field in fields {
        if field.end() > capacity {
            return Err(SchemaError::OutOfRegion {
                name: field.name,
                end: field.end(),
                capacity,
            });
        }
    }

    let mut sorted: Vec<&FieldDescriptor> = fields.iter().collect();
    sorted.sort_by_key(|f| f.offset);
    for pair in sorted.windows(2) {
        if pair[0].end() > pair[1].offset {
            return Err(SchemaError::Overlap {
                first: pair[0].name,
                second: pair[1].name,
            });
        }
    }

    Ok(())
}

/// Bytes needed to hold the given schema.
pub fn required_size(fields: &[FieldDescriptor]) -> usize {
    fields.iter().map(FieldDescriptor::end).max().unwrap_or(0)
}
