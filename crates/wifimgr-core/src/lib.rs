//! # wifimgr-core
//!
//! Configuration persistence and connectivity control for a Wi-Fi device.
//!
//! This crate provides:
//! - A static field schema over a fixed-size durable region
//! - A field store with minimal writes and debounced commits
//! - The typed configuration record
//! - The portal/connected state machine and its main loop
//! - Framework-agnostic portal request handling and the portal pages
//!
//! This crate is intentionally runtime-agnostic and contains no async code
//! or I/O. Radios, web servers, DNS responders and storage media are
//! collaborators supplied through the traits in [`platform`] and [`store`],
//! so the same logic runs on ESP32 (esp-idf) and on a Linux host.

pub mod config;
pub mod controller;
pub mod error;
pub mod page;
pub mod platform;
pub mod portal;
pub mod record;
pub mod schema;
pub mod store;

pub use config::{DnsPolicy, ManagerConfig, NotFoundPolicy};
pub use controller::{ConnectivityState, Controller};
pub use error::{ControllerError, DnsError, PortalError, RadioError, SchemaError, StorageError};
pub use platform::{Clock, DnsResponder, LinkStatus, Radio, RadioMode, SystemClock, WebPortal};
pub use portal::{FormFields, PortalRequest, PortalResponse, PortalView};
pub use record::{ApplyOutcome, ConfigRecord, ConfigUpdate};
pub use store::{FieldStore, MemoryMedium, StorageMedium};
