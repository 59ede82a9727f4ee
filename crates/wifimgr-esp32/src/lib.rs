//! ESP32-specific collaborators for the configuration manager.
//!
//! This crate provides the ESP-IDF side of the `wifimgr-core` traits:
//! - [`nvs::NvsMedium`]: the durable region kept as one NVS blob
//! - [`radio::EspRadio`]: station and access point control over `EspWifi`
//! - [`portal::EspPortal`]: the portal pages served by `EspHttpServer`
//!
//! Captive DNS comes from `wifimgr-dns`, which only needs `std::net`.
//!
//! # Example
//!
//! ```ignore
//! let medium = NvsMedium::new(nvs_partition, "wifimgr")?;
//! let radio = EspRadio::new(peripherals.modem, sysloop, None)?;
//! let mut controller = Controller::new(
//!     ManagerConfig::default(),
//!     medium,
//!     radio,
//!     CaptiveDns::default(),
//!     EspPortal::new(),
//!     SystemClock::new(),
//! )?;
//! controller.begin();
//! ```

pub mod nvs;
pub mod portal;
pub mod radio;
