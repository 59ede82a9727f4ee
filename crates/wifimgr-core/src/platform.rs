//! Collaborator traits implemented by each platform.
//!
//! The controller drives hardware and network services only through these
//! traits:
//! - ESP32: `EspWifi`, `EspHttpServer`, NVS (see `wifimgr-esp32`)
//! - Linux: simulated radio, Axum, image file (see `wifimgr-linux`)
//!
//! All methods are synchronous. Implementations that need async I/O run it
//! elsewhere and hand results over through queues.

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use crate::config::DnsPolicy;
use crate::error::{DnsError, PortalError, RadioError};
use crate::portal::{PortalRequest, PortalResponse};

/// Radio operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioMode {
    /// Joined (or joining) an external network.
    Client,
    /// Broadcasting the configuration network.
    AccessPoint,
}

/// Client link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Joined,
    NotJoined,
}

/// Wi-Fi driver.
pub trait Radio {
    fn set_mode(&mut self, mode: RadioMode) -> Result<(), RadioError>;

    /// Start joining `ssid`. Returns once the join is initiated; progress is
    /// observed through [`Radio::status`].
    fn join(&mut self, ssid: &str, password: &str) -> Result<(), RadioError>;

    fn status(&self) -> LinkStatus;

    /// Address leased on the client interface, if any.
    fn local_address(&self) -> Option<Ipv4Addr>;

    /// Bring up the configuration access point and return its address.
    fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<Ipv4Addr, RadioError>;

    fn stop_access_point(&mut self) -> Result<(), RadioError>;

    /// Address of the access point interface while it is up.
    fn access_point_address(&self) -> Option<Ipv4Addr>;
}

/// Captive-portal name resolution.
pub trait DnsResponder {
    /// Start answering queries with `ap_address`. Calling it while running
    /// rebinds to the new address and policy.
    fn start(&mut self, ap_address: Ipv4Addr, policy: &DnsPolicy) -> Result<(), DnsError>;

    fn stop(&mut self);

    /// Answer at most one pending query without blocking.
    fn process_next(&mut self);
}

/// Local web server presenting the configuration portal.
pub trait WebPortal {
    /// Start listening. Must not open a second listener if already serving.
    fn begin(&mut self) -> Result<(), PortalError>;

    fn is_serving(&self) -> bool;

    /// Service at most one pending request without blocking, using
    /// `handler` to produce the response.
    fn handle_client(&mut self, handler: &mut dyn FnMut(PortalRequest) -> PortalResponse);
}

/// Monotonic time source with blocking sleep.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed start (boot).
    fn now(&self) -> Duration;

    fn sleep(&self, duration: Duration);
}

/// [`Clock`] backed by `std::time::Instant` and `std::thread::sleep`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
