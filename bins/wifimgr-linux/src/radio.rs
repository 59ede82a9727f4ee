//! Simulated Wi-Fi radio for running the controller on a host.
//!
//! A join succeeds when the ssid and password match one of the configured
//! known networks; anything else never leaves `NotJoined`, which exercises the
//! connect timeout.

use std::net::Ipv4Addr;

use tracing::{debug, info};
use wifimgr_core::{LinkStatus, Radio, RadioError, RadioMode};

use crate::config::KnownNetwork;

pub const ACCESS_POINT_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);
pub const CLIENT_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 50);

#[derive(Debug)]
pub struct SimulatedRadio {
    known_networks: Vec<KnownNetwork>,
    mode: Option<RadioMode>,
    joined: Option<String>,
    access_point: Option<String>,
}

impl SimulatedRadio {
    pub fn new(known_networks: Vec<KnownNetwork>) -> Self {
        Self {
            known_networks,
            mode: None,
            joined: None,
            access_point: None,
        }
    }

    pub fn mode(&self) -> Option<RadioMode> {
        self.mode
    }

    /// Name of the access point being broadcast.
    pub fn access_point(&self) -> Option<&str> {
        self.access_point.as_deref()
    }
}

impl Radio for SimulatedRadio {
    fn set_mode(&mut self, mode: RadioMode) -> Result<(), RadioError> {
        if mode == RadioMode::AccessPoint {
            self.joined = None;
        }
        self.mode = Some(mode);
        debug!("Radio mode {:?}", mode);
        Ok(())
    }

    fn join(&mut self, ssid: &str, password: &str) -> Result<(), RadioError> {
        if self.mode != Some(RadioMode::Client) {
            return Err(RadioError("radio is not in client mode".to_string()));
        }
        let in_range = self
            .known_networks
            .iter()
            .any(|n| n.ssid == ssid && n.password == password);
        self.joined = in_range.then(|| ssid.to_string());
        info!("Simulated join of '{}' ({})", ssid, if in_range { "in range" } else { "no answer" });
        Ok(())
    }

    fn status(&self) -> LinkStatus {
        if self.joined.is_some() {
            LinkStatus::Joined
        } else {
            LinkStatus::NotJoined
        }
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        self.joined.as_ref().map(|_| CLIENT_ADDRESS)
    }

    fn start_access_point(&mut self, ssid: &str, _password: &str) -> Result<Ipv4Addr, RadioError> {
        self.access_point = Some(ssid.to_string());
        info!("Simulated access point '{}' at {}", ssid, ACCESS_POINT_ADDRESS);
        Ok(ACCESS_POINT_ADDRESS)
    }

    fn stop_access_point(&mut self) -> Result<(), RadioError> {
        self.access_point = None;
        Ok(())
    }

    fn access_point_address(&self) -> Option<Ipv4Addr> {
        self.access_point.as_ref().map(|_| ACCESS_POINT_ADDRESS)
    }
}
