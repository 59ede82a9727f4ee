//! [`Radio`] over the ESP-IDF Wi-Fi driver.
//!
//! `EspWifi` is used directly (not `BlockingWifi`): `connect` only starts the
//! join and the controller polls [`Radio::status`] against its own deadline.

use std::net::Ipv4Addr;

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi,
};
use log::{debug, info, warn};
use wifimgr_core::{LinkStatus, Radio, RadioError, RadioMode};

/// Channel of the configuration access point.
pub const ACCESS_POINT_CHANNEL: u8 = 1;

pub struct EspRadio {
    wifi: EspWifi<'static>,
    mode: RadioMode,
    access_point_up: bool,
}

fn radio_err(context: &str, e: impl std::fmt::Display) -> RadioError {
    RadioError(format!("{}: {}", context, e))
}

fn auth_for(password: &str) -> AuthMethod {
    if password.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPA2Personal
    }
}

impl EspRadio {
    pub fn new(
        modem: impl Peripheral<P = Modem> + 'static,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
    ) -> anyhow::Result<Self> {
        let wifi = EspWifi::new(modem, sysloop, nvs)?;
        Ok(Self {
            wifi,
            mode: RadioMode::Client,
            access_point_up: false,
        })
    }

    fn apply(&mut self, configuration: &Configuration) -> Result<(), RadioError> {
        self.wifi
            .set_configuration(configuration)
            .map_err(|e| radio_err("set configuration", e))?;
        let started = self
            .wifi
            .is_started()
            .map_err(|e| radio_err("query driver", e))?;
        if !started {
            self.wifi.start().map_err(|e| radio_err("start driver", e))?;
        }
        Ok(())
    }
}

impl Radio for EspRadio {
    fn set_mode(&mut self, mode: RadioMode) -> Result<(), RadioError> {
        if mode == RadioMode::Client && self.mode == RadioMode::AccessPoint {
            // leaving AP mode drops the access point with it
            self.access_point_up = false;
        }
        self.mode = mode;
        debug!("Radio mode {:?}", mode);
        Ok(())
    }

    fn join(&mut self, ssid: &str, password: &str) -> Result<(), RadioError> {
        let client = ClientConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| RadioError(format!("SSID too long: {}", ssid)))?,
            password: password
                .try_into()
                .map_err(|_| RadioError("password too long".to_string()))?,
            auth_method: auth_for(password),
            ..Default::default()
        };

        self.apply(&Configuration::Client(client))?;
        self.wifi.connect().map_err(|e| radio_err("connect", e))?;
        info!("Join of '{}' started", ssid);
        Ok(())
    }

    fn status(&self) -> LinkStatus {
        let connected = self.wifi.is_connected().unwrap_or(false);
        let netif_up = self.wifi.sta_netif().is_up().unwrap_or(false);
        if connected && netif_up {
            LinkStatus::Joined
        } else {
            LinkStatus::NotJoined
        }
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        self.wifi
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip)
            .filter(|ip| !ip.is_unspecified())
    }

    fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<Ipv4Addr, RadioError> {
        let access_point = AccessPointConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| RadioError(format!("AP SSID too long: {}", ssid)))?,
            password: password
                .try_into()
                .map_err(|_| RadioError("AP password too long".to_string()))?,
            auth_method: auth_for(password),
            channel: ACCESS_POINT_CHANNEL,
            ..Default::default()
        };

        self.apply(&Configuration::AccessPoint(access_point))?;
        self.access_point_up = true;

        let info = self
            .wifi
            .ap_netif()
            .get_ip_info()
            .map_err(|e| radio_err("read AP address", e))?;
        info!("Access point '{}' up at {}", ssid, info.ip);
        Ok(info.ip)
    }

    fn stop_access_point(&mut self) -> Result<(), RadioError> {
        if !self.access_point_up {
            return Ok(());
        }
        self.access_point_up = false;
        if self.mode == RadioMode::AccessPoint {
            if let Err(e) = self.wifi.stop() {
                warn!("Failed to stop access point: {}", e);
                return Err(radio_err("stop driver", e));
            }
        }
        Ok(())
    }

    fn access_point_address(&self) -> Option<Ipv4Addr> {
        if !self.access_point_up {
            return None;
        }
        self.wifi.ap_netif().get_ip_info().ok().map(|info| info.ip)
    }
}
