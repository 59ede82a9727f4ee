//! wifimgr firmware for ESP32.
//!
//! This binary requires the ESP32 Rust toolchain.
//! It will not compile with the standard Rust toolchain.
//!
//! Holding the BOOT button (GPIO0) during power-up sets the forced-portal
//! flag and restarts into the configuration portal.

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{PinDriver, Pull};
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::hal::reset;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::info;
use wifimgr_core::{Controller, ManagerConfig, SystemClock};
use wifimgr_dns::CaptiveDns;
use wifimgr_esp32::nvs::NvsMedium;
use wifimgr_esp32::portal::EspPortal;
use wifimgr_esp32::radio::EspRadio;

/// NVS namespace of the configuration region.
const NVS_NAMESPACE: &str = "wifimgr";

/// Pause between loop iterations; lets the idle task feed the watchdog.
const LOOP_DELAY_MS: u32 = 10;

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("wifimgr starting");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let mut boot_button = PinDriver::input(peripherals.pins.gpio0)?;
    boot_button.set_pull(Pull::Up)?;

    let medium = NvsMedium::new(nvs.clone(), NVS_NAMESPACE)?;
    let radio = EspRadio::new(peripherals.modem, sysloop, Some(nvs))?;

    let mut controller = Controller::new(
        ManagerConfig::default(),
        medium,
        radio,
        CaptiveDns::default(),
        EspPortal::new(),
        SystemClock::new(),
    )?;

    if boot_button.is_low() && controller.request_forced_portal()? {
        info!("BOOT held, restarting into configuration portal");
        reset::restart();
    }
    drop(boot_button);

    controller.on_connected(|| info!("Network is up"));
    controller.on_portal_entered(|| info!("Join the configuration network to set up Wi-Fi"));

    controller.begin();
    if let Some(ip) = controller.ip_address() {
        info!("Device address: {}", ip);
    }

    loop {
        controller.tick();
        FreeRtos::delay_ms(LOOP_DELAY_MS);
    }
}
