//! Host simulator: runs the configuration manager on Linux with a file-backed
//! store, a simulated radio and the real HTTP portal and captive DNS.
//!
//! `--portal` sets the forced-portal flag and restarts, like a device whose
//! "enter configuration mode" button was pressed.

mod config;
mod medium;
mod radio;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wifimgr_core::{Controller, SystemClock};
use wifimgr_dns::CaptiveDns;
use wifimgr_web::AxumPortal;

use config::HostConfig;
use medium::FileMedium;
use radio::SimulatedRadio;

type HostController = Controller<FileMedium, SimulatedRadio, CaptiveDns, AxumPortal, SystemClock>;

#[derive(Parser, Debug)]
#[command(name = "wifimgr")]
#[command(about = "Wi-Fi configuration portal host simulator", long_about = None)]
struct Cli {
    /// JSON host configuration file
    config: Option<PathBuf>,

    /// Set the forced-portal flag and restart into the portal
    #[arg(long)]
    portal: bool,
}

/// Pause between loop iterations.
const LOOP_INTERVAL: Duration = Duration::from_millis(10);

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,wifimgr_core=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = HostConfig::load(cli.config.as_deref())?;
    tracing::info!("wifimgr starting (store: {})", config.storage_path.display());

    // The portal's HTTP server runs here; the controller loop stays on this thread.
    let runtime = Runtime::new()?;

    let mut controller = build(&config, &runtime, FileMedium::new(&config.storage_path))?;

    if cli.portal && controller.request_forced_portal()? {
        tracing::info!("Forced-portal flag set, restarting");
        let medium = controller.into_medium();
        controller = build(&config, &runtime, medium)?;
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        runtime.spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Received Ctrl+C, shutting down..."),
                Err(e) => tracing::error!("Failed to listen for Ctrl+C: {}", e),
            }
            running.store(false, Ordering::SeqCst);
        });
    }

    controller.begin();
    if let Some(addr) = controller.web().local_addr() {
        tracing::info!("Portal: http://{}", addr);
    }
    if let Some(ip) = controller.ip_address() {
        tracing::info!("Device address: {}", ip);
    }

    while running.load(Ordering::SeqCst) {
        controller.tick();
        std::thread::sleep(LOOP_INTERVAL);
    }

    if let Err(e) = controller.commit_now() {
        tracing::error!("Final commit failed: {}", e);
    }
    controller.web_mut().shutdown();
    tracing::info!("Shutdown complete");
    Ok(())
}

fn build(config: &HostConfig, runtime: &Runtime, medium: FileMedium) -> anyhow::Result<HostController> {
    let radio = SimulatedRadio::new(config.known_networks.clone());
    let dns = CaptiveDns::new(config.dns_addr);
    let portal = AxumPortal::new(config.http_addr, runtime.handle().clone());

    let mut controller = Controller::new(
        config.manager.clone(),
        medium,
        radio,
        dns,
        portal,
        SystemClock::new(),
    )?;

    controller.on_connected(|| tracing::info!("Network is up, services may start"));
    controller.on_portal_entered(|| tracing::info!("Waiting for configuration"));
    Ok(controller)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_path_and_portal_flag() {
        let cli = Cli::try_parse_from(["wifimgr", "host.json", "--portal"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("host.json")));
        assert!(cli.portal);

        let cli = Cli::try_parse_from(["wifimgr"]).unwrap();
        assert_eq!(cli.config, None);
        assert!(!cli.portal);
    }

    #[test]
    fn test_misspelled_flag_is_rejected() {
        // must not be taken as a config path
        assert!(Cli::try_parse_from(["wifimgr", "--portl"]).is_err());
        assert!(Cli::try_parse_from(["wifimgr", "a.json", "b.json"]).is_err());
    }
}
