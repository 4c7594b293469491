//! FabReader entry point.
//!
//! Loads settings, builds the compiled-in network backend, starts the link
//! supervisor and the card console, then runs the reader loop until Ctrl-C.

#[cfg(all(feature = "ethernet", feature = "wifi"))]
compile_error!("features `ethernet` and `wifi` are mutually exclusive");

#[cfg(not(any(feature = "ethernet", feature = "wifi")))]
compile_error!("enable one link backend feature: `ethernet` or `wifi`");

mod console;
mod settings;

use clap::Parser;
use fabreader_hardware::AnySecureElement;
use fabreader_hardware::mock::MockSecureElement;
use fabreader_network::{AnyNetworkLink, LinkSupervisor, MockLink, WsSession};
use fabreader_reader::ReaderOrchestrator;
use settings::Settings;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "ethernet")]
use fabreader_network::EthernetLink;
#[cfg(feature = "wifi")]
use fabreader_network::WifiLink;

/// Networked access-control card reader.
#[derive(Debug, Parser)]
#[command(name = "fabreader", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "FABREADER_CONFIG")]
    config: Option<PathBuf>,

    /// Server host, overriding the configuration file.
    #[arg(long)]
    host: Option<String>,

    /// Server port, overriding the configuration file.
    #[arg(long)]
    port: Option<u16>,

    /// Network interface of the link backend.
    #[arg(long)]
    interface: Option<String>,

    /// Log filter used when `RUST_LOG` is unset, e.g. `debug` or
    /// `fabreader_reader=trace`.
    #[arg(long)]
    log_level: Option<String>,

    /// Use the in-memory link instead of the compiled-in backend.
    #[arg(long)]
    mock_link: bool,
}

impl Cli {
    /// Load the configuration file and apply command line overrides.
    fn into_settings(self) -> anyhow::Result<Settings> {
        let mut settings = Settings::load(self.config.as_deref())?;

        if let Some(host) = self.host {
            settings.reader.target.host = host;
        }
        if let Some(port) = self.port {
            settings.reader.target.port = port;
        }
        if let Some(interface) = self.interface {
            settings.link.interface = interface;
        }
        if self.log_level.is_some() {
            settings.log_level = self.log_level;
        }
        settings.mock_link |= self.mock_link;

        settings.finish();
        settings.reader.validate()?;
        Ok(settings)
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_link(settings: &Settings) -> AnyNetworkLink {
    if settings.mock_link {
        let (link, _handle) = MockLink::new();
        return AnyNetworkLink::Mock(link);
    }

    #[cfg(feature = "ethernet")]
    let link = AnyNetworkLink::Ethernet(EthernetLink::new(settings.link.clone()));
    #[cfg(feature = "wifi")]
    let link = AnyNetworkLink::Wifi(WifiLink::new(settings.link.clone(), settings.wifi.clone()));

    link
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Cli::parse().into_settings()?;
    init_tracing(settings.log_level.as_deref());

    info!(
        version = fabreader_core::VERSION,
        server = %settings.reader.target,
        "FabReader starting"
    );

    let link = build_link(&settings);
    info!(backend = link.kind(), interface = %settings.link.interface, "Network backend selected");
    let supervisor = LinkSupervisor::spawn(link.clone(), settings.reader.link_health_poll);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, shutting down");
                signal.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let (element, card_console) = MockSecureElement::new();
    let console = console::spawn(card_console, shutdown.clone());
    info!("Card console ready: present <hex> [unsupported] | remove | fault | restore");

    let mut reader = ReaderOrchestrator::new(
        settings.reader,
        AnySecureElement::Mock(element),
        link,
        supervisor.health(),
        WsSession::new(),
    )?;
    reader.run(shutdown.clone()).await;

    shutdown.cancel();
    if let Err(e) = console.await {
        error!("Card console task failed: {}", e);
    }
    supervisor.shutdown().await;

    info!("FabReader stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["fabreader"]);
        assert!(cli.config.is_none());
        assert!(!cli.mock_link);

        let settings = cli.into_settings().unwrap();
        assert_eq!(settings.reader.target.port, 3000);
        assert_eq!(
            settings.link.route_target,
            Some((settings.reader.target.host.clone(), 3000))
        );
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "fabreader",
            "--host",
            "fablab.local",
            "--port",
            "8080",
            "--interface",
            "wlan0",
            "--log-level",
            "debug",
            "--mock-link",
        ]);
        let settings = cli.into_settings().unwrap();

        assert_eq!(settings.reader.target.url(), "ws://fablab.local:8080/api/fab-reader/ws");
        assert_eq!(settings.link.interface, "wlan0");
        assert_eq!(settings.log_level.as_deref(), Some("debug"));
        assert!(settings.mock_link);
        assert_eq!(build_link(&settings).kind(), "mock");
    }

    #[test]
    fn test_cli_rejects_empty_host() {
        let cli = Cli::parse_from(["fabreader", "--host", ""]);
        assert!(cli.into_settings().is_err());
    }

    #[test]
    fn test_compiled_backend() {
        let settings = Settings::default();
        let kind = build_link(&settings).kind();
        assert!(kind == "ethernet" || kind == "wifi");
    }
}
