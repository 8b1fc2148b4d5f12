//! Simulated Raspberry Pi peer
//!
//! Speaks the Pi side of the remote-control protocol over TCP so the WiFi
//! path and the greeting exchange can be tried without hardware.

mod device;
mod session;

use clap::Parser;
use device::SimulatedDevice;
use rpi_remote_shared::defaults;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "peer-sim")]
#[command(about = "Simulated Raspberry Pi answering remote-control commands")]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// TCP port to listen on
    #[arg(long, default_value_t = defaults::WIFI_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    let listener = TcpListener::bind((cli.host.as_str(), cli.port)).await?;
    info!("[Peer] Listening on {}", listener.local_addr()?);

    // Like the Pi, one client at a time; the device state outlives connections.
    let mut device = SimulatedDevice::new();
    loop {
        let (mut socket, addr) = listener.accept().await?;
        info!("[Peer] Connection from {}", addr);

        if let Err(e) = socket.set_nodelay(true) {
            warn!("[Peer] Could not disable Nagle for {}: {}", addr, e);
        }
        if let Err(e) = session::serve(&mut socket, &mut device).await {
            warn!("[Peer] Session with {} ended: {}", addr, e);
        }
        info!("[Peer] Device {}", device.summary());
        info!("[Peer] Waiting for the next connection");
    }
}
