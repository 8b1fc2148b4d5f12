use anyhow::Result;
use bluer::Uuid;
use clap::Parser;
use rpi_remote::{
    BluetoothConfig, Command, ConnectionConfig, ConnectionEvent, ConnectionManager,
    EventReceiver, PeerIdentity,
};
use rpi_remote_shared::defaults;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Remote control for a Raspberry Pi over Bluetooth or WiFi
#[derive(Parser, Debug)]
#[command(name = "rpi-remote")]
#[command(about = "Send servo and display commands to a Raspberry Pi")]
struct Cli {
    /// Bluetooth name the Pi was paired under
    #[arg(long, default_value = defaults::PEER_NAME)]
    name: String,

    /// WiFi host name or IP of the Pi
    #[arg(long, default_value = "raspberrypi.local")]
    host: String,

    /// WiFi TCP port
    #[arg(long, default_value_t = defaults::WIFI_PORT)]
    port: u16,

    /// Service UUID for profile connections
    #[arg(long, default_value = defaults::SERVICE_UUID)]
    uuid: Uuid,

    /// RFCOMM channel for direct channel connections
    #[arg(long, default_value_t = defaults::RFCOMM_CHANNEL)]
    channel: u8,

    /// Per-strategy Bluetooth connect timeout in milliseconds
    #[arg(long, default_value_t = 10_000)]
    attempt_timeout_ms: u64,

    /// WiFi connect timeout in milliseconds
    #[arg(long, default_value_t = 5_000)]
    wifi_timeout_ms: u64,

    /// Connect once at startup
    #[arg(long)]
    connect: bool,
}

impl Cli {
    fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            peer: PeerIdentity {
                bluetooth_name: self.name.clone(),
                host: self.host.clone(),
                port: self.port,
                service_uuid: self.uuid,
            },
            bluetooth: BluetoothConfig {
                channel: self.channel,
                attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
            },
            wifi_connect_timeout: Duration::from_millis(self.wifi_timeout_ms),
            ..Default::default()
        }
    }
}

/// One line typed by the operator
#[derive(Debug, PartialEq, Eq)]
enum Action {
    Connect,
    Disconnect,
    Status,
    Send(String),
    Help,
    Quit,
}

fn parse_action(line: &str) -> Option<Action> {
    let line = line.trim();
    let (word, rest) = match line.split_once(' ') {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let action = match word.to_ascii_lowercase().as_str() {
        "" => return None,
        "connect" => Action::Connect,
        "disconnect" => Action::Disconnect,
        "status" => Action::Status,
        "help" | "?" => Action::Help,
        "quit" | "exit" => Action::Quit,
        // Angles go out as typed; the Pi does the range check.
        "servo1" => Action::Send(format!("SERVO1:{}", rest)),
        "servo2" => Action::Send(format!("SERVO2:{}", rest)),
        "oled" => Action::Send(Command::Oled(rest.to_string()).to_string()),
        "clear" => Action::Send(Command::OledClear.to_string()),
        "ping" => Action::Send(Command::Ping.to_string()),
        "raw" => Action::Send(rest.to_string()),
        _ => Action::Send(line.to_string()),
    };
    Some(action)
}

const HELP: &str = "commands: connect | disconnect | status | servo1 <0-180> | servo2 <0-180> | \
                    oled <text> | clear | ping | raw <text> | quit";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    let config = cli.connection_config();

    let (manager, events) = ConnectionManager::new(config);
    let manager = Arc::new(manager);

    let peer = &manager.config().peer;
    info!("Remote starting");
    info!("  Bluetooth peer: {}", peer.bluetooth_name);
    info!("  WiFi peer: {}", peer.wifi_address());

    tokio::spawn(log_events(events));
    tokio::spawn(log_state(manager.subscribe()));

    if cli.connect {
        spawn_connect(manager.clone());
    }

    info!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(action) = parse_action(&line) else {
            continue;
        };
        debug!("Operator: {:?}", action);

        // Manager calls run detached so the prompt never blocks on a connect.
        match action {
            Action::Connect => spawn_connect(manager.clone()),
            Action::Disconnect => {
                let manager = manager.clone();
                tokio::spawn(async move { manager.disconnect().await });
            }
            Action::Status => {
                let state = manager.state();
                info!(
                    "Bluetooth connected: {}, WiFi connected: {}",
                    state.bluetooth_connected, state.wifi_connected
                );
            }
            Action::Send(text) => {
                let manager = manager.clone();
                tokio::spawn(async move {
                    if let Err(e) = manager.send_command(&text).await {
                        error!("{}", e);
                    }
                });
            }
            Action::Help => info!("{}", HELP),
            Action::Quit => break,
        }
    }

    manager.disconnect().await;
    info!("Remote stopped");
    Ok(())
}

fn spawn_connect(manager: Arc<ConnectionManager>) {
    tokio::spawn(async move {
        match manager.connect().await {
            Ok(kind) => info!("Ready via {}", kind),
            Err(e) => error!("{}", e),
        }
    });
}

async fn log_events(mut events: EventReceiver) {
    while let Some(event) = events.recv().await {
        match event {
            ConnectionEvent::Connected { transport } => {
                info!("Connected via {}", transport);
            }
            ConnectionEvent::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
            }
            ConnectionEvent::ConnectionFailed { reason, detail } => {
                error!("Connection failed [{}]: {}", reason.code(), detail);
            }
            ConnectionEvent::TransportSwitched {
                from,
                to,
                reason,
                detail,
            } => {
                warn!("{} unusable [{}]: {}", from, reason.code(), detail);
                info!("Transport switched: {} -> {}", from, to);
            }
            ConnectionEvent::HandshakeCompleted { outcome } => {
                info!("Handshake {}", outcome);
            }
            ConnectionEvent::CommandSent { transport, command } => {
                info!("Sent {:?} via {}", command, transport);
            }
            ConnectionEvent::ReplyReceived(reply) => {
                if reply.is_ok() {
                    info!("Pi: {}", reply);
                } else {
                    warn!("Pi: {}", reply);
                }
            }
            ConnectionEvent::Reconnecting => {
                info!("Reconnecting");
            }
            ConnectionEvent::SendFailed { command, cause } => {
                error!("Send of {:?} failed: {}", command, cause);
            }
        }
    }
    debug!("Event channel closed");
}

async fn log_state(mut state: watch::Receiver<rpi_remote::ConnectionState>) {
    while state.changed().await.is_ok() {
        let current = *state.borrow_and_update();
        info!(
            "State: bluetooth={} wifi={}",
            current.bluetooth_connected, current.wifi_connected
        );
    }
}
