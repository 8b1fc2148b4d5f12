//! Connection manager with Bluetooth-first connection and send fallback

use crate::connection::state::{ConnectionState, LinkState};
use crate::error::{ConnectFailure, FailureReason, SendFailed};
use crate::handshake::{self, HandshakeConfig, HandshakeOutcome};
use crate::peer::PeerIdentity;
use crate::transport::{
    BluetoothConfig, BluetoothConnector, Transport, TransportConnector, TransportKind,
    WifiConnector,
};
use rpi_remote_shared::{defaults, Command, Reply};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};

/// Status notifications emitted by the connection manager
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// A transport came up and is now active
    Connected { transport: TransportKind },
    /// The active transport went away
    Disconnected { reason: String },
    /// Both transports failed during connect
    ConnectionFailed { reason: FailureReason, detail: String },
    /// Bluetooth was unusable, trying WiFi. Carries why Bluetooth failed,
    /// whether or not WiFi then comes up.
    TransportSwitched {
        from: TransportKind,
        to: TransportKind,
        reason: FailureReason,
        detail: String,
    },
    /// Post-connect greeting finished
    HandshakeCompleted { outcome: HandshakeOutcome },
    /// A command left on the given transport
    CommandSent {
        transport: TransportKind,
        command: String,
    },
    /// The peer answered a command
    ReplyReceived(Reply),
    /// No usable transport for a command, reconnecting once
    Reconnecting,
    /// A command was given up on
    SendFailed { command: String, cause: String },
}

/// Configuration for connection manager
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Where the peer lives
    pub peer: PeerIdentity,
    /// Bluetooth strategy settings
    pub bluetooth: BluetoothConfig,
    /// TCP connect timeout
    pub wifi_connect_timeout: Duration,
    /// Greeting exchange timeouts
    pub handshake: HandshakeConfig,
    /// Wait for a reply after a Bluetooth send; `None` skips the read
    pub reply_timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            peer: PeerIdentity::default(),
            bluetooth: BluetoothConfig::default(),
            wifi_connect_timeout: Duration::from_secs(5),
            handshake: HandshakeConfig::default(),
            reply_timeout: Some(Duration::from_secs(1)),
        }
    }
}

/// Receiving end of the manager's status notifications
pub type EventReceiver = mpsc::UnboundedReceiver<ConnectionEvent>;

/// Everything guarded by the manager's mutex
#[derive(Default)]
struct Links {
    state: LinkState,
    bluetooth: Option<Transport>,
    wifi: Option<Transport>,
}

impl Links {
    fn slot(&mut self, kind: TransportKind) -> &mut Option<Transport> {
        match kind {
            TransportKind::Bluetooth => &mut self.bluetooth,
            TransportKind::WiFi => &mut self.wifi,
        }
    }
}

/// Owns the peer transports and decides which one carries each command.
///
/// `connect`, `disconnect` and `send_command` are serialized on one mutex, so
/// a close can never interleave with a write on the same socket.
pub struct ConnectionManager {
    config: ConnectionConfig,
    bluetooth: Box<dyn TransportConnector>,
    wifi: Box<dyn TransportConnector>,
    links: Mutex<Links>,
    /// Sole writer of the observable connection state
    state_tx: watch::Sender<ConnectionState>,
    event_tx: mpsc::UnboundedSender<ConnectionEvent>,
}

impl ConnectionManager {
    /// Create a manager using the real Bluetooth and WiFi connectors
    pub fn new(config: ConnectionConfig) -> (Self, EventReceiver) {
        let bluetooth = BluetoothConnector::new(config.peer.clone(), config.bluetooth.clone());
        let wifi = WifiConnector::new(config.peer.wifi_address(), config.wifi_connect_timeout);
        Self::with_connectors(config, Box::new(bluetooth), Box::new(wifi))
    }

    /// Create a manager over arbitrary connectors
    pub fn with_connectors(
        config: ConnectionConfig,
        bluetooth: Box<dyn TransportConnector>,
        wifi: Box<dyn TransportConnector>,
    ) -> (Self, EventReceiver) {
        let (state_tx, _) = watch::channel(ConnectionState::default());
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let manager = Self {
            config,
            bluetooth,
            wifi,
            links: Mutex::new(Links::default()),
            state_tx,
            event_tx,
        };
        (manager, event_rx)
    }

    /// Current connection signals
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn bluetooth_connected(&self) -> bool {
        self.state().bluetooth_connected
    }

    pub fn wifi_connected(&self) -> bool {
        self.state().wifi_connected
    }

    /// Watch the connection signals change
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// State machine position; waits for any in-flight operation
    pub async fn link_state(&self) -> LinkState {
        self.links.lock().await.state
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Connect over Bluetooth, falling back to WiFi
    pub async fn connect(&self) -> Result<TransportKind, ConnectFailure> {
        let mut links = self.links.lock().await;
        self.connect_locked(&mut links).await
    }

    /// Close every held transport. Never fails; safe to repeat.
    pub async fn disconnect(&self) {
        let mut guard = self.links.lock().await;
        let links = &mut *guard;

        for kind in [TransportKind::Bluetooth, TransportKind::WiFi] {
            if let Some(mut transport) = links.slot(kind).take() {
                transport.close().await;
                debug!("[Conn] Closed {} transport", kind);
            }
        }

        self.set_state(links, LinkState::Disconnected);
        self.emit(ConnectionEvent::Disconnected {
            reason: "disconnect requested".into(),
        });
    }

    /// Send a typed command
    pub async fn send(&self, command: &Command) -> Result<TransportKind, SendFailed> {
        let payload = command.encode();
        self.deliver(&payload, &command.to_string()).await
    }

    /// Send raw command text.
    ///
    /// Tries the active Bluetooth link, then the active WiFi link, then
    /// reconnects once and resends once. The text goes out unframed and
    /// unvalidated.
    pub async fn send_command(&self, text: &str) -> Result<TransportKind, SendFailed> {
        self.deliver(text.as_bytes(), text).await
    }

    async fn deliver(&self, payload: &[u8], text: &str) -> Result<TransportKind, SendFailed> {
        let mut guard = self.links.lock().await;
        let links = &mut *guard;
        debug!("[Conn] Sending {:?} ({} bytes)", text, payload.len());

        for kind in [TransportKind::Bluetooth, TransportKind::WiFi] {
            if links.state.transport() != Some(kind) {
                continue;
            }

            // Whatever is already buffered predates this command and is not its reply
            if kind == TransportKind::Bluetooth {
                if let Some(transport) = links.slot(kind).as_mut() {
                    transport.discard_pending().await;
                }
            }

            let alive = links.slot(kind).as_ref().is_some_and(Transport::is_alive);
            if !alive {
                self.drop_link(links, kind, format!("{} link is no longer alive", kind))
                    .await;
                continue;
            }

            let Some(transport) = links.slot(kind).as_mut() else {
                continue;
            };
            match transport.send(payload).await {
                Ok(()) => {
                    if kind == TransportKind::Bluetooth {
                        self.read_reply(transport).await;
                    }
                    self.sent(kind, text);
                    return Ok(kind);
                }
                Err(e) => {
                    warn!("[Conn] {} send failed: {}", kind, e);
                    self.drop_link(links, kind, format!("{} send failed: {}", kind, e))
                        .await;
                }
            }
        }

        info!("[Conn] No usable transport, reconnecting once");
        self.emit(ConnectionEvent::Reconnecting);

        let kind = match self.connect_locked(links).await {
            Ok(kind) => kind,
            Err(failure) => return Err(self.send_failed(text, failure.to_string())),
        };

        let Some(transport) = links.slot(kind).as_mut() else {
            return Err(self.send_failed(text, format!("{} transport missing after reconnect", kind)));
        };
        match transport.send(payload).await {
            Ok(()) => {
                self.sent(kind, text);
                Ok(kind)
            }
            Err(e) => {
                self.drop_link(links, kind, format!("{} send failed: {}", kind, e))
                    .await;
                Err(self.send_failed(text, format!("resend over {} failed: {}", kind, e)))
            }
        }
    }

    async fn connect_locked(&self, links: &mut Links) -> Result<TransportKind, ConnectFailure> {
        self.release(links, TransportKind::Bluetooth).await;

        let bluetooth_error = match self.bluetooth.connect().await {
            Ok(transport) => {
                self.activate(links, transport).await;
                return Ok(TransportKind::Bluetooth);
            }
            Err(e) => e,
        };

        warn!("[Conn] {} unavailable: {}", self.bluetooth.name(), bluetooth_error);
        self.emit(ConnectionEvent::TransportSwitched {
            from: TransportKind::Bluetooth,
            to: TransportKind::WiFi,
            reason: FailureReason::from_bluetooth(&bluetooth_error),
            detail: bluetooth_error.to_string(),
        });
        self.release(links, TransportKind::WiFi).await;

        match self.wifi.connect().await {
            Ok(transport) => {
                self.activate(links, transport).await;
                Ok(TransportKind::WiFi)
            }
            Err(wifi_error) => {
                let failure = ConnectFailure::new(&bluetooth_error, &wifi_error);
                error!("[Conn] {}", failure);
                self.set_state(links, LinkState::Disconnected);
                self.emit(ConnectionEvent::ConnectionFailed {
                    reason: failure.reason,
                    detail: failure.to_string(),
                });
                Err(failure)
            }
        }
    }

    /// Install a fresh transport as the only active one
    async fn activate(&self, links: &mut Links, transport: Transport) {
        let kind = transport.kind();
        self.release(links, kind.other()).await;
        *links.slot(kind) = Some(transport);
        self.set_state(links, LinkState::connected(kind));
        self.emit(ConnectionEvent::Connected { transport: kind });

        if kind != TransportKind::Bluetooth {
            return;
        }
        if let Some(transport) = links.bluetooth.as_mut() {
            let outcome = handshake::perform(transport, &self.config.handshake).await;
            info!("[Conn] Handshake {}", outcome);
            self.emit(ConnectionEvent::HandshakeCompleted { outcome });
        }
    }

    /// Close a slot's transport quietly before it is replaced
    async fn release(&self, links: &mut Links, kind: TransportKind) {
        if let Some(mut transport) = links.slot(kind).take() {
            debug!("[Conn] Closing previous {} transport", kind);
            transport.close().await;
        }
        if links.state.transport() == Some(kind) {
            self.set_state(links, LinkState::Disconnected);
        }
    }

    /// Close a failed transport and report the loss
    async fn drop_link(&self, links: &mut Links, kind: TransportKind, reason: String) {
        self.release(links, kind).await;
        self.emit(ConnectionEvent::Disconnected { reason });
    }

    async fn read_reply(&self, transport: &mut Transport) {
        let Some(wait) = self.config.reply_timeout else {
            return;
        };

        match transport.receive(defaults::MAX_MESSAGE_LEN, wait).await {
            Ok(bytes) if bytes.is_empty() => debug!("[Conn] No reply within {:?}", wait),
            Ok(bytes) => {
                let reply = Reply::parse(&String::from_utf8_lossy(&bytes));
                info!("[Conn] Peer replied {}", reply);
                self.emit(ConnectionEvent::ReplyReceived(reply));
            }
            Err(e) => debug!("[Conn] Reply read failed: {}", e),
        }
    }

    fn set_state(&self, links: &mut Links, next: LinkState) {
        if links.state != next {
            info!("[Conn] {} -> {}", links.state, next);
            links.state = next;
        }
        self.state_tx.send_if_modified(|signals| {
            let updated = next.signals();
            let changed = *signals != updated;
            *signals = updated;
            changed
        });
    }

    fn sent(&self, kind: TransportKind, text: &str) {
        info!("[Conn] Sent {:?} via {}", text, kind);
        self.emit(ConnectionEvent::CommandSent {
            transport: kind,
            command: text.to_string(),
        });
    }

    fn send_failed(&self, text: &str, cause: String) -> SendFailed {
        error!("[Conn] Giving up on {:?}: {}", text, cause);
        self.emit(ConnectionEvent::SendFailed {
            command: text.to_string(),
            cause: cause.clone(),
        });
        SendFailed {
            command: text.to_string(),
            cause,
        }
    }

    fn emit(&self, event: ConnectionEvent) {
        let _ = self.event_tx.send(event);
    }
}
