pub mod bluetooth;
pub mod link;
pub mod paired;
pub mod rfcomm;
pub mod tcp;
pub mod traits;

pub use bluetooth::{
    default_strategies, try_strategies, BluetoothConfig, BluetoothConnector, ChannelStrategy,
    ConnectStrategy, ProfileStrategy,
};
pub use link::{Transport, TransportKind};
pub use paired::{select_peer, PairedDevice};
pub use rfcomm::{RfcommTransportStream, DEFAULT_RFCOMM_CHANNEL};
pub use tcp::{TcpTransportStream, WifiConnector};
pub use traits::{TransportConnector, TransportStream};
