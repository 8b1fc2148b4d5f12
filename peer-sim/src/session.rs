//! One client connection to the simulated Pi

use crate::device::SimulatedDevice;
use anyhow::Result;
use rpi_remote_shared::reply::codes;
use rpi_remote_shared::{defaults, handshake, Reply};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Serve a client until it goes away.
///
/// Greets, answers a handshake probe if the first message is one, then
/// replies to every read as one command. Returns `Ok` on a clean close.
///
/// Differs from the Pi firmware: there is no deadline on the first message,
/// and a first message that is not a probe is executed as a command instead
/// of being dropped.
pub async fn serve<S>(stream: &mut S, device: &mut SimulatedDevice) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(handshake::GREETING.as_bytes()).await?;
    stream.flush().await?;
    debug!("[Peer] Sent greeting");

    let mut buf = vec![0u8; defaults::MAX_MESSAGE_LEN];
    let mut first = true;

    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            info!("[Peer] Client disconnected");
            return Ok(());
        }

        let reply = match std::str::from_utf8(&buf[..n]) {
            Ok(text) => {
                let text = text.trim();
                if first && handshake::ACCEPTED_PROBES.contains(&text) {
                    first = false;
                    info!("[Peer] Handshake probe {:?}", text);
                    stream.write_all(handshake::CONFIRMATION.as_bytes()).await?;
                    stream.flush().await?;
                    continue;
                }
                first = false;
                debug!("[Peer] Command {:?}", text);
                device.handle(text)
            }
            Err(e) => {
                warn!("[Peer] Undecodable command ({} bytes): {}", n, e);
                Reply::error(codes::DECODE_ERROR)
            }
        };

        debug!("[Peer] Reply {}", reply);
        stream.write_all(reply.to_string().as_bytes()).await?;
        stream.flush().await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::DuplexStream;

    async fn exchange(client: &mut DuplexStream, message: &[u8]) -> String {
        client.write_all(message).await.unwrap();
        read_text(client).await
    }

    async fn read_text(client: &mut DuplexStream) -> String {
        let mut buf = [0u8; 1024];
        let n = client.read(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    #[tokio::test]
    async fn test_handshake_then_commands() {
        let (mut client, mut pi) = tokio::io::duplex(4096);
        let server = tokio::spawn(async move {
            let mut device = SimulatedDevice::new();
            serve(&mut pi, &mut device).await.map(|()| device)
        });

        assert_eq!(read_text(&mut client).await, "WELCOME_RPi");
        assert_eq!(exchange(&mut client, b"PING").await, "HANDSHAKE_OK");
        assert_eq!(exchange(&mut client, b"SERVO1:90").await, "OK:SERVO1:90");
        assert_eq!(exchange(&mut client, b"SERVO2:181").await, "ERROR:INVALID_ANGLE");
        drop(client);

        let device = server.await.unwrap().unwrap();
        assert_eq!(device.servo1, Some(90));
        assert_eq!(device.servo2, None);
    }

    #[tokio::test]
    async fn test_first_message_may_be_a_command() {
        let (mut client, mut pi) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let mut device = SimulatedDevice::new();
            let _ = serve(&mut pi, &mut device).await;
        });

        assert_eq!(read_text(&mut client).await, "WELCOME_RPi");
        assert_eq!(exchange(&mut client, b"OLED_CLEAR").await, "OK:OLED_CLEARED");
        // Probe words after the first message are ordinary commands
        assert_eq!(exchange(&mut client, b"HELLO").await, "ERROR:UNKNOWN_COMMAND");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_reported() {
        let (mut client, mut pi) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let mut device = SimulatedDevice::new();
            let _ = serve(&mut pi, &mut device).await;
        });

        assert_eq!(read_text(&mut client).await, "WELCOME_RPi");
        assert_eq!(exchange(&mut client, b"CONNECT").await, "HANDSHAKE_OK");
        assert_eq!(exchange(&mut client, &[0xff, 0xfe, 0x41]).await, "ERROR:DECODE_ERROR");
        assert_eq!(exchange(&mut client, b"PING").await, "OK:PONG");
    }
}
