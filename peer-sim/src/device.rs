//! Servo and display state of the simulated Pi

use rpi_remote_shared::reply::codes;
use rpi_remote_shared::{Command, ProtocolError, Reply};
use tracing::{debug, info};

/// What the Pi would be showing and pointing at
#[derive(Debug, Default)]
pub struct SimulatedDevice {
    pub servo1: Option<i32>,
    pub servo2: Option<i32>,
    /// `None` when the display is blank
    pub display: Option<String>,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-line status for logs
    pub fn summary(&self) -> String {
        format!(
            "servo1={:?} servo2={:?} display={:?}",
            self.servo1, self.servo2, self.display
        )
    }

    /// Execute one command and produce the reply the Pi sends back
    pub fn handle(&mut self, text: &str) -> Reply {
        let text = text.trim();

        // Session words the Pi answers outside the command set
        match text {
            "CONNECT" => return Reply::ok("CONNECTED"),
            "DISCONNECT" => return Reply::ok("DISCONNECTED"),
            _ => {}
        }

        let command = match Command::parse(text) {
            Ok(command) => command,
            Err(ProtocolError::BadAngle { servo, value }) => {
                debug!("[Peer] Servo {} angle {:?} is not a number", servo, value);
                let code = if servo == 1 {
                    codes::SERVO1_PARSE_ERROR
                } else {
                    codes::SERVO2_PARSE_ERROR
                };
                return Reply::error(code);
            }
            Err(e) => {
                debug!("[Peer] {}", e);
                return Reply::error(codes::UNKNOWN_COMMAND);
            }
        };

        if !command.is_in_range() {
            return Reply::error(codes::INVALID_ANGLE);
        }

        match command {
            Command::Servo1(angle) => {
                self.servo1 = Some(angle);
                info!("[Peer] Servo 1 -> {}", angle);
                Reply::ok(format!("SERVO1:{}", angle))
            }
            Command::Servo2(angle) => {
                self.servo2 = Some(angle);
                info!("[Peer] Servo 2 -> {}", angle);
                Reply::ok(format!("SERVO2:{}", angle))
            }
            Command::Oled(text) => {
                info!("[Peer] Display {:?}", text);
                self.display = Some(text);
                Reply::ok("OLED_DISPLAY")
            }
            Command::OledClear => {
                info!("[Peer] Display cleared");
                self.display = None;
                Reply::ok("OLED_CLEARED")
            }
            // The Pi firmware answers ERROR:UNKNOWN_COMMAND here
            Command::Ping => Reply::ok("PONG"),
        }
    }
}
