//! Text commands sent to the Pi
//!
//! Commands travel as raw UTF-8 with no terminator, length prefix or escaping.
//! The peer infers command boundaries from write boundaries:
//! ```text
//! SERVO1:<n> | SERVO2:<n> | OLED:<text> | OLED_CLEAR | PING
//! ```

use bytes::Bytes;
use std::fmt;
use thiserror::Error;

/// Lowest servo angle the peer accepts
pub const SERVO_MIN_ANGLE: i32 = 0;

/// Highest servo angle the peer accepts
pub const SERVO_MAX_ANGLE: i32 = 180;

/// Errors that can occur while parsing a command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Empty command")]
    Empty,

    #[error("Servo {servo} angle is not an integer: {value:?}")]
    BadAngle { servo: u8, value: String },

    #[error("Unknown command: {0}")]
    Unknown(String),
}

/// A single command understood by the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set servo 1 angle. The sender does not range-check.
    Servo1(i32),
    /// Set servo 2 angle. The sender does not range-check.
    Servo2(i32),
    /// Show text on the peer's OLED
    Oled(String),
    /// Clear the peer's OLED
    OledClear,
    /// Liveness probe
    Ping,
}

impl Command {
    /// Encode into the bytes written to the transport
    pub fn encode(&self) -> Bytes {
        Bytes::from(self.to_string())
    }

    /// Parse a received command the way the peer does (surrounding whitespace ignored)
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ProtocolError::Empty);
        }

        if let Some(rest) = text.strip_prefix("SERVO1:") {
            return parse_angle(1, rest).map(Command::Servo1);
        }
        if let Some(rest) = text.strip_prefix("SERVO2:") {
            return parse_angle(2, rest).map(Command::Servo2);
        }
        if let Some(rest) = text.strip_prefix("OLED:") {
            return Ok(Command::Oled(rest.to_string()));
        }

        match text {
            "OLED_CLEAR" => Ok(Command::OledClear),
            "PING" => Ok(Command::Ping),
            other => Err(ProtocolError::Unknown(other.to_string())),
        }
    }

    /// Whether a servo angle lies in the range the peer accepts.
    /// Non-servo commands are always in range.
    pub fn is_in_range(&self) -> bool {
        match self {
            Command::Servo1(angle) | Command::Servo2(angle) => {
                (SERVO_MIN_ANGLE..=SERVO_MAX_ANGLE).contains(angle)
            }
            _ => true,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Servo1(angle) => write!(f, "SERVO1:{}", angle),
            Command::Servo2(angle) => write!(f, "SERVO2:{}", angle),
            Command::Oled(text) => write!(f, "OLED:{}", text),
            Command::OledClear => write!(f, "OLED_CLEAR"),
            Command::Ping => write!(f, "PING"),
        }
    }
}

// Only the first field after the prefix counts: "SERVO1:90:x" is 90.
fn parse_angle(servo: u8, rest: &str) -> Result<i32, ProtocolError> {
    let field = rest.split(':').next().unwrap_or_default();
    field.trim().parse::<i32>().map_err(|_| ProtocolError::BadAngle {
        servo,
        value: field.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_raw_text() {
        assert_eq!(&Command::Servo1(90).encode()[..], b"SERVO1:90");
        assert_eq!(&Command::OledClear.encode()[..], b"OLED_CLEAR");
        assert_eq!(&Command::Oled("Hello RPi!".into()).encode()[..], b"OLED:Hello RPi!");
    }

    #[test]
    fn test_out_of_range_angle_is_encoded_as_is() {
        let cmd = Command::Servo1(200);
        assert!(!cmd.is_in_range());
        assert_eq!(&cmd.encode()[..], b"SERVO1:200");
    }

    #[test]
    fn test_parse_servo() {
        assert_eq!(Command::parse("SERVO2:45"), Ok(Command::Servo2(45)));
        assert_eq!(Command::parse(" SERVO1:180\n"), Ok(Command::Servo1(180)));
        assert_eq!(Command::parse("SERVO1:90:extra"), Ok(Command::Servo1(90)));
    }

    #[test]
    fn test_parse_bad_angle() {
        let result = Command::parse("SERVO1:abc");
        assert!(matches!(result, Err(ProtocolError::BadAngle { servo: 1, .. })));
    }

    #[test]
    fn test_parse_oled_keeps_colons() {
        assert_eq!(
            Command::parse("OLED:12:30 ready"),
            Ok(Command::Oled("12:30 ready".into()))
        );
    }

    #[test]
    fn test_parse_unknown_and_empty() {
        assert_eq!(Command::parse("   "), Err(ProtocolError::Empty));
        assert!(matches!(Command::parse("LED_ON"), Err(ProtocolError::Unknown(_))));
    }
}
