//! Replies the peer sends back after each command
//!
//! ```text
//! OK:<detail>      e.g. OK:SERVO1:90, OK:OLED_CLEARED
//! ERROR:<code>     e.g. ERROR:INVALID_ANGLE
//! ```

use std::fmt;

/// Error codes the peer reports
pub mod codes {
    pub const INVALID_ANGLE: &str = "INVALID_ANGLE";
    pub const SERVO1_PARSE_ERROR: &str = "SERVO1_PARSE_ERROR";
    pub const SERVO2_PARSE_ERROR: &str = "SERVO2_PARSE_ERROR";
    pub const UNKNOWN_COMMAND: &str = "UNKNOWN_COMMAND";
    pub const DECODE_ERROR: &str = "DECODE_ERROR";
}

/// A peer reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Command accepted
    Ok(String),
    /// Command rejected with an error code
    Error(String),
    /// Anything not following the OK/ERROR grammar (a late greeting, for one)
    Other(String),
}

impl Reply {
    /// Parse a reply, ignoring surrounding whitespace
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Some(detail) = text.strip_prefix("OK:") {
            Reply::Ok(detail.to_string())
        } else if let Some(code) = text.strip_prefix("ERROR:") {
            Reply::Error(code.to_string())
        } else {
            Reply::Other(text.to_string())
        }
    }

    pub fn ok(detail: impl Into<String>) -> Self {
        Reply::Ok(detail.into())
    }

    pub fn error(code: impl Into<String>) -> Self {
        Reply::Error(code.into())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Ok(_))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ok(detail) => write!(f, "OK:{}", detail),
            Reply::Error(code) => write!(f, "ERROR:{}", code),
            Reply::Other(text) => write!(f, "{}", text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ok() {
        let reply = Reply::parse("OK:SERVO1:90");
        assert_eq!(reply, Reply::ok("SERVO1:90"));
        assert!(reply.is_ok());
    }

    #[test]
    fn test_parse_error() {
        assert_eq!(Reply::parse("ERROR:INVALID_ANGLE\n"), Reply::error(codes::INVALID_ANGLE));
    }

    #[test]
    fn test_parse_other() {
        let reply = Reply::parse("WELCOME_RPi");
        assert_eq!(reply, Reply::Other("WELCOME_RPi".into()));
        assert!(!reply.is_ok());
    }

    #[test]
    fn test_display_matches_wire_form() {
        assert_eq!(Reply::ok("OLED_CLEARED").to_string(), "OK:OLED_CLEARED");
        assert_eq!(Reply::error(codes::DECODE_ERROR).to_string(), "ERROR:DECODE_ERROR");
    }
}
