//! Log entry types
//!
//! Core types for the observer stream of an engine session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of an engine event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Direction of telegram bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Rx, // Tester -> Simulator
    Tx, // Simulator -> Tester
}

/// Type of log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogKind {
    /// Bytes received from or sent to the tester
    Telegram { direction: Direction, data: Vec<u8> },
    /// Something the engine noticed while handling traffic
    Event { level: LogLevel, message: String },
    /// Session lifecycle message
    System { message: String },
}

/// Log entry from an engine session (serializable for JSON output)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String, // HH:MM:SS.mmm
    pub kind: LogKind,
}

impl LogEntry {
    /// Current timestamp as HH:MM:SS.mmm
    #[inline]
    fn now() -> String {
        chrono::Local::now().format("%H:%M:%S%.3f").to_string()
    }

    /// Create a system log entry
    pub fn system(message: impl Into<String>) -> Self {
        Self {
            timestamp: Self::now(),
            kind: LogKind::System {
                message: message.into(),
            },
        }
    }

    /// Create an entry for received bytes
    pub fn rx(data: &[u8]) -> Self {
        Self {
            timestamp: Self::now(),
            kind: LogKind::Telegram {
                direction: Direction::Rx,
                data: data.to_vec(),
            },
        }
    }

    /// Create an entry for transmitted bytes
    pub fn tx(data: &[u8]) -> Self {
        Self {
            timestamp: Self::now(),
            kind: LogKind::Telegram {
                direction: Direction::Tx,
                data: data.to_vec(),
            },
        }
    }

    /// Create an engine event entry
    pub fn event(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Self::now(),
            kind: LogKind::Event {
                level,
                message: message.into(),
            },
        }
    }
}

/// Format bytes as space-separated upper-case hex
pub fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LogKind::Telegram { direction, data } => {
                let arrow = match direction {
                    Direction::Rx => "RX",
                    Direction::Tx => "TX",
                };
                write!(f, "{} {} {}", self.timestamp, arrow, hex(data))
            }
            LogKind::Event { level, message } => {
                write!(f, "{} [{:?}] {}", self.timestamp, level, message)
            }
            LogKind::System { message } => write!(f, "{} {}", self.timestamp, message),
        }
    }
}
