//! Centralized error types for the simulator
//!
//! All simulator errors are represented by the `SimError` enum.
//! Use `Result<T>` as shorthand for `std::result::Result<T, SimError>`.
//!
//! Non-fatal findings while reading response files are not errors:
//! they are collected as [`ParseWarning`](crate::responses::ParseWarning)
//! values on the loaded table.

use crate::framer::Concept;
use std::fmt;
use std::path::PathBuf;

/// All simulator errors
#[derive(Debug)]
pub enum SimError {
    // === IO ===
    /// File system operation failed
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Transport ===
    /// Serial port could not be opened
    PortUnavailable {
        port: String,
        source: std::io::Error,
    },

    // === Engine ===
    /// Operation not allowed in the current engine state
    InvalidState { reason: &'static str },
    /// Background thread failed while running or did not stop in time
    EngineFatal { reason: String },
    /// Response table was segmented for another concept than the session
    ConceptMismatch { table: Concept, session: Concept },

    // === Config ===
    /// Invalid config value
    ConfigValidation { field: &'static str, reason: String },

    // === Runtime ===
    /// Tokio runtime creation failed
    Runtime { source: std::io::Error },
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. }
            | Self::PortUnavailable { source, .. }
            | Self::Runtime { source } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, .. } => write!(f, "IO error: {}", path.display()),
            Self::PortUnavailable { port, source } => {
                write!(f, "Cannot open serial port {}: {}", port, source)
            }
            Self::InvalidState { reason } => write!(f, "Invalid state: {}", reason),
            Self::EngineFatal { reason } => write!(f, "Engine failure: {}", reason),
            Self::ConceptMismatch { table, session } => write!(
                f,
                "Response table was built for {} but session uses {}",
                table, session
            ),
            Self::ConfigValidation { field, reason } => {
                write!(f, "Invalid {}: {}", field, reason)
            }
            Self::Runtime { .. } => write!(f, "Failed to create runtime"),
        }
    }
}

/// Alias for Result with SimError
pub type Result<T> = std::result::Result<T, SimError>;
