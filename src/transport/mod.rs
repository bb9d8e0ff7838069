//! Transport abstraction for byte-level I/O
//!
//! Separates I/O concerns from protocol logic:
//! - **Transport**: how bytes flow (serial port, test doubles)
//! - **Framer**: where telegrams start and end (handled separately)
//!
//! The engine thread owns the opened link exclusively. The host side never
//! touches it, it only holds the `Transport` used to open new links.
//!
//! # Adding a new transport
//!
//! 1. Create `transport/my_transport.rs`
//! 2. Implement the `Transport` trait
//! 3. Add `pub mod my_transport;` here

pub mod serial;

pub use serial::SerialTransport;

use crate::error::Result;
use crate::framer::LineSettings;
use std::io::{Read, Write};
use std::time::Duration;

/// Opened byte stream
///
/// Reads must return within the timeout given to [`Transport::open`],
/// either with data or with `ErrorKind::TimedOut`/`WouldBlock`. The engine
/// relies on this to notice stop requests.
pub trait Link: Read + Write + Send {}

impl<T: Read + Write + Send + ?Sized> Link for T {}

/// Factory for links
///
/// A transport does NOT handle:
/// - Telegram framing (that's the framer's job)
/// - Logging or statistics (that's the engine's job)
pub trait Transport: Send + Sync + 'static {
    /// Open `port` with the concept's line settings
    ///
    /// # Errors
    ///
    /// Returns `PortUnavailable` if the port cannot be opened.
    fn open(&self, port: &str, line: LineSettings, read_timeout: Duration)
        -> Result<Box<dyn Link>>;
}
