//! Application-wide constants
//!
//! Centralized constants to avoid duplication and ensure consistency.

// =============================================================================
// Files
// =============================================================================

/// Default config file name (current directory)
pub const DEFAULT_CONFIG_FILE: &str = "car-sim.toml";

/// Default response definition file
pub const DEFAULT_RESPONSE_FILE: &str = "Response.txt";

// =============================================================================
// Timing - Engine
// =============================================================================

/// Bounded blocking read on the port, also the stop-flag polling tick (milliseconds)
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 10;

/// Maximum wait for the engine thread to exit on stop (milliseconds)
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 1000;

/// Line idle time after which buffered partial bytes are re-evaluated (milliseconds)
pub const DEFAULT_TELEGRAM_GAP_MS: u64 = 100;

// =============================================================================
// Buffers
// =============================================================================

/// Size of a single port read
pub const READ_CHUNK_SIZE: usize = 256;

/// Receive buffer size before it is considered garbage and flushed
pub const MAX_RX_BUFFER: usize = 4096;

/// Channel capacity for observer log entries
pub const CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// Serial
// =============================================================================

/// Consecutive zero-byte reads before assuming port disconnected
pub const SERIAL_DISCONNECT_THRESHOLD: u32 = 10;
