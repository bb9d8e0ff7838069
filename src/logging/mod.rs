//! Logging
//!
//! Two channels:
//! - `tracing` for internal diagnostics (stderr, filtered by verbosity)
//! - `LogEntry` stream for the session observer (telegrams and events)

pub mod entry;

pub use entry::{hex, Direction, LogEntry, LogKind, LogLevel};

use tokio::sync::mpsc;

/// Initialize internal tracing
///
/// Call early in main() before any logging occurs.
/// Set `verbose` to true for debug-level output.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = if verbose { "debug" } else { "warn" };

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_file(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .with(tracing_subscriber::EnvFilter::new(level))
        .try_init();
}

/// Send an entry to the observer without blocking
///
/// Drops the entry if no observer is attached or its channel is full.
pub fn try_log(log_tx: &Option<mpsc::Sender<LogEntry>>, entry: LogEntry, what: &'static str) {
    if let Some(tx) = log_tx {
        if tx.try_send(entry).is_err() {
            tracing::trace!("observer dropped {} entry", what);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_log_without_observer() {
        try_log(&None, LogEntry::system("ignored"), "test");
    }

    #[test]
    fn test_try_log_full_channel_does_not_block() {
        let (tx, mut rx) = mpsc::channel(1);
        let log_tx = Some(tx);
        try_log(&log_tx, LogEntry::system("first"), "test");
        try_log(&log_tx, LogEntry::system("second"), "test");

        let first = rx.try_recv().unwrap();
        assert_eq!(
            first.kind,
            LogKind::System {
                message: "first".into()
            }
        );
        assert!(rx.try_recv().is_err());
    }
}
