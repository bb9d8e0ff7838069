//! Engine session - the loop running on the background thread
//!
//! The session handles:
//! - Bounded reads from the link, polling the stop flag on every tick
//! - Buffering partial telegrams until the framer confirms them
//! - Table lookup, synthesis and fallback for each confirmed request
//! - Paced transmission of response telegrams
//! - Statistics and observer logging
//!
//! The session does NOT handle:
//! - Opening the link (the engine does that before spawning)
//! - Lifecycle state outside Listening/Responding

use super::{Shared, State};
use crate::config::{EngineConfig, FallbackPolicy};
use crate::constants::{MAX_RX_BUFFER, READ_CHUNK_SIZE, SERIAL_DISCONNECT_THRESHOLD};
use crate::error::{Result, SimError};
use crate::framer::{Concept, FrameLength, Framing};
use crate::logging::{self, hex, LogEntry, LogLevel};
use crate::responses::ResponseTable;
use crate::transport::Link;
use crate::vehicle::{Synthesizer, VehicleState};
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// State owned by the engine thread for one session
pub(super) struct Session {
    link: Box<dyn Link>,
    concept: Concept,
    framing: &'static dyn Framing,
    table: Arc<ResponseTable>,
    vehicle: Arc<VehicleState>,
    synth: Synthesizer,
    shared: Arc<Shared>,
    fallback: FallbackPolicy,
    telegram_gap: Duration,
    log_tx: Option<mpsc::Sender<LogEntry>>,
    /// Received bytes not yet consumed as a telegram
    rx_buf: Vec<u8>,
    last_rx: Instant,
}

impl Session {
    pub(super) fn new(
        link: Box<dyn Link>,
        concept: Concept,
        table: Arc<ResponseTable>,
        vehicle: Arc<VehicleState>,
        shared: Arc<Shared>,
        config: &EngineConfig,
        log_tx: Option<mpsc::Sender<LogEntry>>,
    ) -> Self {
        Self {
            link,
            concept,
            framing: concept.framing(),
            table,
            vehicle,
            synth: Synthesizer::new(),
            shared,
            fallback: config.fallback.for_concept(concept),
            telegram_gap: config.telegram_gap(),
            log_tx,
            rx_buf: Vec::with_capacity(READ_CHUNK_SIZE),
            last_rx: Instant::now(),
        }
    }

    /// Run until `shutdown` is set or the link fails
    ///
    /// Returns `Ok(())` on a requested stop. The link is dropped (port
    /// released) when the session is consumed.
    pub(super) fn run(mut self, shutdown: &AtomicBool) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let mut zero_reads = 0u32;

        while !shutdown.load(Ordering::Relaxed) {
            match self.link.read(&mut chunk) {
                Ok(n) if n > 0 => {
                    zero_reads = 0;
                    self.on_bytes(&chunk[..n])?;
                }
                Ok(_) => {
                    // Zero bytes read - could be normal or port gone
                    zero_reads += 1;
                    if zero_reads > SERIAL_DISCONNECT_THRESHOLD {
                        return Err(SimError::EngineFatal {
                            reason: "port stopped delivering data, assuming disconnect".into(),
                        });
                    }
                    self.on_idle()?;
                }
                Err(ref e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) =>
                {
                    zero_reads = 0;
                    self.on_idle()?;
                }
                Err(e) => {
                    return Err(SimError::EngineFatal {
                        reason: format!("serial read failed: {}", e),
                    });
                }
            }
        }

        Ok(())
    }

    // =========================================================================
    // Receive
    // =========================================================================

    fn on_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.shared.stats.add_rx(data.len());
        self.last_rx = Instant::now();
        self.rx_buf.extend_from_slice(data);

        if self.rx_buf.len() > MAX_RX_BUFFER {
            let dropped = self.rx_buf.len();
            self.rx_buf.clear();
            self.shared.stats.add_dropped(dropped);
            self.event(
                LogLevel::Warn,
                format!("receive buffer overflow, {} bytes discarded", dropped),
            );
            return Ok(());
        }

        self.drain_telegrams()
    }

    /// Handle every framer-complete telegram at the buffer start
    fn drain_telegrams(&mut self) -> Result<()> {
        while !self.rx_buf.is_empty() {
            match self.framing.frame_length(&self.rx_buf) {
                FrameLength::Complete(len) if self.rx_buf.len() >= len => {
                    let telegram: Vec<u8> = self.rx_buf.drain(..len).collect();
                    self.handle_request(&telegram)?;
                }
                FrameLength::Complete(_) | FrameLength::Incomplete => break,
                FrameLength::Malformed => {
                    let byte = self.rx_buf.remove(0);
                    self.shared.stats.add_dropped(1);
                    self.event(
                        LogLevel::Warn,
                        format!("malformed header, resync after dropping {:02X}", byte),
                    );
                }
            }
        }
        Ok(())
    }

    /// Re-evaluate leftover bytes once the line went quiet
    ///
    /// A leftover that equals a recorded request is answered, anything
    /// else is discarded.
    fn on_idle(&mut self) -> Result<()> {
        if self.rx_buf.is_empty() || self.last_rx.elapsed() < self.telegram_gap {
            return Ok(());
        }

        let pending = std::mem::take(&mut self.rx_buf);
        if self.table.lookup(&pending).is_some() {
            return self.handle_request(&pending);
        }

        self.shared.stats.add_dropped(pending.len());
        self.event(
            LogLevel::Warn,
            format!("incomplete telegram discarded: {}", hex(&pending)),
        );
        Ok(())
    }

    // =========================================================================
    // Respond
    // =========================================================================

    fn handle_request(&mut self, telegram: &[u8]) -> Result<()> {
        self.shared.stats.add_request();
        logging::try_log(&self.log_tx, LogEntry::rx(telegram), "rx");
        debug!("RX {}", hex(telegram));

        self.shared.transition(State::Listening, State::Responding);
        let result = self.respond(telegram);
        self.shared.transition(State::Responding, State::Listening);
        result
    }

    fn respond(&mut self, telegram: &[u8]) -> Result<()> {
        if let Some(entry) = self.table.lookup(telegram) {
            self.shared.stats.add_table_hit();
            if entry.response_list.is_empty() {
                self.event(
                    LogLevel::Warn,
                    format!("response on line {} has no complete telegram", entry.line),
                );
                return Ok(());
            }
            let telegrams = entry.response_list.clone();
            return self.transmit(&telegrams);
        }

        let Some(request) = self.framing.parse(telegram) else {
            self.event(
                LogLevel::Debug,
                format!("unparseable request ignored: {}", hex(telegram)),
            );
            return Ok(());
        };
        if !self.framing.checksum_ok(telegram) {
            self.event(
                LogLevel::Warn,
                format!("checksum mismatch in request {}", hex(telegram)),
            );
        }

        if let Some(payload) = self
            .synth
            .respond(self.concept, &request, self.vehicle.snapshot())
        {
            self.shared.stats.add_synthesized();
            let reply = self.framing.reply(&request, &payload);
            return self.transmit(&[reply]);
        }

        self.shared.stats.add_fallback();
        match self.fallback {
            FallbackPolicy::Nack => {
                let payload = self.framing.negative_payload(request.data);
                let reply = self.framing.reply(&request, &payload);
                self.transmit(&[reply])
            }
            FallbackPolicy::Silent => {
                self.event(
                    LogLevel::Info,
                    format!("no response for {}", hex(telegram)),
                );
                Ok(())
            }
        }
    }

    /// Write telegrams in order with the concept's pacing
    fn transmit<T: AsRef<[u8]>>(&mut self, telegrams: &[T]) -> Result<()> {
        let timing = self.concept.timing();

        for (i, telegram) in telegrams.iter().enumerate() {
            let telegram = telegram.as_ref();
            let delay = if i == 0 {
                timing.response_delay
            } else {
                timing.inter_telegram
            };
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }

            self.link
                .write_all(telegram)
                .and_then(|_| self.link.flush())
                .map_err(|e| SimError::EngineFatal {
                    reason: format!("serial write failed: {}", e),
                })?;

            self.shared.stats.add_tx(telegram.len());
            logging::try_log(&self.log_tx, LogEntry::tx(telegram), "tx");
            debug!("TX {}", hex(telegram));
        }
        Ok(())
    }

    fn event(&self, level: LogLevel, message: String) {
        match level {
            LogLevel::Warn | LogLevel::Error => warn!("{}", message),
            LogLevel::Debug | LogLevel::Info => debug!("{}", message),
        }
        logging::try_log(&self.log_tx, LogEntry::event(level, message), "event");
    }
}
