//! Communication engine
//!
//! Provides a controllable simulator session that can be started/stopped
//! from any host thread.
//!
//! ```text
//! Stopped -> Starting -> Listening <-> Responding -> Stopping -> Stopped
//!                             \            /
//!                              `-> Faulted <'
//! ```
//!
//! One engine owns at most one session. All port I/O happens on the
//! session's background thread; host calls only flip flags, read shared
//! state and join the thread.

mod session;
pub mod stats;

use self::session::Session;
use self::stats::{Stats, StatsSnapshot};
use crate::config::EngineConfig;
use crate::error::{Result, SimError};
use crate::framer::Concept;
use crate::logging::{self, LogEntry, LogLevel};
use crate::responses::ResponseTable;
use crate::transport::Transport;
use crate::vehicle::{VehicleSnapshot, VehicleState};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Stopped,
    Starting,
    Listening,
    Responding,
    Stopping,
    /// Session ended by an error, see [`Status::fault`]
    Faulted,
}

impl State {
    /// True while a session accepts requests
    pub fn is_running(self) -> bool {
        matches!(self, Self::Starting | Self::Listening | Self::Responding)
    }
}

/// Status report for the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub state: State,
    pub port: Option<String>,
    pub concept: Option<Concept>,
    /// Last engine failure, cleared on the next start
    pub fault: Option<String>,
    pub stats: StatsSnapshot,
}

impl State {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Listening => "listening",
            Self::Responding => "responding",
            Self::Stopping => "stopping",
            Self::Faulted => "faulted",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.state)?;
        if let (Some(port), Some(concept)) = (&self.port, self.concept) {
            write!(f, " on {} ({})", port, concept)?;
        }
        let s = &self.stats;
        write!(
            f,
            " | req {} hit {} synth {} fallback {} | rx {} B tx {} B dropped {} B",
            s.requests, s.table_hits, s.synthesized, s.fallbacks, s.rx_bytes, s.tx_bytes,
            s.dropped_bytes
        )?;
        if let Some(fault) = &self.fault {
            write!(f, " | fault: {}", fault)?;
        }
        Ok(())
    }
}

/// State shared between host and one session's engine thread
///
/// Every start creates a fresh instance. A thread detached by a timed-out
/// stop only ever writes to its own instance, never to a later session's.
pub(crate) struct Shared {
    state: RwLock<State>,
    fault: Mutex<Option<String>>,
    stats: Stats,
}

impl Shared {
    fn new(state: State) -> Self {
        Self {
            state: RwLock::new(state),
            fault: Mutex::new(None),
            stats: Stats::new(),
        }
    }

    fn state(&self) -> State {
        *self.state.read()
    }

    fn set_state(&self, state: State) {
        *self.state.write() = state;
    }

    /// Move `from -> to`, leaving any other state untouched
    pub(crate) fn transition(&self, from: State, to: State) {
        let mut state = self.state.write();
        if *state == from {
            *state = to;
        }
    }

    fn fail(&self, reason: String) {
        *self.fault.lock() = Some(reason);
        self.set_state(State::Faulted);
    }
}

/// Control block of the running session
///
/// Exists exactly while a background thread is alive.
struct SessionControl {
    port: String,
    concept: Concept,
    shared: Arc<Shared>,
    shutdown: Arc<AtomicBool>,
    /// Signalled by the thread right before it exits
    done_rx: std_mpsc::Receiver<()>,
    thread: JoinHandle<()>,
}

/// ECU simulator engine
///
/// # Example
///
/// ```ignore
/// let engine = Engine::new(SerialTransport::new(), EngineConfig::default());
/// let table = ResponseTable::load("Response.txt", Concept::Fast)?;
/// engine.start("/dev/ttyUSB0", Concept::Fast, table)?;
/// engine.set_ignition_ok(false);
/// engine.stop()?;
/// ```
pub struct Engine {
    transport: Box<dyn Transport>,
    config: EngineConfig,
    vehicle: Arc<VehicleState>,
    /// Serializes start, stop and reload
    lifecycle: Mutex<()>,
    /// State of the current or last session
    shared: Mutex<Arc<Shared>>,
    table: Mutex<Arc<ResponseTable>>,
    session: Mutex<Option<SessionControl>>,
    log_tx: Option<mpsc::Sender<LogEntry>>,
}

impl Engine {
    pub fn new(transport: impl Transport, config: EngineConfig) -> Self {
        Self {
            transport: Box::new(transport),
            config,
            vehicle: Arc::new(VehicleState::default()),
            lifecycle: Mutex::new(()),
            shared: Mutex::new(Arc::new(Shared::new(State::Stopped))),
            table: Mutex::new(Arc::new(ResponseTable::default())),
            session: Mutex::new(None),
            log_tx: None,
        }
    }

    /// Attach an observer receiving telegrams and events
    pub fn with_observer(mut self, log_tx: mpsc::Sender<LogEntry>) -> Self {
        self.log_tx = Some(log_tx);
        self
    }

    /// Set the initial vehicle flags
    pub fn with_vehicle(self, initial: VehicleSnapshot) -> Self {
        self.set_moving(initial.moving);
        self.set_variable_values(initial.variable_values);
        self.set_ignition_ok(initial.ignition_ok);
        self
    }

    fn shared(&self) -> Arc<Shared> {
        self.shared.lock().clone()
    }

    // =========================================================================
    // Lifecycle control
    // =========================================================================

    /// Start a session on `port` answering from `table`
    ///
    /// If a session is already running nothing is opened and the current
    /// status is returned.
    ///
    /// # Errors
    ///
    /// - `PortUnavailable` if the transport cannot open `port`
    /// - `ConceptMismatch` if a non-empty `table` was split for another concept
    pub fn start(&self, port: &str, concept: Concept, table: ResponseTable) -> Result<Status> {
        let _lifecycle = self.lifecycle.lock();
        let mut session = self.session.lock();
        self.reap(&mut session);
        if session.is_some() {
            return Ok(self.status_of(&session));
        }

        if !table.is_empty() && table.concept() != concept {
            return Err(SimError::ConceptMismatch {
                table: table.concept(),
                session: concept,
            });
        }
        *self.table.lock() = Arc::new(table);
        self.spawn_session(&mut session, port, concept)
    }

    /// Start a session with the table stored by the last start or reload
    pub fn start_current(&self, port: &str, concept: Concept) -> Result<Status> {
        let table = (*self.table.lock().clone()).clone();
        self.start(port, concept, table)
    }

    fn spawn_session(
        &self,
        session: &mut Option<SessionControl>,
        port: &str,
        concept: Concept,
    ) -> Result<Status> {
        let shared = Arc::new(Shared::new(State::Starting));
        *self.shared.lock() = shared.clone();

        let link = match self
            .transport
            .open(port, concept.line(), self.config.read_timeout())
        {
            Ok(link) => link,
            Err(e) => {
                shared.set_state(State::Stopped);
                logging::try_log(
                    &self.log_tx,
                    LogEntry::event(LogLevel::Error, e.to_string()),
                    "open_failed",
                );
                return Err(e);
            }
        };

        let worker = Session::new(
            link,
            concept,
            self.table.lock().clone(),
            self.vehicle.clone(),
            shared.clone(),
            &self.config,
            self.log_tx.clone(),
        );

        let shutdown = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = std_mpsc::channel();
        let shutdown_thread = shutdown.clone();
        let shared_thread = shared.clone();
        let log_tx = self.log_tx.clone();

        shared.set_state(State::Listening);
        let thread = std::thread::Builder::new()
            .name("car-sim-engine".into())
            .spawn(move || {
                if let Err(e) = worker.run(&shutdown_thread) {
                    error!("Engine session failed: {}", e);
                    logging::try_log(
                        &log_tx,
                        LogEntry::event(LogLevel::Error, e.to_string()),
                        "session_failed",
                    );
                    shared_thread.fail(e.to_string());
                }
                let _ = done_tx.send(());
            })
            .map_err(|e| {
                shared.set_state(State::Stopped);
                SimError::EngineFatal {
                    reason: format!("cannot spawn engine thread: {}", e),
                }
            })?;

        info!("Listening on {} ({})", port, concept);
        logging::try_log(
            &self.log_tx,
            LogEntry::system(format!("Listening on {} ({})", port, concept)),
            "started",
        );

        *session = Some(SessionControl {
            port: port.to_string(),
            concept,
            shared,
            shutdown,
            done_rx,
            thread,
        });
        Ok(self.status_of(session))
    }

    /// Stop the running session
    ///
    /// No-op when nothing runs. Waits at most `stop_timeout_ms` for the
    /// background thread. Status queries are not blocked meanwhile.
    ///
    /// # Errors
    ///
    /// Returns `EngineFatal` if the thread did not exit in time or
    /// panicked. The engine is then `Faulted` and may be started again.
    pub fn stop(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock();
        let Some(ctrl) = self.session.lock().take() else {
            return Ok(());
        };

        let shared = &ctrl.shared;
        shared.transition(State::Listening, State::Stopping);
        shared.transition(State::Responding, State::Stopping);
        ctrl.shutdown.store(true, Ordering::SeqCst);

        match ctrl.done_rx.recv_timeout(self.config.stop_timeout()) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if ctrl.thread.join().is_err() {
                    return Err(self.fatal(shared, "engine thread panicked".into()));
                }
                shared.transition(State::Stopping, State::Stopped);
                info!("Stopped session on {}", ctrl.port);
                logging::try_log(&self.log_tx, LogEntry::system("Stopped"), "stopped");
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => Err(self.fatal(
                shared,
                format!(
                    "engine thread did not stop within {} ms",
                    self.config.stop_timeout_ms
                ),
            )),
        }
    }

    fn fatal(&self, shared: &Shared, reason: String) -> SimError {
        error!("{}", reason);
        shared.fail(reason.clone());
        logging::try_log(
            &self.log_tx,
            LogEntry::event(LogLevel::Error, reason.clone()),
            "fatal",
        );
        SimError::EngineFatal { reason }
    }

    /// Collect a session whose thread already exited on its own
    fn reap(&self, session: &mut Option<SessionControl>) {
        let finished = match session {
            Some(ctrl) => !matches!(ctrl.done_rx.try_recv(), Err(TryRecvError::Empty)),
            None => false,
        };
        if !finished {
            return;
        }
        if let Some(ctrl) = session.take() {
            if ctrl.thread.join().is_err() {
                let _ = self.fatal(&ctrl.shared, "engine thread panicked".into());
            }
        }
    }

    /// Replace the response table
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` while a session is running.
    pub fn reload(&self, table: ResponseTable) -> Result<()> {
        let _lifecycle = self.lifecycle.lock();
        let mut session = self.session.lock();
        self.reap(&mut session);
        if session.is_some() {
            return Err(SimError::InvalidState {
                reason: "cannot reload responses while a session is running",
            });
        }
        *self.table.lock() = Arc::new(table);
        Ok(())
    }

    // =========================================================================
    // State queries
    // =========================================================================

    pub fn status(&self) -> Status {
        let mut session = self.session.lock();
        self.reap(&mut session);
        self.status_of(&session)
    }

    fn status_of(&self, session: &Option<SessionControl>) -> Status {
        let shared = self.shared();
        let status = Status {
            state: shared.state(),
            port: session.as_ref().map(|s| s.port.clone()),
            concept: session.as_ref().map(|s| s.concept),
            fault: shared.fault.lock().clone(),
            stats: shared.stats.snapshot(),
        };
        status
    }

    pub fn is_running(&self) -> bool {
        self.status().state.is_running()
    }

    /// Response table of the current or last session
    pub fn table(&self) -> Arc<ResponseTable> {
        self.table.lock().clone()
    }

    // =========================================================================
    // Vehicle state
    // =========================================================================

    /// Shared vehicle flags, usable from any thread
    pub fn vehicle(&self) -> Arc<VehicleState> {
        self.vehicle.clone()
    }

    pub fn set_moving(&self, value: bool) {
        self.vehicle.set_moving(value);
    }

    pub fn set_variable_values(&self, value: bool) {
        self.vehicle.set_variable_values(value);
    }

    pub fn set_ignition_ok(&self, value: bool) {
        self.vehicle.set_ignition_ok(value);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("Engine dropped with unstoppable session: {}", e);
        }
    }
}
