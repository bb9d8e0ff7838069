//! Car Simulator - serial ECU simulator for diagnostic testers
//!
//! Answers diagnostic request telegrams on a serial port the way a vehicle
//! ECU would. Responses come from a recorded response file, a small set of
//! jobs is synthesized from live vehicle flags.
//!
//! Supported protocol concepts: `fast`, `kwp2000s`, `ds2`.

pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod framer;
pub mod logging;
pub mod responses;
pub mod transport;
pub mod vehicle;

pub use engine::{Engine, State, Status};
pub use error::{Result, SimError};
pub use framer::Concept;
pub use responses::ResponseTable;
