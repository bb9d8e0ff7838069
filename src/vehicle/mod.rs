//! Vehicle state model
//!
//! Three independent flags the host may flip at any time while a session
//! runs. Each flag is its own atomic, readers get the latest value of each
//! one with no cross-flag consistency. Any combination is legal, e.g. a
//! moving vehicle without ignition is a valid test scenario.

pub mod synth;

pub use synth::Synthesizer;

use std::sync::atomic::{AtomicBool, Ordering};

/// Live vehicle flags shared between host and engine thread
#[derive(Debug)]
pub struct VehicleState {
    moving: AtomicBool,
    variable_values: AtomicBool,
    ignition_ok: AtomicBool,
}

/// Point-in-time copy of the vehicle flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VehicleSnapshot {
    pub moving: bool,
    pub variable_values: bool,
    pub ignition_ok: bool,
}

impl Default for VehicleSnapshot {
    fn default() -> Self {
        Self {
            moving: false,
            variable_values: false,
            ignition_ok: true,
        }
    }
}

impl VehicleState {
    pub fn new(initial: VehicleSnapshot) -> Self {
        Self {
            moving: AtomicBool::new(initial.moving),
            variable_values: AtomicBool::new(initial.variable_values),
            ignition_ok: AtomicBool::new(initial.ignition_ok),
        }
    }

    #[inline]
    pub fn moving(&self) -> bool {
        self.moving.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_moving(&self, value: bool) {
        self.moving.store(value, Ordering::Relaxed);
    }

    #[inline]
    pub fn variable_values(&self) -> bool {
        self.variable_values.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_variable_values(&self, value: bool) {
        self.variable_values.store(value, Ordering::Relaxed);
    }

    #[inline]
    pub fn ignition_ok(&self) -> bool {
        self.ignition_ok.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_ignition_ok(&self, value: bool) {
        self.ignition_ok.store(value, Ordering::Relaxed);
    }

    /// Read each flag once
    pub fn snapshot(&self) -> VehicleSnapshot {
        VehicleSnapshot {
            moving: self.moving(),
            variable_values: self.variable_values(),
            ignition_ok: self.ignition_ok(),
        }
    }
}

impl Default for VehicleState {
    fn default() -> Self {
        Self::new(VehicleSnapshot::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ignition_on() {
        let state = VehicleState::default();
        assert_eq!(state.snapshot(), VehicleSnapshot::default());
        assert!(state.ignition_ok());
        assert!(!state.moving());
    }

    #[test]
    fn test_flags_independent() {
        let state = VehicleState::default();
        state.set_ignition_ok(false);
        state.set_moving(true);
        let snap = state.snapshot();
        assert!(snap.moving);
        assert!(!snap.ignition_ok);
        assert!(!snap.variable_values);
    }

    #[test]
    fn test_shared_across_threads() {
        let state = std::sync::Arc::new(VehicleState::default());
        let writer = state.clone();
        std::thread::spawn(move || writer.set_variable_values(true))
            .join()
            .unwrap();
        assert!(state.variable_values());
    }
}
