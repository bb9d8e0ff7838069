//! Configuration management
//!
//! Config is read from a TOML file (default `car-sim.toml` in the current
//! directory). Every section and field is optional; missing values use the
//! defaults below. Command-line flags override file values.
//!
//! ```toml
//! [simulator]
//! port = "/dev/ttyUSB0"
//! concept = "fast"
//! response_file = "Response.txt"
//!
//! [vehicle]
//! moving = false
//! variable_values = false
//! ignition_ok = true
//!
//! [engine]
//! read_timeout_ms = 10
//! stop_timeout_ms = 1000
//! telegram_gap_ms = 100
//!
//! [engine.fallback]
//! fast = "nack"
//! kwp2000s = "nack"
//! ds2 = "silent"
//! ```

use crate::constants::{
    DEFAULT_READ_TIMEOUT_MS, DEFAULT_RESPONSE_FILE, DEFAULT_STOP_TIMEOUT_MS,
    DEFAULT_TELEGRAM_GAP_MS,
};
use crate::error::{Result, SimError};
use crate::framer::Concept;
use crate::vehicle::VehicleSnapshot;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

// =============================================================================
// Application Configuration
// =============================================================================

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub simulator: SimulatorConfig,
    pub vehicle: VehicleConfig,
    pub engine: EngineConfig,
}

/// Session selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Serial port name (empty = must be given on the command line)
    pub port: String,
    /// Protocol concept to emulate
    pub concept: Concept,
    /// Response definition file
    pub response_file: PathBuf,
}

/// Initial vehicle flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    pub moving: bool,
    pub variable_values: bool,
    pub ignition_ok: bool,
}

/// Engine timing and fallback behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bounded blocking read, also the stop-flag polling tick
    pub read_timeout_ms: u64,
    /// Maximum wait for the engine thread on stop
    pub stop_timeout_ms: u64,
    /// Line idle time after which partial bytes are re-evaluated
    pub telegram_gap_ms: u64,
    /// Answer to requests neither recorded nor synthesized
    pub fallback: FallbackConfig,
}

/// What to send when no response is known
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Negative acknowledge in the concept's format
    #[default]
    Nack,
    /// Stay silent, the tester runs into its timeout
    Silent,
}

/// Fallback policy per concept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub fast: FallbackPolicy,
    pub kwp2000s: FallbackPolicy,
    pub ds2: FallbackPolicy,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            concept: Concept::Fast,
            response_file: PathBuf::from(DEFAULT_RESPONSE_FILE),
        }
    }
}

impl Default for VehicleConfig {
    fn default() -> Self {
        let snap = VehicleSnapshot::default();
        Self {
            moving: snap.moving,
            variable_values: snap.variable_values,
            ignition_ok: snap.ignition_ok,
        }
    }
}

impl VehicleConfig {
    pub fn snapshot(&self) -> VehicleSnapshot {
        VehicleSnapshot {
            moving: self.moving,
            variable_values: self.variable_values,
            ignition_ok: self.ignition_ok,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
            telegram_gap_ms: DEFAULT_TELEGRAM_GAP_MS,
            fallback: FallbackConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn telegram_gap(&self) -> Duration {
        Duration::from_millis(self.telegram_gap_ms)
    }

    /// Check timing values are usable
    pub fn validate(&self) -> Result<()> {
        if self.read_timeout_ms == 0 {
            return Err(SimError::ConfigValidation {
                field: "engine.read_timeout_ms",
                reason: "must be greater than 0".into(),
            });
        }
        if self.stop_timeout_ms < self.read_timeout_ms {
            return Err(SimError::ConfigValidation {
                field: "engine.stop_timeout_ms",
                reason: format!(
                    "must be at least read_timeout_ms ({})",
                    self.read_timeout_ms
                ),
            });
        }
        Ok(())
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            fast: FallbackPolicy::Nack,
            kwp2000s: FallbackPolicy::Nack,
            ds2: FallbackPolicy::Nack,
        }
    }
}

impl FallbackConfig {
    pub fn for_concept(&self, concept: Concept) -> FallbackPolicy {
        match concept {
            Concept::Fast => self.fast,
            Concept::Kwp2000s => self.kwp2000s,
            Concept::Ds2 => self.ds2,
        }
    }
}

// =============================================================================
// Load / Save
// =============================================================================

/// Load config from `path`
///
/// A missing file yields the defaults.
///
/// # Errors
///
/// - `Io` if the file exists but cannot be read
/// - `ConfigValidation` if it is not valid TOML or has unusable values
pub fn load(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path).map_err(|e| SimError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let config: Config = toml::from_str(&content).map_err(|e| SimError::ConfigValidation {
        field: "config",
        reason: format!("{}: {}", path.display(), e),
    })?;
    config.engine.validate()?;
    Ok(config)
}

/// Save config to `path`
pub fn save(config: &Config, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config).map_err(|e| SimError::ConfigValidation {
        field: "config",
        reason: e.to_string(),
    })?;
    fs::write(path, content).map_err(|e| SimError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.simulator.concept, Concept::Fast);
        assert_eq!(config.simulator.port, "");
        assert_eq!(
            config.simulator.response_file,
            PathBuf::from(DEFAULT_RESPONSE_FILE)
        );
        assert!(config.vehicle.ignition_ok);
        assert!(!config.vehicle.moving);
        assert_eq!(config.engine.read_timeout_ms, DEFAULT_READ_TIMEOUT_MS);
        assert_eq!(config.engine.fallback.ds2, FallbackPolicy::Nack);
    }

    #[test]
    fn test_config_empty_file() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_partial_sections() {
        let partial = r#"
[simulator]
concept = "ds2"

[engine.fallback]
kwp2000s = "silent"
"#;
        let config: Config = toml::from_str(partial).unwrap();
        assert_eq!(config.simulator.concept, Concept::Ds2);
        assert_eq!(config.simulator.response_file, PathBuf::from(DEFAULT_RESPONSE_FILE));
        assert_eq!(
            config.engine.fallback.for_concept(Concept::Kwp2000s),
            FallbackPolicy::Silent
        );
        assert_eq!(
            config.engine.fallback.for_concept(Concept::Fast),
            FallbackPolicy::Nack
        );
        assert_eq!(config.engine.stop_timeout_ms, DEFAULT_STOP_TIMEOUT_MS);
    }

    #[test]
    fn test_unknown_concept_rejected() {
        let result: std::result::Result<Config, _> =
            toml::from_str("[simulator]\nconcept = \"can\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_read_timeout() {
        let engine = EngineConfig {
            read_timeout_ms: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            engine.validate(),
            Err(SimError::ConfigValidation {
                field: "engine.read_timeout_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_load_missing_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("car-sim.toml");
        let mut config = Config::default();
        config.simulator.port = "COM4".into();
        config.simulator.concept = Concept::Kwp2000s;
        config.vehicle.moving = true;
        config.engine.fallback.ds2 = FallbackPolicy::Silent;

        save(&config, &path).unwrap();
        assert_eq!(load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[engine\nread_timeout_ms = ").unwrap();
        assert!(matches!(
            load(&path),
            Err(SimError::ConfigValidation { field: "config", .. })
        ));
    }
}
