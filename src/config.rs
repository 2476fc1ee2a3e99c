//! Sequencer configuration using Figment
//!
//! Configuration is layered:
//! 1. Built-in defaults (`SequencerConfig::default()`)
//! 2. `config/sequencer.toml` (or the file passed to `load_from`)
//! 3. Environment variables prefixed with `DAQ_SEQ_`, nested with `__`
//!
//! # Example
//! ```no_run
//! use daq_sequencer::config::SequencerConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // DAQ_SEQ_ENGINE__STOP_MAX_POLLS=100 overrides engine.stop_max_polls
//! let config = SequencerConfig::load()?;
//! config.validate()?;
//! println!("Application: {}", config.application.name);
//! # Ok(())
//! # }
//! ```

use crate::action::{pattern_namer, Action, StopPolicy};
use crate::error::{SequencerError, SequencerResult};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/sequencer.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "DAQ_SEQ_";

/// Top-level sequencer configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Engine behaviour
    pub engine: EngineConfig,
    /// Demo queue built by the CLI
    pub demo: DemoConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    pub log_format: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "daq-sequencer".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Delay between polls while waiting for an action to stop
    pub stop_poll_interval_ms: u64,
    /// Polls before `stop()` gives up
    pub stop_max_polls: u32,
    /// Attempts per run for measurements configured through `EngineConfig::apply`
    pub default_retry_count: u32,
    /// Directory for measurement results; in-memory only when unset
    pub results_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stop_poll_interval_ms: 10,
            stop_max_polls: 500,
            default_retry_count: 1,
            results_dir: None,
        }
    }
}

impl EngineConfig {
    /// Stop-wait bound for actions.
    pub fn stop_policy(&self) -> StopPolicy {
        StopPolicy {
            poll_interval: Duration::from_millis(self.stop_poll_interval_ms),
            max_polls: self.stop_max_polls,
        }
    }

    /// Apply the engine defaults to a freshly built action: the stop bound on every
    /// kind, plus retry count and result file naming on measurements.
    ///
    /// Sweeps are not walked; configure templates before adding them.
    pub fn apply(&self, action: &Action) {
        action.set_stop_policy(self.stop_policy());
        if let Some(measurement) = action.as_measurement() {
            measurement.set_retry_count(self.default_retry_count);
            if let Some(dir) = &self.results_dir {
                let pattern = format!("{}/{{label}} {{attributes}}.csv", dir.display());
                measurement.set_result_namer(Some(pattern_namer(pattern)));
            }
        }
    }
}

/// Parameters of the CLI demo queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// First stage position (mm)
    pub start_mm: f64,
    /// Last stage position (mm)
    pub stop_mm: f64,
    /// Number of positions
    pub points: usize,
    /// Meter samples recorded per position
    pub samples_per_point: usize,
    /// Stage settle time (ms)
    pub settle_ms: u64,
    /// Inject a measurement failure at this position index
    pub fail_at_point: Option<usize>,
    /// Whether the measurement is critical
    pub critical_failure: bool,
    /// Measurement attempts per position
    pub retry_count: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            start_mm: 0.0,
            stop_mm: 10.0,
            points: 5,
            samples_per_point: 20,
            settle_ms: 50,
            fail_at_point: None,
            critical_failure: false,
            retry_count: 2,
        }
    }
}

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

impl SequencerConfig {
    /// Load from `config/sequencer.toml` and the environment.
    pub fn load() -> SequencerResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file and the environment. A missing file leaves the
    /// defaults in place.
    pub fn load_from<P: AsRef<Path>>(path: P) -> SequencerResult<Self> {
        let config = Self::figment(path.as_ref()).extract()?;
        Ok(config)
    }

    /// Provider chain used by `load_from`.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(SequencerConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> SequencerResult<()> {
        let level = self.application.log_level.to_lowercase();
        if !VALID_LEVELS.contains(&level.as_str()) {
            return Err(SequencerError::InvalidConfig(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                VALID_LEVELS.join(", ")
            )));
        }

        let format = self.application.log_format.to_lowercase();
        if !VALID_FORMATS.contains(&format.as_str()) {
            return Err(SequencerError::InvalidConfig(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                VALID_FORMATS.join(", ")
            )));
        }

        if self.engine.stop_poll_interval_ms == 0 {
            return Err(SequencerError::InvalidConfig(
                "engine.stop_poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.engine.stop_max_polls == 0 {
            return Err(SequencerError::InvalidConfig(
                "engine.stop_max_polls must be greater than 0".to_string(),
            ));
        }
        if self.engine.default_retry_count == 0 {
            return Err(SequencerError::InvalidConfig(
                "engine.default_retry_count must be at least 1".to_string(),
            ));
        }

        if let Some(index) = self.demo.fail_at_point {
            if index >= self.demo.points {
                return Err(SequencerError::InvalidConfig(format!(
                    "demo.fail_at_point {} is outside the {} sweep points",
                    index, self.demo.points
                )));
            }
        }

        Ok(())
    }
}
