//! Mock Hardware
//!
//! Simulated devices for the CLI demo and the integration tests. Every wait goes
//! through [`RunContext::sleep`], so a stop request interrupts motion and sampling
//! within one sleep slice.
//!
//! - `MockStage` - linear stage, 10 mm/s with a 50 ms settle
//! - `MockMeter` - power meter returning a Gaussian-ish peak plus uniform noise
//! - `StageScan` - measurement sampling the meter at the current stage position

use crate::action::{Measurement, ResultTable, RunContext};
use crate::error::PayloadError;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// MockStage - Simulated Motion Stage
// =============================================================================

/// Mock motion stage with realistic timing
pub struct MockStage {
    position: Mutex<f64>,
    speed_mm_per_sec: f64,
    settle: Duration,
}

impl MockStage {
    /// Create new mock stage at position 0.0mm
    pub fn new() -> Self {
        Self {
            position: Mutex::new(0.0),
            speed_mm_per_sec: 10.0,
            settle: Duration::from_millis(50),
        }
    }

    /// Create mock stage with custom speed
    pub fn with_speed(speed_mm_per_sec: f64) -> Self {
        Self {
            speed_mm_per_sec,
            ..Self::new()
        }
    }

    /// Override the settle time applied after every move.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Current position in mm.
    pub fn position(&self) -> f64 {
        *self.position.lock()
    }

    /// Move to `target` (mm) and settle.
    ///
    /// On cancellation the stage stays where it was.
    pub fn move_abs(&self, ctx: &RunContext, target: f64) -> Result<(), PayloadError> {
        let current = self.position();
        let distance = (target - current).abs();
        let travel = if self.speed_mm_per_sec > 0.0 {
            Duration::from_secs_f64(distance / self.speed_mm_per_sec)
        } else {
            Duration::ZERO
        };

        tracing::debug!(from = current, to = target, ?travel, "MockStage moving");
        ctx.set_status_message(format!("Moving to {:.2} mm", target));
        ctx.sleep(travel)?;
        *self.position.lock() = target;

        ctx.sleep(self.settle)?;
        tracing::debug!(position = target, "MockStage settled");
        Ok(())
    }
}

impl Default for MockStage {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// MockMeter - Simulated Power Meter
// =============================================================================

/// Mock power meter.
///
/// Reads `peak * exp(-((x - centre) / width)^2)` plus uniform noise in
/// `[-noise, noise)`, where `x` is the position passed to [`MockMeter::read_at`].
pub struct MockMeter {
    peak: f64,
    centre: f64,
    width: f64,
    noise: f64,
}

impl MockMeter {
    /// Meter peaking at `centre` (mm) with 1% noise.
    pub fn new(peak: f64, centre: f64, width: f64) -> Self {
        Self {
            peak,
            centre,
            width,
            noise: peak * 0.01,
        }
    }

    /// Set the noise amplitude; zero gives exact readings.
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise.abs();
        self
    }

    /// Sample the meter with the stage at `position`.
    pub fn read_at(&self, position: f64) -> f64 {
        let width = if self.width == 0.0 { 1.0 } else { self.width };
        let x = (position - self.centre) / width;
        let signal = self.peak * (-x * x).exp();
        if self.noise > 0.0 {
            signal + rand::thread_rng().gen_range(-self.noise..self.noise)
        } else {
            signal
        }
    }
}

impl Default for MockMeter {
    fn default() -> Self {
        Self::new(1.0, 5.0, 2.0)
    }
}

// =============================================================================
// StageScan - Measurement
// =============================================================================

/// Samples a [`MockMeter`] at the current position of a [`MockStage`].
///
/// Rows are `(position, sample, value)`. A failure can be injected at one stage
/// position for a given number of attempts, which exercises the retry loop.
pub struct StageScan {
    stage: Arc<MockStage>,
    meter: Arc<MockMeter>,
    samples: usize,
    sample_interval: Duration,
    failure: Option<InjectedFailure>,
}

struct InjectedFailure {
    position: f64,
    remaining: AtomicU32,
}

impl StageScan {
    /// Record `samples` readings per run.
    pub fn new(stage: Arc<MockStage>, meter: Arc<MockMeter>, samples: usize) -> Self {
        Self {
            stage,
            meter,
            samples,
            sample_interval: Duration::from_millis(1),
            failure: None,
        }
    }

    /// Delay between samples.
    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    /// Fail the first `attempts` runs made with the stage at `position`.
    pub fn fail_at(mut self, position: f64, attempts: u32) -> Self {
        self.failure = Some(InjectedFailure {
            position,
            remaining: AtomicU32::new(attempts),
        });
        self
    }

    fn injected_failure(&self, position: f64) -> bool {
        let Some(failure) = &self.failure else {
            return false;
        };
        if (failure.position - position).abs() > 1e-9 {
            return false;
        }
        failure
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Measurement for StageScan {
    fn name(&self) -> String {
        "Stage scan".to_string()
    }

    fn columns(&self) -> Vec<String> {
        vec![
            "position".to_string(),
            "sample".to_string(),
            "value".to_string(),
        ]
    }

    fn run(&self, ctx: &RunContext, results: &ResultTable) -> Result<(), PayloadError> {
        let position = self.stage.position();
        if self.injected_failure(position) {
            return Err(PayloadError::failed(format!(
                "Meter saturated at {:.2} mm",
                position
            )));
        }

        for sample in 0..self.samples {
            ctx.check()?;
            let value = self.meter.read_at(position);
            results.add_row(vec![position, sample as f64, value])?;
            ctx.sleep(self.sample_interval)?;
        }
        ctx.set_status_message(format!("{} samples at {:.2} mm", self.samples, position));
        Ok(())
    }
}
