// src/config/mod.rs
//! Engine configuration

pub mod constants;
pub mod loader;
pub mod sweep_config;

pub use constants::*;
pub use loader::ConfigLoader;
pub use sweep_config::*;

use crate::acquisition::{AcquisitionRetry, BandEntry, BandTable, RetryPolicy};
use crate::error::{LcrError, LcrResult};
use crate::processing::IntegrationRule;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub instrument: InstrumentConfig,

    #[serde(default)]
    pub sweep: SweepConfig,

    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Frequency bands, highest lower bound first
    #[serde(default = "defaults::bands")]
    pub bands: Vec<BandEntry>,
}

/// Fixed properties of the measuring instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    #[serde(default = "defaults::sample_rate_hz")]
    pub sample_rate_hz: f64,

    /// Samples per channel the acquisition buffer holds
    #[serde(default = "defaults::buffer_capacity")]
    pub buffer_capacity: usize,

    #[serde(default = "defaults::full_scale_codes")]
    pub full_scale_codes: u32,

    #[serde(default = "defaults::min_frequency_hz")]
    pub min_frequency_hz: f64,

    #[serde(default = "defaults::max_frequency_hz")]
    pub max_frequency_hz: f64,

    #[serde(default = "defaults::max_amplitude_vpp")]
    pub max_amplitude_vpp: f64,
}

/// Acquisition and demodulation behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Retries after the first poll before giving up on a trigger
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    #[serde(default = "defaults::retry_interval_us")]
    pub retry_interval_us: u64,

    /// Samples requested from each capture
    #[serde(default = "defaults::capture_samples")]
    pub capture_samples: usize,

    #[serde(default)]
    pub integration_rule: IntegrationRule,

    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

mod defaults {
    use crate::acquisition::{BandEntry, BandTable};
    use crate::config::constants::*;

    pub fn sample_rate_hz() -> f64 { instrument::SAMPLE_RATE_HZ }
    pub fn buffer_capacity() -> usize { instrument::BUFFER_CAPACITY_SAMPLES }
    pub fn full_scale_codes() -> u32 { instrument::FULL_SCALE_CODES }
    pub fn min_frequency_hz() -> f64 { instrument::MIN_FREQUENCY_HZ }
    pub fn max_frequency_hz() -> f64 { instrument::MAX_FREQUENCY_HZ }
    pub fn max_amplitude_vpp() -> f64 { instrument::MAX_AMPLITUDE_VPP }

    pub fn max_retries() -> u32 { acquisition::DEFAULT_MAX_RETRIES }
    pub fn retry_interval_us() -> u64 { acquisition::DEFAULT_RETRY_INTERVAL_US }
    pub fn capture_samples() -> usize { instrument::BUFFER_CAPACITY_SAMPLES }

    pub fn bands() -> Vec<BandEntry> {
        BandTable::default().entries().to_vec()
    }
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: defaults::sample_rate_hz(),
            buffer_capacity: defaults::buffer_capacity(),
            full_scale_codes: defaults::full_scale_codes(),
            min_frequency_hz: defaults::min_frequency_hz(),
            max_frequency_hz: defaults::max_frequency_hz(),
            max_amplitude_vpp: defaults::max_amplitude_vpp(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::max_retries(),
            retry_interval_us: defaults::retry_interval_us(),
            capture_samples: defaults::capture_samples(),
            integration_rule: IntegrationRule::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instrument: InstrumentConfig::default(),
            sweep: SweepConfig::default(),
            acquisition: AcquisitionConfig::default(),
            bands: defaults::bands(),
        }
    }
}

impl InstrumentConfig {
    pub fn validate(&self) -> LcrResult<()> {
        if !(self.sample_rate_hz > 0.0) || !self.sample_rate_hz.is_finite() {
            return Err(LcrError::invalid_parameter(
                "sample_rate_hz",
                self.sample_rate_hz,
                "must be a positive finite rate",
            ));
        }
        if self.buffer_capacity < 2 {
            return Err(LcrError::invalid_parameter(
                "buffer_capacity",
                self.buffer_capacity,
                "must hold at least two samples",
            ));
        }
        if self.full_scale_codes == 0 {
            return Err(LcrError::invalid_parameter(
                "full_scale_codes",
                self.full_scale_codes,
                "must be non-zero",
            ));
        }
        if !(self.min_frequency_hz > 0.0) || !(self.max_frequency_hz > self.min_frequency_hz) {
            return Err(LcrError::invalid_parameter(
                "max_frequency_hz",
                self.max_frequency_hz,
                format!("must exceed the minimum frequency {} Hz", self.min_frequency_hz),
            ));
        }
        if !(self.max_amplitude_vpp > 0.0) {
            return Err(LcrError::invalid_parameter(
                "max_amplitude_vpp",
                self.max_amplitude_vpp,
                "must be positive",
            ));
        }
        Ok(())
    }
}

impl AcquisitionConfig {
    pub fn validate(&self, instrument: &InstrumentConfig) -> LcrResult<()> {
        if self.capture_samples < 2 || self.capture_samples > instrument.buffer_capacity {
            return Err(LcrError::invalid_parameter(
                "capture_samples",
                self.capture_samples,
                format!("must be within [2, {}]", instrument.buffer_capacity),
            ));
        }
        if let FailurePolicy::RetryIteration { max_attempts: 0 } = self.failure_policy {
            return Err(LcrError::invalid_parameter(
                "failure_policy.max_attempts",
                0,
                "retrying an iteration needs at least one attempt",
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            interval: Duration::from_micros(self.retry_interval_us),
        }
    }

    pub fn retry(&self) -> AcquisitionRetry {
        AcquisitionRetry::new(self.retry_policy())
    }
}

impl EngineConfig {
    /// Clamp soft limits and validate every section
    pub fn normalized(mut self) -> LcrResult<Self> {
        self.instrument.validate()?;
        self.sweep = self.sweep.normalized(&self.instrument)?;
        self.validate()?;
        Ok(self)
    }

    /// Validate every section without modifying anything
    pub fn validate(&self) -> LcrResult<()> {
        self.instrument.validate()?;
        self.sweep.validate(&self.instrument)?;
        self.acquisition.validate(&self.instrument)?;
        self.band_table()?;
        Ok(())
    }

    pub fn band_table(&self) -> LcrResult<BandTable> {
        BandTable::new(self.bands.clone())
    }

    /// One-line description for logs
    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            start_frequency_hz: self.sweep.start_frequency_hz,
            end_frequency_hz: self.sweep.end_frequency_hz,
            frequency_points: self.sweep.frequency_points().len(),
            mode: self.sweep.mode,
            averaging_num: self.sweep.averaging_num,
            repeats_per_point: self.sweep.repeats_per_point(),
            integration_rule: self.acquisition.integration_rule,
            failure_policy: self.acquisition.failure_policy,
        }
    }
}

/// Configuration summary for logging
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub start_frequency_hz: f64,
    pub end_frequency_hz: f64,
    pub frequency_points: usize,
    pub mode: MeasurementMode,
    pub averaging_num: u32,
    pub repeats_per_point: u32,
    pub integration_rule: IntegrationRule,
    pub failure_policy: FailurePolicy,
}
