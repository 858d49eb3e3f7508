// src/config/sweep_config.rs
//! Sweep parameters and the frequency plan derived from them

use crate::config::constants::{numeric, sweep};
use crate::config::InstrumentConfig;
use crate::error::{LcrError, LcrResult};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// What the sweep is measuring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementMode {
    /// One averaged record per frequency point
    Measurement,
    /// `calibration_repeats` averaged records per frequency point
    Calibration,
}

/// How the controller reacts to a timed-out or degenerate measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Drop the current repeat, record a gap, continue with the next one
    SkipPoint,
    /// Re-run the failed averaging iteration, then fall back to a gap
    RetryIteration { max_attempts: u32 },
    /// Stop the sweep and return the error
    AbortSweep,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::SkipPoint
    }
}

/// Sweep configuration, fixed for the duration of a sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "defaults::start_frequency_hz")]
    pub start_frequency_hz: f64,

    #[serde(default = "defaults::end_frequency_hz")]
    pub end_frequency_hz: f64,

    #[serde(default = "defaults::frequency_step_hz")]
    pub frequency_step_hz: f64,

    #[serde(default = "defaults::amplitude_vpp")]
    pub amplitude_vpp: f64,

    /// Measurements averaged into each record
    #[serde(default = "defaults::averaging_num")]
    pub averaging_num: u32,

    #[serde(default = "defaults::calibration_repeats")]
    pub calibration_repeats: u32,

    #[serde(default = "defaults::mode")]
    pub mode: MeasurementMode,

    /// Signal periods covered by each acquisition window
    #[serde(default = "defaults::min_periods")]
    pub min_periods: u32,

    #[serde(default = "defaults::shunt_resistance_ohms")]
    pub shunt_resistance_ohms: f64,

    #[serde(default = "defaults::dc_bias_v")]
    pub dc_bias_v: f64,
}

mod defaults {
    use super::MeasurementMode;
    use crate::config::constants::sweep::*;

    pub fn start_frequency_hz() -> f64 { DEFAULT_START_FREQUENCY_HZ }
    pub fn end_frequency_hz() -> f64 { DEFAULT_END_FREQUENCY_HZ }
    pub fn frequency_step_hz() -> f64 { DEFAULT_FREQUENCY_STEP_HZ }
    pub fn amplitude_vpp() -> f64 { DEFAULT_AMPLITUDE_VPP }
    pub fn averaging_num() -> u32 { DEFAULT_AVERAGING_NUM }
    pub fn calibration_repeats() -> u32 { DEFAULT_CALIBRATION_REPEATS }
    pub fn mode() -> MeasurementMode { MeasurementMode::Measurement }
    pub fn min_periods() -> u32 { DEFAULT_MIN_PERIODS }
    pub fn shunt_resistance_ohms() -> f64 { DEFAULT_SHUNT_RESISTANCE_OHMS }
    pub fn dc_bias_v() -> f64 { DEFAULT_DC_BIAS_V }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            start_frequency_hz: defaults::start_frequency_hz(),
            end_frequency_hz: defaults::end_frequency_hz(),
            frequency_step_hz: defaults::frequency_step_hz(),
            amplitude_vpp: defaults::amplitude_vpp(),
            averaging_num: defaults::averaging_num(),
            calibration_repeats: defaults::calibration_repeats(),
            mode: defaults::mode(),
            min_periods: defaults::min_periods(),
            shunt_resistance_ohms: defaults::shunt_resistance_ohms(),
            dc_bias_v: defaults::dc_bias_v(),
        }
    }
}

impl SweepConfig {
    /// Clamp soft limits and reject values the instrument cannot honour
    ///
    /// An end frequency above the instrument maximum is lowered to the
    /// maximum and more than the allowed calibration repeats are capped,
    /// both with a warning. Everything else out of range is an error.
    pub fn normalized(mut self, instrument: &InstrumentConfig) -> LcrResult<Self> {
        if self.end_frequency_hz > instrument.max_frequency_hz {
            warn!(
                requested = self.end_frequency_hz,
                max = instrument.max_frequency_hz,
                "end frequency too high, clamped to instrument maximum"
            );
            self.end_frequency_hz = instrument.max_frequency_hz;
        }
        if self.calibration_repeats > sweep::MAX_CALIBRATION_REPEATS {
            warn!(
                requested = self.calibration_repeats,
                max = sweep::MAX_CALIBRATION_REPEATS,
                "too many calibration repeats, clamped"
            );
            self.calibration_repeats = sweep::MAX_CALIBRATION_REPEATS;
        }
        self.validate(instrument)?;
        Ok(self)
    }

    /// Validate against the instrument limits
    pub fn validate(&self, instrument: &InstrumentConfig) -> LcrResult<()> {
        let f_range = instrument.min_frequency_hz..=instrument.max_frequency_hz;
        if !f_range.contains(&self.start_frequency_hz) {
            return Err(LcrError::invalid_parameter(
                "start_frequency_hz",
                self.start_frequency_hz,
                format!(
                    "must be within [{}, {}] Hz",
                    instrument.min_frequency_hz, instrument.max_frequency_hz
                ),
            ));
        }
        if !f_range.contains(&self.end_frequency_hz) {
            return Err(LcrError::invalid_parameter(
                "end_frequency_hz",
                self.end_frequency_hz,
                format!(
                    "must be within [{}, {}] Hz",
                    instrument.min_frequency_hz, instrument.max_frequency_hz
                ),
            ));
        }
        if self.end_frequency_hz < self.start_frequency_hz {
            return Err(LcrError::invalid_parameter(
                "end_frequency_hz",
                self.end_frequency_hz,
                "must not be below the start frequency",
            ));
        }
        if self.end_frequency_hz > self.start_frequency_hz
            && !(self.frequency_step_hz > 0.0 && self.frequency_step_hz.is_finite())
        {
            return Err(LcrError::invalid_parameter(
                "frequency_step_hz",
                self.frequency_step_hz,
                "must be positive for a frequency sweep",
            ));
        }
        let span_steps = (self.end_frequency_hz - self.start_frequency_hz) / self.frequency_step_hz;
        if self.end_frequency_hz > self.start_frequency_hz
            && !(span_steps <= sweep::MAX_FREQUENCY_POINTS as f64)
        {
            return Err(LcrError::invalid_parameter(
                "frequency_step_hz",
                self.frequency_step_hz,
                format!(
                    "plan of {:.0} points exceeds the limit of {}",
                    span_steps.ceil(),
                    sweep::MAX_FREQUENCY_POINTS
                ),
            ));
        }
        if !(0.0..=instrument.max_amplitude_vpp).contains(&self.amplitude_vpp) {
            return Err(LcrError::invalid_parameter(
                "amplitude_vpp",
                self.amplitude_vpp,
                format!("must be within [0, {}] Vpp", instrument.max_amplitude_vpp),
            ));
        }
        if self.averaging_num == 0 {
            return Err(LcrError::invalid_parameter(
                "averaging_num",
                self.averaging_num,
                "at least one measurement per record is required",
            ));
        }
        if self.mode == MeasurementMode::Calibration
            && !(1..=sweep::MAX_CALIBRATION_REPEATS).contains(&self.calibration_repeats)
        {
            return Err(LcrError::invalid_parameter(
                "calibration_repeats",
                self.calibration_repeats,
                format!("must be within [1, {}]", sweep::MAX_CALIBRATION_REPEATS),
            ));
        }
        if !(sweep::MIN_PERIODS_LOWER..=sweep::MIN_PERIODS_UPPER).contains(&self.min_periods) {
            return Err(LcrError::invalid_parameter(
                "min_periods",
                self.min_periods,
                format!(
                    "must be within [{}, {}]",
                    sweep::MIN_PERIODS_LOWER,
                    sweep::MIN_PERIODS_UPPER
                ),
            ));
        }
        if !(self.shunt_resistance_ohms > 0.0) || !self.shunt_resistance_ohms.is_finite() {
            return Err(LcrError::invalid_parameter(
                "shunt_resistance_ohms",
                self.shunt_resistance_ohms,
                "must be a positive finite resistance",
            ));
        }
        if !self.dc_bias_v.is_finite() || self.dc_bias_v >= 2.0 {
            return Err(LcrError::invalid_parameter(
                "dc_bias_v",
                self.dc_bias_v,
                "must leave a positive input range (below 2 V)",
            ));
        }
        Ok(())
    }

    /// Frequencies visited by the sweep, in order
    ///
    /// `start, start + step, …` strictly below the end frequency. Equal start
    /// and end frequencies measure that single frequency.
    pub fn frequency_points(&self) -> Vec<f64> {
        if self.end_frequency_hz <= self.start_frequency_hz {
            return vec![self.start_frequency_hz];
        }
        if !(self.frequency_step_hz > 0.0) {
            return Vec::new();
        }

        // Index-based so the step error does not accumulate
        let mut points = Vec::new();
        let mut k = 0u64;
        loop {
            let frequency = self.start_frequency_hz + k as f64 * self.frequency_step_hz;
            if frequency >= self.end_frequency_hz - numeric::FREQUENCY_MATCH_TOLERANCE_HZ {
                break;
            }
            points.push(frequency);
            k += 1;
        }
        points
    }

    /// Averaged records produced per frequency point
    pub fn repeats_per_point(&self) -> u32 {
        match self.mode {
            MeasurementMode::Measurement => 1,
            MeasurementMode::Calibration => self.calibration_repeats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instrument() -> InstrumentConfig {
        InstrumentConfig::default()
    }

    #[test]
    fn test_default_sweep_points() {
        let config = SweepConfig::default();
        let points = config.frequency_points();
        assert_eq!(points.len(), 9);
        assert_eq!(points[0], 1000.0);
        assert_eq!(points[8], 9000.0);
        assert!(config.validate(&instrument()).is_ok());
    }

    #[test]
    fn test_single_point_when_start_equals_end() {
        let config = SweepConfig {
            start_frequency_hz: 5000.0,
            end_frequency_hz: 5000.0,
            frequency_step_hz: 0.0,
            ..SweepConfig::default()
        };
        assert!(config.validate(&instrument()).is_ok());
        assert_eq!(config.frequency_points(), vec![5000.0]);
    }

    #[test]
    fn test_fractional_step_has_no_drift() {
        let config = SweepConfig {
            start_frequency_hz: 100.0,
            end_frequency_hz: 101.0,
            frequency_step_hz: 0.1,
            ..SweepConfig::default()
        };
        assert_eq!(config.frequency_points().len(), 10);
    }

    #[test]
    fn test_end_frequency_clamped() {
        let config = SweepConfig {
            end_frequency_hz: 100e6,
            ..SweepConfig::default()
        }
        .normalized(&instrument())
        .unwrap();
        assert_eq!(config.end_frequency_hz, 62.5e6);
    }

    #[test]
    fn test_calibration_repeats_clamped() {
        let config = SweepConfig {
            calibration_repeats: 25,
            mode: MeasurementMode::Calibration,
            ..SweepConfig::default()
        }
        .normalized(&instrument())
        .unwrap();
        assert_eq!(config.calibration_repeats, 10);
        assert_eq!(config.repeats_per_point(), 10);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let instrument = instrument();
        let cases = vec![
            SweepConfig { start_frequency_hz: 1.0, ..SweepConfig::default() },
            SweepConfig { start_frequency_hz: 70e6, ..SweepConfig::default() },
            SweepConfig { amplitude_vpp: 2.5, ..SweepConfig::default() },
            SweepConfig { amplitude_vpp: -0.1, ..SweepConfig::default() },
            SweepConfig { averaging_num: 0, ..SweepConfig::default() },
            SweepConfig { min_periods: 21, ..SweepConfig::default() },
            SweepConfig { min_periods: 0, ..SweepConfig::default() },
            SweepConfig { shunt_resistance_ohms: 0.0, ..SweepConfig::default() },
            SweepConfig { frequency_step_hz: 0.0, ..SweepConfig::default() },
            SweepConfig { end_frequency_hz: 500.0, ..SweepConfig::default() },
            SweepConfig { dc_bias_v: 2.0, ..SweepConfig::default() },
            SweepConfig {
                start_frequency_hz: 2.5,
                end_frequency_hz: 62.5e6,
                frequency_step_hz: 1e-6,
                ..SweepConfig::default()
            },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(&instrument), Err(LcrError::InvalidParameter { .. })),
                "accepted {:?}",
                config
            );
        }
    }

    #[test]
    fn test_plan_size_limit() {
        let instrument = instrument();
        let at_limit = SweepConfig {
            start_frequency_hz: 10.0,
            end_frequency_hz: 10.0 + sweep::MAX_FREQUENCY_POINTS as f64,
            frequency_step_hz: 1.0,
            ..SweepConfig::default()
        };
        assert!(at_limit.validate(&instrument).is_ok());
        assert_eq!(at_limit.frequency_points().len(), sweep::MAX_FREQUENCY_POINTS);

        let over_limit = SweepConfig {
            frequency_step_hz: 0.5,
            ..at_limit
        };
        assert!(matches!(
            over_limit.normalized(&instrument),
            Err(LcrError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_repeats_per_point() {
        let mut config = SweepConfig::default();
        assert_eq!(config.repeats_per_point(), 1);
        config.mode = MeasurementMode::Calibration;
        assert_eq!(config.repeats_per_point(), config.calibration_repeats);
    }

    #[test]
    fn test_failure_policy_serialization() {
        let policy = FailurePolicy::RetryIteration { max_attempts: 3 };
        let text = toml::to_string(&policy).unwrap();
        let back: FailurePolicy = toml::from_str(&text).unwrap();
        assert_eq!(policy, back);
    }
}
