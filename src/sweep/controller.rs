// src/sweep/controller.rs
//! Frequency sweep, calibration repeats and averaging
//!
//! The controller walks three nested loops: frequency points, repeats per
//! point, and averaging iterations per repeat. Each averaging iteration runs
//! one acquisition through conditioning, demodulation and impedance assembly.
//! The averaged records are appended to a [`SweepResult`] the controller owns.

use crate::acquisition::{AcquisitionRetry, AcquisitionWindow, BandTable};
use crate::config::{EngineConfig, FailurePolicy};
use crate::error::{LcrError, LcrResult, MeasurementPoint};
use crate::hal::Instrument;
use crate::config::constants::numeric;
use crate::processing::{
    ImpedanceAssembler, ImpedanceEstimate, LockInDemodulator, SignalConditioner,
};
use crate::sweep::record::{AveragedRecord, ImpedanceSample, SweepGap, SweepResult};
use tracing::{debug, info, warn};

/// Answer to "is the short-circuit reference connected?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationConfirmation {
    Confirmed,
    Declined,
    /// Anything that is neither a yes nor a no
    Invalid,
}

impl CalibrationConfirmation {
    /// Interpret a typed response: `y`/`Y` confirms, `n`/`N` declines
    pub fn parse(response: &str) -> Self {
        match response.trim() {
            "y" | "Y" => CalibrationConfirmation::Confirmed,
            "n" | "N" => CalibrationConfirmation::Declined,
            _ => CalibrationConfirmation::Invalid,
        }
    }

    /// Pass the gate or fail with `CalibrationAborted`
    pub fn require(self) -> LcrResult<()> {
        match self {
            CalibrationConfirmation::Confirmed => Ok(()),
            CalibrationConfirmation::Declined => Err(LcrError::CalibrationAborted {
                reason: "short-circuit confirmation declined".to_string(),
            }),
            CalibrationConfirmation::Invalid => Err(LcrError::CalibrationAborted {
                reason: "invalid confirmation response".to_string(),
            }),
        }
    }
}

impl From<bool> for CalibrationConfirmation {
    fn from(confirmed: bool) -> Self {
        if confirmed {
            CalibrationConfirmation::Confirmed
        } else {
            CalibrationConfirmation::Declined
        }
    }
}

/// Sweep/average controller over an instrument
pub struct SweepController<I: Instrument> {
    config: EngineConfig,
    instrument: I,
    bands: BandTable,
    retry: AcquisitionRetry,
    conditioner: SignalConditioner,
    demodulator: LockInDemodulator,
    assembler: ImpedanceAssembler,
    result: SweepResult,
}

impl<I: Instrument> SweepController<I> {
    /// Normalize and validate `config`, then build the processing chain
    pub fn new(config: EngineConfig, instrument: I) -> LcrResult<Self> {
        let config = config.normalized()?;
        let bands = config.band_table()?;
        let conditioner = SignalConditioner::with_full_scale(
            config.sweep.shunt_resistance_ohms,
            config.sweep.dc_bias_v,
            config.instrument.full_scale_codes,
        )?;

        Ok(Self {
            retry: config.acquisition.retry(),
            demodulator: LockInDemodulator::new(config.acquisition.integration_rule),
            assembler: ImpedanceAssembler::default(),
            bands,
            conditioner,
            instrument,
            config,
            result: SweepResult::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn instrument(&self) -> &I {
        &self.instrument
    }

    pub fn instrument_mut(&mut self) -> &mut I {
        &mut self.instrument
    }

    pub fn into_instrument(self) -> I {
        self.instrument
    }

    /// Records and gaps of the latest run, including a run that aborted
    pub fn result(&self) -> &SweepResult {
        &self.result
    }

    pub fn into_result(self) -> SweepResult {
        self.result
    }

    /// Run a full sweep once the short-circuit gate is confirmed
    ///
    /// A declined or invalid confirmation aborts before the instrument is
    /// touched. Results of any previous run are discarded.
    pub fn run(&mut self, confirmation: CalibrationConfirmation) -> LcrResult<&SweepResult> {
        self.result.clear();
        confirmation.require()?;

        let points = self.config.sweep.frequency_points();
        info!(
            points = points.len(),
            mode = ?self.config.sweep.mode,
            averaging_num = self.config.sweep.averaging_num,
            repeats = self.config.sweep.repeats_per_point(),
            "sweep started"
        );

        for (sweep_index, &frequency_hz) in points.iter().enumerate() {
            self.measure_frequency(sweep_index, frequency_hz)?;
        }

        info!(
            records = self.result.len(),
            gaps = self.result.gaps().len(),
            "sweep finished"
        );
        Ok(&self.result)
    }

    fn measure_frequency(&mut self, sweep_index: usize, frequency_hz: f64) -> LcrResult<()> {
        let first = MeasurementPoint {
            sweep_index,
            frequency_hz,
            repeat: 0,
            average: 0,
        };

        let window = self
            .bands
            .window(
                frequency_hz,
                self.config.sweep.min_periods,
                self.config.instrument.sample_rate_hz,
            )
            .map_err(|e| e.at(first))?;
        let capture_samples = self.config.acquisition.capture_samples;
        if window.sample_count > capture_samples {
            let periods = window.periods_spanned(capture_samples);
            if periods < 1.0 {
                return Err(LcrError::invalid_parameter(
                    "capture_samples",
                    capture_samples,
                    format!(
                        "covers {:.2} periods at {} Hz, at least one is needed",
                        periods, frequency_hz
                    ),
                )
                .at(first));
            }
            warn!(
                frequency_hz,
                needed = window.sample_count,
                captured = capture_samples,
                periods,
                "window longer than the capture, integrating over the captured part"
            );
        }

        self.instrument
            .start_excitation(frequency_hz, self.config.sweep.amplitude_vpp)
            .map_err(|e| LcrError::from(e).at(first))?;

        info!(
            sweep_index,
            frequency_hz,
            decimation = window.decimation,
            "measuring frequency point"
        );

        for repeat in 0..self.config.sweep.repeats_per_point() {
            match self.measure_repeat(sweep_index, &window, repeat) {
                Ok(record) => {
                    debug!(
                        frequency_hz,
                        repeat,
                        real = record.real,
                        imag = record.imag,
                        "averaged record"
                    );
                    self.result.push(record);
                }
                Err(error) if self.skips(&error) => {
                    let point = error
                        .point()
                        .copied()
                        .unwrap_or(MeasurementPoint { repeat, ..first });
                    warn!(%point, error = %error.root(), "measurement failed, repeat skipped");
                    self.result.push_gap(SweepGap { point, error });
                }
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }

    fn skips(&self, error: &LcrError) -> bool {
        error.is_per_measurement()
            && self.config.acquisition.failure_policy != FailurePolicy::AbortSweep
    }

    fn measure_repeat(
        &mut self,
        sweep_index: usize,
        window: &AcquisitionWindow,
        repeat: u32,
    ) -> LcrResult<AveragedRecord> {
        let averaging_num = self.config.sweep.averaging_num;
        let mut samples = Vec::with_capacity(averaging_num as usize);

        for average in 0..averaging_num {
            let point = MeasurementPoint {
                sweep_index,
                frequency_hz: window.frequency_hz,
                repeat,
                average,
            };
            let estimate = self.measure_iteration(window, point)?;
            samples.push(ImpedanceSample::from_estimate(point, &estimate));
        }

        AveragedRecord::from_samples(&samples).ok_or_else(|| LcrError::DegenerateMeasurement {
            reason: "no samples to average".to_string(),
        })
    }

    /// One averaging iteration, re-run per the failure policy
    fn measure_iteration(
        &mut self,
        window: &AcquisitionWindow,
        point: MeasurementPoint,
    ) -> LcrResult<ImpedanceEstimate> {
        let max_attempts = match self.config.acquisition.failure_policy {
            FailurePolicy::RetryIteration { max_attempts } => max_attempts.max(1),
            FailurePolicy::SkipPoint | FailurePolicy::AbortSweep => 1,
        };

        let mut attempt = 1;
        loop {
            match self.measure_once(window) {
                Ok(estimate) => {
                    debug!(
                        %point,
                        magnitude = estimate.magnitude,
                        phase_degrees = estimate.phase_degrees,
                        "impedance sample"
                    );
                    return Ok(estimate);
                }
                Err(error) if error.is_per_measurement() && attempt < max_attempts => {
                    warn!(%point, attempt, %error, "iteration failed, retrying");
                    attempt += 1;
                }
                Err(error) => return Err(error.at(point)),
            }
        }
    }

    fn measure_once(&mut self, window: &AcquisitionWindow) -> LcrResult<ImpedanceEstimate> {
        let raw = self.retry.acquire(
            &mut self.instrument,
            window,
            self.config.acquisition.capture_samples,
        )?;
        let trace = self.conditioner.condition(&raw)?;
        debug!(
            samples = trace.len(),
            peak_voltage = trace.peak_voltage(),
            peak_current = trace.peak_current(),
            "capture conditioned"
        );
        let omega = window.angular_frequency();
        let demodulated = self.demodulator.demodulate(&trace, window, omega)?;

        // Current amplitude of one shunt-channel code in integral units
        let usable = LockInDemodulator::usable_len(&trace, window);
        let current_floor = numeric::CURRENT_FLOOR_CODES
            * self.conditioner.current_resolution_amps()
            * self.demodulator.unit_response(window, usable, omega);
        self.assembler
            .with_current_floor(current_floor)
            .assemble(&demodulated)
    }
}
