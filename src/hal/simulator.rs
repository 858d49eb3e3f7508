// src/hal/simulator.rs
//! Simulated instrument driving a modelled device under test
//!
//! The generator output is wired to channel A, the DUT sits between channel A
//! and channel B, and the shunt resistor connects channel B to ground:
//!
//! ```text
//!   generator ──┬── DUT ──┬── R_shunt ── GND
//!               │         │
//!             ADC1      ADC2
//! ```
//!
//! Captures are synthesized from the closed-form steady-state response of
//! that divider, quantized to ADC codes, with optional seeded noise.

use crate::config::constants::{bands, instrument, sweep};
use crate::error::{LcrError, LcrResult};
use crate::hal::{
    AcquisitionDevice, AcquisitionPoll, DeviceError, DeviceInfo, ExcitationSource, RawCapture,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::trace;

/// Device under test connected to the simulated instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadModel {
    Short,
    Open,
    Resistor { ohms: f64 },
    SeriesRc { ohms: f64, farads: f64 },
    SeriesRl { ohms: f64, henries: f64 },
    ParallelRc { ohms: f64, farads: f64 },
}

impl LoadModel {
    /// Complex impedance at `frequency_hz`; `None` for an open circuit
    pub fn impedance(&self, frequency_hz: f64) -> Option<Complex64> {
        let omega = 2.0 * PI * frequency_hz;
        match *self {
            LoadModel::Short => Some(Complex64::new(0.0, 0.0)),
            LoadModel::Open => None,
            LoadModel::Resistor { ohms } => Some(Complex64::new(ohms, 0.0)),
            LoadModel::SeriesRc { ohms, farads } => {
                Some(Complex64::new(ohms, -1.0 / (omega * farads)))
            }
            LoadModel::SeriesRl { ohms, henries } => Some(Complex64::new(ohms, omega * henries)),
            LoadModel::ParallelRc { ohms, farads } => {
                let admittance = Complex64::new(1.0 / ohms, omega * farads);
                Some(admittance.inv())
            }
        }
    }
}

/// Simulated instrument configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub sample_rate_hz: f64,
    pub buffer_capacity: usize,
    pub full_scale_codes: u32,
    pub shunt_resistance_ohms: f64,
    pub load: LoadModel,
    /// Peak uniform noise added to every sample, in ADC codes
    pub noise_codes: f64,
    /// `NotTriggered` answers returned before each capture
    pub trigger_latency_polls: u32,
    /// Start each capture at a random excitation phase
    pub random_start_phase: bool,
    pub seed: u64,
    /// Fault injection: the trigger never fires
    pub never_trigger: bool,
    /// Fault injection: channel B comes back one sample short
    pub malformed_capture: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: instrument::SAMPLE_RATE_HZ,
            buffer_capacity: instrument::BUFFER_CAPACITY_SAMPLES,
            full_scale_codes: instrument::FULL_SCALE_CODES,
            shunt_resistance_ohms: sweep::DEFAULT_SHUNT_RESISTANCE_OHMS,
            load: LoadModel::Resistor { ohms: 1000.0 },
            noise_codes: 0.0,
            trigger_latency_polls: 0,
            random_start_phase: true,
            seed: 0x5EED,
            never_trigger: false,
            malformed_capture: false,
        }
    }
}

impl SimulatorConfig {
    /// Validate configuration
    pub fn validate(&self) -> LcrResult<()> {
        if !(self.sample_rate_hz > 0.0) {
            return Err(LcrError::invalid_parameter(
                "sample_rate_hz",
                self.sample_rate_hz,
                "must be positive",
            ));
        }
        if self.buffer_capacity < 2 {
            return Err(LcrError::invalid_parameter(
                "buffer_capacity",
                self.buffer_capacity,
                "must hold at least two samples",
            ));
        }
        if self.full_scale_codes < 2 {
            return Err(LcrError::invalid_parameter(
                "full_scale_codes",
                self.full_scale_codes,
                "must be at least 2",
            ));
        }
        if !(self.shunt_resistance_ohms > 0.0) {
            return Err(LcrError::invalid_parameter(
                "shunt_resistance_ohms",
                self.shunt_resistance_ohms,
                "must be positive",
            ));
        }
        if self.noise_codes < 0.0 || !self.noise_codes.is_finite() {
            return Err(LcrError::invalid_parameter(
                "noise_codes",
                self.noise_codes,
                "must be a finite non-negative number",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Excitation {
    frequency_hz: f64,
    amplitude_vpp: f64,
}

/// Simulated LCR instrument implementing both collaborator contracts
pub struct SimulatedInstrument {
    config: SimulatorConfig,
    excitation: Option<Excitation>,
    excitation_history: Vec<(f64, f64)>,
    pending_polls: u32,
    poll_count: u64,
    capture_count: u64,
    rng: StdRng,
}

impl SimulatedInstrument {
    /// Create new simulator with configuration validation
    pub fn new(config: SimulatorConfig) -> LcrResult<Self> {
        config.validate()?;
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            pending_polls: config.trigger_latency_polls,
            config,
            excitation: None,
            excitation_history: Vec::new(),
            poll_count: 0,
            capture_count: 0,
            rng,
        })
    }

    /// Simulator measuring `load` with otherwise default settings
    pub fn with_load(load: LoadModel) -> LcrResult<Self> {
        Self::new(SimulatorConfig {
            load,
            ..SimulatorConfig::default()
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Every `(frequency, amplitude)` excitation requested so far
    pub fn excitation_history(&self) -> &[(f64, f64)] {
        &self.excitation_history
    }

    /// Total `try_acquire` calls
    pub fn poll_count(&self) -> u64 {
        self.poll_count
    }

    /// Captures actually delivered
    pub fn capture_count(&self) -> u64 {
        self.capture_count
    }

    fn synthesize(&mut self, excitation: Excitation, decimation: u32) -> RawCapture {
        let len = self.config.buffer_capacity;
        let omega = 2.0 * PI * excitation.frequency_hz;
        let sample_period = decimation as f64 / self.config.sample_rate_hz;
        let peak = excitation.amplitude_vpp / 2.0;

        // Divider gain from generator to the shunt node
        let rs = self.config.shunt_resistance_ohms;
        let gain = match self.config.load.impedance(excitation.frequency_hz) {
            Some(z) => Complex64::new(rs, 0.0) / (z + rs),
            None => Complex64::new(0.0, 0.0),
        };

        let start_phase = if self.config.random_start_phase {
            self.rng.gen_range(0.0..2.0 * PI)
        } else {
            0.0
        };

        let codes_per_volt = self.config.full_scale_codes as f64 / 2.0;
        let half_scale = (self.config.full_scale_codes / 2) as f64;

        let mut channel_a = Vec::with_capacity(len);
        let mut channel_b = Vec::with_capacity(len);
        for k in 0..len {
            let phase = omega * k as f64 * sample_period + start_phase;
            let va = peak * phase.sin();
            let vb = peak * gain.norm() * (phase + gain.arg()).sin();
            channel_a.push(self.quantize(va * codes_per_volt, half_scale));
            channel_b.push(self.quantize(vb * codes_per_volt, half_scale));
        }

        if self.config.malformed_capture {
            channel_b.pop();
        }

        RawCapture::new(channel_a, channel_b)
    }

    fn quantize(&mut self, codes: f64, half_scale: f64) -> i32 {
        let noisy = if self.config.noise_codes > 0.0 {
            let n = self.config.noise_codes;
            codes + self.rng.gen_range(-n..=n)
        } else {
            codes
        };
        noisy.round().clamp(-half_scale, half_scale - 1.0) as i32
    }
}

impl ExcitationSource for SimulatedInstrument {
    fn start_excitation(
        &mut self,
        frequency_hz: f64,
        amplitude_vpp: f64,
    ) -> Result<(), DeviceError> {
        if !(frequency_hz > 0.0 && frequency_hz <= instrument::MAX_FREQUENCY_HZ) {
            return Err(DeviceError::ExcitationRejected(format!(
                "frequency {} Hz out of range",
                frequency_hz
            )));
        }
        if !(0.0..=instrument::MAX_AMPLITUDE_VPP).contains(&amplitude_vpp) {
            return Err(DeviceError::ExcitationRejected(format!(
                "amplitude {} Vpp out of range",
                amplitude_vpp
            )));
        }

        self.excitation = Some(Excitation {
            frequency_hz,
            amplitude_vpp,
        });
        self.excitation_history.push((frequency_hz, amplitude_vpp));
        self.pending_polls = self.config.trigger_latency_polls;
        Ok(())
    }
}

impl AcquisitionDevice for SimulatedInstrument {
    fn try_acquire(&mut self, decimation: u32) -> Result<AcquisitionPoll, DeviceError> {
        self.poll_count += 1;

        if !bands::DECIMATIONS.contains(&decimation) {
            return Err(DeviceError::UnsupportedDecimation(decimation));
        }
        let excitation = self.excitation.ok_or(DeviceError::NotExcited)?;

        if self.config.never_trigger || self.pending_polls > 0 {
            self.pending_polls = self.pending_polls.saturating_sub(1);
            trace!(poll = self.poll_count, "simulated trigger not armed");
            return Ok(AcquisitionPoll::NotTriggered);
        }

        let capture = self.synthesize(excitation, decimation);
        self.capture_count += 1;
        self.pending_polls = self.config.trigger_latency_polls;
        Ok(AcquisitionPoll::Captured(capture))
    }

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "LCR Simulator".to_string(),
            version: crate::VERSION.to_string(),
            serial_number: format!("SIM-{:08X}", self.config.seed as u32),
            sample_rate_hz: self.config.sample_rate_hz,
            buffer_capacity: self.config.buffer_capacity,
            adc_resolution_bits: instrument::ADC_RESOLUTION_BITS,
        }
    }
}
