// src/processing/impedance.rs
//! Amplitude, phase and complex impedance from demodulated integrals

use crate::config::constants::numeric;
use crate::error::{LcrError, LcrResult};
use crate::processing::lockin::Demodulated;
use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Wrap an angle in degrees into (−180°, 180°]
pub fn wrap_phase_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Amplitude and phase of one demodulated quantity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Phasor {
    pub amplitude: f64,
    /// Radians
    pub phase: f64,
}

/// Impedance of a single measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpedanceEstimate {
    pub voltage: Phasor,
    pub current: Phasor,
    /// `|Z| = |V| / |I|`
    pub magnitude: f64,
    /// `∠V − ∠I` in degrees, wrapped into (−180°, 180°]
    pub phase_degrees: f64,
    pub real: f64,
    pub imag: f64,
}

impl ImpedanceEstimate {
    pub fn impedance(&self) -> Complex64 {
        Complex64::new(self.real, self.imag)
    }
}

/// Turns voltage/current integral pairs into an impedance
#[derive(Debug, Clone, Copy)]
pub struct ImpedanceAssembler {
    min_current_amplitude: f64,
}

impl Default for ImpedanceAssembler {
    fn default() -> Self {
        Self {
            min_current_amplitude: numeric::DEGENERATE_AMPLITUDE_EPSILON,
        }
    }
}

impl ImpedanceAssembler {
    /// Assembler treating current amplitudes at or below `min_current_amplitude` as zero
    pub fn new(min_current_amplitude: f64) -> Self {
        Self {
            min_current_amplitude,
        }
    }

    /// Raise the current threshold to at least `floor`
    pub fn with_current_floor(self, floor: f64) -> Self {
        Self {
            min_current_amplitude: self.min_current_amplitude.max(floor),
        }
    }

    pub fn min_current_amplitude(&self) -> f64 {
        self.min_current_amplitude
    }

    pub fn assemble(&self, demodulated: &Demodulated) -> LcrResult<ImpedanceEstimate> {
        let voltage = Phasor {
            amplitude: demodulated.voltage.amplitude(),
            phase: demodulated.voltage.phase(),
        };
        let current = Phasor {
            amplitude: demodulated.current.amplitude(),
            phase: demodulated.current.phase(),
        };

        if !voltage.amplitude.is_finite() || !current.amplitude.is_finite() {
            return Err(LcrError::DegenerateMeasurement {
                reason: "non-finite demodulated amplitude".to_string(),
            });
        }
        if current.amplitude <= self.min_current_amplitude {
            return Err(LcrError::DegenerateMeasurement {
                reason: format!("current amplitude {:e} is effectively zero", current.amplitude),
            });
        }

        let magnitude = voltage.amplitude / current.amplitude;
        let phase_degrees = wrap_phase_degrees((voltage.phase - current.phase).to_degrees());
        let phase = phase_degrees.to_radians();

        Ok(ImpedanceEstimate {
            voltage,
            current,
            magnitude,
            phase_degrees,
            real: magnitude * phase.cos(),
            imag: magnitude * phase.sin(),
        })
    }
}
