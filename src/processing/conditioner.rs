// src/processing/conditioner.rs
//! Conversion of raw ADC codes into load voltage and load current

use crate::config::constants::instrument;
use crate::error::{LcrError, LcrResult};
use crate::hal::RawCapture;
use ndarray::Array1;

/// Calibrated traces derived from one capture
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionedTrace {
    /// Excitation-side channel in volts
    pub channel_a: Array1<f64>,
    /// Shunt-side channel in volts
    pub channel_b: Array1<f64>,
    /// Voltage across the device under test
    pub load_voltage: Array1<f64>,
    /// Current through the device under test
    pub load_current: Array1<f64>,
}

impl ConditionedTrace {
    pub fn len(&self) -> usize {
        self.load_voltage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.load_voltage.is_empty()
    }

    /// Largest load voltage sample
    pub fn peak_voltage(&self) -> f64 {
        self.load_voltage.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v))
    }

    /// Largest load current sample
    pub fn peak_current(&self) -> f64 {
        self.load_current.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v))
    }
}

/// Raw-to-physical conversion for the two-channel shunt topology
#[derive(Debug, Clone, PartialEq)]
pub struct SignalConditioner {
    shunt_resistance_ohms: f64,
    dc_bias_v: f64,
    full_scale_codes: u32,
}

impl SignalConditioner {
    pub fn new(shunt_resistance_ohms: f64, dc_bias_v: f64) -> LcrResult<Self> {
        Self::with_full_scale(shunt_resistance_ohms, dc_bias_v, instrument::FULL_SCALE_CODES)
    }

    pub fn with_full_scale(
        shunt_resistance_ohms: f64,
        dc_bias_v: f64,
        full_scale_codes: u32,
    ) -> LcrResult<Self> {
        if !(shunt_resistance_ohms > 0.0) || !shunt_resistance_ohms.is_finite() {
            return Err(LcrError::invalid_parameter(
                "shunt_resistance_ohms",
                shunt_resistance_ohms,
                "must be a positive finite resistance",
            ));
        }
        if full_scale_codes == 0 {
            return Err(LcrError::invalid_parameter(
                "full_scale_codes",
                full_scale_codes,
                "must be non-zero",
            ));
        }
        Ok(Self {
            shunt_resistance_ohms,
            dc_bias_v,
            full_scale_codes,
        })
    }

    /// Volts represented by a raw code
    pub fn code_to_volts(&self, code: i32) -> f64 {
        // Multiply before dividing to keep precision
        (code as f64 * (2.0 - self.dc_bias_v)) / self.full_scale_codes as f64
    }

    /// Load current represented by one code on the shunt channel
    pub fn current_resolution_amps(&self) -> f64 {
        self.code_to_volts(1) / self.shunt_resistance_ohms
    }

    /// Convert a capture into load voltage and current traces
    pub fn condition(&self, raw: &RawCapture) -> LcrResult<ConditionedTrace> {
        let (len_a, len_b) = raw.captured_lengths();
        if len_a != len_b {
            return Err(LcrError::MalformedCapture {
                channel_a: len_a,
                channel_b: len_b,
            });
        }

        let channel_a: Array1<f64> =
            raw.channel_a().iter().map(|&c| self.code_to_volts(c)).collect();
        let channel_b: Array1<f64> =
            raw.channel_b().iter().map(|&c| self.code_to_volts(c)).collect();

        let load_voltage = &channel_a - &channel_b;
        let load_current = &channel_b / self.shunt_resistance_ohms;

        Ok(ConditionedTrace {
            channel_a,
            channel_b,
            load_voltage,
            load_current,
        })
    }
}
