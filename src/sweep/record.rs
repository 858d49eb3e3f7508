// src/sweep/record.rs
//! Per-measurement samples, averaged records and the sweep result

use crate::config::constants::numeric;
use crate::error::{LcrError, MeasurementPoint};
use crate::processing::{wrap_phase_degrees, ImpedanceEstimate, Phasor};
use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// One impedance measurement inside an averaging group
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpedanceSample {
    pub point: MeasurementPoint,
    pub voltage: Phasor,
    pub current: Phasor,
    pub real: f64,
    pub imag: f64,
}

impl ImpedanceSample {
    pub fn from_estimate(point: MeasurementPoint, estimate: &ImpedanceEstimate) -> Self {
        Self {
            point,
            voltage: estimate.voltage,
            current: estimate.current,
            real: estimate.real,
            imag: estimate.imag,
        }
    }

    pub fn frequency_hz(&self) -> f64 {
        self.point.frequency_hz
    }
}

/// Mean of one averaging group
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AveragedRecord {
    /// Index of the frequency point within the sweep plan
    pub sweep_index: usize,
    pub frequency_hz: f64,
    /// Repeat index at this frequency, zero outside calibration
    pub repeat: u32,
    pub real: f64,
    pub imag: f64,
    /// Samples that went into the mean
    pub samples: u32,
}

impl AveragedRecord {
    /// Componentwise mean of `samples`; `None` when empty
    ///
    /// Frequency, sweep index and repeat are taken from the first sample.
    pub fn from_samples(samples: &[ImpedanceSample]) -> Option<Self> {
        let first = samples.first()?;
        let n = samples.len() as f64;
        let (real, imag) = samples
            .iter()
            .fold((0.0, 0.0), |(re, im), s| (re + s.real, im + s.imag));
        Some(Self {
            sweep_index: first.point.sweep_index,
            frequency_hz: first.point.frequency_hz,
            repeat: first.point.repeat,
            real: real / n,
            imag: imag / n,
            samples: samples.len() as u32,
        })
    }

    pub fn impedance(&self) -> Complex64 {
        Complex64::new(self.real, self.imag)
    }

    pub fn magnitude(&self) -> f64 {
        self.real.hypot(self.imag)
    }

    /// Phase in degrees, wrapped into (−180°, 180°]
    pub fn phase_degrees(&self) -> f64 {
        wrap_phase_degrees(self.imag.atan2(self.real).to_degrees())
    }
}

/// A repeat abandoned because a measurement failed
#[derive(Debug)]
pub struct SweepGap {
    pub point: MeasurementPoint,
    pub error: LcrError,
}

/// Everything a sweep produced, in production order
#[derive(Debug, Default)]
pub struct SweepResult {
    records: Vec<AveragedRecord>,
    gaps: Vec<SweepGap>,
}

impl SweepResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: AveragedRecord) {
        self.records.push(record);
    }

    pub fn push_gap(&mut self, gap: SweepGap) {
        self.gaps.push(gap);
    }

    pub fn records(&self) -> &[AveragedRecord] {
        &self.records
    }

    pub fn gaps(&self) -> &[SweepGap] {
        &self.gaps
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AveragedRecord> {
        self.records.iter()
    }

    /// Records measured at `frequency_hz`
    pub fn at_frequency(&self, frequency_hz: f64) -> impl Iterator<Item = &AveragedRecord> {
        self.records
            .iter()
            .filter(move |r| {
                (r.frequency_hz - frequency_hz).abs() <= numeric::FREQUENCY_MATCH_TOLERANCE_HZ
            })
    }

    /// Distinct frequencies in the order they were first measured
    pub fn frequencies(&self) -> Vec<f64> {
        let mut frequencies: Vec<f64> = Vec::new();
        for record in &self.records {
            let seen = frequencies
                .iter()
                .any(|f| (f - record.frequency_hz).abs() <= numeric::FREQUENCY_MATCH_TOLERANCE_HZ);
            if !seen {
                frequencies.push(record.frequency_hz);
            }
        }
        frequencies
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
        self.gaps.clear();
    }
}

impl<'a> IntoIterator for &'a SweepResult {
    type Item = &'a AveragedRecord;
    type IntoIter = std::slice::Iter<'a, AveragedRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
