// src/sweep/calibration.rs
//! Short-circuit compensation built from a calibration sweep

use crate::config::constants::numeric;
use crate::error::{LcrError, LcrResult};
use crate::sweep::record::{AveragedRecord, SweepResult};
use rustfft::num_complex::Complex64;
use tracing::debug;

/// Residual impedance measured with the inputs shorted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationPoint {
    pub frequency_hz: f64,
    pub residual: Complex64,
}

/// Residual table, ascending in frequency
#[derive(Debug, Clone, PartialEq)]
pub struct ShortCalibration {
    points: Vec<CalibrationPoint>,
}

impl ShortCalibration {
    /// Average the repeats at each frequency of a calibration sweep
    pub fn from_result(result: &SweepResult) -> LcrResult<Self> {
        let mut points: Vec<CalibrationPoint> = result
            .frequencies()
            .into_iter()
            .map(|frequency_hz| {
                let (sum, count) = result
                    .at_frequency(frequency_hz)
                    .fold((Complex64::new(0.0, 0.0), 0u32), |(sum, n), r| {
                        (sum + r.impedance(), n + 1)
                    });
                CalibrationPoint {
                    frequency_hz,
                    residual: sum / count as f64,
                }
            })
            .collect();

        if points.is_empty() {
            return Err(LcrError::Configuration(
                "calibration sweep produced no records".to_string(),
            ));
        }
        points.sort_by(|a, b| a.frequency_hz.total_cmp(&b.frequency_hz));
        debug!(points = points.len(), "short calibration built");
        Ok(Self { points })
    }

    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    /// Residual at `frequency_hz`, linearly interpolated
    ///
    /// `None` outside the calibrated span.
    pub fn residual_at(&self, frequency_hz: f64) -> Option<Complex64> {
        let tol = numeric::FREQUENCY_MATCH_TOLERANCE_HZ;
        let first = self.points.first()?;
        let last = self.points.last()?;
        if frequency_hz < first.frequency_hz - tol || frequency_hz > last.frequency_hz + tol {
            return None;
        }

        if let Some(exact) = self
            .points
            .iter()
            .find(|p| (p.frequency_hz - frequency_hz).abs() <= tol)
        {
            return Some(exact.residual);
        }

        self.points.windows(2).find_map(|pair| {
            let (lo, hi) = (pair[0], pair[1]);
            if frequency_hz >= lo.frequency_hz && frequency_hz <= hi.frequency_hz {
                let t = (frequency_hz - lo.frequency_hz) / (hi.frequency_hz - lo.frequency_hz);
                Some(lo.residual + (hi.residual - lo.residual) * t)
            } else {
                None
            }
        })
    }

    /// `record` with the residual subtracted; `None` outside the calibrated span
    pub fn correct(&self, record: &AveragedRecord) -> Option<AveragedRecord> {
        let corrected = record.impedance() - self.residual_at(record.frequency_hz)?;
        Some(AveragedRecord {
            real: corrected.re,
            imag: corrected.im,
            ..*record
        })
    }

    /// Corrected copies of every record inside the calibrated span
    pub fn correct_all(&self, result: &SweepResult) -> Vec<AveragedRecord> {
        result.iter().filter_map(|r| self.correct(r)).collect()
    }
}
