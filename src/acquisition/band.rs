// src/acquisition/band.rs
//! Frequency band selection and acquisition window sizing
//!
//! Each band ties a frequency range to a decimation factor so that the
//! captured window always spans roughly the same number of signal periods.

use crate::config::constants::bands;
use crate::error::{LcrError, LcrResult};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One row of the band table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandEntry {
    /// Lowest frequency (inclusive) served by this band
    pub lower_bound_hz: f64,
    pub decimation: u32,
}

/// Ordered band table, highest lower bound first
#[derive(Debug, Clone, PartialEq)]
pub struct BandTable {
    entries: Vec<BandEntry>,
}

impl Default for BandTable {
    fn default() -> Self {
        let entries = bands::LOWER_BOUNDS_HZ
            .iter()
            .zip(bands::DECIMATIONS.iter())
            .map(|(&lower_bound_hz, &decimation)| BandEntry {
                lower_bound_hz,
                decimation,
            })
            .collect();
        Self { entries }
    }
}

impl BandTable {
    /// Build a table, checking bounds are strictly decreasing
    pub fn new(entries: Vec<BandEntry>) -> LcrResult<Self> {
        if entries.is_empty() {
            return Err(LcrError::Configuration("band table is empty".to_string()));
        }
        for entry in &entries {
            if !(entry.lower_bound_hz > 0.0) || !entry.lower_bound_hz.is_finite() {
                return Err(LcrError::Configuration(format!(
                    "band lower bound {} Hz must be positive",
                    entry.lower_bound_hz
                )));
            }
            if entry.decimation == 0 {
                return Err(LcrError::Configuration(
                    "band decimation must be non-zero".to_string(),
                ));
            }
        }
        for pair in entries.windows(2) {
            if pair[0].lower_bound_hz <= pair[1].lower_bound_hz {
                return Err(LcrError::Configuration(format!(
                    "band bounds must be strictly decreasing ({} Hz then {} Hz)",
                    pair[0].lower_bound_hz, pair[1].lower_bound_hz
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[BandEntry] {
        &self.entries
    }

    /// Lowest frequency any band accepts
    pub fn lowest_bound_hz(&self) -> f64 {
        self.entries
            .last()
            .map(|e| e.lower_bound_hz)
            .unwrap_or(f64::INFINITY)
    }

    /// Band serving `frequency_hz`; boundary frequencies belong to the higher band
    pub fn select(&self, frequency_hz: f64) -> LcrResult<BandEntry> {
        self.entries
            .iter()
            .find(|entry| frequency_hz >= entry.lower_bound_hz)
            .copied()
            .ok_or(LcrError::UnsupportedFrequency {
                frequency_hz,
                lowest_bound_hz: self.lowest_bound_hz(),
            })
    }

    /// Acquisition window for `frequency_hz` capturing `min_periods` periods
    pub fn window(
        &self,
        frequency_hz: f64,
        min_periods: u32,
        sample_rate_hz: f64,
    ) -> LcrResult<AcquisitionWindow> {
        let band = self.select(frequency_hz)?;
        AcquisitionWindow::new(frequency_hz, band.decimation, min_periods, sample_rate_hz)
    }
}

/// Sampling parameters derived for one excitation frequency
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionWindow {
    pub frequency_hz: f64,
    pub decimation: u32,
    /// Samples covering the requested number of periods
    pub sample_count: usize,
    /// Seconds between consecutive decimated samples
    pub sample_period_s: f64,
    /// `k * sample_period_s` for `k` in `0..sample_count - 1`
    pub time_base: Array1<f64>,
}

impl AcquisitionWindow {
    /// Derive the window; `N = round(min_periods * fs / (f * decimation))`
    pub fn new(
        frequency_hz: f64,
        decimation: u32,
        min_periods: u32,
        sample_rate_hz: f64,
    ) -> LcrResult<Self> {
        if !(frequency_hz > 0.0) || !frequency_hz.is_finite() {
            return Err(LcrError::invalid_parameter(
                "frequency_hz",
                frequency_hz,
                "must be a positive finite number",
            ));
        }

        let n = (min_periods as f64 * sample_rate_hz / (frequency_hz * decimation as f64)).round();
        // Two samples are the minimum for a single integration step
        if !(n >= 2.0) || !n.is_finite() {
            return Err(LcrError::invalid_parameter(
                "sample_count",
                n,
                format!(
                    "window at {} Hz with decimation {} holds fewer than two samples",
                    frequency_hz, decimation
                ),
            ));
        }
        let sample_count = n as usize;
        let sample_period_s = decimation as f64 / sample_rate_hz;
        let time_base =
            Array1::from_iter((0..sample_count - 1).map(|k| k as f64 * sample_period_s));

        debug!(
            frequency_hz,
            decimation,
            sample_count,
            sample_period_s,
            "acquisition window derived"
        );

        Ok(Self {
            frequency_hz,
            decimation,
            sample_count,
            sample_period_s,
            time_base,
        })
    }

    /// Angular frequency of the excitation in rad/s
    pub fn angular_frequency(&self) -> f64 {
        2.0 * std::f64::consts::PI * self.frequency_hz
    }

    /// Excitation periods covered when integrating the first `samples` samples
    pub fn periods_spanned(&self, samples: usize) -> f64 {
        let n = samples.min(self.time_base.len());
        n.saturating_sub(1) as f64 * self.sample_period_s * self.frequency_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::constants::instrument::SAMPLE_RATE_HZ;
    use proptest::prelude::*;

    #[test]
    fn test_boundaries_belong_to_higher_band() {
        let table = BandTable::default();
        let expected = [
            (160000.0, 1),
            (20000.0, 8),
            (2500.0, 64),
            (160.0, 1024),
            (20.0, 8192),
            (2.5, 65536),
        ];
        for (frequency, decimation) in expected {
            assert_eq!(
                table.select(frequency).unwrap().decimation,
                decimation,
                "at {} Hz",
                frequency
            );
        }
    }

    #[test]
    fn test_just_below_boundary() {
        let table = BandTable::default();
        assert_eq!(table.select(159999.9).unwrap().decimation, 8);
        assert_eq!(table.select(2499.0).unwrap().decimation, 1024);
        assert_eq!(table.select(62.5e6).unwrap().decimation, 1);
    }

    #[test]
    fn test_below_lowest_band_rejected() {
        let table = BandTable::default();
        match table.select(2.4) {
            Err(LcrError::UnsupportedFrequency { frequency_hz, lowest_bound_hz }) => {
                assert_eq!(frequency_hz, 2.4);
                assert_eq!(lowest_bound_hz, 2.5);
            }
            other => panic!("expected UnsupportedFrequency, got {:?}", other),
        }
        assert!(table.select(0.0).is_err());
    }

    #[test]
    fn test_table_validation() {
        assert!(BandTable::new(vec![]).is_err());
        assert!(BandTable::new(vec![
            BandEntry { lower_bound_hz: 10.0, decimation: 1 },
            BandEntry { lower_bound_hz: 10.0, decimation: 8 },
        ])
        .is_err());
        assert!(BandTable::new(vec![BandEntry { lower_bound_hz: 10.0, decimation: 0 }]).is_err());
        assert!(BandTable::new(vec![
            BandEntry { lower_bound_hz: 100.0, decimation: 1 },
            BandEntry { lower_bound_hz: 10.0, decimation: 8 },
        ])
        .is_ok());
    }

    #[test]
    fn test_window_sizing() {
        let window = AcquisitionWindow::new(1000.0, 1024, 15, SAMPLE_RATE_HZ).unwrap();
        // 15 * 125e6 / (1000 * 1024) = 1831.05
        assert_eq!(window.sample_count, 1831);
        assert_eq!(window.time_base.len(), 1830);
        assert!((window.sample_period_s - 8.192e-6).abs() < 1e-15);
        assert_eq!(window.time_base[0], 0.0);
        assert!((window.time_base[10] - 10.0 * 8.192e-6).abs() < 1e-15);
    }

    #[test]
    fn test_window_too_small_rejected() {
        assert!(AcquisitionWindow::new(62.5e6, 1, 0, SAMPLE_RATE_HZ).is_err());
        assert!(AcquisitionWindow::new(-5.0, 1, 15, SAMPLE_RATE_HZ).is_err());
    }

    #[test]
    fn test_periods_spanned() {
        // 125e6 / (1000 * 1024) ≈ 122 samples per period
        let window = AcquisitionWindow::new(1000.0, 1024, 15, SAMPLE_RATE_HZ).unwrap();
        let full = window.periods_spanned(usize::MAX);
        assert!((full - 15.0).abs() < 0.1, "{}", full);
        assert!(window.periods_spanned(100) < 1.0);
        assert!(window.periods_spanned(500) > 4.0);
        assert_eq!(window.periods_spanned(0), 0.0);
    }

    proptest! {
        #[test]
        fn prop_selected_band_contains_frequency(frequency in 2.5f64..62.5e6) {
            let table = BandTable::default();
            let band = table.select(frequency).unwrap();
            prop_assert!(frequency >= band.lower_bound_hz);
            // No higher band would also accept it
            for entry in table.entries().iter().filter(|e| e.lower_bound_hz > band.lower_bound_hz) {
                prop_assert!(frequency < entry.lower_bound_hz);
            }
        }

        #[test]
        fn prop_window_positive(frequency in 2.5f64..62.5e6, periods in 1u32..=20) {
            let table = BandTable::default();
            let window = table.window(frequency, periods, SAMPLE_RATE_HZ).unwrap();
            prop_assert!(window.sample_count >= 2);
            prop_assert_eq!(window.time_base.len(), window.sample_count - 1);
        }
    }
}
