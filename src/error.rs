// src/error.rs
//! Unified error handling for the LCR measurement core
//!
//! Every failure the engine can produce is an [`LcrError`]. Failures that
//! happen while measuring a specific point are wrapped in
//! [`LcrError::AtPoint`] so the caller can always tell which
//! frequency/repeat/average index went wrong.

use crate::hal::DeviceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Position of a single measurement inside a sweep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPoint {
    /// Index of the frequency point within the sweep plan
    pub sweep_index: usize,
    pub frequency_hz: f64,
    /// Calibration/repeat iteration at this frequency
    pub repeat: u32,
    /// Averaging iteration within the repeat
    pub average: u32,
}

impl fmt::Display for MeasurementPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "point {} ({} Hz, repeat {}, average {})",
            self.sweep_index, self.frequency_hz, self.repeat, self.average
        )
    }
}

/// Unified error type for the measurement engine
#[derive(Debug, Error)]
pub enum LcrError {
    /// No frequency band covers the requested frequency
    #[error("Unsupported frequency {frequency_hz} Hz (lowest band starts at {lowest_bound_hz} Hz)")]
    UnsupportedFrequency { frequency_hz: f64, lowest_bound_hz: f64 },

    /// The acquisition device never reported a triggered capture
    #[error("Acquisition not triggered after {attempts} attempts (decimation {decimation})")]
    AcquisitionTimeout { attempts: u64, decimation: u32 },

    /// Channel buffers of a capture disagree in length
    #[error("Malformed capture: channel lengths {channel_a} and {channel_b} differ")]
    MalformedCapture { channel_a: usize, channel_b: usize },

    /// Impedance could not be computed from the measured amplitudes
    #[error("Degenerate measurement: {reason}")]
    DegenerateMeasurement { reason: String },

    /// The pre-sweep short-circuit confirmation was declined or invalid
    #[error("Calibration aborted: {reason}")]
    CalibrationAborted { reason: String },

    /// A numeric input is outside what the instrument supports
    #[error("Invalid {field} = {value}: {reason}")]
    InvalidParameter {
        field: String,
        value: String,
        reason: String,
    },

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An external collaborator reported a hardware failure
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Failure attributed to one measurement of the sweep
    #[error("{point}: {source}")]
    AtPoint {
        point: MeasurementPoint,
        #[source]
        source: Box<LcrError>,
    },
}

/// Result type alias for LCR operations
pub type LcrResult<T> = Result<T, LcrError>;

impl LcrError {
    /// Build an `InvalidParameter` error
    pub fn invalid_parameter(
        field: &str,
        value: impl fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        LcrError::InvalidParameter {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Attach the measurement position to this error
    pub fn at(self, point: MeasurementPoint) -> Self {
        match self {
            // Keep the innermost attribution
            already @ LcrError::AtPoint { .. } => already,
            other => LcrError::AtPoint {
                point,
                source: Box::new(other),
            },
        }
    }

    /// Error with the point attribution stripped
    pub fn root(&self) -> &LcrError {
        match self {
            LcrError::AtPoint { source, .. } => source.root(),
            other => other,
        }
    }

    /// Measurement position this error is attributed to, if any
    pub fn point(&self) -> Option<&MeasurementPoint> {
        match self {
            LcrError::AtPoint { point, .. } => Some(point),
            _ => None,
        }
    }

    /// Whether the failure only invalidates one measurement
    ///
    /// Timeouts and degenerate amplitudes are subject to the sweep failure
    /// policy; everything else aborts the sweep.
    pub fn is_per_measurement(&self) -> bool {
        matches!(
            self.root(),
            LcrError::AcquisitionTimeout { .. } | LcrError::DegenerateMeasurement { .. }
        )
    }
}
