// src/hal/types.rs
//! Core types exchanged with the instrument hardware

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw samples captured on the two acquisition channels
///
/// `signal_size` bounds every read: accessors never hand out samples past
/// the lesser of the requested and the actually captured length.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCapture {
    channel_a: Vec<i32>,
    channel_b: Vec<i32>,
    signal_size: usize,
}

impl RawCapture {
    /// Wrap a full capture as delivered by the device
    pub fn new(channel_a: Vec<i32>, channel_b: Vec<i32>) -> Self {
        let signal_size = channel_a.len().min(channel_b.len());
        Self {
            channel_a,
            channel_b,
            signal_size,
        }
    }

    /// Limit the usable length to `max_size` samples
    pub fn truncated(mut self, max_size: usize) -> Self {
        self.signal_size = self.signal_size.min(max_size);
        self
    }

    /// Usable samples per channel
    pub fn signal_size(&self) -> usize {
        self.signal_size
    }

    /// Lengths of the two channel buffers as captured
    pub fn captured_lengths(&self) -> (usize, usize) {
        (self.channel_a.len(), self.channel_b.len())
    }

    /// Excitation-side channel (ADC1)
    pub fn channel_a(&self) -> &[i32] {
        &self.channel_a[..self.signal_size]
    }

    /// Shunt-side channel (ADC2)
    pub fn channel_b(&self) -> &[i32] {
        &self.channel_b[..self.signal_size]
    }
}

/// Outcome of a single non-blocking acquisition request
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionPoll {
    Captured(RawCapture),
    NotTriggered,
}

/// Static description of an acquisition device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub version: String,
    pub serial_number: String,
    pub sample_rate_hz: f64,
    pub buffer_capacity: usize,
    pub adc_resolution_bits: u8,
}

/// Failures reported by instrument collaborators
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("Excitation rejected: {0}")]
    ExcitationRejected(String),
    #[error("Acquisition requested before excitation was started")]
    NotExcited,
    #[error("Unsupported decimation factor {0}")]
    UnsupportedDecimation(u32),
    #[error("Hardware fault: {0}")]
    Hardware(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_capture_signal_size() {
        let capture = RawCapture::new(vec![1, 2, 3, 4], vec![5, 6, 7, 8]);
        assert_eq!(capture.signal_size(), 4);

        let capture = capture.truncated(3);
        assert_eq!(capture.signal_size(), 3);
        assert_eq!(capture.channel_a(), &[1, 2, 3]);
        assert_eq!(capture.channel_b(), &[5, 6, 7]);
        assert_eq!(capture.captured_lengths(), (4, 4));
    }

    #[test]
    fn test_truncate_never_grows() {
        let capture = RawCapture::new(vec![1, 2], vec![3, 4]).truncated(100);
        assert_eq!(capture.signal_size(), 2);
    }

    #[test]
    fn test_mismatched_lengths_stay_in_bounds() {
        let capture = RawCapture::new(vec![1, 2, 3], vec![4]);
        assert_eq!(capture.signal_size(), 1);
        assert_eq!(capture.channel_a(), &[1]);
        assert_eq!(capture.captured_lengths(), (3, 1));
    }

    #[test]
    fn test_device_info_serialization() {
        let info = DeviceInfo {
            name: "Bench".to_string(),
            version: "1.0".to_string(),
            serial_number: "SN1".to_string(),
            sample_rate_hz: 125e6,
            buffer_capacity: 16384,
            adc_resolution_bits: 14,
        };
        let json = serde_json::to_string(&info).expect("Failed to serialize");
        let back: DeviceInfo = serde_json::from_str(&json).expect("Failed to deserialize");
        assert_eq!(info, back);
    }
}
