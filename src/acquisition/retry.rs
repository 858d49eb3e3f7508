// src/acquisition/retry.rs
//! Bounded polling of the acquisition device

use crate::acquisition::band::AcquisitionWindow;
use crate::config::constants::acquisition;
use crate::error::{LcrError, LcrResult};
use crate::hal::{AcquisitionDevice, AcquisitionPoll, RawCapture};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// How long to keep asking for a triggered capture
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Pause between attempts
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: acquisition::DEFAULT_MAX_RETRIES,
            interval: Duration::from_micros(acquisition::DEFAULT_RETRY_INTERVAL_US),
        }
    }
}

impl RetryPolicy {
    /// Total attempts including the first one
    pub fn max_attempts(&self) -> u64 {
        self.max_retries as u64 + 1
    }
}

/// Acquisition retry loop
#[derive(Debug, Clone, Default)]
pub struct AcquisitionRetry {
    policy: RetryPolicy,
}

impl AcquisitionRetry {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Poll `device` until it delivers a capture or the budget runs out
    ///
    /// The returned capture is limited to `max_size` samples. Device faults
    /// are returned immediately without retrying.
    pub fn acquire<D>(
        &self,
        device: &mut D,
        window: &AcquisitionWindow,
        max_size: usize,
    ) -> LcrResult<RawCapture>
    where
        D: AcquisitionDevice + ?Sized,
    {
        let max_attempts = self.policy.max_attempts();

        for attempt in 1..=max_attempts {
            match device.try_acquire(window.decimation)? {
                AcquisitionPoll::Captured(capture) => {
                    let capture = capture.truncated(max_size);
                    debug!(
                        attempt,
                        decimation = window.decimation,
                        signal_size = capture.signal_size(),
                        "capture acquired"
                    );
                    return Ok(capture);
                }
                AcquisitionPoll::NotTriggered => {
                    trace!(attempt, decimation = window.decimation, "not triggered");
                    if attempt < max_attempts && !self.policy.interval.is_zero() {
                        std::thread::sleep(self.policy.interval);
                    }
                }
            }
        }

        warn!(
            attempts = max_attempts,
            decimation = window.decimation,
            "acquisition was not triggered"
        );
        Err(LcrError::AcquisitionTimeout {
            attempts: max_attempts,
            decimation: window.decimation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{DeviceError, DeviceInfo};

    /// Device that triggers on a fixed attempt number
    struct ScriptedDevice {
        trigger_on: Option<u64>,
        polls: u64,
        len: usize,
        fault: Option<DeviceError>,
    }

    impl ScriptedDevice {
        fn triggering_on(attempt: u64, len: usize) -> Self {
            Self { trigger_on: Some(attempt), polls: 0, len, fault: None }
        }
    }

    impl AcquisitionDevice for ScriptedDevice {
        fn try_acquire(&mut self, _decimation: u32) -> Result<AcquisitionPoll, DeviceError> {
            self.polls += 1;
            if let Some(fault) = self.fault.clone() {
                return Err(fault);
            }
            match self.trigger_on {
                Some(n) if self.polls >= n => Ok(AcquisitionPoll::Captured(RawCapture::new(
                    vec![1; self.len],
                    vec![2; self.len],
                ))),
                _ => Ok(AcquisitionPoll::NotTriggered),
            }
        }

        fn device_info(&self) -> DeviceInfo {
            DeviceInfo {
                name: "scripted".to_string(),
                version: "0".to_string(),
                serial_number: "0".to_string(),
                sample_rate_hz: 125e6,
                buffer_capacity: self.len,
                adc_resolution_bits: 14,
            }
        }
    }

    fn window() -> AcquisitionWindow {
        AcquisitionWindow::new(1000.0, 1024, 15, 125e6).unwrap()
    }

    fn fast(max_retries: u32) -> AcquisitionRetry {
        AcquisitionRetry::new(RetryPolicy { max_retries, interval: Duration::ZERO })
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 150_000);
        assert_eq!(policy.interval, Duration::from_millis(1));
        assert_eq!(policy.max_attempts(), 150_001);
    }

    #[test]
    fn test_succeeds_on_last_allowed_attempt() {
        let mut device = ScriptedDevice::triggering_on(5, 100);
        let capture = fast(4).acquire(&mut device, &window(), 16384).unwrap();
        assert_eq!(capture.signal_size(), 100);
        assert_eq!(device.polls, 5);
    }

    #[test]
    fn test_timeout_exactly_when_budget_exhausted() {
        let mut device = ScriptedDevice::triggering_on(5, 100);
        match fast(3).acquire(&mut device, &window(), 16384) {
            Err(LcrError::AcquisitionTimeout { attempts, decimation }) => {
                assert_eq!(attempts, 4);
                assert_eq!(decimation, 1024);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(device.polls, 4);
    }

    #[test]
    fn test_never_triggered() {
        let mut device = ScriptedDevice { trigger_on: None, polls: 0, len: 10, fault: None };
        assert!(matches!(
            fast(0).acquire(&mut device, &window(), 10),
            Err(LcrError::AcquisitionTimeout { attempts: 1, .. })
        ));
    }

    #[test]
    fn test_signal_size_limited_by_max_size() {
        let mut device = ScriptedDevice::triggering_on(1, 16384);
        let capture = fast(0).acquire(&mut device, &window(), 1831).unwrap();
        assert_eq!(capture.signal_size(), 1831);
        assert_eq!(capture.channel_a().len(), 1831);
    }

    #[test]
    fn test_device_fault_not_retried() {
        let mut device = ScriptedDevice {
            trigger_on: None,
            polls: 0,
            len: 10,
            fault: Some(DeviceError::Hardware("adc lost".to_string())),
        };
        assert!(matches!(
            fast(10).acquire(&mut device, &window(), 10),
            Err(LcrError::Device(DeviceError::Hardware(_)))
        ));
        assert_eq!(device.polls, 1);
    }

    #[test]
    fn test_interval_is_honoured() {
        let mut device = ScriptedDevice::triggering_on(3, 10);
        let retry = AcquisitionRetry::new(RetryPolicy {
            max_retries: 5,
            interval: Duration::from_millis(2),
        });
        let start = std::time::Instant::now();
        retry.acquire(&mut device, &window(), 10).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(4));
    }
}
