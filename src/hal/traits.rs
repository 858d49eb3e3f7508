// src/hal/traits.rs
//! Contracts the measurement core consumes from the instrument

use crate::hal::types::{AcquisitionPoll, DeviceError, DeviceInfo};

/// Signal generator driving the device under test
pub trait ExcitationSource {
    /// Start a sine excitation at `frequency_hz` with `amplitude_vpp` peak-to-peak
    fn start_excitation(
        &mut self,
        frequency_hz: f64,
        amplitude_vpp: f64,
    ) -> Result<(), DeviceError>;
}

/// Triggered two-channel sampling front end
pub trait AcquisitionDevice {
    /// Ask for a triggered capture at `decimation`; never blocks
    fn try_acquire(&mut self, decimation: u32) -> Result<AcquisitionPoll, DeviceError>;

    /// Get device information
    fn device_info(&self) -> DeviceInfo;
}

impl<T: ExcitationSource + ?Sized> ExcitationSource for &mut T {
    fn start_excitation(
        &mut self,
        frequency_hz: f64,
        amplitude_vpp: f64,
    ) -> Result<(), DeviceError> {
        (**self).start_excitation(frequency_hz, amplitude_vpp)
    }
}

impl<T: AcquisitionDevice + ?Sized> AcquisitionDevice for &mut T {
    fn try_acquire(&mut self, decimation: u32) -> Result<AcquisitionPoll, DeviceError> {
        (**self).try_acquire(decimation)
    }

    fn device_info(&self) -> DeviceInfo {
        (**self).device_info()
    }
}

/// A complete instrument: generator and acquisition front end together
pub trait Instrument: ExcitationSource + AcquisitionDevice {}

impl<T: ExcitationSource + AcquisitionDevice + ?Sized> Instrument for T {}
