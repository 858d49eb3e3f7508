//! LCR-Core: frequency-sweep lock-in impedance measurement engine
//!
//! This library drives an excitation through a device under test, samples the
//! voltage across it and the current through a shunt resistor, and computes
//! the complex impedance over a swept frequency range. It features:
//!
//! - Band selection tying decimation to frequency
//! - Bounded, configurable acquisition retries
//! - Lock-in demodulation over the acquisition time base
//! - Averaging and calibration-repeat bookkeeping with explicit failure policy
//! - Short-circuit compensation from a calibration sweep
//! - A simulated instrument for testing without hardware
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use lcr_core::config::EngineConfig;
//! use lcr_core::hal::simulator::{LoadModel, SimulatedInstrument};
//! use lcr_core::sweep::{CalibrationConfirmation, SweepController};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let instrument = SimulatedInstrument::with_load(LoadModel::SeriesRc {
//!         ohms: 1000.0,
//!         farads: 100e-9,
//!     })?;
//!     let mut controller = SweepController::new(EngineConfig::default(), instrument)?;
//!
//!     for record in controller.run(CalibrationConfirmation::Confirmed)? {
//!         println!(
//!             "{} Hz: |Z| = {:.1} Ω, phase = {:.1}°",
//!             record.frequency_hz,
//!             record.magnitude(),
//!             record.phase_degrees()
//!         );
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod acquisition;
pub mod config;
pub mod error;
pub mod hal;
pub mod processing;
pub mod sweep;

// Re-export commonly used types for convenience
pub use config::{ConfigLoader, EngineConfig, FailurePolicy, MeasurementMode, SweepConfig};
pub use error::{LcrError, LcrResult, MeasurementPoint};
pub use hal::{
    AcquisitionDevice, AcquisitionPoll, DeviceError, ExcitationSource, Instrument, RawCapture,
};
pub use processing::IntegrationRule;
pub use sweep::{
    AveragedRecord, CalibrationConfirmation, ShortCalibration, SweepController, SweepResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
