// src/sweep/mod.rs
//! Sweep orchestration, records and short-circuit compensation

pub mod calibration;
pub mod controller;
pub mod record;

pub use calibration::*;
pub use controller::*;
pub use record::*;
