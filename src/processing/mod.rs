// src/processing/mod.rs
//! Signal conditioning, lock-in demodulation and impedance assembly

pub mod conditioner;
pub mod impedance;
pub mod lockin;

pub use conditioner::*;
pub use impedance::*;
pub use lockin::*;
