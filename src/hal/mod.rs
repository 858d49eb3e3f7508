// src/hal/mod.rs
//! Hardware abstraction for the excitation generator and acquisition front end

pub mod traits;
pub mod types;
pub mod simulator;

pub use traits::*;
pub use types::*;
