// src/acquisition/mod.rs
//! Band selection, window sizing and retried signal acquisition

pub mod band;
pub mod retry;

pub use band::*;
pub use retry::*;
