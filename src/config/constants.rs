// src/config/constants.rs
//! System-wide instrument and measurement constants

/// Instrument hardware constants
pub mod instrument {
    /// ADC/DAC clock of the acquisition front end
    pub const SAMPLE_RATE_HZ: f64 = 125e6;
    /// Samples held by each acquisition channel buffer
    pub const BUFFER_CAPACITY_SAMPLES: usize = 16 * 1024;
    /// Codes spanning the full input range of the 14-bit ADC
    pub const FULL_SCALE_CODES: u32 = 16384;
    pub const ADC_RESOLUTION_BITS: u8 = 14;

    pub const MIN_FREQUENCY_HZ: f64 = 2.5;
    pub const MAX_FREQUENCY_HZ: f64 = 62.5e6;
    /// Peak-to-peak output range of the excitation generator
    pub const MAX_AMPLITUDE_VPP: f64 = 2.0;
}

/// Frequency band table defaults
pub mod bands {
    /// Lower frequency bound of each band, highest first
    pub const LOWER_BOUNDS_HZ: [f64; 6] = [160000.0, 20000.0, 2500.0, 160.0, 20.0, 2.5];
    /// Decimation factor of each band, aligned with `LOWER_BOUNDS_HZ`
    pub const DECIMATIONS: [u32; 6] = [1, 8, 64, 1024, 8192, 65536];
}

/// Sweep defaults
pub mod sweep {
    pub const DEFAULT_START_FREQUENCY_HZ: f64 = 1000.0;
    pub const DEFAULT_END_FREQUENCY_HZ: f64 = 10000.0;
    pub const DEFAULT_FREQUENCY_STEP_HZ: f64 = 1000.0;
    pub const DEFAULT_AMPLITUDE_VPP: f64 = 2.0;
    pub const DEFAULT_AVERAGING_NUM: u32 = 5;
    pub const DEFAULT_CALIBRATION_REPEATS: u32 = 5;
    pub const MAX_CALIBRATION_REPEATS: u32 = 10;
    /// Largest frequency plan a sweep may hold
    pub const MAX_FREQUENCY_POINTS: usize = 100_000;
    pub const DEFAULT_MIN_PERIODS: u32 = 15;
    pub const MIN_PERIODS_LOWER: u32 = 1;
    /// Above this the longest band window no longer fits the buffer
    pub const MIN_PERIODS_UPPER: u32 = 20;
    pub const DEFAULT_SHUNT_RESISTANCE_OHMS: f64 = 8200.0;
    pub const DEFAULT_DC_BIAS_V: f64 = 0.0;
}

/// Acquisition retry constants
pub mod acquisition {
    pub const DEFAULT_MAX_RETRIES: u32 = 150_000;
    pub const DEFAULT_RETRY_INTERVAL_US: u64 = 1000;
}

/// Numerical guards
pub mod numeric {
    /// Current amplitudes at or below this are treated as zero
    pub const DEGENERATE_AMPLITUDE_EPSILON: f64 = 1e-15;
    /// Shunt-channel amplitude, in ADC codes, below which no current is resolved
    pub const CURRENT_FLOOR_CODES: f64 = 1.0;
    /// Frequencies closer than this are considered the same sweep point
    pub const FREQUENCY_MATCH_TOLERANCE_HZ: f64 = 1e-6;
}

/// Configuration file locations
pub mod paths {
    pub const SYSTEM_CONFIG_PATH: &str = "/etc/lcr/config.toml";
    pub const USER_CONFIG_DIR: &str = ".config/lcr";
    pub const DEFAULT_CONFIG_FILE: &str = "config/default.toml";
    pub const LOCAL_CONFIG_FILE: &str = "lcr.toml";
    /// Prefix of environment variables overriding configuration values
    pub const ENV_PREFIX: &str = "LCR__";
    pub const ENV_SEPARATOR: &str = "__";
}
