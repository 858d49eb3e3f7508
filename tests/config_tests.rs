// tests/config_tests.rs
//! Layered configuration loading feeding a real sweep

use lcr_core::config::{ConfigLoader, EngineConfig, FailurePolicy, MeasurementMode};
use lcr_core::error::LcrError;
use lcr_core::hal::simulator::{LoadModel, SimulatedInstrument};
use lcr_core::processing::IntegrationRule;
use lcr_core::sweep::{CalibrationConfirmation, SweepController};
use serial_test::serial;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

#[test]
#[serial]
fn test_full_document_round_trip() {
    let file = write_config(
        r#"
[sweep]
start_frequency_hz = 200.0
end_frequency_hz = 800.0
frequency_step_hz = 200.0
averaging_num = 2
mode = "calibration"
calibration_repeats = 2
min_periods = 10

[acquisition]
max_retries = 100
retry_interval_us = 0
integration_rule = "trapezoidal"

[acquisition.failure_policy]
policy = "retry_iteration"
max_attempts = 2

[[bands]]
lower_bound_hz = 2500.0
decimation = 64

[[bands]]
lower_bound_hz = 2.5
decimation = 1024
"#,
    );

    let mut loader = ConfigLoader::with_paths(vec![file.path().to_path_buf()]);
    let config = loader.load().unwrap();

    assert_eq!(config.sweep.mode, MeasurementMode::Calibration);
    assert_eq!(config.sweep.frequency_points(), vec![200.0, 400.0, 600.0]);
    assert_eq!(
        config.acquisition.failure_policy,
        FailurePolicy::RetryIteration { max_attempts: 2 }
    );
    assert_eq!(config.acquisition.integration_rule, IntegrationRule::Trapezoidal);
    assert_eq!(config.bands.len(), 2);
    assert_eq!(config.band_table().unwrap().select(400.0).unwrap().decimation, 1024);

    let dir = TempDir::new().unwrap();
    let exported = dir.path().join("exported.toml");
    loader.export_config(&exported).unwrap();
    let mut reloader = ConfigLoader::with_paths(vec![exported]);
    assert_eq!(reloader.load().unwrap(), config);
}

#[test]
#[serial]
fn test_loaded_config_drives_sweep() {
    let file = write_config(
        r#"
[sweep]
start_frequency_hz = 5000.0
end_frequency_hz = 8000.0
averaging_num = 2

[acquisition]
retry_interval_us = 0
"#,
    );
    let config = ConfigLoader::with_paths(vec![file.path().to_path_buf()]).load().unwrap();

    let sim = SimulatedInstrument::with_load(LoadModel::Resistor { ohms: 2200.0 }).unwrap();
    let mut controller = SweepController::new(config, sim).unwrap();
    let result = controller.run(CalibrationConfirmation::Confirmed).unwrap();

    assert_eq!(result.frequencies(), vec![5000.0, 6000.0, 7000.0]);
    for record in result {
        assert!((record.magnitude() - 2200.0).abs() / 2200.0 < 0.02);
    }
}

#[test]
#[serial]
fn test_environment_overrides_files() {
    let file = write_config("[sweep]\naveraging_num = 3\n[acquisition]\nmax_retries = 10\n");
    unsafe {
        std::env::set_var("LCR__SWEEP__AVERAGING_NUM", "6");
        std::env::set_var("LCR__ACQUISITION__FAILURE_POLICY__POLICY", "abort_sweep");
    }

    let result = ConfigLoader::with_paths(vec![file.path().to_path_buf()]).load();

    unsafe {
        std::env::remove_var("LCR__SWEEP__AVERAGING_NUM");
        std::env::remove_var("LCR__ACQUISITION__FAILURE_POLICY__POLICY");
    }

    let config = result.unwrap();
    assert_eq!(config.sweep.averaging_num, 6);
    assert_eq!(config.acquisition.max_retries, 10);
    assert_eq!(config.acquisition.failure_policy, FailurePolicy::AbortSweep);
}

#[test]
#[serial]
fn test_out_of_range_file_rejected() {
    let file = write_config("[sweep]\nstart_frequency_hz = 1.0\n");
    let result = ConfigLoader::with_paths(vec![file.path().to_path_buf()]).load();
    assert!(matches!(result, Err(LcrError::InvalidParameter { .. })));

    let file = write_config("[sweep]\naveraging_num = \"five\"\n");
    let result = ConfigLoader::with_paths(vec![file.path().to_path_buf()]).load();
    assert!(matches!(result, Err(LcrError::Configuration(_))));
}

#[test]
fn test_default_config_serializes_with_all_sections() {
    let text = toml::to_string_pretty(&EngineConfig::default()).unwrap();
    for section in ["[instrument]", "[sweep]", "[acquisition]", "[[bands]]"] {
        assert!(text.contains(section), "missing {}", section);
    }
}
