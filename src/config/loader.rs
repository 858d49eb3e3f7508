// src/config/loader.rs
//! Layered configuration loader: defaults, TOML files, environment

use crate::config::{constants::paths, EngineConfig};
use crate::error::{LcrError, LcrResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Loads an [`EngineConfig`] from a list of optional TOML files
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    env_prefix: String,
    current_config: EngineConfig,
}

impl ConfigLoader {
    /// Loader searching the standard system, user and local locations
    pub fn new() -> Self {
        Self::with_paths(Self::discover_config_paths())
    }

    /// Loader reading only `paths`, later files overriding earlier ones
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths: paths,
            env_prefix: paths::ENV_PREFIX.to_string(),
            current_config: EngineConfig::default(),
        }
    }

    /// Use a different environment variable prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn config_paths(&self) -> &[PathBuf] {
        &self.config_paths
    }

    /// Merge every layer, normalize and validate the result
    pub fn load(&mut self) -> LcrResult<EngineConfig> {
        let config = self.load_and_merge_configs()?;
        self.current_config = config.clone();
        info!(summary = ?config.summary(), "configuration loaded");
        Ok(config)
    }

    /// Configuration from the most recent successful load
    pub fn current_config(&self) -> &EngineConfig {
        &self.current_config
    }

    /// Check a single file parses and validates on top of the defaults
    pub fn validate_config_file<P: AsRef<Path>>(&self, path: P) -> LcrResult<()> {
        let mut merged = Self::default_document()?;
        merge_toml_values(&mut merged, load_config_file(path.as_ref())?);
        Self::deserialize(merged)?.validate()
    }

    /// Write the current configuration to `path` as TOML
    pub fn export_config<P: AsRef<Path>>(&self, path: P) -> LcrResult<()> {
        let toml_content = toml::to_string_pretty(&self.current_config)
            .map_err(|e| LcrError::Configuration(format!("serialization failed: {}", e)))?;
        std::fs::write(path.as_ref(), toml_content).map_err(|e| {
            LcrError::Configuration(format!("cannot write {}: {}", path.as_ref().display(), e))
        })
    }

    fn load_and_merge_configs(&self) -> LcrResult<EngineConfig> {
        let mut merged = Self::default_document()?;

        for config_path in &self.config_paths {
            if config_path.exists() {
                debug!(path = %config_path.display(), "merging configuration file");
                merge_toml_values(&mut merged, load_config_file(config_path)?);
            }
        }

        self.apply_environment_overrides(&mut merged);

        Self::deserialize(merged)?.normalized()
    }

    fn default_document() -> LcrResult<toml::Value> {
        toml::Value::try_from(EngineConfig::default())
            .map_err(|e| LcrError::Configuration(format!("default configuration: {}", e)))
    }

    fn deserialize(document: toml::Value) -> LcrResult<EngineConfig> {
        document
            .try_into()
            .map_err(|e| LcrError::Configuration(format!("failed to deserialize config: {}", e)))
    }

    /// `LCR__SWEEP__AVERAGING_NUM=8` sets `sweep.averaging_num`
    fn apply_environment_overrides(&self, config: &mut toml::Value) {
        for (key, value) in std::env::vars() {
            let Some(rest) = key.strip_prefix(&self.env_prefix) else {
                continue;
            };
            let path: Vec<String> = rest
                .split(paths::ENV_SEPARATOR)
                .filter(|part| !part.is_empty())
                .map(str::to_lowercase)
                .collect();
            if path.is_empty() {
                continue;
            }
            debug!(variable = %key, "applying environment override");
            set_nested_value(config, &path, parse_env_value(&value));
        }
    }

    fn discover_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(paths::SYSTEM_CONFIG_PATH)];

        if let Some(home_dir) = std::env::var_os("HOME").map(PathBuf::from) {
            paths.push(home_dir.join(paths::USER_CONFIG_DIR).join("config.toml"));
        }

        paths.push(PathBuf::from(paths::DEFAULT_CONFIG_FILE));
        paths.push(PathBuf::from(paths::LOCAL_CONFIG_FILE));
        paths
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn load_config_file(path: &Path) -> LcrResult<toml::Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| LcrError::Configuration(format!("cannot read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| LcrError::Configuration(format!("cannot parse {}: {}", path.display(), e)))
}

fn merge_toml_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                if let Some(base_value) = base_table.get_mut(&key) {
                    merge_toml_values(base_value, value);
                } else {
                    base_table.insert(key, value);
                }
            }
        }
        // Arrays (the band table) are replaced wholesale
        (base_value, overlay_value) => {
            *base_value = overlay_value;
        }
    }
}

fn parse_env_value(value: &str) -> toml::Value {
    if let Ok(int_val) = value.parse::<i64>() {
        toml::Value::Integer(int_val)
    } else if let Ok(float_val) = value.parse::<f64>() {
        toml::Value::Float(float_val)
    } else if let Ok(bool_val) = value.parse::<bool>() {
        toml::Value::Boolean(bool_val)
    } else {
        toml::Value::String(value.to_string())
    }
}

fn set_nested_value(config: &mut toml::Value, path: &[String], value: toml::Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = config;
    for part in parents {
        let toml::Value::Table(table) = current else {
            return;
        };
        current = table
            .entry(part.clone())
            .or_insert_with(|| toml::Value::Table(toml::value::Table::new()));
    }
    if let toml::Value::Table(table) = current {
        // Integers given for float fields are promoted
        let value = match (table.get(last), value) {
            (Some(toml::Value::Float(_)), toml::Value::Integer(i)) => toml::Value::Float(i as f64),
            (_, value) => value,
        };
        table.insert(last.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MeasurementMode;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_config_loader_creation() {
        let loader = ConfigLoader::new();
        assert!(!loader.config_paths().is_empty());
    }

    #[test]
    #[serial]
    fn test_missing_files_give_defaults() {
        let mut loader = ConfigLoader::with_paths(vec![PathBuf::from("/nonexistent/lcr.toml")]);
        let config = loader.load().unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    #[serial]
    fn test_later_files_override_earlier() {
        let first = write_config("[sweep]\naveraging_num = 3\nstart_frequency_hz = 2000.0\n");
        let second = write_config("[sweep]\naveraging_num = 7\n");
        let mut loader =
            ConfigLoader::with_paths(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
        let config = loader.load().unwrap();

        assert_eq!(config.sweep.averaging_num, 7);
        assert_eq!(config.sweep.start_frequency_hz, 2000.0);
        assert_eq!(loader.current_config().sweep.averaging_num, 7);
    }

    #[test]
    fn test_config_file_validation() {
        let loader = ConfigLoader::with_paths(Vec::new());
        let valid = write_config("[sweep]\nmode = \"calibration\"\ncalibration_repeats = 4\n");
        assert!(loader.validate_config_file(valid.path()).is_ok());

        let invalid = write_config("[sweep]\namplitude_vpp = 5.0\n");
        assert!(matches!(
            loader.validate_config_file(invalid.path()),
            Err(LcrError::InvalidParameter { .. })
        ));

        let unparsable = write_config("[sweep\n");
        assert!(matches!(
            loader.validate_config_file(unparsable.path()),
            Err(LcrError::Configuration(_))
        ));
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        unsafe {
            std::env::set_var("LCRTEST__SWEEP__AVERAGING_NUM", "8");
            std::env::set_var("LCRTEST__SWEEP__SHUNT_RESISTANCE_OHMS", "1000");
            std::env::set_var("LCRTEST__SWEEP__MODE", "calibration");
        }

        let mut loader = ConfigLoader::with_paths(Vec::new()).with_env_prefix("LCRTEST__");
        let result = loader.load();

        unsafe {
            std::env::remove_var("LCRTEST__SWEEP__AVERAGING_NUM");
            std::env::remove_var("LCRTEST__SWEEP__SHUNT_RESISTANCE_OHMS");
            std::env::remove_var("LCRTEST__SWEEP__MODE");
        }

        let config = result.unwrap();
        assert_eq!(config.sweep.averaging_num, 8);
        assert_eq!(config.sweep.shunt_resistance_ohms, 1000.0);
        assert_eq!(config.sweep.mode, MeasurementMode::Calibration);
    }

    #[test]
    #[serial]
    fn test_load_clamps_end_frequency() {
        let file = write_config("[sweep]\nend_frequency_hz = 1.0e8\n");
        let mut loader = ConfigLoader::with_paths(vec![file.path().to_path_buf()]);
        assert_eq!(loader.load().unwrap().sweep.end_frequency_hz, 62.5e6);
    }

    #[test]
    #[serial]
    fn test_config_export() {
        let file = write_config("[sweep]\naveraging_num = 9\n");
        let mut loader = ConfigLoader::with_paths(vec![file.path().to_path_buf()]);
        loader.load().unwrap();

        let exported = NamedTempFile::new().unwrap();
        loader.export_config(exported.path()).unwrap();

        let content = std::fs::read_to_string(exported.path()).unwrap();
        assert!(content.contains("[sweep]"));
        let reloaded: EngineConfig = toml::from_str(&content).unwrap();
        assert_eq!(reloaded.sweep.averaging_num, 9);
    }

    #[test]
    fn test_merge_replaces_scalars_and_keeps_siblings() {
        let mut base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\n").unwrap();
        merge_toml_values(&mut base, overlay);
        assert_eq!(base["a"]["x"].as_integer(), Some(1));
        assert_eq!(base["a"]["y"].as_integer(), Some(3));
    }
}
