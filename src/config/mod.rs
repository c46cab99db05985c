//! Configuration for the timeline inspector
//!
//! Settings persist as TOML in the platform data directory:
//! - **Linux**: `~/.local/share/dev.timeline-inspector/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.timeline-inspector/config.toml`
//! - **Windows**: `%APPDATA%\dev.timeline-inspector\config.toml`
//!
//! Setting `TIMELINE_INSPECTOR_CONFIG` points at an explicit file instead.
//! Every field has a default, so partial files load fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ResultExt, TimelineError};
use crate::session::RecordingOptions;

/// Application identifier for data directories
pub const APP_ID: &str = "dev.timeline-inspector";

/// Config filename inside the data directory
pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable overriding the config path
pub const CONFIG_ENV_VAR: &str = "TIMELINE_INSPECTOR_CONFIG";

/// Duration filter choices offered by default, in milliseconds
pub const DEFAULT_DURATION_PRESETS_MS: [f64; 3] = [0.0, 1.0, 15.0];

/// How far past a frame's end a screenshot may be and still belong to it
pub const DEFAULT_FILM_STRIP_TOLERANCE_MS: f64 = 10.0;

/// Default time to keep recording after a reload's load event
pub const DEFAULT_RECORD_AFTER_LOAD_MS: u64 = 3000;

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        TimelineError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            TimelineError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Path of the config file, honouring the environment override
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Inspector Config ====================

/// Persistent inspector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    /// Version for future migration support
    pub version: u32,

    /// Choices for the minimum record duration filter
    pub duration_filter_presets_ms: Vec<f64>,

    pub film_strip_tolerance_ms: f64,

    /// Time to keep recording after a reload's load event
    pub record_after_load_ms: u64,

    /// Directory saved traces go to; current directory when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_directory: Option<PathBuf>,

    /// Capture options applied when recording starts
    pub recording: RecordingOptions,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            version: 1,
            duration_filter_presets_ms: DEFAULT_DURATION_PRESETS_MS.to_vec(),
            film_strip_tolerance_ms: DEFAULT_FILM_STRIP_TOLERANCE_MS,
            record_after_load_ms: DEFAULT_RECORD_AFTER_LOAD_MS,
            save_directory: None,
            recording: RecordingOptions::default(),
        }
    }
}

impl InspectorConfig {
    /// Load from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| TimelineError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default location; a missing file yields defaults
    pub fn load() -> Result<Self> {
        let path = config_path().ok_or_else(|| {
            TimelineError::Config("Could not determine config path".to_string())
        })?;

        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load config, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save to an explicit file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TimelineError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        std::fs::write(path, content)
            .map_err(|e| TimelineError::Config(format!("Failed to write config: {}", e)))
    }

    /// Save to the default location
    pub fn save(&self) -> Result<()> {
        let path = match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => PathBuf::from(path),
            None => ensure_app_data_dir()?.join(CONFIG_FILE),
        };
        self.save_to(&path)
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> Result<()> {
        if !(self.film_strip_tolerance_ms >= 0.0) {
            return Err(TimelineError::Config(format!(
                "film_strip_tolerance_ms must be non-negative, got {}",
                self.film_strip_tolerance_ms
            )));
        }
        if let Some(bad) = self
            .duration_filter_presets_ms
            .iter()
            .find(|v| !(**v >= 0.0))
        {
            return Err(TimelineError::Config(format!(
                "duration filter presets must be non-negative, got {}",
                bad
            )));
        }
        Ok(())
    }

    /// Accept `minimum` only when it is one of the duration filter presets
    pub fn check_duration_preset(&self, minimum: f64) -> Result<()> {
        if self.duration_filter_presets_ms.iter().any(|p| *p == minimum) {
            return Ok(());
        }
        Err(TimelineError::Config(format!(
            "minimum duration {} ms is not a preset, choose one of {:?}",
            minimum, self.duration_filter_presets_ms
        )))
    }

    pub fn record_after_load(&self) -> Duration {
        Duration::from_millis(self.record_after_load_ms)
    }

    /// Directory traces are saved to
    pub fn save_directory(&self) -> PathBuf {
        self.save_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_config_default() {
        let config = InspectorConfig::default();
        assert_eq!(config.duration_filter_presets_ms, vec![0.0, 1.0, 15.0]);
        assert_eq!(config.film_strip_tolerance_ms, 10.0);
        assert_eq!(config.record_after_load(), Duration::from_millis(3000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: InspectorConfig = toml::from_str(
            r#"
            duration_filter_presets_ms = [0.0, 50.0]

            [recording]
            capture_film_strip = true
            "#,
        )
        .unwrap();
        assert_eq!(config.duration_filter_presets_ms, vec![0.0, 50.0]);
        assert!(config.recording.capture_film_strip);
        assert_eq!(config.record_after_load_ms, DEFAULT_RECORD_AFTER_LOAD_MS);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = InspectorConfig::default();
        config.duration_filter_presets_ms = vec![0.0, 4.0, 16.0];
        config.film_strip_tolerance_ms = 5.0;
        config.save_to(&path).unwrap();

        let loaded = InspectorConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_duration_presets_gate_minimum() {
        let config = InspectorConfig::default();
        assert!(config.check_duration_preset(15.0).is_ok());
        assert!(config.check_duration_preset(0.0).is_ok());
        assert!(matches!(
            config.check_duration_preset(10.0),
            Err(TimelineError::Config(message)) if message.contains("[0.0, 1.0, 15.0]")
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "film_strip_tolerance_ms = -1.0\n").unwrap();
        assert!(matches!(
            InspectorConfig::load_from(&path),
            Err(TimelineError::Config(_))
        ));
    }

    #[test]
    #[serial]
    fn test_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "record_after_load_ms = 500\n").unwrap();

        std::env::set_var(CONFIG_ENV_VAR, &path);
        assert_eq!(config_path(), Some(path.clone()));
        let config = InspectorConfig::load().unwrap();
        std::env::remove_var(CONFIG_ENV_VAR);

        assert_eq!(config.record_after_load_ms, 500);
    }

    #[test]
    #[serial]
    fn test_env_override_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var(CONFIG_ENV_VAR, dir.path().join("absent.toml"));
        let config = InspectorConfig::load_or_default();
        std::env::remove_var(CONFIG_ENV_VAR);

        assert_eq!(config, InspectorConfig::default());
    }
}
