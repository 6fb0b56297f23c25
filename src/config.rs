//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the
//! deco-config.toml file. It provides a centralized way to point the planner
//! at a table directory, tune the procedural constants of the timeline
//! synthesizers, and pick the CLI output format.
//!
//! Every field has a default matching the Rev.7 procedures, so an empty or
//! partial file is valid.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "deco-config.toml";

/// Application configuration loaded from deco-config.toml
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Table repository location
    pub tables: TablesConfig,
    /// Procedural constants for plan synthesis
    pub engine: PlanSettings,
    /// CLI presentation
    pub output: OutputConfig,
}

/// Table repository configuration
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TablesConfig {
    /// Directory holding the four JSON table files.
    /// When unset or unreadable the embedded tables are used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// Rates, periods and timer thresholds used by the timeline synthesizers.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlanSettings {
    /// In-water ascent rate (m/min)
    pub ascent_rate: f64,
    /// SurDO2 ascent rate from 12.2 m to the surface (m/min)
    pub surface_ascent_rate: f64,
    /// Chamber compression and chamber ascent rate (m/min)
    pub chamber_rate: f64,
    /// Maximum continuous O₂ period (min)
    pub o2_period_minutes: u32,
    /// Air break between O₂ periods (min)
    pub air_break_minutes: u32,
    /// A remaining O₂ obligation up to this long is breathed without a break (min)
    pub final_period_max_minutes: u32,
    /// Deepest in-water stop breathed on O₂ (m)
    pub o2_stop_max_depth: f64,
    /// Warning threshold for the travel/shift/vent count-up (s)
    pub travel_shift_vent_warning_secs: u32,
    /// SurDO2 surface interval warning threshold (s)
    pub transition_warning_secs: u32,
    /// SurDO2 surface interval hard limit (s)
    pub transition_error_secs: u32,
    /// First chamber period time at 15 m before moving to 12.2 m (min)
    pub first_period_head_minutes: u32,
    /// Emit the SurDO2 surface interval and compression as one segment
    pub unified_transition: bool,
}

impl Default for PlanSettings {
    fn default() -> Self {
        PlanSettings {
            ascent_rate: 9.0,
            surface_ascent_rate: 12.0,
            chamber_rate: 30.0,
            o2_period_minutes: 30,
            air_break_minutes: 5,
            final_period_max_minutes: 35,
            o2_stop_max_depth: 9.0,
            travel_shift_vent_warning_secs: 180,
            transition_warning_secs: 300,
            transition_error_secs: 420,
            first_period_head_minutes: 15,
            unified_transition: true,
        }
    }
}

impl PlanSettings {
    /// Reject settings that would make the synthesizers produce infinite or
    /// empty timings.
    pub fn validate(&self) -> Result<(), String> {
        for (name, rate) in [
            ("ascent_rate", self.ascent_rate),
            ("surface_ascent_rate", self.surface_ascent_rate),
            ("chamber_rate", self.chamber_rate),
        ] {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(format!("{name} must be a positive rate, got {rate}"));
            }
        }
        if self.o2_period_minutes == 0 {
            return Err("o2_period_minutes must be at least 1".to_string());
        }
        if self.first_period_head_minutes > self.o2_period_minutes {
            return Err(format!(
                "first_period_head_minutes ({}) exceeds o2_period_minutes ({})",
                self.first_period_head_minutes, self.o2_period_minutes
            ));
        }
        if !self.o2_stop_max_depth.is_finite() || self.o2_stop_max_depth < 0.0 {
            return Err(format!(
                "o2_stop_max_depth must be zero or positive, got {}",
                self.o2_stop_max_depth
            ));
        }
        if self.transition_warning_secs > self.transition_error_secs {
            return Err(format!(
                "transition_warning_secs ({}) exceeds transition_error_secs ({})",
                self.transition_warning_secs, self.transition_error_secs
            ));
        }
        Ok(())
    }
}

/// CLI output configuration
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl Config {
    /// Load configuration from deco-config.toml in the working directory
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(mut config) => {
                    if let Err(error) = config.engine.validate() {
                        warn!(path = %path.display(), %error, "invalid engine settings, using defaults");
                        config.engine = PlanSettings::default();
                    }
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "invalid config file, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "no config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save current configuration to the given path
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), contents)?;
        info!(path = %path.as_ref().display(), "configuration saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tables.dir, None);
        assert_eq!(config.engine.ascent_rate, 9.0);
        assert_eq!(config.engine.o2_period_minutes, 30);
        assert_eq!(config.engine.transition_warning_secs, 300);
        assert_eq!(config.engine.transition_error_secs, 420);
        assert!(config.engine.unified_transition);
        assert_eq!(config.output.format, OutputFormat::Text);
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.tables.dir = Some(PathBuf::from("/srv/deco/tables"));
        config.output.format = OutputFormat::Json;
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed: Config = toml::from_str("[engine]\nunified_transition = false\n").unwrap();
        assert!(!parsed.engine.unified_transition);
        assert_eq!(parsed.engine.chamber_rate, 30.0);
        assert_eq!(parsed.tables, TablesConfig::default());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        // Should fallback to default
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), "[engine\nascent_rate = ").unwrap();
        assert_eq!(Config::load_from_path(file.path()), Config::default());
    }

    #[test]
    fn test_default_oxygen_ceiling_is_nine_metres() {
        assert_eq!(PlanSettings::default().o2_stop_max_depth, 9.0);
        assert!(PlanSettings::default().validate().is_ok());
    }

    #[test]
    fn test_zero_ascent_rate_falls_back_to_default_engine() {
        let file = NamedTempFile::new().unwrap();
        fs::write(
            file.path(),
            "[engine]\nascent_rate = 0.0\n\n[output]\nformat = \"json\"\n",
        )
        .unwrap();
        let config = Config::load_from_path(file.path());
        assert_eq!(config.engine, PlanSettings::default());
        // Other sections are kept
        assert_eq!(config.output.format, OutputFormat::Json);
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut settings = PlanSettings::default();
        settings.o2_period_minutes = 0;
        assert!(settings.validate().is_err());

        let mut settings = PlanSettings::default();
        settings.transition_warning_secs = 500;
        assert!(settings.validate().is_err());

        let mut settings = PlanSettings::default();
        settings.chamber_rate = f64::NAN;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_save_then_load() {
        let file = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.engine.first_period_head_minutes = 20;
        config.save_to_path(file.path()).unwrap();
        assert_eq!(Config::load_from_path(file.path()), config);
    }
}
