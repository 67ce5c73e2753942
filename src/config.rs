//! Settings for the file configuration source.
//!
//! Layered the same way everywhere:
//! - Default values
//! - `confwatch.toml` (current directory, then the user config directory)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `CONFWATCH_` and use double
//! underscores to separate nested levels:
//! - `CONFWATCH_SETTLE_DELAY_MS=50` sets `settle_delay_ms`
//! - `CONFWATCH_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::{DEFAULT_FILE_PRIORITY, DEFAULT_SOURCE_PRIORITY};

const SETTINGS_FILE: &str = "confwatch.toml";
const ENV_PREFIX: &str = "CONFWATCH_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SourceSettings {
    /// Priority of this backend inside the host aggregator.
    #[serde(default = "default_source_priority")]
    pub source_priority: i32,

    /// Priority given to files added without an explicit one.
    #[serde(default = "default_file_priority")]
    pub default_file_priority: u32,

    /// Priority for a new file that has no registered ancestor.
    #[serde(default = "default_fallback_priority")]
    pub fallback_priority: u32,

    /// Wait after a create event before reading the file.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Editor swap/backup suffixes that never trigger a reload.
    #[serde(default = "default_ignored_suffixes")]
    pub ignored_suffixes: Vec<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default level for every module.
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `confwatch::watcher = "debug"`.
    #[serde(default)]
    pub modules: IndexMap<String, String>,
}

// Default value functions
fn default_source_priority() -> i32 {
    DEFAULT_SOURCE_PRIORITY
}
fn default_file_priority() -> u32 {
    DEFAULT_FILE_PRIORITY
}
fn default_fallback_priority() -> u32 {
    DEFAULT_SOURCE_PRIORITY as u32
}
fn default_settle_delay_ms() -> u64 {
    1
}
fn default_ignored_suffixes() -> Vec<String> {
    vec![".swx".to_string(), ".swp".to_string(), "~".to_string()]
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            source_priority: default_source_priority(),
            default_file_priority: default_file_priority(),
            fallback_priority: default_fallback_priority(),
            settle_delay_ms: default_settle_delay_ms(),
            ignored_suffixes: default_ignored_suffixes(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: IndexMap::new(),
        }
    }
}

impl SourceSettings {
    /// Load settings from defaults, the discovered settings file, and env.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let path = Self::find_settings_file().unwrap_or_else(|| PathBuf::from(SETTINGS_FILE));
        Self::load_from(path)
    }

    /// Load settings using a specific file instead of discovery.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(SourceSettings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels; single underscores
            // stay part of the field name.
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Settings file in the current directory, else the user config directory.
    fn find_settings_file() -> Option<PathBuf> {
        let local = PathBuf::from(SETTINGS_FILE);
        if local.is_file() {
            return Some(local);
        }

        let user = dirs::config_dir()?.join("confwatch").join(SETTINGS_FILE);
        user.is_file().then_some(user)
    }

    /// Save current settings to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create-event settle delay as a duration.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Whether `path` ends in one of the ignored editor suffixes.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let name = path.to_string_lossy();
        self.ignored_suffixes
            .iter()
            .any(|suffix| name.ends_with(suffix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = SourceSettings::default();
        assert_eq!(settings.source_priority, 4);
        assert_eq!(settings.default_file_priority, 0);
        assert_eq!(settings.fallback_priority, 4);
        assert_eq!(settings.settle_delay(), Duration::from_millis(1));
        assert_eq!(settings.logging.default, "warn");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("confwatch.toml");

        let toml_content = r#"
source_priority = 9
settle_delay_ms = 25
ignored_suffixes = [".bak"]

[logging]
default = "info"

[logging.modules]
"confwatch::watcher" = "trace"
"#;
        fs::write(&config_path, toml_content).unwrap();

        let settings = SourceSettings::load_from(&config_path).unwrap();
        assert_eq!(settings.source_priority, 9);
        assert_eq!(settings.settle_delay_ms, 25);
        assert_eq!(settings.ignored_suffixes, vec![".bak"]);
        assert_eq!(settings.logging.default, "info");
        assert_eq!(settings.logging.modules["confwatch::watcher"], "trace");
        // Untouched fields keep defaults
        assert_eq!(settings.fallback_priority, 4);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = SourceSettings::load_from(temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.source_priority, 4);
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("confwatch.toml");

        let mut settings = SourceSettings::default();
        settings.default_file_priority = 3;
        settings.save(&config_path).unwrap();

        let loaded = SourceSettings::load_from(&config_path).unwrap();
        assert_eq!(loaded.default_file_priority, 3);
    }

    #[test]
    fn test_ignored_suffixes() {
        let settings = SourceSettings::default();
        assert!(settings.is_ignored(Path::new("/etc/app/a.conf.swp")));
        assert!(settings.is_ignored(Path::new("/etc/app/.a.conf.swx")));
        assert!(settings.is_ignored(Path::new("/etc/app/a.conf~")));
        assert!(!settings.is_ignored(Path::new("/etc/app/a.conf")));
    }
}
