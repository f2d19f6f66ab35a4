use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::timeline::TimelineWindow;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", .path.display())]
    TomlDecode {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to encode config: {0}")]
    TomlEncode(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where settings and weeks are stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,
    pub prevent_overlap: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
    pub timeline: TimelineWindow,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_dir: None,
            prevent_overlap: true,
            log_filter: None,
            timeline: TimelineWindow::default(),
        }
    }
}

impl AppConfig {
    /// Missing or blank file gives the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        toml::from_str(&raw).map_err(|source| ConfigError::TomlDecode {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let raw = toml::to_string_pretty(self)?;
        fs::write(path, raw).map_err(io_error)?;
        debug!(path = %path.display(), "wrote config");
        Ok(())
    }

    /// Replaces an unusable timeline window with the default one. Returns
    /// whether anything was corrected.
    pub fn correct_window(&mut self) -> bool {
        if self.timeline.is_valid() {
            return false;
        }
        warn!(
            start_hour = self.timeline.start_hour,
            end_hour = self.timeline.end_hour,
            hour_px = self.timeline.hour_px,
            "invalid timeline window in config, using defaults"
        );
        self.timeline = TimelineWindow::default();
        true
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use crate::timeline::TimelineWindow;

    use super::{AppConfig, ConfigError};

    #[test]
    fn missing_file_gives_defaults() {
        let config = AppConfig::load(&temp_file("weekblocks_config_missing.toml")).expect("defaults");
        assert_eq!(config, AppConfig::default());
        assert!(config.prevent_overlap);
        assert_eq!(config.timeline, TimelineWindow::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let path = temp_file("weekblocks_config_partial.toml");
        fs::write(
            &path,
            "prevent_overlap = false\nstore_dir = \"/tmp/blocks\"\n\n[timeline]\nstart_hour = 7\n",
        )
        .expect("write config");

        let config = AppConfig::load(&path).expect("load config");
        assert!(!config.prevent_overlap);
        assert_eq!(config.store_dir, Some(PathBuf::from("/tmp/blocks")));
        assert_eq!(config.timeline.start_hour, 7);
        assert_eq!(config.timeline.end_hour, 22);
        assert_eq!(config.timeline.hour_px, 48);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn broken_file_is_an_error() {
        let path = temp_file("weekblocks_config_broken.toml");
        fs::write(&path, "prevent_overlap = maybe").expect("write config");
        let err = AppConfig::load(&path).expect_err("should fail");
        assert!(matches!(err, ConfigError::TomlDecode { .. }));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn inverted_window_is_corrected() {
        let mut config = AppConfig {
            timeline: TimelineWindow {
                start_hour: 20,
                end_hour: 8,
                hour_px: 48,
            },
            ..AppConfig::default()
        };
        assert!(config.correct_window());
        assert_eq!(config.timeline, TimelineWindow::default());
        assert!(!config.correct_window());
    }

    #[test]
    fn saved_config_loads_back() {
        let path = temp_file("weekblocks_config_saved.toml");
        let config = AppConfig {
            log_filter: Some("debug".to_string()),
            ..AppConfig::default()
        };
        config.save(&path).expect("save config");
        assert_eq!(AppConfig::load(&path).expect("load config"), config);
        let _ = fs::remove_file(path);
    }

    fn temp_file(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("{}_{}", name, std::process::id()));
        path
    }
}
