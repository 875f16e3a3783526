use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, TrackerError};
use crate::series::parse_completion;
use crate::volumes::{is_valid_limit, DEFAULT_VOLUME_LIMIT, WORD_BITS};

pub(crate) const DEFAULT_CONFIG_FILE: &str = "config.json";
pub(crate) const DEFAULT_DATABASE_NAME: &str = "manga.db";

/// Settings loaded once at startup and passed down to whatever needs them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct TrackerConfig {
    pub(crate) database_name: String,
    pub(crate) volume_limit: u32,
    /// 0 disables paging.
    pub(crate) series_per_page: usize,
    pub(crate) compact_list: bool,
    pub(crate) show_empty_series: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            volume_limit: DEFAULT_VOLUME_LIMIT,
            series_per_page: 0,
            compact_list: false,
            show_empty_series: false,
        }
    }
}

pub(crate) const CONFIG_KEYS: &[&str] = &[
    "database_name",
    "volume_limit",
    "series_per_page",
    "compact_list",
    "show_empty_series",
];

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" => Some(true),
        "false" | "off" => Some(false),
        other => parse_completion(other),
    }
}

impl TrackerConfig {
    pub(crate) fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.database_name)
    }

    pub(crate) fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "database_name" => self.database_name.clone(),
            "volume_limit" => self.volume_limit.to_string(),
            "series_per_page" => self.series_per_page.to_string(),
            "compact_list" => self.compact_list.to_string(),
            "show_empty_series" => self.show_empty_series.to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// Updates one setting after validating it. The config is left unchanged on error.
    pub(crate) fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "database_name" => {
                if value.is_empty() || !value.ends_with(".db") {
                    return Err(TrackerError::invalid_config(
                        key,
                        "database name must end in .db",
                    ));
                }
                self.database_name = value.to_string();
            }
            "volume_limit" => {
                let limit = value.parse::<u32>().ok().filter(|&l| is_valid_limit(l));
                let Some(limit) = limit else {
                    return Err(TrackerError::invalid_config(
                        key,
                        format!("must be a positive multiple of {WORD_BITS}"),
                    ));
                };
                self.volume_limit = limit;
            }
            "series_per_page" => {
                self.series_per_page = value.parse::<usize>().map_err(|_| {
                    TrackerError::invalid_config(key, "must be 0 (no paging) or a positive number")
                })?;
            }
            "compact_list" | "show_empty_series" => {
                let Some(flag) = parse_flag(value) else {
                    return Err(TrackerError::invalid_config(key, "expected yes or no"));
                };
                if key == "compact_list" {
                    self.compact_list = flag;
                } else {
                    self.show_empty_series = flag;
                }
            }
            _ => {
                return Err(TrackerError::invalid_config(
                    key,
                    format!("unknown setting (expected one of {})", CONFIG_KEYS.join(", ")),
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    fn sanitize(&mut self) {
        if !is_valid_limit(self.volume_limit) {
            warn!(
                volume_limit = self.volume_limit,
                "volume limit must be a positive multiple of {WORD_BITS}; using {DEFAULT_VOLUME_LIMIT}"
            );
            self.volume_limit = DEFAULT_VOLUME_LIMIT;
        }
        if self.database_name.trim().is_empty() {
            warn!("empty database name; using {DEFAULT_DATABASE_NAME}");
            self.database_name = DEFAULT_DATABASE_NAME.to_string();
        }
    }
}

/// Loads the config file, writing the defaults if none exists yet.
pub(crate) fn load_config(path: &Path) -> Result<TrackerConfig> {
    match std::fs::read_to_string(path) {
        Ok(data) => {
            let mut config: TrackerConfig = serde_json::from_str(&data).unwrap_or_else(|err| {
                warn!(path = %path.display(), "unreadable config ({err}); using defaults");
                TrackerConfig::default()
            });
            config.sanitize();
            Ok(config)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            let config = TrackerConfig::default();
            save_config(path, &config)?;
            info!(path = %path.display(), "wrote default config");
            Ok(config)
        }
        Err(err) => Err(TrackerError::io(path, err)),
    }
}

pub(crate) fn save_config(path: &Path, config: &TrackerConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| TrackerError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(config)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| TrackerError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| TrackerError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = load_config(&path).unwrap();
        assert_eq!(config, TrackerConfig::default());
        assert!(path.exists());
        assert_eq!(load_config(&path).unwrap(), config);
    }

    #[test]
    fn partial_and_invalid_files_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        std::fs::write(&path, r#"{"compact_list": true, "volume_limit": 100}"#).unwrap();
        let config = load_config(&path).unwrap();
        assert!(config.compact_list);
        assert_eq!(config.volume_limit, DEFAULT_VOLUME_LIMIT);
        assert_eq!(config.database_name, DEFAULT_DATABASE_NAME);

        std::fs::write(&path, "not json").unwrap();
        assert_eq!(load_config(&path).unwrap(), TrackerConfig::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = TrackerConfig::default();
        config.set("volume_limit", "256").unwrap();
        config.set("series_per_page", "10").unwrap();
        save_config(&path, &config).unwrap();
        assert_eq!(load_config(&path).unwrap(), config);
    }

    #[test]
    fn set_validates_values() {
        let mut config = TrackerConfig::default();
        assert!(config.set("volume_limit", "100").is_err());
        assert!(config.set("volume_limit", "0").is_err());
        assert!(config.set("database_name", "manga.sqlite").is_err());
        assert!(config.set("series_per_page", "-1").is_err());
        assert!(config.set("compact_list", "sometimes").is_err());
        assert!(config.set("colour", "red").is_err());
        assert_eq!(config, TrackerConfig::default());

        config.set("database_name", "books.db").unwrap();
        config.set("compact_list", "yes").unwrap();
        config.set("show_empty_series", "true").unwrap();
        assert_eq!(config.get("database_name").as_deref(), Some("books.db"));
        assert!(config.compact_list);
        assert!(config.show_empty_series);

        config.reset();
        assert_eq!(config, TrackerConfig::default());
    }
}
