// Configuration Storage Service
// Handles config file read/write and version backup

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::detection::rule_based::default_lexicon;
use super::requirement_segmenter::{SegmentMode, SegmenterConfig, DEFAULT_MIN_CANDIDATE_CHARS};

const MAX_BACKUPS: usize = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            proxy: None,
            detection: DetectionConfig::default(),
            oracle: OracleConfig::default(),
            providers: HashMap::new(),
            api_keys: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub enabled: bool,
    pub url: Option<String>,
}

impl AppConfig {
    /// Proxy URL when one is enabled and non-empty.
    pub fn active_proxy(&self) -> Option<&str> {
        self.proxy
            .as_ref()
            .filter(|p| p.enabled)
            .and_then(|p| p.url.as_deref())
            .filter(|u| !u.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionConfig {
    #[serde(default = "default_lexicon")]
    pub lexicon: Vec<String>,
    #[serde(default = "default_min_chars")]
    pub min_candidate_chars: usize,
    #[serde(default)]
    pub segment_mode: SegmentMode,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            lexicon: default_lexicon(),
            min_candidate_chars: DEFAULT_MIN_CANDIDATE_CHARS,
            segment_mode: SegmentMode::Structural,
        }
    }
}

impl DetectionConfig {
    pub fn segmenter_config(&self) -> SegmenterConfig {
        SegmenterConfig {
            min_candidate_chars: self.min_candidate_chars,
            mode: self.segment_mode,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleConfig {
    /// `name[:model]`; auto-selected from available keys when absent.
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: None,
            max_concurrency: default_max_concurrency(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
}

fn default_version() -> String { "1".to_string() }
fn default_min_chars() -> usize { DEFAULT_MIN_CANDIDATE_CHARS }
fn default_max_concurrency() -> usize { 4 }
fn default_timeout_secs() -> u64 { 60 }

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("reqlens"))
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.config_dir).map_err(|source| ConfigError::Io {
            path: self.config_dir.clone(),
            source,
        })
    }

    /// Load configuration from file; a missing file yields the defaults.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file).map_err(|source| ConfigError::Io {
            path: self.config_file.clone(),
            source,
        })?;

        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        self.ensure_dir()?;

        // Create backup if file exists
        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)?;

        fs::write(&self.config_file, content).map_err(|source| ConfigError::Io {
            path: self.config_file.clone(),
            source,
        })
    }

    /// Create a backup of current config
    fn create_backup(&self) -> Result<(), ConfigError> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir).map_err(|source| ConfigError::Io {
            path: backup_dir.clone(),
            source,
        })?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file).map_err(|source| ConfigError::Io {
            path: backup_file.clone(),
            source,
        })?;

        self.cleanup_old_backups(&backup_dir, MAX_BACKUPS);

        Ok(())
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) {
        let mut entries: Vec<_> = match fs::read_dir(backup_dir) {
            Ok(rd) => rd
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
                .collect(),
            Err(_) => return,
        };

        if entries.len() <= keep {
            return;
        }

        // File names carry the timestamp, so name order is age order.
        entries.sort_by_key(|e| e.file_name());

        let remove_count = entries.len() - keep;
        for entry in entries.iter().take(remove_count) {
            let _ = fs::remove_file(entry.path());
        }
    }
}

/// Load the config from the default location, falling back to defaults when
/// no config directory can be determined.
pub fn load_default_config() -> Result<AppConfig, ConfigError> {
    match ConfigStore::default_config_dir() {
        Some(dir) => ConfigStore::new(dir).load(),
        None => Ok(AppConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.detection.min_candidate_chars, 20);
        assert_eq!(config.detection.segment_mode, SegmentMode::Structural);
        assert!(config.detection.lexicon.iter().any(|t| t == "user-friendly"));
        assert_eq!(config.oracle.max_concurrency, 4);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{"detection": {"lexicon": ["soon"], "segmentMode": "sentence"}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.detection.lexicon, vec!["soon".to_string()]);
        assert_eq!(config.detection.segment_mode, SegmentMode::Sentence);
        assert_eq!(config.detection.min_candidate_chars, 20);
        assert_eq!(config.oracle.timeout_secs, 60);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nested"));
        let config = store.load().unwrap();
        assert_eq!(config.version, "1");
    }

    #[test]
    fn test_save_and_reload_with_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());

        let mut config = AppConfig::default();
        config.oracle.provider = Some("deepseek".to_string());
        store.save(&config).unwrap();
        config.api_keys.insert("deepseek".to_string(), "k".to_string());
        store.save(&config).unwrap();

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.oracle.provider.as_deref(), Some("deepseek"));
        assert_eq!(reloaded.api_keys.get("deepseek").map(String::as_str), Some("k"));

        let backups = fs::read_dir(dir.path().join("backups")).unwrap().count();
        assert_eq!(backups, 1);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), "{ nope").unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());
        assert!(matches!(store.load(), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_active_proxy() {
        let mut config = AppConfig::default();
        assert_eq!(config.active_proxy(), None);
        config.proxy = Some(ProxyConfig {
            enabled: true,
            url: Some("http://127.0.0.1:8080".to_string()),
        });
        assert_eq!(config.active_proxy(), Some("http://127.0.0.1:8080"));
    }
}
