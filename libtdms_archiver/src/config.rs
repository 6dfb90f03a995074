use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::ConfigError;
use super::naming::DEFAULT_COLUMN_PREFIX;

/// Policy for a column whose samples already exist in the target table.
///
/// `Allow` appends anyway, which is what happens when a merge succeeded but its commit did not.
/// `SkipIdentical` checks the table first and skips the append if any column holds
/// bit-identical samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    #[default]
    Allow,
    SkipIdentical,
}

/// Where tables are persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StoreConfig {
    /// A local .xlsx workbook, one sheet per table
    Workbook { path: PathBuf },
    /// A remote spreadsheet, one worksheet per table
    Sheets {
        spreadsheet_id: String,
        token_env: String,
        endpoint: String,
    },
}

/// Remote copy of the local workbook, upserted by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadConfig {
    pub drive_name: String,
    pub token_env: String,
    pub endpoint: String,
}

/// Structure representing the application configuration. Contains pathing, polling and storage
/// information. Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub watch_path: PathBuf,
    pub extension: String,
    pub group_name: Option<String>,
    pub channel_name: Option<String>,
    pub column_prefix: String,
    pub poll_interval_secs: u64,
    pub processed_log_path: PathBuf,
    pub store: StoreConfig,
    pub upload: Option<UploadConfig>,
    pub duplicate_policy: DuplicatePolicy,
    pub n_threads: i32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Workbook {
            path: PathBuf::from("final_data.xlsx"),
        }
    }
}

impl Default for Config {
    /// Generate a new Config object. The watch path is a placeholder and must be filled in
    fn default() -> Self {
        Self {
            watch_path: PathBuf::from("None"),
            extension: String::from("tdms"),
            group_name: None,
            channel_name: Some(String::from("accelerationgroup")),
            column_prefix: String::from(DEFAULT_COLUMN_PREFIX),
            poll_interval_secs: 30,
            processed_log_path: PathBuf::from("processed_files.log"),
            store: StoreConfig::default(),
            upload: None,
            duplicate_policy: DuplicatePolicy::Allow,
            n_threads: 1,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Check everything that would make the monitor unable to start
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.watch_path.is_dir() {
            return Err(ConfigError::BadWatchPath(self.watch_path.clone()));
        }
        if !self.is_n_threads_valid() {
            return Err(ConfigError::BadThreadCount(self.n_threads));
        }
        if self.has_upload() && self.workbook_path().is_none() {
            return Err(ConfigError::UploadWithoutWorkbook);
        }
        Ok(())
    }

    /// Does the path carry the configured extension (case-insensitive, dot optional in config)
    pub fn matches_extension(&self, path: &Path) -> bool {
        let wanted = self.extension.trim_start_matches('.');
        match path.extension() {
            Some(ext) => ext.to_string_lossy().eq_ignore_ascii_case(wanted),
            None => false,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }

    pub fn has_upload(&self) -> bool {
        self.upload.is_some()
    }

    pub fn workbook_path(&self) -> Option<&Path> {
        match &self.store {
            StoreConfig::Workbook { path } => Some(path),
            StoreConfig::Sheets { .. } => None,
        }
    }
}

/// Read an access token from the named environment variable
pub fn read_token(env_name: &str) -> Result<String, ConfigError> {
    match std::env::var(env_name) {
        Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(ConfigError::MissingCredentials(env_name.to_string())),
    }
}
