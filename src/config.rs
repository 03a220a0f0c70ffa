use std::path::{Path, PathBuf};

use ::config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::debug;

use crate::core::{Result, ScanError};
use crate::scan::ScanOptions;

/// Config files probed in order when no explicit path is given; the first one found wins.
const CONFIG_PATHS: [&str; 2] = ["./pgscan.toml", "/etc/pgscan/pgscan.toml"];

/// Scanner configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_connection_string")]
    pub connection_string: String,
    #[serde(default = "default_pages_per_task")]
    pub pages_per_task: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub max_workers: Option<usize>,
    #[serde(default = "default_filter_pushdown")]
    pub filter_pushdown: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_connection_string() -> String { "host=localhost user=postgres".to_string() }
fn default_pages_per_task() -> u64 { 1000 }
fn default_batch_size() -> usize { 2048 }
fn default_filter_pushdown() -> bool { true }
fn default_log_level() -> String { "info".to_string() }

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            connection_string: default_connection_string(),
            pages_per_task: default_pages_per_task(),
            batch_size: default_batch_size(),
            max_workers: None,
            filter_pushdown: default_filter_pushdown(),
            log_level: default_log_level(),
        }
    }
}

/// Values given on the command line; they override every other source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub connection_string: Option<String>,
    pub pages_per_task: Option<u64>,
    pub batch_size: Option<usize>,
    pub max_workers: Option<usize>,
    pub filter_pushdown: Option<bool>,
    pub log_level: Option<String>,
}

impl ScanConfig {
    /// Load configuration with priority: CLI args > ENV (`PGSCAN_*`) > config file > defaults
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(File::new(&path.to_string_lossy(), FileFormat::Toml).required(true));
            }
            None => {
                if let Some(found) = CONFIG_PATHS.iter().map(PathBuf::from).find(|p| p.exists()) {
                    debug!(path = %found.display(), "loading config file");
                    builder = builder.add_source(File::new(&found.to_string_lossy(), FileFormat::Toml));
                }
            }
        }

        builder = builder.add_source(Environment::with_prefix("PGSCAN").try_parsing(true));

        let mut config: Self = builder.build()?.try_deserialize()?;
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(conn) = &overrides.connection_string {
            self.connection_string.clone_from(conn);
        }
        if let Some(pages) = overrides.pages_per_task {
            self.pages_per_task = pages;
        }
        if let Some(batch) = overrides.batch_size {
            self.batch_size = batch;
        }
        if overrides.max_workers.is_some() {
            self.max_workers = overrides.max_workers;
        }
        if let Some(pushdown) = overrides.filter_pushdown {
            self.filter_pushdown = pushdown;
        }
        if let Some(level) = &overrides.log_level {
            self.log_level.clone_from(level);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pages_per_task == 0 {
            return Err(ScanError::InvalidConfig("pages_per_task must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(ScanError::InvalidConfig("batch_size must be positive".to_string()));
        }
        if self.max_workers == Some(0) {
            return Err(ScanError::InvalidConfig("max_workers must be positive when set".to_string()));
        }
        Ok(())
    }

    #[must_use]
    pub const fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            pages_per_task: self.pages_per_task,
            batch_size: self.batch_size,
            max_workers: self.max_workers,
            filter_pushdown: self.filter_pushdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.pages_per_task, 1000);
        assert_eq!(config.batch_size, 2048);
        assert!(config.filter_pushdown);
        assert!(config.validate().is_ok());
        assert_eq!(config.scan_options(), ScanOptions::default());
    }

    #[test]
    fn test_load_file_with_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "connection_string = \"host=db user=reader\"\npages_per_task = 250\nfilter_pushdown = false"
        )
        .unwrap();

        let overrides = ConfigOverrides {
            batch_size: Some(100),
            ..ConfigOverrides::default()
        };
        let config = ScanConfig::load(Some(file.path()), &overrides).unwrap();
        assert_eq!(config.connection_string, "host=db user=reader");
        assert_eq!(config.pages_per_task, 250);
        assert_eq!(config.batch_size, 100);
        assert!(!config.filter_pushdown);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_override_wins_over_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "pages_per_task = 250").unwrap();
        let overrides = ConfigOverrides {
            pages_per_task: Some(5),
            ..ConfigOverrides::default()
        };
        let config = ScanConfig::load(Some(file.path()), &overrides).unwrap();
        assert_eq!(config.pages_per_task, 5);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "batch_size = 0").unwrap();
        let err = ScanConfig::load(Some(file.path()), &ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, ScanError::InvalidConfig(_)));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = ScanConfig::load(Some(Path::new("/nonexistent/pgscan.toml")), &ConfigOverrides::default());
        assert!(matches!(result, Err(ScanError::Config(_))));
    }
}
