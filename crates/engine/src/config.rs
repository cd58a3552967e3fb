//! Tool configuration via `tablesnap.toml`
//!
//! The file is optional. Every key has a default, and command-line flags
//! override whatever the file says.

use crate::options::{check_batch_size, BackupOptions, RestoreOptions, DEFAULT_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tablesnap_core::{Error, Result};

/// Config file name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "tablesnap.toml";

/// Defaults loaded from `tablesnap.toml`.
///
/// # Example
///
/// ```toml
/// compress = true
/// validate = true
/// page_size = 100
/// batch_size = 100
/// excluded_properties = ["Secret"]
/// working_directory = "/var/tmp/tablesnap"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TablesnapConfig {
    /// Gzip snapshots
    #[serde(default)]
    pub compress: bool,
    /// Validate file backups after writing
    #[serde(default)]
    pub validate: bool,
    /// Rows per source query page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Restore batch cap; unset keeps the per-operation default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    /// Properties left out of every snapshot
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_properties: Vec<String>,
    /// Download directory for `restore --original`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for TablesnapConfig {
    fn default() -> Self {
        Self {
            compress: false,
            validate: false,
            page_size: default_page_size(),
            batch_size: None,
            excluded_properties: Vec::new(),
            working_directory: None,
        }
    }
}

impl TablesnapConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# tablesnap configuration
#
# Gzip snapshots (written with a .7z suffix)
compress = false

# Re-read file backups and check the footer count
validate = false

# Rows fetched per source query page
page_size = 100

# Restore transaction size (1..=100). Unset: 98 for file restores,
# 100 for streamed restores.
# batch_size = 100

# Properties never written to a snapshot
# excluded_properties = ["Secret"]

# Scratch directory for downloaded snapshots
# working_directory = "/tmp"
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, `Parameter` if it does not parse or
    /// holds out-of-range values.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TablesnapConfig = toml::from_str(&content).map_err(|e| {
            Error::parameter(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::parameter("page_size must be at least 1."));
        }
        if let Some(size) = self.batch_size {
            check_batch_size(size)?;
        }
        Ok(())
    }

    /// Backup options seeded from this config
    pub fn backup_options(&self) -> BackupOptions {
        BackupOptions {
            compress: self.compress,
            validate: self.validate,
            page_size: self.page_size,
            excluded_properties: self.excluded_properties.clone(),
            ..BackupOptions::default()
        }
    }

    /// Restore options seeded from this config
    pub fn restore_options(&self) -> RestoreOptions {
        RestoreOptions {
            batch_size: self.batch_size,
            ..RestoreOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_toml_parses_correctly() {
        let config: TablesnapConfig = toml::from_str(TablesnapConfig::default_toml()).unwrap();
        assert_eq!(config, TablesnapConfig::default());
    }

    #[test]
    fn from_file_with_missing_fields_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "compress = true\n").unwrap();

        let config = TablesnapConfig::from_file(&path).unwrap();
        assert!(config.compress);
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert!(config.batch_size.is_none());
    }

    #[test]
    fn out_of_range_batch_size_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "batch_size = 500\n").unwrap();

        let err = TablesnapConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::Parameter(_)));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "compresss = true\n").unwrap();
        assert!(matches!(
            TablesnapConfig::from_file(&path),
            Err(Error::Parameter(_))
        ));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = TablesnapConfig::load_or_default(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config, TablesnapConfig::default());
    }

    #[test]
    fn options_are_seeded_from_config() {
        let config: TablesnapConfig = toml::from_str(
            r#"
compress = true
validate = true
page_size = 25
batch_size = 50
excluded_properties = ["Secret"]
"#,
        )
        .unwrap();
        let backup = config.backup_options();
        assert!(backup.compress);
        assert!(backup.validate);
        assert_eq!(backup.page_size, 25);
        assert_eq!(backup.excluded_properties, vec!["Secret".to_string()]);
        assert_eq!(config.restore_options().batch_size, Some(50));
    }

    #[test]
    fn round_trip_through_toml() {
        let config = TablesnapConfig {
            compress: true,
            working_directory: Some(PathBuf::from("/tmp/scratch")),
            ..TablesnapConfig::default()
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: TablesnapConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
        assert!(!text.contains("batch_size"));
    }
}
