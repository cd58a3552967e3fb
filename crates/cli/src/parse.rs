//! ArgMatches → CliAction conversion.
//!
//! Config-file values are loaded first; flags given on the command line
//! override them.

use std::path::{Path, PathBuf};

use clap::ArgMatches;
use tablesnap_core::{Error, Filter, Result};
use tablesnap_engine::paths::table_folder;
use tablesnap_engine::{BackupOptions, RestoreOptions, TablesnapConfig, CONFIG_FILE_NAME};

/// Where a transfer reads from and writes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub blob_root: String,
    pub folder: String,
}

/// The parsed command.
#[derive(Debug)]
pub enum CliAction {
    Backup {
        endpoints: Endpoints,
        table: Option<String>,
        options: BackupOptions,
    },
    Restore {
        endpoints: Endpoints,
        file: Option<String>,
        table: Option<String>,
        /// Set when `file` lives in the per-table folder of this table and is
        /// downloaded to `working_dir` before restoring
        original: Option<Staging>,
        options: RestoreOptions,
    },
}

/// Download-then-restore details for `restore --original`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Staging {
    pub original_table: String,
    pub working_dir: PathBuf,
}

/// Convert matches into an action, loading the config file on the way.
pub fn matches_to_action(matches: &ArgMatches) -> Result<CliAction> {
    let config = load_config(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;

    match matches.subcommand() {
        Some(("backup", sub)) => {
            let mut options = config.backup_options();
            if sub.get_flag("compress") {
                options.compress = true;
            }
            if sub.get_flag("no-compress") {
                options.compress = false;
            }
            if sub.get_flag("validate") {
                options.validate = true;
            }
            if let Some(size) = sub.get_one::<usize>("page-size") {
                options.page_size = *size;
            }
            for text in strings(sub, "filter") {
                options.filters.push(Filter::parse(&text)?);
            }
            options.excluded_properties.extend(strings(sub, "exclude"));
            options.validate()?;

            Ok(CliAction::Backup {
                endpoints: endpoints(sub)?,
                table: sub.get_one::<String>("table").cloned(),
                options,
            })
        }
        Some(("restore", sub)) => {
            let mut options = config.restore_options();
            if let Some(size) = sub.get_one::<usize>("batch-size") {
                options = options.with_batch_size(*size);
            }
            let endpoints = endpoints(sub)?;
            let original = match sub.get_one::<String>("original") {
                Some(original) => Some(staging(sub, &config, &endpoints, original)?),
                None => None,
            };
            Ok(CliAction::Restore {
                endpoints,
                file: sub.get_one::<String>("file").cloned(),
                table: sub.get_one::<String>("table").cloned(),
                original,
                options,
            })
        }
        Some((other, _)) => Err(Error::parameter(format!("Unknown operation '{}'.", other))),
        None => Err(Error::parameter("No operation given.")),
    }
}

fn load_config(path: Option<&Path>) -> Result<TablesnapConfig> {
    match path {
        Some(path) => TablesnapConfig::from_file(path),
        None => TablesnapConfig::load_or_default(Path::new(CONFIG_FILE_NAME)),
    }
}

/// The folder positional must be the original table's folder; the download
/// directory comes from `--work-dir`, then the config, then the temp dir.
fn staging(
    matches: &ArgMatches,
    config: &TablesnapConfig,
    endpoints: &Endpoints,
    original: &str,
) -> Result<Staging> {
    let expected = table_folder(&endpoints.blob_root, original);
    if endpoints.folder.trim_end_matches('/') != expected {
        return Err(Error::parameter(format!(
            "Folder '{}' does not hold snapshots of table '{}'; expected '{}'.",
            endpoints.folder, original, expected
        )));
    }
    let dir = matches
        .get_one::<PathBuf>("work-dir")
        .cloned()
        .or_else(|| config.working_directory.clone())
        .unwrap_or_else(std::env::temp_dir);
    let working_dir = if dir.is_absolute() {
        dir
    } else {
        std::env::current_dir()?.join(dir)
    };
    Ok(Staging {
        original_table: original.to_string(),
        working_dir,
    })
}

fn strings(matches: &ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

fn endpoints(matches: &ArgMatches) -> Result<Endpoints> {
    let value = |id: &str| -> Result<String> {
        matches
            .get_one::<String>(id)
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .ok_or_else(|| Error::parameter(format!("{} is missing.", id)))
    };
    Ok(Endpoints {
        source: PathBuf::from(value("source")?),
        destination: PathBuf::from(value("destination")?),
        blob_root: value("name")?,
        folder: value("folder")?,
    })
}
