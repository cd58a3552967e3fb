//! tablesnap CLI: back up and restore tables through an object store.
//!
//! - `tablesnap backup <tables> <objects> <name> <folder>`
//! - `tablesnap restore <objects> <tables> <name> <folder>`
//!
//! `restore --file F --original T` restores `{name}-table-{t}/F` by
//! downloading it into a working directory first.
//!
//! Exit status is 0 on success with the summary on stdout, 1 on failure with
//! the error chain on stderr, and 2 for usage errors.

mod commands;
mod parse;

use std::process;
use std::sync::Arc;

use tablesnap_core::{ObjectStore, Result};
use tablesnap_engine::paths::{container_name, table_name_from_object};
use tablesnap_engine::{
    BackupOptions, BackupService, DirTableStore, FsObjectStore, RestoreOptions, RestoreService,
};
use tablesnap_snapshot::{is_compressed_name, open_source};
use tracing::error;

use commands::build_cli;
use parse::{matches_to_action, CliAction, Endpoints, Staging};

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let matches = build_cli().get_matches();

    let outcome = matches_to_action(&matches).and_then(run);
    match outcome {
        Ok(summary) => println!("{}", summary),
        Err(e) => {
            error!(error = %e, "Operation failed");
            eprintln!("{}", error_chain(&e));
            process::exit(1);
        }
    }
}

fn run(action: CliAction) -> Result<String> {
    match action {
        CliAction::Backup {
            endpoints,
            table,
            options,
        } => run_backup(&endpoints, table.as_deref(), &options),
        CliAction::Restore {
            endpoints,
            file,
            table,
            original,
            options,
        } => run_restore(
            &endpoints,
            file.as_deref(),
            table.as_deref(),
            original.as_ref(),
            &options,
        ),
    }
}

fn run_backup(endpoints: &Endpoints, table: Option<&str>, options: &BackupOptions) -> Result<String> {
    let tables = Arc::new(DirTableStore::open(&endpoints.source)?);
    let objects = Arc::new(FsObjectStore::open(&endpoints.destination)?);
    let service = BackupService::new(tables).with_object_store(objects);
    let folder = endpoints.folder.as_str();

    // with options.validate each object is read back as it is written
    match table {
        Some(table) => service.backup_table_to_blob_direct(
            table,
            &endpoints.blob_root,
            Some(folder),
            Some(table),
            options,
        ),
        None => service.backup_all_tables_to_blob(&endpoints.blob_root, Some(folder), options),
    }
}

fn run_restore(
    endpoints: &Endpoints,
    file: Option<&str>,
    table: Option<&str>,
    original: Option<&Staging>,
    options: &RestoreOptions,
) -> Result<String> {
    let objects = Arc::new(FsObjectStore::open(&endpoints.source)?);
    let tables = Arc::new(DirTableStore::open(&endpoints.destination)?);
    let service = RestoreService::new(tables).with_object_store(objects.clone());

    match (file, original) {
        (Some(file), Some(staging)) => service.restore_table_from_blob(
            table.unwrap_or(&staging.original_table),
            &staging.original_table,
            &endpoints.blob_root,
            &staging.working_dir,
            file,
            options,
        ),
        (Some(file), None) => {
            let object = format!("{}/{}", endpoints.folder.trim_end_matches('/'), file);
            let table = table.unwrap_or_else(|| table_name_from_object(file));
            let container = container_name(&endpoints.blob_root);
            let source = open_source(objects.open_read(&container, &object)?, is_compressed_name(file));
            service.restore_from_reader(table, source, options)
        }
        (None, _) => {
            service.restore_all_tables_from_blob(&endpoints.blob_root, &endpoints.folder, options)
        }
    }
}

/// `Display` of the error followed by each source on its own line
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str("\n  caused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
