//! Snapshot naming in local directories and object containers

use chrono::{DateTime, Local};
use tablesnap_snapshot::compression::{self, COMPRESSED_SUFFIX, PLAIN_SUFFIX};

/// `{Table}_Backup_{yyyyMMddHHmmss}`
pub fn backup_base_name(table: &str, at: &DateTime<Local>) -> String {
    format!("{}_Backup_{}", table, at.format("%Y%m%d%H%M%S"))
}

/// Local snapshot file name: base name plus `.txt` or `.7z`
pub fn backup_file_name(table: &str, at: &DateTime<Local>, compress: bool) -> String {
    format!("{}{}", backup_base_name(table, at), compression::suffix(compress))
}

/// Container holding a blob root's snapshots
pub fn container_name(blob_root: &str) -> String {
    blob_root.to_lowercase()
}

/// Default object folder for a table: `{blobroot}-table-{table}`, lowercased
pub fn table_folder(blob_root: &str, table: &str) -> String {
    format!("{}-table-{}", blob_root.to_lowercase(), table.to_lowercase())
}

/// `{table_folder}/{file_name}`
pub fn table_object_name(blob_root: &str, table: &str, file_name: &str) -> String {
    format!("{}/{}", table_folder(blob_root, table), file_name)
}

/// Direct-to-object name: `{folder}/{file}.txt`, plus `.7z` when compressed
pub fn direct_object_name(folder: &str, file_name: &str, compress: bool) -> String {
    let extension = if compress {
        format!("{}{}", PLAIN_SUFFIX, COMPRESSED_SUFFIX)
    } else {
        PLAIN_SUFFIX.to_string()
    };
    let folder = folder.trim_end_matches('/');
    if folder.is_empty() {
        format!("{}{}", file_name, extension)
    } else {
        format!("{}/{}{}", folder, file_name, extension)
    }
}

/// Table name a snapshot object restores into: last path segment up to the first `.`
pub fn table_name_from_object(name: &str) -> &str {
    let file = name.rsplit('/').next().unwrap_or(name);
    file.split('.').next().unwrap_or(file)
}
