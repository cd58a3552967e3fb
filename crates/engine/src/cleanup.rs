//! Scratch-file cleanup that never masks the primary outcome

use std::io;
use std::path::Path;
use tablesnap_core::{Error, Result};
use tracing::warn;

/// Remove a local scratch file; a missing file is not an error
pub(crate) fn remove_scratch(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Combine an operation's outcome with its cleanup.
///
/// A cleanup failure is returned only when the operation itself succeeded;
/// otherwise it is logged and the original error wins.
pub(crate) fn with_cleanup<T>(outcome: Result<T>, cleanup: io::Result<()>, path: &Path) -> Result<T> {
    match (outcome, cleanup) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(source)) => Err(Error::Cleanup {
            path: path.to_path_buf(),
            source,
        }),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(cleanup_err)) => {
            warn!(target: "tablesnap::store", path = %path.display(), error = %cleanup_err, "Error cleaning up scratch file");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remove_scratch_tolerates_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scratch");
        assert!(remove_scratch(&path).is_ok());
        std::fs::write(&path, b"x").unwrap();
        assert!(remove_scratch(&path).is_ok());
        assert!(!path.exists());
    }

    #[test]
    fn test_cleanup_error_surfaces_after_success() {
        let err = with_cleanup(
            Ok(1),
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")),
            Path::new("/tmp/x"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Cleanup { .. }));
    }

    #[test]
    fn test_cleanup_error_does_not_mask_failure() {
        let err = with_cleanup::<()>(
            Err(Error::Cancelled),
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")),
            Path::new("/tmp/x"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
