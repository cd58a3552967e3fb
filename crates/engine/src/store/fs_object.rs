//! Filesystem object store
//!
//! A container is a directory under the root; an object name may contain `/`
//! and maps onto nested directories. Writes go to a hidden temp file and
//! become visible only when [`ObjectWrite::finish`] renames it into place.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use tablesnap_core::{ObjectStore, ObjectWrite, StoreError, StoreResult};
use uuid::Uuid;

const TEMP_PREFIX: &str = ".tmp-";

/// Object store rooted at a directory
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open a store; the directory must exist
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StoreError::Connection(format!(
                "object store directory '{}' does not exist",
                root.display()
            )));
        }
        Ok(FsObjectStore { root })
    }

    /// Store directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_path(&self, container: &str) -> StoreResult<PathBuf> {
        if container.is_empty() || container.contains(['/', '\\']) || container.starts_with('.') {
            return Err(StoreError::rejected(format!(
                "invalid container name '{}'",
                container
            )));
        }
        Ok(self.root.join(container))
    }

    fn object_path(&self, container: &str, name: &str) -> StoreResult<PathBuf> {
        let relative = Path::new(name);
        let plain = !name.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(StoreError::rejected(format!("invalid object name '{}'", name)));
        }
        Ok(self.container_path(container)?.join(relative))
    }

    fn existing_container(&self, container: &str) -> StoreResult<PathBuf> {
        let path = self.container_path(container)?;
        if !path.is_dir() {
            return Err(StoreError::ObjectNotFound(format!(
                "container '{}'",
                container
            )));
        }
        Ok(path)
    }
}

/// Pending object write
struct FsObjectWriter {
    out: Option<BufWriter<File>>,
    temp_path: PathBuf,
    final_path: PathBuf,
}

impl FsObjectWriter {
    fn out(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.out
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "object already finished"))
    }
}

impl Write for FsObjectWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out()?.flush()
    }
}

impl ObjectWrite for FsObjectWriter {
    fn finish(mut self: Box<Self>) -> StoreResult<()> {
        let out = self.out()?;
        out.flush()?;
        out.get_ref().sync_all()?;
        // Close before the rename.
        self.out = None;
        fs::rename(&self.temp_path, &self.final_path)?;
        Ok(())
    }
}

impl Drop for FsObjectWriter {
    fn drop(&mut self) {
        // Abandoned or failed writes leave nothing behind; after a rename this is a no-op.
        self.out = None;
        let _ = fs::remove_file(&self.temp_path);
    }
}

impl ObjectStore for FsObjectStore {
    fn create_container_if_not_exists(&self, container: &str) -> StoreResult<()> {
        fs::create_dir_all(self.container_path(container)?)?;
        Ok(())
    }

    fn container_exists(&self, container: &str) -> StoreResult<bool> {
        Ok(self.container_path(container)?.is_dir())
    }

    fn open_read(&self, container: &str, name: &str) -> StoreResult<Box<dyn Read + Send>> {
        self.existing_container(container)?;
        let path = self.object_path(container, name)?;
        match File::open(&path) {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::ObjectNotFound(
                format!("{}/{}", container, name),
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn open_write(&self, container: &str, name: &str) -> StoreResult<Box<dyn ObjectWrite>> {
        self.existing_container(container)?;
        let final_path = self.object_path(container, name)?;
        let parent = final_path
            .parent()
            .ok_or_else(|| StoreError::rejected(format!("invalid object name '{}'", name)))?;
        fs::create_dir_all(parent)?;
        let temp_path = parent.join(format!("{}{}", TEMP_PREFIX, Uuid::new_v4()));
        let out = BufWriter::new(File::create(&temp_path)?);
        Ok(Box::new(FsObjectWriter {
            out: Some(out),
            temp_path,
            final_path,
        }))
    }

    fn delete_if_exists(&self, container: &str, name: &str) -> StoreResult<bool> {
        let path = self.object_path(container, name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, container: &str, prefix: &str) -> StoreResult<Vec<String>> {
        let container_path = self.existing_container(container)?;
        let folder = prefix.trim_matches('/');
        let dir = if folder.is_empty() {
            container_path
        } else {
            self.object_path(container, folder)?
        };
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if file_name.starts_with(TEMP_PREFIX) {
                continue;
            }
            names.push(if folder.is_empty() {
                file_name
            } else {
                format!("{}/{}", folder, file_name)
            });
        }
        names.sort();
        Ok(names)
    }
}
