//! Directory-backed location

use cairn_codec::RawStream;
use cairn_core::{Error, FileAccess, FileMode, Result};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use super::Location;

/// Optional prefix accepted in disk connection strings
const PATH_PREFIX: &str = "path=";

/// Stores files below a root directory
#[derive(Debug, Clone)]
pub struct DiskLocation {
    name: String,
    root: Option<PathBuf>,
}

impl DiskLocation {
    /// Create an unconnected location
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: None,
        }
    }

    /// Create a location rooted at `root`
    pub fn open(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let mut location = Self::new(name);
        location.set_connection(&root.as_ref().to_string_lossy())?;
        Ok(location)
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let root = self.root.as_ref().ok_or_else(|| Error::unavailable(&self.name))?;
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if path.is_empty() || escapes {
            return Err(Error::unsupported(
                "resolve path",
                format!("'{path}' is not a relative path inside the location"),
            ));
        }
        Ok(root.join(relative))
    }
}

impl Location for DiskLocation {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_connection(&mut self, connection: &str) -> Result<()> {
        let trimmed = connection.trim();
        let root = PathBuf::from(trimmed.strip_prefix(PATH_PREFIX).unwrap_or(trimmed));
        if root.as_os_str().is_empty() {
            return Err(Error::configuration(format!(
                "disk location '{}' needs a directory",
                self.name
            )));
        }
        fs::create_dir_all(&root)
            .map_err(|e| Error::io(root.display().to_string(), "create location root", e))?;
        debug!(location = %self.name, root = %root.display(), "Disk location connected");
        self.root = Some(root);
        Ok(())
    }

    fn open_file(
        &self,
        path: &str,
        mode: FileMode,
        access: FileAccess,
    ) -> Result<Option<Box<dyn RawStream>>> {
        let full = self.resolve(path)?;
        if mode.creates() {
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::io(parent.display().to_string(), "create parent directory", e)
                })?;
            }
        }

        // block writes read back partial blocks, so writable handles also read
        let writable = access.can_write() || mode.creates() || mode.truncates();
        let mut options = OpenOptions::new();
        options.read(true).write(writable);
        match mode {
            FileMode::Open => {}
            FileMode::Create => {
                options.create(true).truncate(true);
            }
            FileMode::CreateNew => {
                options.create_new(true);
            }
            FileMode::Append => {
                options.create(true);
            }
            FileMode::Truncate => {
                options.truncate(true);
            }
        }

        match options.open(&full) {
            Ok(file) => Ok(Some(Box::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound && !mode.creates() => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(Error::already_exists(path)),
            Err(e) => Err(Error::io(full.display().to_string(), "open file", e)),
        }
    }

    fn delete_file(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        match fs::remove_file(&full) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(full.display().to_string(), "delete file", e)),
        }
    }

    fn is_available(&self) -> bool {
        self.root.as_ref().is_some_and(|root| root.is_dir())
    }
}
