//! Host storage seen by the resolver.

use std::fs;
use std::io;
use std::path::Path;

#[cfg(any(test, feature = "mockall"))]
use mockall::automock;

/// Read-only queries the resolver needs from the storage behind a layer.
///
/// Implementations report a genuine absence as `Ok(false)` / `Ok(None)` and
/// reserve `Err` for failures reaching the storage itself.
#[cfg_attr(any(test, feature = "mockall"), automock)]
pub trait Backing: Send + Sync {
    /// Whether an entry (file or directory) exists at `path`.
    fn exists(&self, path: &Path) -> io::Result<bool>;

    /// Entry names of the directory at `path`, or `None` if there is no
    /// directory there.
    fn read_dir(&self, path: &Path) -> io::Result<Option<Vec<String>>>;
}

/// Backing on the host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFs;

impl Backing for HostFs {
    fn exists(&self, path: &Path) -> io::Result<bool> {
        match fs::metadata(path) {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn read_dir(&self, path: &Path) -> io::Result<Option<Vec<String>>> {
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(None),
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            match entry?.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => {
                    tracing::warn!(dir = %path.display(), name = ?raw, "Skipping non-UTF-8 entry");
                }
            }
        }
        Ok(Some(names))
    }
}
