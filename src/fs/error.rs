use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type PathResult<T> = Result<T, PathError>;

pub type ResolveResult<T> = Result<T, ResolveError>;

/// Rejections of a logical or replacement path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Path too long: {0} bytes (max 4096)")]
    PathTooLong(usize),

    #[error("Filename too long: {0} bytes (max 255)")]
    FilenameTooLong(usize),

    #[error("Not a device path: {0}")]
    NotDevicePath(String),
}

/// Failures while consulting a layer's replacement tree.
///
/// A genuine absence is never an error; it is reported through the
/// resolution result instead.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ResolveError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ResolveError::Io { path: path.into(), source }
    }

    /// Convert to POSIX errno for the filesystem caller.
    pub fn to_errno(&self) -> i32 {
        match self {
            ResolveError::Path(PathError::PathTooLong(_) | PathError::FilenameTooLong(_)) => {
                libc::ENAMETOOLONG
            }
            ResolveError::Path(_) => libc::EINVAL,
            ResolveError::DeviceUnavailable(_) => libc::ENODEV,
            ResolveError::Io { source, .. } => source.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_path_error() {
        let err = PathError::InvalidPath("empty".to_string());
        assert_eq!(err.to_string(), "Invalid path: empty");
    }

    #[test]
    fn test_path_too_long_error() {
        let err = PathError::PathTooLong(5000);
        assert_eq!(err.to_string(), "Path too long: 5000 bytes (max 4096)");
    }

    #[test]
    fn test_filename_too_long_error() {
        let err = PathError::FilenameTooLong(300);
        assert_eq!(err.to_string(), "Filename too long: 300 bytes (max 255)");
    }

    #[test]
    fn test_device_unavailable_errno() {
        let err = ResolveError::DeviceUnavailable("sd".to_string());
        assert_eq!(err.to_string(), "Device unavailable: sd");
        assert_eq!(err.to_errno(), libc::ENODEV);
    }

    #[test]
    fn test_io_error_keeps_os_errno() {
        let err = ResolveError::io("/mods", io::Error::from_raw_os_error(libc::EACCES));
        assert_eq!(err.to_errno(), libc::EACCES);
        assert!(err.to_string().starts_with("IO error at /mods"));
    }

    #[test]
    fn test_io_error_without_os_errno() {
        let err = ResolveError::io("/mods", io::Error::other("boom"));
        assert_eq!(err.to_errno(), libc::EIO);
    }

    #[test]
    fn test_path_errno() {
        let too_long = ResolveError::from(PathError::FilenameTooLong(256));
        assert_eq!(too_long.to_errno(), libc::ENAMETOOLONG);
        assert_eq!(
            ResolveError::from(PathError::InvalidPath("x".to_string())).to_errno(),
            libc::EINVAL
        );
    }
}
