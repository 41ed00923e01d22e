use crate::fs::error::{PathError, PathResult};

const MAX_PATH_LENGTH: usize = 4096;
const MAX_FILENAME_LENGTH: usize = 255;

pub fn normalize_path(path: &str) -> PathResult<String> {
    if path.is_empty() {
        return Err(PathError::InvalidPath("Empty path".to_string()));
    }

    if path.contains('\0') {
        return Err(PathError::InvalidPath("Path contains NULL character".to_string()));
    }

    if path.len() > MAX_PATH_LENGTH {
        return Err(PathError::PathTooLong(path.len()));
    }

    if !path.starts_with('/') {
        return Err(PathError::InvalidPath("Path must start with /".to_string()));
    }

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty() && *s != ".").collect();

    for part in &parts {
        if *part == ".." {
            return Err(PathError::InvalidPath(format!("Parent traversal in '{}'", path)));
        }
        if part.len() > MAX_FILENAME_LENGTH {
            return Err(PathError::FilenameTooLong(part.len()));
        }
    }

    Ok(format!("/{}", parts.join("/")))
}

pub fn split_path(path: &str) -> PathResult<(String, String)> {
    let normalized = normalize_path(path)?;

    if normalized == "/" {
        return Err(PathError::InvalidPath("Cannot split root path".to_string()));
    }

    match normalized.rfind('/') {
        Some(0) => Ok(("/".to_string(), normalized[1..].to_string())),
        Some(pos) => Ok((normalized[..pos].to_string(), normalized[pos + 1..].to_string())),
        None => Err(PathError::InvalidPath("Empty path after split".to_string())),
    }
}

/// Path of `path` below `root`, on whole components.
///
/// Both arguments must already be normalized. Returns `Some("")` when they are
/// equal and `None` when `path` lies outside `root`.
pub fn relative_to<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    if root == "/" {
        return Some(path.trim_start_matches('/'));
    }
    let rest = path.strip_prefix(root)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix('/')
    }
}

/// Split a replacement path of the form `device:/some/dir`.
///
/// The device part is returned verbatim and the path part normalized.
pub fn parse_device_path(path: &str) -> PathResult<(String, String)> {
    let (device, rest) =
        path.split_once(':').ok_or_else(|| PathError::NotDevicePath(path.to_string()))?;

    if device.is_empty() || device.contains('/') {
        return Err(PathError::NotDevicePath(path.to_string()));
    }

    let rest = if rest.is_empty() { "/" } else { rest };
    Ok((device.to_string(), normalize_path(rest)?))
}
