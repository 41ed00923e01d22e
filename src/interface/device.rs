use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A servable location that replacement paths may point into.
///
/// Replacement paths name the device as a prefix: `sd:/mods/music` lives at
/// `root/mods/music` on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub name: String,
    pub root: PathBuf,
}

impl DeviceDescriptor {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self { name: name.into(), root: root.into() }
    }

    /// A name is usable as a path prefix if it is non-empty and contains
    /// neither `:` nor `/` nor NUL.
    pub fn has_valid_name(&self) -> bool {
        !self.name.is_empty() && !self.name.contains([':', '/', '\0'])
    }
}
