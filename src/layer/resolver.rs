//! Path resolution through a layer stack.
//!
//! Layers are consulted from highest to lowest priority:
//! - a replace layer that claims the path answers authoritatively, found or not;
//! - a merge layer answers if it holds the entry, hides it if it holds a
//!   deletion marker for it, and otherwise defers to the layers below;
//! - unclaimed paths pass through to the original volume.
//!
//! Nothing is cached. Every lookup reads the stack and the backing storage as
//! they are at that moment.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use super::kind::LayerKind;
use super::stack::{LayerStack, RedirectionLayer};
use crate::fs::path::{normalize_path, relative_to, split_path};
use crate::fs::{Backing, ResolveError, ResolveResult};
use crate::types::LayerHandle;

/// Prefix of the sibling file that hides an entry in a merge layer.
pub const DELETION_MARKER: &str = ".deleted_";

/// Whether `marker` can serve as a deletion marker prefix: non-empty and a
/// single file name fragment.
pub fn is_valid_marker(marker: &str) -> bool {
    !marker.is_empty() && !marker.contains(['/', '\0'])
}

/// Maps device names to the host directories backing them.
pub trait DeviceMap {
    fn host_root(&self, device: &str) -> Option<PathBuf>;
}

impl DeviceMap for HashMap<String, PathBuf> {
    fn host_root(&self, device: &str) -> Option<PathBuf> {
        self.get(device).cloned()
    }
}

/// Outcome of resolving one logical path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum Resolution {
    /// Served from a layer's replacement tree.
    Redirected { layer: LayerHandle, host_path: PathBuf },
    /// Hidden by a deletion marker in a merge layer.
    Whiteout { layer: LayerHandle },
    /// Claimed by a replace layer that does not hold the entry.
    Absent { layer: LayerHandle },
    /// No layer answered; the original volume decides.
    Original { path: String },
}

impl Resolution {
    /// Whether a layer definitively reported the entry as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Resolution::Whiteout { .. } | Resolution::Absent { .. })
    }

    /// The layer that decided the outcome, if any.
    pub fn layer(&self) -> Option<LayerHandle> {
        match self {
            Resolution::Redirected { layer, .. }
            | Resolution::Whiteout { layer }
            | Resolution::Absent { layer } => Some(*layer),
            Resolution::Original { .. } => None,
        }
    }

    pub fn host_path(&self) -> Option<&Path> {
        match self {
            Resolution::Redirected { host_path, .. } => Some(host_path),
            _ => None,
        }
    }
}

/// Resolves logical paths against a [`LayerStack`].
pub struct Resolver<'a, D: ?Sized, B: ?Sized> {
    devices: &'a D,
    backing: &'a B,
    marker: &'a str,
}

impl<'a, D, B> Resolver<'a, D, B>
where
    D: DeviceMap + ?Sized,
    B: Backing + ?Sized,
{
    pub fn new(devices: &'a D, backing: &'a B) -> Self {
        Self { devices, backing, marker: DELETION_MARKER }
    }

    /// Use a different deletion marker prefix. An invalid marker is ignored
    /// and the default stays in effect.
    pub fn with_marker(mut self, marker: &'a str) -> Self {
        if is_valid_marker(marker) {
            self.marker = marker;
        } else {
            tracing::warn!(marker, "Ignoring invalid deletion marker");
        }
        self
    }

    /// Resolve `path` through the active layers of `stack`.
    pub fn resolve(&self, stack: &LayerStack, path: &str) -> ResolveResult<Resolution> {
        let path = normalize_path(path)?;

        for layer in stack.active() {
            let Some(rel) = claimed(layer, &path) else {
                continue;
            };

            match layer.kind {
                LayerKind::ReplaceDirectory | LayerKind::ReplaceFile => {
                    let host_path = join_rel(&self.replacement_root(layer)?, rel);
                    let outcome = if self.exists(&host_path)? {
                        Resolution::Redirected { layer: layer.handle, host_path }
                    } else {
                        Resolution::Absent { layer: layer.handle }
                    };
                    tracing::trace!(handle = %layer.handle, path = %path, ?outcome, "Replace layer");
                    return Ok(outcome);
                }
                LayerKind::MergeDirectory => {
                    if let Some(outcome) = self.consult_merge(layer, rel)? {
                        tracing::trace!(handle = %layer.handle, path = %path, ?outcome, "Merge layer");
                        return Ok(outcome);
                    }
                    tracing::trace!(handle = %layer.handle, path = %path, "Merge layer fell through");
                }
            }
        }

        Ok(Resolution::Original { path })
    }

    /// Merged listing of the directory at `path`.
    ///
    /// `original` is the listing of the original volume at `path`, or `None`
    /// if the original has no directory there. Returns `None` if no source
    /// provides a directory at `path`.
    pub fn list_directory(
        &self,
        stack: &LayerStack,
        path: &str,
        original: Option<Vec<String>>,
    ) -> ResolveResult<Option<Vec<String>>> {
        let path = normalize_path(path)?;
        let mut found = original.is_some();
        let mut entries: BTreeSet<String> = original.unwrap_or_default().into_iter().collect();

        // Lowest priority first so higher layers overwrite what is below.
        for layer in stack.active().rev() {
            if let Some(rel) = claimed(layer, &path) {
                let dir = join_rel(&self.replacement_root(layer)?, rel);
                let listing = self.read_dir(&dir)?;

                if layer.kind.is_replace() {
                    found = listing.is_some();
                    entries = listing.unwrap_or_default().into_iter().collect();
                } else if let Some(names) = listing {
                    found = true;
                    let (hidden, visible): (Vec<_>, Vec<_>) =
                        names.into_iter().partition(|n| n.starts_with(self.marker));
                    entries.extend(visible);
                    for marker in hidden {
                        entries.remove(&marker[self.marker.len()..]);
                    }
                }
            } else if let Some(name) = child_name(&layer.target_root, &path) {
                // The layer's target is a direct child of the listed directory.
                let present = self.exists(&self.replacement_root(layer)?)?;
                if present {
                    entries.insert(name);
                } else if layer.kind.is_replace() {
                    entries.remove(&name);
                }
            }
        }

        Ok(found.then(|| entries.into_iter().collect()))
    }

    /// `None` means the merge layer has nothing to say about `rel`.
    fn consult_merge(
        &self,
        layer: &RedirectionLayer,
        rel: &str,
    ) -> ResolveResult<Option<Resolution>> {
        let root = self.replacement_root(layer)?;

        if rel.is_empty() {
            return Ok(self
                .exists(&root)?
                .then(|| Resolution::Redirected { layer: layer.handle, host_path: root }));
        }

        let (parent, name) = rel.rsplit_once('/').unwrap_or(("", rel));
        if name.starts_with(self.marker) {
            return Ok(None);
        }

        let whiteout = join_rel(&root, parent).join(format!("{}{}", self.marker, name));
        if self.exists(&whiteout)? {
            return Ok(Some(Resolution::Whiteout { layer: layer.handle }));
        }

        let host_path = join_rel(&root, rel);
        if self.exists(&host_path)? {
            return Ok(Some(Resolution::Redirected { layer: layer.handle, host_path }));
        }

        Ok(None)
    }

    fn replacement_root(&self, layer: &RedirectionLayer) -> ResolveResult<PathBuf> {
        let device_root = self
            .devices
            .host_root(&layer.replacement.device)
            .ok_or_else(|| ResolveError::DeviceUnavailable(layer.replacement.device.clone()))?;
        Ok(join_rel(&device_root, layer.replacement.path.trim_start_matches('/')))
    }

    fn exists(&self, path: &Path) -> ResolveResult<bool> {
        self.backing.exists(path).map_err(|e| ResolveError::io(path, e))
    }

    fn read_dir(&self, path: &Path) -> ResolveResult<Option<Vec<String>>> {
        self.backing.read_dir(path).map_err(|e| ResolveError::io(path, e))
    }
}

/// The part of `path` below the layer's target, if the layer claims it.
fn claimed<'p>(layer: &RedirectionLayer, path: &'p str) -> Option<&'p str> {
    match layer.kind {
        LayerKind::ReplaceFile => (path == layer.target_root).then_some(""),
        LayerKind::ReplaceDirectory | LayerKind::MergeDirectory => {
            relative_to(path, &layer.target_root)
        }
    }
}

/// Last component of `target` if its parent is `dir`.
fn child_name(target: &str, dir: &str) -> Option<String> {
    let (parent, name) = split_path(target).ok()?;
    (parent == dir).then_some(name)
}

fn join_rel(root: &Path, rel: &str) -> PathBuf {
    if rel.is_empty() { root.to_path_buf() } else { root.join(rel) }
}
