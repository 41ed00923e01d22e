//! Layer kinds: the generalized composition kinds and the legacy
//! volume-specific kinds that map onto them.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A layer kind value the service does not recognize.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Unknown layer type: {0}")]
pub struct UnknownLayerType(pub u32);

/// One of the logical volumes that can be redirected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Volume {
    Content,
    Save,
    AddOnContent,
}

impl Volume {
    pub fn root(self) -> &'static str {
        match self {
            Volume::Content => "/vol/content",
            Volume::Save => "/vol/save",
            Volume::AddOnContent => "/vol/aoc",
        }
    }
}

/// How a layer composes with everything below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerKind {
    /// The replacement directory is authoritative for the whole target tree.
    ReplaceDirectory,
    /// The replacement directory overlays the target tree; missing entries
    /// fall through and deletion markers hide lower entries.
    MergeDirectory,
    /// The replacement file is authoritative for exactly the target path.
    ReplaceFile,
}

impl LayerKind {
    pub fn is_replace(self) -> bool {
        matches!(self, LayerKind::ReplaceDirectory | LayerKind::ReplaceFile)
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerKind::ReplaceDirectory => write!(f, "replace-directory"),
            LayerKind::MergeDirectory => write!(f, "merge-directory"),
            LayerKind::ReplaceFile => write!(f, "replace-file"),
        }
    }
}

/// Legacy layer kinds with an implicit target, as accepted by `CRAddFSLayer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u32)]
pub enum FsLayerType {
    /// Replaces `/vol/content`; original files are ignored.
    ContentReplace = 0,
    /// Merges into `/vol/content`, which stays the fallback.
    ContentMerge = 1,
    /// Replaces `/vol/save`.
    SaveReplace = 2,
    /// Replaces the save directory of the current user only.
    SaveReplaceForCurrentUser = 3,
    /// Replaces the add-on-content volume.
    AocReplace = 4,
    /// Merges into the add-on-content volume.
    AocMerge = 5,
}

impl FsLayerType {
    pub const ALL: [FsLayerType; 6] = [
        FsLayerType::ContentReplace,
        FsLayerType::ContentMerge,
        FsLayerType::SaveReplace,
        FsLayerType::SaveReplaceForCurrentUser,
        FsLayerType::AocReplace,
        FsLayerType::AocMerge,
    ];

    pub fn raw(self) -> u32 {
        self as u32
    }

    pub fn kind(self) -> LayerKind {
        match self {
            FsLayerType::ContentMerge | FsLayerType::AocMerge => LayerKind::MergeDirectory,
            _ => LayerKind::ReplaceDirectory,
        }
    }

    pub fn volume(self) -> Volume {
        match self {
            FsLayerType::ContentReplace | FsLayerType::ContentMerge => Volume::Content,
            FsLayerType::SaveReplace | FsLayerType::SaveReplaceForCurrentUser => Volume::Save,
            FsLayerType::AocReplace | FsLayerType::AocMerge => Volume::AddOnContent,
        }
    }

    /// Logical path this kind intercepts.
    ///
    /// Returns `None` for the per-user save kind when no user is known.
    pub fn target_root(self, current_user: Option<u32>) -> Option<String> {
        match self {
            FsLayerType::SaveReplaceForCurrentUser => {
                current_user.map(|user| format!("{}/{:08x}", Volume::Save.root(), user))
            }
            other => Some(other.volume().root().to_string()),
        }
    }
}

impl TryFrom<u32> for FsLayerType {
    type Error = UnknownLayerType;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        FsLayerType::ALL.into_iter().find(|t| t.raw() == raw).ok_or(UnknownLayerType(raw))
    }
}

/// Generalized layer kinds with an explicit target, as accepted by
/// `CRAddFSLayerEx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u32)]
pub enum FsLayerTypeEx {
    ReplaceDirectory = 0,
    MergeDirectory = 1,
    ReplaceFile = 2,
}

impl FsLayerTypeEx {
    pub fn raw(self) -> u32 {
        self as u32
    }

    pub fn kind(self) -> LayerKind {
        match self {
            FsLayerTypeEx::ReplaceDirectory => LayerKind::ReplaceDirectory,
            FsLayerTypeEx::MergeDirectory => LayerKind::MergeDirectory,
            FsLayerTypeEx::ReplaceFile => LayerKind::ReplaceFile,
        }
    }
}

impl TryFrom<u32> for FsLayerTypeEx {
    type Error = UnknownLayerType;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(FsLayerTypeEx::ReplaceDirectory),
            1 => Ok(FsLayerTypeEx::MergeDirectory),
            2 => Ok(FsLayerTypeEx::ReplaceFile),
            other => Err(UnknownLayerType(other)),
        }
    }
}
