use std::sync::Arc;

#[cfg(any(test, feature = "mockall"))]
use mockall::automock;

use super::api_error::ApiResult;
use super::device::DeviceDescriptor;
use crate::types::{ApiVersion, LayerHandle};

/// Name under which the redirection service module is registered.
pub const MODULE_NAME: &str = "homebrew_content_redirection";

/// Entry points a redirection service may export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Export {
    GetVersion,
    AddFsLayer,
    AddFsLayerEx,
    RemoveFsLayer,
    SetActive,
    AddDevice,
    RemoveDevice,
}

impl Export {
    pub const ALL: [Export; 7] = [
        Export::GetVersion,
        Export::AddFsLayer,
        Export::AddFsLayerEx,
        Export::RemoveFsLayer,
        Export::SetActive,
        Export::AddDevice,
        Export::RemoveDevice,
    ];

    /// Exported symbol name.
    pub fn symbol(self) -> &'static str {
        match self {
            Export::GetVersion => "CRGetVersion",
            Export::AddFsLayer => "CRAddFSLayer",
            Export::AddFsLayerEx => "CRAddFSLayerEx",
            Export::RemoveFsLayer => "CRRemoveFSLayer",
            Export::SetActive => "CRSetActive",
            Export::AddDevice => "CRAddDevice",
            Export::RemoveDevice => "CRRemoveDevice",
        }
    }

    /// Lowest protocol version in which the entry point may be called.
    pub fn min_version(self) -> ApiVersion {
        match self {
            Export::AddFsLayerEx => ApiVersion::V2,
            _ => ApiVersion::V1,
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Export> {
        Self::ALL.into_iter().find(|e| e.symbol() == symbol)
    }
}

impl std::fmt::Display for Export {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A loaded redirection service module.
///
/// `has_export` is the only capability signal: the client calls an entry
/// point only after the module reported its symbol as present.
#[cfg_attr(any(test, feature = "mockall"), automock)]
pub trait RedirectionModule: Send + Sync {
    fn has_export(&self, symbol: &str) -> bool;

    fn get_version(&self) -> ApiResult<ApiVersion>;

    fn add_fs_layer(
        &self,
        name: &str,
        replacement_dir: &str,
        layer_type: u32,
    ) -> ApiResult<LayerHandle>;

    fn add_fs_layer_ex(
        &self,
        name: &str,
        target: &str,
        replacement_dir: &str,
        layer_type: u32,
    ) -> ApiResult<LayerHandle>;

    fn remove_fs_layer(&self, handle: LayerHandle) -> ApiResult<()>;

    fn set_active(&self, handle: LayerHandle, active: bool) -> ApiResult<()>;

    /// Device registration result, passed through to the caller untouched.
    fn add_device(&self, device: &DeviceDescriptor) -> i32;

    fn remove_device(&self, name: &str) -> i32;
}

/// Finds loaded modules by name.
#[cfg_attr(any(test, feature = "mockall"), automock)]
pub trait ModuleLoader: Send + Sync {
    fn acquire(&self, name: &str) -> Option<Arc<dyn RedirectionModule>>;
}
