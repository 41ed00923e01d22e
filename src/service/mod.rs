//! In-process redirection service.
//!
//! Owns the layer stack and the device table, allocates layer handles and
//! answers lookups with the layer resolver. It implements the same entry
//! points a loaded service module exports, so the client binds to it exactly
//! as it would to a foreign module. Reporting a lower version or leaving
//! exports out of the configuration reproduces older service revisions.

mod device;

pub use device::DeviceTable;

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::fs::path::{normalize_path, parse_device_path};
use crate::fs::{Backing, HostFs, ResolveResult};
use crate::interface::{ApiErrorType, ApiResult, DeviceDescriptor, RedirectionModule};
use crate::layer::{
    FsLayerType, FsLayerTypeEx, LayerKind, LayerStack, RedirectionLayer, Replacement, Resolution,
    Resolver,
};
use crate::types::{ApiVersion, LayerHandle};

struct ServiceState {
    stack: LayerStack,
    devices: DeviceTable,
    next_handle: u32,
}

impl ServiceState {
    /// Handles count up from 1 and are never handed out twice.
    fn allocate_handle(&mut self) -> Option<LayerHandle> {
        let handle = LayerHandle::new(self.next_handle);
        self.next_handle = self.next_handle.checked_add(1)?;
        Some(handle)
    }
}

pub struct RedirectionService<B = HostFs> {
    version: ApiVersion,
    exports: HashSet<String>,
    max_layers: usize,
    current_user: Option<u32>,
    marker: String,
    backing: B,
    state: RwLock<ServiceState>,
}

impl RedirectionService<HostFs> {
    pub fn new(config: &Config) -> Self {
        Self::with_backing(config, HostFs)
    }
}

impl<B: Backing> RedirectionService<B> {
    pub fn with_backing(config: &Config, backing: B) -> Self {
        Self {
            version: ApiVersion::new(config.module.api_version),
            exports: config.module.exports.iter().cloned().collect(),
            max_layers: config.limits.max_layers,
            current_user: config.user.current_user_id,
            marker: config.whiteout.marker.clone(),
            backing,
            state: RwLock::new(ServiceState {
                stack: LayerStack::new(),
                devices: DeviceTable::new(config.limits.max_devices),
                next_handle: 1,
            }),
        }
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    /// Add a layer of a legacy kind, targeting the kind's volume.
    pub fn add_layer(
        &self,
        name: &str,
        replacement: &str,
        layer_type: u32,
    ) -> Result<LayerHandle, ApiErrorType> {
        let layer_type =
            FsLayerType::try_from(layer_type).map_err(|_| ApiErrorType::UnknownFsLayerType)?;
        let target_root = layer_type.target_root(self.current_user).ok_or_else(|| {
            warn!(name, ?layer_type, "No current user for per-user layer");
            ApiErrorType::InvalidArg
        })?;
        self.insert(name, layer_type.kind(), target_root, replacement)
    }

    /// Add a layer of a generalized kind over an explicit target.
    pub fn add_layer_ex(
        &self,
        name: &str,
        target: &str,
        replacement: &str,
        layer_type: u32,
    ) -> Result<LayerHandle, ApiErrorType> {
        let layer_type =
            FsLayerTypeEx::try_from(layer_type).map_err(|_| ApiErrorType::UnknownFsLayerType)?;
        let target_root = normalize_path(target).map_err(|e| {
            warn!(name, target, error = %e, "Rejected layer target");
            ApiErrorType::InvalidArg
        })?;
        self.insert(name, layer_type.kind(), target_root, replacement)
    }

    pub fn remove_layer(&self, handle: LayerHandle) -> Result<(), ApiErrorType> {
        let removed = self.write().stack.remove(handle).ok_or(ApiErrorType::LayerNotFound)?;
        info!(handle = %handle, name = %removed.name, "Removed layer");
        Ok(())
    }

    pub fn set_active(&self, handle: LayerHandle, active: bool) -> Result<(), ApiErrorType> {
        if !self.write().stack.set_active(handle, active) {
            return Err(ApiErrorType::LayerNotFound);
        }
        info!(handle = %handle, active, "Set layer activation");
        Ok(())
    }

    pub fn add_device(&self, device: &DeviceDescriptor) -> i32 {
        let result = self.write().devices.add(device);
        info!(device = %device.name, root = %device.root.display(), result, "Added device");
        result
    }

    pub fn remove_device(&self, name: &str) -> i32 {
        let mut state = self.write();
        let dependents = state.stack.on_device(name).count();
        if dependents > 0 {
            warn!(device = name, dependents, "Removing device still used by layers");
        }
        let result = state.devices.remove(name);
        info!(device = name, result, "Removed device");
        result
    }

    /// Resolve a logical path through the current layer stack.
    pub fn resolve(&self, path: &str) -> ResolveResult<Resolution> {
        let state = self.read();
        let resolution = Resolver::new(&state.devices, &self.backing)
            .with_marker(&self.marker)
            .resolve(&state.stack, path)?;
        debug!(path, ?resolution, "Resolved path");
        Ok(resolution)
    }

    /// Merged listing of a logical directory. See [`Resolver::list_directory`].
    pub fn list_directory(
        &self,
        path: &str,
        original: Option<Vec<String>>,
    ) -> ResolveResult<Option<Vec<String>>> {
        let state = self.read();
        Resolver::new(&state.devices, &self.backing)
            .with_marker(&self.marker)
            .list_directory(&state.stack, path, original)
    }

    /// Snapshot of the layers, highest priority first.
    pub fn layers(&self) -> Vec<RedirectionLayer> {
        self.read().stack.iter().cloned().collect()
    }

    pub fn devices(&self) -> Vec<DeviceDescriptor> {
        self.read().devices.iter().cloned().collect()
    }

    fn insert(
        &self,
        name: &str,
        kind: LayerKind,
        target_root: String,
        replacement: &str,
    ) -> Result<LayerHandle, ApiErrorType> {
        if name.is_empty() {
            return Err(ApiErrorType::InvalidArg);
        }
        let (device, path) = parse_device_path(replacement).map_err(|e| {
            warn!(name, replacement, error = %e, "Rejected replacement path");
            ApiErrorType::InvalidArg
        })?;

        let mut state = self.write();
        if !state.devices.contains(&device) {
            warn!(name, device = %device, "Replacement is not on a registered device");
            return Err(ApiErrorType::InvalidArg);
        }
        if state.stack.len() >= self.max_layers {
            warn!(name, max_layers = self.max_layers, "Layer limit reached");
            return Err(ApiErrorType::NoMemory);
        }
        let handle = state.allocate_handle().ok_or(ApiErrorType::NoMemory)?;

        let layer = RedirectionLayer {
            handle,
            name: name.to_string(),
            kind,
            target_root,
            replacement: Replacement { device, path },
            active: true,
        };
        info!(
            handle = %handle,
            name = %layer.name,
            kind = %layer.kind,
            target = %layer.target_root,
            replacement = %layer.replacement,
            "Added layer"
        );
        state.stack.push(layer).map_err(|_| ApiErrorType::NoMemory)?;
        Ok(handle)
    }

    // A panic mid-operation never leaves the state half-updated, so a
    // poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, ServiceState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ServiceState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<B: Backing> RedirectionModule for RedirectionService<B> {
    fn has_export(&self, symbol: &str) -> bool {
        self.exports.contains(symbol)
    }

    fn get_version(&self) -> ApiResult<ApiVersion> {
        Ok(self.version)
    }

    fn add_fs_layer(
        &self,
        name: &str,
        replacement_dir: &str,
        layer_type: u32,
    ) -> ApiResult<LayerHandle> {
        self.add_layer(name, replacement_dir, layer_type).map_err(ApiErrorType::code)
    }

    fn add_fs_layer_ex(
        &self,
        name: &str,
        target: &str,
        replacement_dir: &str,
        layer_type: u32,
    ) -> ApiResult<LayerHandle> {
        self.add_layer_ex(name, target, replacement_dir, layer_type).map_err(ApiErrorType::code)
    }

    fn remove_fs_layer(&self, handle: LayerHandle) -> ApiResult<()> {
        self.remove_layer(handle).map_err(ApiErrorType::code)
    }

    fn set_active(&self, handle: LayerHandle, active: bool) -> ApiResult<()> {
        RedirectionService::set_active(self, handle, active).map_err(ApiErrorType::code)
    }

    fn add_device(&self, device: &DeviceDescriptor) -> i32 {
        RedirectionService::add_device(self, device)
    }

    fn remove_device(&self, name: &str) -> i32 {
        RedirectionService::remove_device(self, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::backing::MockBacking;

    fn service(config: &Config) -> RedirectionService<MockBacking> {
        let mut backing = MockBacking::new();
        backing.expect_exists().returning(|_| Ok(false));
        let service = RedirectionService::with_backing(config, backing);
        service.add_device(&DeviceDescriptor::new("sd", "/mnt/sd"));
        service
    }

    #[test]
    fn test_handles_are_unique_and_never_reused() {
        let svc = service(&Config::default());
        let a = svc.add_layer("a", "sd:/a", 0).unwrap();
        let b = svc.add_layer("b", "sd:/b", 1).unwrap();
        svc.remove_layer(b).unwrap();
        let c = svc.add_layer("c", "sd:/c", 2).unwrap();

        assert_eq!(a, LayerHandle::new(1));
        assert_eq!(b, LayerHandle::new(2));
        assert_eq!(c, LayerHandle::new(3));
    }

    #[test]
    fn test_unknown_layer_types() {
        let svc = service(&Config::default());
        assert_eq!(svc.add_layer("a", "sd:/a", 42), Err(ApiErrorType::UnknownFsLayerType));
        assert_eq!(
            svc.add_layer_ex("a", "/vol/content", "sd:/a", 3),
            Err(ApiErrorType::UnknownFsLayerType)
        );
    }

    #[test]
    fn test_replacement_must_be_on_device() {
        let svc = service(&Config::default());
        assert_eq!(svc.add_layer("a", "usb:/a", 0), Err(ApiErrorType::InvalidArg));
        assert_eq!(svc.add_layer("a", "/plain/path", 0), Err(ApiErrorType::InvalidArg));
        assert!(svc.layers().is_empty());
    }

    #[test]
    fn test_invalid_target() {
        let svc = service(&Config::default());
        assert_eq!(svc.add_layer_ex("a", "vol/content", "sd:/a", 0), Err(ApiErrorType::InvalidArg));
        assert_eq!(svc.add_layer_ex("a", "/vol/../x", "sd:/a", 0), Err(ApiErrorType::InvalidArg));
    }

    #[test]
    fn test_layer_limit_is_no_memory() {
        let mut config = Config::default();
        config.limits.max_layers = 1;
        let svc = service(&config);

        svc.add_layer("a", "sd:/a", 0).unwrap();
        assert_eq!(svc.add_layer("b", "sd:/b", 0), Err(ApiErrorType::NoMemory));
    }

    #[test]
    fn test_huge_device_limit_is_lazy() {
        let mut config = Config::default();
        config.limits.max_devices = 1 << 50;
        let svc = service(&config);
        assert_eq!(svc.add_device(&DeviceDescriptor::new("usb", "/mnt/usb")), 1);
        assert_eq!(svc.devices().len(), 2);
    }

    #[test]
    fn test_empty_marker_falls_back_to_default() {
        let mut config = Config::default();
        config.whiteout.marker = String::new();
        let mut backing = MockBacking::new();
        backing
            .expect_exists()
            .returning(|p| Ok(p == std::path::Path::new("/mnt/sd/mods/a.bin")));
        let svc = RedirectionService::with_backing(&config, backing);
        svc.add_device(&DeviceDescriptor::new("sd", "/mnt/sd"));
        let handle = svc.add_layer("mods", "sd:/mods", FsLayerType::ContentMerge.raw()).unwrap();

        assert_eq!(
            svc.resolve("/vol/content/a.bin").unwrap(),
            Resolution::Redirected {
                layer: handle,
                host_path: std::path::PathBuf::from("/mnt/sd/mods/a.bin"),
            }
        );
    }

    #[test]
    fn test_per_user_save_layer() {
        let svc = service(&Config::default());
        assert_eq!(svc.add_layer("save", "sd:/save", 3), Err(ApiErrorType::InvalidArg));

        let mut config = Config::default();
        config.user.current_user_id = Some(0x8000_0001);
        let svc = service(&config);
        let handle = svc.add_layer("save", "sd:/save", 3).unwrap();
        let layers = svc.layers();
        assert_eq!(layers[0].handle, handle);
        assert_eq!(layers[0].target_root, "/vol/save/80000001");
    }

    #[test]
    fn test_remove_and_toggle_unknown_handle() {
        let svc = service(&Config::default());
        assert_eq!(svc.remove_layer(LayerHandle::new(7)), Err(ApiErrorType::LayerNotFound));
        assert_eq!(
            RedirectionService::set_active(&svc, LayerHandle::new(7), true),
            Err(ApiErrorType::LayerNotFound)
        );
    }

    #[test]
    fn test_module_entry_points_use_wire_codes() {
        let svc = service(&Config::default());
        assert_eq!(svc.add_fs_layer("a", "sd:/a", 77), Err(-3));
        assert_eq!(svc.remove_fs_layer(LayerHandle::new(9)), Err(-4));
        assert_eq!(RedirectionModule::remove_device(&svc, "nope"), -1);
        assert_eq!(svc.get_version(), Ok(ApiVersion::V2));
    }

    #[test]
    fn test_exports_follow_config() {
        let mut config = Config::default();
        config.module.exports = vec!["CRGetVersion".to_string()];
        let svc = service(&config);
        assert!(svc.has_export("CRGetVersion"));
        assert!(!svc.has_export("CRAddFSLayer"));
    }

    #[test]
    fn test_resolve_uses_stack() {
        let svc = service(&Config::default());
        let handle = svc.add_layer("a", "sd:/a", FsLayerType::ContentReplace.raw()).unwrap();

        assert_eq!(svc.resolve("/vol/content/x").unwrap(), Resolution::Absent { layer: handle });
        assert!(matches!(svc.resolve("/vol/save/x").unwrap(), Resolution::Original { .. }));
    }
}
