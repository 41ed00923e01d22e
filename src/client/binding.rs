//! Client binding to the redirection service.
//!
//! `ContentRedirection` owns the binding explicitly: `init_library` acquires
//! the module, negotiates the version and checks entry points, and every
//! layer or device operation is gated on that binding.

use std::sync::Arc;

use tracing::{debug, error, info};

use super::capability::CapabilityTable;
use super::status::{RedirectionError, RedirectionResult, Status, translate};
use crate::interface::{DeviceDescriptor, Export, MODULE_NAME, ModuleLoader, RedirectionModule};
use crate::layer::{FsLayerType, FsLayerTypeEx};
use crate::types::{ApiVersion, LayerHandle};

/// A module with its negotiated capabilities. Only ever constructed whole.
pub struct ServiceBinding {
    module: Arc<dyn RedirectionModule>,
    capabilities: CapabilityTable,
}

impl ServiceBinding {
    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    pub fn version(&self) -> ApiVersion {
        self.capabilities.version()
    }
}

/// Client interface to the redirection service.
pub struct ContentRedirection<L> {
    loader: L,
    module_name: String,
    binding: Option<ServiceBinding>,
}

impl<L: ModuleLoader> ContentRedirection<L> {
    pub fn new(loader: L) -> Self {
        Self::with_module_name(loader, MODULE_NAME)
    }

    pub fn with_module_name(loader: L, module_name: impl Into<String>) -> Self {
        Self { loader, module_name: module_name.into(), binding: None }
    }

    pub fn is_initialized(&self) -> bool {
        self.binding.is_some()
    }

    pub fn binding(&self) -> Option<&ServiceBinding> {
        self.binding.as_ref()
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Bind to the service. Must succeed before any other operation except
    /// [`get_version`](Self::get_version).
    ///
    /// Any previous binding is dropped first, so a failed call leaves the
    /// client uninitialized.
    pub fn init_library(&mut self) -> RedirectionResult<()> {
        self.binding = None;

        let module = self.acquire().inspect_err(|e| error!(error = %e, "Acquire failed"))?;

        if !module.has_export(Export::GetVersion.symbol()) {
            error!(symbol = Export::GetVersion.symbol(), "FindExport failed");
            return Err(RedirectionError::MissingExport(Export::GetVersion));
        }

        let version = match module.get_version() {
            Ok(version) if !version.is_error() => version,
            other => {
                error!(result = ?other, "Version query failed");
                return Err(RedirectionError::UnsupportedVersion);
            }
        };

        let capabilities = CapabilityTable::discover(module.as_ref(), version);
        info!(
            module = %self.module_name,
            version = %version,
            unavailable = ?capabilities.unavailable(),
            "Bound to redirection module"
        );

        self.binding = Some(ServiceBinding { module, capabilities });
        Ok(())
    }

    /// Release the binding. Layers that are still registered stay active in
    /// the service.
    pub fn deinit_library(&mut self) -> RedirectionResult<()> {
        if self.binding.take().is_some() {
            info!(module = %self.module_name, "Released redirection module");
        }
        Ok(())
    }

    /// Version of the service. Works without a binding by acquiring the
    /// module on its own.
    pub fn get_version(&self) -> RedirectionResult<ApiVersion> {
        let module = match &self.binding {
            Some(binding) => Arc::clone(&binding.module),
            None => {
                let module = self.acquire()?;
                if !module.has_export(Export::GetVersion.symbol()) {
                    return Err(RedirectionError::MissingExport(Export::GetVersion));
                }
                module
            }
        };

        match module.get_version() {
            Ok(version) if !version.is_error() => Ok(version),
            Ok(_) => Err(RedirectionError::UnknownError),
            Err(code) if translate(code) == Status::InvalidArgument => {
                Err(RedirectionError::InvalidArgument("version query rejected".to_string()))
            }
            Err(_) => Err(RedirectionError::UnknownError),
        }
    }

    /// Add a legacy layer whose target follows from `layer_type`.
    pub fn add_fs_layer(
        &self,
        name: &str,
        replacement_dir: &str,
        layer_type: FsLayerType,
    ) -> RedirectionResult<LayerHandle> {
        self.add_fs_layer_raw(name, replacement_dir, layer_type.raw())
    }

    /// [`add_fs_layer`](Self::add_fs_layer) with the layer type as its wire value.
    pub fn add_fs_layer_raw(
        &self,
        name: &str,
        replacement_dir: &str,
        layer_type: u32,
    ) -> RedirectionResult<LayerHandle> {
        let binding = self.bound(Export::AddFsLayer)?;
        require_arg("name", name)?;
        require_arg("replacement_dir", replacement_dir)?;

        let handle = binding
            .module
            .add_fs_layer(name, replacement_dir, layer_type)
            .map_err(RedirectionError::from_api_code)?;
        debug!(handle = %handle, name, replacement_dir, layer_type, "Added layer");
        Ok(handle)
    }

    /// Add a layer with an explicit target. Requires protocol version 2.
    pub fn add_fs_layer_ex(
        &self,
        name: &str,
        target: &str,
        replacement_dir: &str,
        layer_type: FsLayerTypeEx,
    ) -> RedirectionResult<LayerHandle> {
        self.add_fs_layer_ex_raw(name, target, replacement_dir, layer_type.raw())
    }

    pub fn add_fs_layer_ex_raw(
        &self,
        name: &str,
        target: &str,
        replacement_dir: &str,
        layer_type: u32,
    ) -> RedirectionResult<LayerHandle> {
        let binding = self.bound(Export::AddFsLayerEx)?;
        require_arg("name", name)?;
        require_arg("target", target)?;
        require_arg("replacement_dir", replacement_dir)?;

        let handle = binding
            .module
            .add_fs_layer_ex(name, target, replacement_dir, layer_type)
            .map_err(RedirectionError::from_api_code)?;
        debug!(handle = %handle, name, target, replacement_dir, layer_type, "Added layer");
        Ok(handle)
    }

    pub fn remove_fs_layer(&self, handle: LayerHandle) -> RedirectionResult<()> {
        let binding = self.bound(Export::RemoveFsLayer)?;
        binding.module.remove_fs_layer(handle).map_err(RedirectionError::from_api_code)?;
        debug!(handle = %handle, "Removed layer");
        Ok(())
    }

    pub fn set_active(&self, handle: LayerHandle, active: bool) -> RedirectionResult<()> {
        let binding = self.bound(Export::SetActive)?;
        binding.module.set_active(handle, active).map_err(RedirectionError::from_api_code)?;
        debug!(handle = %handle, active, "Set layer activation");
        Ok(())
    }

    /// Register a device with the service. The service's own result is
    /// returned as-is.
    pub fn add_device(&self, device: &DeviceDescriptor) -> RedirectionResult<i32> {
        let binding = self.bound(Export::AddDevice)?;
        let result = binding.module.add_device(device);
        debug!(device = %device.name, result, "AddDevice");
        Ok(result)
    }

    pub fn remove_device(&self, name: &str) -> RedirectionResult<i32> {
        let binding = self.bound(Export::RemoveDevice)?;
        require_arg("name", name)?;
        let result = binding.module.remove_device(name);
        debug!(device = name, result, "RemoveDevice");
        Ok(result)
    }

    fn acquire(&self) -> RedirectionResult<Arc<dyn RedirectionModule>> {
        self.loader
            .acquire(&self.module_name)
            .ok_or_else(|| RedirectionError::ModuleNotFound(self.module_name.clone()))
    }

    fn bound(&self, export: Export) -> RedirectionResult<&ServiceBinding> {
        let binding = self.binding.as_ref().ok_or(RedirectionError::LibUninitialized)?;
        binding.capabilities.check(export)?;
        Ok(binding)
    }
}

fn require_arg(what: &str, value: &str) -> RedirectionResult<()> {
    if value.is_empty() {
        return Err(RedirectionError::InvalidArgument(format!("{} is empty", what)));
    }
    if value.contains('\0') {
        return Err(RedirectionError::InvalidArgument(format!("{} contains NUL", what)));
    }
    Ok(())
}
