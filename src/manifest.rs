//! Declarative layer stacks.
//!
//! A manifest lists devices and layers in TOML. Layers are applied in file
//! order, so the last layer listed ends up with the highest priority.
//!
//! ```toml
//! [[device]]
//! name = "sd"
//! root = "sdcard"
//!
//! [[layer]]
//! name = "mods"
//! kind = "content-merge"
//! replacement = "sd:/mods"
//!
//! [[layer]]
//! name = "patched-boot"
//! kind = "replace-file"
//! target = "/vol/content/boot.bin"
//! replacement = "sd:/patches/boot.bin"
//! active = false
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::client::{ContentRedirection, RedirectionError};
use crate::interface::{DeviceDescriptor, ModuleLoader};
use crate::layer::{FsLayerType, FsLayerTypeEx};
use crate::types::LayerHandle;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Layer {0} has a generalized kind and needs a target")]
    MissingTarget(String),

    #[error("Layer {0} has a legacy kind, which takes no target")]
    UnexpectedTarget(String),

    #[error("Device {name} was rejected by the service ({result})")]
    DeviceRejected { name: String, result: i32 },

    /// `applied` holds the layers added before the failure. They stay in
    /// the service.
    #[error("Failed to apply {item}: {source}")]
    Redirection {
        item: String,
        applied: AppliedManifest,
        #[source]
        source: RedirectionError,
    },
}

pub type ManifestResult<T> = Result<T, ManifestError>;

/// Either numbering of layer kinds, by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManifestLayerKind {
    Legacy(FsLayerType),
    Ex(FsLayerTypeEx),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDevice {
    pub name: String,
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestLayer {
    pub name: String,
    pub kind: ManifestLayerKind,
    #[serde(default)]
    pub target: Option<String>,
    pub replacement: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackManifest {
    #[serde(default, rename = "device")]
    pub devices: Vec<ManifestDevice>,
    #[serde(default, rename = "layer")]
    pub layers: Vec<ManifestLayer>,
}

/// Handles of the layers a manifest created, in manifest order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedManifest {
    pub layers: Vec<(String, LayerHandle)>,
}

impl FromStr for StackManifest {
    type Err = ManifestError;

    fn from_str(s: &str) -> ManifestResult<Self> {
        let manifest: StackManifest = toml::from_str(s)?;
        manifest.validate()?;
        Ok(manifest)
    }
}

impl StackManifest {
    /// Read a manifest file. Relative device roots are taken relative to the
    /// file's directory.
    pub fn load(path: &Path) -> ManifestResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ManifestError::Read { path: path.to_path_buf(), source })?;
        let mut manifest: StackManifest = text.parse()?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for device in &mut manifest.devices {
            if device.root.is_relative() {
                device.root = base.join(&device.root);
            }
        }
        Ok(manifest)
    }

    fn validate(&self) -> ManifestResult<()> {
        for layer in &self.layers {
            match (layer.kind, &layer.target) {
                (ManifestLayerKind::Ex(_), None) => {
                    return Err(ManifestError::MissingTarget(layer.name.clone()));
                }
                (ManifestLayerKind::Legacy(_), Some(_)) => {
                    return Err(ManifestError::UnexpectedTarget(layer.name.clone()));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Register the devices, then add the layers in order through `client`.
    ///
    /// Application stops at the first failure and does not roll back: the
    /// devices registered and the layers added so far remain in the service.
    /// A layer failure reports those layers in [`ManifestError::Redirection`].
    pub fn apply<L: ModuleLoader>(
        &self,
        client: &ContentRedirection<L>,
    ) -> ManifestResult<AppliedManifest> {
        for device in &self.devices {
            let descriptor = DeviceDescriptor::new(device.name.as_str(), device.root.as_path());
            let result =
                client.add_device(&descriptor).map_err(|source| ManifestError::Redirection {
                    item: format!("device {}", device.name),
                    applied: AppliedManifest::default(),
                    source,
                })?;
            if result < 0 {
                return Err(ManifestError::DeviceRejected { name: device.name.clone(), result });
            }
            debug!(device = %device.name, slot = result, "Registered device");
        }

        let mut applied = AppliedManifest::default();
        for layer in &self.layers {
            let handle = match (layer.kind, layer.target.as_deref()) {
                (ManifestLayerKind::Legacy(kind), _) => {
                    client.add_fs_layer(&layer.name, &layer.replacement, kind)
                }
                (ManifestLayerKind::Ex(kind), Some(target)) => {
                    client.add_fs_layer_ex(&layer.name, target, &layer.replacement, kind)
                }
                (ManifestLayerKind::Ex(_), None) => {
                    return Err(ManifestError::MissingTarget(layer.name.clone()));
                }
            }
            .map_err(|source| layer_failed(layer, &applied, source))?;

            applied.layers.push((layer.name.clone(), handle));
            if !layer.active {
                client
                    .set_active(handle, false)
                    .map_err(|source| layer_failed(layer, &applied, source))?;
            }
        }

        info!(
            devices = self.devices.len(),
            layers = applied.layers.len(),
            "Applied manifest"
        );
        Ok(applied)
    }
}

fn layer_failed(
    layer: &ManifestLayer,
    applied: &AppliedManifest,
    source: RedirectionError,
) -> ManifestError {
    ManifestError::Redirection {
        item: format!("layer {}", layer.name),
        applied: applied.clone(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_both_kind_families() {
        let manifest: StackManifest = r#"
            [[device]]
            name = "sd"
            root = "/mnt/sd"

            [[layer]]
            name = "mods"
            kind = "content-merge"
            replacement = "sd:/mods"

            [[layer]]
            name = "boot"
            kind = "replace-file"
            target = "/vol/content/boot.bin"
            replacement = "sd:/boot.bin"
            active = false
        "#
        .parse()
        .unwrap();

        assert_eq!(manifest.devices.len(), 1);
        assert_eq!(manifest.layers[0].kind, ManifestLayerKind::Legacy(FsLayerType::ContentMerge));
        assert!(manifest.layers[0].active);
        assert_eq!(manifest.layers[1].kind, ManifestLayerKind::Ex(FsLayerTypeEx::ReplaceFile));
        assert!(!manifest.layers[1].active);
    }

    #[test]
    fn test_unknown_kind_is_parse_error() {
        let err = r#"
            [[layer]]
            name = "x"
            kind = "content-overlay"
            replacement = "sd:/x"
        "#
        .parse::<StackManifest>()
        .unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));
    }

    #[test]
    fn test_target_rules() {
        let err = "[[layer]]\nname = \"x\"\nkind = \"merge-directory\"\nreplacement = \"sd:/x\"\n"
            .parse::<StackManifest>()
            .unwrap_err();
        assert!(matches!(err, ManifestError::MissingTarget(name) if name == "x"));

        let err = "[[layer]]\nname = \"y\"\nkind = \"save-replace\"\ntarget = \"/vol/save\"\nreplacement = \"sd:/y\"\n"
            .parse::<StackManifest>()
            .unwrap_err();
        assert!(matches!(err, ManifestError::UnexpectedTarget(name) if name == "y"));
    }

    #[test]
    fn test_load_resolves_relative_roots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.toml");
        std::fs::write(
            &path,
            "[[device]]\nname = \"sd\"\nroot = \"sdcard\"\n\n[[device]]\nname = \"usb\"\nroot = \"/abs\"\n",
        )
        .unwrap();

        let manifest = StackManifest::load(&path).unwrap();
        assert_eq!(manifest.devices[0].root, dir.path().join("sdcard"));
        assert_eq!(manifest.devices[1].root, PathBuf::from("/abs"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = StackManifest::load(Path::new("/nonexistent/stack.toml")).unwrap_err();
        assert!(matches!(err, ManifestError::Read { .. }));
    }
}
