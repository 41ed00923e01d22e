//! Config and manifest integration tests - Declarative stacks through the client

use std::fs;
use std::sync::Arc;

use anyhow::Result;
use content_redirection::client::InProcessLoader;
use content_redirection::interface::{MODULE_NAME, RedirectionModule};
use content_redirection::layer::{LayerKind, Resolution};
use content_redirection::manifest::{ManifestError, StackManifest};
use content_redirection::{Config, ContentRedirection, RedirectionError, RedirectionService};
use tempfile::TempDir;

fn bound(config: &Config) -> Result<(Arc<RedirectionService>, ContentRedirection<InProcessLoader>)> {
    let service = Arc::new(RedirectionService::new(config));
    let module: Arc<dyn RedirectionModule> = service.clone();
    let mut client =
        ContentRedirection::new(InProcessLoader::new().with_module(MODULE_NAME, module));
    client.init_library()?;
    Ok((service, client))
}

fn write_manifest(dir: &TempDir, text: &str) -> Result<StackManifest> {
    let path = dir.path().join("stack.toml");
    fs::write(&path, text)?;
    Ok(StackManifest::load(&path)?)
}

#[test]
fn test_manifest_builds_stack_in_order() -> Result<()> {
    let dir = TempDir::new()?;
    fs::create_dir_all(dir.path().join("sdcard/mods"))?;
    fs::write(dir.path().join("sdcard/mods/title.bin"), b"modded")?;

    let manifest = write_manifest(
        &dir,
        r#"
        [[device]]
        name = "sd"
        root = "sdcard"

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
        "#,
    )?;

    let (service, client) = bound(&Config::default())?;
    let applied = manifest.apply(&client)?;
    assert_eq!(applied.layers.len(), 2);

    let layers = service.layers();
    assert_eq!(layers[0].name, "boot");
    assert_eq!(layers[0].kind, LayerKind::ReplaceFile);
    assert!(!layers[0].active);
    assert_eq!(layers[1].kind, LayerKind::MergeDirectory);

    let mods = applied.layers[0].1;
    assert_eq!(
        service.resolve("/vol/content/title.bin")?,
        Resolution::Redirected {
            layer: mods,
            host_path: dir.path().join("sdcard/mods/title.bin"),
        }
    );
    // The inactive file layer does not hide the original.
    assert!(matches!(service.resolve("/vol/content/boot.bin")?, Resolution::Original { .. }));
    Ok(())
}

#[test]
fn test_manifest_ex_layer_on_v1_service() -> Result<()> {
    let dir = TempDir::new()?;
    let manifest = write_manifest(
        &dir,
        r#"
        [[device]]
        name = "sd"
        root = "/mnt/sd"

        [[layer]]
        name = "dlc"
        kind = "merge-directory"
        target = "/vol/aoc"
        replacement = "sd:/dlc"
        "#,
    )?;

    let mut config = Config::default();
    config.module.api_version = 1;
    let (_service, client) = bound(&config)?;

    let err = manifest.apply(&client).unwrap_err();
    assert!(matches!(
        err,
        ManifestError::Redirection { source: RedirectionError::UnsupportedCommand(_), .. }
    ));
    Ok(())
}

#[test]
fn test_manifest_failure_reports_layers_already_added() -> Result<()> {
    let dir = TempDir::new()?;
    let manifest = write_manifest(
        &dir,
        r#"
        [[device]]
        name = "sd"
        root = "/mnt/sd"

        [[layer]]
        name = "mods"
        kind = "content-merge"
        replacement = "sd:/mods"

        [[layer]]
        name = "dlc"
        kind = "merge-directory"
        target = "/vol/aoc"
        replacement = "sd:/dlc"
        "#,
    )?;

    let mut config = Config::default();
    config.module.api_version = 1;
    let (service, client) = bound(&config)?;

    let (item, applied) = match manifest.apply(&client).unwrap_err() {
        ManifestError::Redirection { item, applied, .. } => (item, applied),
        other => panic!("unexpected error: {other}"),
    };
    assert_eq!(item, "layer dlc");
    assert_eq!(applied.layers.len(), 1);
    assert_eq!(applied.layers[0].0, "mods");

    // No rollback: the first layer stays in the service.
    let layers = service.layers();
    assert_eq!(layers.len(), 1);
    assert_eq!(layers[0].handle, applied.layers[0].1);
    assert_eq!(service.devices().len(), 1);
    Ok(())
}

#[test]
fn test_manifest_device_rejected_when_table_full() -> Result<()> {
    let dir = TempDir::new()?;
    let manifest = write_manifest(
        &dir,
        "[[device]]\nname = \"sd\"\nroot = \"/a\"\n\n[[device]]\nname = \"usb\"\nroot = \"/b\"\n",
    )?;

    let mut config = Config::default();
    config.limits.max_devices = 1;
    let (_service, client) = bound(&config)?;

    let err = manifest.apply(&client).unwrap_err();
    assert!(matches!(err, ManifestError::DeviceRejected { ref name, result: -1 } if name == "usb"));
    Ok(())
}

#[test]
fn test_config_file_shapes_service() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("content-redirection.toml");
    fs::write(
        &path,
        r#"
        [module]
        api_version = 1
        exports = ["CRGetVersion", "CRAddFSLayer", "CRAddDevice"]

        [user]
        current_user_id = 2147483649
        "#,
    )?;

    let config = Config::load_from(Some(&path))?;
    let (_service, client) = bound(&config)?;
    let binding = client.binding().unwrap();
    assert_eq!(binding.version().raw(), 1);
    assert_eq!(binding.capabilities().unavailable().len(), 4);
    Ok(())
}
