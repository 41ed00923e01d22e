use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::interface::{Export, MODULE_NAME};
use crate::layer::{DELETION_MARKER, is_valid_marker};

const ENV_PREFIX: &str = "CONTENT_REDIRECTION";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub module: ModuleConfig,
    pub limits: LimitsConfig,
    pub user: UserConfig,
    pub whiteout: WhiteoutConfig,
}

/// How the in-process service presents itself to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    pub name: String,
    pub api_version: u32,
    /// Exported entry point symbols. Leaving some out emulates an older
    /// service revision.
    pub exports: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_layers: usize,
    pub max_devices: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub current_user_id: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhiteoutConfig {
    pub marker: String,
}

impl Config {
    /// Load from `content-redirection.*` in the working directory (if present)
    /// and `CONTENT_REDIRECTION__*` environment variables.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(None)
    }

    /// Like [`load`](Self::load), with an explicit file that must exist.
    pub fn load_from(file: Option<&Path>) -> anyhow::Result<Self> {
        let file_source = match file {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("content-redirection").required(false),
        };

        let config = config::Config::builder()
            .add_source(file_source)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("module.exports"),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would silently break resolution.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !is_valid_marker(&self.whiteout.marker) {
            anyhow::bail!(
                "Invalid whiteout marker {:?}: must be non-empty without '/' or NUL",
                self.whiteout.marker
            );
        }
        Ok(())
    }
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            name: MODULE_NAME.to_string(),
            api_version: 2,
            exports: Export::ALL.iter().map(|e| e.symbol().to_string()).collect(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { max_layers: 64, max_devices: 16 }
    }
}

impl Default for WhiteoutConfig {
    fn default() -> Self {
        Self { marker: DELETION_MARKER.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_config_default_values() {
        let config = Config::default();

        assert_eq!(config.module.name, "homebrew_content_redirection");
        assert_eq!(config.module.api_version, 2);
        assert_eq!(config.module.exports.len(), 7);
        assert!(config.module.exports.iter().any(|e| e == "CRAddFSLayerEx"));

        assert_eq!(config.limits.max_layers, 64);
        assert_eq!(config.limits.max_devices, 16);

        assert_eq!(config.user.current_user_id, None);
        assert_eq!(config.whiteout.marker, ".deleted_");
    }

    #[test]
    #[serial]
    fn test_config_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[limits]\nmax_layers = 8\n").unwrap();

        // SAFETY: env access is serialized across the tests in this module.
        unsafe {
            std::env::set_var("CONTENT_REDIRECTION__MODULE__EXPORTS", "CRGetVersion,CRAddFSLayer");
            std::env::set_var("CONTENT_REDIRECTION__LIMITS__MAX_DEVICES", "3");
        }
        let loaded = Config::load_from(Some(&path));
        unsafe {
            std::env::remove_var("CONTENT_REDIRECTION__MODULE__EXPORTS");
            std::env::remove_var("CONTENT_REDIRECTION__LIMITS__MAX_DEVICES");
        }

        let config = loaded.unwrap();
        assert_eq!(config.module.exports, vec!["CRGetVersion", "CRAddFSLayer"]);
        assert_eq!(config.limits.max_devices, 3);
        assert_eq!(config.limits.max_layers, 8);
    }

    #[test]
    fn test_config_validate_marker() {
        assert!(Config::default().validate().is_ok());

        for marker in ["", "a/b", "x\0"] {
            let mut config = Config::default();
            config.whiteout.marker = marker.to_string();
            assert!(config.validate().is_err(), "marker {:?} accepted", marker);
        }
    }

    #[test]
    #[serial]
    fn test_config_load_rejects_empty_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[whiteout]\nmarker = \"\"\n").unwrap();

        let err = Config::load_from(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("whiteout marker"));
    }

    #[test]
    fn test_config_partial_deserialization() {
        let json = r#"{
            "module": {
                "api_version": 1,
                "exports": ["CRGetVersion", "CRAddFSLayer"]
            },
            "user": {
                "current_user_id": 2147483660
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.module.api_version, 1);
        assert_eq!(config.module.exports.len(), 2);
        assert_eq!(config.module.name, "homebrew_content_redirection");
        assert_eq!(config.user.current_user_id, Some(0x8000_000c));
        assert_eq!(config.limits.max_devices, 16);
    }

    #[test]
    #[serial]
    fn test_config_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "[limits]\nmax_layers = 2\n\n[whiteout]\nmarker = \".wh.\"\n",
        )
        .unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(config.limits.max_layers, 2);
        assert_eq!(config.limits.max_devices, 16);
        assert_eq!(config.whiteout.marker, ".wh.");
    }

    #[test]
    #[serial]
    fn test_config_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
