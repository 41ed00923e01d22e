//! Identifier types shared by the client and the service.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle of a redirection layer, assigned by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerHandle(u32);

impl LayerHandle {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for LayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Protocol version reported by the redirection service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiVersion(u32);

impl ApiVersion {
    /// Sentinel the service uses when it cannot tell its own version.
    pub const ERROR: ApiVersion = ApiVersion(0xFFFF_FFFF);

    /// Baseline revision: legacy layers, removal, activation and devices.
    pub const V1: ApiVersion = ApiVersion(1);

    /// Adds layers with an explicit target path.
    pub const V2: ApiVersion = ApiVersion(2);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub fn is_error(self) -> bool {
        self == Self::ERROR
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_error() { write!(f, "<version error>") } else { write!(f, "v{}", self.0) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_handle_display() {
        assert_eq!(LayerHandle::new(0x2a).to_string(), "0x0000002a");
    }

    #[test]
    fn test_api_version_ordering() {
        assert!(ApiVersion::V1 < ApiVersion::V2);
        assert!(ApiVersion::new(3) >= ApiVersion::V2);
    }

    #[test]
    fn test_api_version_error_sentinel() {
        assert!(ApiVersion::ERROR.is_error());
        assert!(!ApiVersion::V1.is_error());
        assert_eq!(ApiVersion::ERROR.to_string(), "<version error>");
        assert_eq!(ApiVersion::V2.to_string(), "v2");
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&LayerHandle::new(7)).unwrap();
        assert_eq!(json, "7");
        let version: ApiVersion = serde_json::from_str("2").unwrap();
        assert_eq!(version, ApiVersion::V2);
    }
}
