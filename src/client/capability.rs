use std::collections::BTreeSet;

use super::status::{RedirectionError, RedirectionResult};
use crate::interface::{Export, RedirectionModule};
use crate::types::ApiVersion;

/// Entry points a bound module resolved, together with the negotiated version.
///
/// An operation is callable only if its entry point resolved and the version
/// reaches the entry point's minimum. Either failing yields
/// `UnsupportedCommand`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityTable {
    version: ApiVersion,
    resolved: BTreeSet<Export>,
}

impl CapabilityTable {
    /// Ask `module` for every entry point. Missing ones are recorded, not fatal.
    pub fn discover(module: &dyn RedirectionModule, version: ApiVersion) -> Self {
        let mut resolved = BTreeSet::new();
        for export in Export::ALL {
            if module.has_export(export.symbol()) {
                resolved.insert(export);
            } else {
                tracing::warn!(symbol = export.symbol(), "FindExport failed");
            }
        }
        Self { version, resolved }
    }

    pub fn from_parts(version: ApiVersion, resolved: impl IntoIterator<Item = Export>) -> Self {
        Self { version, resolved: resolved.into_iter().collect() }
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    pub fn is_resolved(&self, export: Export) -> bool {
        self.resolved.contains(&export)
    }

    pub fn supports(&self, export: Export) -> bool {
        self.is_resolved(export) && self.version >= export.min_version()
    }

    pub fn check(&self, export: Export) -> RedirectionResult<()> {
        if self.supports(export) {
            Ok(())
        } else {
            Err(RedirectionError::UnsupportedCommand(export))
        }
    }

    /// Entry points that cannot be called on this binding.
    pub fn unavailable(&self) -> Vec<Export> {
        Export::ALL.into_iter().filter(|e| !self.supports(*e)).collect()
    }
}
