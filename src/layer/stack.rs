//! Layer records and the priority-ordered stack that holds them.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::kind::LayerKind;
use crate::types::LayerHandle;

/// Where a layer's data lives: a path inside a registered device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub device: String,
    /// Normalized absolute path inside the device.
    pub path: String,
}

impl std::fmt::Display for Replacement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.device, self.path)
    }
}

/// A single redirection rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectionLayer {
    pub handle: LayerHandle,
    /// Diagnostic label only.
    pub name: String,
    pub kind: LayerKind,
    /// Normalized logical path the layer intercepts.
    pub target_root: String,
    pub replacement: Replacement,
    pub active: bool,
}

/// Layers ordered by priority, highest first.
///
/// New layers are pushed to the front; nothing ever moves a layer relative
/// to the others afterwards.
#[derive(Debug, Clone, Default)]
pub struct LayerStack {
    layers: VecDeque<RedirectionLayer>,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `layer` on top of the stack.
    ///
    /// Returns the layer back if its handle is already present.
    pub fn push(&mut self, layer: RedirectionLayer) -> Result<(), RedirectionLayer> {
        if self.get(layer.handle).is_some() {
            return Err(layer);
        }
        self.layers.push_front(layer);
        Ok(())
    }

    pub fn remove(&mut self, handle: LayerHandle) -> Option<RedirectionLayer> {
        let index = self.layers.iter().position(|l| l.handle == handle)?;
        self.layers.remove(index)
    }

    /// Returns false if no layer has `handle`.
    pub fn set_active(&mut self, handle: LayerHandle, active: bool) -> bool {
        match self.layers.iter_mut().find(|l| l.handle == handle) {
            Some(layer) => {
                layer.active = active;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, handle: LayerHandle) -> Option<&RedirectionLayer> {
        self.layers.iter().find(|l| l.handle == handle)
    }

    /// All layers, highest priority first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &RedirectionLayer> {
        self.layers.iter()
    }

    /// Active layers, highest priority first.
    pub fn active(&self) -> impl DoubleEndedIterator<Item = &RedirectionLayer> {
        self.layers.iter().filter(|l| l.active)
    }

    /// Handles in priority order, highest first.
    pub fn handles(&self) -> Vec<LayerHandle> {
        self.layers.iter().map(|l| l.handle).collect()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layers whose replacement lives on `device`.
    pub fn on_device<'a>(&'a self, device: &'a str) -> impl Iterator<Item = &'a RedirectionLayer> {
        self.layers.iter().filter(move |l| l.replacement.device == device)
    }
}
