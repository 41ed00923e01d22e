//! Layer composition model.
//!
//! This module provides:
//! - Layer kinds, both generalized and the legacy volume-specific ones
//! - The layer record and the priority-ordered layer stack
//! - Path resolution and merged directory listing through a stack

mod kind;
mod resolver;
mod stack;

pub use kind::{FsLayerType, FsLayerTypeEx, LayerKind, UnknownLayerType, Volume};
pub use resolver::{DELETION_MARKER, DeviceMap, Resolution, Resolver, is_valid_marker};
pub use stack::{LayerStack, RedirectionLayer, Replacement};
