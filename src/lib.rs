//! Content redirection: layered overrides of console filesystem volumes.
//!
//! The [`client`] binds to a redirection service through the [`interface`]
//! contract, negotiating its version and gating each operation on the entry
//! points the service exports. The [`service`] is the in-process reference
//! implementation of that contract, resolving paths through a priority-ordered
//! [`layer`] stack.

pub mod client;
pub mod config;
pub mod fs;
pub mod interface;
pub mod layer;
pub mod manifest;
pub mod service;
pub mod types;

pub use client::{ContentRedirection, RedirectionError, RedirectionResult, Status};
pub use config::Config;
pub use service::RedirectionService;
pub use types::{ApiVersion, LayerHandle};
