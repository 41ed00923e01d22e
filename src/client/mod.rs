//! Client library: binding, capability gating and status translation.

mod binding;
mod capability;
mod loader;
mod status;

pub use binding::{ContentRedirection, ServiceBinding};
pub use capability::CapabilityTable;
pub use loader::InProcessLoader;
pub use status::{RedirectionError, RedirectionResult, Status, translate};
