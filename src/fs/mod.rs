pub mod backing;
pub mod error;
pub mod path;

pub use backing::{Backing, HostFs};
pub use error::{PathError, PathResult, ResolveError, ResolveResult};
