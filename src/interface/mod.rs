// Service interface
//
// The function contract between the client library and the redirection
// service module. The client only ever talks to the service through these
// traits, so any conforming module (the in-process reference service, a
// mock, a foreign module wrapper) can sit behind the binding.

pub mod api_error;
pub mod device;
pub mod module;

pub use api_error::{ApiErrorType, ApiResult};
pub use device::DeviceDescriptor;
pub use module::{Export, MODULE_NAME, ModuleLoader, RedirectionModule};

#[cfg(any(test, feature = "mockall"))]
pub use module::{MockModuleLoader, MockRedirectionModule};
