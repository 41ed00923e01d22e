//! Status taxonomy of the client interface and the translation from the
//! service's own error codes.

use std::fmt;
use thiserror::Error;

use crate::interface::{ApiErrorType, Export};

pub type RedirectionResult<T> = Result<T, RedirectionError>;

/// Stable status codes reported by every client operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    Success = 0,
    ModuleNotFound = -0x1,
    ModuleMissingExport = -0x2,
    UnsupportedVersion = -0x3,
    InvalidArgument = -0x10,
    NoMemory = -0x11,
    UnknownFsLayerType = -0x12,
    LayerNotFound = -0x13,
    LibUninitialized = -0x20,
    UnsupportedCommand = -0x21,
    UnknownError = -0x1000,
}

impl Status {
    pub const ALL: [Status; 11] = [
        Status::Success,
        Status::ModuleNotFound,
        Status::ModuleMissingExport,
        Status::UnsupportedVersion,
        Status::InvalidArgument,
        Status::NoMemory,
        Status::UnknownFsLayerType,
        Status::LayerNotFound,
        Status::LibUninitialized,
        Status::UnsupportedCommand,
        Status::UnknownError,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Status> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Canonical diagnostic name.
    pub fn name(self) -> &'static str {
        match self {
            Status::Success => "CONTENT_REDIRECTION_RESULT_SUCCESS",
            Status::ModuleNotFound => "CONTENT_REDIRECTION_RESULT_MODULE_NOT_FOUND",
            Status::ModuleMissingExport => "CONTENT_REDIRECTION_RESULT_MODULE_MISSING_EXPORT",
            Status::UnsupportedVersion => "CONTENT_REDIRECTION_RESULT_UNSUPPORTED_VERSION",
            Status::InvalidArgument => "CONTENT_REDIRECTION_RESULT_INVALID_ARGUMENT",
            Status::NoMemory => "CONTENT_REDIRECTION_RESULT_NO_MEMORY",
            Status::UnknownFsLayerType => "CONTENT_REDIRECTION_RESULT_UNKNOWN_FS_LAYER_TYPE",
            Status::LayerNotFound => "CONTENT_REDIRECTION_RESULT_LAYER_NOT_FOUND",
            Status::LibUninitialized => "CONTENT_REDIRECTION_RESULT_LIB_UNINITIALIZED",
            Status::UnsupportedCommand => "CONTENT_REDIRECTION_RESULT_UNSUPPORTED_COMMAND",
            Status::UnknownError => "CONTENT_REDIRECTION_RESULT_UNKNOWN_ERROR",
        }
    }

    /// Canonical name of a raw status code; unknown codes read as
    /// `UnknownError`.
    pub fn name_of(code: i32) -> &'static str {
        Status::from_code(code).unwrap_or(Status::UnknownError).name()
    }

    pub fn from_result<T>(result: &RedirectionResult<T>) -> Status {
        match result {
            Ok(_) => Status::Success,
            Err(e) => e.status(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Map a service error code onto the client status set.
///
/// Total: codes outside the service vocabulary become `UnknownError`.
pub fn translate(code: i32) -> Status {
    match ApiErrorType::from_code(code) {
        Some(ApiErrorType::None) => Status::Success,
        Some(ApiErrorType::InvalidArg) => Status::InvalidArgument,
        Some(ApiErrorType::NoMemory) => Status::NoMemory,
        Some(ApiErrorType::UnknownFsLayerType) => Status::UnknownFsLayerType,
        Some(ApiErrorType::LayerNotFound) => Status::LayerNotFound,
        None => Status::UnknownError,
    }
}

/// A failed client operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RedirectionError {
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Module is missing export {0}")]
    MissingExport(Export),

    #[error("Unsupported module version")]
    UnsupportedVersion,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Service is out of memory")]
    NoMemory,

    #[error("Unknown filesystem layer type")]
    UnknownFsLayerType,

    #[error("Layer not found")]
    LayerNotFound,

    #[error("Library is not initialized")]
    LibUninitialized,

    #[error("Unsupported command: {0}")]
    UnsupportedCommand(Export),

    #[error("Unknown error")]
    UnknownError,
}

impl RedirectionError {
    pub fn status(&self) -> Status {
        match self {
            RedirectionError::ModuleNotFound(_) => Status::ModuleNotFound,
            RedirectionError::MissingExport(_) => Status::ModuleMissingExport,
            RedirectionError::UnsupportedVersion => Status::UnsupportedVersion,
            RedirectionError::InvalidArgument(_) => Status::InvalidArgument,
            RedirectionError::NoMemory => Status::NoMemory,
            RedirectionError::UnknownFsLayerType => Status::UnknownFsLayerType,
            RedirectionError::LayerNotFound => Status::LayerNotFound,
            RedirectionError::LibUninitialized => Status::LibUninitialized,
            RedirectionError::UnsupportedCommand(_) => Status::UnsupportedCommand,
            RedirectionError::UnknownError => Status::UnknownError,
        }
    }

    /// Error for a failing service code.
    ///
    /// A service reporting "none" in a failure position is itself an
    /// unknown error.
    pub fn from_api_code(code: i32) -> Self {
        match translate(code) {
            Status::InvalidArgument => {
                RedirectionError::InvalidArgument("rejected by service".to_string())
            }
            Status::NoMemory => RedirectionError::NoMemory,
            Status::UnknownFsLayerType => RedirectionError::UnknownFsLayerType,
            Status::LayerNotFound => RedirectionError::LayerNotFound,
            _ => RedirectionError::UnknownError,
        }
    }
}

impl From<&RedirectionError> for Status {
    fn from(err: &RedirectionError) -> Self {
        err.status()
    }
}
