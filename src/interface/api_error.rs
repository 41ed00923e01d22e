//! Error vocabulary of the redirection service itself.

/// Result of a service entry point. The error is the raw code the service
/// returned, which may lie outside [`ApiErrorType`] for newer revisions.
pub type ApiResult<T> = Result<T, i32>;

/// Error codes a service entry point returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ApiErrorType {
    None = 0,
    InvalidArg = -1,
    NoMemory = -2,
    UnknownFsLayerType = -3,
    LayerNotFound = -4,
}

impl ApiErrorType {
    pub const ALL: [ApiErrorType; 5] = [
        ApiErrorType::None,
        ApiErrorType::InvalidArg,
        ApiErrorType::NoMemory,
        ApiErrorType::UnknownFsLayerType,
        ApiErrorType::LayerNotFound,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.code() == code)
    }
}
