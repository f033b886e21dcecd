//! Error taxonomy for the microphone service.
//! Every error is reported synchronously to the caller; nothing is retried here.

/// Errors produced by session control, the device layer, and the level estimator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MicError {
    /// Microphone access was not authorized by the host/OS.
    PermissionDenied,
    /// The audio device could not be opened at the requested configuration.
    DeviceInitFailed(String),
    /// Releasing the device hit an OS-level error. The session is still inactive.
    DeviceStopFailed(String),
    /// A pending read failed. Absorbed by the capture worker, never surfaced to the host.
    DeviceReadFailed(String),
    /// Bad arguments, e.g. a zero sample count passed to the estimator.
    InvalidInput(String),
}

impl MicError {
    /// Stable code for hosts that match on strings rather than variants.
    pub fn code(&self) -> &'static str {
        match self {
            MicError::PermissionDenied => "PERMISSION_DENIED",
            MicError::DeviceInitFailed(_) => "INIT_FAILED",
            MicError::DeviceStopFailed(_) => "STOP_FAILED",
            MicError::DeviceReadFailed(_) => "READ_FAILED",
            MicError::InvalidInput(_) => "INVALID_INPUT",
        }
    }
}

impl std::fmt::Display for MicError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MicError::PermissionDenied => write!(f, "microphone permission is required"),
            MicError::DeviceInitFailed(msg) => write!(f, "could not initialize audio device: {msg}"),
            MicError::DeviceStopFailed(msg) => write!(f, "could not release audio device: {msg}"),
            MicError::DeviceReadFailed(msg) => write!(f, "audio device read failed: {msg}"),
            MicError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
        }
    }
}

impl std::error::Error for MicError {}
