// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the webcam controller and its collaborators

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type for capture pipeline operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Result type for device registry operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Top-level error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Capture pipeline errors
    Capture(CaptureError),
    /// Device registry / device control errors
    Device(DeviceError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Capture pipeline errors
///
/// None of these are fatal to the process. The controller logs them and
/// reports them to the caller, the worst visible outcome being a missing
/// preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// A required media element could not be created (plugin missing)
    EngineUnavailable(String),
    /// Capture requested before any device was bound
    NoActivePipeline,
    /// Engine-reported fault on the bus
    StreamError(String),
    /// Stream terminated by the engine
    EndOfStream,
    /// Operation not valid in the current controller state
    InvalidState(String),
}

/// Device registry errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// No device with the given id or path
    NotFound(String),
    /// The registry has no devices at all
    NoDevices,
    /// A V4L2 control could not be read or written
    Control(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Capture(e) => write!(f, "Capture error: {}", e),
            AppError::Device(e) => write!(f, "Device error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::EngineUnavailable(msg) => write!(f, "Media engine unavailable: {}", msg),
            CaptureError::NoActivePipeline => write!(f, "No active pipeline"),
            CaptureError::StreamError(msg) => write!(f, "Stream error: {}", msg),
            CaptureError::EndOfStream => write!(f, "End of stream"),
            CaptureError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::NotFound(id) => write!(f, "Device not found: {}", id),
            DeviceError::NoDevices => write!(f, "No capture devices available"),
            DeviceError::Control(msg) => write!(f, "Device control failed: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for DeviceError {}

impl From<CaptureError> for AppError {
    fn from(err: CaptureError) -> Self {
        AppError::Capture(err)
    }
}

impl From<DeviceError> for AppError {
    fn from(err: DeviceError) -> Self {
        AppError::Device(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<gstreamer::glib::Error> for CaptureError {
    fn from(err: gstreamer::glib::Error) -> Self {
        CaptureError::EngineUnavailable(err.to_string())
    }
}

impl From<gstreamer::glib::BoolError> for CaptureError {
    fn from(err: gstreamer::glib::BoolError) -> Self {
        CaptureError::StreamError(err.to_string())
    }
}
