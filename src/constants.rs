// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Pixel format forced on the preview branch
pub const PREVIEW_FORMAT: &str = "RGBA";

/// Preview framerate (numerator over 1)
pub const PREVIEW_FRAMERATE: i32 = 30;

/// Interval of the recording-duration tick
pub const RECORDING_TICK_INTERVAL: Duration = Duration::from_millis(30);

/// Automatic restarts allowed after stream errors before giving up
///
/// The budget refills on every caller-initiated `play_device`.
pub const MAX_ERROR_RESTARTS: u32 = 3;

/// Element names used inside the capture graph
pub mod elements {
    /// The camerabin pipeline itself; capture-finished messages come from here
    pub const CAMERABIN: &str = "camerabin";
    /// Camera source wrapping the device source
    pub const CAMERA_SOURCE: &str = "wrappercamerabinsrc";
    /// Device source inside the camera source
    pub const DEVICE_SOURCE: &str = "v4l2src";
    /// GL upload stage in front of GL sinks
    pub const GL_UPLOAD: &str = "glupload";
    /// Default display sink
    pub const DEFAULT_DISPLAY_SINK: &str = "glimagesink";
}

/// File naming
pub mod files {
    /// Base name of photos
    pub const PHOTO_BASE_NAME: &str = "picture";
    /// Photo extension
    pub const PHOTO_EXTENSION: &str = "jpg";
    /// Base name of recordings
    pub const VIDEO_BASE_NAME: &str = "video";
    /// Recording extension, matching [`super::recording::CONTAINER_CAPS`]
    pub const VIDEO_EXTENSION: &str = "mkv";
    /// `chrono` format of the timestamp in suggested names
    pub const SUGGESTED_NAME_TIMESTAMP: &str = "%Y-%m-%d_%H-%M-%S";
    /// `chrono` format of the timestamp in temporary recording names
    pub const TEMP_RECORDING_TIMESTAMP: &str = "%d%m%Y_%H%M%S";
    /// Prefix of temporary files written by the controller
    pub const TEMP_PREFIX: &str = "webcam";
    /// Suffix of the lazily captured sample image
    pub const SAMPLE_IMAGE_SUFFIX: &str = "sampleimage.jpg";
}

/// Encoding profile of recordings
pub mod recording {
    /// Container the recording is muxed into
    pub const CONTAINER_CAPS: &str = "video/x-matroska";
    /// Video stream
    pub const VIDEO_CAPS: &str = "video/x-vp8";
    /// Audio stream, dropped when no microphone is available
    pub const AUDIO_CAPS: &str = "audio/x-vorbis";
}

/// Notification event ids
pub mod notifications {
    /// Application name reported to the notification server
    pub const APP_NAME: &str = "Webcam";
    /// Icon shown with notifications
    pub const ICON: &str = "camera-photo";
    /// Event id of the "photo taken" notification
    pub const PHOTO_TAKEN: &str = "photoTaken";
    /// Expiry in milliseconds; -1 lets the server decide
    pub const EXPIRE_TIMEOUT: i32 = -1;
}
