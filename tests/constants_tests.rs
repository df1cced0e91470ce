// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use std::time::Duration;
use webcam::constants::{MAX_ERROR_RESTARTS, RECORDING_TICK_INTERVAL, files, recording};

#[test]
fn test_recording_tick_is_30ms() {
    assert_eq!(RECORDING_TICK_INTERVAL, Duration::from_millis(30));
}

#[test]
fn test_restart_budget_is_bounded() {
    assert!(MAX_ERROR_RESTARTS > 0);
    assert!(MAX_ERROR_RESTARTS <= 10, "Restart budget should stay small");
}

#[test]
fn test_file_name_parts() {
    assert_eq!(files::PHOTO_BASE_NAME, "picture");
    assert_eq!(files::PHOTO_EXTENSION, "jpg");
    assert_eq!(files::VIDEO_BASE_NAME, "video");
    assert_eq!(files::VIDEO_EXTENSION, "mkv");
    // Timestamps must not contain path separators or colons
    assert!(!files::SUGGESTED_NAME_TIMESTAMP.contains(':'));
    assert!(!files::SUGGESTED_NAME_TIMESTAMP.contains('/'));
}

#[test]
fn test_recordings_are_muxed_as_matroska() {
    assert_eq!(recording::CONTAINER_CAPS, "video/x-matroska");
    assert_eq!(files::VIDEO_EXTENSION, "mkv");
    assert!(recording::VIDEO_CAPS.starts_with("video/"));
    assert!(recording::AUDIO_CAPS.starts_with("audio/"));
}
