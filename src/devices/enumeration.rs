// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 capture device discovery

use super::CameraDevice;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use v4l::Device;
use v4l::capability::Flags;

/// Directory of persistent per-device symlinks maintained by udev
const BY_ID_DIR: &str = "/dev/v4l/by-id";

/// Enumerate `/dev/video*` nodes that can capture video
pub fn enumerate_v4l2_cameras() -> Vec<CameraDevice> {
    let stable_ids = stable_id_map(Path::new(BY_ID_DIR));

    let mut nodes: Vec<PathBuf> = std::fs::read_dir("/dev")
        .into_iter()
        .flatten()
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("video"))
        })
        .collect();
    nodes.sort();

    let mut cameras = Vec::new();
    for path in nodes {
        let Ok(dev) = Device::with_path(&path) else {
            debug!(path = %path.display(), "Cannot open V4L2 node");
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            debug!(path = %path.display(), "VIDIOC_QUERYCAP failed");
            continue;
        };

        // Metadata and output nodes share the video* namespace
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            debug!(path = %path.display(), "Skipping non-capture node");
            continue;
        }

        let real_path = std::fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        let udi = stable_ids
            .get(&real_path)
            .cloned()
            .unwrap_or_else(|| real_path.to_string_lossy().to_string());

        info!(name = %caps.card, path = %path.display(), udi = %udi, driver = %caps.driver, "Found camera");
        cameras.push(CameraDevice::new(
            udi,
            caps.card,
            path.to_string_lossy().to_string(),
        ));
    }

    cameras
}

/// Map canonical node paths to the name of their persistent by-id link
fn stable_id_map(by_id_dir: &Path) -> HashMap<PathBuf, String> {
    let mut map = HashMap::new();

    for entry in std::fs::read_dir(by_id_dir).into_iter().flatten().flatten() {
        let link = entry.path();
        if let Ok(target) = std::fs::canonicalize(&link) {
            map.insert(target, entry.file_name().to_string_lossy().to_string());
        }
    }

    map
}
