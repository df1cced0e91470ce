// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::elements;
use crate::errors::{AppError, AppResult};
use crate::location::Location;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory name under the user's config directory
const CONFIG_DIR_NAME: &str = "webcam";
const CONFIG_FILE_NAME: &str = "config.json";

/// Persisted user settings
///
/// Read at capture time for the photo/video destinations, and written back by
/// the device registry on shutdown.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where photos are saved
    pub save_url: Location,
    /// Where finished recordings are moved to
    pub save_videos: Location,
    /// Mirror the preview horizontally (selfie mode)
    pub mirror_preview: bool,
    /// Stable id of the last played device
    pub last_device: Option<String>,
    /// Extra filter description per device (key = device id)
    pub device_filters: HashMap<String, String>,
    /// GStreamer factory of the display sink
    pub display_sink: String,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(std::env::temp_dir);

        Self {
            save_url: Location::Local(dirs::picture_dir().unwrap_or_else(|| home.join("Pictures"))),
            save_videos: Location::Local(dirs::video_dir().unwrap_or_else(|| home.join("Videos"))),
            mirror_preview: true, // Default to mirrored (selfie mode)
            last_device: None,
            device_filters: HashMap::new(),
            display_sink: elements::DEFAULT_DISPLAY_SINK.to_string(),
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(&Self::default_path())
    }

    /// Load from `path`; a missing or unreadable file yields the defaults
    pub fn load_from(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read config, using defaults");
                return Self::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
                Self::default()
            }
        }
    }

    /// Save to the default location
    pub fn save(&self) -> AppResult<()> {
        self.save_to(&Self::default_path())
    }

    /// Write to `path` via a sibling temporary file and rename
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        let parent = path
            .parent()
            .ok_or_else(|| AppError::Config(format!("No parent directory for {}", path.display())))?;
        std::fs::create_dir_all(parent)?;

        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;

        debug!(path = %path.display(), "Config saved");
        Ok(())
    }
}
