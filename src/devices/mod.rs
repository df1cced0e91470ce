// SPDX-License-Identifier: GPL-3.0-only

//! Device registry
//!
//! Keeps the list of capture devices, which one is currently playing, and the
//! per-device extra filter strings. Interested parties subscribe to
//! [`DeviceEvent`]s; the capture controller reacts to them by rebinding or
//! halting its graph.
//!
//! ```text
//! enumerate/hot-plug ──▶ DeviceManager ──DeviceEvent──▶ CaptureController
//!                             ▲
//!                   Config (last device, filters)
//! ```

pub mod controls;
pub mod enumeration;

pub use enumeration::enumerate_v4l2_cameras;

use crate::config::Config;
use crate::errors::{DeviceError, DeviceResult};
use crate::events::{EventEmitter, EventReceiver};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// A capture device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// Stable unique id (survives re-enumeration and re-plugging)
    pub udi: String,
    /// Human-readable name (V4L2 card)
    pub name: String,
    /// Device node, e.g. /dev/video0
    pub path: String,
    /// Extra filter chain as a GStreamer bin description (may be empty)
    pub filters: String,
}

impl CameraDevice {
    pub fn new(udi: impl Into<String>, name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            udi: udi.into(),
            name: name.into(),
            path: path.into(),
            filters: String::new(),
        }
    }

    /// Restore the device's hardware controls to their defaults
    pub fn reset(&self) -> DeviceResult<usize> {
        controls::reset_to_defaults(&self.path)
    }
}

/// Registry notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A (different) device is now the playing one
    PlayingDeviceChanged(CameraDevice),
    /// The last device went away
    NoDevices,
    /// The extra filters of a device changed
    FiltersChanged { udi: String, filters: String },
}

/// Registry of capture devices
#[derive(Debug, Default)]
pub struct DeviceManager {
    devices: Vec<CameraDevice>,
    playing: Option<String>,
    /// Device to prefer when choosing what to play (restored from config)
    preferred: Option<String>,
    /// Filters by device id, kept across re-enumeration
    filters: HashMap<String, String>,
    events: EventEmitter<DeviceEvent>,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for registry events
    pub fn subscribe(&mut self) -> EventReceiver<DeviceEvent> {
        self.events.subscribe()
    }

    /// Re-enumerate V4L2 devices
    pub fn refresh(&mut self) -> usize {
        let cameras = enumerate_v4l2_cameras();
        let count = cameras.len();
        self.set_devices(cameras);
        count
    }

    /// Replace the device list (enumeration result or hot-plug update)
    ///
    /// An empty list emits [`DeviceEvent::NoDevices`]. If the playing device
    /// is gone (or nothing plays yet) the preferred device, or else the first
    /// one, becomes the playing device.
    pub fn set_devices(&mut self, devices: Vec<CameraDevice>) {
        self.devices = devices
            .into_iter()
            .map(|mut device| {
                if let Some(filters) = self.filters.get(&device.udi) {
                    device.filters = filters.clone();
                }
                device
            })
            .collect();

        if self.devices.is_empty() {
            info!("No capture devices");
            self.playing = None;
            self.events.emit(DeviceEvent::NoDevices);
            return;
        }

        let still_present = self
            .playing
            .as_ref()
            .is_some_and(|udi| self.devices.iter().any(|d| &d.udi == udi));
        if still_present {
            return;
        }

        let next = self
            .preferred
            .as_ref()
            .and_then(|udi| self.devices.iter().find(|d| &d.udi == udi))
            .unwrap_or(&self.devices[0])
            .clone();

        info!(udi = %next.udi, name = %next.name, "Selecting playing device");
        self.playing = Some(next.udi.clone());
        self.events.emit(DeviceEvent::PlayingDeviceChanged(next));
    }

    pub fn devices(&self) -> &[CameraDevice] {
        &self.devices
    }

    pub fn device(&self, udi: &str) -> Option<&CameraDevice> {
        self.devices.iter().find(|d| d.udi == udi)
    }

    /// The device that should currently be shown
    pub fn playing_device(&self) -> Option<&CameraDevice> {
        self.playing.as_deref().and_then(|udi| self.device(udi))
    }

    /// Make `udi` the playing device; a no-op if it already is
    pub fn set_playing(&mut self, udi: &str) -> DeviceResult<()> {
        let device = self
            .device(udi)
            .cloned()
            .ok_or_else(|| DeviceError::NotFound(udi.to_string()))?;

        if self.playing.as_deref() == Some(udi) {
            return Ok(());
        }

        info!(udi, name = %device.name, "Playing device changed");
        self.playing = Some(device.udi.clone());
        self.preferred = Some(device.udi.clone());
        self.events.emit(DeviceEvent::PlayingDeviceChanged(device));
        Ok(())
    }

    /// [`DeviceManager::set_playing`] by position in the device list
    pub fn set_playing_index(&mut self, index: usize) -> DeviceResult<()> {
        let udi = self
            .devices
            .get(index)
            .map(|d| d.udi.clone())
            .ok_or_else(|| DeviceError::NotFound(format!("index {}", index)))?;
        self.set_playing(&udi)
    }

    /// Change the extra filters of a device
    pub fn set_filters(&mut self, udi: &str, filters: &str) -> DeviceResult<()> {
        let device = self
            .devices
            .iter_mut()
            .find(|d| d.udi == udi)
            .ok_or_else(|| DeviceError::NotFound(udi.to_string()))?;

        if device.filters == filters {
            return Ok(());
        }

        device.filters = filters.to_string();
        if filters.is_empty() {
            self.filters.remove(udi);
        } else {
            self.filters.insert(udi.to_string(), filters.to_string());
        }

        debug!(udi, filters, "Device filters changed");
        self.events.emit(DeviceEvent::FiltersChanged {
            udi: udi.to_string(),
            filters: filters.to_string(),
        });
        Ok(())
    }

    /// Reset the playing device: clear its filters and restore its controls
    pub fn reset_playing_device(&mut self) -> DeviceResult<usize> {
        let device = self.playing_device().cloned().ok_or(DeviceError::NoDevices)?;

        self.set_filters(&device.udi, "")?;
        device.reset().inspect_err(|e| {
            warn!(udi = %device.udi, error = %e, "Failed to reset device controls");
        })
    }

    /// Apply persisted state (preferred device, filters)
    pub fn restore(&mut self, config: &Config) {
        self.preferred = config.last_device.clone();
        self.filters = config.device_filters.clone();

        for device in &mut self.devices {
            device.filters = self.filters.get(&device.udi).cloned().unwrap_or_default();
        }
    }

    /// Persist state into `config`
    pub fn save(&self, config: &mut Config) {
        config.last_device = self.playing.clone().or_else(|| self.preferred.clone());
        config.device_filters = self.filters.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::drain;

    fn cam(udi: &str) -> CameraDevice {
        CameraDevice::new(udi, format!("Camera {}", udi), format!("/dev/{}", udi))
    }

    #[test]
    fn test_first_device_becomes_playing() {
        let mut manager = DeviceManager::new();
        let mut rx = manager.subscribe();

        manager.set_devices(vec![cam("a"), cam("b")]);

        assert_eq!(manager.playing_device().map(|d| d.udi.as_str()), Some("a"));
        assert_eq!(drain(&mut rx), vec![DeviceEvent::PlayingDeviceChanged(cam("a"))]);
    }

    #[test]
    fn test_restored_preference_wins() {
        let mut manager = DeviceManager::new();
        let mut config = Config::default();
        config.last_device = Some("b".to_string());
        config.device_filters.insert("b".to_string(), "videoflip method=rotate-180".to_string());
        manager.restore(&config);

        manager.set_devices(vec![cam("a"), cam("b")]);

        let playing = manager.playing_device().unwrap();
        assert_eq!(playing.udi, "b");
        assert_eq!(playing.filters, "videoflip method=rotate-180");
    }

    #[test]
    fn test_unplugging_everything_emits_no_devices() {
        let mut manager = DeviceManager::new();
        manager.set_devices(vec![cam("a")]);
        let mut rx = manager.subscribe();

        manager.set_devices(Vec::new());

        assert!(manager.playing_device().is_none());
        assert_eq!(drain(&mut rx), vec![DeviceEvent::NoDevices]);
    }

    #[test]
    fn test_replugging_keeps_playing_device_quiet() {
        let mut manager = DeviceManager::new();
        manager.set_devices(vec![cam("a"), cam("b")]);
        manager.set_playing("b").unwrap();
        let mut rx = manager.subscribe();

        manager.set_devices(vec![cam("b"), cam("c")]);
        assert!(drain(&mut rx).is_empty());

        manager.set_devices(vec![cam("c")]);
        assert_eq!(drain(&mut rx), vec![DeviceEvent::PlayingDeviceChanged(cam("c"))]);
    }

    #[test]
    fn test_set_playing_is_idempotent() {
        let mut manager = DeviceManager::new();
        manager.set_devices(vec![cam("a"), cam("b")]);
        let mut rx = manager.subscribe();

        manager.set_playing_index(1).unwrap();
        manager.set_playing("b").unwrap();

        assert_eq!(drain(&mut rx).len(), 1);
        assert_eq!(manager.set_playing("zzz"), Err(DeviceError::NotFound("zzz".to_string())));
    }

    #[test]
    fn test_filters_survive_reenumeration_and_save() {
        let mut manager = DeviceManager::new();
        manager.set_devices(vec![cam("a")]);
        let mut rx = manager.subscribe();

        manager.set_filters("a", "videobalance saturation=0").unwrap();
        manager.set_filters("a", "videobalance saturation=0").unwrap();
        assert_eq!(drain(&mut rx).len(), 1);

        manager.set_devices(vec![cam("a")]);
        assert_eq!(manager.device("a").unwrap().filters, "videobalance saturation=0");

        let mut config = Config::default();
        manager.save(&mut config);
        assert_eq!(config.last_device.as_deref(), Some("a"));
        assert_eq!(
            config.device_filters.get("a").map(String::as_str),
            Some("videobalance saturation=0")
        );
    }

    #[test]
    fn test_reset_clears_filters_before_touching_hardware() {
        let mut manager = DeviceManager::new();
        manager.set_devices(vec![cam("nonexistent-node")]);
        manager.set_filters("nonexistent-node", "videoflip method=vertical-flip").unwrap();

        // The fake node cannot be opened, but the filters are already cleared
        assert!(matches!(manager.reset_playing_device(), Err(DeviceError::Control(_))));
        assert_eq!(manager.device("nonexistent-node").unwrap().filters, "");
    }

    #[test]
    fn test_reset_without_devices() {
        let mut manager = DeviceManager::new();
        assert_eq!(manager.reset_playing_device(), Err(DeviceError::NoDevices));
    }
}
