// SPDX-License-Identifier: GPL-3.0-only

//! Capture pipeline
//!
//! One live media graph, bound to at most one device, driven by the
//! [`CaptureController`]. The graph itself sits behind the [`MediaEngine`] /
//! [`CaptureGraph`] traits so the controller does not depend on GStreamer
//! directly.
//!
//! ```text
//! camerabin
//!   camera-source (v4l2src)
//!     ├─▶ viewfinder: convert ▶ caps ▶ upload ▶ display sink
//!     ├─▶ image branch (mode-image) ▶ location
//!     └─▶ video branch (mode-video) ▶ location
//!           │
//!           │ bus messages (engine threads)
//!           ▼
//!   BusEvent queue ──▶ CaptureController (owning thread)
//! ```
//!
//! # Modules
//!
//! - [`camerabin`]: GStreamer implementation of the engine
//! - [`controller`]: mode transitions and bus-event recovery

pub mod camerabin;
pub mod controller;
#[cfg(test)]
pub(crate) mod testing;

pub use camerabin::{CameraBinEngine, CameraBinGraph};
pub use controller::{CaptureController, CaptureRequest, ControllerEvent, ControllerState};

use crate::errors::CaptureResult;
use crate::events::EventReceiver;
use std::path::Path;

/// Graph mode
///
/// Conceptually Preview=0, Photo=1, Video=2. Preview and video share the
/// engine's video mode; they only differ in whether a capture is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    #[default]
    Preview,
    Photo,
    Video,
}

impl CaptureMode {
    pub fn index(self) -> u8 {
        match self {
            CaptureMode::Preview => 0,
            CaptureMode::Photo => 1,
            CaptureMode::Video => 2,
        }
    }
}

/// Asynchronous notification from the running graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// The stream ended
    EndOfStream,
    /// The engine reported a fault
    Error {
        source: String,
        message: String,
        debug: Option<String>,
    },
    /// Non-fatal engine warning
    Warning { source: String, message: String },
    /// The capture element finished writing a still image
    CaptureFinished { filename: String },
    /// The capture element finalized a recording
    RecordingFinished,
    /// Any other element-specific message
    Element { source: String, name: String },
    /// Any other message kind
    Other(String),
}

/// Filter descriptions (GStreamer bin syntax) for the graph branches
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterChain {
    /// Applied to the preview only
    pub preview: Option<String>,
    /// Applied to photos and recordings
    pub capture: Option<String>,
}

impl FilterChain {
    /// Horizontal flip when mirrored, then the device's extra filters
    ///
    /// Mirroring is a preview convenience; captures keep the real orientation.
    pub fn compute(mirrored: bool, extra_filters: &str) -> Self {
        let extra = extra_filters.trim();
        let extra = (!extra.is_empty()).then(|| extra.to_string());

        let mut preview_parts = Vec::new();
        if mirrored {
            preview_parts.push("videoflip method=horizontal-flip".to_string());
        }
        if let Some(extra) = &extra {
            preview_parts.push(extra.clone());
        }

        Self {
            preview: (!preview_parts.is_empty()).then(|| preview_parts.join(" ! ")),
            capture: extra,
        }
    }
}

/// A constructed, linked media graph
///
/// Writes happen on the owning thread only; the engine's worker threads
/// report back exclusively through the bus queue.
pub trait CaptureGraph {
    /// Point the device source at another node (graph must be halted)
    fn set_device_path(&mut self, path: &str) -> CaptureResult<()>;

    fn set_mode(&mut self, mode: CaptureMode) -> CaptureResult<()>;

    /// Destination file of the next capture
    fn set_location(&mut self, path: &Path) -> CaptureResult<()>;

    fn start_capture(&mut self) -> CaptureResult<()>;

    fn stop_capture(&mut self) -> CaptureResult<()>;

    /// Install `filters`; the graph must be halted
    fn apply_filters(&mut self, filters: &FilterChain) -> CaptureResult<()>;

    /// Transition to playing
    fn play(&mut self) -> CaptureResult<()>;

    /// Transition to the inert (null) state
    fn halt(&mut self) -> CaptureResult<()>;

    /// Receiver of the graph's bus events; available once
    fn take_bus(&mut self) -> Option<EventReceiver<BusEvent>>;
}

/// Factory of capture graphs
pub trait MediaEngine {
    type Graph: CaptureGraph;

    /// Construct and link a graph reading from `device_path`
    ///
    /// Fails with `EngineUnavailable` when a required element is missing.
    /// The returned graph is halted; it starts on [`CaptureGraph::play`].
    fn build(&self, device_path: &str) -> CaptureResult<Self::Graph>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_chain_mirrored_only() {
        let chain = FilterChain::compute(true, "");
        assert_eq!(chain.preview.as_deref(), Some("videoflip method=horizontal-flip"));
        assert_eq!(chain.capture, None);
    }

    #[test]
    fn test_filter_chain_with_extras() {
        let chain = FilterChain::compute(true, " videobalance saturation=0 ");
        assert_eq!(
            chain.preview.as_deref(),
            Some("videoflip method=horizontal-flip ! videobalance saturation=0")
        );
        assert_eq!(chain.capture.as_deref(), Some("videobalance saturation=0"));

        let plain = FilterChain::compute(false, "");
        assert_eq!(plain, FilterChain::default());
    }

    #[test]
    fn test_mode_indices() {
        assert_eq!(CaptureMode::Preview.index(), 0);
        assert_eq!(CaptureMode::Photo.index(), 1);
        assert_eq!(CaptureMode::Video.index(), 2);
    }
}
