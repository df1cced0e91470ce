// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer camerabin implementation of the capture graph
//!
//! camerabin already provides the preview / image / video branches and the
//! `mode`, `location`, `start-capture` and `stop-capture` controls; this
//! module assembles the viewfinder branch, pins recordings to a Matroska
//! encoding profile, binds the display sink to the UI surface and forwards
//! bus messages into the controller's event queue.

use super::{BusEvent, CaptureGraph, CaptureMode, FilterChain, MediaEngine};
use crate::constants::{PREVIEW_FORMAT, PREVIEW_FRAMERATE, elements, recording};
use crate::errors::{CaptureError, CaptureResult};
use crate::events::EventReceiver;
use futures::channel::mpsc;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_pbutils as gst_pbutils;
use gstreamer_pbutils::encoding_profile::EncodingProfileBuilder;
use gstreamer_video as gst_video;
use gstreamer_video::prelude::*;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Builds camerabin graphs
#[derive(Debug, Clone)]
pub struct CameraBinEngine {
    /// Factory name of the display sink
    display_sink: String,
    /// Native window the display sink renders into, if the UI provides one
    window_handle: Option<usize>,
}

impl CameraBinEngine {
    pub fn new(display_sink: impl Into<String>) -> Self {
        Self {
            display_sink: display_sink.into(),
            window_handle: None,
        }
    }

    /// Render into the UI's designated surface instead of a sink-owned window
    pub fn with_window_handle(mut self, handle: usize) -> Self {
        self.window_handle = Some(handle);
        self
    }

    fn make(factory: &str, name: Option<&str>) -> CaptureResult<gst::Element> {
        let mut builder = gst::ElementFactory::make(factory);
        if let Some(name) = name {
            builder = builder.name(name);
        }
        builder.build().map_err(|e| {
            CaptureError::EngineUnavailable(format!(
                "Failed to create {}: {}; please make sure all required GStreamer plugins are installed",
                factory, e
            ))
        })
    }

    /// convert ▶ caps(RGBA, 30/1) ▶ [glupload] ▶ sink, wrapped in a bin
    fn build_viewfinder(&self) -> CaptureResult<gst::Bin> {
        let bin = gst::Bin::builder().name("viewfinder").build();

        let videoconvert = Self::make("videoconvert", None)?;
        let caps = gst::Caps::builder("video/x-raw")
            .field("format", PREVIEW_FORMAT)
            .field("framerate", gst::Fraction::new(PREVIEW_FRAMERATE, 1))
            .build();
        let capsfilter = gst::ElementFactory::make("capsfilter")
            .property("caps", &caps)
            .build()
            .map_err(|e| CaptureError::EngineUnavailable(format!("Failed to create capsfilter: {}", e)))?;
        let sink = Self::make(&self.display_sink, Some("display_sink"))?;

        let mut chain = vec![videoconvert.clone(), capsfilter];
        if needs_gl_upload(&self.display_sink) {
            chain.push(Self::make(elements::GL_UPLOAD, None)?);
        }
        chain.push(sink);

        bin.add_many(&chain)?;
        gst::Element::link_many(&chain)?;

        let pad = videoconvert
            .static_pad("sink")
            .ok_or_else(|| CaptureError::EngineUnavailable("videoconvert has no sink pad".into()))?;
        let ghost = gst::GhostPad::with_target(&pad)?;
        ghost.set_active(true)?;
        bin.add_pad(&ghost)?;

        Ok(bin)
    }
}

/// Matroska container with VP8 video and optional Vorbis audio
///
/// camerabin's built-in default muxes Ogg; recordings are named `.mkv`.
fn video_profile() -> gst_pbutils::EncodingContainerProfile {
    let video = gst_pbutils::EncodingVideoProfile::builder(
        &gst::Caps::builder(recording::VIDEO_CAPS).build(),
    )
    .preset("Profile Realtime")
    .variable_framerate(true)
    .build();

    // presence 0: the stream is optional, so a silent source still records
    let audio = gst_pbutils::EncodingAudioProfile::builder(
        &gst::Caps::builder(recording::AUDIO_CAPS).build(),
    )
    .presence(0)
    .build();

    gst_pbutils::EncodingContainerProfile::builder(
        &gst::Caps::builder(recording::CONTAINER_CAPS).build(),
    )
    .name("Matroska audio/video")
    .description("Matroska/VP8/Vorbis")
    .add_profile(video)
    .add_profile(audio)
    .build()
}

impl Default for CameraBinEngine {
    fn default() -> Self {
        Self::new(elements::DEFAULT_DISPLAY_SINK)
    }
}

impl MediaEngine for CameraBinEngine {
    type Graph = CameraBinGraph;

    fn build(&self, device_path: &str) -> CaptureResult<CameraBinGraph> {
        info!(device = %device_path, sink = %self.display_sink, "Building camerabin graph");

        gst::init()?;

        let camera_source = Self::make(elements::CAMERA_SOURCE, Some("camera_source"))?;
        let device_source = Self::make(elements::DEVICE_SOURCE, Some("device_source"))?;
        device_source.set_property("device", device_path);
        camera_source.set_property("video-source", &device_source);

        let pipeline = Self::make("camerabin", Some(elements::CAMERABIN))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| CaptureError::EngineUnavailable("camerabin is not a pipeline".into()))?;
        pipeline.set_property("camera-source", &camera_source);
        pipeline.set_property("video-profile", video_profile());

        let viewfinder = self.build_viewfinder()?;
        pipeline.set_property("viewfinder-sink", viewfinder.upcast_ref::<gst::Element>());

        let bus = pipeline
            .bus()
            .ok_or_else(|| CaptureError::EngineUnavailable("camerabin has no bus".into()))?;
        let (sender, receiver) = mpsc::unbounded();
        let sender = Mutex::new(sender);
        let window_handle = self.window_handle;

        // Runs on engine threads: bind the surface, queue everything else
        bus.set_sync_handler(move |_, msg| {
            if gst_video::is_video_overlay_prepare_window_handle_message(msg) {
                if let Some(handle) = window_handle
                    && let Some(overlay) = msg
                        .src()
                        .and_then(|src| src.clone().dynamic_cast::<gst_video::VideoOverlay>().ok())
                {
                    // SAFETY: the handle belongs to the UI surface, which outlives the graph
                    unsafe { overlay.set_window_handle(handle) };
                }
                return gst::BusSyncReply::Drop;
            }

            if let Ok(sender) = sender.lock() {
                let _ = sender.unbounded_send(bus_event(msg));
            }
            gst::BusSyncReply::Drop
        });

        debug!("camerabin graph linked");
        Ok(CameraBinGraph {
            pipeline,
            device_source,
            bus_events: Some(receiver),
        })
    }
}

/// GL sinks need frames uploaded to GL memory first
pub fn needs_gl_upload(sink_factory: &str) -> bool {
    sink_factory.starts_with("gl") || sink_factory.starts_with("qmlgl") || sink_factory == "gtkglsink"
}

/// camerabin's `mode` enum nick
fn mode_nick(mode: CaptureMode) -> &'static str {
    match mode {
        CaptureMode::Photo => "mode-image",
        CaptureMode::Preview | CaptureMode::Video => "mode-video",
    }
}

fn bus_event(msg: &gst::Message) -> BusEvent {
    use gst::MessageView;

    let source = msg
        .src()
        .map(|src| src.name().to_string())
        .unwrap_or_default();

    match msg.view() {
        MessageView::Eos(_) => BusEvent::EndOfStream,
        MessageView::Error(err) => BusEvent::Error {
            source,
            message: err.error().to_string(),
            debug: err.debug().map(|d| d.to_string()),
        },
        MessageView::Warning(warning) => BusEvent::Warning {
            source,
            message: warning.error().to_string(),
        },
        MessageView::Element(element) => {
            let Some(structure) = element.structure() else {
                return BusEvent::Element {
                    source,
                    name: String::new(),
                };
            };

            if source == elements::CAMERABIN {
                if structure.has_name("image-done")
                    && let Ok(filename) = structure.get::<&str>("filename")
                {
                    return BusEvent::CaptureFinished {
                        filename: filename.to_string(),
                    };
                }
                if structure.has_name("video-done") {
                    return BusEvent::RecordingFinished;
                }
            }

            BusEvent::Element {
                source,
                name: structure.name().to_string(),
            }
        }
        _ => BusEvent::Other(format!("{:?}", msg.type_())),
    }
}

/// A live camerabin graph
///
/// Dropping it transitions the pipeline to NULL first.
#[derive(Debug)]
pub struct CameraBinGraph {
    pipeline: gst::Pipeline,
    device_source: gst::Element,
    bus_events: Option<EventReceiver<BusEvent>>,
}

impl CameraBinGraph {
    fn filter_element(description: Option<&str>) -> CaptureResult<Option<gst::Element>> {
        description
            .map(|desc| {
                gst::parse::bin_from_description(desc, true)
                    .map(|bin| bin.upcast::<gst::Element>())
                    .map_err(|e| CaptureError::StreamError(format!("Invalid filter '{}': {}", desc, e)))
            })
            .transpose()
    }

    /// Current (or pending) state
    pub fn state(&self) -> gst::State {
        let (_result, current, pending) = self.pipeline.state(gst::ClockTime::ZERO);
        if pending == gst::State::VoidPending { current } else { pending }
    }
}

impl CaptureGraph for CameraBinGraph {
    fn set_device_path(&mut self, path: &str) -> CaptureResult<()> {
        debug!(device = %path, "Rebinding device source");
        self.device_source.set_property("device", path);
        Ok(())
    }

    fn set_mode(&mut self, mode: CaptureMode) -> CaptureResult<()> {
        self.pipeline.set_property_from_str("mode", mode_nick(mode));
        Ok(())
    }

    fn set_location(&mut self, path: &Path) -> CaptureResult<()> {
        self.pipeline
            .set_property("location", path.display().to_string());
        Ok(())
    }

    fn start_capture(&mut self) -> CaptureResult<()> {
        self.pipeline.emit_by_name::<()>("start-capture", &[]);
        Ok(())
    }

    fn stop_capture(&mut self) -> CaptureResult<()> {
        self.pipeline.emit_by_name::<()>("stop-capture", &[]);
        Ok(())
    }

    fn apply_filters(&mut self, filters: &FilterChain) -> CaptureResult<()> {
        // camerabin only accepts filter changes in NULL
        if matches!(self.state(), gst::State::Playing | gst::State::Paused) {
            return Err(CaptureError::InvalidState(
                "filters can only change while the graph is halted".to_string(),
            ));
        }

        let viewfinder = Self::filter_element(filters.preview.as_deref())?;
        let image = Self::filter_element(filters.capture.as_deref())?;
        let video = Self::filter_element(filters.capture.as_deref())?;

        self.pipeline.set_property("viewfinder-filter", viewfinder);
        self.pipeline.set_property("image-filter", image);
        self.pipeline.set_property("video-filter", video);
        debug!(preview = ?filters.preview, capture = ?filters.capture, "Applied filters");
        Ok(())
    }

    fn play(&mut self) -> CaptureResult<()> {
        self.pipeline
            .set_state(gst::State::Playing)
            .map(|_| ())
            .map_err(|e| CaptureError::StreamError(format!("Failed to start pipeline: {}", e)))
    }

    fn halt(&mut self) -> CaptureResult<()> {
        self.pipeline
            .set_state(gst::State::Null)
            .map(|_| ())
            .map_err(|e| CaptureError::StreamError(format!("Failed to stop pipeline: {}", e)))
    }

    fn take_bus(&mut self) -> Option<EventReceiver<BusEvent>> {
        self.bus_events.take()
    }
}

impl Drop for CameraBinGraph {
    fn drop(&mut self) {
        debug!("Dropping camerabin graph");
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            error!(?e, "Failed to set pipeline to Null on drop");
        }
        if let Some(bus) = self.pipeline.bus() {
            bus.unset_sync_handler();
        } else {
            warn!("camerabin lost its bus before teardown");
        }
    }
}
