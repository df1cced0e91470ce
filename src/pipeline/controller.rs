// SPDX-License-Identifier: GPL-3.0-only

//! Capture pipeline controller
//!
//! Owns the single live graph, binds it to the playing device, sequences the
//! mode / location / trigger writes of photo and video captures, and recovers
//! from bus faults. Everything here runs on the owning thread; the engine's
//! threads only ever talk back through the bus queue drained by
//! [`CaptureController::dispatch_bus_events`].

use super::{BusEvent, CaptureGraph, CaptureMode, FilterChain, MediaEngine};
use crate::constants::{MAX_ERROR_RESTARTS, notifications};
use crate::devices::{CameraDevice, DeviceEvent};
use crate::errors::{CaptureError, CaptureResult};
use crate::events::{EventEmitter, EventReceiver, SyncOnce};
use crate::file_manager::FileOperations;
use crate::location::Location;
use crate::notifications::Notifier;
use crate::storage;
use chrono::Local;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Observable controller state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerState {
    /// No graph
    Stopped,
    /// Graph built for the device, waiting for the UI sync to start playing
    Bound(String),
    Previewing(String),
    /// At least one still capture has not reported back yet
    CapturingPhoto(String),
    CapturingVideo(String),
}

/// Controller notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// An announced photo was written; carries the requested destination
    PhotoTaken(String),
    MirroredChanged(bool),
    /// A stopped recording's file is complete (or its graph is gone) and can
    /// be moved into place
    RecordingFinished(PathBuf),
    /// The graph was released after a fault
    StreamLost(CaptureError),
}

/// A still capture in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Where the photo should end up
    pub destination: Location,
    /// Where the graph actually writes it
    pub local_path: PathBuf,
    /// Whether completion is announced to the user
    pub announce: bool,
}

impl CaptureRequest {
    pub fn new(destination: &Location, announce: bool) -> Self {
        let local_path = destination
            .as_local()
            .map(Path::to_path_buf)
            .unwrap_or_else(storage::temp_photo_path);

        Self {
            destination: destination.clone(),
            local_path,
            announce,
        }
    }

    /// The photo is written to a temporary file and copied out afterwards
    pub fn needs_copy(&self) -> bool {
        !self.destination.is_local()
    }
}

/// Drives one capture graph on behalf of the session
pub struct CaptureController<E: MediaEngine> {
    engine: E,
    graph: Option<E::Graph>,
    bus: Option<EventReceiver<BusEvent>>,
    /// Device the graph is (or was last) bound to
    current_device: Option<CameraDevice>,
    playing: bool,
    mode: CaptureMode,
    mirrored: bool,
    extra_filters: String,
    start_on_sync: SyncOnce,
    pending: VecDeque<CaptureRequest>,
    tmp_video_path: Option<PathBuf>,
    /// The current graph is writing `tmp_video_path`
    recording_live: bool,
    /// Stopped recordings the graph has not finalized yet
    finishing: VecDeque<PathBuf>,
    /// A filter change is waiting for the running captures to finish
    filters_dirty: bool,
    restarts_left: u32,
    files: Arc<dyn FileOperations>,
    notifier: Box<dyn Notifier>,
    events: EventEmitter<ControllerEvent>,
}

impl<E: MediaEngine> CaptureController<E> {
    pub fn new(engine: E, files: Arc<dyn FileOperations>, notifier: Box<dyn Notifier>) -> Self {
        Self {
            engine,
            graph: None,
            bus: None,
            current_device: None,
            playing: false,
            mode: CaptureMode::Preview,
            mirrored: false,
            extra_filters: String::new(),
            start_on_sync: SyncOnce::default(),
            pending: VecDeque::new(),
            tmp_video_path: None,
            recording_live: false,
            finishing: VecDeque::new(),
            filters_dirty: false,
            restarts_left: MAX_ERROR_RESTARTS,
            files,
            notifier,
            events: EventEmitter::new(),
        }
    }

    pub fn subscribe(&mut self) -> EventReceiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> ControllerState {
        let Some(device) = self.current_device.as_ref().filter(|_| self.graph.is_some()) else {
            return ControllerState::Stopped;
        };
        let udi = device.udi.clone();

        if !self.playing {
            ControllerState::Bound(udi)
        } else if self.mode == CaptureMode::Video && self.tmp_video_path.is_some() {
            ControllerState::CapturingVideo(udi)
        } else if !self.pending.is_empty() {
            ControllerState::CapturingPhoto(udi)
        } else {
            ControllerState::Previewing(udi)
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn mirrored(&self) -> bool {
        self.mirrored
    }

    pub fn has_graph(&self) -> bool {
        self.graph.is_some()
    }

    pub fn restarts_left(&self) -> u32 {
        self.restarts_left
    }

    pub fn current_device(&self) -> Option<&CameraDevice> {
        self.current_device.as_ref()
    }

    /// Captures whose finished message has not arrived yet
    pub fn pending_captures(&self) -> impl Iterator<Item = &CaptureRequest> {
        self.pending.iter()
    }

    /// Stopped recordings still being finalized by the graph
    pub fn finishing_recordings(&self) -> impl Iterator<Item = &PathBuf> {
        self.finishing.iter()
    }

    /// Whether the graph is writing a photo or a recording
    ///
    /// Filter changes need a halted graph, so they wait while this holds.
    pub fn capturing(&self) -> bool {
        self.recording_live || !self.pending.is_empty() || !self.finishing.is_empty()
    }

    /// Show `device`
    ///
    /// Reuses the graph when it is already bound to the same device, rebinds
    /// the device source in place for another device, and builds a graph
    /// otherwise. Playback starts at the next [`CaptureController::on_ui_sync`].
    /// Refills the automatic restart budget.
    pub fn play_device(&mut self, device: &CameraDevice) -> CaptureResult<()> {
        self.restarts_left = MAX_ERROR_RESTARTS;
        self.bind(device)
    }

    /// Play `device` if there is one; nothing to show is not an error
    pub fn play(&mut self, device: Option<&CameraDevice>) -> CaptureResult<()> {
        match device {
            Some(device) => self.play_device(device),
            None => {
                debug!("No device to play");
                Ok(())
            }
        }
    }

    /// Halt and release the graph
    pub fn stop(&mut self) {
        if self.graph.is_some() {
            info!("Stopping capture pipeline");
        }
        self.release();
        self.current_device = None;
    }

    fn bind(&mut self, device: &CameraDevice) -> CaptureResult<()> {
        let same_device = self
            .current_device
            .as_ref()
            .is_some_and(|current| current.udi == device.udi);

        if let Some(graph) = self.graph.as_mut()
            && same_device
        {
            debug!(udi = %device.udi, "Device already bound, back to preview");
            graph.set_mode(CaptureMode::Preview)?;
            self.mode = CaptureMode::Preview;
            self.current_device = Some(device.clone());
            return self.set_extra_filters(&device.filters);
        }

        match self.graph.as_mut() {
            Some(graph) => {
                info!(udi = %device.udi, path = %device.path, "Rebinding graph to another device");
                graph.halt()?;
                self.playing = false;
                graph.set_device_path(&device.path)?;
                self.abandon_captures();
            }
            None => {
                let mut graph = self.engine.build(&device.path).inspect_err(|e| {
                    error!(udi = %device.udi, error = %e, "Failed to build capture graph");
                })?;
                self.bus = graph.take_bus();
                self.graph = Some(graph);
                info!(udi = %device.udi, path = %device.path, "Capture graph built");
            }
        }

        self.current_device = Some(device.clone());
        self.extra_filters = device.filters.clone();
        self.mode = CaptureMode::Preview;

        // Fresh or halted graph: filters can go in directly
        self.filters_dirty = false;
        let filters = self.filter_chain();
        if let Some(graph) = self.graph.as_mut() {
            graph.set_mode(CaptureMode::Preview)?;
            graph.apply_filters(&filters)?;
        }

        self.start_on_sync.arm();
        Ok(())
    }

    /// UI synchronization point: start a freshly bound graph exactly once
    pub fn on_ui_sync(&mut self) {
        if !self.start_on_sync.fire() {
            return;
        }
        let Some(graph) = self.graph.as_mut() else {
            return;
        };

        match graph.play() {
            Ok(()) => {
                debug!("Capture graph playing");
                self.playing = true;
            }
            Err(e) => {
                error!(error = %e, "Failed to start capture graph");
                self.release();
                self.events.emit(ControllerEvent::StreamLost(e));
            }
        }
    }

    /// Whether the next UI sync will start the graph
    pub fn awaiting_ui_sync(&self) -> bool {
        self.start_on_sync.is_armed()
    }

    /// React to the device registry
    pub fn handle_device_event(&mut self, event: &DeviceEvent) {
        match event {
            DeviceEvent::PlayingDeviceChanged(device) => {
                if let Err(e) = self.play_device(device) {
                    warn!(udi = %device.udi, error = %e, "Cannot play device");
                }
            }
            DeviceEvent::NoDevices => self.stop(),
            DeviceEvent::FiltersChanged { udi, filters } => {
                let is_current = self
                    .current_device
                    .as_ref()
                    .is_some_and(|device| &device.udi == udi);
                if is_current
                    && let Err(e) = self.set_extra_filters(filters)
                {
                    warn!(udi, error = %e, "Cannot apply device filters");
                }
            }
        }
    }

    /// Handle everything the graph queued so far
    ///
    /// Stops early when a message released the graph: what was still queued
    /// belongs to the old graph.
    pub fn dispatch_bus_events(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let Some(bus) = self.bus.as_mut() else {
                break;
            };
            let Ok(Some(event)) = bus.try_next() else {
                break;
            };
            handled += 1;

            let had_graph = self.graph.is_some();
            self.on_bus_message(event);
            if had_graph && self.graph.is_none() {
                break;
            }
        }
        handled
    }

    pub fn on_bus_message(&mut self, event: BusEvent) {
        match event {
            BusEvent::EndOfStream => {
                warn!("Capture stream ended");
                self.release();
                self.events
                    .emit(ControllerEvent::StreamLost(CaptureError::EndOfStream));
            }
            BusEvent::Error {
                source,
                message,
                debug,
            } => {
                error!(%source, %message, debug = ?debug, "Capture pipeline error");
                self.release();
                self.events.emit(ControllerEvent::StreamLost(CaptureError::StreamError(
                    message,
                )));
                self.restart_after_error();
            }
            BusEvent::Warning { source, message } => {
                warn!(%source, %message, "Capture pipeline warning");
            }
            BusEvent::CaptureFinished { filename } => self.capture_finished(&filename),
            BusEvent::RecordingFinished => self.recording_finished(),
            BusEvent::Element { source, name } => debug!(%source, %name, "Element message"),
            BusEvent::Other(kind) => debug!(%kind, "Ignoring bus message"),
        }
    }

    fn restart_after_error(&mut self) {
        let Some(device) = self.current_device.clone() else {
            return;
        };
        if self.restarts_left == 0 {
            warn!(udi = %device.udi, "Restart budget exhausted, leaving pipeline stopped");
            return;
        }

        self.restarts_left -= 1;
        info!(udi = %device.udi, restarts_left = self.restarts_left, "Restarting capture pipeline");
        if let Err(e) = self.bind(&device) {
            error!(udi = %device.udi, error = %e, "Restart failed");
        }
    }

    fn capture_finished(&mut self, filename: &str) {
        let position = self
            .pending
            .iter()
            .position(|request| request.local_path == Path::new(filename));
        let request = match position {
            Some(index) => self.pending.remove(index),
            None => self.pending.pop_front(),
        };
        let Some(request) = request else {
            debug!(filename, "Capture finished without a pending request");
            return;
        };

        debug!(filename, destination = %request.destination, "Photo written");
        if request.needs_copy() {
            self.files
                .copy_file(&Location::local(&request.local_path), &request.destination);
        }
        if request.announce {
            self.events.emit(ControllerEvent::PhotoTaken(
                request.destination.display_string(),
            ));
        }
        self.apply_deferred_filters();
    }

    fn recording_finished(&mut self) {
        let Some(path) = self.finishing.pop_front() else {
            debug!("Recording finalized without a stopped recording");
            return;
        };

        info!(path = %path.display(), "Recording finalized");
        self.events.emit(ControllerEvent::RecordingFinished(path));
        self.apply_deferred_filters();
    }

    /// Capture a still image to `destination`
    ///
    /// Returns once the capture is triggered; the file exists when the
    /// matching capture-finished message arrives. Remote destinations get a
    /// local temporary file that is copied out at that point.
    pub fn take_photo(&mut self, destination: &Location, announce: bool) -> CaptureResult<()> {
        let Some(graph) = self.graph.as_mut() else {
            warn!(destination = %destination, "Photo requested without an active pipeline");
            return Err(CaptureError::NoActivePipeline);
        };

        let request = CaptureRequest::new(destination, announce);
        let triggered = trigger_photo(graph, &request.local_path);

        // Back to preview regardless of how the trigger went
        let restored = graph.set_mode(CaptureMode::Preview);
        self.mode = CaptureMode::Preview;
        triggered?;
        restored?;

        info!(destination = %destination, announce, "Photo capture started");
        if announce {
            let title = crate::fl!("photo-taken");
            let body = crate::fl!("saved-in", location = destination.display_string());
            self.notifier
                .notify(notifications::PHOTO_TAKEN, &title, &body);
        }
        self.pending.push_back(request);
        Ok(())
    }

    /// Start recording to a timestamped temporary file; returns its path
    pub fn start_recording(&mut self) -> CaptureResult<PathBuf> {
        let Some(graph) = self.graph.as_mut() else {
            warn!("Recording requested without an active pipeline");
            return Err(CaptureError::NoActivePipeline);
        };
        if self.tmp_video_path.is_some() {
            return Err(CaptureError::InvalidState("already recording".to_string()));
        }

        let path = storage::temp_recording_path(Local::now());
        graph.set_mode(CaptureMode::Video)?;
        self.mode = CaptureMode::Video;
        graph.set_location(&path)?;
        graph.start_capture()?;

        info!(path = %path.display(), "Recording started");
        self.tmp_video_path = Some(path.clone());
        self.recording_live = true;
        Ok(path)
    }

    /// Stop recording; returns the temporary file that was written
    ///
    /// The file is complete once [`ControllerEvent::RecordingFinished`]
    /// carries the same path; moving it into place is up to the caller.
    pub fn stop_recording(&mut self) -> CaptureResult<PathBuf> {
        let path = self
            .tmp_video_path
            .take()
            .ok_or_else(|| CaptureError::InvalidState("not recording".to_string()))?;
        let live = std::mem::take(&mut self.recording_live);

        match self.graph.as_mut() {
            Some(graph) if live => {
                graph.stop_capture()?;
                self.finishing.push_back(path.clone());
            }
            _ => {
                warn!(path = %path.display(), "Pipeline gone before recording stopped");
                self.events
                    .emit(ControllerEvent::RecordingFinished(path.clone()));
            }
        }

        info!(path = %path.display(), "Recording stopped");
        Ok(path)
    }

    pub fn set_mirrored(&mut self, mirrored: bool) {
        if self.mirrored == mirrored {
            return;
        }
        self.mirrored = mirrored;
        if let Err(e) = self.apply_filters() {
            warn!(error = %e, "Failed to apply filters");
        }
        self.events.emit(ControllerEvent::MirroredChanged(mirrored));
    }

    /// Replace the extra filters of the bound device
    pub fn set_extra_filters(&mut self, filters: &str) -> CaptureResult<()> {
        if self.extra_filters == filters {
            return Ok(());
        }
        self.extra_filters = filters.to_string();
        if let Some(device) = self.current_device.as_mut() {
            device.filters = filters.to_string();
        }

        self.apply_filters()
    }

    fn filter_chain(&self) -> FilterChain {
        FilterChain::compute(self.mirrored, &self.extra_filters)
    }

    /// Push the current filter chain into the graph
    ///
    /// A playing graph is halted for the change and restarts at the next UI
    /// sync. While a capture runs the change is only recorded and applied once
    /// the last capture finishes.
    fn apply_filters(&mut self) -> CaptureResult<()> {
        if self.graph.is_none() {
            return Ok(());
        }
        if self.capturing() {
            debug!("Capture in progress, deferring filter change");
            self.filters_dirty = true;
            return Ok(());
        }

        self.filters_dirty = false;
        let chain = self.filter_chain();
        let was_playing = self.playing;
        let Some(graph) = self.graph.as_mut() else {
            return Ok(());
        };

        if was_playing {
            graph.halt()?;
            self.playing = false;
            self.start_on_sync.arm();
        }
        graph.apply_filters(&chain)
    }

    fn apply_deferred_filters(&mut self) {
        if self.filters_dirty
            && !self.capturing()
            && let Err(e) = self.apply_filters()
        {
            warn!(error = %e, "Failed to apply deferred filters");
        }
    }

    /// Forget captures the current graph will never report back on
    fn abandon_captures(&mut self) {
        self.pending.clear();
        self.recording_live = false;
        while let Some(path) = self.finishing.pop_front() {
            debug!(path = %path.display(), "Recording ended with its graph");
            self.events.emit(ControllerEvent::RecordingFinished(path));
        }
    }

    /// Quiesce and drop the graph
    fn release(&mut self) {
        if let Some(mut graph) = self.graph.take()
            && let Err(e) = graph.halt()
        {
            warn!(error = %e, "Failed to halt graph before release");
        }
        self.bus = None;
        self.playing = false;
        self.mode = CaptureMode::Preview;
        self.start_on_sync.disarm();
        self.filters_dirty = false;
        self.abandon_captures();
    }
}

fn trigger_photo<G: CaptureGraph>(graph: &mut G, path: &Path) -> CaptureResult<()> {
    graph.set_mode(CaptureMode::Photo)?;
    graph.set_location(path)?;
    graph.start_capture()
}
