// SPDX-License-Identifier: GPL-3.0-only

//! Session facade
//!
//! The user-level operations a UI shell binds to: take a photo, toggle
//! recording, show the elapsed recording time, trash files. It owns the
//! capture controller, the device registry and the settings, and routes the
//! events between them on the owning thread in [`Session::process_events`].

use crate::config::Config;
use crate::constants::files;
use crate::devices::{DeviceEvent, DeviceManager};
use crate::errors::AppResult;
use crate::events::{EventEmitter, EventReceiver, drain};
use crate::file_manager::FileOperations;
use crate::location::Location;
use crate::notifications::Notifier;
use crate::pipeline::{CaptureController, ControllerEvent, MediaEngine};
use crate::storage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Notifications for the UI shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// An announced photo is on disk; carries its display string
    PhotoTaken(String),
    MirroredChanged(bool),
    /// The image to show as the latest thumbnail changed
    SampleImageChanged(PathBuf),
    RecordingChanged(bool),
    /// Periodic while recording
    RecordingTimeChanged(String),
}

/// Elapsed-time bookkeeping of the current recording
///
/// `active` is authoritative; the clock only keeps the time.
#[derive(Debug, Default)]
struct RecordingClock {
    started: Option<Instant>,
    frozen: Duration,
    active: bool,
}

impl RecordingClock {
    fn start(&mut self) {
        self.started = Some(Instant::now());
        self.frozen = Duration::ZERO;
        self.active = true;
    }

    fn stop(&mut self) {
        self.frozen = self.elapsed();
        self.active = false;
    }

    fn elapsed(&self) -> Duration {
        match self.started {
            Some(started) if self.active => started.elapsed(),
            _ => self.frozen,
        }
    }
}

/// `H:MM:SS`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

pub struct Session<E: MediaEngine> {
    controller: CaptureController<E>,
    devices: DeviceManager,
    device_events: EventReceiver<DeviceEvent>,
    controller_events: EventReceiver<ControllerEvent>,
    config: Config,
    files: Arc<dyn FileOperations>,
    clock: RecordingClock,
    /// Stopped recordings waiting to be finalized, with their destinations
    pending_moves: Vec<(PathBuf, Location)>,
    sample_image: Option<PathBuf>,
    events: EventEmitter<SessionEvent>,
}

impl<E: MediaEngine> Session<E> {
    pub fn new(
        engine: E,
        config: Config,
        files: Arc<dyn FileOperations>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        let mut controller = CaptureController::new(engine, files.clone(), notifier);
        controller.set_mirrored(config.mirror_preview);
        let controller_events = controller.subscribe();

        let mut devices = DeviceManager::new();
        devices.restore(&config);
        let device_events = devices.subscribe();

        Self {
            controller,
            devices,
            device_events,
            controller_events,
            config,
            files,
            clock: RecordingClock::default(),
            pending_moves: Vec::new(),
            sample_image: None,
            events: EventEmitter::new(),
        }
    }

    pub fn subscribe(&mut self) -> EventReceiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn controller(&self) -> &CaptureController<E> {
        &self.controller
    }

    pub fn devices(&self) -> &DeviceManager {
        &self.devices
    }

    /// Device registry; changes take effect on the next [`Session::process_events`]
    pub fn devices_mut(&mut self) -> &mut DeviceManager {
        &mut self.devices
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Route pending device, bus and controller events
    pub fn process_events(&mut self) {
        for event in drain(&mut self.device_events) {
            debug!(?event, "Device event");
            self.controller.handle_device_event(&event);
        }

        self.controller.dispatch_bus_events();
        self.route_controller_events();
    }

    fn route_controller_events(&mut self) {
        for event in drain(&mut self.controller_events) {
            match event {
                ControllerEvent::PhotoTaken(path) => {
                    self.events.emit(SessionEvent::PhotoTaken(path))
                }
                ControllerEvent::MirroredChanged(mirrored) => {
                    self.events.emit(SessionEvent::MirroredChanged(mirrored))
                }
                ControllerEvent::RecordingFinished(tmp) => self.save_recording(&tmp),
                ControllerEvent::StreamLost(e) => debug!(error = %e, "Stream lost"),
            }
        }
    }

    /// Move a finalized recording to the destination chosen when it stopped
    fn save_recording(&mut self, tmp: &Path) {
        let Some(index) = self.pending_moves.iter().position(|(path, _)| path == tmp) else {
            debug!(path = %tmp.display(), "Finalized recording has no destination");
            return;
        };

        let (tmp, destination) = self.pending_moves.remove(index);
        info!(from = %tmp.display(), to = %destination, "Saving recording");
        self.files.move_file(&Location::local(tmp), &destination);
    }

    /// Whether a stopped recording is still waiting to be moved into place
    pub fn has_pending_recordings(&self) -> bool {
        !self.pending_moves.is_empty()
    }

    /// The UI's synchronization point
    pub fn on_ui_sync(&mut self) {
        self.controller.on_ui_sync();
    }

    /// Periodic tick; reports the recording time while recording
    pub fn tick(&mut self) -> bool {
        if !self.clock.active {
            return false;
        }
        let time = self.recording_time();
        self.events.emit(SessionEvent::RecordingTimeChanged(time));
        true
    }

    pub fn suggest_file_name(&self, base: &Location, base_name: &str, extension: &str) -> Location {
        storage::suggest_file_name(base, base_name, extension)
    }

    /// Photograph into the configured photo directory
    ///
    /// Returns the display string of the destination; the file appears once
    /// the capture finishes.
    pub fn take_photo(&mut self) -> String {
        let save_url = self.config.save_url.clone();
        if let Some(dir) = save_url.as_local() {
            debug!(dir = %dir.display(), "Creating photo directory");
            if let Err(e) = std::fs::create_dir_all(dir) {
                warn!(dir = %dir.display(), error = %e, "Failed to create photo directory");
            }
        }

        let destination =
            self.suggest_file_name(&save_url, files::PHOTO_BASE_NAME, files::PHOTO_EXTENSION);
        if let Err(e) = self.controller.take_photo(&destination, true) {
            warn!(destination = %destination, error = %e, "Photo not taken");
        }

        if let Some(path) = destination.as_local() {
            self.sample_image = Some(path.to_path_buf());
            self.events
                .emit(SessionEvent::SampleImageChanged(path.to_path_buf()));
        }

        destination.display_string()
    }

    pub fn is_recording(&self) -> bool {
        self.clock.active
    }

    /// Start or stop recording; a no-op when already in the requested state
    ///
    /// Stopping picks the destination in the configured video directory and
    /// puts the playing device back into preview. The temporary recording is
    /// moved there in the background once the graph has finalized it.
    pub fn set_recording(&mut self, recording: bool) {
        if recording == self.clock.active {
            return;
        }

        if recording {
            if let Err(e) = self.controller.start_recording() {
                warn!(error = %e, "Cannot start recording");
                return;
            }
            self.clock.start();
        } else {
            let destination = self.suggest_file_name(
                &self.config.save_videos,
                files::VIDEO_BASE_NAME,
                files::VIDEO_EXTENSION,
            );
            match self.controller.stop_recording() {
                Ok(tmp) => {
                    debug!(
                        from = %tmp.display(),
                        to = %destination,
                        "Recording stopped, waiting for it to finalize"
                    );
                    self.pending_moves.push((tmp, destination));
                }
                Err(e) => warn!(error = %e, "Cannot stop recording"),
            }

            if let Some(device) = self.devices.playing_device().cloned()
                && let Err(e) = self.controller.play_device(&device)
            {
                warn!(udi = %device.udi, error = %e, "Cannot resume preview");
            }
            self.clock.stop();
        }

        self.events
            .emit(SessionEvent::RecordingChanged(self.clock.active));
    }

    /// Elapsed time of the current (or last) recording
    pub fn recording_time(&self) -> String {
        format_duration(self.clock.elapsed())
    }

    /// Image to show as the latest thumbnail
    ///
    /// The first call of a session captures a silent snapshot into a fresh
    /// temporary file; later calls return the cached path.
    pub fn sample_image(&mut self) -> AppResult<PathBuf> {
        if let Some(path) = &self.sample_image {
            return Ok(path.clone());
        }

        let path = storage::create_sample_image_file()?;
        debug!(path = %path.display(), "Capturing sample image");
        self.sample_image = Some(path.clone());
        if let Err(e) = self.controller.take_photo(&Location::local(&path), false) {
            warn!(error = %e, "Sample image not captured");
        }
        Ok(path)
    }

    pub fn clear_sample_image(&mut self) {
        self.sample_image = None;
    }

    /// Move `urls` to the trash, recording the job for [`Session::undo`]
    pub fn trash_files<S: AsRef<str>>(&self, urls: &[S]) -> AppResult<()> {
        let items: Vec<Location> = urls.iter().map(|url| Location::parse(url.as_ref())).collect();
        self.files.trash(&items)
    }

    pub fn undo(&self) -> AppResult<()> {
        self.files.undo()
    }

    /// Reset the playing device's controls and filters
    pub fn reset_device_settings(&mut self) -> AppResult<usize> {
        let result = self.devices.reset_playing_device();
        // Filters are cleared even when the hardware reset fails
        self.process_events();
        Ok(result?)
    }

    pub fn mirrored(&self) -> bool {
        self.controller.mirrored()
    }

    pub fn set_mirrored(&mut self, mirrored: bool) {
        self.config.mirror_preview = mirrored;
        self.controller.set_mirrored(mirrored);
    }

    /// Write settings (including the device registry's state) to `path`
    pub fn save_config_to(&mut self, path: &Path) -> AppResult<()> {
        self.devices.save(&mut self.config);
        self.config.save_to(path)
    }

    pub fn save_config(&mut self) -> AppResult<()> {
        self.save_config_to(&Config::default_path())
    }

    /// Halt the pipeline
    ///
    /// Recordings that are still finalizing end with the graph and are moved
    /// as they are.
    pub fn shutdown(&mut self) {
        if self.clock.active {
            self.set_recording(false);
        }
        self.controller.stop();
        self.route_controller_events();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::CameraDevice;
    use crate::pipeline::testing::{FakeEngine, FakeFiles, FakeNotifier, FileCall, GraphCall};
    use crate::pipeline::{BusEvent, CaptureMode, ControllerState};

    struct Fixture {
        session: Session<FakeEngine>,
        engine: FakeEngine,
        files: FakeFiles,
        dir: PathBuf,
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    fn fixture() -> Fixture {
        let dir = std::env::temp_dir().join(format!("webcam-session-{}", uuid::Uuid::new_v4()));
        let config = Config {
            save_url: Location::local(dir.join("Pictures")),
            save_videos: Location::local(dir.join("Videos")),
            mirror_preview: false,
            ..Config::default()
        };

        let engine = FakeEngine::new();
        let files = FakeFiles::default();
        let mut session = Session::new(
            engine.clone(),
            config,
            Arc::new(files.clone()),
            Box::new(FakeNotifier::default()),
        );

        session
            .devices_mut()
            .set_devices(vec![CameraDevice::new("cam0", "Camera", "/dev/video0")]);
        session.process_events();
        session.on_ui_sync();
        engine.clear_calls();

        Fixture {
            session,
            engine,
            files,
            dir,
        }
    }

    #[test]
    fn test_playing_device_starts_preview() {
        let f = fixture();
        assert_eq!(
            f.session.controller().state(),
            ControllerState::Previewing("cam0".to_string())
        );
        assert_eq!(f.engine.builds(), 1);
    }

    #[test]
    fn test_start_recording_twice_is_a_no_op() {
        let mut f = fixture();
        let mut rx = f.session.subscribe();

        f.session.set_recording(true);
        f.session.set_recording(true);

        assert!(f.session.is_recording());
        assert_eq!(f.engine.count(&GraphCall::StartCapture), 1);
        assert_eq!(drain(&mut rx), vec![SessionEvent::RecordingChanged(true)]);
    }

    #[test]
    fn test_stop_recording_moves_file_once() {
        let mut f = fixture();
        let mut rx = f.session.subscribe();

        f.session.set_recording(true);
        f.session.set_recording(false);
        f.session.set_recording(false);

        // The muxer still owns the file until it reports back
        f.session.process_events();
        assert!(f.files.calls().is_empty());
        assert!(f.session.has_pending_recordings());

        f.engine.inject(BusEvent::RecordingFinished);
        f.session.process_events();
        f.session.process_events();
        assert!(!f.session.has_pending_recordings());

        let calls = f.files.calls();
        assert_eq!(calls.len(), 1);
        let FileCall::Move(from, to) = &calls[0] else {
            panic!("expected a move, got {:?}", calls[0]);
        };

        let from = from.as_local().unwrap();
        assert!(from.starts_with(std::env::temp_dir()));
        assert!(from.extension().is_some_and(|ext| ext == "mkv"));

        let to = to.as_local().unwrap();
        assert_eq!(to.parent(), Some(f.dir.join("Videos").as_path()));
        let name = to.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("video_"));
        assert!(name.ends_with(".mkv"));

        assert_eq!(
            drain(&mut rx),
            vec![
                SessionEvent::RecordingChanged(true),
                SessionEvent::RecordingChanged(false)
            ]
        );
        // Preview resumes on the playing device without rebuilding
        assert_eq!(f.engine.builds(), 1);
        assert_eq!(f.session.controller().mode(), CaptureMode::Preview);
    }

    #[test]
    fn test_shutdown_moves_unfinished_recording() {
        let mut f = fixture();

        f.session.set_recording(true);
        f.session.shutdown();

        let calls = f.files.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(calls[0], FileCall::Move(_, _)));
        assert!(!f.session.has_pending_recordings());
        assert!(!f.session.is_recording());
    }

    #[test]
    fn test_recording_without_pipeline_stays_off() {
        let mut f = fixture();
        f.session.devices_mut().set_devices(Vec::new());
        f.session.process_events();
        let mut rx = f.session.subscribe();

        f.session.set_recording(true);

        assert!(!f.session.is_recording());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_tick_reports_only_while_recording() {
        let mut f = fixture();
        let mut rx = f.session.subscribe();

        assert!(!f.session.tick());
        f.session.set_recording(true);
        assert!(f.session.tick());

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                SessionEvent::RecordingChanged(true),
                SessionEvent::RecordingTimeChanged("0:00:00".to_string())
            ]
        );
    }

    #[test]
    fn test_take_photo_updates_sample_and_announces() {
        let mut f = fixture();
        let mut rx = f.session.subscribe();

        let shown = f.session.take_photo();

        let pictures = f.dir.join("Pictures");
        assert!(pictures.is_dir());
        let path = PathBuf::from(&shown);
        assert_eq!(path.parent(), Some(pictures.as_path()));
        assert_eq!(f.session.sample_image().unwrap(), path);

        f.engine.inject(BusEvent::CaptureFinished {
            filename: shown.clone(),
        });
        f.session.process_events();

        assert_eq!(
            drain(&mut rx),
            vec![
                SessionEvent::SampleImageChanged(path),
                SessionEvent::PhotoTaken(shown)
            ]
        );
    }

    #[test]
    fn test_sample_image_captures_once() {
        let mut f = fixture();

        let first = f.session.sample_image().unwrap();
        let second = f.session.sample_image().unwrap();

        assert_eq!(first, second);
        assert_eq!(f.engine.count(&GraphCall::StartCapture), 1);
        assert!(first.to_string_lossy().ends_with("-sampleimage.jpg"));
        assert!(f
            .engine
            .calls()
            .contains(&GraphCall::SetLocation(first.clone())));

        f.session.clear_sample_image();
        let third = f.session.sample_image().unwrap();
        assert_ne!(first, third);

        let _ = std::fs::remove_file(first);
        let _ = std::fs::remove_file(third);
    }

    #[test]
    fn test_trash_parses_urls() {
        let f = fixture();

        f.session
            .trash_files(&["file:///tmp/a%20b.jpg", "/tmp/c.jpg"])
            .unwrap();
        f.session.undo().unwrap();

        assert_eq!(
            f.files.calls(),
            vec![
                FileCall::Trash(vec![
                    Location::local("/tmp/a b.jpg"),
                    Location::local("/tmp/c.jpg")
                ]),
                FileCall::Undo
            ]
        );
    }

    #[test]
    fn test_mirroring_is_forwarded_and_persisted() {
        let mut f = fixture();
        let mut rx = f.session.subscribe();

        f.session.set_mirrored(true);
        f.session.set_mirrored(true);
        f.session.process_events();

        assert!(f.session.mirrored());
        assert!(f.session.config().mirror_preview);
        assert_eq!(drain(&mut rx), vec![SessionEvent::MirroredChanged(true)]);
    }

    #[test]
    fn test_stream_loss_releases_then_replay_rebuilds() {
        let mut f = fixture();

        f.engine.inject(BusEvent::EndOfStream);
        f.session.process_events();
        assert_eq!(f.session.controller().state(), ControllerState::Stopped);

        f.session
            .devices_mut()
            .set_devices(vec![CameraDevice::new("cam1", "Other", "/dev/video2")]);
        f.session.process_events();
        assert_eq!(f.engine.builds(), 2);
    }

    #[test]
    fn test_save_config_records_device() {
        let mut f = fixture();
        let path = f.dir.join("config.json");

        f.session.save_config_to(&path).unwrap();

        let saved = Config::load_from(&path);
        assert_eq!(saved.last_device.as_deref(), Some("cam0"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(999)), "0:00:00");
        assert_eq!(format_duration(Duration::from_secs(65)), "0:01:05");
        assert_eq!(format_duration(Duration::from_secs(3 * 3600 + 59 * 60 + 1)), "3:59:01");
    }
}
