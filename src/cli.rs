// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! Every command drives the same [`Session`] a UI shell would: it pumps the
//! session's events, fires the UI sync point, and ticks the recording clock
//! on the recording tick interval.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use webcam::constants::RECORDING_TICK_INTERVAL;
use webcam::events::drain;
use webcam::{
    CameraBinEngine, Config, DesktopNotifier, DeviceManager, FileManager, Session, SessionEvent,
    fl,
};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Time the graph gets to settle before a capture is triggered
const WARMUP: Duration = Duration::from_millis(500);

/// How long `photo` waits for the capture to finish
const PHOTO_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `record` waits for the muxer to finalize the file
const FINALIZE_TIMEOUT: Duration = Duration::from_secs(10);

struct CliSession {
    runtime: Runtime,
    files: Arc<FileManager>,
    session: Session<CameraBinEngine>,
}

impl CliSession {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let runtime = Runtime::new()?;
        let config = Config::load();
        let files = Arc::new(FileManager::new(runtime.handle().clone()));
        let engine = CameraBinEngine::new(config.display_sink.clone());
        let session = Session::new(engine, config, files.clone(), Box::new(DesktopNotifier::new()));

        Ok(Self {
            runtime,
            files,
            session,
        })
    }

    /// Enumerate cameras and start showing the chosen one
    fn start(&mut self, device: Option<usize>) -> CliResult {
        let devices = self.session.devices_mut();
        if devices.refresh() == 0 {
            return Err("No cameras found".into());
        }
        if let Some(index) = device {
            devices.set_playing_index(index)?;
        }

        self.session.process_events();
        if !self.session.controller().has_graph() {
            return Err("Failed to start the camera pipeline".into());
        }
        self.session.on_ui_sync();

        if let Some(device) = self.session.devices().playing_device() {
            println!("Using camera: {}", device.name);
        }
        Ok(())
    }

    /// Pump the session every tick until `done` says so, `stop` is raised or
    /// `timeout` passes
    fn drive<F>(&mut self, stop: &AtomicBool, timeout: Option<Duration>, mut done: F)
    where
        F: FnMut(&mut Session<CameraBinEngine>) -> bool,
    {
        let session = &mut self.session;
        self.runtime.block_on(async {
            let start = Instant::now();
            let mut interval = tokio::time::interval(RECORDING_TICK_INTERVAL);

            loop {
                interval.tick().await;
                session.process_events();
                session.on_ui_sync();
                session.tick();

                if done(session) || stop.load(Ordering::SeqCst) {
                    break;
                }
                if timeout.is_some_and(|timeout| start.elapsed() >= timeout) {
                    break;
                }
            }
        });
    }

    /// Stop the pipeline, wait for file jobs, persist settings
    fn finish(mut self) {
        self.session.shutdown();
        let failed = self.runtime.block_on(self.files.wait_for_jobs());
        if failed > 0 {
            eprintln!("{} file operation(s) failed", failed);
        }
        if let Err(e) = self.session.save_config() {
            tracing::warn!(error = %e, "Failed to save settings");
        }
    }
}

fn stop_flag() -> Result<Arc<AtomicBool>, Box<dyn std::error::Error>> {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_clone = stop.clone();
    ctrlc::set_handler(move || {
        stop_clone.store(true, Ordering::SeqCst);
    })?;
    Ok(stop)
}

/// Show the preview until Ctrl+C
pub fn run_preview(device: Option<usize>) -> CliResult {
    let stop = stop_flag()?;
    let mut cli = CliSession::new()?;
    cli.start(device)?;

    println!("Previewing... (press Ctrl+C to quit)");
    cli.drive(&stop, None, |session| !session.controller().has_graph());

    if !cli.session.controller().has_graph() && !stop.load(Ordering::SeqCst) {
        eprintln!("Camera stream stopped");
    }
    cli.finish();
    Ok(())
}

/// List all available cameras
pub fn list_cameras() -> CliResult {
    let mut devices = DeviceManager::new();
    devices.refresh();

    if devices.devices().is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in devices.devices().iter().enumerate() {
        println!("  [{}] {}", index, camera.name);
        println!("      Device: {}", camera.path);
        println!("      Id:     {}", camera.udi);
        println!();
    }

    Ok(())
}

/// Take a photo with the chosen camera
pub fn take_photo(device: Option<usize>, open: bool) -> CliResult {
    let stop = stop_flag()?;
    let mut cli = CliSession::new()?;
    cli.start(device)?;
    let mut events = cli.session.subscribe();

    cli.drive(&stop, Some(WARMUP), |_| false);
    println!("Capturing...");
    let destination = cli.session.take_photo();

    let mut taken = false;
    cli.drive(&stop, Some(PHOTO_TIMEOUT), |_| {
        taken |= drain(&mut events)
            .iter()
            .any(|event| matches!(event, SessionEvent::PhotoTaken(_)));
        taken
    });
    cli.finish();

    if !taken {
        return Err("Timed out waiting for the photo".into());
    }

    println!("{}", fl!("saved-in", location = destination.clone()));
    if open && let Err(e) = open::that(PathBuf::from(&destination)) {
        eprintln!("Failed to open {}: {}", destination, e);
    }
    Ok(())
}

/// Record for `seconds` (or until Ctrl+C)
pub fn record_video(device: Option<usize>, seconds: u64) -> CliResult {
    let stop = stop_flag()?;
    let mut cli = CliSession::new()?;
    cli.start(device)?;
    let mut events = cli.session.subscribe();

    cli.drive(&stop, Some(WARMUP), |_| false);
    cli.session.set_recording(true);
    if !cli.session.is_recording() {
        cli.finish();
        return Err("Failed to start recording".into());
    }

    println!("Recording... (press Ctrl+C to stop early)");
    cli.drive(&stop, Some(Duration::from_secs(seconds)), |session| {
        for event in drain(&mut events) {
            if let SessionEvent::RecordingTimeChanged(time) = event {
                print!("\rRecording: {}", time);
                let _ = std::io::Write::flush(&mut std::io::stdout());
            }
        }
        !session.controller().has_graph()
    });
    println!();

    cli.session.set_recording(false);
    let never = AtomicBool::new(false);
    cli.drive(&never, Some(FINALIZE_TIMEOUT), |session| {
        !session.has_pending_recordings()
    });
    if cli.session.has_pending_recordings() {
        eprintln!("Recording was not finalized in time, saving it as it is");
    }
    let videos = cli.session.config().save_videos.clone();
    cli.finish();

    println!("{}: {}", fl!("recording-saved"), videos);
    Ok(())
}

/// Trash the given files
pub fn trash_files(urls: &[String]) -> CliResult {
    let cli = CliSession::new()?;
    cli.session.trash_files(urls)?;
    println!("Moved {} item(s) to the trash", urls.len());
    Ok(())
}

/// Reset the chosen camera's controls and filters
pub fn reset_device(device: Option<usize>) -> CliResult {
    let mut config = Config::load();
    let mut devices = DeviceManager::new();
    devices.restore(&config);
    if devices.refresh() == 0 {
        return Err("No cameras found".into());
    }
    if let Some(index) = device {
        devices.set_playing_index(index)?;
    }

    let written = devices.reset_playing_device()?;
    devices.save(&mut config);
    config.save()?;

    println!("Reset {} control(s)", written);
    Ok(())
}
