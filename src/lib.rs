// SPDX-License-Identifier: GPL-3.0-only

//! Webcam - preview, photograph and record from V4L2 devices
//!
//! This library provides the capture core of the webcam application: a
//! controller that drives one GStreamer camerabin graph through preview,
//! photo and video modes, and a session facade that turns those modes into
//! user actions with file naming, moving and trashing around them.
//!
//! # Architecture
//!
//! - [`pipeline`]: capture graph abstraction, camerabin engine and controller
//! - [`session`]: user-level operations and recording bookkeeping
//! - [`devices`]: device enumeration, selection and control reset
//! - [`file_manager`]: background move/copy and trash with undo
//! - [`config`]: persisted settings
//! - [`storage`]: destination and temporary file naming
//!
//! # Example
//!
//! ```ignore
//! let runtime = tokio::runtime::Runtime::new()?;
//! let files = Arc::new(FileManager::new(runtime.handle().clone()));
//! let mut session = Session::new(CameraBinEngine::default(), Config::load(), files, Box::new(DesktopNotifier::new()));
//! session.devices_mut().refresh();
//! session.process_events();
//! session.on_ui_sync();
//! session.take_photo();
//! ```

pub mod config;
pub mod constants;
pub mod devices;
pub mod errors;
pub mod events;
pub mod file_manager;
pub mod i18n;
pub mod location;
pub mod notifications;
pub mod pipeline;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use devices::{CameraDevice, DeviceEvent, DeviceManager};
pub use errors::{AppError, AppResult, CaptureError, DeviceError};
pub use file_manager::{FileManager, FileOperations};
pub use location::Location;
pub use notifications::{DesktopNotifier, LogNotifier, Notifier};
pub use pipeline::{CameraBinEngine, CaptureController, CaptureMode, MediaEngine};
pub use session::{Session, SessionEvent};
