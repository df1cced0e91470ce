// SPDX-License-Identifier: GPL-3.0-only

//! In-memory engine and collaborators for controller and session tests

use super::{BusEvent, CaptureGraph, CaptureMode, FilterChain, MediaEngine};
use crate::errors::{AppResult, CaptureError, CaptureResult};
use crate::events::EventReceiver;
use crate::file_manager::FileOperations;
use crate::location::Location;
use crate::notifications::Notifier;
use futures::channel::mpsc;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

/// Everything a fake graph was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphCall {
    SetDevicePath(String),
    SetMode(CaptureMode),
    SetLocation(PathBuf),
    StartCapture,
    StopCapture,
    ApplyFilters(FilterChain),
    Play,
    Halt,
    Dropped,
}

#[derive(Debug, Default)]
struct FakeLog {
    builds: usize,
    calls: Vec<GraphCall>,
    bus: Option<mpsc::UnboundedSender<BusEvent>>,
    unavailable: bool,
}

/// Engine whose graphs only record calls
#[derive(Debug, Clone, Default)]
pub struct FakeEngine {
    log: Rc<RefCell<FakeLog>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine that fails every build like a missing plugin would
    pub fn unavailable() -> Self {
        let engine = Self::default();
        engine.log.borrow_mut().unavailable = true;
        engine
    }

    pub fn builds(&self) -> usize {
        self.log.borrow().builds
    }

    pub fn calls(&self) -> Vec<GraphCall> {
        self.log.borrow().calls.clone()
    }

    pub fn count(&self, call: &GraphCall) -> usize {
        self.log.borrow().calls.iter().filter(|c| *c == call).count()
    }

    pub fn clear_calls(&self) {
        self.log.borrow_mut().calls.clear();
    }

    /// Post `event` on the bus of the most recently built graph
    pub fn inject(&self, event: BusEvent) {
        if let Some(bus) = &self.log.borrow().bus {
            let _ = bus.unbounded_send(event);
        }
    }
}

impl MediaEngine for FakeEngine {
    type Graph = FakeGraph;

    fn build(&self, _device_path: &str) -> CaptureResult<FakeGraph> {
        let mut log = self.log.borrow_mut();
        if log.unavailable {
            return Err(CaptureError::EngineUnavailable(
                "wrappercamerabinsrc not found".to_string(),
            ));
        }

        let (sender, receiver) = mpsc::unbounded();
        log.builds += 1;
        log.bus = Some(sender);

        Ok(FakeGraph {
            log: self.log.clone(),
            bus: Some(receiver),
        })
    }
}

#[derive(Debug)]
pub struct FakeGraph {
    log: Rc<RefCell<FakeLog>>,
    bus: Option<EventReceiver<BusEvent>>,
}

impl FakeGraph {
    fn record(&self, call: GraphCall) -> CaptureResult<()> {
        self.log.borrow_mut().calls.push(call);
        Ok(())
    }
}

impl CaptureGraph for FakeGraph {
    fn set_device_path(&mut self, path: &str) -> CaptureResult<()> {
        self.record(GraphCall::SetDevicePath(path.to_string()))
    }

    fn set_mode(&mut self, mode: CaptureMode) -> CaptureResult<()> {
        self.record(GraphCall::SetMode(mode))
    }

    fn set_location(&mut self, path: &Path) -> CaptureResult<()> {
        self.record(GraphCall::SetLocation(path.to_path_buf()))
    }

    fn start_capture(&mut self) -> CaptureResult<()> {
        self.record(GraphCall::StartCapture)
    }

    fn stop_capture(&mut self) -> CaptureResult<()> {
        self.record(GraphCall::StopCapture)
    }

    fn apply_filters(&mut self, filters: &FilterChain) -> CaptureResult<()> {
        self.record(GraphCall::ApplyFilters(filters.clone()))
    }

    fn play(&mut self) -> CaptureResult<()> {
        self.record(GraphCall::Play)
    }

    fn halt(&mut self) -> CaptureResult<()> {
        self.record(GraphCall::Halt)
    }

    fn take_bus(&mut self) -> Option<EventReceiver<BusEvent>> {
        self.bus.take()
    }
}

impl Drop for FakeGraph {
    fn drop(&mut self) {
        self.log.borrow_mut().calls.push(GraphCall::Dropped);
    }
}

/// Notifications that were shown
#[derive(Debug, Clone, Default)]
pub struct FakeNotifier {
    sent: Rc<RefCell<Vec<(String, String, String)>>>,
}

impl FakeNotifier {
    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.borrow().clone()
    }
}

impl Notifier for FakeNotifier {
    fn notify(&self, event: &str, title: &str, body: &str) {
        self.sent
            .borrow_mut()
            .push((event.to_string(), title.to_string(), body.to_string()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileCall {
    Move(Location, Location),
    Copy(Location, Location),
    Trash(Vec<Location>),
    Undo,
}

/// File operations that are only recorded
#[derive(Debug, Clone, Default)]
pub struct FakeFiles {
    calls: Arc<Mutex<Vec<FileCall>>>,
}

impl FakeFiles {
    pub fn calls(&self) -> Vec<FileCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: FileCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl FileOperations for FakeFiles {
    fn move_file(&self, from: &Location, to: &Location) {
        self.record(FileCall::Move(from.clone(), to.clone()));
    }

    fn copy_file(&self, from: &Location, to: &Location) {
        self.record(FileCall::Copy(from.clone(), to.clone()));
    }

    fn trash(&self, items: &[Location]) -> AppResult<()> {
        self.record(FileCall::Trash(items.to_vec()));
        Ok(())
    }

    fn undo(&self) -> AppResult<()> {
        self.record(FileCall::Undo);
        Ok(())
    }
}
