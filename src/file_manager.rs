// SPDX-License-Identifier: GPL-3.0-only

//! File operations: moving finished recordings into place, copying photos out
//! to their destination, and trashing files with undo
//!
//! Moves and copies run as background jobs on the tokio runtime; their
//! failures are logged and never reach the caller. Local transfers use tokio's
//! filesystem API, anything involving a remote URL goes through GIO so the
//! desktop's mounted backends (smb, sftp, ...) handle it. Trash follows the
//! freedesktop.org layout (`files/` + `info/*.trashinfo`).

use crate::errors::{AppError, AppResult};
use crate::location::{Location, percent_encode_path};
use crate::storage::suggest_name;
use chrono::Local;
use gio::prelude::*;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// File operations collaborator used by the controller and the session
pub trait FileOperations: Send + Sync {
    /// Move `from` to `to` in the background
    fn move_file(&self, from: &Location, to: &Location);

    /// Copy `from` to `to` in the background
    fn copy_file(&self, from: &Location, to: &Location);

    /// Move `items` to the trash and record the job for [`FileOperations::undo`]
    fn trash(&self, items: &[Location]) -> AppResult<()>;

    /// Restore the most recently trashed job
    fn undo(&self) -> AppResult<()>;
}

/// One trashed file
#[derive(Debug, Clone)]
struct TrashedEntry {
    original: PathBuf,
    trashed: PathBuf,
    info: PathBuf,
}

/// Local-filesystem implementation of [`FileOperations`]
#[derive(Debug)]
pub struct FileManager {
    runtime: tokio::runtime::Handle,
    trash_dir: PathBuf,
    undo_stack: Mutex<Vec<Vec<TrashedEntry>>>,
    /// Move/copy jobs started through [`FileOperations`]
    jobs: Mutex<Vec<JoinHandle<io::Result<()>>>>,
}

impl FileManager {
    /// File manager using the user's trash (`$XDG_DATA_HOME/Trash`)
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        let trash_dir = dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("Trash");
        Self::with_trash_dir(runtime, trash_dir)
    }

    pub fn with_trash_dir(runtime: tokio::runtime::Handle, trash_dir: PathBuf) -> Self {
        Self {
            runtime,
            trash_dir,
            undo_stack: Mutex::new(Vec::new()),
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn trash_dir(&self) -> &Path {
        &self.trash_dir
    }

    /// Wait for every background job started so far; returns how many failed
    pub async fn wait_for_jobs(&self) -> usize {
        let jobs = match self.jobs.lock() {
            Ok(mut jobs) => std::mem::take(&mut *jobs),
            Err(_) => return 0,
        };

        let mut failed = 0;
        for job in jobs {
            if !matches!(job.await, Ok(Ok(()))) {
                failed += 1;
            }
        }
        failed
    }

    fn track(&self, job: JoinHandle<io::Result<()>>) {
        match self.jobs.lock() {
            Ok(mut jobs) => jobs.push(job),
            Err(_) => warn!("Job list poisoned, not tracking file job"),
        }
    }

    /// Spawn a move job and return its handle
    pub fn spawn_move(&self, from: PathBuf, to: PathBuf) -> JoinHandle<io::Result<()>> {
        self.runtime.spawn(async move {
            let result = relocate(&from, &to).await;
            match &result {
                Ok(()) => info!(from = %from.display(), to = %to.display(), "File moved"),
                Err(e) => {
                    error!(from = %from.display(), to = %to.display(), error = %e, "Failed to move file")
                }
            }
            result
        })
    }

    /// Spawn a copy job and return its handle
    pub fn spawn_copy(&self, from: PathBuf, to: PathBuf) -> JoinHandle<io::Result<()>> {
        self.runtime.spawn(async move {
            if let Some(parent) = to.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let result = tokio::fs::copy(&from, &to).await.map(|_| ());
            match &result {
                Ok(()) => info!(from = %from.display(), to = %to.display(), "File copied"),
                Err(e) => {
                    error!(from = %from.display(), to = %to.display(), error = %e, "Failed to copy file")
                }
            }
            result
        })
    }

    /// Spawn a GIO copy or move between two URIs and return its handle
    pub fn spawn_transfer(
        &self,
        from: &Location,
        to: &Location,
        remove_source: bool,
    ) -> JoinHandle<io::Result<()>> {
        let (from, to) = (from.uri(), to.uri());
        self.runtime.spawn_blocking(move || {
            let result = gio_transfer(&from, &to, remove_source);
            let action = if remove_source { "move" } else { "copy" };
            match &result {
                Ok(()) => info!(from = %from, to = %to, action, "File transferred"),
                Err(e) => error!(from = %from, to = %to, action, error = %e, "Failed to transfer file"),
            }
            result
        })
    }

    fn trash_one(&self, path: &Path) -> io::Result<TrashedEntry> {
        let files_dir = self.trash_dir.join("files");
        let info_dir = self.trash_dir.join("info");
        std::fs::create_dir_all(&files_dir)?;
        std::fs::create_dir_all(&info_dir)?;

        let original = std::path::absolute(path)?;
        let file_name = original
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;

        // Both the payload and its .trashinfo must be free
        let mut trash_name = file_name.clone();
        while files_dir.join(&trash_name).exists()
            || info_dir.join(format!("{}.trashinfo", trash_name)).exists()
        {
            trash_name = suggest_name(&files_dir, &trash_name);
        }

        let trashed = files_dir.join(&trash_name);
        let info = info_dir.join(format!("{}.trashinfo", trash_name));

        let info_contents = format!(
            "[Trash Info]\nPath={}\nDeletionDate={}\n",
            percent_encode_path(&original),
            Local::now().format("%Y-%m-%dT%H:%M:%S")
        );
        std::fs::write(&info, info_contents)?;

        if let Err(e) = move_blocking(&original, &trashed) {
            let _ = std::fs::remove_file(&info);
            return Err(e);
        }

        debug!(original = %original.display(), trashed = %trashed.display(), "Trashed file");
        Ok(TrashedEntry {
            original,
            trashed,
            info,
        })
    }
}

impl FileOperations for FileManager {
    fn move_file(&self, from: &Location, to: &Location) {
        match (from.as_local(), to.as_local()) {
            (Some(from), Some(to)) => {
                self.track(self.spawn_move(from.to_path_buf(), to.to_path_buf()));
            }
            _ => self.track(self.spawn_transfer(from, to, true)),
        }
    }

    fn copy_file(&self, from: &Location, to: &Location) {
        match (from.as_local(), to.as_local()) {
            (Some(from), Some(to)) => {
                self.track(self.spawn_copy(from.to_path_buf(), to.to_path_buf()));
            }
            _ => self.track(self.spawn_transfer(from, to, false)),
        }
    }

    fn trash(&self, items: &[Location]) -> AppResult<()> {
        let mut job = Vec::with_capacity(items.len());
        let mut failures = Vec::new();

        for item in items {
            let Some(path) = item.as_local() else {
                failures.push(format!("{}: remote locations cannot be trashed", item));
                continue;
            };

            match self.trash_one(path) {
                Ok(entry) => job.push(entry),
                Err(e) => failures.push(format!("{}: {}", item, e)),
            }
        }

        if !job.is_empty() {
            info!(count = job.len(), "Moved files to trash");
            self.undo_stack
                .lock()
                .map_err(|_| AppError::Storage("undo stack poisoned".to_string()))?
                .push(job);
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AppError::Storage(failures.join("; ")))
        }
    }

    fn undo(&self) -> AppResult<()> {
        let job = self
            .undo_stack
            .lock()
            .map_err(|_| AppError::Storage("undo stack poisoned".to_string()))?
            .pop()
            .ok_or_else(|| AppError::Storage("Nothing to undo".to_string()))?;

        for entry in job.iter().rev() {
            if let Some(parent) = entry.original.parent() {
                std::fs::create_dir_all(parent)?;
            }
            move_blocking(&entry.trashed, &entry.original)?;
            if let Err(e) = std::fs::remove_file(&entry.info) {
                warn!(info = %entry.info.display(), error = %e, "Failed to remove trash info");
            }
            debug!(restored = %entry.original.display(), "Restored from trash");
        }

        info!(count = job.len(), "Undid trash");
        Ok(())
    }
}

fn is_cross_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EXDEV)
}

/// Rename, falling back to copy + remove across filesystems
async fn relocate(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await
        }
        Err(e) => Err(e),
    }
}

/// Blocking GIO transfer, creating the destination's parent first
fn gio_transfer(from: &str, to: &str, remove_source: bool) -> io::Result<()> {
    let source = gio::File::for_uri(from);
    let destination = gio::File::for_uri(to);

    if let Some(parent) = destination.parent()
        && let Err(e) = parent.make_directory_with_parents(gio::Cancellable::NONE)
        && !e.matches(gio::IOErrorEnum::Exists)
    {
        // The transfer itself reports whether the directory was really needed
        debug!(parent = %parent.uri(), error = %e, "Could not create destination directory");
    }

    let result = if remove_source {
        source.move_(&destination, gio::FileCopyFlags::NONE, gio::Cancellable::NONE, None)
    } else {
        source.copy(&destination, gio::FileCopyFlags::NONE, gio::Cancellable::NONE, None)
    };
    result.map_err(io::Error::other)
}

fn move_blocking(from: &Path, to: &Path) -> io::Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}
