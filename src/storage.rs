// SPDX-License-Identifier: GPL-3.0-only

//! File naming for photos, recordings and temporary capture targets

use crate::constants::files;
use crate::location::Location;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suggest a destination `<base_name>_<timestamp>.<extension>` under `base`
///
/// When a local file with that name already exists a numbered variant is
/// returned instead (see [`suggest_name`]).
pub fn suggest_file_name(base: &Location, base_name: &str, extension: &str) -> Location {
    suggest_file_name_at(base, base_name, extension, Local::now())
}

/// [`suggest_file_name`] with an explicit timestamp
pub fn suggest_file_name_at(
    base: &Location,
    base_name: &str,
    extension: &str,
    now: DateTime<Local>,
) -> Location {
    let initial = format!(
        "{}_{}.{}",
        base_name,
        now.format(files::SUGGESTED_NAME_TIMESTAMP),
        extension
    );

    if let Location::Local(dir) = base
        && dir.join(&initial).exists()
    {
        let alternative = suggest_name(dir, &initial);
        debug!(initial = %initial, alternative = %alternative, "Destination exists, using alternative name");
        return base.join(&alternative);
    }

    base.join(&initial)
}

/// Collision-free variant of `name` inside `dir`
///
/// `photo.jpg` becomes `photo (1).jpg`, `photo (1).jpg` becomes
/// `photo (2).jpg`, and so on until no file of that name exists.
pub fn suggest_name(dir: &Path, name: &str) -> String {
    let (stem, extension) = split_extension(name);
    let (mut root, mut counter) = split_counter(stem);

    loop {
        counter = match counter.checked_add(1) {
            Some(next) => next,
            // `x (4294967295)` keeps its counter as part of the name
            None => {
                root = stem;
                1
            }
        };
        let candidate = match extension {
            Some(ext) => format!("{} ({}).{}", root, counter, ext),
            None => format!("{} ({})", root, counter),
        };
        if !dir.join(&candidate).exists() {
            return candidate;
        }
    }
}

/// Split `name` at its last dot, ignoring a leading dot (hidden files)
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

/// Split a trailing ` (N)` counter off `stem`
fn split_counter(stem: &str) -> (&str, u32) {
    if let Some(open) = stem.rfind(" (")
        && let Some(inner) = stem[open + 2..].strip_suffix(')')
        && let Ok(counter) = inner.parse::<u32>()
    {
        return (&stem[..open], counter);
    }
    (stem, 0)
}

/// Temporary file a recording is written to before it is moved into place
pub fn temp_recording_path(now: DateTime<Local>) -> PathBuf {
    std::env::temp_dir().join(format!(
        "{}_{}.{}",
        files::TEMP_PREFIX,
        now.format(files::TEMP_RECORDING_TIMESTAMP),
        files::VIDEO_EXTENSION
    ))
}

/// Local stand-in for a photo whose destination is remote, unique per request
pub fn temp_photo_path() -> PathBuf {
    let token = uuid::Uuid::new_v4().simple().to_string();
    std::env::temp_dir().join(format!(
        "{}_photo_{}.{}",
        files::TEMP_PREFIX,
        &token[..12],
        files::PHOTO_EXTENSION
    ))
}

/// Create an empty, uniquely named file for the sample image
pub fn create_sample_image_file() -> std::io::Result<PathBuf> {
    let token = uuid::Uuid::new_v4().simple().to_string();
    let path = std::env::temp_dir().join(format!(
        "{}-{}",
        &token[..6],
        files::SAMPLE_IMAGE_SUFFIX
    ));

    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)?;

    Ok(path)
}
