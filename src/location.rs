// SPDX-License-Identifier: GPL-3.0-only

//! Location references
//!
//! Capture destinations and trash requests arrive as strings that are either
//! plain paths, `file:` URLs, or URLs with another scheme (network shares,
//! remote mounts). Only local locations can be written by the capture graph
//! directly; remote ones go through a local temporary file first.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Characters left as-is when a path is written into a URL-like field
const PATH_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// A local file path or a remote URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Location {
    Local(PathBuf),
    /// Normalized URL, without a trailing slash
    Remote(String),
}

impl Location {
    /// Parse a location reference
    ///
    /// `file:` URLs (any scheme case, with or without an authority) become
    /// local paths. Hierarchical URLs with any other scheme are remote.
    /// Everything else, including `C:/...` drive paths and names that merely
    /// contain a colon, is a local path.
    pub fn parse(reference: &str) -> Self {
        let reference = reference.trim();

        let Ok(url) = Url::parse(reference) else {
            return Location::Local(PathBuf::from(reference));
        };

        if url.scheme() == "file" {
            return match url.to_file_path() {
                Ok(path) => Location::Local(path),
                // file://otherhost/... is only reachable through the remote path
                Err(()) => Location::Remote(remote_string(&url)),
            };
        }

        if url.scheme().len() > 1 && !url.cannot_be_a_base() {
            return Location::Remote(remote_string(&url));
        }

        Location::Local(PathBuf::from(reference))
    }

    pub fn local(path: impl Into<PathBuf>) -> Self {
        Location::Local(path.into())
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Location::Local(_))
    }

    /// Local path, if this is a local location
    pub fn as_local(&self) -> Option<&Path> {
        match self {
            Location::Local(path) => Some(path),
            Location::Remote(_) => None,
        }
    }

    /// URI form understood by GIO and other URL consumers
    pub fn uri(&self) -> String {
        match self {
            Location::Local(path) => Url::from_file_path(path)
                .map(String::from)
                .unwrap_or_else(|()| format!("file://{}", percent_encode_path(path))),
            Location::Remote(url) => url.clone(),
        }
    }

    /// Child location `name` under this one
    pub fn join(&self, name: &str) -> Self {
        match self {
            Location::Local(path) => Location::Local(path.join(name)),
            Location::Remote(url) => {
                let mut parsed = match Url::parse(url) {
                    Ok(parsed) => parsed,
                    Err(_) => return Location::Remote(format!("{}/{}", url, name)),
                };
                if let Ok(mut segments) = parsed.path_segments_mut() {
                    segments.pop_if_empty().push(name);
                }
                Location::Remote(remote_string(&parsed))
            }
        }
    }

    /// Last path segment
    pub fn file_name(&self) -> Option<String> {
        match self {
            Location::Local(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().to_string()),
            Location::Remote(url) => Url::parse(url)
                .ok()?
                .path_segments()?
                .next_back()
                .filter(|segment| !segment.is_empty())
                .map(|segment| percent_decode_str(segment).decode_utf8_lossy().to_string()),
        }
    }

    /// Human-readable form, preferring plain paths for local files
    pub fn display_string(&self) -> String {
        match self {
            Location::Local(path) => path.display().to_string(),
            Location::Remote(url) => url.clone(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

impl From<String> for Location {
    fn from(value: String) -> Self {
        Location::parse(&value)
    }
}

impl From<Location> for String {
    fn from(value: Location) -> Self {
        value.display_string()
    }
}

impl From<PathBuf> for Location {
    fn from(value: PathBuf) -> Self {
        Location::Local(value)
    }
}

fn remote_string(url: &Url) -> String {
    url.as_str().trim_end_matches('/').to_string()
}

/// Percent-encode a path for URL-like contexts, keeping `/` and unreserved characters
pub(crate) fn percent_encode_path(path: &Path) -> String {
    utf8_percent_encode(&path.to_string_lossy(), PATH_SAFE).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_path() {
        assert_eq!(
            Location::parse("/home/user/Pictures"),
            Location::Local(PathBuf::from("/home/user/Pictures"))
        );
    }

    #[test]
    fn test_parse_file_url_decodes() {
        assert_eq!(
            Location::parse("file:///home/user/My%20Pictures/a.jpg"),
            Location::Local(PathBuf::from("/home/user/My Pictures/a.jpg"))
        );
    }

    #[test]
    fn test_file_scheme_is_case_insensitive() {
        assert_eq!(
            Location::parse("FILE:///tmp/x.jpg"),
            Location::Local(PathBuf::from("/tmp/x.jpg"))
        );
    }

    #[test]
    fn test_file_url_without_authority() {
        assert_eq!(
            Location::parse("file:/tmp/x.jpg"),
            Location::Local(PathBuf::from("/tmp/x.jpg"))
        );
        assert_eq!(
            Location::parse("file://localhost/tmp/x.jpg"),
            Location::Local(PathBuf::from("/tmp/x.jpg"))
        );
    }

    #[test]
    fn test_parse_remote() {
        let loc = Location::parse("smb://nas/photos/");
        assert_eq!(loc, Location::Remote("smb://nas/photos".to_string()));
        assert!(!loc.is_local());
        assert_eq!(
            loc.join("a.jpg"),
            Location::Remote("smb://nas/photos/a.jpg".to_string())
        );
        assert_eq!(loc.join("a.jpg").file_name().as_deref(), Some("a.jpg"));
    }

    #[test]
    fn test_remote_names_are_encoded_and_decoded() {
        let loc = Location::parse("sftp://host/videos").join("my clip.mkv");
        assert_eq!(
            loc,
            Location::Remote("sftp://host/videos/my%20clip.mkv".to_string())
        );
        assert_eq!(loc.file_name().as_deref(), Some("my clip.mkv"));
    }

    #[test]
    fn test_windows_style_drive_is_not_a_scheme() {
        assert!(Location::parse("C:/photos").is_local());
        assert!(Location::parse("1abc://x").is_local());
        assert!(Location::parse("photo:1.jpg").is_local());
    }

    #[test]
    fn test_local_uri() {
        assert_eq!(
            Location::local("/tmp/My Pictures/a.jpg").uri(),
            "file:///tmp/My%20Pictures/a.jpg"
        );
    }

    #[test]
    fn test_percent_encode_path() {
        assert_eq!(
            percent_encode_path(Path::new("/tmp/My Pictures/ä.jpg")),
            "/tmp/My%20Pictures/%C3%A4.jpg"
        );
    }
}
