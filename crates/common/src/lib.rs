use std::path::Path;

use serde::{Deserialize, Serialize};

/// Root of the virtual directory tree. Never backed by an index document;
/// it only ever appears as a `parent` value.
pub const ROOT_DIRECTORY_URI: &str = "local:directory";

const TRACK_URI_SCHEME: &str = "local:track:";
const DIRECTORY_URI_SCHEME: &str = "local:directory:";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub uri: String,
    pub name: String,
    pub album: Album,
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub duration_ms: Option<u32>,
    #[serde(default)]
    pub track_no: Option<u16>,
}

/// Listing entry kind. `Directory` sorts before `Track` so browse output
/// never interleaves the two.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    Directory,
    Track,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ref {
    pub kind: RefKind,
    pub uri: String,
    pub name: String,
}

impl Ref {
    pub fn directory(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: RefKind::Directory,
            uri: uri.into(),
            name: name.into(),
        }
    }

    pub fn track(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: RefKind::Track,
            uri: uri.into(),
            name: name.into(),
        }
    }
}

/// Decodes a `local:track:` URI into raw path bytes. Percent sequences are
/// decoded as-is; UTF-8 recovery is the caller's concern.
pub fn track_uri_to_path(uri: &str) -> Option<Vec<u8>> {
    let encoded = uri.strip_prefix(TRACK_URI_SCHEME)?;
    Some(urlencoding::decode_binary(encoded.as_bytes()).into_owned())
}

pub fn track_path_to_uri(relpath: &str) -> String {
    let encoded: Vec<String> = relpath
        .split('/')
        .filter(|part| !part.is_empty())
        .map(|part| urlencoding::encode(part).into_owned())
        .collect();
    format!("{}{}", TRACK_URI_SCHEME, encoded.join("/"))
}

/// Derives the URI identifying the directory at `path` (a `/`-joined chain
/// of decoded segments). Segments are percent-encoded individually so the
/// separator survives, which keeps the mapping deterministic and invertible.
pub fn path_to_directory_uri(path: &str) -> String {
    let encoded: Vec<String> = path
        .split('/')
        .filter(|part| !part.is_empty())
        .map(|part| urlencoding::encode(part).into_owned())
        .collect();
    format!("{}{}", DIRECTORY_URI_SCHEME, encoded.join("/"))
}

/// `/`-joined path of `path` relative to `root`, or `None` if `path` is not
/// underneath it.
pub fn relpath_from(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_uri_round_trips_through_path() {
        let uri = track_path_to_uri("Some Artist/An Album/01 - Song.mp3");
        assert_eq!(uri, "local:track:Some%20Artist/An%20Album/01%20-%20Song.mp3");
        let path = track_uri_to_path(&uri).unwrap();
        assert_eq!(path, b"Some Artist/An Album/01 - Song.mp3");
    }

    #[test]
    fn wrong_scheme_does_not_decode() {
        assert!(track_uri_to_path("local:directory:Some%20Artist").is_none());
        assert!(track_uri_to_path("file:///tmp/song.mp3").is_none());
    }

    #[test]
    fn directory_uri_is_deterministic() {
        let first = path_to_directory_uri("Artist/Album");
        let second = path_to_directory_uri("Artist/Album");
        assert_eq!(first, second);
        assert_ne!(first, path_to_directory_uri("Artist/Other Album"));
    }

    #[test]
    fn directories_sort_before_tracks() {
        let mut refs = vec![
            Ref::track("local:track:a.mp3", "a.mp3"),
            Ref::directory(path_to_directory_uri("z"), "z"),
        ];
        refs.sort_by(|a, b| (a.kind, &a.name).cmp(&(b.kind, &b.name)));
        assert_eq!(refs[0].kind, RefKind::Directory);
    }
}
