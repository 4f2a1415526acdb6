use common::{path_to_directory_uri, track_uri_to_path, Ref, Track, ROOT_DIRECTORY_URI};

use crate::LibraryError;

/// Expands a track into its browse chain: the root sentinel, one reference
/// per ancestor directory, and the track itself. Directory identity is
/// derived from the URI's path prefix alone, so the same URI always yields
/// the same chain. Invalid UTF-8 in the decoded path is replaced, never
/// fatal.
pub(crate) fn track_to_refs(track: &Track) -> Result<Vec<Ref>, LibraryError> {
    let path = track_uri_to_path(&track.uri)
        .ok_or_else(|| LibraryError::InvalidTrackUri(track.uri.clone()))?;
    let decoded = String::from_utf8_lossy(&path);
    let parts: Vec<&str> = decoded.split('/').filter(|part| !part.is_empty()).collect();
    let (leaf, dirs) = parts
        .split_last()
        .ok_or_else(|| LibraryError::InvalidTrackUri(track.uri.clone()))?;

    let mut refs = Vec::with_capacity(dirs.len() + 2);
    refs.push(Ref::directory(ROOT_DIRECTORY_URI, ""));
    for i in 0..dirs.len() {
        let prefix = dirs[..=i].join("/");
        refs.push(Ref::directory(path_to_directory_uri(&prefix), dirs[i]));
    }
    refs.push(Ref::track(track.uri.clone(), *leaf));
    Ok(refs)
}
