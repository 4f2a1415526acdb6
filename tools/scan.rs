use std::collections::HashSet;
use std::env;
use std::path::Path;

use common::{relpath_from, track_path_to_uri, Album, Artist, Track};
use library::Library;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: [&str; 4] = ["mp3", "flac", "ogg", "m4a"];
const FLUSH_EVERY: usize = 256;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let music_root = args
        .next()
        .or_else(|| env::var("MUSIC_ROOT").ok())
        .ok_or("MUSIC_ROOT not set and no path argument")?;
    let index_path = args
        .next()
        .or_else(|| env::var("INDEX_PATH").ok())
        .unwrap_or_else(|| "data/index".to_string());

    let library = Library::open(Path::new(&index_path))?;
    let mut session = library.begin()?;

    let wanted = collect_tracks(Path::new(&music_root));
    let wanted_uris: HashSet<&str> = wanted.iter().map(|track| track.uri.as_str()).collect();

    let mut existing = HashSet::new();
    for track in session.existing_tracks() {
        match track {
            Ok(track) => {
                existing.insert(track.uri);
            }
            Err(err) => warn!("Skipping unreadable index entry: {}", err),
        }
    }

    let stale: Vec<String> = existing
        .iter()
        .filter(|uri| !wanted_uris.contains(uri.as_str()))
        .cloned()
        .collect();

    let mut pending = 0usize;
    let mut added = 0usize;
    for uri in &stale {
        session.remove(uri)?;
        pending += 1;
        if pending >= FLUSH_EVERY {
            session.flush()?;
            pending = 0;
        }
    }
    for track in &wanted {
        if existing.contains(&track.uri) {
            continue;
        }
        session.add(track)?;
        added += 1;
        pending += 1;
        if pending >= FLUSH_EVERY {
            session.flush()?;
            pending = 0;
        }
    }
    session.close()?;

    println!(
        "Indexed: {} added, {} removed, {} total tracks",
        added,
        stale.len(),
        library.load()?
    );
    Ok(())
}

fn collect_tracks(root: &Path) -> Vec<Track> {
    let mut tracks = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_audio = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);
        if !is_audio {
            continue;
        }
        let relpath = match relpath_from(root, path) {
            Some(relpath) => relpath,
            None => continue,
        };

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| relpath.clone());
        let album = path
            .parent()
            .and_then(|dir| dir.file_name())
            .map(|dir| dir.to_string_lossy().to_string())
            .unwrap_or_default();
        let artists = path
            .parent()
            .and_then(|dir| dir.parent())
            .and_then(|dir| dir.file_name())
            .map(|dir| {
                vec![Artist {
                    name: dir.to_string_lossy().to_string(),
                }]
            })
            .unwrap_or_default();

        tracks.push(Track {
            uri: track_path_to_uri(&relpath),
            name,
            album: Album { name: album },
            artists,
            duration_ms: None,
            track_no: None,
        });
    }
    tracks
}
