use std::collections::{HashMap, HashSet};

use common::{
    path_to_directory_uri, track_path_to_uri, Album, Artist, RefKind, Track, ROOT_DIRECTORY_URI,
};
use library::{Library, LibraryError};
use tempfile::TempDir;

fn open(dir: &TempDir) -> Library {
    Library::open(dir.path()).unwrap()
}

fn track_at(relpath: &str, name: &str) -> Track {
    Track {
        uri: track_path_to_uri(relpath),
        name: name.to_string(),
        album: Album {
            name: "Kind of Blue".to_string(),
        },
        artists: vec![Artist {
            name: "Miles Davis".to_string(),
        }],
        duration_ms: Some(323_000),
        track_no: Some(1),
    }
}

fn add_all(library: &Library, tracks: &[&Track]) {
    let mut session = library.begin().unwrap();
    for track in tracks {
        session.add(track).unwrap();
    }
    session.close().unwrap();
}

fn query_of(field: &str, values: &[&str]) -> HashMap<String, Vec<String>> {
    let mut query = HashMap::new();
    query.insert(
        field.to_string(),
        values.iter().map(|value| value.to_string()).collect(),
    );
    query
}

#[test]
fn browse_materializes_directory_chain() {
    let dir = TempDir::new().unwrap();
    let library = open(&dir);
    let track = track_at("A/B/song.mp3", "song");
    add_all(&library, &[&track]);

    let root = library.browse(ROOT_DIRECTORY_URI).unwrap();
    assert_eq!(root.len(), 1);
    assert_eq!(root[0].kind, RefKind::Directory);
    assert_eq!(root[0].name, "A");
    assert_eq!(root[0].uri, path_to_directory_uri("A"));

    let a = library.browse(&root[0].uri).unwrap();
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].name, "B");
    assert_eq!(a[0].uri, path_to_directory_uri("A/B"));

    let b = library.browse(&a[0].uri).unwrap();
    assert_eq!(b.len(), 1);
    assert_eq!(b[0].kind, RefKind::Track);
    assert_eq!(b[0].name, "song.mp3");
    assert_eq!(b[0].uri, track.uri);
}

#[test]
fn lookup_returns_the_stored_track() {
    let dir = TempDir::new().unwrap();
    let library = open(&dir);
    let track = track_at("A/B/song.mp3", "song");
    add_all(&library, &[&track]);

    assert_eq!(library.lookup(&track.uri).unwrap(), Some(track));
    assert_eq!(library.lookup("local:track:missing.mp3").unwrap(), None);
}

#[test]
fn browse_sorts_directories_before_tracks() {
    let dir = TempDir::new().unwrap();
    let library = open(&dir);
    // Track first, directory second; the listing still leads with the
    // directory.
    add_all(
        &library,
        &[
            &track_at("aaa.mp3", "aaa"),
            &track_at("Zeta/b.mp3", "b"),
            &track_at("Alpha/a.mp3", "a"),
        ],
    );

    let root = library.browse(ROOT_DIRECTORY_URI).unwrap();
    let listing: Vec<(RefKind, String)> = root
        .into_iter()
        .map(|entry| (entry.kind, entry.name))
        .collect();
    assert_eq!(
        listing,
        vec![
            (RefKind::Directory, "Alpha".to_string()),
            (RefKind::Directory, "Zeta".to_string()),
            (RefKind::Track, "aaa.mp3".to_string()),
        ]
    );
}

#[test]
fn removing_one_sibling_keeps_the_directory() {
    let dir = TempDir::new().unwrap();
    let library = open(&dir);
    let t1 = track_at("A/song1.mp3", "song1");
    let t2 = track_at("A/song2.mp3", "song2");
    add_all(&library, &[&t1, &t2]);

    let mut session = library.begin().unwrap();
    session.remove(&t1.uri).unwrap();
    session.close().unwrap();

    let a = library.browse(&path_to_directory_uri("A")).unwrap();
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].name, "song2.mp3");
    assert_eq!(library.browse(ROOT_DIRECTORY_URI).unwrap().len(), 1);
}

#[test]
fn removing_the_last_child_prunes_the_empty_chain() {
    let dir = TempDir::new().unwrap();
    let library = open(&dir);
    let track = track_at("A/B/C/song.mp3", "song");
    add_all(&library, &[&track]);

    let mut session = library.begin().unwrap();
    session.remove(&track.uri).unwrap();
    session.close().unwrap();

    assert!(library.browse(ROOT_DIRECTORY_URI).unwrap().is_empty());
    assert!(library
        .browse(&path_to_directory_uri("A/B"))
        .unwrap()
        .is_empty());
    assert_eq!(library.load().unwrap(), 0);
}

#[test]
fn root_level_track_needs_no_directories() {
    let dir = TempDir::new().unwrap();
    let library = open(&dir);
    let track = track_at("song.mp3", "song");
    add_all(&library, &[&track]);

    let root = library.browse(ROOT_DIRECTORY_URI).unwrap();
    assert_eq!(root.len(), 1);
    assert_eq!(root[0].kind, RefKind::Track);
    assert_eq!(library.load().unwrap(), 1);

    let mut session = library.begin().unwrap();
    session.remove(&track.uri).unwrap();
    session.close().unwrap();
    assert!(library.browse(ROOT_DIRECTORY_URI).unwrap().is_empty());
    assert_eq!(library.load().unwrap(), 0);
}

#[test]
fn mutations_become_visible_at_flush() {
    let dir = TempDir::new().unwrap();
    let library = open(&dir);
    let mut session = library.begin().unwrap();
    session.add(&track_at("A/song.mp3", "song")).unwrap();

    assert_eq!(library.load().unwrap(), 0);
    session.flush().unwrap();
    assert_eq!(library.load().unwrap(), 1);
    session.close().unwrap();
}

#[test]
fn flushed_entries_can_be_removed_in_the_same_session() {
    let dir = TempDir::new().unwrap();
    let library = open(&dir);
    let track = track_at("A/song.mp3", "song");

    let mut session = library.begin().unwrap();
    session.add(&track).unwrap();
    session.flush().unwrap();
    session.remove(&track.uri).unwrap();
    session.close().unwrap();

    assert_eq!(library.load().unwrap(), 0);
    assert!(library.browse(ROOT_DIRECTORY_URI).unwrap().is_empty());
}

#[test]
fn flush_with_no_pending_mutations_keeps_the_count() {
    let dir = TempDir::new().unwrap();
    let library = open(&dir);
    add_all(&library, &[&track_at("A/song.mp3", "song")]);

    let mut session = library.begin().unwrap();
    session.flush().unwrap();
    session.flush().unwrap();
    session.close().unwrap();
    assert_eq!(library.load().unwrap(), 1);
}

#[test]
fn readd_after_remove_replaces_the_payload() {
    let dir = TempDir::new().unwrap();
    let library = open(&dir);
    let stale = track_at("A/song.mp3", "Old Name");
    add_all(&library, &[&stale]);

    let fresh = track_at("A/song.mp3", "New Name");
    let mut session = library.begin().unwrap();
    session.remove(&stale.uri).unwrap();
    session.add(&fresh).unwrap();
    session.close().unwrap();

    assert_eq!(library.lookup(&fresh.uri).unwrap(), Some(fresh));
    assert_eq!(library.load().unwrap(), 1);
    assert_eq!(library.browse(&path_to_directory_uri("A")).unwrap().len(), 1);
}

#[test]
fn begin_yields_the_existing_corpus_once() {
    let dir = TempDir::new().unwrap();
    let library = open(&dir);
    let t1 = track_at("A/song1.mp3", "song1");
    let t2 = track_at("B/song2.mp3", "song2");
    add_all(&library, &[&t1, &t2]);

    let mut session = library.begin().unwrap();
    let uris: HashSet<String> = session
        .existing_tracks()
        .map(|track| track.unwrap().uri)
        .collect();
    assert_eq!(
        uris,
        HashSet::from([t1.uri.clone(), t2.uri.clone()])
    );
    assert_eq!(session.existing_tracks().count(), 0);
    session.close().unwrap();
}

#[test]
fn concurrent_sessions_are_rejected() {
    let dir = TempDir::new().unwrap();
    let library = open(&dir);

    let session = library.begin().unwrap();
    assert!(matches!(library.begin(), Err(LibraryError::SessionBusy)));
    drop(session);

    let reopened = library.begin().unwrap();
    reopened.close().unwrap();
}

#[test]
fn fuzzy_search_matches_near_terms() {
    let dir = TempDir::new().unwrap();
    let library = open(&dir);
    add_all(
        &library,
        &[
            &track_at("A/song1.mp3", "song1"),
            &track_at("A/song2.mp3", "song2"),
        ],
    );

    let result = library
        .search(&query_of("track_name", &["song"]), 100, false)
        .unwrap();
    assert_eq!(result.tracks.len(), 2);

    let result = library
        .search(&query_of("artist", &["miles"]), 100, false)
        .unwrap();
    assert_eq!(result.tracks.len(), 2);
}

#[test]
fn exact_search_matches_terms_and_phrases() {
    let dir = TempDir::new().unwrap();
    let library = open(&dir);
    let t1 = track_at("A/song1.mp3", "song1");
    add_all(
        &library,
        &[&t1, &track_at("A/song2.mp3", "song2")],
    );

    let result = library
        .search(&query_of("track_name", &["song1"]), 100, true)
        .unwrap();
    assert_eq!(result.tracks.len(), 1);
    assert_eq!(result.tracks[0].uri, t1.uri);

    let blue = Track {
        name: "Blue Train Ride".to_string(),
        ..track_at("B/blue-train.mp3", "")
    };
    let moon = Track {
        name: "Blue Moon".to_string(),
        ..track_at("B/blue-moon.mp3", "")
    };
    add_all(&library, &[&blue, &moon]);

    let result = library
        .search(&query_of("track_name", &["blue train"]), 100, true)
        .unwrap();
    assert_eq!(result.tracks.len(), 1);
    assert_eq!(result.tracks[0].uri, blue.uri);

    let result = library
        .search(&query_of("track_name", &["blue"]), 100, true)
        .unwrap();
    assert_eq!(result.tracks.len(), 2);
}

#[test]
fn search_by_uri_matches_verbatim() {
    let dir = TempDir::new().unwrap();
    let library = open(&dir);
    let track = track_at("A/song1.mp3", "song1");
    add_all(&library, &[&track, &track_at("A/song2.mp3", "song2")]);

    let result = library
        .search(&query_of("uri", &[track.uri.as_str()]), 100, false)
        .unwrap();
    assert_eq!(result.tracks.len(), 1);
    assert_eq!(result.tracks[0].uri, track.uri);

    let result = library
        .search(&query_of("uri", &["local:track:A"]), 100, false)
        .unwrap();
    assert!(result.tracks.is_empty());
}

#[test]
fn values_for_one_field_combine_as_alternatives() {
    let dir = TempDir::new().unwrap();
    let library = open(&dir);
    add_all(
        &library,
        &[
            &track_at("A/song1.mp3", "song1"),
            &track_at("A/song2.mp3", "song2"),
        ],
    );

    let result = library
        .search(&query_of("track_name", &["song1", "song2"]), 100, true)
        .unwrap();
    assert_eq!(result.tracks.len(), 2);
}

#[test]
fn empty_or_unrecognized_queries_return_nothing() {
    let dir = TempDir::new().unwrap();
    let library = open(&dir);
    add_all(&library, &[&track_at("A/song1.mp3", "song1")]);

    let result = library.search(&HashMap::new(), 100, false).unwrap();
    assert!(result.tracks.is_empty());

    let result = library
        .search(&query_of("composer", &["davis"]), 100, false)
        .unwrap();
    assert!(result.tracks.is_empty());
}

#[test]
fn search_surfaces_only_tracks() {
    let dir = TempDir::new().unwrap();
    let library = open(&dir);
    let track = track_at("Blue/Deeper/song.mp3", "song");
    add_all(&library, &[&track]);

    // Album text reaches the content field; directory documents carry no
    // searchable text and must never appear.
    let result = library.search(&query_of("any", &["blue"]), 100, false).unwrap();
    assert_eq!(result.tracks.len(), 1);
    assert_eq!(result.tracks[0].uri, track.uri);
}

#[test]
fn load_counts_only_tracks() {
    let dir = TempDir::new().unwrap();
    let library = open(&dir);
    add_all(&library, &[&track_at("A/B/C/song.mp3", "song")]);
    // Three directory documents exist alongside the one track.
    assert_eq!(library.load().unwrap(), 1);
}

#[test]
fn clear_removes_the_storage_directory() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("index");
    let library = Library::open(&data_dir).unwrap();
    add_all(&library, &[&track_at("A/song.mp3", "song")]);

    library.clear().unwrap();
    assert!(!data_dir.exists());
}
