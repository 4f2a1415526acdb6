//! Persistent, searchable index of media tracks.
//!
//! Tracks are flat URIs; the index materializes the directory tree their
//! paths imply, keeps it pruned as tracks come and go, and answers point
//! lookups, directory listings, and free-text search over the committed
//! state. Mutations run inside a [`Session`] and become durable only at its
//! commit points.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tantivy::collector::{Count, DocSetCollector, TopDocs};
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::IndexRecordOption;
use serde::{Deserialize, Serialize};
use tantivy::{TantivyDocument, Term};
use tracing::debug;

use common::{Ref, Track};

mod paths;
mod query;
mod schema;
mod session;
mod store;

pub use session::{ExistingTracks, Session};

use schema::TYPE_TRACK;
use store::IndexStore;

/// Handle to one on-disk track index. Cheap to clone; reads always see the
/// latest committed state and never block a writer. Mutations go through
/// [`Library::begin`].
#[derive(Clone)]
pub struct Library {
    data_dir: PathBuf,
    store: IndexStore,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub tracks: Vec<Track>,
}

impl Library {
    /// Opens the index at `data_dir`, creating it if absent.
    pub fn open(data_dir: &Path) -> Result<Self, LibraryError> {
        let store = IndexStore::create_or_open(data_dir)?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            store,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Number of indexed tracks in the latest committed state.
    pub fn load(&self) -> Result<usize, LibraryError> {
        let searcher = self.store.snapshot()?;
        let query = TermQuery::new(
            Term::from_field_text(self.store.fields.doc_type, TYPE_TRACK),
            IndexRecordOption::Basic,
        );
        searcher.search(&query, &Count).map_err(LibraryError::Storage)
    }

    /// Point lookup of a track by URI.
    pub fn lookup(&self, uri: &str) -> Result<Option<Track>, LibraryError> {
        let searcher = self.store.snapshot()?;
        let query = BooleanQuery::new(vec![
            (
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(self.store.fields.uri, uri),
                    IndexRecordOption::Basic,
                )) as Box<dyn Query>,
            ),
            (
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(self.store.fields.doc_type, TYPE_TRACK),
                    IndexRecordOption::Basic,
                )),
            ),
        ]);
        let hits = searcher
            .search(&query, &TopDocs::with_limit(1))
            .map_err(LibraryError::Storage)?;
        let Some((_, address)) = hits.into_iter().next() else {
            return Ok(None);
        };
        let doc: TantivyDocument = searcher.doc(address).map_err(LibraryError::Storage)?;
        Ok(Some(store::decode_payload(&doc, self.store.fields.payload)?))
    }

    /// Lists the direct children of a directory URI, directories before
    /// tracks, each group sorted by name.
    pub fn browse(&self, uri: &str) -> Result<Vec<Ref>, LibraryError> {
        let searcher = self.store.snapshot()?;
        let query = TermQuery::new(
            Term::from_field_text(self.store.fields.parent, uri),
            IndexRecordOption::Basic,
        );
        let addresses = searcher
            .search(&query, &DocSetCollector)
            .map_err(LibraryError::Storage)?;

        let mut refs = Vec::with_capacity(addresses.len());
        for address in addresses {
            let doc: TantivyDocument = searcher.doc(address).map_err(LibraryError::Storage)?;
            let entry_uri = store::text_field(&doc, self.store.fields.uri).to_string();
            let name = store::text_field(&doc, self.store.fields.pathname).to_string();
            if store::text_field(&doc, self.store.fields.doc_type) == TYPE_TRACK {
                refs.push(Ref::track(entry_uri, name));
            } else {
                refs.push(Ref::directory(entry_uri, name));
            }
        }
        refs.sort_by(|a, b| (a.kind, &a.name, &a.uri).cmp(&(b.kind, &b.name, &b.uri)));
        Ok(refs)
    }

    /// Free-text search over track documents.
    ///
    /// `query` maps recognized field names (`uri`, `track_name`, `album`,
    /// `artist`, `any`) to candidate values; unrecognized names are ignored.
    /// `exact` switches from fuzzy matching to phrase matching. A query with
    /// no recognized fields returns an empty result.
    pub fn search(
        &self,
        query: &HashMap<String, Vec<String>>,
        limit: usize,
        exact: bool,
    ) -> Result<SearchResult, LibraryError> {
        if limit == 0 {
            return Ok(SearchResult::default());
        }
        let compiled =
            match query::compile(self.store.index(), &self.store.fields, query, exact)? {
                Some(compiled) => compiled,
                None => return Ok(SearchResult::default()),
            };
        debug!("Performing search: {:?}", compiled);

        let searcher = self.store.snapshot()?;
        let hits = searcher
            .search(&compiled, &TopDocs::with_limit(limit))
            .map_err(LibraryError::Storage)?;
        let mut tracks = Vec::with_capacity(hits.len());
        for (_score, address) in hits {
            let doc: TantivyDocument = searcher.doc(address).map_err(LibraryError::Storage)?;
            tracks.push(store::decode_payload(&doc, self.store.fields.payload)?);
        }
        Ok(SearchResult { tracks })
    }

    /// Opens a mutation session. At most one session may be live per index;
    /// a concurrent attempt fails with [`LibraryError::SessionBusy`].
    pub fn begin(&self) -> Result<Session, LibraryError> {
        Session::begin(self.store.clone())
    }

    /// Irreversibly destroys the persisted index, removing its storage
    /// directory wholesale.
    pub fn clear(self) -> Result<(), LibraryError> {
        let Library { data_dir, store } = self;
        drop(store);
        fs::remove_dir_all(&data_dir).map_err(LibraryError::Clear)
    }
}

#[derive(Debug)]
pub enum LibraryError {
    Storage(tantivy::TantivyError),
    Io(std::io::Error),
    Commit(tantivy::TantivyError),
    Clear(std::io::Error),
    Payload(Box<bincode::ErrorKind>),
    InvalidTrackUri(String),
    SessionBusy,
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::Storage(err) => write!(f, "index error: {}", err),
            LibraryError::Io(err) => write!(f, "io error: {}", err),
            LibraryError::Commit(err) => write!(f, "commit failed: {}", err),
            LibraryError::Clear(err) => write!(f, "clear failed: {}", err),
            LibraryError::Payload(err) => write!(f, "track payload error: {}", err),
            LibraryError::InvalidTrackUri(uri) => write!(f, "not a track uri: {}", uri),
            LibraryError::SessionBusy => {
                write!(f, "another indexing session is already open")
            }
        }
    }
}

impl std::error::Error for LibraryError {}

impl From<tantivy::TantivyError> for LibraryError {
    fn from(err: tantivy::TantivyError) -> Self {
        LibraryError::Storage(err)
    }
}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::Io(err)
    }
}

impl From<Box<bincode::ErrorKind>> for LibraryError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        LibraryError::Payload(err)
    }
}
