use std::collections::HashMap;

use tantivy::collector::{DocSetCollector, TopDocs};
use tantivy::query::{AllQuery, TermQuery};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::{DocAddress, Searcher, TantivyDocument, Term};
use tracing::debug;

use common::Track;

use crate::paths;
use crate::schema::{TYPE_DIRECTORY, TYPE_TRACK};
use crate::store::{self, IndexStore, Writer};
use crate::LibraryError;

/// One bounded batch of mutations against the index.
///
/// A session owns the index's single writer and an occupancy map from
/// directory URI to direct child count, rebuilt from the committed state
/// when the session opens. Adds and removes keep the map consistent, which
/// is what lets an add touch only the ancestors it newly materializes and
/// lets a remove prune an emptied ancestor chain without rescanning the
/// tree.
pub struct Session {
    store: IndexStore,
    writer: Writer,
    counts: HashMap<String, u32>,
    scan: Searcher,
    corpus: Vec<DocAddress>,
}

impl Session {
    pub(crate) fn begin(store: IndexStore) -> Result<Self, LibraryError> {
        let writer = store.writer()?;
        let scan = store.snapshot()?;

        let mut counts: HashMap<String, u32> = HashMap::new();
        let mut corpus = Vec::new();
        let addresses = scan
            .search(&AllQuery, &DocSetCollector)
            .map_err(LibraryError::Storage)?;
        for address in addresses {
            let doc: TantivyDocument = scan.doc(address).map_err(LibraryError::Storage)?;
            let parent = store::text_field(&doc, store.fields.parent);
            *counts.entry(parent.to_string()).or_insert(0) += 1;
            match store::text_field(&doc, store.fields.doc_type) {
                TYPE_DIRECTORY => {
                    // Leaf directories must be representable even at count 0.
                    let uri = store::text_field(&doc, store.fields.uri);
                    counts.entry(uri.to_string()).or_insert(0);
                }
                TYPE_TRACK => corpus.push(address),
                _ => {}
            }
        }
        debug!(
            "Session opened over {} directories, {} tracks",
            counts.len(),
            corpus.len()
        );

        Ok(Self {
            store,
            writer,
            counts,
            scan,
            corpus,
        })
    }

    /// Drains the tracks that were already indexed when the session opened,
    /// decoding each payload from the open snapshot on demand. Single-pass:
    /// a second call yields nothing. Callers use this to reconcile the index
    /// against an external source of truth before mutating.
    pub fn existing_tracks(&mut self) -> ExistingTracks<'_> {
        ExistingTracks {
            scan: &self.scan,
            payload: self.store.fields.payload,
            addresses: std::mem::take(&mut self.corpus).into_iter(),
        }
    }

    /// Indexes `track`, materializing any missing ancestor directories.
    ///
    /// Every call counts as inserting a new child under the track's parent
    /// directory. Calling `add` twice for the same URI without an
    /// intervening [`remove`](Self::remove) replaces the document but leaves
    /// the ancestor occupancy counts inflated; re-index a changed track as
    /// remove-then-add.
    pub fn add(&mut self, track: &Track) -> Result<(), LibraryError> {
        let refs = paths::track_to_refs(track)?;
        let (track_ref, dirs) = refs
            .split_last()
            .ok_or_else(|| LibraryError::InvalidTrackUri(track.uri.clone()))?;
        let parent_ref = dirs
            .last()
            .ok_or_else(|| LibraryError::InvalidTrackUri(track.uri.clone()))?;

        let mut content: Vec<&str> = Vec::with_capacity(track.artists.len() + 2);
        content.push(track.name.as_str());
        content.push(track.album.name.as_str());
        content.extend(track.artists.iter().map(|artist| artist.name.as_str()));
        let content = content
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        self.writer
            .upsert_track(track, &parent_ref.uri, &track_ref.name, &content)?;

        // Walk from the immediate parent toward the root. An ancestor that
        // already had a child is already materialized, and so is everything
        // above it; only 0->1 transitions need a directory document. The
        // root sentinel participates in the counting but never gets one.
        for i in (0..dirs.len()).rev() {
            let dir = &dirs[i];
            let count = self.counts.entry(dir.uri.clone()).or_insert(0);
            let existed = *count >= 1;
            *count += 1;
            if existed {
                break;
            }
            if i == 0 {
                break;
            }
            self.writer
                .upsert_directory(&dir.uri, &dirs[i - 1].uri, &dir.name)?;
        }
        Ok(())
    }

    /// Deletes `uri` and prunes any ancestor directories left without
    /// children, in one upward walk.
    ///
    /// Parent links are resolved against the latest committed snapshot, so
    /// entries added in the current session join the pruning walk only after
    /// [`flush`](Self::flush).
    pub fn remove(&mut self, uri: &str) -> Result<(), LibraryError> {
        let snapshot = self.store.snapshot()?;
        let mut current = uri.to_string();
        loop {
            if self.counts.get(&current).copied().unwrap_or(0) >= 1 {
                break;
            }
            self.writer.delete_by_key(&current);
            self.counts.remove(&current);
            let parent = match parent_of(&snapshot, self.store.fields.uri, self.store.fields.parent, &current)? {
                Some(parent) => parent,
                None => break,
            };
            let count = self.counts.entry(parent.clone()).or_insert(0);
            *count = count.saturating_sub(1);
            current = parent;
        }
        Ok(())
    }

    /// Commits pending mutations as a fast durability point and keeps the
    /// session open. A failed commit is fatal to the session; nothing past
    /// the last successful commit can be assumed durable.
    pub fn flush(&mut self) -> Result<(), LibraryError> {
        self.writer.commit(false)
    }

    /// Final commit with segment compaction. Consumes the session and
    /// releases the writer.
    pub fn close(mut self) -> Result<(), LibraryError> {
        self.writer.commit(true)
    }
}

fn parent_of(
    snapshot: &Searcher,
    uri_field: Field,
    parent_field: Field,
    uri: &str,
) -> Result<Option<String>, LibraryError> {
    let query = TermQuery::new(
        Term::from_field_text(uri_field, uri),
        IndexRecordOption::Basic,
    );
    let hits = snapshot
        .search(&query, &TopDocs::with_limit(1))
        .map_err(LibraryError::Storage)?;
    let Some((_, address)) = hits.into_iter().next() else {
        return Ok(None);
    };
    let doc: TantivyDocument = snapshot.doc(address).map_err(LibraryError::Storage)?;
    let parent = store::text_field(&doc, parent_field);
    if parent.is_empty() {
        Ok(None)
    } else {
        Ok(Some(parent.to_string()))
    }
}

/// Single-pass cursor over the corpus that existed when a session began.
pub struct ExistingTracks<'a> {
    scan: &'a Searcher,
    payload: Field,
    addresses: std::vec::IntoIter<DocAddress>,
}

impl Iterator for ExistingTracks<'_> {
    type Item = Result<Track, LibraryError>;

    fn next(&mut self) -> Option<Self::Item> {
        let address = self.addresses.next()?;
        let doc: TantivyDocument = match self.scan.doc(address) {
            Ok(doc) => doc,
            Err(err) => return Some(Err(LibraryError::Storage(err))),
        };
        Some(store::decode_payload(&doc, self.payload))
    }
}
