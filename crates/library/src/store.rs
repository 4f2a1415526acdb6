use std::fs;
use std::path::Path;

use tantivy::directory::MmapDirectory;
use tantivy::schema::{Field, Value};
use tantivy::{Index, IndexReader, ReloadPolicy, Searcher, TantivyDocument, Term};
use tracing::info;

use common::Track;

use crate::schema::{IndexSchema, TYPE_DIRECTORY, TYPE_TRACK};
use crate::LibraryError;

const WRITER_HEAP_BYTES: usize = 50 * 1024 * 1024;

/// Narrow handle over the document index: open-or-create, committed
/// snapshots for readers, and the single exclusive writer.
#[derive(Clone)]
pub(crate) struct IndexStore {
    index: Index,
    reader: IndexReader,
    pub(crate) fields: IndexSchema,
}

impl IndexStore {
    pub fn create_or_open(dir: &Path) -> Result<Self, LibraryError> {
        fs::create_dir_all(dir)?;
        let (schema, fields) = IndexSchema::build();
        let mmap = MmapDirectory::open(dir).map_err(|err| {
            LibraryError::Storage(tantivy::TantivyError::from(err))
        })?;
        let existed = Index::exists(&mmap).unwrap_or(false);
        let index = Index::open_or_create(mmap, schema)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        if existed {
            info!("Opened track index at {:?}", dir);
        } else {
            info!("Created track index at {:?}", dir);
        }
        Ok(Self {
            index,
            reader,
            fields,
        })
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    /// A searcher over the latest committed state. Acquired fresh per call so
    /// readers never observe a stale generation after a commit.
    pub fn snapshot(&self) -> Result<Searcher, LibraryError> {
        self.reader.reload()?;
        Ok(self.reader.searcher())
    }

    /// Opens the index's single writer. A second open while one is live
    /// surfaces the engine's lock contention as [`LibraryError::SessionBusy`].
    pub fn writer(&self) -> Result<Writer, LibraryError> {
        let inner = self.index.writer(WRITER_HEAP_BYTES).map_err(|err| match err {
            tantivy::TantivyError::LockFailure(..) => LibraryError::SessionBusy,
            other => LibraryError::Storage(other),
        })?;
        Ok(Writer {
            inner,
            index: self.index.clone(),
            fields: self.fields,
        })
    }
}

/// Write half of the adapter. Mutations are keyed by `uri`; nothing becomes
/// visible to snapshots until [`commit`](Writer::commit).
pub(crate) struct Writer {
    inner: tantivy::IndexWriter,
    index: Index,
    fields: IndexSchema,
}

impl Writer {
    /// Inserts or replaces the track document keyed by its URI.
    pub fn upsert_track(
        &mut self,
        track: &Track,
        parent: &str,
        pathname: &str,
        content: &str,
    ) -> Result<(), LibraryError> {
        let payload = bincode::serialize(track)?;
        let artists = track
            .artists
            .iter()
            .map(|artist| artist.name.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        self.delete_by_key(&track.uri);
        let mut doc = TantivyDocument::new();
        doc.add_text(self.fields.uri, &track.uri);
        doc.add_text(self.fields.doc_type, TYPE_TRACK);
        doc.add_text(self.fields.parent, parent);
        doc.add_text(self.fields.pathname, pathname);
        doc.add_text(self.fields.name, &track.name);
        doc.add_text(self.fields.album, &track.album.name);
        doc.add_text(self.fields.artists, &artists);
        doc.add_text(self.fields.content, content);
        doc.add_bytes(self.fields.payload, payload);
        self.inner.add_document(doc)?;
        Ok(())
    }

    pub fn upsert_directory(
        &mut self,
        uri: &str,
        parent: &str,
        pathname: &str,
    ) -> Result<(), LibraryError> {
        self.delete_by_key(uri);
        let mut doc = TantivyDocument::new();
        doc.add_text(self.fields.uri, uri);
        doc.add_text(self.fields.doc_type, TYPE_DIRECTORY);
        doc.add_text(self.fields.parent, parent);
        doc.add_text(self.fields.pathname, pathname);
        self.inner.add_document(doc)?;
        Ok(())
    }

    pub fn delete_by_key(&mut self, uri: &str) {
        self.inner
            .delete_term(Term::from_field_text(self.fields.uri, uri));
    }

    /// Makes pending mutations durable. The fast path leaves segment layout
    /// to the engine's background merge policy; `optimize` additionally
    /// merges all committed segments and waits, reclaiming space before a
    /// session ends.
    pub fn commit(&mut self, optimize: bool) -> Result<(), LibraryError> {
        self.inner.commit().map_err(LibraryError::Commit)?;
        if optimize {
            let segments = self
                .index
                .searchable_segment_ids()
                .map_err(LibraryError::Commit)?;
            if segments.len() > 1 {
                self.inner
                    .merge(&segments)
                    .wait()
                    .map_err(LibraryError::Commit)?;
            }
        }
        Ok(())
    }
}

pub(crate) fn text_field<'a>(doc: &'a TantivyDocument, field: Field) -> &'a str {
    doc.get_first(field)
        .and_then(|value| value.as_str())
        .unwrap_or("")
}

pub(crate) fn decode_payload(doc: &TantivyDocument, field: Field) -> Result<Track, LibraryError> {
    let bytes = doc
        .get_first(field)
        .and_then(|value| value.as_bytes())
        .ok_or_else(|| {
            LibraryError::Payload(Box::new(bincode::ErrorKind::Custom(
                "stored track payload missing".to_string(),
            )))
        })?;
    Ok(bincode::deserialize(bytes)?)
}
