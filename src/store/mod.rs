//! Vector storage abstraction.
//!
//! The [`VectorStore`] trait defines the persistence operations the
//! pipeline needs: upserting chunk records, ranking candidates by cosine
//! similarity against a query embedding, and listing the stored
//! documents. Backends are pluggable (SQLite for production, in-memory
//! for tests).
//!
//! Implementations must be `Send + Sync` to be shared across request
//! handlers.

pub mod memory;
pub mod sqlite;

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::PipelineError;

/// Metadata stored alongside every chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMetadata {
    /// Original filename of the uploaded document.
    pub filename: String,
    /// Ordinal position of the chunk within its document.
    pub chunk_index: usize,
}

/// One embedded chunk, keyed by its id.
///
/// Ids are derived as `"<filename>_<index>"` at ingestion time, so
/// re-uploading a file overwrites the records it collides with.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Candidate predicate applied before similarity ranking.
///
/// Filtering happens logically before top-k selection: a record excluded
/// by the filter can never displace an included one from the results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataFilter {
    /// No restriction; every stored record is a candidate.
    All,
    /// Only records whose filename is in the set are candidates.
    FilenameIn(BTreeSet<String>),
}

impl MetadataFilter {
    /// Build the filter from a request's filename allow-list. An empty
    /// list means "search all documents", not "match nothing".
    pub fn from_filenames(filenames: &[String]) -> Self {
        if filenames.is_empty() {
            Self::All
        } else {
            Self::FilenameIn(filenames.iter().cloned().collect())
        }
    }

    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        match self {
            Self::All => true,
            Self::FilenameIn(names) => names.contains(&metadata.filename),
        }
    }
}

/// A ranked query result.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine similarity to the query embedding.
    pub score: f32,
}

/// Abstract vector storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorStore::upsert) | Insert or overwrite chunk records by id |
/// | [`query`](VectorStore::query) | Top-k cosine ranking over filtered candidates |
/// | [`distinct_filenames`](VectorStore::distinct_filenames) | List stored documents |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite chunk records.
    ///
    /// Each record carries its own id, embedding, text, and metadata.
    /// Upserting a record whose id already exists replaces the stored row,
    /// so re-ingesting identical chunks is idempotent.
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<(), PipelineError>;

    /// Return up to `k` chunks ordered by descending cosine similarity to
    /// `embedding`, considering only candidates accepted by `filter`.
    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredChunk>, PipelineError>;

    /// Every distinct filename present in the store, sorted.
    async fn distinct_filenames(&self) -> Result<BTreeSet<String>, PipelineError>;
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors, vectors of
/// different lengths, or zero-magnitude vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
