//! In-memory [`VectorStore`] implementation for tests.
//!
//! Uses a `HashMap` keyed by chunk id behind `std::sync::RwLock`. Query is
//! brute-force cosine similarity over all stored records, which matches
//! the production backend's ranking semantics exactly.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::PipelineError;

use super::{cosine_similarity, ChunkRecord, MetadataFilter, ScoredChunk, VectorStore};

/// In-memory store; upsert-by-id, no persistence.
pub struct InMemoryStore {
    records: RwLock<HashMap<String, ChunkRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored records (test helper).
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<(), PipelineError> {
        let mut stored = self.records.write().unwrap();
        for record in records {
            stored.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredChunk>, PipelineError> {
        let stored = self.records.read().unwrap();
        let mut scored: Vec<ScoredChunk> = stored
            .values()
            .filter(|r| filter.matches(&r.metadata))
            .map(|r| ScoredChunk {
                text: r.text.clone(),
                metadata: r.metadata.clone(),
                score: cosine_similarity(embedding, &r.embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn distinct_filenames(&self) -> Result<BTreeSet<String>, PipelineError> {
        let stored = self.records.read().unwrap();
        Ok(stored
            .values()
            .map(|r| r.metadata.filename.clone())
            .collect())
    }
}
