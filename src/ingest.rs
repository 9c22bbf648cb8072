//! Document ingestion pipeline.
//!
//! Coordinates the full flow for one uploaded document: format check →
//! text extraction → chunking → embedding → storage. Nothing is written
//! to the store until every earlier stage has succeeded, so a rejected
//! upload leaves the index untouched.

use std::path::Path;

use crate::chunk::chunk_text;
use crate::config::ChunkingConfig;
use crate::embedding::Embedder;
use crate::error::PipelineError;
use crate::extract::{extract_text, DocumentFormat};
use crate::store::{ChunkMetadata, ChunkRecord, VectorStore};

/// What a successful ingestion produced, for CLI and server messages.
#[derive(Debug)]
pub struct IngestOutcome {
    pub filename: String,
    pub chunks: usize,
}

/// Ingest the document at `path`, indexing it under `filename`.
///
/// Chunk ids are `"<filename>_<index>"`, so re-ingesting a filename
/// overwrites its chunks in place.
pub async fn ingest_document(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    chunking: &ChunkingConfig,
    filename: &str,
    path: &Path,
) -> Result<IngestOutcome, PipelineError> {
    let format = DocumentFormat::from_filename(filename)?;
    let text = extract_text(path, format)?;
    if text.trim().is_empty() {
        return Err(PipelineError::InvalidInput(
            "Could not extract text from the document.".to_string(),
        ));
    }

    let chunks = chunk_text(&text, chunking.size, chunking.overlap);
    if chunks.is_empty() {
        return Err(PipelineError::InvalidInput(
            "Failed to process text chunks.".to_string(),
        ));
    }

    let embeddings = embedder.embed_many(&chunks).await?;
    if embeddings.len() != chunks.len() {
        return Err(PipelineError::EmbeddingFailed(format!(
            "model returned {} embeddings for {} chunks",
            embeddings.len(),
            chunks.len()
        )));
    }

    let records: Vec<ChunkRecord> = chunks
        .into_iter()
        .zip(embeddings)
        .enumerate()
        .map(|(index, (text, embedding))| ChunkRecord {
            id: format!("{}_{}", filename, index),
            text,
            embedding,
            metadata: ChunkMetadata {
                filename: filename.to_string(),
                chunk_index: index,
            },
        })
        .collect();

    store.upsert(&records).await?;

    tracing::info!(filename = %filename, chunks = records.len(), "document ingested");
    Ok(IngestOutcome {
        filename: filename.to_string(),
        chunks: records.len(),
    })
}
