//! SQLite-backed [`VectorStore`].
//!
//! Chunk records live in a single `chunks` table scoped by a collection
//! name, with embeddings stored as little-endian `f32` BLOBs. Similarity
//! ranking loads the candidate rows (optionally restricted by filename in
//! SQL) and computes cosine similarity in Rust. Brute force, which is
//! fine at the document-collection scale this serves.

use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::error::PipelineError;

use super::{cosine_similarity, ChunkMetadata, ChunkRecord, MetadataFilter, ScoredChunk, VectorStore};

/// Persistent vector store over a SQLite database file.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    collection: String,
}

impl SqliteVectorStore {
    /// Open (or create) the database at `path` and ensure the schema
    /// exists. Idempotent: opening an existing store is a no-op beyond
    /// connecting.
    pub async fn open(path: &Path, collection: &str) -> Result<Self, PipelineError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(store_err)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(store_err)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(store_err)?;

        run_migrations(&pool).await?;

        Ok(Self {
            pool,
            collection: collection.to_string(),
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn store_err(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::StoreUnavailable(e.to_string())
}

async fn run_migrations(pool: &SqlitePool) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            collection TEXT NOT NULL,
            chunk_id TEXT NOT NULL,
            filename TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            PRIMARY KEY (collection, chunk_id)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(store_err)?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chunks_collection_filename ON chunks (collection, filename)",
    )
    .execute(pool)
    .await
    .map_err(store_err)?;

    Ok(())
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<(), PipelineError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO chunks (collection, chunk_id, filename, chunk_index, text, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, chunk_id) DO UPDATE SET
                    filename = excluded.filename,
                    chunk_index = excluded.chunk_index,
                    text = excluded.text,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&self.collection)
            .bind(&record.id)
            .bind(&record.metadata.filename)
            .bind(record.metadata.chunk_index as i64)
            .bind(&record.text)
            .bind(vec_to_blob(&record.embedding))
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredChunk>, PipelineError> {
        let mut sql = String::from(
            "SELECT filename, chunk_index, text, embedding FROM chunks WHERE collection = ?",
        );
        if let MetadataFilter::FilenameIn(names) = filter {
            if names.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; names.len()].join(", ");
            sql.push_str(&format!(" AND filename IN ({})", placeholders));
        }

        let mut query = sqlx::query(&sql).bind(&self.collection);
        if let MetadataFilter::FilenameIn(names) = filter {
            for name in names {
                query = query.bind(name);
            }
        }

        let rows = query.fetch_all(&self.pool).await.map_err(store_err)?;

        let mut scored: Vec<ScoredChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let stored = blob_to_vec(&blob);
                let chunk_index: i64 = row.get("chunk_index");
                ScoredChunk {
                    text: row.get("text"),
                    metadata: ChunkMetadata {
                        filename: row.get("filename"),
                        chunk_index: chunk_index as usize,
                    },
                    score: cosine_similarity(embedding, &stored),
                }
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
        let rows = sqlx::query("SELECT DISTINCT filename FROM chunks WHERE collection = ?")
            .bind(&self.collection)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(rows.iter().map(|row| row.get("filename")).collect())
    }
}

/// Encode a float vector as little-endian `f32` bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`] back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
