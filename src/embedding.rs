//! Embedding abstraction and the local fastembed backend.
//!
//! The [`Embedder`] trait is the seam between the pipeline and the model:
//! ingestion embeds chunk batches, retrieval embeds single queries, and
//! tests substitute a deterministic stub. The production implementation
//! is [`LocalEmbedder`], which runs sentence-transformer models locally
//! via fastembed; models download on first use and are cached, so no
//! network access is needed afterwards.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::config::EmbeddingConfig;
use crate::error::PipelineError;

/// Maps text to fixed-dimensionality vectors.
///
/// For a fixed model the mapping is deterministic, and
/// `embed_one(t)` equals `embed_many([t])[0]` by construction.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;

    /// Embed a single text (e.g. a search query).
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let vectors = self.embed_many(&[text.to_string()]).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::EmbeddingFailed("empty embedding batch".to_string()))
    }

    /// Output vector dimensionality, fixed by the model.
    fn dims(&self) -> usize;
}

/// Resolve a configured model name to its fastembed model and dimensions.
///
/// Called at config load so an unknown name fails at startup rather than
/// on the first upload.
pub fn resolve_model(name: &str) -> Result<(fastembed::EmbeddingModel, usize), PipelineError> {
    match name {
        "all-minilm-l6-v2" => Ok((fastembed::EmbeddingModel::AllMiniLML6V2, 384)),
        "bge-small-en-v1.5" => Ok((fastembed::EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Ok((fastembed::EmbeddingModel::BGEBaseENV15, 768)),
        "bge-large-en-v1.5" => Ok((fastembed::EmbeddingModel::BGELargeENV15, 1024)),
        "nomic-embed-text-v1" => Ok((fastembed::EmbeddingModel::NomicEmbedTextV1, 768)),
        "nomic-embed-text-v1.5" => Ok((fastembed::EmbeddingModel::NomicEmbedTextV15, 768)),
        "multilingual-e5-small" => Ok((fastembed::EmbeddingModel::MultilingualE5Small, 384)),
        "multilingual-e5-base" => Ok((fastembed::EmbeddingModel::MultilingualE5Base, 768)),
        "multilingual-e5-large" => Ok((fastembed::EmbeddingModel::MultilingualE5Large, 1024)),
        other => Err(PipelineError::EmbeddingFailed(format!(
            "Unknown embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1, nomic-embed-text-v1.5, \
             multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
            other
        ))),
    }
}

/// Embedder backed by a locally-running fastembed model.
///
/// The model instance is constructed at most once per process: the first
/// call initializes it (concurrent first callers wait on the same
/// initialization), later calls reuse it. A failed initialization is not
/// cached; the next call retries. Inference takes `&mut self` on the
/// underlying model, so calls serialize on a mutex inside
/// `spawn_blocking`.
pub struct LocalEmbedder {
    model: fastembed::EmbeddingModel,
    model_name: String,
    dims: usize,
    batch_size: usize,
    instance: OnceCell<Arc<Mutex<fastembed::TextEmbedding>>>,
}

impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, PipelineError> {
        let (model, dims) = resolve_model(&config.model)?;
        Ok(Self {
            model,
            model_name: config.model.clone(),
            dims,
            batch_size: config.batch_size,
            instance: OnceCell::new(),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn instance(&self) -> Result<Arc<Mutex<fastembed::TextEmbedding>>, PipelineError> {
        self.instance
            .get_or_try_init(|| async {
                let model = self.model.clone();
                let name = self.model_name.clone();
                tracing::info!(model = %name, "initializing embedding model");
                let text_model = tokio::task::spawn_blocking(move || {
                    fastembed::TextEmbedding::try_new(
                        fastembed::InitOptions::new(model).with_show_download_progress(true),
                    )
                })
                .await
                .map_err(|e| PipelineError::EmbeddingFailed(e.to_string()))?
                .map_err(|e| {
                    PipelineError::EmbeddingFailed(format!(
                        "failed to initialize embedding model '{}': {}",
                        name, e
                    ))
                })?;
                Ok(Arc::new(Mutex::new(text_model)))
            })
            .await
            .map(Arc::clone)
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let instance = self.instance().await?;
        let texts = texts.to_vec();
        let batch_size = self.batch_size;

        tokio::task::spawn_blocking(move || {
            let mut model = instance.lock().unwrap();
            model.embed(texts, Some(batch_size)).map_err(|e| {
                PipelineError::EmbeddingFailed(format!("embedding inference failed: {}", e))
            })
        })
        .await
        .map_err(|e| PipelineError::EmbeddingFailed(e.to_string()))?
    }

    fn dims(&self) -> usize {
        self.dims
    }
}
