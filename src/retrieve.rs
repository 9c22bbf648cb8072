//! Query-time retrieval: embed the question and pull the most similar
//! chunks from the store.

use crate::embedding::Embedder;
use crate::error::PipelineError;
use crate::store::{MetadataFilter, VectorStore};

/// Retrieve up to `k` chunk texts relevant to `query`, most similar first.
///
/// When `filenames` is non-empty, only chunks from those documents are
/// candidates; the restriction applies before ranking, so a filtered
/// query never loses a matching chunk to a better-scoring excluded one.
/// An empty store, or a filter nothing passes, yields an empty list
/// rather than an error.
pub async fn retrieve_context(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    query: &str,
    k: usize,
    filenames: &[String],
) -> Result<Vec<String>, PipelineError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(PipelineError::InvalidInput(
            "Query cannot be empty.".to_string(),
        ));
    }

    let embedding = embedder.embed_one(query).await?;
    let filter = MetadataFilter::from_filenames(filenames);
    let hits = store.query(&embedding, k, &filter).await?;

    tracing::debug!(
        query_len = query.len(),
        hits = hits.len(),
        "retrieved context chunks"
    );

    Ok(hits.into_iter().map(|hit| hit.text).collect())
}
