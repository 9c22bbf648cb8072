//! Error types for the document pipeline.
//!
//! Every fallible boundary in the pipeline (input validation, the vector
//! store, the embedder, the generation client) maps onto one of the
//! [`PipelineError`] variants. The HTTP layer translates variants into
//! status codes; the CLI reports them through `anyhow`.

/// Error type for pipeline operations.
///
/// The variant, not the message text, determines how callers react:
/// `InvalidInput` is the caller's fault and carries a user-facing message,
/// the others carry internal detail intended for logs.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The request itself is unacceptable (empty query, unsupported file
    /// type, document with no extractable text). The message is shown to
    /// the user verbatim.
    #[error("{0}")]
    InvalidInput(String),

    /// The vector store could not be opened or a store operation failed.
    #[error("document store unavailable: {0}")]
    StoreUnavailable(String),

    /// Embedding model initialization or inference failed.
    #[error("embedding failed: {0}")]
    EmbeddingFailed(String),

    /// The generation backend failed or returned an unusable response.
    /// Never surfaced to users directly; the answer composer recovers it
    /// into a fixed fallback answer.
    #[error("generation failed: {0}")]
    GenerationFailed(String),
}
