//! Grounded answer composition.
//!
//! Takes the retrieved context chunks and the user's question, builds the
//! grounding prompt, and asks the generator. Generation problems never
//! escape this layer: every degraded path collapses to a fixed sentinel
//! answer so callers always get a string to show.

use crate::generate::Generator;

/// Returned when retrieval produced no context at all.
pub const NO_CONTEXT_ANSWER: &str =
    "No relevant information found in the uploaded documents for your query.";

/// Returned when the model answered with empty or blank text.
pub const EMPTY_GENERATION_ANSWER: &str = "No answer available.";

/// Returned when the generation call itself failed.
pub const GENERATION_FAILED_ANSWER: &str = "An error occurred while generating the response.";

/// Build the grounding prompt that restricts the model to the retrieved
/// context.
pub fn build_prompt(query: &str, context_chunks: &[String]) -> String {
    let context = context_chunks.join("\n\n");
    format!(
        "Based ONLY on the following context:\n\n{}\n\nAnswer the following question:\n{}\n\nAnswer:",
        context, query
    )
}

/// Compose the final answer for `query` from `context_chunks`.
///
/// With no context the generator is not called at all and the no-context
/// sentinel is returned. Otherwise the generator runs once; a failure is
/// logged and mapped to [`GENERATION_FAILED_ANSWER`], a blank completion
/// to [`EMPTY_GENERATION_ANSWER`].
pub async fn compose_answer(
    generator: &dyn Generator,
    query: &str,
    context_chunks: &[String],
) -> String {
    if context_chunks.is_empty() {
        return NO_CONTEXT_ANSWER.to_string();
    }

    let prompt = build_prompt(query, context_chunks);
    match generator.generate(&prompt).await {
        Ok(text) if text.trim().is_empty() => EMPTY_GENERATION_ANSWER.to_string(),
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "answer generation failed");
            GENERATION_FAILED_ANSWER.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedGenerator {
        reply: Result<String, ()>,
        calls: AtomicUsize,
    }

    impl CannedGenerator {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Generator for CannedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .clone()
                .map_err(|_| PipelineError::GenerationFailed("canned failure".to_string()))
        }
    }

    #[test]
    fn prompt_embeds_context_and_query() {
        let prompt = build_prompt(
            "What is Rust?",
            &["first chunk".to_string(), "second chunk".to_string()],
        );
        assert_eq!(
            prompt,
            "Based ONLY on the following context:\n\nfirst chunk\n\nsecond chunk\n\n\
             Answer the following question:\nWhat is Rust?\n\nAnswer:"
        );
    }

    #[tokio::test]
    async fn no_context_short_circuits_without_generation() {
        let generator = CannedGenerator::ok("should not be used");
        let answer = compose_answer(&generator, "anything", &[]).await;
        assert_eq!(answer, NO_CONTEXT_ANSWER);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_generation_passes_through() {
        let generator = CannedGenerator::ok("Rust is a systems language.");
        let answer =
            compose_answer(&generator, "What is Rust?", &["context chunk".to_string()]).await;
        assert_eq!(answer, "Rust is a systems language.");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_generation_maps_to_sentinel() {
        let generator = CannedGenerator::ok("   \n ");
        let answer = compose_answer(&generator, "q", &["context chunk".to_string()]).await;
        assert_eq!(answer, EMPTY_GENERATION_ANSWER);
    }

    #[tokio::test]
    async fn failed_generation_maps_to_sentinel() {
        let generator = CannedGenerator::failing();
        let answer = compose_answer(&generator, "q", &["context chunk".to_string()]).await;
        assert_eq!(answer, GENERATION_FAILED_ANSWER);
    }
}
