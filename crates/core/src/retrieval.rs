use crate::embeddings::Embedder;
use crate::error::EmbeddingError;
use crate::vector_store::WorkingVectorStore;
use std::collections::HashSet;
use tracing::debug;

/// Passages of this many characters or fewer never reach a prompt.
pub const MIN_PASSAGE_CHARS: usize = 20;

/// Placed between passages when the context is rendered into a prompt.
pub const CONTEXT_SEPARATOR: &str = "\n";

pub const ANSWER_TOP_K: usize = 10;
pub const VOCABULARY_TOP_K: usize = 150;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievedContext {
    pub passages: Vec<String>,
}

impl RetrievedContext {
    /// Wraps caller-supplied text that bypassed retrieval.
    pub fn inline(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            Self::default()
        } else {
            Self {
                passages: vec![text.to_string()],
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn as_prompt_text(&self) -> String {
        self.passages.join(CONTEXT_SEPARATOR)
    }
}

/// Finds the `top_k` chunks closest to `query`, then drops short passages and exact
/// duplicates. Surviving passages keep their rank order.
pub async fn retrieve(
    store: &WorkingVectorStore,
    embedder: &dyn Embedder,
    query: &str,
    top_k: usize,
) -> Result<RetrievedContext, EmbeddingError> {
    let query_vector = embedder.embed(query).await?;
    let hits = store.search(&query_vector, top_k);
    let found = hits.len();

    let mut seen = HashSet::new();
    let passages: Vec<String> = hits
        .into_iter()
        .map(|hit| hit.chunk.text)
        .filter(|text| text.chars().count() > MIN_PASSAGE_CHARS)
        .filter(|text| seen.insert(text.clone()))
        .collect();

    debug!(top_k, found, kept = passages.len(), "retrieved context");
    Ok(RetrievedContext { passages })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, DocumentLocation, SourceName};
    use crate::testing::TrigramEmbedder;
    use crate::vector_store::SourceIndex;

    async fn store_of(name: &str, texts: &[&str]) -> WorkingVectorStore {
        let source = SourceName::new(name).expect("valid source name");
        let chunks = texts
            .iter()
            .enumerate()
            .map(|(ordinal, text)| Chunk {
                chunk_id: format!("{name}-{ordinal}"),
                source: source.clone(),
                ordinal: ordinal as u64,
                location: DocumentLocation::WholeFile,
                text: text.to_string(),
            })
            .collect();
        let index = SourceIndex::build(source, chunks, &TrigramEmbedder::default())
            .await
            .expect("trigram embedding");
        WorkingVectorStore::from_index(index)
    }

    #[tokio::test]
    async fn short_and_duplicate_passages_are_dropped() -> Result<(), EmbeddingError> {
        let store = store_of(
            "a.txt",
            &[
                "Sharpen the mower blades each spring.",
                "too short",
                "exactly twenty chars",
                "Sharpen the mower blades each spring.",
            ],
        )
        .await;

        let context = retrieve(&store, &TrigramEmbedder::default(), "mower blades", 10).await?;
        assert_eq!(context.passages, vec!["Sharpen the mower blades each spring."]);
        assert!(context
            .passages
            .iter()
            .all(|passage| passage.chars().count() > MIN_PASSAGE_CHARS));
        Ok(())
    }

    #[test]
    fn passages_are_joined_with_a_separator() {
        let context = RetrievedContext {
            passages: vec!["first passage".to_string(), "second passage".to_string()],
        };
        assert_eq!(context.as_prompt_text(), "first passage\nsecond passage");
    }

    #[tokio::test]
    async fn top_k_bounds_the_candidates() -> Result<(), EmbeddingError> {
        let texts: Vec<String> = (0..30)
            .map(|index| format!("Maintenance note number {index} about the generator."))
            .collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let store = store_of("notes.txt", &refs).await;

        let context = retrieve(&store, &TrigramEmbedder::default(), "generator", 5).await?;
        assert_eq!(context.passages.len(), 5);
        Ok(())
    }

    #[test]
    fn inline_context_ignores_blank_text() {
        assert!(RetrievedContext::inline("   ").is_empty());
        assert_eq!(RetrievedContext::inline(" keys ").passages, vec!["keys"]);
    }
}
