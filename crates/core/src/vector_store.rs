use crate::embeddings::{check_dimensions, cosine_similarity, Embedder};
use crate::error::{EmbeddingError, IndexError};
use crate::models::{Chunk, SourceName};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// The embedded chunks of exactly one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceIndex {
    pub source: SourceName,
    pub dimensions: usize,
    pub entries: Vec<IndexEntry>,
}

impl SourceIndex {
    pub async fn build(
        source: SourceName,
        chunks: Vec<Chunk>,
        embedder: &dyn Embedder,
    ) -> Result<Self, EmbeddingError> {
        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(EmbeddingError::BackendResponse {
                backend: "embedder".to_string(),
                details: format!("{} vectors for {} chunks", embeddings.len(), chunks.len()),
            });
        }
        for embedding in &embeddings {
            check_dimensions(embedding, embedder.dimensions())?;
        }

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();

        Ok(Self {
            source,
            dimensions: embedder.dimensions(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub score: f32,
    pub chunk: Chunk,
}

/// Union of the source indices one request retrieves from.
#[derive(Debug, Clone)]
pub struct WorkingVectorStore {
    dimensions: usize,
    sources: Vec<SourceName>,
    entries: Vec<IndexEntry>,
}

impl WorkingVectorStore {
    /// Initializes the store from the first index of a request.
    pub fn from_index(index: SourceIndex) -> Self {
        Self {
            dimensions: index.dimensions,
            sources: vec![index.source],
            entries: index.entries,
        }
    }

    /// Appends every vector of `addition`. Duplicate content across sources is kept.
    pub fn merge(&mut self, addition: SourceIndex) -> Result<(), IndexError> {
        if addition.dimensions != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                found: addition.dimensions,
            });
        }

        self.sources.push(addition.source);
        self.entries.extend(addition.entries);
        Ok(())
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn sources(&self) -> &[SourceName] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exhaustive cosine search. Equal scores keep insertion order.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(query, &entry.embedding), entry))
            .collect();

        scored.sort_by(|left, right| right.0.total_cmp(&left.0));

        scored
            .into_iter()
            .take(top_k)
            .map(|(score, entry)| ScoredChunk {
                score,
                chunk: entry.chunk.clone(),
            })
            .collect()
    }
}
