use crate::error::EmbeddingError;
use async_trait::async_trait;

/// Embedding provider shared read-only by every request.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Fails unless `vector` has the embedder's width.
pub fn check_dimensions(vector: &[f32], expected: usize) -> Result<(), EmbeddingError> {
    if vector.len() != expected {
        return Err(EmbeddingError::Dimensions {
            expected,
            found: vector.len(),
        });
    }
    Ok(())
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }

    let (dot, left_sq, right_sq) = left.iter().zip(right).fold(
        (0f32, 0f32, 0f32),
        |(dot, left_sq, right_sq), (a, b)| (dot + a * b, left_sq + a * a, right_sq + b * b),
    );

    let norms = left_sq.sqrt() * right_sq.sqrt();
    if norms == 0.0 {
        0.0
    } else {
        dot / norms
    }
}
