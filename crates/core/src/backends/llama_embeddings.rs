use super::base_url;
use crate::embeddings::{check_dimensions, Embedder};
use crate::error::EmbeddingError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

const BACKEND: &str = "llama-server embeddings";
const BATCH_SIZE: usize = 32;

/// Embeddings served by a llama.cpp-compatible server started with `--embedding`,
/// through its OpenAI-style `/v1/embeddings` route.
#[derive(Debug, Clone)]
pub struct LlamaServerEmbedder {
    endpoint: Url,
    client: Client,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl LlamaServerEmbedder {
    /// Connects to `endpoint` and learns the embedding width from one request.
    pub async fn connect(endpoint: &str) -> Result<Self, EmbeddingError> {
        let mut embedder = Self {
            endpoint: base_url(endpoint)?,
            client: Client::new(),
            dimensions: 0,
        };

        let width = embedder
            .request(&["dimensions"])
            .await?
            .first()
            .map(Vec::len)
            .unwrap_or_default();
        if width == 0 {
            return Err(EmbeddingError::BackendResponse {
                backend: BACKEND.to_string(),
                details: "server returned an empty embedding".to_string(),
            });
        }

        embedder.dimensions = width;
        info!(endpoint = %embedder.endpoint, dimensions = width, "embedding server ready");
        Ok(embedder)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let response = self
            .client
            .post(self.endpoint.join("v1/embeddings")?)
            .json(&EmbeddingRequest { input: texts })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EmbeddingError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("embeddings returned {}", response.status()),
            });
        }

        order_embeddings(response.json().await?, texts.len())
    }
}

#[async_trait]
impl Embedder for LlamaServerEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let vector = self
            .request(&[text])
            .await?
            .pop()
            .unwrap_or_default();
        check_dimensions(&vector, self.dimensions)?;
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            for vector in self.request(batch).await? {
                check_dimensions(&vector, self.dimensions)?;
                vectors.push(vector);
            }
        }
        debug!(texts = texts.len(), "embedded batch");
        Ok(vectors)
    }
}

/// Puts the returned vectors back in input order; every input needs exactly one.
fn order_embeddings(
    response: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];

    for item in response.data {
        let slot = slots
            .get_mut(item.index)
            .filter(|slot| slot.is_none())
            .ok_or_else(|| EmbeddingError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("unexpected embedding index {}", item.index),
            })?;
        *slot = Some(item.embedding);
    }

    slots
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| EmbeddingError::BackendResponse {
            backend: BACKEND.to_string(),
            details: format!("expected {expected} embeddings"),
        })
}
