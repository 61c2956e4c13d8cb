use crate::error::GenerationError;
use async_trait::async_trait;
use futures::stream::BoxStream;

pub type Token = u32;

/// Lazy, finite sequence of generated tokens. Dropping it stops the producer.
pub type TokenStream = BoxStream<'static, Result<Token, GenerationError>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextOptions {
    pub context_size: usize,
    pub batch_size: usize,
    pub grammar: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

/// A loaded model, shared read-only across requests.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn create_context(
        &self,
        options: ContextOptions,
    ) -> Result<Box<dyn ModelContext>, GenerationError>;
}

/// Evaluation state for a single generation call.
#[async_trait]
pub trait ModelContext: Send + Sync {
    async fn encode(&self, text: &str) -> Result<Vec<Token>, GenerationError>;

    fn evaluate(&self, prompt: Vec<Token>, sampling: SamplingOptions) -> TokenStream;

    async fn decode(&self, tokens: &[Token]) -> Result<String, GenerationError>;
}
