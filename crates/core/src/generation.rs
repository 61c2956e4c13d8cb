use crate::error::GenerationError;
use crate::grammar::{GrammarKind, GrammarLibrary};
use crate::traits::{ContextOptions, LanguageModel, SamplingOptions, Token, TokenStream};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const MAX_GENERATED_TOKENS: usize = 3072;
pub const CONTEXT_SIZE: usize = 8192;
pub const BATCH_SIZE: usize = 16384;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub sampling: SamplingOptions,
    pub context_size: usize,
    pub batch_size: usize,
    pub max_generated_tokens: usize,
    pub grammar: Option<GrammarKind>,
}

impl GenerationConfig {
    fn with_sampling(temperature: f32, top_p: f32, top_k: u32) -> Self {
        Self {
            sampling: SamplingOptions {
                temperature,
                top_p,
                top_k,
            },
            context_size: CONTEXT_SIZE,
            batch_size: BATCH_SIZE,
            max_generated_tokens: MAX_GENERATED_TOKENS,
            grammar: None,
        }
    }

    pub fn answer() -> Self {
        Self::with_sampling(0.4, 0.45, 40)
    }

    pub fn vocabulary() -> Self {
        Self::with_sampling(0.8, 0.95, 40)
    }

    pub fn steps(grammar: GrammarKind) -> Self {
        Self {
            grammar: Some(grammar),
            ..Self::with_sampling(0.8, 0.95, 40)
        }
    }
}

/// Phases of one generation call, as reported in tracing events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    Idle,
    ContextReady,
    Encoding,
    Generating,
    Decoding,
    Done,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Completed,
    TokenCap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutput {
    pub text: String,
    pub token_count: usize,
    pub stop_reason: StopReason,
}

/// Cloneable signal that aborts a running generation.
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

pub struct GenerationEngine {
    model: Arc<dyn LanguageModel>,
    grammars: GrammarLibrary,
}

impl GenerationEngine {
    pub fn new(model: Arc<dyn LanguageModel>, grammars: GrammarLibrary) -> Self {
        Self { model, grammars }
    }

    pub async fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
        cancel: &CancellationHandle,
    ) -> Result<GenerationOutput, GenerationError> {
        debug!(phase = ?GenerationPhase::Idle, grammar = ?config.grammar, "generation requested");
        let grammar = match config.grammar {
            Some(kind) => Some(self.grammars.load(kind).await?),
            None => None,
        };

        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }

        let context = self
            .model
            .create_context(ContextOptions {
                context_size: config.context_size,
                batch_size: config.batch_size,
                grammar,
            })
            .await?;
        debug!(phase = ?GenerationPhase::ContextReady, context_size = config.context_size, "context ready");

        let tokens = context.encode(prompt).await?;
        debug!(phase = ?GenerationPhase::Encoding, prompt_tokens = tokens.len(), "prompt encoded");
        if tokens.len() > config.context_size {
            warn!(
                phase = ?GenerationPhase::Rejected,
                prompt_tokens = tokens.len(),
                context_size = config.context_size,
                "prompt does not fit the context window"
            );
            return Err(GenerationError::PromptTooLong {
                tokens: tokens.len(),
                context_size: config.context_size,
            });
        }

        let stream = context.evaluate(tokens, config.sampling);
        debug!(phase = ?GenerationPhase::Generating, "generation started");
        let (generated, stop_reason) =
            collect_tokens(stream, config.max_generated_tokens, cancel).await?;

        debug!(phase = ?GenerationPhase::Decoding, tokens = generated.len(), "decoding");
        let text = context.decode(&generated).await?;

        info!(
            phase = ?GenerationPhase::Done,
            tokens = generated.len(),
            stop_reason = ?stop_reason,
            "generation finished"
        );
        Ok(GenerationOutput {
            text,
            token_count: generated.len(),
            stop_reason,
        })
    }
}

/// Drains `stream` until it ends or `cap` tokens have been collected. Never returns
/// more than `cap` tokens.
pub async fn collect_tokens(
    mut stream: TokenStream,
    cap: usize,
    cancel: &CancellationHandle,
) -> Result<(Vec<Token>, StopReason), GenerationError> {
    let mut tokens = Vec::new();

    while tokens.len() < cap {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            next = stream.next() => next,
        };

        match next {
            Some(token) => tokens.push(token?),
            None => return Ok((tokens, StopReason::Completed)),
        }
    }

    Ok((tokens, StopReason::TokenCap))
}
