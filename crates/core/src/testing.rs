use crate::embeddings::Embedder;
use crate::error::{EmbeddingError, GenerationError};
use crate::traits::{ContextOptions, LanguageModel, ModelContext, SamplingOptions, Token, TokenStream};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Offline embedder: counts hashed character trigrams and normalizes the counts.
#[derive(Debug, Clone, Copy)]
pub struct TrigramEmbedder {
    pub dimensions: usize,
}

impl Default for TrigramEmbedder {
    fn default() -> Self {
        Self { dimensions: 128 }
    }
}

#[async_trait]
impl Embedder for TrigramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0f32; self.dimensions];
        let chars: Vec<char> = text.to_lowercase().chars().collect();

        for trigram in chars.windows(3) {
            let mut hasher = DefaultHasher::new();
            trigram.hash(&mut hasher);
            vector[(hasher.finish() % self.dimensions as u64) as usize] += 1.0;
        }

        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|value| *value /= norm);
        }
        Ok(vector)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Emits each piece once, then completes.
    Finite,
    /// Cycles through the pieces forever.
    Endless,
    /// Never yields a token.
    Stalled,
}

/// Scripted model: one token per whitespace-separated prompt word, and each generated
/// token `n` decodes to `pieces[n % pieces.len()]`.
#[derive(Clone)]
pub struct ScriptedModel {
    pieces: Arc<Vec<String>>,
    script: Script,
    pub evaluations: Arc<AtomicUsize>,
    pub contexts: Arc<Mutex<Vec<ContextOptions>>>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedModel {
    pub fn new(pieces: &[&str], script: Script) -> Self {
        Self {
            pieces: Arc::new(pieces.iter().map(|piece| piece.to_string()).collect()),
            script,
            evaluations: Arc::new(AtomicUsize::new(0)),
            contexts: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn evaluation_count(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }

    pub fn last_context(&self) -> Option<ContextOptions> {
        self.contexts.lock().ok()?.last().cloned()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().ok()?.last().cloned()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn create_context(
        &self,
        options: ContextOptions,
    ) -> Result<Box<dyn ModelContext>, GenerationError> {
        if let Ok(mut contexts) = self.contexts.lock() {
            contexts.push(options);
        }
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl ModelContext for ScriptedModel {
    async fn encode(&self, text: &str) -> Result<Vec<Token>, GenerationError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(text.to_string());
        }
        Ok(text.split_whitespace().map(|word| word.len() as Token).collect())
    }

    fn evaluate(&self, _prompt: Vec<Token>, _sampling: SamplingOptions) -> TokenStream {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        let count = self.pieces.len() as Token;
        match self.script {
            Script::Finite => futures::stream::iter((0..count).map(Ok)).boxed(),
            Script::Endless => futures::stream::iter((0..).map(Ok)).boxed(),
            Script::Stalled => futures::stream::pending().boxed(),
        }
    }

    async fn decode(&self, tokens: &[Token]) -> Result<String, GenerationError> {
        if self.pieces.is_empty() {
            return Ok(String::new());
        }
        Ok(tokens
            .iter()
            .map(|token| self.pieces[*token as usize % self.pieces.len()].as_str())
            .collect())
    }
}
