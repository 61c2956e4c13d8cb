use crate::chunking::ChunkingConfig;
use crate::config::PipelineConfig;
use crate::embeddings::Embedder;
use crate::error::{EmbeddingError, IndexError, PipelineError, Result};
use crate::generation::{CancellationHandle, GenerationConfig, GenerationEngine};
use crate::grammar::GrammarKind;
use crate::models::{Language, Source};
use crate::prompt::{compose, PromptKind};
use crate::retrieval::{retrieve, RetrievedContext, ANSWER_TOP_K, VOCABULARY_TOP_K};
use crate::steps::postprocess_clip_steps;
use crate::store::{absorb, IndexStore};
use crate::traits::LanguageModel;
use crate::vector_store::{SourceIndex, WorkingVectorStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct AnswerRequest {
    pub prompt: String,
    pub files: Vec<Source>,
    pub text: Option<String>,
    pub language: Language,
}

#[derive(Debug, Clone, Default)]
pub struct StepsRequest {
    pub subtitles: String,
    pub with_description: bool,
    pub with_clips: bool,
    pub language: Language,
}

/// Retrieval state owned by exactly one request.
#[derive(Debug, Default)]
pub struct RequestContext {
    store: Option<WorkingVectorStore>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, index: SourceIndex) -> Result<(), IndexError> {
        absorb(&mut self.store, index)
    }

    pub fn store(&self) -> Option<&WorkingVectorStore> {
        self.store.as_ref()
    }

    pub async fn retrieve(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        top_k: usize,
    ) -> Result<RetrievedContext, EmbeddingError> {
        match &self.store {
            Some(store) => retrieve(store, embedder, query, top_k).await,
            None => Ok(RetrievedContext::default()),
        }
    }
}

/// Sequences ingestion, retrieval, prompt composition and generation per request.
/// The index store and the model are shared; every call builds its own [`RequestContext`].
pub struct Coordinator {
    index_store: IndexStore,
    engine: GenerationEngine,
}

impl Coordinator {
    pub fn new(index_store: IndexStore, engine: GenerationEngine) -> Self {
        Self {
            index_store,
            engine,
        }
    }

    pub fn from_config(
        config: &PipelineConfig,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self::new(
            IndexStore::new(&config.data_dir, embedder),
            GenerationEngine::new(model, config.grammar_library()),
        )
    }

    /// Answers a question over the attached files and an optional note.
    pub async fn answer(&self, request: AnswerRequest, cancel: &CancellationHandle) -> Result<String> {
        require(&request.prompt, "prompt")?;
        let chunking = ChunkingConfig::ANSWER;

        let mut context = self.ingest(&request.files, chunking).await?;
        if let Some(text) = request.text.as_deref().filter(|text| !text.trim().is_empty()) {
            let note = Source::note(text, Utc::now());
            info!(source = %note.name, "indexing note");
            context.absorb(self.index_store.ephemeral(&note, chunking).await?)?;
        }

        let retrieved = context
            .retrieve(self.index_store.embedder(), &request.prompt, ANSWER_TOP_K)
            .await?;
        let prompt = compose(&request.prompt, &retrieved, request.language, PromptKind::Answer);
        let output = self
            .engine
            .generate(&prompt, &GenerationConfig::answer(), cancel)
            .await?;
        Ok(output.text)
    }

    /// Builds a vocabulary from short passages of the attached files.
    pub async fn vocabulary_from_files(
        &self,
        prompt: &str,
        files: &[Source],
        language: Language,
        cancel: &CancellationHandle,
    ) -> Result<String> {
        require(prompt, "prompt")?;
        if files.is_empty() {
            return Err(PipelineError::Validation("no files attached".to_string()));
        }

        let context = self.ingest(files, ChunkingConfig::VOCABULARY).await?;
        let retrieved = context
            .retrieve(self.index_store.embedder(), prompt, VOCABULARY_TOP_K)
            .await?;
        self.vocabulary_with(prompt, &retrieved, language, cancel).await
    }

    /// Builds a vocabulary from information supplied inline by the caller.
    pub async fn vocabulary(
        &self,
        prompt: &str,
        extra_info: &str,
        language: Language,
        cancel: &CancellationHandle,
    ) -> Result<String> {
        require(prompt, "prompt")?;
        self.vocabulary_with(prompt, &RetrievedContext::inline(extra_info), language, cancel)
            .await
    }

    /// Turns subtitles into a grammar-constrained step list.
    pub async fn generate_steps(&self, request: StepsRequest, cancel: &CancellationHandle) -> Result<String> {
        require(&request.subtitles, "subtitles")?;

        let kind = PromptKind::Steps {
            with_description: request.with_description,
            with_clips: request.with_clips,
        };
        let grammar = GrammarKind::from_flags(request.with_description, request.with_clips);
        let prompt = compose(
            &request.subtitles,
            &RetrievedContext::default(),
            request.language,
            kind,
        );

        let output = self
            .engine
            .generate(&prompt, &GenerationConfig::steps(grammar), cancel)
            .await?;

        if request.with_clips {
            Ok(postprocess_clip_steps(&output.text)?)
        } else {
            Ok(output.text)
        }
    }

    async fn vocabulary_with(
        &self,
        prompt: &str,
        retrieved: &RetrievedContext,
        language: Language,
        cancel: &CancellationHandle,
    ) -> Result<String> {
        let prompt = compose(prompt, retrieved, language, PromptKind::Vocabulary);
        let output = self
            .engine
            .generate(&prompt, &GenerationConfig::vocabulary(), cancel)
            .await?;
        Ok(output.text)
    }

    async fn ingest(&self, files: &[Source], chunking: ChunkingConfig) -> Result<RequestContext> {
        let store = self.index_store.ingest_batch(files, chunking).await?;
        Ok(RequestContext { store })
    }
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PipelineError::Validation(format!("{field} is empty")));
    }
    Ok(())
}
