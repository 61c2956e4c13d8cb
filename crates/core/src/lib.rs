pub mod backends;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod grammar;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod prompt;
pub mod retrieval;
pub mod steps;
pub mod store;
pub mod traits;
pub mod vector_store;

#[cfg(test)]
pub(crate) mod testing;

pub use backends::{LlamaServerEmbedder, LlamaServerModel};
pub use chunking::{split_documents, split_text, ChunkingConfig};
pub use config::PipelineConfig;
pub use embeddings::{check_dimensions, cosine_similarity, Embedder};
pub use error::{
    EmbeddingError, ErrorKind, GenerationError, IndexError, IngestError, PipelineError,
};
pub use extractor::{load_source, DocumentKind, DocumentLoader};
pub use generation::{
    CancellationHandle, GenerationConfig, GenerationEngine, GenerationOutput, StopReason,
};
pub use grammar::{GrammarKind, GrammarLibrary};
pub use ingest::{discover_sources, read_source_file, UploadStore};
pub use models::{Chunk, DocumentLocation, Language, LoadedDocument, Source, SourceName};
pub use orchestrator::{AnswerRequest, Coordinator, RequestContext, StepsRequest};
pub use prompt::{compose, PromptKind};
pub use retrieval::{retrieve, RetrievedContext};
pub use store::IndexStore;
pub use traits::{ContextOptions, LanguageModel, ModelContext, SamplingOptions, Token, TokenStream};
pub use vector_store::{ScoredChunk, SourceIndex, WorkingVectorStore};
