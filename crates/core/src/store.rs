use crate::chunking::ChunkingConfig;
use crate::embeddings::Embedder;
use crate::error::IndexError;
use crate::extractor::DocumentKind;
use crate::ingest::{chunk_source, UploadStore};
use crate::models::{Chunk, Source, SourceName};
use crate::vector_store::{SourceIndex, WorkingVectorStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const FILES_DIR: &str = "files";
const INDICES_DIR: &str = "indices";

/// Persists one index per source under `<data_dir>/indices`, next to the raw uploads in
/// `<data_dir>/files`. Holds no per-request state and can be shared freely.
#[derive(Clone)]
pub struct IndexStore {
    indices: PathBuf,
    uploads: UploadStore,
    embedder: Arc<dyn Embedder>,
}

impl IndexStore {
    pub fn new(data_dir: impl AsRef<Path>, embedder: Arc<dyn Embedder>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            indices: data_dir.join(INDICES_DIR),
            uploads: UploadStore::new(data_dir.join(FILES_DIR)),
            embedder,
        }
    }

    pub fn uploads(&self) -> &UploadStore {
        &self.uploads
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn index_path(&self, name: &SourceName) -> PathBuf {
        self.indices.join(format!("{}.json", name.as_str()))
    }

    pub async fn has_index(&self, name: &SourceName) -> Result<bool, IndexError> {
        Ok(tokio::fs::try_exists(self.index_path(name)).await?)
    }

    /// Embeds `chunks` and persists the resulting index.
    pub async fn build(&self, name: SourceName, chunks: Vec<Chunk>) -> Result<SourceIndex, IndexError> {
        let index = SourceIndex::build(name, chunks, self.embedder.as_ref()).await?;
        self.persist(&index).await?;
        Ok(index)
    }

    pub async fn load(&self, name: &SourceName) -> Result<SourceIndex, IndexError> {
        let path = self.index_path(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(IndexError::NotFound(name.to_string()));
            }
            Err(error) => return Err(error.into()),
        };

        let index: SourceIndex = serde_json::from_slice(&bytes)?;
        debug!(source = %name, chunks = index.len(), "index loaded");
        Ok(index)
    }

    async fn persist(&self, index: &SourceIndex) -> Result<(), IndexError> {
        tokio::fs::create_dir_all(&self.indices).await?;
        let path = self.index_path(&index.source);
        let staging = path.with_extension("json.tmp");

        tokio::fs::write(&staging, serde_json::to_vec(index)?).await?;
        tokio::fs::rename(&staging, &path).await?;
        info!(source = %index.source, chunks = index.len(), path = %path.display(), "index persisted");
        Ok(())
    }

    /// Returns the index for `source`, loading it when cached and building it otherwise.
    ///
    /// A raw upload without an index, or an index built with different embedding
    /// dimensions, is rebuilt from the stored upload.
    pub async fn resolve(&self, source: &Source, config: ChunkingConfig) -> Result<SourceIndex, IndexError> {
        if self.has_index(&source.name).await? {
            let index = self.load(&source.name).await?;
            if index.dimensions == self.embedder.dimensions() {
                info!(source = %source.name, "index cache hit");
                return Ok(index);
            }
            warn!(
                source = %source.name,
                cached = index.dimensions,
                expected = self.embedder.dimensions(),
                "cached index has stale dimensions, rebuilding"
            );
        }

        DocumentKind::from_name(&source.name)?;

        let stored = if self.uploads.exists(&source.name).await? {
            warn!(source = %source.name, "upload present without a usable index, rebuilding");
            Source::new(source.name.clone(), self.uploads.read(&source.name).await?)
        } else {
            self.uploads.write(source).await?;
            source.clone()
        };

        let chunks = chunk_source(&stored, config)?;
        self.build(stored.name, chunks).await
    }

    /// Indexes an ad-hoc note. The raw text is kept as an upload, the index only lives
    /// for the current request.
    pub async fn ephemeral(&self, source: &Source, config: ChunkingConfig) -> Result<SourceIndex, IndexError> {
        self.uploads.write(source).await?;
        let chunks = chunk_source(source, config)?;
        Ok(SourceIndex::build(source.name.clone(), chunks, self.embedder.as_ref()).await?)
    }

    /// Resolves every source of a batch into one working store.
    ///
    /// The first source initializes the store; each later one is merged into it. Any
    /// failure aborts the whole batch.
    pub async fn ingest_batch(
        &self,
        sources: &[Source],
        config: ChunkingConfig,
    ) -> Result<Option<WorkingVectorStore>, IndexError> {
        let mut store: Option<WorkingVectorStore> = None;

        for source in sources {
            let index = self.resolve(source, config).await?;
            absorb(&mut store, index)?;
        }

        Ok(store)
    }
}

/// Initializes `store` from `index` when empty, merges otherwise.
pub fn absorb(store: &mut Option<WorkingVectorStore>, index: SourceIndex) -> Result<(), IndexError> {
    match store {
        Some(existing) => existing.merge(index),
        None => {
            *store = Some(WorkingVectorStore::from_index(index));
            Ok(())
        }
    }
}
