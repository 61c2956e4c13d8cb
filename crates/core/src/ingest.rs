use crate::chunking::{split_documents, ChunkingConfig};
use crate::error::IngestError;
use crate::extractor::{load_source, DocumentKind};
use crate::models::{Chunk, Source, SourceName};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Durable area holding raw uploads, keyed by source name.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, name: &SourceName) -> PathBuf {
        self.root.join(name.as_str())
    }

    pub async fn exists(&self, name: &SourceName) -> Result<bool, IngestError> {
        Ok(tokio::fs::try_exists(self.path_for(name)).await?)
    }

    /// Where an upload is staged before it is renamed into place.
    pub fn staging_path(&self, name: &SourceName) -> PathBuf {
        self.root.join(format!("{}.partial", name.as_str()))
    }

    /// Stages the bytes, then renames them over `path_for(name)`, so readers never see
    /// a truncated upload.
    pub async fn write(&self, source: &Source) -> Result<PathBuf, IngestError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path_for(&source.name);
        let staging = self.staging_path(&source.name);
        tokio::fs::write(&staging, &source.bytes).await?;
        tokio::fs::rename(&staging, &path).await?;
        debug!(source = %source.name, bytes = source.bytes.len(), "upload written");
        Ok(path)
    }

    pub async fn read(&self, name: &SourceName) -> Result<Vec<u8>, IngestError> {
        Ok(tokio::fs::read(self.path_for(name)).await?)
    }
}

/// Extracts and splits one source. The loader is picked from the source name.
pub fn chunk_source(source: &Source, config: ChunkingConfig) -> Result<Vec<Chunk>, IngestError> {
    let documents = load_source(&source.name, &source.bytes)?;
    let chunks = split_documents(&source.name, &documents, config);
    info!(
        source = %source.name,
        documents = documents.len(),
        chunks = chunks.len(),
        "source split"
    );
    Ok(chunks)
}

/// Reads a local file into a source named after its file name.
pub async fn read_source_file(path: &Path) -> Result<Source, IngestError> {
    let name = SourceName::new(path.to_string_lossy())?;
    let bytes = tokio::fs::read(path).await?;
    Ok(Source::new(name, bytes))
}

/// Every file under `folder` with a supported extension, sorted.
pub fn discover_sources(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let supported = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(DocumentKind::from_extension)
            .is_some();

        if supported {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn discover_sources_is_recursive_and_filters_types() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        fs::write(base.join("a.pdf"), b"%PDF-1.4\n%fake")?;
        fs::write(base.join("b.TXT"), b"text")?;
        fs::write(nested.join("c.csv"), b"h\nv")?;
        fs::write(nested.join("d.xlsx"), b"nope")?;

        let files = discover_sources(base);
        assert_eq!(files.len(), 3);
        assert!(files.windows(2).all(|pair| pair[0] <= pair[1]));
        Ok(())
    }

    #[tokio::test]
    async fn upload_store_round_trips_bytes() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let uploads = UploadStore::new(dir.path().join("files"));
        let source = Source::new(SourceName::new("manual.txt")?, "Oil every 50 hours.");

        assert!(!uploads.exists(&source.name).await?);
        uploads.write(&source).await?;
        assert!(uploads.exists(&source.name).await?);
        assert_eq!(uploads.read(&source.name).await?, source.bytes);

        let replaced = Source::new(source.name.clone(), "Oil every 100 hours.");
        uploads.write(&replaced).await?;
        assert_eq!(uploads.read(&source.name).await?, replaced.bytes);
        assert!(!tokio::fs::try_exists(uploads.staging_path(&source.name)).await?);
        Ok(())
    }

    #[test]
    fn chunk_source_rejects_unsupported_types() -> Result<(), Box<dyn std::error::Error>> {
        let source = Source::new(SourceName::new("parts.csc")?, "part,qty\nbolt,4");
        let result = chunk_source(&source, ChunkingConfig::ANSWER);
        assert!(matches!(result, Err(IngestError::UnsupportedType(_))));
        Ok(())
    }

    #[tokio::test]
    async fn read_source_file_uses_the_file_name() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("notes.txt");
        fs::write(&path, "Grease the hinges.")?;

        let source = read_source_file(&path).await?;
        assert_eq!(source.name.as_str(), "notes.txt");
        let chunks = chunk_source(&source, ChunkingConfig::ANSWER)?;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Grease the hinges.");
        Ok(())
    }
}
