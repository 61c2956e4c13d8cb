use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("docx error: {0}")]
    Docx(String),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("unsupported document type: {0}")]
    UnsupportedType(String),

    #[error("invalid source name: {0:?}")]
    InvalidSourceName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no persisted index for source {0}")]
    NotFound(String),

    #[error("embedding dimension {found} does not match store dimension {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("embedding has {found} dimensions, expected {expected}")]
    Dimensions { expected: usize, found: usize },
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("prompt is too long: {tokens} tokens for a context of {context_size}")]
    PromptTooLong { tokens: usize, context_size: usize },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("model context of {available} tokens is smaller than the requested {requested}")]
    ContextTooSmall { requested: usize, available: usize },

    #[error("grammar not found: {0}")]
    GrammarNotFound(String),

    #[error("generation was cancelled")]
    Cancelled,

    #[error("model output is not valid step data: {0}")]
    InvalidOutput(String),
}

/// How a failed request should be surfaced to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Capacity,
    Resource,
    Internal,
}

impl ErrorKind {
    pub fn is_client_error(self) -> bool {
        matches!(self, Self::Validation | Self::Capacity | Self::Resource)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Ingest(error) | Self::Index(IndexError::Ingest(error)) => match error {
                IngestError::Io(_)
                | IngestError::UnsupportedType(_)
                | IngestError::InvalidSourceName(_)
                | IngestError::PdfParse(_)
                | IngestError::Docx(_)
                | IngestError::Zip(_)
                | IngestError::Csv(_) => ErrorKind::Resource,
                _ => ErrorKind::Internal,
            },
            Self::Index(IndexError::NotFound(_)) => ErrorKind::Resource,
            Self::Index(_) | Self::Embedding(_) => ErrorKind::Internal,
            Self::Generation(GenerationError::PromptTooLong { .. }) => ErrorKind::Capacity,
            Self::Generation(GenerationError::GrammarNotFound(_)) => ErrorKind::Resource,
            Self::Generation(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_errors_to_kinds() {
        assert_eq!(
            PipelineError::Validation("prompt is empty".to_string()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            PipelineError::from(GenerationError::PromptTooLong {
                tokens: 9000,
                context_size: 8192
            })
            .kind(),
            ErrorKind::Capacity
        );
        assert_eq!(
            PipelineError::from(IngestError::UnsupportedType("a.xlsx".to_string())).kind(),
            ErrorKind::Resource
        );
        assert_eq!(
            PipelineError::from(IndexError::Ingest(IngestError::UnsupportedType(
                "a.csc".to_string()
            )))
            .kind(),
            ErrorKind::Resource
        );
        assert_eq!(
            PipelineError::from(GenerationError::Cancelled).kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            PipelineError::from(EmbeddingError::Dimensions {
                expected: 384,
                found: 256
            })
            .kind(),
            ErrorKind::Internal
        );
        assert!(!ErrorKind::Internal.is_client_error());
        assert!(ErrorKind::Capacity.is_client_error());
    }

    #[tokio::test]
    async fn unreadable_source_file_is_a_resource_error() {
        let missing = std::path::Path::new("/nonexistent/manual.pdf");
        let error = crate::ingest::read_source_file(missing)
            .await
            .err()
            .map(PipelineError::from)
            .expect("reading a missing file should fail");
        assert_eq!(error.kind(), ErrorKind::Resource);
        assert!(error.kind().is_client_error());

        let while_indexing = PipelineError::from(IndexError::Ingest(IngestError::Io(
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        )));
        assert_eq!(while_indexing.kind(), ErrorKind::Resource);
    }
}
