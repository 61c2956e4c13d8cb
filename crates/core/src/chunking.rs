use crate::error::IngestError;
use crate::models::{Chunk, LoadedDocument, SourceName};
use sha2::{Digest, Sha256};

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Window sizes for the splitter, measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl ChunkingConfig {
    /// Short windows used to build keyboard vocabularies.
    pub const VOCABULARY: Self = Self {
        chunk_size: 200,
        chunk_overlap: 0,
    };

    /// Windows used for general question answering.
    pub const ANSWER: Self = Self {
        chunk_size: 700,
        chunk_overlap: 0,
    };

    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, IngestError> {
        if chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be positive".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {chunk_overlap} must be smaller than chunk size {chunk_size}"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }
}

/// Splits every document of one source, numbering chunks contiguously across documents.
pub fn split_documents(
    source: &SourceName,
    documents: &[LoadedDocument],
    config: ChunkingConfig,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut ordinal = 0u64;

    for document in documents {
        for text in split_text(&document.text, config) {
            chunks.push(Chunk {
                chunk_id: make_chunk_id(source, ordinal, &text),
                source: source.clone(),
                ordinal,
                location: document.location,
                text,
            });
            ordinal = ordinal.saturating_add(1);
        }
    }

    chunks
}

pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    split_recursive(text, &SEPARATORS, config)
}

fn split_recursive(text: &str, separators: &[&str], config: ChunkingConfig) -> Vec<String> {
    let position = separators
        .iter()
        .position(|separator| separator.is_empty() || text.contains(separator))
        .unwrap_or(separators.len().saturating_sub(1));
    let separator = separators.get(position).copied().unwrap_or("");
    let finer = separators.get(position + 1..).unwrap_or_default();

    let pieces: Vec<&str> = if separator.is_empty() {
        text.char_indices()
            .map(|(start, ch)| &text[start..start + ch.len_utf8()])
            .collect()
    } else {
        text.split(separator).filter(|piece| !piece.is_empty()).collect()
    };

    let mut output = Vec::new();
    let mut fitting = Vec::new();

    for piece in pieces {
        if char_len(piece) < config.chunk_size {
            fitting.push(piece);
            continue;
        }

        if !fitting.is_empty() {
            output.extend(merge_pieces(&fitting, separator, config));
            fitting.clear();
        }

        if finer.is_empty() {
            output.push(piece.to_string());
        } else {
            output.extend(split_recursive(piece, finer, config));
        }
    }

    if !fitting.is_empty() {
        output.extend(merge_pieces(&fitting, separator, config));
    }

    output
}

fn merge_pieces(pieces: &[&str], separator: &str, config: ChunkingConfig) -> Vec<String> {
    let separator_len = char_len(separator);
    let mut merged = Vec::new();
    let mut window: Vec<&str> = Vec::new();
    let mut total = 0usize;

    for piece in pieces {
        let len = char_len(piece);
        let joint = if window.is_empty() { 0 } else { separator_len };

        if total + len + joint > config.chunk_size && !window.is_empty() {
            push_joined(&mut merged, &window, separator);

            while total > config.chunk_overlap
                || (total > 0
                    && total + len + if window.is_empty() { 0 } else { separator_len }
                        > config.chunk_size)
            {
                let Some(first) = window.first() else {
                    break;
                };
                let dropped = char_len(first) + if window.len() > 1 { separator_len } else { 0 };
                total = total.saturating_sub(dropped);
                window.remove(0);
            }
        }

        let joint = if window.is_empty() { 0 } else { separator_len };
        window.push(piece);
        total += len + joint;
    }

    push_joined(&mut merged, &window, separator);
    merged
}

fn push_joined(target: &mut Vec<String>, window: &[&str], separator: &str) {
    let joined = window.join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        target.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn make_chunk_id(source: &SourceName, ordinal: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_str().as_bytes());
    hasher.update(ordinal.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
