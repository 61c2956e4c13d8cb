use crate::error::IngestError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Stable name of a source. It keys both the raw upload and the persisted index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceName(String);

impl SourceName {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, IngestError> {
        let raw = raw.as_ref();
        let name = Path::new(raw)
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::trim)
            .unwrap_or_default();

        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(IngestError::InvalidSourceName(raw.to_string()));
        }

        Ok(Self(name.to_string()))
    }

    /// Name for an ad-hoc text note captured at `now`.
    pub fn note(now: DateTime<Utc>) -> Self {
        Self(format!("note-{}.txt", now.timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SourceName {
    type Error = IngestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SourceName> for String {
    fn from(value: SourceName) -> Self {
        value.0
    }
}

/// An uploaded file or text blob as received by a request.
#[derive(Debug, Clone)]
pub struct Source {
    pub name: SourceName,
    pub bytes: Vec<u8>,
}

impl Source {
    pub fn new(name: SourceName, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name,
            bytes: bytes.into(),
        }
    }

    pub fn note(text: &str, now: DateTime<Utc>) -> Self {
        Self::new(SourceName::note(now), text.as_bytes())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentLocation {
    WholeFile,
    Page(u32),
    Row(u64),
}

/// Text extracted by a loader, before splitting.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    pub location: DocumentLocation,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub source: SourceName,
    pub ordinal: u64,
    pub location: DocumentLocation,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "pl")]
    Polish,
}

impl Language {
    /// Anything other than `pl` answers in English.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(|value| value.trim().to_ascii_lowercase()) {
            Some(value) if value == "pl" => Self::Polish,
            _ => Self::English,
        }
    }
}
