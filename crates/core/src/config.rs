use crate::grammar::GrammarLibrary;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root holding `files/` (raw uploads) and `indices/` (persisted indices).
    pub data_dir: PathBuf,
    /// Directory of `.gbnf` overrides; the compiled-in grammars are used when unset.
    pub grammar_dir: Option<PathBuf>,
    pub model_endpoint: String,
    /// Server answering `/v1/embeddings`; the model server when unset.
    pub embedding_endpoint: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            grammar_dir: None,
            model_endpoint: "http://localhost:8080".to_string(),
            embedding_endpoint: None,
        }
    }
}

impl PipelineConfig {
    pub fn embedding_endpoint(&self) -> &str {
        self.embedding_endpoint
            .as_deref()
            .unwrap_or(&self.model_endpoint)
    }

    pub fn grammar_library(&self) -> GrammarLibrary {
        match &self.grammar_dir {
            Some(dir) => GrammarLibrary::from_dir(dir),
            None => GrammarLibrary::builtin(),
        }
    }
}
