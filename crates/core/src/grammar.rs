use crate::error::GenerationError;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrammarKind {
    Steps,
    StepsWithDescription,
    StepsClips,
    StepsWithDescriptionClips,
}

impl GrammarKind {
    pub fn from_flags(with_description: bool, with_clips: bool) -> Self {
        match (with_description, with_clips) {
            (false, false) => Self::Steps,
            (true, false) => Self::StepsWithDescription,
            (false, true) => Self::StepsClips,
            (true, true) => Self::StepsWithDescriptionClips,
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Steps => "steps.gbnf",
            Self::StepsWithDescription => "stepsWithDescription.gbnf",
            Self::StepsClips => "stepsClips.gbnf",
            Self::StepsWithDescriptionClips => "stepsWithDescriptionClips.gbnf",
        }
    }

    fn builtin_source(self) -> &'static str {
        match self {
            Self::Steps => include_str!("../grammars/steps.gbnf"),
            Self::StepsWithDescription => include_str!("../grammars/stepsWithDescription.gbnf"),
            Self::StepsClips => include_str!("../grammars/stepsClips.gbnf"),
            Self::StepsWithDescriptionClips => {
                include_str!("../grammars/stepsWithDescriptionClips.gbnf")
            }
        }
    }
}

/// Where GBNF grammars are read from: compiled in, or a directory of overrides.
#[derive(Debug, Clone, Default)]
pub enum GrammarLibrary {
    #[default]
    Builtin,
    Directory(PathBuf),
}

impl GrammarLibrary {
    pub fn builtin() -> Self {
        Self::Builtin
    }

    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self::Directory(dir.into())
    }

    pub async fn load(&self, kind: GrammarKind) -> Result<String, GenerationError> {
        match self {
            Self::Builtin => Ok(kind.builtin_source().to_string()),
            Self::Directory(dir) => read_grammar(dir, kind).await,
        }
    }
}

async fn read_grammar(dir: &Path, kind: GrammarKind) -> Result<String, GenerationError> {
    let path = dir.join(kind.file_name());
    tokio::fs::read_to_string(&path)
        .await
        .map_err(|error| GenerationError::GrammarNotFound(format!("{}: {error}", path.display())))
}
