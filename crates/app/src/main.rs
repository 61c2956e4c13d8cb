use chrono::Utc;
use clap::{Parser, Subcommand};
use manifest_rag_core::{
    discover_sources, read_source_file, AnswerRequest, CancellationHandle, Coordinator, Language,
    LlamaServerEmbedder, LlamaServerModel, PipelineConfig, PipelineError, Source, StepsRequest,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "manifest-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding uploaded files and persisted indices
    #[arg(long, env = "MANIFEST_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Base URL of the llama.cpp-compatible model server
    #[arg(long, env = "MANIFEST_MODEL_URL", default_value = "http://localhost:8080")]
    model_url: String,

    /// Directory with .gbnf grammar overrides
    #[arg(long, env = "MANIFEST_GRAMMAR_DIR")]
    grammar_dir: Option<PathBuf>,

    /// Server answering /v1/embeddings; defaults to the model server
    #[arg(long, env = "MANIFEST_EMBEDDING_URL")]
    embedding_url: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a question over attached documents.
    Ask {
        #[arg(long)]
        prompt: String,
        /// Document to attach; may be repeated.
        #[arg(long = "file")]
        files: Vec<PathBuf>,
        /// Attach every supported document under this folder.
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Free-form note used as additional context.
        #[arg(long)]
        text: Option<String>,
        /// Answer language tag (en, pl).
        #[arg(long)]
        language: Option<String>,
    },
    /// Generate a vocabulary from documents or inline information.
    Vocabulary {
        #[arg(long)]
        prompt: String,
        #[arg(long = "file", conflicts_with = "extra_info", required_unless_present = "extra_info")]
        files: Vec<PathBuf>,
        #[arg(long)]
        extra_info: Option<String>,
        #[arg(long)]
        language: Option<String>,
    },
    /// Turn a subtitles file into a step-by-step manual.
    Steps {
        #[arg(long)]
        subtitles: PathBuf,
        #[arg(long, default_value_t = false)]
        with_description: bool,
        #[arg(long, default_value_t = false)]
        with_clips: bool,
        #[arg(long)]
        language: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig {
        data_dir: cli.data_dir,
        grammar_dir: cli.grammar_dir,
        model_endpoint: cli.model_url,
        embedding_endpoint: cli.embedding_url,
    };

    let model = LlamaServerModel::new(&config.model_endpoint).map_err(|error| report(error.into()))?;
    let embedder = LlamaServerEmbedder::connect(config.embedding_endpoint())
        .await
        .map_err(|error| report(error.into()))?;
    let coordinator = Coordinator::from_config(&config, Arc::new(embedder), Arc::new(model));
    info!(
        version = app_version,
        data_dir = %config.data_dir.display(),
        model = %config.model_endpoint,
        embeddings = %config.embedding_endpoint(),
        started_at = %Utc::now().to_rfc3339(),
        "manifest-rag boot"
    );

    let cancel = CancellationHandle::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling request");
            trigger.cancel();
        }
    });

    let output = match cli.command {
        Command::Ask {
            prompt,
            mut files,
            dir,
            text,
            language,
        } => {
            if let Some(dir) = dir {
                files.extend(discover_sources(&dir));
            }
            let request = AnswerRequest {
                prompt,
                files: read_sources(&files).await?,
                text,
                language: Language::from_tag(language.as_deref()),
            };
            coordinator.answer(request, &cancel).await
        }
        Command::Vocabulary {
            prompt,
            files,
            extra_info,
            language,
        } => {
            let language = Language::from_tag(language.as_deref());
            match extra_info {
                Some(extra_info) => {
                    coordinator
                        .vocabulary(&prompt, &extra_info, language, &cancel)
                        .await
                }
                None => {
                    let sources = read_sources(&files).await?;
                    coordinator
                        .vocabulary_from_files(&prompt, &sources, language, &cancel)
                        .await
                }
            }
        }
        Command::Steps {
            subtitles,
            with_description,
            with_clips,
            language,
        } => {
            let request = StepsRequest {
                subtitles: tokio::fs::read_to_string(&subtitles).await?,
                with_description,
                with_clips,
                language: Language::from_tag(language.as_deref()),
            };
            coordinator.generate_steps(request, &cancel).await
        }
    };

    println!("{}", output.map_err(report)?);
    Ok(())
}

async fn read_sources(paths: &[PathBuf]) -> anyhow::Result<Vec<Source>> {
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let source = read_source_file(path)
            .await
            .map_err(|error| report(error.into()))?;
        sources.push(source);
    }
    Ok(sources)
}

fn report(error: PipelineError) -> anyhow::Error {
    anyhow::anyhow!("{:?} error: {error}", error.kind())
}
