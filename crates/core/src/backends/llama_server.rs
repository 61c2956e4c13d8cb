use super::base_url;
use crate::error::GenerationError;
use crate::traits::{
    ContextOptions, LanguageModel, ModelContext, SamplingOptions, Token, TokenStream,
};
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

const BACKEND: &str = "llama-server";
const CHANNEL_CAPACITY: usize = 64;

/// A model served by a llama.cpp-compatible HTTP server.
#[derive(Debug, Clone)]
pub struct LlamaServerModel {
    endpoint: Url,
    client: Client,
}

impl LlamaServerModel {
    pub fn new(endpoint: &str) -> Result<Self, GenerationError> {
        Ok(Self {
            endpoint: base_url(endpoint)?,
            client: Client::new(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl LanguageModel for LlamaServerModel {
    async fn create_context(
        &self,
        options: ContextOptions,
    ) -> Result<Box<dyn ModelContext>, GenerationError> {
        let response = self.client.get(self.endpoint.join("props")?).send().await?;
        if !response.status().is_success() {
            return Err(GenerationError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("model not ready: {}", response.status()),
            });
        }

        let props: ServerProps = response.json().await?;
        check_context_window(&props, options.context_size)?;

        debug!(
            endpoint = %self.endpoint,
            context_size = options.context_size,
            server_context = ?props.context_window(),
            batch_size = options.batch_size,
            grammar = options.grammar.is_some(),
            "llama context created"
        );
        Ok(Box::new(LlamaServerContext {
            endpoint: self.endpoint.clone(),
            client: self.client.clone(),
            options,
        }))
    }
}

/// The parts of `/props` the client relies on. Older servers report `n_ctx` at the top
/// level, newer ones inside `default_generation_settings`.
#[derive(Debug, Default, Deserialize)]
struct ServerProps {
    #[serde(default)]
    n_ctx: Option<usize>,
    #[serde(default)]
    default_generation_settings: Option<ServerGenerationSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerGenerationSettings {
    #[serde(default)]
    n_ctx: Option<usize>,
}

impl ServerProps {
    fn context_window(&self) -> Option<usize> {
        self.default_generation_settings
            .as_ref()
            .and_then(|settings| settings.n_ctx)
            .or(self.n_ctx)
    }
}

/// A server that does not report its window is trusted.
fn check_context_window(props: &ServerProps, requested: usize) -> Result<(), GenerationError> {
    match props.context_window() {
        Some(available) if available < requested => Err(GenerationError::ContextTooSmall {
            requested,
            available,
        }),
        _ => Ok(()),
    }
}

struct LlamaServerContext {
    endpoint: Url,
    client: Client,
    options: ContextOptions,
}

#[derive(Debug, Serialize)]
struct TokenizeRequest<'a> {
    content: &'a str,
    add_special: bool,
}

#[derive(Debug, Deserialize)]
struct TokenizeResponse {
    tokens: Vec<Token>,
}

#[derive(Debug, Serialize)]
struct DetokenizeRequest<'a> {
    tokens: &'a [Token],
}

#[derive(Debug, Deserialize)]
struct DetokenizeResponse {
    content: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    prompt: Vec<Token>,
    stream: bool,
    n_predict: i64,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    return_tokens: bool,
    cache_prompt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    grammar: Option<String>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
struct CompletionEvent {
    #[serde(default)]
    tokens: Vec<Token>,
    #[serde(default)]
    stop: bool,
}

impl LlamaServerContext {
    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, GenerationError> {
        let response = self
            .client
            .post(self.endpoint.join(path)?)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenerationError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("{path} returned {}", response.status()),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ModelContext for LlamaServerContext {
    async fn encode(&self, text: &str) -> Result<Vec<Token>, GenerationError> {
        let response: TokenizeResponse = self
            .post_json(
                "tokenize",
                &TokenizeRequest {
                    content: text,
                    add_special: true,
                },
            )
            .await?;
        Ok(response.tokens)
    }

    fn evaluate(&self, prompt: Vec<Token>, sampling: SamplingOptions) -> TokenStream {
        let (mut sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let body = CompletionRequest {
            prompt,
            stream: true,
            n_predict: -1,
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            top_k: sampling.top_k,
            return_tokens: true,
            cache_prompt: false,
            grammar: self.options.grammar.clone(),
        };

        match self.endpoint.join("completion") {
            Ok(url) => {
                let request = self.client.post(url).json(&body);
                tokio::spawn(async move {
                    if let Err(error) = forward_tokens(request, &mut sender).await {
                        warn!(%error, "token stream failed");
                        let _ = sender.send(Err(error)).await;
                    }
                });
            }
            Err(error) => {
                let _ = sender.try_send(Err(error.into()));
            }
        }

        receiver.boxed()
    }

    async fn decode(&self, tokens: &[Token]) -> Result<String, GenerationError> {
        let response: DetokenizeResponse = self
            .post_json("detokenize", &DetokenizeRequest { tokens })
            .await?;
        Ok(response.content)
    }
}

/// Reads server-sent completion events and forwards each token. Returns once the server
/// reports a stop, the body ends, or the receiving side has been dropped.
async fn forward_tokens(
    request: RequestBuilder,
    sender: &mut mpsc::Sender<Result<Token, GenerationError>>,
) -> Result<(), GenerationError> {
    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(GenerationError::BackendResponse {
            backend: BACKEND.to_string(),
            details: format!("completion returned {}", response.status()),
        });
    }

    let mut body = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(bytes) = body.next().await {
        buffer.extend_from_slice(&bytes?);

        while let Some(newline) = buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = buffer.drain(..=newline).collect();
            let Some(event) = parse_event_line(&String::from_utf8_lossy(&line))? else {
                continue;
            };

            for token in event.tokens {
                if sender.send(Ok(token)).await.is_err() {
                    return Ok(());
                }
            }
            if event.stop {
                return Ok(());
            }
        }
    }

    Ok(())
}

fn parse_event_line(line: &str) -> Result<Option<CompletionEvent>, GenerationError> {
    let Some(payload) = line.trim().strip_prefix("data:") else {
        return Ok(None);
    };

    let payload = payload.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return Ok(None);
    }

    Ok(Some(serde_json::from_str(payload)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_gets_a_trailing_slash() -> Result<(), GenerationError> {
        let model = LlamaServerModel::new("http://localhost:8080/llm")?;
        assert_eq!(model.endpoint().join("tokenize")?.as_str(), "http://localhost:8080/llm/tokenize");

        let root = LlamaServerModel::new("http://localhost:8080")?;
        assert_eq!(root.endpoint().join("completion")?.as_str(), "http://localhost:8080/completion");
        Ok(())
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        assert!(matches!(
            LlamaServerModel::new("not a url"),
            Err(GenerationError::Url(_))
        ));
    }

    #[test]
    fn data_lines_are_parsed() -> Result<(), GenerationError> {
        let event = parse_event_line("data: {\"content\":\"Hi\",\"tokens\":[15043],\"stop\":false}\n")?;
        assert_eq!(
            event,
            Some(CompletionEvent {
                tokens: vec![15043],
                stop: false
            })
        );

        let last = parse_event_line("data: {\"content\":\"\",\"stop\":true,\"timings\":{}}")?;
        assert_eq!(
            last,
            Some(CompletionEvent {
                tokens: Vec::new(),
                stop: true
            })
        );
        Ok(())
    }

    #[test]
    fn non_data_lines_are_skipped() -> Result<(), GenerationError> {
        assert_eq!(parse_event_line("\n")?, None);
        assert_eq!(parse_event_line(": keep-alive")?, None);
        assert_eq!(parse_event_line("data: [DONE]")?, None);
        Ok(())
    }

    #[test]
    fn completion_request_omits_missing_grammar() -> Result<(), GenerationError> {
        let body = CompletionRequest {
            prompt: vec![1, 2],
            stream: true,
            n_predict: -1,
            temperature: 0.5,
            top_p: 0.5,
            top_k: 40,
            return_tokens: true,
            cache_prompt: false,
            grammar: None,
        };
        let json = serde_json::to_value(&body)?;
        assert!(json.get("grammar").is_none());
        assert_eq!(json["top_k"], 40);
        Ok(())
    }

    #[test]
    fn small_server_context_is_rejected() -> Result<(), serde_json::Error> {
        let props: ServerProps = serde_json::from_str(
            r#"{"default_generation_settings":{"n_ctx":4096,"temperature":0.8},"total_slots":1}"#,
        )?;
        assert_eq!(props.context_window(), Some(4096));
        assert!(matches!(
            check_context_window(&props, 8192),
            Err(GenerationError::ContextTooSmall {
                requested: 8192,
                available: 4096
            })
        ));
        assert!(check_context_window(&props, 4096).is_ok());
        Ok(())
    }

    #[test]
    fn context_window_falls_back_to_the_top_level_field() -> Result<(), serde_json::Error> {
        let legacy: ServerProps = serde_json::from_str(r#"{"n_ctx":16384}"#)?;
        assert_eq!(legacy.context_window(), Some(16384));
        assert!(check_context_window(&legacy, 8192).is_ok());

        let silent: ServerProps = serde_json::from_str(r#"{"total_slots":4}"#)?;
        assert_eq!(silent.context_window(), None);
        assert!(check_context_window(&silent, 8192).is_ok());
        Ok(())
    }
}
