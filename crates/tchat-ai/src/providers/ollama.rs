//! Ollama native API provider (`/api/tags`, `/api/show`, `/api/chat`)

use std::time::Duration;

use async_stream::stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    stream::{ChatEvent, ChatEventStream},
    types::{Capabilities, Content, Context, Message, ModelInfo, Role, Usage},
};

/// Default server address when neither config nor environment names one
pub const DEFAULT_HOST: &str = "http://localhost:11434";

/// Environment variable consulted by [`OllamaProvider::from_env`]
pub const HOST_ENV_VAR: &str = "OLLAMA_HOST";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Ollama API client
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaProvider {
    /// Create a provider for the given host, e.g. `http://localhost:11434`
    pub fn new(host: impl AsRef<str>) -> Result<Self> {
        Self::with_timeout(host, DEFAULT_TIMEOUT)
    }

    /// Create a provider with a custom request timeout
    pub fn with_timeout(host: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: normalize_host(host.as_ref()),
        })
    }

    /// Create from the `OLLAMA_HOST` environment variable, falling back to the default host
    pub fn from_env() -> Result<Self> {
        let host = std::env::var(HOST_ENV_VAR)
            .ok()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        Self::new(host)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List locally installed models
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::api(status, text));
        }

        let list: TagsResponse = response.json().await?;

        Ok(list.models.into_iter().map(ModelInfo::from).collect())
    }

    /// Fetch the capability flags a model advertises
    pub async fn capabilities(&self, model: &str) -> Result<Capabilities> {
        let url = format!("{}/api/show", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ShowRequest { model })
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::ModelNotFound(model.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::api(status, text));
        }

        let show: ShowResponse = response.json().await?;
        Ok(Capabilities::from_flags(&show.capabilities))
    }

    /// Stream a reply from the server
    pub async fn stream(&self, model: &str, context: &Context) -> Result<ChatEventStream> {
        if model.trim().is_empty() {
            return Err(Error::InvalidConfig("model name is empty".into()));
        }

        let request = build_request(model, context);
        let url = format!("{}/api/chat", self.base_url);

        tracing::debug!(
            model,
            messages = request.messages.len(),
            "Sending chat request"
        );

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or(text);
            return Err(Error::api(status, message));
        }

        Ok(Box::pin(create_stream(response)))
    }
}

/// Accepts `host:port`, `http://host:port` or `https://host`, with or without a trailing slash
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

fn build_request<'a>(model: &'a str, context: &Context) -> ChatRequest<'a> {
    let mut messages = Vec::with_capacity(context.messages.len() + 1);

    if let Some(system) = context.system_prompt.as_deref().filter(|s| !s.is_empty()) {
        messages.push(OllamaMessage {
            role: "system",
            content: system.to_string(),
            images: None,
        });
    }

    messages.extend(context.messages.iter().map(convert_message));

    ChatRequest {
        model,
        messages,
        stream: true,
    }
}

fn convert_message(msg: &Message) -> OllamaMessage {
    let mut images = Vec::new();
    for part in msg.content() {
        if let Some(payload) = part.base64_payload() {
            images.push(payload.to_string());
        } else if let Content::Media { url, .. } = part {
            tracing::warn!(url = %url, "Skipping media that is not inline data");
        }
    }

    OllamaMessage {
        role: match msg.role() {
            Role::User => "user",
            Role::Assistant => "assistant",
        },
        content: msg.text(),
        images: (!images.is_empty()).then_some(images),
    }
}

/// Translate one NDJSON line of a `/api/chat` response into events
pub fn events_from_line(line: &str) -> Vec<ChatEvent> {
    let line = line.trim();
    if line.is_empty() {
        return vec![];
    }

    let chunk: ChatChunk = match serde_json::from_str(line) {
        Ok(chunk) => chunk,
        Err(e) => {
            return vec![ChatEvent::Error {
                message: format!("Failed to parse stream chunk: {e}"),
            }];
        }
    };

    if let Some(message) = chunk.error {
        return vec![ChatEvent::Error { message }];
    }

    let mut events = Vec::new();
    if let Some(text) = chunk
        .message
        .map(|m| m.content)
        .filter(|text| !text.is_empty())
    {
        events.push(ChatEvent::Delta { text });
    }
    if chunk.done {
        events.push(ChatEvent::Done {
            usage: Usage {
                input: chunk.prompt_eval_count.unwrap_or(0),
                output: chunk.eval_count.unwrap_or(0),
            },
        });
    }
    events
}

fn create_stream(
    response: reqwest::Response,
) -> impl tokio_stream::Stream<Item = ChatEvent> + Send {
    stream! {
        let mut bytes = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield ChatEvent::Error { message: e.to_string() };
                    return;
                }
            };
            buffer.extend_from_slice(&chunk);

            while let Some(newline_pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline_pos).collect();
                let line = match std::str::from_utf8(&line) {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!("Invalid UTF-8 in stream: {e}");
                        continue;
                    }
                };

                for event in events_from_line(line) {
                    let terminal = event.is_terminal();
                    yield event;
                    if terminal {
                        return;
                    }
                }
            }
        }

        // Last line may arrive without a trailing newline
        if let Ok(rest) = std::str::from_utf8(&buffer) {
            for event in events_from_line(rest) {
                let terminal = event.is_terminal();
                yield event;
                if terminal {
                    return;
                }
            }
        }
    }
}

// Ollama API types

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ShowRequest<'a> {
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct ShowResponse {
    #[serde(default)]
    capabilities: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    details: Option<TagDetails>,
}

#[derive(Debug, Deserialize)]
struct TagDetails {
    family: Option<String>,
    parameter_size: Option<String>,
}

impl From<TagModel> for ModelInfo {
    fn from(m: TagModel) -> Self {
        let (family, parameter_size) = m
            .details
            .map(|d| (d.family, d.parameter_size))
            .unwrap_or_default();
        ModelInfo {
            name: m.name,
            size: m.size,
            family,
            parameter_size,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}
