//! Core types for chat interactions

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token usage reported by the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input: u32,
    pub output: u32,
}

/// Content parts in messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    /// Text content
    Text { text: String },
    /// Media content, either a `data:` URI or a remote URL
    Media { mime_type: String, url: String },
}

impl Content {
    /// Create text content
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create media content from raw bytes, encoded as a base64 data URI
    pub fn media(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        let mime_type = mime_type.into();
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Self::Media {
            url: format!("data:{mime_type};base64,{encoded}"),
            mime_type,
        }
    }

    /// Get text if this is text content
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// The base64 payload of an inline media part.
    ///
    /// Returns `None` for text and for media that points at a remote URL.
    pub fn base64_payload(&self) -> Option<&str> {
        match self {
            Self::Media { url, .. } => url
                .strip_prefix("data:")
                .and_then(|rest| rest.split_once(";base64,"))
                .map(|(_, payload)| payload),
            _ => None,
        }
    }
}

/// A single conversation turn. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: Vec<Content>,
    /// Creation time in milliseconds since the Unix epoch, kept in saved history
    #[serde(default)]
    timestamp: i64,
}

impl Message {
    /// Create a user message with text content
    pub fn user(text: impl Into<String>) -> Self {
        Self::user_with_content(vec![Content::text(text)])
    }

    /// Create a user message with multiple content parts
    pub fn user_with_content(content: Vec<Content>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message with text content
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![Content::text(text)])
    }

    fn new(role: Role, content: Vec<Content>) -> Self {
        Self {
            role,
            content,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Get the content parts
    pub fn content(&self) -> &[Content] {
        &self.content
    }

    /// Get combined text content
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.as_text())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Context for a chat request
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// System prompt
    pub system_prompt: Option<String>,
    /// Conversation messages, oldest first
    pub messages: Vec<Message>,
}

impl Context {
    /// Create a new context with a system prompt
    pub fn with_system(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: Some(system_prompt.into()),
            messages: vec![],
        }
    }

    /// Add a message to the context
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }
}

/// Feature flags a model advertises
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub completion: bool,
    pub vision: bool,
    pub tools: bool,
    pub thinking: bool,
    pub embedding: bool,
}

impl Capabilities {
    /// Parse the capability list returned by the server. Unknown flags are ignored.
    pub fn from_flags<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut caps = Self::default();
        for flag in flags {
            match flag.as_ref() {
                "completion" => caps.completion = true,
                "vision" => caps.vision = true,
                "tools" => caps.tools = true,
                "thinking" => caps.thinking = true,
                "embedding" => caps.embedding = true,
                _ => {}
            }
        }
        caps
    }

    fn flags(&self) -> Vec<&'static str> {
        [
            (self.completion, "completion"),
            (self.vision, "vision"),
            (self.tools, "tools"),
            (self.thinking, "thinking"),
            (self.embedding, "embedding"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect()
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = self.flags();
        if flags.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&flags.join(", "))
        }
    }
}

/// A locally installed model as listed by the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub parameter_size: Option<String>,
}
