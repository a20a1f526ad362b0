//! Streaming event types and utilities

use crate::types::Usage;
use std::pin::Pin;
use tokio_stream::Stream;

/// Events emitted while a reply is streamed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A chunk of reply text, in arrival order
    Delta { text: String },
    /// Reply completed successfully
    Done { usage: Usage },
    /// Error occurred
    Error { message: String },
}

impl ChatEvent {
    pub fn delta(text: impl Into<String>) -> Self {
        Self::Delta { text: text.into() }
    }

    /// Check if this is a terminal event (Done or Error)
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::Done { .. } | ChatEvent::Error { .. })
    }
}

/// A stream of chat events
pub type ChatEventStream = Pin<Box<dyn Stream<Item = ChatEvent> + Send>>;
