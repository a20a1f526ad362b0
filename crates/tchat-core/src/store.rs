//! Persistence contract for sessions, turns and the history window.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tchat_ai::Message;
use thiserror::Error;

use crate::orchestrator::GenerationResult;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage format error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("session not found: {0}")]
    SessionNotFound(String),
}

/// One run of the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub title: String,
    pub model_name: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(model_name: impl Into<String>) -> Self {
        let created_at = Utc::now();
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            title: format!("Chat {}", created_at.format("%Y-%m-%d %H:%M")),
            model_name: model_name.into(),
            created_at,
        }
    }
}

/// A completed exchange and its metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub model_name: String,
    pub user_input: String,
    pub model_output: String,
    pub duration_ms: u64,
    pub ttfc_ms: u64,
    pub chunks: usize,
    pub input_length: usize,
    pub output_length: usize,
}

impl ConversationTurn {
    pub fn from_result(
        session_id: &str,
        model_name: &str,
        user_input: &str,
        result: &GenerationResult,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
            model_name: model_name.to_string(),
            user_input: user_input.to_string(),
            model_output: result.output_text.clone(),
            duration_ms: result.duration_ms,
            ttfc_ms: result.time_to_first_chunk_ms,
            chunks: result.chunk_count,
            input_length: user_input.chars().count(),
            output_length: result.output_text.chars().count(),
        }
    }
}

/// Aggregates over everything stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub total_sessions: usize,
    pub unique_models: usize,
    pub total_turns: usize,
    pub avg_duration_ms: f64,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
    pub avg_input_length: f64,
    pub avg_output_length: f64,
}

impl StoreStats {
    pub fn compute(sessions: &[Session], turns: &[ConversationTurn]) -> Self {
        let models: HashSet<&str> = sessions
            .iter()
            .map(|s| s.model_name.as_str())
            .chain(turns.iter().map(|t| t.model_name.as_str()))
            .collect();

        let mut stats = Self {
            total_sessions: sessions.len(),
            unique_models: models.len(),
            total_turns: turns.len(),
            ..Default::default()
        };
        if turns.is_empty() {
            return stats;
        }

        let n = turns.len() as f64;
        stats.avg_duration_ms = turns.iter().map(|t| t.duration_ms as f64).sum::<f64>() / n;
        stats.min_duration_ms = turns.iter().map(|t| t.duration_ms).min().unwrap_or(0);
        stats.max_duration_ms = turns.iter().map(|t| t.duration_ms).max().unwrap_or(0);
        stats.avg_input_length = turns.iter().map(|t| t.input_length as f64).sum::<f64>() / n;
        stats.avg_output_length = turns.iter().map(|t| t.output_length as f64).sum::<f64>() / n;
        stats
    }
}

/// Where sessions, turns and the history window are kept between runs.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_session(&self, session: &Session) -> Result<(), StoreError>;

    /// Append a turn to its session. Returns the turn's 1-based number within the session.
    async fn save_turn(&self, turn: &ConversationTurn) -> Result<u64, StoreError>;

    /// Replace the saved history with `messages`.
    async fn save_history(&self, messages: &[Message]) -> Result<(), StoreError>;

    /// Saved history, oldest first. Empty when nothing was saved.
    async fn load_history(&self) -> Result<Vec<Message>, StoreError>;

    async fn stats(&self) -> Result<StoreStats, StoreError>;
}
