//! JSONL-backed store for sessions, turns and the saved history window

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tchat_ai::Message;
use tchat_core::{ConversationTurn, Session, Store, StoreError, StoreStats};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Line types in a session file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEntry {
    /// Always the first line
    Metadata(Session),
    /// A completed exchange
    Turn(StoredTurn),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTurn {
    pub turn_id: u64,
    #[serde(flatten)]
    pub turn: ConversationTurn,
}

/// Stores each session as `sessions/<id>.jsonl` and the history window as `history.json`
pub struct JsonlStore {
    root: PathBuf,
    /// Turns written per session; the lock also serializes appends
    turn_counts: Mutex<HashMap<String, u64>>,
}

impl JsonlStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join("sessions"))?;
        Ok(Self {
            root,
            turn_counts: Mutex::new(HashMap::new()),
        })
    }

    fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.sessions_dir().join(format!("{}.jsonl", id))
    }

    fn history_path(&self) -> PathBuf {
        self.root.join("history.json")
    }

    async fn read_entries(path: &Path) -> std::io::Result<Vec<SessionEntry>> {
        let content = fs::read_to_string(path).await?;
        let mut entries = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SessionEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Skipping unreadable session line"
                    )
                }
            }
        }
        Ok(entries)
    }

    async fn append_entry(path: &Path, entry: &SessionEntry) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = fs::OpenOptions::new().append(true).open(path).await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Store for JsonlStore {
    async fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        let path = self.session_path(&session.session_id);
        let mut line = serde_json::to_string(&SessionEntry::Metadata(session.clone()))?;
        line.push('\n');
        fs::write(&path, line).await?;

        self.turn_counts
            .lock()
            .await
            .insert(session.session_id.clone(), 0);
        tracing::debug!(session_id = %session.session_id, "Session created");
        Ok(())
    }

    async fn save_turn(&self, turn: &ConversationTurn) -> Result<u64, StoreError> {
        let path = self.session_path(&turn.session_id);
        if !fs::try_exists(&path).await? {
            return Err(StoreError::SessionNotFound(turn.session_id.clone()));
        }

        let mut counts = self.turn_counts.lock().await;
        let count = match counts.get(&turn.session_id) {
            Some(count) => *count,
            None => Self::read_entries(&path)
                .await?
                .iter()
                .filter(|e| matches!(e, SessionEntry::Turn(_)))
                .count() as u64,
        };

        let turn_id = count + 1;
        Self::append_entry(
            &path,
            &SessionEntry::Turn(StoredTurn {
                turn_id,
                turn: turn.clone(),
            }),
        )
        .await?;
        counts.insert(turn.session_id.clone(), turn_id);
        Ok(turn_id)
    }

    async fn save_history(&self, messages: &[Message]) -> Result<(), StoreError> {
        let path = self.history_path();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(messages)?).await?;
        fs::rename(&tmp, &path).await?;
        tracing::debug!(messages = messages.len(), "History saved");
        Ok(())
    }

    async fn load_history(&self) -> Result<Vec<Message>, StoreError> {
        let path = self.history_path();
        if !fs::try_exists(&path).await? {
            return Ok(vec![]);
        }
        let content = fs::read(&path).await?;
        Ok(serde_json::from_slice(&content)?)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let mut sessions = Vec::new();
        let mut turns = Vec::new();

        let mut dir = fs::read_dir(self.sessions_dir()).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("jsonl") {
                continue;
            }
            for entry in Self::read_entries(&path).await? {
                match entry {
                    SessionEntry::Metadata(session) => sessions.push(session),
                    SessionEntry::Turn(stored) => turns.push(stored.turn),
                }
            }
        }

        Ok(StoreStats::compute(&sessions, &turns))
    }
}
