//! Bounded conversation history fed into every request.

use std::collections::VecDeque;
use std::fmt;

use parking_lot::RwLock;
use tchat_ai::{Message, Role};

/// Capacity used when the configured one is zero or negative.
pub const DEFAULT_CAPACITY: usize = 5;

/// Message counts by role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub total: usize,
    pub user: usize,
    pub assistant: usize,
}

/// A strict FIFO sliding window over the most recent messages.
///
/// Holds at most `capacity` whole messages; appending past that evicts from
/// the oldest end. Safe to share between threads; each operation is atomic.
#[derive(Debug)]
pub struct HistoryWindow {
    capacity: usize,
    messages: RwLock<VecDeque<Message>>,
}

impl HistoryWindow {
    /// Create an empty window. A capacity of zero or below falls back to [`DEFAULT_CAPACITY`].
    pub fn new(capacity: i64) -> Self {
        let capacity = usize::try_from(capacity)
            .ok()
            .filter(|c| *c > 0)
            .unwrap_or(DEFAULT_CAPACITY);
        Self {
            capacity,
            messages: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Add a message at the newest end, evicting the oldest beyond capacity.
    pub fn append(&self, message: Message) {
        let mut messages = self.messages.write();
        messages.push_back(message);
        while messages.len() > self.capacity {
            messages.pop_front();
        }
    }

    /// Replace the contents, keeping only the newest `capacity` messages.
    pub fn replace_all(&self, messages: Vec<Message>) {
        let skip = messages.len().saturating_sub(self.capacity);
        let tail: VecDeque<Message> = messages.into_iter().skip(skip).collect();
        *self.messages.write() = tail;
    }

    pub fn clear(&self) {
        self.messages.write().clear();
    }

    /// An independent copy, oldest first.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.read().iter().cloned().collect()
    }

    /// The newest `n` messages, oldest first.
    pub fn last(&self, n: usize) -> Vec<Message> {
        let messages = self.messages.read();
        let skip = messages.len().saturating_sub(n);
        messages.iter().skip(skip).cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }

    pub fn stats(&self) -> HistoryStats {
        let messages = self.messages.read();
        let user = messages.iter().filter(|m| m.role() == Role::User).count();
        HistoryStats {
            total: messages.len(),
            user,
            assistant: messages.len() - user,
        }
    }
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY as i64)
    }
}

impl fmt::Display for HistoryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        write!(
            f,
            "History: {} messages ({} user, {} assistant)",
            stats.total, stats.user, stats.assistant
        )
    }
}
