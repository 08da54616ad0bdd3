use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const CHAT_LOG_CAPACITY: usize = 100;

pub type SharedChatLog = Arc<Mutex<ChatLog>>;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub timestamp: DateTime<Utc>,
    pub username: String,
    pub message: String,
}

impl fmt::Display for ChatEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.username,
            self.message
        )
    }
}

/// Most recent inbound chat lines, oldest dropped first once full.
#[derive(Debug)]
pub struct ChatLog {
    entries: VecDeque<ChatEntry>,
    capacity: usize,
}

impl Default for ChatLog {
    fn default() -> Self {
        Self::with_capacity(CHAT_LOG_CAPACITY)
    }
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn shared() -> SharedChatLog {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn record(&mut self, username: impl Into<String>, message: impl Into<String>) {
        self.push(ChatEntry {
            timestamp: Utc::now(),
            username: username.into(),
            message: message.into(),
        });
    }

    pub fn push(&mut self, entry: ChatEntry) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Up to `count` newest entries, oldest first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &ChatEntry> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
