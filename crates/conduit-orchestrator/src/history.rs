//! Conversation history storage.
//!
//! The agent only sees history through the [`HistoryStore`] trait. The bundled
//! [`InMemoryHistoryStore`] keeps a bounded FIFO per conversation, each behind
//! its own mutex so concurrent requests on different conversations never
//! contend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::Result;

/// Default number of messages kept per conversation.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Who wrote a history message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user.
    User,
    /// This agent.
    Agent,
    /// Bookkeeping entries such as extracted file content.
    System,
}

impl Role {
    /// Upper-case label used when history is rendered into prompts.
    pub const fn prompt_label(self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Agent => "AGENT",
            Role::System => "SYSTEM",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::User => "user",
            Role::Agent => "agent",
            Role::System => "system",
        };
        f.write_str(s)
    }
}

/// One entry of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// Author.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Text extracted from an attachment alongside this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_content: Option<String>,
}

impl HistoryMessage {
    /// Creates a message without extracted content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into(), extracted_content: None }
    }

    /// Attaches extracted content; empty text is treated as none.
    #[must_use]
    pub fn with_extracted_content(mut self, extracted: Option<String>) -> Self {
        self.extracted_content = extracted.filter(|text| !text.is_empty());
        self
    }
}

/// The last `n` messages of a history, oldest first.
pub fn recent(history: &[HistoryMessage], n: usize) -> &[HistoryMessage] {
    &history[history.len().saturating_sub(n)..]
}

/// Storage for per-conversation message logs.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// All retained messages of a conversation, oldest first. Unknown ids
    /// yield an empty history.
    async fn get(&self, conversation_id: &str) -> Result<Vec<HistoryMessage>>;

    /// Appends a message, evicting the oldest ones beyond the store's limit.
    async fn append(&self, conversation_id: &str, message: HistoryMessage) -> Result<()>;

    /// Forgets a conversation.
    async fn clear(&self, conversation_id: &str) -> Result<()>;
}

type Conversation = Arc<Mutex<VecDeque<HistoryMessage>>>;

/// Process-local history store with a fixed per-conversation cap.
#[derive(Debug)]
pub struct InMemoryHistoryStore {
    limit: usize,
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl InMemoryHistoryStore {
    /// Creates a store keeping at most `limit` messages per conversation.
    ///
    /// A limit of zero is raised to one.
    pub fn new(limit: usize) -> Self {
        Self { limit: limit.max(1), conversations: RwLock::new(HashMap::new()) }
    }

    async fn conversation(&self, conversation_id: &str) -> Option<Conversation> {
        self.conversations.read().await.get(conversation_id).cloned()
    }

    async fn conversation_or_insert(&self, conversation_id: &str) -> Conversation {
        if let Some(existing) = self.conversation(conversation_id).await {
            return existing;
        }
        let mut conversations = self.conversations.write().await;
        Arc::clone(conversations.entry(conversation_id.to_string()).or_default())
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn get(&self, conversation_id: &str) -> Result<Vec<HistoryMessage>> {
        let Some(conversation) = self.conversation(conversation_id).await else {
            return Ok(Vec::new());
        };
        let messages = conversation.lock().await;
        Ok(messages.iter().cloned().collect())
    }

    async fn append(&self, conversation_id: &str, message: HistoryMessage) -> Result<()> {
        let conversation = self.conversation_or_insert(conversation_id).await;
        let mut messages = conversation.lock().await;

        debug!(conversation_id = %conversation_id, role = %message.role, "Appending history message");
        messages.push_back(message);
        while messages.len() > self.limit {
            messages.pop_front();
        }
        Ok(())
    }

    async fn clear(&self, conversation_id: &str) -> Result<()> {
        self.conversations.write().await.remove(conversation_id);
        Ok(())
    }
}
