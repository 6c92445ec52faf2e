//! The message feed
//!
//! A chronological feed of agent messages with emoji reactions. The feed is
//! a collaborator of the reputation core: a reaction from another agent is
//! the "upvote received" event the server credits at the ledger boundary.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use agora_core::Clock;

/// Error types for feed operations
#[derive(Error, Debug)]
pub enum FeedError {
    /// No message with this id
    #[error("Message not found: {0}")]
    MessageNotFound(String),
}

/// Result type for feed operations
pub type FeedResult<T> = Result<T, FeedError>;

/// A reaction to a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    /// Who reacted
    pub agent_id: String,
    /// The emoji
    pub emoji: String,
    /// When, epoch milliseconds
    pub timestamp: u64,
}

/// A message on the feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message id
    pub id: String,
    /// Author agent id
    pub agent_id: String,
    /// Author display name at post time
    pub agent_name: String,
    /// Message body
    pub content: String,
    /// Free-form metadata supplied by the author
    pub metadata: serde_json::Value,
    /// When the message was posted, epoch milliseconds
    pub timestamp: u64,
    /// Reactions received
    pub reactions: Vec<Reaction>,
}

/// Query options for reading the feed
#[derive(Debug, Clone, Deserialize)]
pub struct FeedQuery {
    /// Maximum messages returned
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Only messages strictly older than this timestamp
    pub before: Option<u64>,
    /// Only messages strictly newer than this timestamp
    pub after: Option<u64>,
    /// Only messages by this agent
    #[serde(rename = "agent")]
    pub agent_id: Option<String>,
}

fn default_limit() -> usize {
    50
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            before: None,
            after: None,
            agent_id: None,
        }
    }
}

/// The chronological message feed
pub struct MessageFeed {
    clock: Arc<dyn Clock>,
    messages: RwLock<Vec<Message>>,
}

impl MessageFeed {
    /// Create an empty feed
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            messages: RwLock::new(Vec::new()),
        }
    }

    /// Post a message to the feed
    pub async fn post_message(
        &self,
        agent_id: &str,
        agent_name: &str,
        content: &str,
        metadata: serde_json::Value,
    ) -> Message {
        let timestamp = self.clock.now_ms();
        let suffix: String = Uuid::new_v4().simple().to_string()[..6].to_string();

        let message = Message {
            id: format!("msg_{}_{}", timestamp, suffix),
            agent_id: agent_id.to_string(),
            agent_name: agent_name.to_string(),
            content: content.to_string(),
            metadata,
            timestamp,
            reactions: Vec::new(),
        };

        self.messages.write().await.push(message.clone());
        message
    }

    /// Read the feed, newest first
    pub async fn feed(&self, query: &FeedQuery) -> Vec<Message> {
        let messages = self.messages.read().await;

        messages
            .iter()
            .rev()
            .filter(|m| {
                query
                    .agent_id
                    .as_ref()
                    .map(|id| &m.agent_id == id)
                    .unwrap_or(true)
            })
            .filter(|m| query.before.map(|t| m.timestamp < t).unwrap_or(true))
            .filter(|m| query.after.map(|t| m.timestamp > t).unwrap_or(true))
            .take(query.limit)
            .cloned()
            .collect()
    }

    /// Get a single message
    pub async fn message(&self, message_id: &str) -> FeedResult<Message> {
        self.messages
            .read()
            .await
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
            .ok_or_else(|| FeedError::MessageNotFound(message_id.to_string()))
    }

    /// Add a reaction to a message and return the updated message
    pub async fn add_reaction(
        &self,
        message_id: &str,
        agent_id: &str,
        emoji: &str,
    ) -> FeedResult<Message> {
        let mut messages = self.messages.write().await;
        let message = messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| FeedError::MessageNotFound(message_id.to_string()))?;

        message.reactions.push(Reaction {
            agent_id: agent_id.to_string(),
            emoji: emoji.to_string(),
            timestamp: self.clock.now_ms(),
        });

        Ok(message.clone())
    }

    /// Number of messages ever posted
    pub async fn message_count(&self) -> usize {
        self.messages.read().await.len()
    }
}
