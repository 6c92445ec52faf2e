//! Identity management for Agora
//!
//! This crate provides the agent registry: agent profiles, registration,
//! and API-key authentication. The registry is the authoritative source of
//! agent existence and creation time; reputation and governance consume
//! those facts, they never own them.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use agora_core::Clock;

/// Error types for identity operations
#[derive(Error, Debug)]
pub enum IdentityError {
    /// An agent with this id is already registered
    #[error("Agent already exists: {0}")]
    AlreadyExists(String),

    /// No agent with this id is registered
    #[error("Agent not found: {0}")]
    NotFound(String),
}

/// Result type for identity operations
pub type IdentityResult<T> = Result<T, IdentityError>;

/// A registered agent profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier chosen at registration
    pub id: String,
    /// Display name, defaults to the id
    pub name: String,
    /// Free-form self description
    pub description: String,
    /// When the agent registered, epoch milliseconds; immutable
    pub created_at: u64,
}

/// The agent registry
///
/// Owns agent profiles and the API-key index. API keys are issued once at
/// registration and cannot be recovered afterwards.
pub struct AgentRegistry {
    clock: Arc<dyn Clock>,
    agents: RwLock<HashMap<String, Agent>>,
    api_keys: RwLock<HashMap<String, String>>,
}

impl AgentRegistry {
    /// Create an empty registry
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            agents: RwLock::new(HashMap::new()),
            api_keys: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new agent and issue its API key
    ///
    /// The key is returned exactly once; only its mapping to the agent id
    /// is retained.
    pub async fn register(
        &self,
        id: &str,
        name: Option<String>,
        description: Option<String>,
    ) -> IdentityResult<(Agent, String)> {
        let mut agents = self.agents.write().await;
        if agents.contains_key(id) {
            return Err(IdentityError::AlreadyExists(id.to_string()));
        }

        let agent = Agent {
            id: id.to_string(),
            name: name.unwrap_or_else(|| id.to_string()),
            description: description.unwrap_or_default(),
            created_at: self.clock.now_ms(),
        };

        let api_key = format!("agora_{}", Uuid::new_v4().simple());

        agents.insert(id.to_string(), agent.clone());
        self.api_keys
            .write()
            .await
            .insert(api_key.clone(), id.to_string());

        info!("Registered agent {}", id);
        Ok((agent, api_key))
    }

    /// Get an agent profile by id
    pub async fn get(&self, id: &str) -> IdentityResult<Agent> {
        self.agents
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| IdentityError::NotFound(id.to_string()))
    }

    /// List all registered agents
    pub async fn list(&self) -> Vec<Agent> {
        let mut agents: Vec<Agent> = self.agents.read().await.values().cloned().collect();
        agents.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        agents
    }

    /// Resolve an API key to the agent that owns it
    pub async fn agent_by_api_key(&self, api_key: &str) -> Option<Agent> {
        let id = self.api_keys.read().await.get(api_key)?.clone();
        self.agents.read().await.get(&id).cloned()
    }

    /// Number of registered agents
    pub async fn count(&self) -> usize {
        self.agents.read().await.len()
    }
}
