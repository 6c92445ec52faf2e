//! Milestone achievements
//!
//! A passive observer of ledger and lineage mutations. Each milestone is
//! granted at most once per agent, the first time its threshold is crossed,
//! and is never revoked; reputation decaying back below a threshold leaves
//! the badge in place.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use agora_core::Clock;

/// A granted achievement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    /// Stable milestone id
    pub id: String,
    /// Display name
    pub name: String,
    /// What the milestone marks
    pub description: String,
    /// When it was granted, epoch milliseconds
    pub granted_at: u64,
}

struct Milestone {
    id: &'static str,
    name: &'static str,
    description: &'static str,
}

/// Reputation milestones, ascending
const REP_MILESTONES: &[(f64, Milestone)] = &[
    (
        100.0,
        Milestone {
            id: "rep-100",
            name: "Established",
            description: "Reached 100 reputation",
        },
    ),
    (
        500.0,
        Milestone {
            id: "rep-500",
            name: "Respected",
            description: "Reached 500 reputation",
        },
    ),
    (
        1000.0,
        Milestone {
            id: "rep-1000",
            name: "Luminary",
            description: "Reached 1000 reputation",
        },
    ),
    (
        5000.0,
        Milestone {
            id: "rep-5000",
            name: "Legend",
            description: "Reached 5000 reputation",
        },
    ),
];

/// Milestones for vouches received
const VOUCHER_MILESTONES: &[(usize, Milestone)] = &[
    (
        1,
        Milestone {
            id: "backed-1",
            name: "Backed",
            description: "Received a first vouch",
        },
    ),
    (
        5,
        Milestone {
            id: "backed-5",
            name: "Trusted",
            description: "Backed by five agents",
        },
    ),
];

/// Milestones for vouches given
const VOUCHED_MILESTONES: &[(usize, Milestone)] = &[(
    1,
    Milestone {
        id: "backer-1",
        name: "Backer",
        description: "Staked reputation on another agent",
    },
)];

/// Milestones for students mentored
const STUDENT_MILESTONES: &[(usize, Milestone)] = &[
    (
        1,
        Milestone {
            id: "mentor-1",
            name: "Mentor",
            description: "Mentored a first student",
        },
    ),
    (
        5,
        Milestone {
            id: "mentor-5",
            name: "Educator",
            description: "Mentored five students",
        },
    ),
];

/// Grants one-time milestone badges as thresholds are crossed
pub struct AchievementEvaluator {
    clock: Arc<dyn Clock>,
    awarded: RwLock<HashMap<String, Vec<Achievement>>>,
}

impl AchievementEvaluator {
    /// Create an evaluator with no awards
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            awarded: RwLock::new(HashMap::new()),
        }
    }

    /// Create an empty awarded-set for a newly registered agent
    pub async fn register(&self, agent_id: &str) {
        self.awarded
            .write()
            .await
            .entry(agent_id.to_string())
            .or_default();
    }

    /// Achievements granted to an agent so far
    pub async fn achievements(&self, agent_id: &str) -> Vec<Achievement> {
        self.awarded
            .read()
            .await
            .get(agent_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Evaluate reputation milestones after a credit
    pub async fn on_reputation(&self, agent_id: &str, reputation: f64) {
        let due = REP_MILESTONES
            .iter()
            .filter(|(threshold, _)| reputation >= *threshold)
            .map(|(_, m)| m);
        self.grant_all(agent_id, due).await;
    }

    /// Evaluate milestones for vouches received
    pub async fn on_vouchers_received(&self, agent_id: &str, count: usize) {
        let due = VOUCHER_MILESTONES
            .iter()
            .filter(|(threshold, _)| count >= *threshold)
            .map(|(_, m)| m);
        self.grant_all(agent_id, due).await;
    }

    /// Evaluate milestones for vouches given
    pub async fn on_vouches_given(&self, agent_id: &str, count: usize) {
        let due = VOUCHED_MILESTONES
            .iter()
            .filter(|(threshold, _)| count >= *threshold)
            .map(|(_, m)| m);
        self.grant_all(agent_id, due).await;
    }

    /// Evaluate milestones for students mentored
    pub async fn on_students(&self, agent_id: &str, count: usize) {
        let due = STUDENT_MILESTONES
            .iter()
            .filter(|(threshold, _)| count >= *threshold)
            .map(|(_, m)| m);
        self.grant_all(agent_id, due).await;
    }

    async fn grant_all(&self, agent_id: &str, due: impl Iterator<Item = &Milestone>) {
        let now = self.clock.now_ms();
        let mut awarded = self.awarded.write().await;
        let achievements = awarded.entry(agent_id.to_string()).or_default();

        for milestone in due {
            if achievements.iter().any(|a| a.id == milestone.id) {
                continue;
            }
            achievements.push(Achievement {
                id: milestone.id.to_string(),
                name: milestone.name.to_string(),
                description: milestone.description.to_string(),
                granted_at: now,
            });
            info!("Agent {} earned achievement {}", agent_id, milestone.id);
        }
    }
}
