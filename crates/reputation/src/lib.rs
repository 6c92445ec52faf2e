//! Reputation system for Agora
//!
//! This crate is the authoritative in-process ledger of agent standing: a
//! decaying, stakeable reputation score per agent, the vouch and mentorship
//! lineage built on the staking primitive, and one-time milestone
//! achievements. Governance reads live reputation from here whenever it
//! needs a voting weight; nothing is cached across calls.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use agora_core::Clock;

pub mod achievements;
pub mod ledger;
pub mod lineage;

// Re-exports
pub use achievements::{Achievement, AchievementEvaluator};
pub use ledger::{AgentRecord, RepSource, ReputationLedger};
pub use lineage::{LineageRecord, LineageTracker, VouchRecord};

/// Error types for reputation operations
#[derive(Error, Debug)]
pub enum ReputationError {
    /// No ledger record for this agent
    #[error("Agent not found: {0}")]
    NotFound(String),

    /// An agent tried to vouch for or mentor itself
    #[error("Agent {0} cannot reference itself")]
    SelfReference(String),

    /// This vouch already exists
    #[error("Agent {voucher} has already vouched for {target}")]
    DuplicateVouch { voucher: String, target: String },

    /// The stake request exceeds the available balance
    #[error("Insufficient reputation: {available} available, {required} required")]
    InsufficientReputation { available: f64, required: f64 },

    /// Credit amount was not a finite non-negative number
    #[error("Invalid credit amount: {0}")]
    InvalidAmount(f64),
}

/// Result type for reputation operations
pub type ReputationResult<T> = Result<T, ReputationError>;

/// Configuration for the reputation system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationConfig {
    /// Fraction of reputation lost per whole day past the inactivity threshold
    pub decay_rate_per_day: f64,
    /// Days of inactivity before decay applies
    pub decay_threshold_days: u64,
    /// Fraction of available reputation staked by a vouch
    pub vouch_stake_fraction: f64,
    /// Fraction of the stake credited to the vouch target
    pub vouch_credit_fraction: f64,
    /// Minimum available reputation required to vouch
    pub min_vouch_available: f64,
    /// Reputation credited to a mentor per first-time mentorship
    pub mentor_teaching_credit: f64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            decay_rate_per_day: 0.01,     // 1% per day past the threshold
            decay_threshold_days: 7,      // a week of inactivity is free
            vouch_stake_fraction: 0.10,   // vouches commit 10% of available
            vouch_credit_fraction: 0.5,   // target receives half the stake
            min_vouch_available: 10.0,    // below this a vouch is refused
            mentor_teaching_credit: 25.0, // per newly recorded mentorship
        }
    }
}

/// Outcome of a successful vouch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VouchOutcome {
    /// Reputation the voucher staked
    pub stake_amount: f64,
    /// How many vouchers the target now has
    pub target_voucher_count: usize,
}

/// Outcome of recording a mentorship
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentorshipOutcome {
    /// Whether this call created the link (false on idempotent repeats)
    pub newly_linked: bool,
    /// The mentor's lineage after the call
    pub lineage: LineageRecord,
}

/// The reputation system: ledger, lineage tracker, and achievement
/// evaluator wired together
///
/// All mutations flow through this facade so that milestone evaluation
/// always observes them.
pub struct ReputationSystem {
    config: ReputationConfig,
    ledger: ReputationLedger,
    lineage: LineageTracker,
    achievements: AchievementEvaluator,
}

impl ReputationSystem {
    /// Create a system with default configuration
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_config(clock, ReputationConfig::default())
    }

    /// Create a system with explicit configuration
    pub fn with_config(clock: Arc<dyn Clock>, config: ReputationConfig) -> Self {
        Self {
            ledger: ReputationLedger::new(clock.clone(), config.clone()),
            lineage: LineageTracker::new(clock.clone()),
            achievements: AchievementEvaluator::new(clock),
            config,
        }
    }

    /// Create ledger, lineage, and achievement records for a new agent
    pub async fn register_agent(&self, agent_id: &str, created_at: u64) {
        self.ledger.register(agent_id, created_at).await;
        self.lineage.register(agent_id).await;
        self.achievements.register(agent_id).await;
    }

    /// Whether the system knows this agent
    pub async fn contains(&self, agent_id: &str) -> bool {
        self.ledger.contains(agent_id).await
    }

    /// Credit reputation and evaluate milestones
    ///
    /// Returns the agent's new reputation total.
    pub async fn credit(
        &self,
        agent_id: &str,
        amount: f64,
        source: RepSource,
    ) -> ReputationResult<f64> {
        let reputation = self.ledger.credit(agent_id, amount, source).await?;
        self.achievements.on_reputation(agent_id, reputation).await;
        Ok(reputation)
    }

    /// Apply inactivity decay across all agents; returns how many decayed
    ///
    /// Invoked on a fixed interval by the node's background task, never by
    /// request handlers. Decay grants no achievements: it only reduces.
    pub async fn decay_tick(&self) -> usize {
        self.ledger.decay_tick().await
    }

    /// Reputation the agent can still commit to vouches
    pub async fn available_to_stake(&self, agent_id: &str) -> ReputationResult<f64> {
        self.ledger.available_to_stake(agent_id).await
    }

    /// Commit reputation to a vouch
    pub async fn stake(&self, agent_id: &str, amount: f64) -> ReputationResult<()> {
        self.ledger.stake(agent_id, amount).await
    }

    /// Vouch for another agent
    ///
    /// Stakes 10% of the voucher's available reputation, records the vouch
    /// on both lineage records, and credits the target half the stake
    /// (floored) under `collaborations`.
    pub async fn vouch_for(
        &self,
        voucher_id: &str,
        target_id: &str,
    ) -> ReputationResult<VouchOutcome> {
        let link = self
            .lineage
            .vouch_for(&self.ledger, &self.config, voucher_id, target_id)
            .await?;

        let credit = (link.stake_amount * self.config.vouch_credit_fraction).floor();
        let target_reputation = self
            .ledger
            .credit(target_id, credit, RepSource::Collaborations)
            .await?;

        self.achievements
            .on_reputation(target_id, target_reputation)
            .await;
        self.achievements
            .on_vouchers_received(target_id, link.target_voucher_count)
            .await;
        self.achievements
            .on_vouches_given(voucher_id, link.voucher_vouched_count)
            .await;

        Ok(VouchOutcome {
            stake_amount: link.stake_amount,
            target_voucher_count: link.target_voucher_count,
        })
    }

    /// Record a mentorship; idempotent on the (mentor, student) pair
    ///
    /// The first occurrence links both lineage records and credits the
    /// mentor under `teaching`; repeats are no-ops.
    pub async fn record_mentorship(
        &self,
        mentor_id: &str,
        student_id: &str,
    ) -> ReputationResult<MentorshipOutcome> {
        let link = self
            .lineage
            .link_mentorship(&self.ledger, mentor_id, student_id)
            .await?;

        if !link.newly_linked {
            return Ok(MentorshipOutcome {
                newly_linked: false,
                lineage: link.mentor_lineage,
            });
        }

        let reputation = self
            .ledger
            .credit(
                mentor_id,
                self.config.mentor_teaching_credit,
                RepSource::Teaching,
            )
            .await?;
        self.achievements.on_reputation(mentor_id, reputation).await;
        self.achievements
            .on_students(mentor_id, link.mentor_student_count)
            .await;

        Ok(MentorshipOutcome {
            newly_linked: true,
            lineage: link.mentor_lineage,
        })
    }

    /// Snapshot of an agent's reputation record
    pub async fn record(&self, agent_id: &str) -> ReputationResult<AgentRecord> {
        self.ledger.record(agent_id).await
    }

    /// Snapshot of an agent's lineage
    pub async fn lineage(&self, agent_id: &str) -> ReputationResult<LineageRecord> {
        self.lineage.record(agent_id).await
    }

    /// Achievements granted to an agent so far
    pub async fn achievements(&self, agent_id: &str) -> Vec<Achievement> {
        self.achievements.achievements(agent_id).await
    }

    /// Number of agents with a ledger record
    pub async fn agent_count(&self) -> usize {
        self.ledger.agent_count().await
    }

    /// Number of agents currently clearing the voting bar
    pub async fn eligible_voter_count(
        &self,
        min_reputation: f64,
        min_account_age_days: u64,
        now: u64,
    ) -> usize {
        self.ledger
            .eligible_voter_count(min_reputation, min_account_age_days, now)
            .await
    }
}
