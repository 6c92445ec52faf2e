//! The reputation ledger
//!
//! Owns one record per agent: the authoritative reputation value, the
//! informational per-source breakdown, the staked amount, and the activity
//! timestamps. Every mutation (credit, stake, per-agent decay) executes as a
//! single critical section under the records write lock, so read-check-write
//! sequences on `reputation`/`staked` never interleave.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use agora_core::{Clock, DAY_MS};

use crate::{ReputationConfig, ReputationError, ReputationResult};

/// Source tag for credited reputation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepSource {
    /// Message upvotes received
    Upvotes,
    /// Collaborations, including being vouched for
    Collaborations,
    /// Teaching and mentorship
    Teaching,
    /// Bounty completions
    Bounties,
    /// Verified knowledge contributions
    Knowledge,
}

impl RepSource {
    /// The wire tag for this source
    pub fn as_str(&self) -> &'static str {
        match self {
            RepSource::Upvotes => "upvotes",
            RepSource::Collaborations => "collaborations",
            RepSource::Teaching => "teaching",
            RepSource::Bounties => "bounties",
            RepSource::Knowledge => "knowledge",
        }
    }
}

impl fmt::Display for RepSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-agent reputation record
///
/// `reputation` is authoritative. `breakdown` tracks what was credited per
/// source and may diverge from the total once decay has run: decay reduces
/// `reputation` without adjusting `breakdown`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Current reputation; non-negative, adjusted only by credit and decay
    pub reputation: f64,
    /// Accumulated credit per source (informational)
    pub breakdown: HashMap<RepSource, f64>,
    /// Reputation committed to active vouches
    pub staked: f64,
    /// Last reputation-affecting action, epoch milliseconds
    pub last_active_at: u64,
    /// Registration time, epoch milliseconds; immutable
    pub created_at: u64,
}

impl AgentRecord {
    fn new(created_at: u64) -> Self {
        Self {
            reputation: 0.0,
            breakdown: HashMap::new(),
            staked: 0.0,
            last_active_at: created_at,
            created_at,
        }
    }

    /// Reputation not committed to vouches
    pub fn available_to_stake(&self) -> f64 {
        (self.reputation - self.staked).max(0.0)
    }
}

/// The reputation ledger
pub struct ReputationLedger {
    clock: Arc<dyn Clock>,
    config: ReputationConfig,
    records: RwLock<HashMap<String, AgentRecord>>,
}

impl ReputationLedger {
    /// Create an empty ledger
    pub fn new(clock: Arc<dyn Clock>, config: ReputationConfig) -> Self {
        Self {
            clock,
            config,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Create a reputation record for a newly registered agent
    pub async fn register(&self, agent_id: &str, created_at: u64) {
        self.records
            .write()
            .await
            .entry(agent_id.to_string())
            .or_insert_with(|| AgentRecord::new(created_at));
    }

    /// Whether the ledger has a record for this agent
    pub async fn contains(&self, agent_id: &str) -> bool {
        self.records.read().await.contains_key(agent_id)
    }

    /// Credit reputation to an agent under a source tag
    ///
    /// Returns the agent's new reputation total.
    pub async fn credit(
        &self,
        agent_id: &str,
        amount: f64,
        source: RepSource,
    ) -> ReputationResult<f64> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(ReputationError::InvalidAmount(amount));
        }

        let mut records = self.records.write().await;
        let record = records
            .get_mut(agent_id)
            .ok_or_else(|| ReputationError::NotFound(agent_id.to_string()))?;

        record.reputation += amount;
        *record.breakdown.entry(source).or_insert(0.0) += amount;
        record.last_active_at = self.clock.now_ms();

        debug!("Credited {} to {} under {}", amount, agent_id, source);
        Ok(record.reputation)
    }

    /// Apply inactivity decay across all agents
    ///
    /// For every agent inactive longer than the configured threshold, the
    /// reduction is `floor(reputation * rate * (inactive_days - threshold))`
    /// with `inactive_days` counted in whole days. The subtraction of the
    /// threshold inside the multiplier is the contract, quirks included:
    /// decay steps in abruptly once the first whole day past the threshold
    /// elapses. Reductions that compute to zero or less are no-ops,
    /// reputation is clamped at zero, and neither `breakdown` nor `staked`
    /// is touched. An agent may be left with more staked than reputation;
    /// the overdraft stands and only blocks further staking.
    ///
    /// Returns the number of agents that lost reputation.
    pub async fn decay_tick(&self) -> usize {
        let now = self.clock.now_ms();
        let threshold_ms = self.config.decay_threshold_days * DAY_MS;
        let mut decayed = 0;

        let mut records = self.records.write().await;
        for (agent_id, record) in records.iter_mut() {
            let inactive_ms = now.saturating_sub(record.last_active_at);
            if inactive_ms <= threshold_ms {
                continue;
            }

            let inactive_days = inactive_ms / DAY_MS;
            let excess_days = inactive_days.saturating_sub(self.config.decay_threshold_days);
            let reduction =
                (record.reputation * self.config.decay_rate_per_day * excess_days as f64).floor();
            if reduction <= 0.0 {
                continue;
            }

            record.reputation = (record.reputation - reduction).max(0.0);
            decayed += 1;
            debug!(
                "Decayed {} by {} ({} days inactive)",
                agent_id, reduction, inactive_days
            );
        }

        decayed
    }

    /// Reputation the agent can still commit to vouches
    pub async fn available_to_stake(&self, agent_id: &str) -> ReputationResult<f64> {
        let records = self.records.read().await;
        let record = records
            .get(agent_id)
            .ok_or_else(|| ReputationError::NotFound(agent_id.to_string()))?;
        Ok(record.available_to_stake())
    }

    /// Commit reputation to a vouch
    ///
    /// The availability check and the increment happen under one write
    /// guard; concurrent stake calls cannot both pass the check.
    pub async fn stake(&self, agent_id: &str, amount: f64) -> ReputationResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(agent_id)
            .ok_or_else(|| ReputationError::NotFound(agent_id.to_string()))?;

        let available = record.available_to_stake();
        if amount > available {
            return Err(ReputationError::InsufficientReputation {
                available,
                required: amount,
            });
        }

        record.staked += amount;
        record.last_active_at = self.clock.now_ms();
        debug!("Agent {} staked {}", agent_id, amount);
        Ok(())
    }

    /// Snapshot of an agent's record
    pub async fn record(&self, agent_id: &str) -> ReputationResult<AgentRecord> {
        self.records
            .read()
            .await
            .get(agent_id)
            .cloned()
            .ok_or_else(|| ReputationError::NotFound(agent_id.to_string()))
    }

    /// Number of agents with a reputation record
    pub async fn agent_count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Number of agents currently clearing the voting bar
    pub async fn eligible_voter_count(
        &self,
        min_reputation: f64,
        min_account_age_days: u64,
        now: u64,
    ) -> usize {
        self.records
            .read()
            .await
            .values()
            .filter(|r| {
                let age_days = now.saturating_sub(r.created_at) / DAY_MS;
                r.reputation >= min_reputation && age_days >= min_account_age_days
            })
            .count()
    }
}
