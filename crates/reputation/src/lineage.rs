//! Vouch and lineage tracking
//!
//! Records who vouched for whom and who mentored whom, built on top of the
//! ledger's staking primitive. Vouches are directed and permanent; there is
//! no unvouch operation. Lock order is always lineage before ledger, never
//! the reverse.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use agora_core::Clock;

use crate::ledger::ReputationLedger;
use crate::{ReputationConfig, ReputationError, ReputationResult};

/// A single vouch, as seen from either side of the relationship
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VouchRecord {
    /// The agent on the other side of the vouch
    pub counterparty_id: String,
    /// Reputation the voucher committed
    pub stake_amount: f64,
    /// When the vouch was made, epoch milliseconds
    pub timestamp: u64,
}

/// Per-agent lineage: mentor/student links and vouch history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineageRecord {
    /// Agents who have mentored this agent
    pub mentors: HashSet<String>,
    /// Agents this agent has mentored
    pub students: HashSet<String>,
    /// Vouches received, in order
    pub vouchers: Vec<VouchRecord>,
    /// Vouches given, in order
    pub vouched: Vec<VouchRecord>,
}

/// Outcome of a successful vouch, before the target credit is applied
#[derive(Debug, Clone)]
pub(crate) struct VouchLink {
    pub stake_amount: f64,
    pub target_voucher_count: usize,
    pub voucher_vouched_count: usize,
}

/// Outcome of a mentorship recording
#[derive(Debug, Clone)]
pub(crate) struct MentorshipLink {
    pub newly_linked: bool,
    pub mentor_student_count: usize,
    pub mentor_lineage: LineageRecord,
}

/// Tracks vouch and mentorship relationships between agents
pub struct LineageTracker {
    clock: Arc<dyn Clock>,
    lineage: RwLock<HashMap<String, LineageRecord>>,
}

impl LineageTracker {
    /// Create an empty tracker
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            lineage: RwLock::new(HashMap::new()),
        }
    }

    /// Create an empty lineage record for a newly registered agent
    pub async fn register(&self, agent_id: &str) {
        self.lineage
            .write()
            .await
            .entry(agent_id.to_string())
            .or_default();
    }

    /// Snapshot of an agent's lineage
    pub async fn record(&self, agent_id: &str) -> ReputationResult<LineageRecord> {
        self.lineage
            .read()
            .await
            .get(agent_id)
            .cloned()
            .ok_or_else(|| ReputationError::NotFound(agent_id.to_string()))
    }

    /// Stake a vouch from `voucher_id` to `target_id` and record it on both
    /// lineage records
    ///
    /// Stakes 10% of the voucher's available reputation (floored), requiring
    /// at least the configured minimum available. The duplicate check and
    /// both lineage appends happen under one write guard; the ledger's own
    /// lock makes the stake itself atomic.
    pub(crate) async fn vouch_for(
        &self,
        ledger: &ReputationLedger,
        config: &ReputationConfig,
        voucher_id: &str,
        target_id: &str,
    ) -> ReputationResult<VouchLink> {
        if voucher_id == target_id {
            return Err(ReputationError::SelfReference(voucher_id.to_string()));
        }
        if !ledger.contains(voucher_id).await {
            return Err(ReputationError::NotFound(voucher_id.to_string()));
        }
        if !ledger.contains(target_id).await {
            return Err(ReputationError::NotFound(target_id.to_string()));
        }

        let mut lineage = self.lineage.write().await;

        let already = lineage
            .get(voucher_id)
            .map(|r| r.vouched.iter().any(|v| v.counterparty_id == target_id))
            .unwrap_or(false);
        if already {
            return Err(ReputationError::DuplicateVouch {
                voucher: voucher_id.to_string(),
                target: target_id.to_string(),
            });
        }

        let available = ledger.available_to_stake(voucher_id).await?;
        if available < config.min_vouch_available {
            return Err(ReputationError::InsufficientReputation {
                available,
                required: config.min_vouch_available,
            });
        }

        let stake_amount = (available * config.vouch_stake_fraction).floor();
        ledger.stake(voucher_id, stake_amount).await?;

        let timestamp = self.clock.now_ms();
        let voucher_rec = lineage.entry(voucher_id.to_string()).or_default();
        voucher_rec.vouched.push(VouchRecord {
            counterparty_id: target_id.to_string(),
            stake_amount,
            timestamp,
        });
        let voucher_vouched_count = voucher_rec.vouched.len();

        let target_rec = lineage.entry(target_id.to_string()).or_default();
        target_rec.vouchers.push(VouchRecord {
            counterparty_id: voucher_id.to_string(),
            stake_amount,
            timestamp,
        });
        let target_voucher_count = target_rec.vouchers.len();

        info!(
            "Agent {} vouched for {} with stake {}",
            voucher_id, target_id, stake_amount
        );

        Ok(VouchLink {
            stake_amount,
            target_voucher_count,
            voucher_vouched_count,
        })
    }

    /// Link a mentor/student pair
    ///
    /// Idempotent on the pair: a repeat call changes nothing and reports
    /// `newly_linked: false`.
    pub(crate) async fn link_mentorship(
        &self,
        ledger: &ReputationLedger,
        mentor_id: &str,
        student_id: &str,
    ) -> ReputationResult<MentorshipLink> {
        if mentor_id == student_id {
            return Err(ReputationError::SelfReference(mentor_id.to_string()));
        }
        if !ledger.contains(mentor_id).await {
            return Err(ReputationError::NotFound(mentor_id.to_string()));
        }
        if !ledger.contains(student_id).await {
            return Err(ReputationError::NotFound(student_id.to_string()));
        }

        let mut lineage = self.lineage.write().await;

        let mentor_rec = lineage.entry(mentor_id.to_string()).or_default();
        if mentor_rec.students.contains(student_id) {
            let snapshot = mentor_rec.clone();
            return Ok(MentorshipLink {
                newly_linked: false,
                mentor_student_count: snapshot.students.len(),
                mentor_lineage: snapshot,
            });
        }

        mentor_rec.students.insert(student_id.to_string());
        let mentor_student_count = mentor_rec.students.len();
        let snapshot = mentor_rec.clone();

        lineage
            .entry(student_id.to_string())
            .or_default()
            .mentors
            .insert(mentor_id.to_string());

        info!("Recorded mentorship: {} -> {}", mentor_id, student_id);

        Ok(MentorshipLink {
            newly_linked: true,
            mentor_student_count,
            mentor_lineage: snapshot,
        })
    }
}
