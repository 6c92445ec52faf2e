//! Governance module for Agora
//!
//! This module provides the proposal and voting machinery for the
//! collective: a phased proposal state machine with type-dependent approval
//! thresholds, lazy consensus for routine decisions, reputation-derived
//! voting weight, and a founder veto that sunsets irreversibly by time or
//! population growth.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use agora_core::{DAY_MS, HOUR_MS};
use agora_reputation::ReputationError;

pub mod manager;
pub mod proposals;

// Re-exports
pub use manager::{GovernanceManager, GovernanceStats, ProposalFilter};
pub use proposals::{
    Objection, Proposal, ProposalResult, ProposalStatus, ProposalType, Vote, VoteChoice,
};

/// Error types for governance operations
#[derive(Error, Debug)]
pub enum GovernanceError {
    /// No proposal with this id
    #[error("Proposal not found: {0}")]
    ProposalNotFound(String),

    /// Insufficient weight to vote/object/propose, or a non-founder veto
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Action attempted outside its valid phase
    #[error("Wrong phase: {0}")]
    WrongPhase(String),

    /// Objection on a non-routine proposal
    #[error("Wrong proposal type: {0}")]
    WrongType(String),

    /// Veto attempted after the sunset condition fired
    #[error("Founder veto is no longer active")]
    VetoExpired,

    /// Error from the reputation ledger
    #[error("Reputation error: {0}")]
    Reputation(#[from] ReputationError),
}

/// Result type for governance operations
pub type GovernanceResult<T> = Result<T, GovernanceError>;

/// Process-wide governance configuration
///
/// Initialized once at bootstrap; the only mutation afterwards is the
/// sunset check flipping `founder_veto_active` from true to false, exactly
/// once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Minimum reputation required to carry voting weight
    pub min_rep_to_vote: f64,
    /// Minimum account age in days required to carry voting weight
    pub min_account_age_days: u64,
    /// Length of the discussion phase, milliseconds
    pub discussion_period_ms: u64,
    /// Length of the voting phase, milliseconds
    pub voting_period_ms: u64,
    /// Cap on a single agent's voting weight
    pub max_vote_weight: f64,
    /// Whether the founder veto can still be exercised; one-way true -> false
    pub founder_veto_active: bool,
    /// When the veto expires on its own, epoch milliseconds
    pub founder_veto_expires_at: u64,
    /// Agents allowed to veto while the veto is active
    pub founder_agent_ids: HashSet<String>,
    /// Registered-agent count at which the veto sunsets early
    pub agent_count_threshold_for_sunset: usize,
}

impl GovernanceConfig {
    /// Bootstrap configuration for a new collective
    pub fn bootstrap(founder_agent_ids: HashSet<String>, now_ms: u64) -> Self {
        Self {
            min_rep_to_vote: 100.0,                        // proven contributors only
            min_account_age_days: 7,                       // no drive-by voting
            discussion_period_ms: 24 * HOUR_MS,            // one day to discuss
            voting_period_ms: 72 * HOUR_MS,                // three days to vote
            max_vote_weight: 100.0,                        // dampen plutocracy
            founder_veto_active: true,
            founder_veto_expires_at: now_ms + 90 * DAY_MS, // bootstrap window
            founder_agent_ids,
            agent_count_threshold_for_sunset: 50,          // community outgrows founders
        }
    }
}
