//! Proposal and vote records
//!
//! A proposal moves `discussion -> voting -> {passed, failed}`, with
//! `vetoed` reachable from either live phase while the founder veto is
//! active. `routine` proposals never enter the formal voting phase: at the
//! end of discussion they resolve by lazy consensus, where silence is
//! consent and a single objection blocks.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Types of proposals, fixing the approval threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalType {
    /// Low-stakes change, resolved by lazy consensus at discussion end
    Routine,
    /// Ordinary decision, simple majority
    Standard,
    /// Backwards-incompatible change, two-thirds majority
    Breaking,
    /// Change to the rules themselves, three-quarters majority
    Constitutional,
}

impl ProposalType {
    /// Approval ratio the `for` share must strictly exceed
    ///
    /// Unused for `routine`: its outcome is objection-based, not
    /// ratio-based.
    pub fn threshold(&self) -> f64 {
        match self {
            ProposalType::Routine => 0.0,
            ProposalType::Standard => 0.50,
            ProposalType::Breaking => 0.66,
            ProposalType::Constitutional => 0.75,
        }
    }
}

impl fmt::Display for ProposalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProposalType::Routine => "routine",
            ProposalType::Standard => "standard",
            ProposalType::Breaking => "breaking",
            ProposalType::Constitutional => "constitutional",
        };
        f.write_str(s)
    }
}

/// Status of a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    /// Open for discussion and, for routine proposals, objections
    Discussion,
    /// Open for voting
    Voting,
    /// Approved
    Passed,
    /// Rejected
    Failed,
    /// Killed by a founder veto
    Vetoed,
}

impl ProposalStatus {
    /// Whether this status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposalStatus::Passed | ProposalStatus::Failed | ProposalStatus::Vetoed
        )
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProposalStatus::Discussion => "discussion",
            ProposalStatus::Voting => "voting",
            ProposalStatus::Passed => "passed",
            ProposalStatus::Failed => "failed",
            ProposalStatus::Vetoed => "vetoed",
        };
        f.write_str(s)
    }
}

/// A vote choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    /// In favor
    For,
    /// Opposed
    Against,
    /// Counted for participation, not for the ratio
    Abstain,
}

/// A cast vote; at most one live vote per agent per proposal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    /// Who voted
    pub agent_id: String,
    /// The choice
    pub choice: VoteChoice,
    /// Voting weight at the moment this vote was cast
    pub weight: f64,
    /// When the vote was cast, epoch milliseconds
    pub timestamp: u64,
}

/// An objection to a routine proposal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objection {
    /// Who objected
    pub agent_id: String,
    /// Why
    pub reason: String,
    /// When, epoch milliseconds
    pub timestamp: u64,
}

/// The record set exactly once when a proposal reaches a terminal state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalResult {
    /// Terminal status
    pub status: ProposalStatus,
    /// `for / (for + against)` at resolution; 0 when nobody took a side
    pub approval: f64,
    /// Weight sum in favor
    pub votes_for: f64,
    /// Weight sum opposed
    pub votes_against: f64,
    /// Weight sum abstaining
    pub votes_abstain: f64,
    /// Distinct agents with a live vote
    pub voter_count: usize,
    /// Veto reason, when vetoed
    pub reason: Option<String>,
    /// When the proposal resolved, epoch milliseconds
    pub decided_at: u64,
}

/// A governance proposal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    /// Sequential human-readable id
    pub id: String,
    /// Title
    pub title: String,
    /// Detailed description
    pub description: String,
    /// Type, fixing the approval rule
    pub proposal_type: ProposalType,
    /// Who proposed it
    pub author_id: String,
    /// Current status; recomputed lazily on every access
    pub status: ProposalStatus,
    /// When the proposal was created, epoch milliseconds
    pub created_at: u64,
    /// When discussion closes, fixed at creation
    pub discussion_ends_at: u64,
    /// When voting closes, fixed at creation
    pub voting_ends_at: u64,
    /// Approval ratio the `for` share must strictly exceed, fixed by type
    pub approval_threshold: f64,
    /// Weight sum in favor
    pub votes_for: f64,
    /// Weight sum opposed
    pub votes_against: f64,
    /// Weight sum abstaining
    pub votes_abstain: f64,
    /// Distinct agents with a live vote
    pub voter_count: usize,
    /// Live votes keyed by agent id
    pub votes: HashMap<String, Vote>,
    /// Objections; only populated for routine proposals during discussion
    pub objections: Vec<Objection>,
    /// Set exactly once at the terminal transition; immutable afterwards
    pub result: Option<ProposalResult>,
}

impl Proposal {
    /// The current approval ratio; 0 when nobody has taken a side
    pub fn approval(&self) -> f64 {
        let decided = self.votes_for + self.votes_against;
        if decided > 0.0 {
            self.votes_for / decided
        } else {
            0.0
        }
    }
}
