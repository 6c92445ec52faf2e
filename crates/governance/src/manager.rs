//! Governance manager implementation
//!
//! Owns proposal records and the governance configuration, reading live
//! reputation from the ledger whenever it needs a voting weight. Phase
//! transitions are pull-based: every read or mutation first advances the
//! proposal past any deadline the wall clock has crossed, under the same
//! write guard as the mutation itself, so the transition applies exactly
//! once no matter how often or concurrently it is re-evaluated.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use agora_core::{Clock, DAY_MS};
use agora_reputation::ReputationSystem;

use crate::proposals::{
    Objection, Proposal, ProposalResult, ProposalStatus, ProposalType, Vote, VoteChoice,
};
use crate::{GovernanceConfig, GovernanceError, GovernanceResult};

/// Filter for proposal listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProposalFilter {
    /// Only proposals in this status
    pub status: Option<ProposalStatus>,
    /// Only proposals of this type
    #[serde(rename = "type")]
    pub proposal_type: Option<ProposalType>,
    /// Only proposals by this author
    #[serde(rename = "author")]
    pub author_id: Option<String>,
}

/// Governance-wide statistics
#[derive(Debug, Clone, Serialize)]
pub struct GovernanceStats {
    /// Proposals ever created
    pub total_proposals: usize,
    /// Resolved as passed
    pub passed: usize,
    /// Resolved as failed
    pub failed: usize,
    /// Killed by veto
    pub vetoed: usize,
    /// Still in discussion or voting
    pub active: usize,
    /// Whether the founder veto can still be exercised
    pub founder_veto_active: bool,
    /// When the veto expires on its own, epoch milliseconds
    pub founder_veto_expires_at: u64,
    /// Registrations remaining until the population sunset fires
    pub agents_until_sunset: usize,
    /// Agents currently clearing the voting bar
    pub eligible_voters: usize,
}

/// The governance manager
pub struct GovernanceManager {
    clock: Arc<dyn Clock>,
    reputation: Arc<ReputationSystem>,
    config: RwLock<GovernanceConfig>,
    proposals: RwLock<HashMap<String, Proposal>>,
    next_seq: AtomicU64,
}

impl GovernanceManager {
    /// Create a manager over the given reputation system
    pub fn new(
        clock: Arc<dyn Clock>,
        reputation: Arc<ReputationSystem>,
        config: GovernanceConfig,
    ) -> Self {
        Self {
            clock,
            reputation,
            config: RwLock::new(config),
            proposals: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// An agent's voting weight, computed fresh from the ledger
    ///
    /// Zero unless the agent clears both the reputation and account-age
    /// bars; otherwise `min(sqrt(reputation), max_vote_weight)`. Never
    /// cached and never frozen at proposal creation: two votes by the same
    /// agent may carry different weight.
    pub async fn voting_weight(&self, agent_id: &str) -> GovernanceResult<f64> {
        let (min_rep, min_age_days, max_weight) = {
            let config = self.config.read().await;
            (
                config.min_rep_to_vote,
                config.min_account_age_days,
                config.max_vote_weight,
            )
        };

        let record = self.reputation.record(agent_id).await?;
        let age_days = self.clock.now_ms().saturating_sub(record.created_at) / DAY_MS;

        if record.reputation < min_rep || age_days < min_age_days {
            return Ok(0.0);
        }
        Ok(record.reputation.sqrt().min(max_weight))
    }

    /// Create a proposal
    ///
    /// Fails `Unauthorized` when the author carries no voting weight. Phase
    /// deadlines are fixed here from the configured periods.
    pub async fn create_proposal(
        &self,
        author_id: &str,
        title: &str,
        description: &str,
        proposal_type: ProposalType,
    ) -> GovernanceResult<Proposal> {
        self.maybe_sunset().await;

        let weight = self.voting_weight(author_id).await?;
        if weight == 0.0 {
            return Err(GovernanceError::Unauthorized(format!(
                "agent {} has no voting weight",
                author_id
            )));
        }

        let now = self.clock.now_ms();
        let (discussion_period_ms, voting_period_ms) = {
            let config = self.config.read().await;
            (config.discussion_period_ms, config.voting_period_ms)
        };

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("prop-{}", seq);
        let discussion_ends_at = now + discussion_period_ms;

        let proposal = Proposal {
            id: id.clone(),
            title: title.to_string(),
            description: description.to_string(),
            proposal_type,
            author_id: author_id.to_string(),
            status: ProposalStatus::Discussion,
            created_at: now,
            discussion_ends_at,
            voting_ends_at: discussion_ends_at + voting_period_ms,
            approval_threshold: proposal_type.threshold(),
            votes_for: 0.0,
            votes_against: 0.0,
            votes_abstain: 0.0,
            voter_count: 0,
            votes: HashMap::new(),
            objections: Vec::new(),
            result: None,
        };

        self.proposals
            .write()
            .await
            .insert(id.clone(), proposal.clone());

        info!(
            "Agent {} created {} proposal {}: {}",
            author_id, proposal_type, id, title
        );
        Ok(proposal)
    }

    /// Cast or replace a vote
    ///
    /// Only valid while the proposal is in `voting`. A prior vote by the
    /// same agent is withdrawn first: its weight leaves its old bucket
    /// before the new weight, computed fresh at this cast, enters the new
    /// one. The latest vote counts, at the weight it was cast with.
    pub async fn cast_vote(
        &self,
        proposal_id: &str,
        agent_id: &str,
        choice: VoteChoice,
    ) -> GovernanceResult<Proposal> {
        let weight = self.voting_weight(agent_id).await?;
        let now = self.clock.now_ms();

        let mut proposals = self.proposals.write().await;
        let proposal = proposals
            .get_mut(proposal_id)
            .ok_or_else(|| GovernanceError::ProposalNotFound(proposal_id.to_string()))?;

        advance(proposal, now);

        if proposal.status != ProposalStatus::Voting {
            return Err(GovernanceError::WrongPhase(format!(
                "proposal {} is {}, votes are only accepted during voting",
                proposal_id, proposal.status
            )));
        }
        if weight == 0.0 {
            return Err(GovernanceError::Unauthorized(format!(
                "agent {} has no voting weight",
                agent_id
            )));
        }

        if let Some(previous) = proposal.votes.remove(agent_id) {
            match previous.choice {
                VoteChoice::For => proposal.votes_for -= previous.weight,
                VoteChoice::Against => proposal.votes_against -= previous.weight,
                VoteChoice::Abstain => proposal.votes_abstain -= previous.weight,
            }
            proposal.voter_count -= 1;
        }

        match choice {
            VoteChoice::For => proposal.votes_for += weight,
            VoteChoice::Against => proposal.votes_against += weight,
            VoteChoice::Abstain => proposal.votes_abstain += weight,
        }
        proposal.voter_count += 1;
        proposal.votes.insert(
            agent_id.to_string(),
            Vote {
                agent_id: agent_id.to_string(),
                choice,
                weight,
                timestamp: now,
            },
        );

        debug!(
            "Agent {} voted {:?} on {} with weight {}",
            agent_id, choice, proposal_id, weight
        );
        Ok(proposal.clone())
    }

    /// Object to a routine proposal during discussion
    ///
    /// A single objection is sufficient to block at resolution; objections
    /// are not deduplicated.
    pub async fn object_to_proposal(
        &self,
        proposal_id: &str,
        agent_id: &str,
        reason: &str,
    ) -> GovernanceResult<Proposal> {
        let weight = self.voting_weight(agent_id).await?;
        let now = self.clock.now_ms();

        let mut proposals = self.proposals.write().await;
        let proposal = proposals
            .get_mut(proposal_id)
            .ok_or_else(|| GovernanceError::ProposalNotFound(proposal_id.to_string()))?;

        if proposal.proposal_type != ProposalType::Routine {
            return Err(GovernanceError::WrongType(format!(
                "objections only apply to routine proposals, {} is {}",
                proposal_id, proposal.proposal_type
            )));
        }

        advance(proposal, now);

        if proposal.status != ProposalStatus::Discussion {
            return Err(GovernanceError::WrongPhase(format!(
                "proposal {} is {}, objections are only accepted during discussion",
                proposal_id, proposal.status
            )));
        }
        if weight == 0.0 {
            return Err(GovernanceError::Unauthorized(format!(
                "agent {} has no voting weight",
                agent_id
            )));
        }

        proposal.objections.push(Objection {
            agent_id: agent_id.to_string(),
            reason: reason.to_string(),
            timestamp: now,
        });

        info!("Agent {} objected to {}", agent_id, proposal_id);
        Ok(proposal.clone())
    }

    /// Veto a proposal
    ///
    /// Only founders, and only while the bootstrap veto is active. Forces
    /// any live proposal to `vetoed`, overriding an in-progress tally; a
    /// proposal already resolved cannot be vetoed.
    pub async fn veto_proposal(
        &self,
        proposal_id: &str,
        founder_id: &str,
        reason: &str,
    ) -> GovernanceResult<Proposal> {
        self.maybe_sunset().await;

        {
            let config = self.config.read().await;
            if !config.founder_veto_active {
                return Err(GovernanceError::VetoExpired);
            }
            if !config.founder_agent_ids.contains(founder_id) {
                return Err(GovernanceError::Unauthorized(format!(
                    "agent {} is not a founder",
                    founder_id
                )));
            }
        }

        let now = self.clock.now_ms();
        let mut proposals = self.proposals.write().await;
        let proposal = proposals
            .get_mut(proposal_id)
            .ok_or_else(|| GovernanceError::ProposalNotFound(proposal_id.to_string()))?;

        advance(proposal, now);

        if proposal.status.is_terminal() {
            return Err(GovernanceError::WrongPhase(format!(
                "proposal {} is already {}",
                proposal_id, proposal.status
            )));
        }

        finalize(
            proposal,
            ProposalStatus::Vetoed,
            Some(reason.to_string()),
            now,
        );
        info!("Founder {} vetoed {}: {}", founder_id, proposal_id, reason);
        Ok(proposal.clone())
    }

    /// Get a proposal, advancing it past any crossed deadline first
    pub async fn get_proposal(&self, proposal_id: &str) -> GovernanceResult<Proposal> {
        let now = self.clock.now_ms();
        let mut proposals = self.proposals.write().await;
        let proposal = proposals
            .get_mut(proposal_id)
            .ok_or_else(|| GovernanceError::ProposalNotFound(proposal_id.to_string()))?;
        advance(proposal, now);
        Ok(proposal.clone())
    }

    /// List proposals matching a filter, oldest first
    pub async fn list_proposals(&self, filter: &ProposalFilter) -> Vec<Proposal> {
        let now = self.clock.now_ms();
        let mut proposals = self.proposals.write().await;

        let mut matched: Vec<Proposal> = Vec::new();
        for proposal in proposals.values_mut() {
            advance(proposal, now);
            if let Some(status) = filter.status {
                if proposal.status != status {
                    continue;
                }
            }
            if let Some(proposal_type) = filter.proposal_type {
                if proposal.proposal_type != proposal_type {
                    continue;
                }
            }
            if let Some(author_id) = &filter.author_id {
                if &proposal.author_id != author_id {
                    continue;
                }
            }
            matched.push(proposal.clone());
        }

        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        matched
    }

    /// Governance-wide statistics
    pub async fn stats(&self) -> GovernanceStats {
        self.maybe_sunset().await;

        let now = self.clock.now_ms();
        let (total, passed, failed, vetoed, active) = {
            let mut proposals = self.proposals.write().await;
            let mut counts = (0, 0, 0, 0, 0);
            counts.0 = proposals.len();
            for proposal in proposals.values_mut() {
                advance(proposal, now);
                match proposal.status {
                    ProposalStatus::Passed => counts.1 += 1,
                    ProposalStatus::Failed => counts.2 += 1,
                    ProposalStatus::Vetoed => counts.3 += 1,
                    ProposalStatus::Discussion | ProposalStatus::Voting => counts.4 += 1,
                }
            }
            counts
        };

        let config = self.config.read().await.clone();
        let agent_count = self.reputation.agent_count().await;
        let eligible_voters = self
            .reputation
            .eligible_voter_count(config.min_rep_to_vote, config.min_account_age_days, now)
            .await;

        GovernanceStats {
            total_proposals: total,
            passed,
            failed,
            vetoed,
            active,
            founder_veto_active: config.founder_veto_active,
            founder_veto_expires_at: config.founder_veto_expires_at,
            agents_until_sunset: if config.founder_veto_active {
                config
                    .agent_count_threshold_for_sunset
                    .saturating_sub(agent_count)
            } else {
                0
            },
            eligible_voters,
        }
    }

    /// Snapshot of the current configuration
    pub async fn config(&self) -> GovernanceConfig {
        self.config.read().await.clone()
    }

    /// Flip the founder veto off if a sunset condition holds
    ///
    /// One-way and irreversible; runs opportunistically on proposal
    /// creation, stats reads, and veto attempts.
    async fn maybe_sunset(&self) {
        if !self.config.read().await.founder_veto_active {
            return;
        }

        let now = self.clock.now_ms();
        let agent_count = self.reputation.agent_count().await;

        let mut config = self.config.write().await;
        if !config.founder_veto_active {
            return;
        }
        if now >= config.founder_veto_expires_at
            || agent_count >= config.agent_count_threshold_for_sunset
        {
            config.founder_veto_active = false;
            info!(
                "Founder veto sunset ({} agents registered, expiry at {})",
                agent_count, config.founder_veto_expires_at
            );
        }
    }
}

/// Advance a proposal past any deadline `now` has crossed
///
/// Idempotent: terminal proposals are left alone, and `finalize` writes the
/// result exactly once. Called under the proposals write guard before every
/// read or mutation.
fn advance(proposal: &mut Proposal, now: u64) {
    if proposal.status.is_terminal() {
        return;
    }

    if proposal.status == ProposalStatus::Discussion && now >= proposal.discussion_ends_at {
        if proposal.proposal_type == ProposalType::Routine {
            // Lazy consensus: silence is consent, one objection blocks
            let status = if proposal.objections.is_empty() {
                ProposalStatus::Passed
            } else {
                ProposalStatus::Failed
            };
            finalize(proposal, status, None, now);
            return;
        }
        proposal.status = ProposalStatus::Voting;
    }

    if proposal.status == ProposalStatus::Voting && now >= proposal.voting_ends_at {
        // A tie at exactly the threshold fails
        let status = if proposal.approval() > proposal.approval_threshold {
            ProposalStatus::Passed
        } else {
            ProposalStatus::Failed
        };
        finalize(proposal, status, None, now);
    }
}

/// Set a proposal's terminal status and write its result record once
fn finalize(proposal: &mut Proposal, status: ProposalStatus, reason: Option<String>, now: u64) {
    if proposal.result.is_some() {
        return;
    }

    proposal.status = status;
    proposal.result = Some(ProposalResult {
        status,
        approval: proposal.approval(),
        votes_for: proposal.votes_for,
        votes_against: proposal.votes_against,
        votes_abstain: proposal.votes_abstain,
        voter_count: proposal.voter_count,
        reason,
        decided_at: now,
    });
    info!("Proposal {} resolved: {}", proposal.id, status);
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::ManualClock;
    use agora_reputation::RepSource;
    use std::collections::HashSet;

    struct Fixture {
        clock: Arc<ManualClock>,
        reputation: Arc<ReputationSystem>,
        governance: GovernanceManager,
    }

    /// Agents registered at t=0 with the given reputation; the clock is
    /// then moved past the account-age bar so they all carry weight.
    async fn setup(agents: &[(&str, f64)]) -> Fixture {
        setup_with(agents, |_| {}).await
    }

    async fn setup_with<F>(agents: &[(&str, f64)], tweak: F) -> Fixture
    where
        F: FnOnce(&mut GovernanceConfig),
    {
        let clock = Arc::new(ManualClock::new(0));
        let reputation = Arc::new(ReputationSystem::new(clock.clone()));

        for (id, rep) in agents {
            reputation.register_agent(id, 0).await;
            if *rep > 0.0 {
                reputation.credit(id, *rep, RepSource::Bounties).await.unwrap();
            }
        }

        let mut config =
            GovernanceConfig::bootstrap(HashSet::from(["founder".to_string()]), clock.now_ms());
        tweak(&mut config);
        let governance = GovernanceManager::new(clock.clone(), reputation.clone(), config);

        // Clear the 7-day account-age bar
        clock.set(8 * DAY_MS);

        Fixture {
            clock,
            reputation,
            governance,
        }
    }

    #[tokio::test]
    async fn test_voting_weight_formula() {
        let fx = setup(&[("four-hundred", 400.0), ("whale", 20_000.0), ("small", 50.0)]).await;

        assert_eq!(fx.governance.voting_weight("four-hundred").await.unwrap(), 20.0);
        assert_eq!(fx.governance.voting_weight("whale").await.unwrap(), 100.0);
        assert_eq!(fx.governance.voting_weight("small").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_young_account_has_no_weight() {
        let fx = setup(&[("elder", 400.0)]).await;
        fx.reputation.register_agent("newborn", fx.clock.now_ms()).await;
        fx.reputation
            .credit("newborn", 400.0, RepSource::Bounties)
            .await
            .unwrap();

        assert_eq!(fx.governance.voting_weight("newborn").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_create_requires_weight() {
        let fx = setup(&[("author", 400.0), ("nobody", 1.0)]).await;

        let proposal = fx
            .governance
            .create_proposal("author", "Adopt the plan", "Details", ProposalType::Standard)
            .await
            .unwrap();
        assert_eq!(proposal.id, "prop-1");
        assert_eq!(proposal.status, ProposalStatus::Discussion);
        assert_eq!(
            proposal.voting_ends_at - proposal.discussion_ends_at,
            72 * agora_core::HOUR_MS
        );

        let err = fx
            .governance
            .create_proposal("nobody", "No", "No", ProposalType::Standard)
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_vote_rejected_during_discussion() {
        let fx = setup(&[("author", 400.0)]).await;
        let proposal = fx
            .governance
            .create_proposal("author", "T", "D", ProposalType::Standard)
            .await
            .unwrap();

        let err = fx
            .governance
            .cast_vote(&proposal.id, "author", VoteChoice::For)
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::WrongPhase(_)));
    }

    #[tokio::test]
    async fn test_revote_replaces_weight_and_keeps_voter_count() {
        let fx = setup(&[("author", 400.0), ("voter", 400.0)]).await;
        let proposal = fx
            .governance
            .create_proposal("author", "T", "D", ProposalType::Standard)
            .await
            .unwrap();

        fx.clock.set(proposal.discussion_ends_at);
        fx.governance
            .cast_vote(&proposal.id, "voter", VoteChoice::For)
            .await
            .unwrap();

        let after = fx
            .governance
            .cast_vote(&proposal.id, "voter", VoteChoice::Against)
            .await
            .unwrap();
        assert_eq!(after.votes_for, 0.0);
        assert_eq!(after.votes_against, 20.0);
        assert_eq!(after.voter_count, 1);
    }

    #[tokio::test]
    async fn test_revote_uses_fresh_weight() {
        let fx = setup(&[("author", 400.0), ("voter", 400.0)]).await;
        let proposal = fx
            .governance
            .create_proposal("author", "T", "D", ProposalType::Standard)
            .await
            .unwrap();

        fx.clock.set(proposal.discussion_ends_at);
        fx.governance
            .cast_vote(&proposal.id, "voter", VoteChoice::For)
            .await
            .unwrap();

        // Reputation rises between casts; the replacement vote is heavier
        fx.reputation
            .credit("voter", 500.0, RepSource::Bounties)
            .await
            .unwrap();
        let after = fx
            .governance
            .cast_vote(&proposal.id, "voter", VoteChoice::For)
            .await
            .unwrap();
        assert_eq!(after.voter_count, 1);
        assert_eq!(after.votes_for, 900.0_f64.sqrt());
    }

    #[tokio::test]
    async fn test_exact_tie_fails() {
        let fx = setup(&[("author", 400.0), ("yay", 400.0), ("nay", 400.0)]).await;
        let proposal = fx
            .governance
            .create_proposal("author", "T", "D", ProposalType::Standard)
            .await
            .unwrap();

        fx.clock.set(proposal.discussion_ends_at);
        fx.governance
            .cast_vote(&proposal.id, "yay", VoteChoice::For)
            .await
            .unwrap();
        fx.governance
            .cast_vote(&proposal.id, "nay", VoteChoice::Against)
            .await
            .unwrap();

        fx.clock.set(proposal.voting_ends_at);
        let resolved = fx.governance.get_proposal(&proposal.id).await.unwrap();
        assert_eq!(resolved.status, ProposalStatus::Failed);

        let result = resolved.result.unwrap();
        assert_eq!(result.approval, 0.5);
        assert_eq!(result.voter_count, 2);
    }

    #[tokio::test]
    async fn test_unopposed_proposal_passes() {
        let fx = setup(&[("author", 400.0), ("voter", 400.0)]).await;
        let proposal = fx
            .governance
            .create_proposal("author", "T", "D", ProposalType::Breaking)
            .await
            .unwrap();

        fx.clock.set(proposal.discussion_ends_at);
        fx.governance
            .cast_vote(&proposal.id, "voter", VoteChoice::For)
            .await
            .unwrap();

        fx.clock.set(proposal.voting_ends_at);
        let resolved = fx.governance.get_proposal(&proposal.id).await.unwrap();
        assert_eq!(resolved.status, ProposalStatus::Passed);
        assert_eq!(resolved.result.unwrap().approval, 1.0);
    }

    #[tokio::test]
    async fn test_no_votes_fails_with_zero_approval() {
        let fx = setup(&[("author", 400.0)]).await;
        let proposal = fx
            .governance
            .create_proposal("author", "T", "D", ProposalType::Standard)
            .await
            .unwrap();

        fx.clock.set(proposal.voting_ends_at);
        let resolved = fx.governance.get_proposal(&proposal.id).await.unwrap();
        assert_eq!(resolved.status, ProposalStatus::Failed);
        assert_eq!(resolved.result.unwrap().approval, 0.0);
    }

    #[tokio::test]
    async fn test_abstain_counts_participation_not_approval() {
        let fx = setup(&[("author", 400.0), ("yay", 400.0), ("shrug", 400.0)]).await;
        let proposal = fx
            .governance
            .create_proposal("author", "T", "D", ProposalType::Standard)
            .await
            .unwrap();

        fx.clock.set(proposal.discussion_ends_at);
        fx.governance
            .cast_vote(&proposal.id, "yay", VoteChoice::For)
            .await
            .unwrap();
        fx.governance
            .cast_vote(&proposal.id, "shrug", VoteChoice::Abstain)
            .await
            .unwrap();

        fx.clock.set(proposal.voting_ends_at);
        let resolved = fx.governance.get_proposal(&proposal.id).await.unwrap();
        assert_eq!(resolved.status, ProposalStatus::Passed);

        let result = resolved.result.unwrap();
        assert_eq!(result.approval, 1.0);
        assert_eq!(result.voter_count, 2);
        assert_eq!(result.votes_abstain, 20.0);
    }

    #[tokio::test]
    async fn test_routine_lazy_consensus() {
        let fx = setup(&[("author", 400.0), ("critic", 400.0)]).await;

        // Silence is consent
        let quiet = fx
            .governance
            .create_proposal("author", "Tidy the docs", "D", ProposalType::Routine)
            .await
            .unwrap();
        fx.clock.set(quiet.discussion_ends_at);
        let resolved = fx.governance.get_proposal(&quiet.id).await.unwrap();
        assert_eq!(resolved.status, ProposalStatus::Passed);

        // One objection blocks
        let contested = fx
            .governance
            .create_proposal("author", "Rename everything", "D", ProposalType::Routine)
            .await
            .unwrap();
        fx.governance
            .object_to_proposal(&contested.id, "critic", "breaks every link")
            .await
            .unwrap();
        fx.clock.set(contested.discussion_ends_at);
        let resolved = fx.governance.get_proposal(&contested.id).await.unwrap();
        assert_eq!(resolved.status, ProposalStatus::Failed);
    }

    #[tokio::test]
    async fn test_objection_rules() {
        let fx = setup(&[("author", 400.0), ("critic", 400.0), ("nobody", 1.0)]).await;

        let standard = fx
            .governance
            .create_proposal("author", "T", "D", ProposalType::Standard)
            .await
            .unwrap();
        let err = fx
            .governance
            .object_to_proposal(&standard.id, "critic", "no")
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::WrongType(_)));

        let routine = fx
            .governance
            .create_proposal("author", "T", "D", ProposalType::Routine)
            .await
            .unwrap();
        let err = fx
            .governance
            .object_to_proposal(&routine.id, "nobody", "no")
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::Unauthorized(_)));

        // Past discussion the window is closed
        fx.clock.set(routine.discussion_ends_at);
        let err = fx
            .governance
            .object_to_proposal(&routine.id, "critic", "too late")
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::WrongPhase(_)));
    }

    #[tokio::test]
    async fn test_advance_is_idempotent() {
        let fx = setup(&[("author", 400.0)]).await;
        let proposal = fx
            .governance
            .create_proposal("author", "T", "D", ProposalType::Routine)
            .await
            .unwrap();

        fx.clock.set(proposal.discussion_ends_at + 1_000);
        let first = fx.governance.get_proposal(&proposal.id).await.unwrap();

        fx.clock.advance(DAY_MS);
        let second = fx.governance.get_proposal(&proposal.id).await.unwrap();

        assert_eq!(first.status, ProposalStatus::Passed);
        assert_eq!(second.status, ProposalStatus::Passed);
        // The result was written once, at the first crossing
        assert_eq!(
            first.result.unwrap().decided_at,
            second.result.unwrap().decided_at
        );
    }

    #[tokio::test]
    async fn test_veto_overrides_passing_tally() {
        let fx = setup(&[("founder", 400.0), ("voter", 400.0)]).await;
        let proposal = fx
            .governance
            .create_proposal("voter", "T", "D", ProposalType::Standard)
            .await
            .unwrap();

        fx.clock.set(proposal.discussion_ends_at);
        fx.governance
            .cast_vote(&proposal.id, "voter", VoteChoice::For)
            .await
            .unwrap();

        let vetoed = fx
            .governance
            .veto_proposal(&proposal.id, "founder", "not yet")
            .await
            .unwrap();
        assert_eq!(vetoed.status, ProposalStatus::Vetoed);

        let result = vetoed.result.unwrap();
        assert_eq!(result.status, ProposalStatus::Vetoed);
        assert_eq!(result.reason.as_deref(), Some("not yet"));

        // Terminal and immutable: a later read does not re-resolve
        fx.clock.set(proposal.voting_ends_at + 1_000);
        let after = fx.governance.get_proposal(&proposal.id).await.unwrap();
        assert_eq!(after.status, ProposalStatus::Vetoed);
    }

    #[tokio::test]
    async fn test_veto_requires_founder() {
        let fx = setup(&[("founder", 400.0), ("voter", 400.0)]).await;
        let proposal = fx
            .governance
            .create_proposal("voter", "T", "D", ProposalType::Standard)
            .await
            .unwrap();

        let err = fx
            .governance
            .veto_proposal(&proposal.id, "voter", "power grab")
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_veto_rejected_on_resolved_proposal() {
        let fx = setup(&[("founder", 400.0), ("author", 400.0)]).await;
        let proposal = fx
            .governance
            .create_proposal("author", "T", "D", ProposalType::Routine)
            .await
            .unwrap();

        fx.clock.set(proposal.discussion_ends_at);
        let err = fx
            .governance
            .veto_proposal(&proposal.id, "founder", "too late")
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::WrongPhase(_)));
    }

    #[tokio::test]
    async fn test_sunset_by_time() {
        let fx = setup(&[("founder", 400.0), ("author", 400.0)]).await;
        let proposal = fx
            .governance
            .create_proposal("author", "T", "D", ProposalType::Standard)
            .await
            .unwrap();

        let expires_at = fx.governance.config().await.founder_veto_expires_at;
        fx.clock.set(expires_at);

        let err = fx
            .governance
            .veto_proposal(&proposal.id, "founder", "hold on")
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::VetoExpired));
        assert!(!fx.governance.config().await.founder_veto_active);
    }

    #[tokio::test]
    async fn test_sunset_by_population() {
        let fx = setup_with(&[("founder", 400.0), ("author", 400.0)], |config| {
            config.agent_count_threshold_for_sunset = 3;
        })
        .await;
        let proposal = fx
            .governance
            .create_proposal("author", "T", "D", ProposalType::Standard)
            .await
            .unwrap();

        // The third registration crosses the threshold
        fx.reputation.register_agent("third", fx.clock.now_ms()).await;

        let err = fx
            .governance
            .veto_proposal(&proposal.id, "founder", "wait")
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::VetoExpired));

        // One-way: the flag stays off even though time has not expired
        let config = fx.governance.config().await;
        assert!(!config.founder_veto_active);
        assert!(fx.clock.now_ms() < config.founder_veto_expires_at);
    }

    #[tokio::test]
    async fn test_list_filters_and_stats() {
        let fx = setup(&[("author", 400.0), ("other", 400.0)]).await;
        let routine = fx
            .governance
            .create_proposal("author", "R", "D", ProposalType::Routine)
            .await
            .unwrap();
        fx.governance
            .create_proposal("other", "S", "D", ProposalType::Standard)
            .await
            .unwrap();

        fx.clock.set(routine.discussion_ends_at);

        let by_author = fx
            .governance
            .list_proposals(&ProposalFilter {
                author_id: Some("author".to_string()),
                ..Default::default()
            })
            .await;
        assert_eq!(by_author.len(), 1);
        assert_eq!(by_author[0].id, routine.id);

        let passed = fx
            .governance
            .list_proposals(&ProposalFilter {
                status: Some(ProposalStatus::Passed),
                ..Default::default()
            })
            .await;
        assert_eq!(passed.len(), 1);

        let stats = fx.governance.stats().await;
        assert_eq!(stats.total_proposals, 2);
        assert_eq!(stats.passed, 1);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.eligible_voters, 2);
        assert!(stats.founder_veto_active);
        assert_eq!(stats.agents_until_sunset, 48);
    }

    #[tokio::test]
    async fn test_unknown_proposal_and_agent() {
        let fx = setup(&[("author", 400.0)]).await;

        let err = fx.governance.get_proposal("prop-99").await.unwrap_err();
        assert!(matches!(err, GovernanceError::ProposalNotFound(_)));

        let err = fx.governance.voting_weight("ghost").await.unwrap_err();
        assert!(matches!(err, GovernanceError::Reputation(_)));
    }
}
