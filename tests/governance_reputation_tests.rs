use std::collections::HashSet;
use std::error::Error;
use std::sync::Arc;

use agora::feed::MessageFeed;
use agora::server::{react_and_credit, AppState};
use agora_core::{Clock, ManualClock, DAY_MS};
use agora_governance::{
    GovernanceConfig, GovernanceError, GovernanceManager, ProposalStatus, ProposalType, VoteChoice,
};
use agora_identity::{Agent, AgentRegistry};
use agora_reputation::{RepSource, ReputationSystem};

struct TestNode {
    clock: Arc<ManualClock>,
    state: AppState,
}

// Helper to create a fully wired node on a manual clock
fn setup_node(sunset_threshold: usize) -> TestNode {
    let clock = Arc::new(ManualClock::new(0));
    let registry = Arc::new(AgentRegistry::new(clock.clone()));
    let reputation = Arc::new(ReputationSystem::new(clock.clone()));
    let feed = Arc::new(MessageFeed::new(clock.clone()));

    let mut config =
        GovernanceConfig::bootstrap(HashSet::from(["founder".to_string()]), clock.now_ms());
    config.agent_count_threshold_for_sunset = sunset_threshold;
    let governance = Arc::new(GovernanceManager::new(
        clock.clone(),
        reputation.clone(),
        config,
    ));

    let state = AppState::new(clock.clone(), registry, reputation, governance, feed);
    TestNode { clock, state }
}

async fn join(node: &TestNode, id: &str, reputation: f64) -> Result<Agent, Box<dyn Error>> {
    let (agent, _api_key) = node.state.registry.register(id, None, None).await?;
    node.state
        .reputation
        .register_agent(&agent.id, agent.created_at)
        .await;
    if reputation > 0.0 {
        node.state
            .reputation
            .credit(id, reputation, RepSource::Bounties)
            .await?;
    }
    Ok(agent)
}

#[tokio::test]
async fn test_full_proposal_lifecycle() -> Result<(), Box<dyn Error>> {
    let node = setup_node(50);

    // 1. A small collective forms
    join(&node, "founder", 400.0).await?;
    join(&node, "alice", 400.0).await?;
    join(&node, "bob", 10_000.0).await?;
    join(&node, "lurker", 5.0).await?;

    // 2. Nobody can propose before the account-age bar clears
    let err = node
        .state
        .governance
        .create_proposal("alice", "Too soon", "D", ProposalType::Standard)
        .await
        .unwrap_err();
    assert!(matches!(err, GovernanceError::Unauthorized(_)));

    node.clock.set(8 * DAY_MS);

    // 3. Alice proposes a breaking change
    let proposal = node
        .state
        .governance
        .create_proposal("alice", "Swap the protocol", "D", ProposalType::Breaking)
        .await?;
    assert_eq!(proposal.status, ProposalStatus::Discussion);

    // 4. Discussion closes; voting opens
    node.clock.set(proposal.discussion_ends_at);

    // alice: sqrt(400) = 20 for; bob: sqrt(10000) = 100 for; lurker has no say
    node.state
        .governance
        .cast_vote(&proposal.id, "alice", VoteChoice::For)
        .await?;
    node.state
        .governance
        .cast_vote(&proposal.id, "bob", VoteChoice::For)
        .await?;
    let err = node
        .state
        .governance
        .cast_vote(&proposal.id, "lurker", VoteChoice::Against)
        .await
        .unwrap_err();
    assert!(matches!(err, GovernanceError::Unauthorized(_)));

    // 5. Bob reconsiders: the replacement vote carries his current weight
    let tallied = node
        .state
        .governance
        .cast_vote(&proposal.id, "bob", VoteChoice::Against)
        .await?;
    assert_eq!(tallied.votes_for, 20.0);
    assert_eq!(tallied.votes_against, 100.0);
    assert_eq!(tallied.voter_count, 2);

    // 6. Voting closes: approval 20/120 < 0.66, the proposal fails
    node.clock.set(proposal.voting_ends_at);
    let resolved = node.state.governance.get_proposal(&proposal.id).await?;
    assert_eq!(resolved.status, ProposalStatus::Failed);

    let result = resolved.result.unwrap();
    assert!(result.approval < 0.2);
    assert_eq!(result.voter_count, 2);

    // 7. Stats reflect the terminal state
    let stats = node.state.governance.stats().await;
    assert_eq!(stats.total_proposals, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.eligible_voters, 3);

    Ok(())
}

#[tokio::test]
async fn test_reactions_feed_the_ledger() -> Result<(), Box<dyn Error>> {
    let node = setup_node(50);

    let author = join(&node, "author", 0.0).await?;
    let fan = join(&node, "fan", 0.0).await?;

    let message = node
        .state
        .feed
        .post_message(&author.id, &author.name, "gm, collective", serde_json::json!({}))
        .await;

    // A reaction from another agent credits the author one upvote
    react_and_credit(&node.state, &message.id, &fan, "🔥").await?;
    let record = node.state.reputation.record("author").await?;
    assert_eq!(record.reputation, 1.0);
    assert_eq!(record.breakdown[&RepSource::Upvotes], 1.0);

    // Self-reactions are recorded but grant nothing
    let updated = react_and_credit(&node.state, &message.id, &author, "😎").await?;
    assert_eq!(updated.reactions.len(), 2);
    assert_eq!(node.state.reputation.record("author").await?.reputation, 1.0);

    Ok(())
}

#[tokio::test]
async fn test_decay_erodes_voting_power() -> Result<(), Box<dyn Error>> {
    let node = setup_node(50);

    join(&node, "fader", 110.0).await?;
    node.clock.set(8 * DAY_MS);
    assert!(node.state.governance.voting_weight("fader").await? > 0.0);

    // A long silence: 57 whole days inactive, reduction floor(110 * 0.5) = 55
    node.clock.set(57 * DAY_MS);
    node.state.reputation.decay_tick().await;

    let record = node.state.reputation.record("fader").await?;
    assert_eq!(record.reputation, 55.0);

    // Below the 100-rep bar the agent no longer carries weight
    assert_eq!(node.state.governance.voting_weight("fader").await?, 0.0);
    let err = node
        .state
        .governance
        .create_proposal("fader", "Faded", "D", ProposalType::Standard)
        .await
        .unwrap_err();
    assert!(matches!(err, GovernanceError::Unauthorized(_)));

    Ok(())
}

#[tokio::test]
async fn test_routine_consensus_and_founder_veto_sunset() -> Result<(), Box<dyn Error>> {
    let node = setup_node(4);

    join(&node, "founder", 400.0).await?;
    join(&node, "alice", 400.0).await?;
    node.clock.set(8 * DAY_MS);

    // 1. An uncontested routine proposal passes silently
    let routine = node
        .state
        .governance
        .create_proposal("alice", "Rotate the logo", "D", ProposalType::Routine)
        .await?;
    node.clock.set(routine.discussion_ends_at);
    assert_eq!(
        node.state.governance.get_proposal(&routine.id).await?.status,
        ProposalStatus::Passed
    );

    // 2. The founder vetoes a live proposal mid-voting
    let contested = node
        .state
        .governance
        .create_proposal("alice", "Dissolve the treasury", "D", ProposalType::Standard)
        .await?;
    node.clock.set(contested.discussion_ends_at);
    node.state
        .governance
        .cast_vote(&contested.id, "alice", VoteChoice::For)
        .await?;

    let vetoed = node
        .state
        .governance
        .veto_proposal(&contested.id, "founder", "existential risk")
        .await?;
    assert_eq!(vetoed.status, ProposalStatus::Vetoed);
    assert_eq!(
        vetoed.result.unwrap().reason.as_deref(),
        Some("existential risk")
    );

    // 3. Growth fires the sunset: the fourth registration ends the veto era
    join(&node, "carol", 0.0).await?;
    join(&node, "dave", 0.0).await?;

    let third = node
        .state
        .governance
        .create_proposal("alice", "Another idea", "D", ProposalType::Standard)
        .await?;
    let err = node
        .state
        .governance
        .veto_proposal(&third.id, "founder", "one more time")
        .await
        .unwrap_err();
    assert!(matches!(err, GovernanceError::VetoExpired));

    let stats = node.state.governance.stats().await;
    assert!(!stats.founder_veto_active);
    assert_eq!(stats.agents_until_sunset, 0);

    Ok(())
}
