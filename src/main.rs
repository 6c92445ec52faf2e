use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use agora::config::NodeConfig;
use agora::feed::MessageFeed;
use agora::server::{self, AppState};
use agora_core::{Clock, SystemClock};
use agora_governance::{GovernanceConfig, GovernanceManager};
use agora_identity::AgentRegistry;
use agora_reputation::ReputationSystem;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    agora_core::init_tracing();

    let config = NodeConfig::from_env();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let registry = Arc::new(AgentRegistry::new(clock.clone()));
    let reputation = Arc::new(ReputationSystem::new(clock.clone()));
    let feed = Arc::new(MessageFeed::new(clock.clone()));

    let founders: HashSet<String> = config.founder_agent_ids.iter().cloned().collect();
    let governance_config = GovernanceConfig::bootstrap(founders, clock.now_ms());
    let governance = Arc::new(GovernanceManager::new(
        clock.clone(),
        reputation.clone(),
        governance_config,
    ));

    // Reputation decays on a fixed interval, independent of request traffic
    let decay_system = reputation.clone();
    let decay_interval = Duration::from_secs(config.decay_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(decay_interval);
        loop {
            ticker.tick().await;
            let decayed = decay_system.decay_tick().await;
            if decayed > 0 {
                info!("Decay tick reduced reputation for {} agents", decayed);
            }
        }
    });

    let state = AppState::new(clock, registry, reputation, governance, feed);
    let app = server::router(state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    info!("Agora node listening on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
