//! Node configuration

use serde::{Deserialize, Serialize};

/// Main node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Seconds between reputation decay ticks
    #[serde(default = "default_decay_interval_secs")]
    pub decay_interval_secs: u64,
    /// Agent ids holding the bootstrap veto
    #[serde(default)]
    pub founder_agent_ids: Vec<String>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3333".to_string()
}

fn default_decay_interval_secs() -> u64 {
    3600
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            decay_interval_secs: default_decay_interval_secs(),
            founder_agent_ids: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// Build a config from environment variables, falling back to defaults
    ///
    /// `AGORA_LISTEN_ADDR` overrides the bind address, `AGORA_PORT` just
    /// the port, and `AGORA_FOUNDERS` is a comma-separated list of founder
    /// agent ids.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("AGORA_LISTEN_ADDR") {
            config.listen_addr = addr;
        } else if let Ok(port) = std::env::var("AGORA_PORT") {
            config.listen_addr = format!("0.0.0.0:{}", port);
        }

        if let Ok(founders) = std::env::var("AGORA_FOUNDERS") {
            config.founder_agent_ids = founders
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        config
    }
}
