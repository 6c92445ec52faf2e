//! Agora node
//!
//! The node wires the agent registry, reputation system, governance
//! manager, and message feed behind an HTTP/WebSocket transport, and runs
//! the background reputation decay task.

pub mod config;
pub mod feed;
pub mod server;

// Re-exports
pub use config::NodeConfig;
pub use feed::{FeedQuery, Message, MessageFeed};
pub use server::{router, AppState};
