//! Core Agora module
//!
//! This module provides fundamental components shared across the Agora
//! workspace: time sources and tracing setup.

pub mod time;

// Re-export key components
pub use time::{timestamp_ms, Clock, ManualClock, SystemClock, DAY_MS, HOUR_MS};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Package description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Initialize tracing for Agora
pub fn init_tracing() {
    use tracing_subscriber::FmtSubscriber;

    // Initialize the default tracing subscriber
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();

    // Set the subscriber as the global default
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global tracing subscriber");
}
