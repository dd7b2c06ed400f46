pub mod api_client;
pub mod auth;
pub mod character_fetch;
pub mod config;
pub mod dataset;
pub mod error;
pub mod http_client;
pub mod icons;
pub mod leaderboard;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod roster;
pub mod sync;
pub mod worker_pool;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the fmt subscriber for binaries. `RUST_LOG` overrides the default.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}
