//! Shared plumbing for the `msgq-server` and `msgq-client` binaries

pub mod config;

use tracing::Level;

/// Install the stderr log subscriber
///
/// `RUST_LOG` adds to the default level, e.g. `RUST_LOG=debug`.
pub fn init_logging(default_level: Level) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .init();
}
