//! Development-time tracing for debugging resolution cycles.
//!
//! Diagnostics only: resolution auditing that is part of the product
//! lives in [`crate::core::resolver::ResolutionLog`], unaffected by
//! `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber for the CLI.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset. Output: stderr,
/// compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=resolver=debug cargo run -- resolve --query "cs=matrix"
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
