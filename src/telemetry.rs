use crate::config::LOG_ENV_VAR;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Tracing target for the append-only audit trail.
pub const AUDIT_TARGET: &str = "farepay::audit";

/// Initialize tracing from `FAREPAY_LOG`, defaulting to `info`.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
