//! `tracing-subscriber` installation.

use std::sync::OnceLock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

static INSTALLED: OnceLock<bool> = OnceLock::new();

/// Installs a global subscriber filtered by `RUST_LOG` (default `info`).
///
/// Only the first call has an effect. Returns true if this call installed
/// the subscriber; false if one was already present, either from an earlier
/// call or from the host application.
pub fn init_tracing(format: LogFormat) -> bool {
    let mut installed_now = false;
    INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(filter);
        let result = match format {
            LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
            LogFormat::Json => registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init(),
        };
        installed_now = result.is_ok();
        installed_now
    });
    installed_now
}
