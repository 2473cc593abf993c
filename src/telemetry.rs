use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset. Statement logging from sqlx is
/// only wanted on demand.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn";

/// Install the global JSON subscriber. `RUST_LOG` overrides
/// `default_filter`. `log` records (the access log, sqlx) are bridged into
/// the same pipeline.
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry(default_filter: &str) -> Result<(), String> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(formatting_layer)
        .try_init()
        .map_err(|e| format!("Failed to install tracing subscriber: {}", e))
}
