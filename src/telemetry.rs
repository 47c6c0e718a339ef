use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::ObservabilityConfig;
use crate::workflow::ActionKind;

/// Initialize structured logging. `RUST_LOG` wins over the configured level.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }

    tracing::debug!("Gold Smith telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking the calls of one session
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering every call made by one guarded action session
pub fn create_action_span(action: ActionKind, target_id: &str, correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "guarded_action",
        action = %action,
        target.id = target_id,
        correlation.id = correlation_id,
    )
}
