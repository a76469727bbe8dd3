//! Observability: tracing subscriber setup and metric definitions.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod metrics;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured `level`. Calling this more
/// than once is an error (the global subscriber can only be set once).
pub fn init(level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => EnvFilter::try_new(directives)?,
        _ => EnvFilter::try_new(level)?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .try_init()?;

    metrics::register_core_metrics();

    tracing::debug!("Observability initialized (level: {})", level);
    Ok(())
}
