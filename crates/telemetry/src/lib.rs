//! Tracing subscriber bootstrap.

use anyhow::anyhow;
use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

use folio_kernel::settings::{LogFormat, TelemetrySettings};

/// Install the global subscriber. `RUST_LOG` overrides `log_level`.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let env_filter = build_filter(settings);

    let fmt_layer = match settings.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))?;

    tracing::debug!(
        target: "folio-telemetry",
        format = ?settings.log_format,
        "telemetry initialized"
    );
    Ok(())
}

fn build_filter(settings: &TelemetrySettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| level_filter(&settings.log_level))
}

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}
