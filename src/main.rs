use anyhow::Context;
use folio_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load Folio settings")?;
    folio_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        database = ?settings.database.backend,
        cache = ?settings.cache.backend,
        "folio-app starting"
    );

    folio_app::serve(&settings).await
}
