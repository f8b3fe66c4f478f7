//! folio-cli: serve the catalog, apply migrations, or inspect settings.

use anyhow::Context;
use clap::{Parser, Subcommand};

use folio_kernel::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "folio-cli", version, about = "Folio book review catalog", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Run the HTTP server until Ctrl+C or SIGTERM
    Serve {
        /// Override `server.host`
        #[arg(long)]
        host: Option<String>,
        /// Override `server.port`
        #[arg(long, short)]
        port: Option<u16>,
    },
    /// Apply pending database migrations and exit
    Migrate,
    /// Print the effective settings as JSON
    Config,
}

impl Command {
    fn apply_overrides(&self, settings: &mut Settings) {
        if let Command::Serve { host, port } = self {
            if let Some(host) = host {
                settings.server.host = host.clone();
            }
            if let Some(port) = port {
                settings.server.port = *port;
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load().context("failed to load Folio settings")?;
    cli.command.apply_overrides(&mut settings);

    match cli.command {
        Command::Serve { .. } => {
            folio_telemetry::init(&settings.telemetry)?;
            folio_app::serve(&settings).await?;
        }
        Command::Migrate => {
            folio_telemetry::init(&settings.telemetry)?;
            let applied = folio_app::migrate(&settings).await?;
            tracing::info!(applied, "migrations applied");
        }
        Command::Config => {
            let rendered = serde_json::to_string_pretty(&settings)
                .context("failed to render settings")?;
            println!("{rendered}");
        }
    }

    Ok(())
}
