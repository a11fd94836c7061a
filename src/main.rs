use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use txrisk_client::cli::{self, Cli, Commands};
use txrisk_client::config::{Config, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let cli = Cli::parse();

    // Setup logging; stdout is reserved for results
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into());
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }

    let variant = cli.variant.unwrap_or(config.form_variant);
    tracing::info!(
        service = %config.scoring_service_url,
        ?variant,
        "Risk analyzer client starting"
    );

    match cli.command.unwrap_or(Commands::Interactive) {
        Commands::Analyze(args) => cli::handle_analyze(&config, variant, &args).await,
        Commands::Interactive => cli::handle_interactive(&config, variant).await,
        Commands::Health => cli::handle_health(&config).await,
        Commands::Config => cli::handle_config_validate(&config, variant),
    }
}
