//! Diabetes MLOps - Main Entry Point
//!
//! Validate, train, predict and serve from one binary.

use clap::Parser;
use diabetes_mlops::cli::{cmd_predict, cmd_serve, cmd_train, cmd_validate, show_help, Cli, Commands};
use diabetes_mlops::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "diabetes_mlops=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let base = AppConfig::from_env()?;

    let Some(command) = cli.command else {
        show_help();
        return Ok(());
    };
    let config = command.apply(base);

    match command {
        Commands::Validate { .. } => {
            tokio::task::spawn_blocking(move || cmd_validate(&config)).await??;
        }
        // The tracker uses a blocking HTTP client, which must not run on a runtime thread
        Commands::Train { .. } => {
            tokio::task::spawn_blocking(move || cmd_train(&config)).await??;
        }
        Commands::Predict { .. } => {
            tokio::task::spawn_blocking(move || cmd_predict(&config)).await??;
        }
        Commands::Serve { .. } => {
            cmd_serve(&config).await?;
        }
    }

    Ok(())
}
