use anyhow::{Context, Result};
use clap::Parser;

use repolens::cli::CliApp;
use repolens::cli_types::{Cli, Commands};
use repolens::config::AnalysisConfig;
use repolens::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AnalysisConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    let _guard = init_logging(&config.logging).context("Failed to initialize logging")?;

    let app = CliApp::new(config, cli.verbose, !cli.no_color)?;
    match cli.command {
        Commands::Scan(args) => {
            app.scan(args).await?;
        }
        Commands::Analyze(args) => {
            app.analyze(args).await?;
        }
        Commands::Search(args) => {
            app.search(args).await?;
        }
        Commands::Chunks(args) => {
            app.chunks(args).await?;
        }
        Commands::Persona(args) => {
            app.persona(args).await?;
        }
        Commands::Config => app.show_config()?,
    }

    Ok(())
}
