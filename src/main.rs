//! thyroid-dx - Main Entry Point

use clap::Parser;
use thyroid_dx::cli::{cmd_info, cmd_predict, cmd_preprocess, cmd_train, Cli, Commands, TrainArgs};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "thyroid_dx=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train { data, model_dir, seed, config, no_balance, models } => {
            cmd_train(&TrainArgs { data, model_dir, seed, config, no_balance, models })?;
        }
        Commands::Predict { model, data, output, limit } => {
            cmd_predict(&model, &data, output.as_deref(), limit)?;
        }
        Commands::Preprocess { data, output } => {
            cmd_preprocess(&data, &output)?;
        }
        Commands::Info { data } => {
            cmd_info(&data)?;
        }
    }

    Ok(())
}
