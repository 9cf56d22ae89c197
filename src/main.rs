use clap::Parser;

use jobpoll::cli::{Cli, execute_command, init_logger_from_settings, load_and_merge_config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_and_merge_config(&cli)?;

    // Dry runs only print the checked configuration.
    if !cli.is_dry_run() {
        init_logger_from_settings(&settings)?;
    }

    if let Err(e) = execute_command(&cli, settings).await {
        tracing::error!(error = %e, "Command failed");
        return Err(e.into());
    }

    Ok(())
}
