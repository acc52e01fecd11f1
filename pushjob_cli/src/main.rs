mod cli;
mod coordinator;
mod logging;
mod server;

use clap::Parser;
use cli::Cli;
use coordinator::Coordinator;
use pushjob_core::shutdown_signal;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _log_guard = logging::init(cli.log_level(), cli.log_json, cli.log_dir.as_deref())?;

    let settings = cli.settings()?;
    info!(
        gateway = %settings.push.url(),
        instance = %settings.push.instance(),
        job = %settings.push.job(),
        "Starting pushjob"
    );

    let service = Coordinator::new(settings)?.start().await?;
    service.wait(shutdown_signal()).await;

    Ok(())
}
