//! wallet-workers - runs the wallet creator, scanner and sender
//!
//! Each program's stdout is re-emitted with a `[NAME]` prefix; any program
//! that exits is started again.

use clap::Parser;
use tracing::{error, info};

use wallet_workers::{config::OrchestratorArgs, logging, supervisor::Orchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Parse arguments
    let args = OrchestratorArgs::parse();

    // Initialize logging
    logging::init(&args.log_level);

    // Resolve the supervised programs
    let orchestrator = Orchestrator::from_args(&args)?;

    // Supervise until a shutdown signal
    tokio::select! {
        result = orchestrator.run() => {
            if let Err(e) = &result {
                error!("Orchestrator stopped: {}", e);
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    Ok(())
}
