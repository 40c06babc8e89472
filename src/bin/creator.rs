//! wallet-creator - relay worker pool for wallet requests
//!
//! Without `WALLET_WORKER_ID` this process is the pool supervisor: it starts
//! one relay worker per CPU (re-executing itself with a worker id set) and
//! replaces any worker that exits. With `WALLET_WORKER_ID` set it is a relay
//! worker consuming `request.wallet`.
//!
//! Environment variables:
//!   RABBIT_PUBLIC_SERVER / _USERNAME / _PASSWORD - inbound broker
//!   RABBIT_PRIVATE_SERVER / _USERNAME / _PASSWORD - outbound broker
//!   WALLET_POOL_SIZE - relay workers (default: number of CPUs)
//!   WALLET_MAX_IN_FLIGHT - concurrent requests per worker (default: 16)
//!   TOP_BLOCK_URL - block API top header endpoint
//!   HEIGHT_LOOKUP_TIMEOUT_MS - block API timeout (default: 30000)
//!   RESTART_STRATEGY - immediate | exponential (default: immediate)

use clap::Parser;
use tracing::{error, info};

use wallet_workers::{
    config::CreatorArgs, logging, relay::RelayWorker, supervisor::WorkerPoolSupervisor,
};

fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Parse arguments
    let args = CreatorArgs::parse();

    // Initialize logging
    logging::init(&args.log_level);

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Request handling runs on one thread per process; lapin drives the
    // broker sockets on its own I/O threads
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match args.worker_id {
        Some(id) => runtime.block_on(run_worker(id, &args)),
        None => runtime.block_on(run_pool(&args)),
    }
}

async fn run_worker(id: u64, args: &CreatorArgs) -> anyhow::Result<()> {
    let config = args.relay_config();

    // Connect to both brokers
    let worker = match RelayWorker::connect(id, &config).await {
        Ok(worker) => worker,
        Err(e) => {
            error!(worker = id, "Error in worker #{}: {}", id, e);
            std::process::exit(1);
        }
    };

    // Consume until the broker cancels us
    if let Err(e) = worker.run().await {
        error!(worker = id, "Error in worker #{}: {}", id, e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run_pool(args: &CreatorArgs) -> anyhow::Result<()> {
    let pool = WorkerPoolSupervisor::for_current_exe(args.pool_size(), args.restart.strategy())?;

    // Run the pool until a shutdown signal
    tokio::select! {
        result = pool.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    Ok(())
}
