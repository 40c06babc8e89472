//! Relay worker pool
//!
//! Runs one relay worker process per CPU. Each launch re-executes the
//! current program with a fresh worker id in the environment; a worker that
//! exits is logged and replaced by exactly one new worker.

use std::ffi::OsString;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::info;

use super::{ChildEvent, ChildSpec, OutputMode, RestartStrategy, Supervisor};
use crate::config::WORKER_ID_ENV;
use crate::types::{RelayError, Result};

/// Keeps `size` relay worker processes alive
pub struct WorkerPoolSupervisor {
    size: usize,
    program: PathBuf,
    args: Vec<OsString>,
    supervisor: Supervisor,
}

impl WorkerPoolSupervisor {
    pub fn new(
        size: usize,
        program: impl Into<PathBuf>,
        args: Vec<OsString>,
        strategy: RestartStrategy,
    ) -> Self {
        Self {
            size,
            program: program.into(),
            args,
            supervisor: Supervisor::new(strategy),
        }
    }

    /// Pool whose workers are the running executable with the same arguments
    pub fn for_current_exe(size: usize, strategy: RestartStrategy) -> Result<Self> {
        let program = std::env::current_exe()
            .map_err(|e| RelayError::Process(format!("Cannot locate own executable: {e}")))?;
        let args = std::env::args_os().skip(1).collect();
        Ok(Self::new(size, program, args, strategy))
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<ChildEvent>) -> Self {
        self.supervisor = self.supervisor.with_events(events);
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of worker processes currently running
    pub fn live_workers(&self) -> usize {
        self.supervisor.live()
    }

    /// Launch the pool and keep it at full size
    pub async fn run(&self) -> Result<()> {
        info!("Starting {} relay workers", self.size);

        let mut next_id: u64 = 0;
        self.supervisor
            .run(self.size, |_slot| {
                next_id += 1;
                ChildSpec {
                    name: format!("worker #{next_id}"),
                    program: self.program.clone(),
                    args: self.args.clone(),
                    envs: vec![(WORKER_ID_ENV.to_string(), next_id.to_string())],
                    output: OutputMode::Inherit,
                }
            })
            .await
    }
}
