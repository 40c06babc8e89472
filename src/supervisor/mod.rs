//! Process supervision
//!
//! Keeps a fixed set of child processes alive: every child that exits, for
//! whatever reason, is relaunched in the same slot after the delay chosen by
//! the [`RestartStrategy`]. Used at two levels:
//!
//! - `orchestrator` - the creator, scanner and sender programs
//! - `pool` - one relay worker process per CPU inside the creator

pub mod child;
pub mod orchestrator;
pub mod pool;
pub mod restart;

pub use child::{format_tagged, forward_lines, ChildSpec, ExitCause, OutputMode};
pub use orchestrator::{Orchestrator, ProgramSpec};
pub use pool::WorkerPoolSupervisor;
pub use restart::{RestartStrategy, RestartTracker, SPAWN_RETRY_FLOOR};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::types::{RelayError, Result};

/// Lifecycle notifications, mainly for tests and diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildEvent {
    Started {
        name: String,
        pid: Option<u32>,
    },
    Exited {
        name: String,
        pid: Option<u32>,
        cause: ExitCause,
    },
}

/// One finished incarnation of a slot
struct SlotExit {
    slot: usize,
    name: String,
    pid: Option<u32>,
    cause: ExitCause,
    uptime: Duration,
}

/// Restarts children forever
pub struct Supervisor {
    strategy: RestartStrategy,
    live: Arc<AtomicUsize>,
    events: Option<mpsc::UnboundedSender<ChildEvent>>,
}

impl Supervisor {
    pub fn new(strategy: RestartStrategy) -> Self {
        Self {
            strategy,
            live: Arc::new(AtomicUsize::new(0)),
            events: None,
        }
    }

    /// Send lifecycle events to `events`
    pub fn with_events(mut self, events: mpsc::UnboundedSender<ChildEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Launch `slots` children and relaunch each one whenever it exits.
    ///
    /// `spec_for(slot)` is called for every launch, so a slot may get a fresh
    /// identity per incarnation. Only returns if `slots` is zero or a
    /// supervision task fails.
    pub async fn run<F>(&self, slots: usize, mut spec_for: F) -> Result<()>
    where
        F: FnMut(usize) -> ChildSpec,
    {
        let mut running = JoinSet::new();
        let mut trackers = vec![RestartTracker::new(self.strategy); slots];

        for slot in 0..slots {
            self.start(&mut running, slot, spec_for(slot), Duration::ZERO);
        }

        while let Some(joined) = running.join_next().await {
            let exit = joined
                .map_err(|e| RelayError::Internal(format!("Supervision task failed: {e}")))?;

            match exit.pid {
                Some(pid) => warn!(pid, "{} (pid {}) died: {}", exit.name, pid, exit.cause),
                None => error!("{} died: {}", exit.name, exit.cause),
            }

            let mut delay = trackers[exit.slot].next_delay(exit.uptime);
            if matches!(exit.cause, ExitCause::SpawnFailed(_)) {
                delay = delay.max(SPAWN_RETRY_FLOOR);
            }
            if !delay.is_zero() {
                info!("Restarting slot {} in {:?}", exit.slot, delay);
            }

            self.start(&mut running, exit.slot, spec_for(exit.slot), delay);
        }

        Ok(())
    }

    fn start(&self, running: &mut JoinSet<SlotExit>, slot: usize, spec: ChildSpec, delay: Duration) {
        let live = Arc::clone(&self.live);
        let events = self.events.clone();

        running.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let child = match child::launch(&spec) {
                Ok(child) => child,
                Err(e) => {
                    let cause = ExitCause::SpawnFailed(e.to_string());
                    emit(&events, ChildEvent::Exited {
                        name: spec.name.clone(),
                        pid: None,
                        cause: cause.clone(),
                    });
                    return SlotExit {
                        slot,
                        name: spec.name,
                        pid: None,
                        cause,
                        uptime: Duration::ZERO,
                    };
                }
            };

            let pid = child.pid();
            live.fetch_add(1, Ordering::SeqCst);
            info!(pid = ?pid, "Started {} ({})", spec.name, spec.program.display());
            emit(&events, ChildEvent::Started {
                name: spec.name.clone(),
                pid,
            });

            let (cause, uptime) = child.wait().await;

            live.fetch_sub(1, Ordering::SeqCst);
            emit(&events, ChildEvent::Exited {
                name: spec.name.clone(),
                pid,
                cause: cause.clone(),
            });

            SlotExit {
                slot,
                name: spec.name,
                pid,
                cause,
                uptime,
            }
        });
    }
}

fn emit(events: &Option<mpsc::UnboundedSender<ChildEvent>>, event: ChildEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}
