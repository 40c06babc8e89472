//! Top-level orchestrator for the wallet programs
//!
//! Runs the wallet creator, scanner and sender side by side, hands each of
//! them the broker settings resolved once at startup, tags their output with
//! the program name and relaunches whichever one exits.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::info;

use super::{ChildEvent, ChildSpec, OutputMode, RestartStrategy, Supervisor};
use crate::config::OrchestratorArgs;
use crate::types::{RelayError, Result};

pub const CREATOR: &str = "CREATOR";
pub const SCANNER: &str = "SCANNER";
pub const SENDER: &str = "SENDER";

/// A named program run by the orchestrator
#[derive(Debug, Clone)]
pub struct ProgramSpec {
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ProgramSpec {
    pub fn new(name: &str, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Supervises one instance of each configured program
pub struct Orchestrator {
    programs: Vec<ProgramSpec>,
    env: Vec<(String, String)>,
    supervisor: Supervisor,
}

impl Orchestrator {
    pub fn new(
        programs: Vec<ProgramSpec>,
        env: Vec<(String, String)>,
        strategy: RestartStrategy,
    ) -> Self {
        Self {
            programs,
            env,
            supervisor: Supervisor::new(strategy),
        }
    }

    /// The creator, scanner and sender, by default found next to this executable
    pub fn from_args(args: &OrchestratorArgs) -> Result<Self> {
        let exe = std::env::current_exe()
            .map_err(|e| RelayError::Process(format!("Cannot locate own executable: {e}")))?;
        let dir = exe
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let resolve = |configured: &Option<PathBuf>, default: &str| {
            configured.clone().unwrap_or_else(|| dir.join(default))
        };

        let programs = vec![
            ProgramSpec::new(CREATOR, resolve(&args.creator_bin, "wallet-creator")),
            ProgramSpec::new(SCANNER, resolve(&args.scanner_bin, "wallet-scanner")),
            ProgramSpec::new(SENDER, resolve(&args.sender_bin, "wallet-sender")),
        ];

        Ok(Self::new(
            programs,
            args.broker.child_env(),
            args.restart.strategy(),
        ))
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<ChildEvent>) -> Self {
        self.supervisor = self.supervisor.with_events(events);
        self
    }

    pub fn programs(&self) -> &[ProgramSpec] {
        &self.programs
    }

    /// Width output tags are padded to, the longest program name
    pub fn tag_width(&self) -> usize {
        self.programs
            .iter()
            .map(|program| program.name.len())
            .max()
            .unwrap_or(0)
    }

    /// Number of programs currently running
    pub fn live_programs(&self) -> usize {
        self.supervisor.live()
    }

    /// Launch every program and relaunch any that exits. Runs forever.
    pub async fn run(&self) -> Result<()> {
        info!("Starting wallet workers...");
        for program in &self.programs {
            info!("  {}: {}", program.name, program.program.display());
        }

        let width = self.tag_width();
        self.supervisor
            .run(self.programs.len(), |slot| {
                let program = &self.programs[slot];
                ChildSpec {
                    name: program.name.clone(),
                    program: program.program.clone(),
                    args: program.args.clone(),
                    envs: self.env.clone(),
                    output: OutputMode::Tagged { width },
                }
            })
            .await
    }
}
