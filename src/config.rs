//! Configuration for the wallet workers
//!
//! Environment variable handling using clap. Every setting has a default so
//! the workers start against a local broker with no configuration at all.
//! Settings are resolved once at startup into immutable structs that are
//! passed by reference to the components that need them.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::broker::BrokerEndpoint;
use crate::supervisor::RestartStrategy;
use crate::types::{RelayError, Result};

/// Queue carrying wallet creation requests (inbound, non-durable)
pub const CREATION_QUEUE: &str = "request.wallet";

/// Queue carrying scan jobs for the wallet scanner (outbound, durable)
pub const SCAN_QUEUE: &str = "scan.wallet";

/// Endpoint returning the current top block header
pub const DEFAULT_TOP_BLOCK_URL: &str = "https://blockapi.turtlepay.io/block/header/top";

/// Environment variable a pool worker reads its identity from
pub const WORKER_ID_ENV: &str = "WALLET_WORKER_ID";

/// Broker connection settings for the public (inbound) and private (outbound) brokers
#[derive(Parser, Debug, Clone)]
pub struct BrokerArgs {
    /// Inbound broker host
    #[arg(long, env = "RABBIT_PUBLIC_SERVER", default_value = "localhost")]
    pub public_server: String,

    /// Inbound broker username (credentials are only used when both are set)
    #[arg(long, env = "RABBIT_PUBLIC_USERNAME", default_value = "")]
    pub public_username: String,

    /// Inbound broker password
    #[arg(long, env = "RABBIT_PUBLIC_PASSWORD", default_value = "", hide_env_values = true)]
    pub public_password: String,

    /// Outbound broker host
    #[arg(long, env = "RABBIT_PRIVATE_SERVER", default_value = "localhost")]
    pub private_server: String,

    /// Outbound broker username
    #[arg(long, env = "RABBIT_PRIVATE_USERNAME", default_value = "")]
    pub private_username: String,

    /// Outbound broker password
    #[arg(long, env = "RABBIT_PRIVATE_PASSWORD", default_value = "", hide_env_values = true)]
    pub private_password: String,
}

impl BrokerArgs {
    pub fn public_endpoint(&self) -> BrokerEndpoint {
        BrokerEndpoint::new(&self.public_server, &self.public_username, &self.public_password)
    }

    pub fn private_endpoint(&self) -> BrokerEndpoint {
        BrokerEndpoint::new(
            &self.private_server,
            &self.private_username,
            &self.private_password,
        )
    }

    /// Resolved settings as environment variables for child programs
    pub fn child_env(&self) -> Vec<(String, String)> {
        [
            ("RABBIT_PUBLIC_SERVER", &self.public_server),
            ("RABBIT_PUBLIC_USERNAME", &self.public_username),
            ("RABBIT_PUBLIC_PASSWORD", &self.public_password),
            ("RABBIT_PRIVATE_SERVER", &self.private_server),
            ("RABBIT_PRIVATE_USERNAME", &self.private_username),
            ("RABBIT_PRIVATE_PASSWORD", &self.private_password),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
    }
}

/// Restart strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RestartMode {
    /// Relaunch as soon as a child exits
    Immediate,
    /// Back off exponentially while a child keeps crashing
    Exponential,
}

/// Restart settings shared by the orchestrator and the worker pool
#[derive(Parser, Debug, Clone)]
pub struct RestartArgs {
    /// How exited children are relaunched
    #[arg(long, env = "RESTART_STRATEGY", value_enum, default_value = "immediate")]
    pub restart_strategy: RestartMode,

    /// First delay of the exponential strategy in milliseconds
    #[arg(long, env = "RESTART_BACKOFF_INITIAL_MS", default_value = "500")]
    pub restart_backoff_initial_ms: u64,

    /// Upper bound of the exponential strategy in milliseconds
    #[arg(long, env = "RESTART_BACKOFF_MAX_MS", default_value = "30000")]
    pub restart_backoff_max_ms: u64,
}

impl RestartArgs {
    pub fn strategy(&self) -> RestartStrategy {
        match self.restart_strategy {
            RestartMode::Immediate => RestartStrategy::Immediate,
            RestartMode::Exponential => RestartStrategy::Exponential {
                initial: Duration::from_millis(self.restart_backoff_initial_ms),
                max: Duration::from_millis(self.restart_backoff_max_ms),
            },
        }
    }
}

/// wallet-creator - pool of relay workers turning wallet requests into scan jobs
#[derive(Parser, Debug, Clone)]
#[command(name = "wallet-creator")]
#[command(about = "Creates wallets on request and forwards them to the wallet scanner")]
pub struct CreatorArgs {
    #[command(flatten)]
    pub broker: BrokerArgs,

    #[command(flatten)]
    pub restart: RestartArgs,

    /// Identity of this worker; set by the pool supervisor, selects worker mode
    #[arg(long, env = WORKER_ID_ENV, hide = true)]
    pub worker_id: Option<u64>,

    /// Number of relay workers (defaults to the number of CPUs)
    #[arg(long, env = "WALLET_POOL_SIZE")]
    pub pool_size: Option<usize>,

    /// Top block header endpoint used to pick the scan height
    #[arg(long, env = "TOP_BLOCK_URL", default_value = DEFAULT_TOP_BLOCK_URL)]
    pub top_block_url: String,

    /// Height lookup timeout in milliseconds
    #[arg(long, env = "HEIGHT_LOOKUP_TIMEOUT_MS", default_value = "30000")]
    pub height_lookup_timeout_ms: u64,

    /// Maximum requests a single worker handles at once
    #[arg(long, env = "WALLET_MAX_IN_FLIGHT", default_value = "16")]
    pub max_in_flight: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl CreatorArgs {
    /// Effective pool size
    pub fn pool_size(&self) -> usize {
        self.pool_size.unwrap_or_else(num_cpus::get)
    }

    /// Resolve the relay settings for a worker process
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            public: self.broker.public_endpoint(),
            private: self.broker.private_endpoint(),
            creation_queue: CREATION_QUEUE.to_string(),
            scan_queue: SCAN_QUEUE.to_string(),
            top_block_url: self.top_block_url.clone(),
            lookup_timeout: Duration::from_millis(self.height_lookup_timeout_ms),
            max_in_flight: self.max_in_flight,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.pool_size() == 0 {
            return Err(RelayError::Config(
                "WALLET_POOL_SIZE must be at least 1".to_string(),
            ));
        }
        self.relay_config().validate()
    }
}

/// wallet-workers - supervisor for the creator, scanner and sender programs
#[derive(Parser, Debug, Clone)]
#[command(name = "wallet-workers")]
#[command(about = "Runs and restarts the wallet creator, scanner and sender")]
pub struct OrchestratorArgs {
    #[command(flatten)]
    pub broker: BrokerArgs,

    #[command(flatten)]
    pub restart: RestartArgs,

    /// Wallet creator executable (defaults to wallet-creator next to this binary)
    #[arg(long, env = "WALLET_CREATOR_BIN")]
    pub creator_bin: Option<PathBuf>,

    /// Wallet scanner executable (defaults to wallet-scanner next to this binary)
    #[arg(long, env = "WALLET_SCANNER_BIN")]
    pub scanner_bin: Option<PathBuf>,

    /// Wallet sender executable (defaults to wallet-sender next to this binary)
    #[arg(long, env = "WALLET_SENDER_BIN")]
    pub sender_bin: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Immutable settings for one relay worker
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Broker requests are consumed from and replies are sent on
    pub public: BrokerEndpoint,
    /// Broker scan jobs are forwarded to
    pub private: BrokerEndpoint,
    pub creation_queue: String,
    pub scan_queue: String,
    pub top_block_url: String,
    pub lookup_timeout: Duration,
    /// Prefetch count and in-flight handler limit
    pub max_in_flight: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            public: BrokerEndpoint::new("localhost", "", ""),
            private: BrokerEndpoint::new("localhost", "", ""),
            creation_queue: CREATION_QUEUE.to_string(),
            scan_queue: SCAN_QUEUE.to_string(),
            top_block_url: DEFAULT_TOP_BLOCK_URL.to_string(),
            lookup_timeout: Duration::from_secs(30),
            max_in_flight: 16,
        }
    }
}

impl RelayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_in_flight == 0 {
            return Err(RelayError::Config(
                "WALLET_MAX_IN_FLIGHT must be at least 1".to_string(),
            ));
        }

        if u16::try_from(self.max_in_flight).is_err() {
            return Err(RelayError::Config(format!(
                "WALLET_MAX_IN_FLIGHT must not exceed {}",
                u16::MAX
            )));
        }

        if self.top_block_url.trim().is_empty() {
            return Err(RelayError::Config("TOP_BLOCK_URL must not be empty".to_string()));
        }

        Ok(())
    }
}
