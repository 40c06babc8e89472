//! Restart strategies for supervised processes

use std::time::Duration;

/// Minimum wait before retrying a program that could not be started at all
pub const SPAWN_RETRY_FLOOR: Duration = Duration::from_secs(1);

/// How soon an exited child is relaunched. Children are always relaunched;
/// the strategy only decides the delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartStrategy {
    /// Relaunch right away
    #[default]
    Immediate,
    /// Double the delay on every consecutive crash, starting at `initial`
    /// and capped at `max`. A child that stayed up for `max` or longer
    /// starts over at `initial`.
    Exponential { initial: Duration, max: Duration },
}

impl RestartStrategy {
    /// Delay before the `attempt`-th consecutive relaunch (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Immediate => Duration::ZERO,
            Self::Exponential { initial, max } => {
                let factor = 1u32
                    .checked_shl(attempt.saturating_sub(1))
                    .unwrap_or(u32::MAX);
                initial.saturating_mul(factor).min(max)
            }
        }
    }

    /// Uptime after which a child counts as healthy again
    fn stable_after(&self) -> Duration {
        match *self {
            Self::Immediate => Duration::ZERO,
            Self::Exponential { max, .. } => max,
        }
    }
}

/// Consecutive-crash bookkeeping for one supervised slot
#[derive(Debug, Clone)]
pub struct RestartTracker {
    strategy: RestartStrategy,
    consecutive: u32,
}

impl RestartTracker {
    pub fn new(strategy: RestartStrategy) -> Self {
        Self {
            strategy,
            consecutive: 0,
        }
    }

    /// Record an exit after `uptime` and return the delay before relaunch
    pub fn next_delay(&mut self, uptime: Duration) -> Duration {
        if uptime >= self.strategy.stable_after() {
            self.consecutive = 0;
        }
        self.consecutive = self.consecutive.saturating_add(1);
        self.strategy.delay(self.consecutive)
    }
}
