//! Reconnect back-off policy.

use relaydesk_core::{ReconnectConfig, ReconnectStrategy};
use std::time::Duration;

/// How long to wait before each reconnect attempt, and when to give up.
///
/// `max_attempts: None` retries forever.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectPolicy {
    Fixed {
        delay: Duration,
        max_attempts: Option<u32>,
    },
    Exponential {
        base: Duration,
        factor: f64,
        max_delay: Duration,
        max_attempts: Option<u32>,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(1),
            factor: 1.5,
            max_delay: Duration::from_secs(5),
            max_attempts: Some(10),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based), or `None` once the
    /// attempt budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || self.max_attempts().is_some_and(|max| attempt > max) {
            return None;
        }
        match *self {
            Self::Fixed { delay, .. } => Some(delay),
            Self::Exponential {
                base,
                factor,
                max_delay,
                ..
            } => {
                let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
                let millis = base.as_millis() as f64 * factor.powi(exponent);
                let capped = millis.min(max_delay.as_millis() as f64);
                Some(Duration::from_millis(capped as u64))
            }
        }
    }

    pub fn max_attempts(&self) -> Option<u32> {
        match self {
            Self::Fixed { max_attempts, .. } | Self::Exponential { max_attempts, .. } => {
                *max_attempts
            }
        }
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(cfg: &ReconnectConfig) -> Self {
        let max_attempts = (cfg.max_attempts > 0).then_some(cfg.max_attempts);
        match cfg.strategy {
            ReconnectStrategy::Fixed => Self::Fixed {
                delay: cfg.fixed_delay,
                max_attempts,
            },
            ReconnectStrategy::Exponential => Self::Exponential {
                base: cfg.base_delay,
                factor: cfg.growth_factor,
                max_delay: cfg.max_delay,
                max_attempts,
            },
        }
    }
}
