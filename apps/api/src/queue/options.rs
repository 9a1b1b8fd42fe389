use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delivery policy attached to every job at enqueue time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOptions {
    /// Total delivery attempts, including the first one.
    pub attempts: u32,
    pub backoff: Backoff,
    pub remove_on_complete: Retention,
    pub remove_on_fail: Retention,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            attempts: 1,
            backoff: Backoff::Fixed { delay: 0 },
            remove_on_complete: Retention::KeepAll,
            remove_on_fail: Retention::KeepAll,
        }
    }
}

/// Delay between a failed attempt and the next one. `delay` is in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Backoff {
    Fixed { delay: u64 },
    Exponential { delay: u64 },
}

impl Backoff {
    /// Delay to wait after `attempts_made` failed attempts (1-based).
    ///
    /// Exponential: `delay * 2^(attempts_made - 1)`, so 1s, 2s, 4s, ...
    pub fn delay_after(&self, attempts_made: u32) -> Duration {
        match *self {
            Backoff::Fixed { delay } => Duration::from_millis(delay),
            Backoff::Exponential { delay } => {
                let factor = 2u64.saturating_pow(attempts_made.saturating_sub(1));
                Duration::from_millis(delay.saturating_mul(factor))
            }
        }
    }
}

/// How long finished jobs stay in their completed/failed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "camelCase")]
pub enum Retention {
    /// Never pruned; callers clean up by hand.
    KeepAll,
    /// Dropped as soon as the job finishes.
    RemoveImmediately,
    /// Dropped once older than `age` seconds, or once `count` newer records
    /// exist, whichever happens first. A missing bound never fires.
    Bounded {
        age: Option<u64>,
        count: Option<usize>,
    },
}
