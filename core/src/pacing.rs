//! Waiting and wall-clock access
//!
//! Grace periods and retry backoff go through [`Pacer`] and the log date
//! stamp through [`Clock`], so runs can be driven without real delays.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::info;

/// Suspends the run between an action and its check
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn wait(&self, duration: Duration, reason: &str);
}

/// [`Pacer`] that really sleeps
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn wait(&self, duration: Duration, reason: &str) {
        info!(seconds = duration.as_secs(), "Waiting for {}", reason);
        tokio::time::sleep(duration).await;
    }
}

/// Source of the current date
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Date as written at the start of `syncNode.log` lines, e.g. `3/7/26`
pub fn log_date_stamp(date: NaiveDate) -> String {
    date.format("%-m/%-d/%y").to_string()
}

/// Wait and retry settings, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Between node start and the node agent check
    pub node_startup_secs: u64,
    /// Between server start and the JVM check
    pub app_startup_secs: u64,
    /// Between sync confirmation attempts
    pub sync_backoff_secs: u64,
    /// Sync confirmation attempts per host, including the first
    pub sync_attempts: u32,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            node_startup_secs: 150,
            app_startup_secs: 900,
            sync_backoff_secs: 300,
            sync_attempts: 3,
        }
    }
}

impl Timings {
    pub fn node_startup(&self) -> Duration {
        Duration::from_secs(self.node_startup_secs)
    }

    pub fn app_startup(&self) -> Duration {
        Duration::from_secs(self.app_startup_secs)
    }

    pub fn sync_backoff(&self) -> Duration {
        Duration::from_secs(self.sync_backoff_secs)
    }
}

/// How a [`poll`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    /// The check passed on this attempt (1-based)
    Ready { attempt: u32 },
    /// Every attempt failed
    Exhausted { attempts: u32 },
}

/// Run `check` up to `attempts` times, waiting `backoff` between tries
///
/// No wait follows the last attempt. `attempts` of 0 is treated as 1.
pub async fn poll<F, Fut>(
    pacer: &dyn Pacer,
    attempts: u32,
    backoff: Duration,
    reason: &str,
    mut check: F,
) -> PollResult
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = bool>,
{
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        if check(attempt).await {
            return PollResult::Ready { attempt };
        }
        if attempt < attempts {
            pacer.wait(backoff, reason).await;
        }
    }
    PollResult::Exhausted { attempts }
}
