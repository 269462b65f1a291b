//! Per-height fetch retry with escalating backoff
//!
//! Purpose:
//!     A height is never abandoned, only delayed. Each failed fetch sleeps
//!     for the next backoff delay and tries again, forever.
//!
//! Design:
//!     - Delay starts at `initial`, doubles on every consecutive failure
//!     - Capped at `cap`, then repeats at the cap (default: 1s → 2s → ... → 60s → 60s)
//!     - "Block not available yet" is logged at info, everything else at warn

use super::source::BlockSource;
use crate::error::FetchError;
use crate::types::DecodedBlock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Doubling factor per consecutive failure
const ESCALATION_FACTOR: u32 = 2;

const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub cap: Duration,
}

impl RetryPolicy {
    pub fn new(initial: Duration, cap: Duration) -> Self {
        Self {
            initial: initial.min(cap),
            cap,
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            next: self.initial.min(self.cap),
            cap: self.cap,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_DELAY, DEFAULT_MAX_DELAY)
    }
}

/// Infinite delay sequence for one height
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    cap: Duration,
}

impl Backoff {
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self
            .next
            .checked_mul(ESCALATION_FACTOR)
            .unwrap_or(self.cap)
            .min(self.cap);
        delay
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}

/// Fetch one height, retrying until it succeeds.
pub async fn fetch_with_retry<S>(source: &S, height: u64, policy: RetryPolicy) -> DecodedBlock
where
    S: BlockSource + ?Sized,
{
    let mut backoff = policy.backoff();
    let mut failures: u32 = 0;

    loop {
        match source.fetch_block(height).await {
            Ok(block) => {
                if failures > 0 {
                    debug!(
                        "{}: block {} fetched after {} failed attempts",
                        source.platform(),
                        height,
                        failures
                    );
                }
                return block;
            }
            Err(err) => {
                failures = failures.saturating_add(1);
                let delay = backoff.next_delay();
                match &err {
                    FetchError::BlockNotAvailable(_) => info!(
                        "{}: block {} not available yet, retrying in {:?}",
                        source.platform(),
                        height,
                        delay
                    ),
                    _ => warn!(
                        "{}: fetching block {} failed (attempt {}): {}, retrying in {:?}",
                        source.platform(),
                        height,
                        failures,
                        err,
                        delay
                    ),
                }
                tokio::time::sleep(delay).await;
            }
        }
    }
}
