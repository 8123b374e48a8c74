// src/backend/services/resilience.rs
use crate::metrics::{record, Counter};
use crate::remote::{DocumentStore, StoreError};
use crate::runtime::Runtime;
use candid::CandidType;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 5_000;

/// Exponential backoff for remote calls that fail transiently.
#[derive(CandidType, Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retrying after the given (1-based) failed attempt:
    /// `min(base * 2^(attempt - 1), max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let millis = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(millis)
    }

    /// Runs `op` until it succeeds, fails non-transiently, or the attempts run
    /// out. The error handed back is the one the store produced last.
    ///
    /// Retried writes are not deduplicated: a retried `add` whose first
    /// attempt actually landed creates a second document.
    pub async fn run<S, R, T, F, Fut>(
        &self,
        runtime: &R,
        store: &S,
        operation: &str,
        mut op: F,
    ) -> Result<T, StoreError>
    where
        S: DocumentStore + ?Sized,
        R: Runtime + ?Sized,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        if !store.is_connected() {
            log_warn!("{}: store reports offline, attempting anyway", operation);
        }

        let mut attempt = 1;
        loop {
            record(Counter::RemoteAttempt);
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.delay_for(attempt);
                    log_warn!(
                        "{} failed on attempt {}/{}: {}. Retrying in {} ms",
                        operation,
                        attempt,
                        max_attempts,
                        e,
                        delay.as_millis()
                    );
                    record(Counter::Retry);
                    runtime.sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        record(Counter::Exhausted);
                        log_error!("{} failed after {} attempts: {}", operation, attempt, e);
                    } else {
                        log_warn!("{} failed: {}", operation, e);
                    }
                    return Err(e);
                }
            }
        }
    }
}
