// src/backend/runtime.rs
use crate::models::common::Timestamp;
use std::time::Duration;

/// Clock and timer the service layer runs against.
#[allow(async_fn_in_trait)]
pub trait Runtime {
    /// Nanoseconds since the Unix epoch.
    fn now(&self) -> Timestamp;

    async fn sleep(&self, delay: Duration);
}

/// Runtime backed by the replica's system API.
#[derive(Clone, Copy, Debug, Default)]
pub struct CanisterRuntime;

impl Runtime for CanisterRuntime {
    fn now(&self) -> Timestamp {
        ic_cdk::api::time()
    }

    // A timer callback cannot reply to the caller, so the backoff yields by
    // calling the no-op `tick` endpoint until the deadline passes.
    async fn sleep(&self, delay: Duration) {
        let delay_ns = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
        let deadline = self.now().saturating_add(delay_ns);
        while self.now() < deadline {
            let result: ic_cdk::api::call::CallResult<()> =
                ic_cdk::call(ic_cdk::id(), "tick", ()).await;
            if let Err((code, msg)) = result {
                log_warn!("Backoff tick failed ({:?}): {}. Retrying early.", code, msg);
                break;
            }
        }
    }
}
