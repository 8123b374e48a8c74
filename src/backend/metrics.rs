// src/backend/metrics.rs
use crate::storage::metrics::update_metrics;
use candid::CandidType;
use serde::{Deserialize, Serialize};

/// Counters describing how the authorization and resilience layer behaves.
#[derive(CandidType, Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct LayerMetrics {
    pub remote_attempts: u64,
    pub retries: u64,
    pub exhausted_calls: u64,
    pub fallback_queries: u64,
    pub memories_created: u64,
    pub invitations_created: u64,
    pub invitations_accepted: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Counter {
    RemoteAttempt,
    Retry,
    Exhausted,
    FallbackQuery,
    MemoryCreated,
    InvitationCreated,
    InvitationAccepted,
}

impl LayerMetrics {
    fn slot(&mut self, counter: Counter) -> &mut u64 {
        match counter {
            Counter::RemoteAttempt => &mut self.remote_attempts,
            Counter::Retry => &mut self.retries,
            Counter::Exhausted => &mut self.exhausted_calls,
            Counter::FallbackQuery => &mut self.fallback_queries,
            Counter::MemoryCreated => &mut self.memories_created,
            Counter::InvitationCreated => &mut self.invitations_created,
            Counter::InvitationAccepted => &mut self.invitations_accepted,
        }
    }
}

/// Bumps a counter. Metrics never fail the operation being measured.
pub fn record(counter: Counter) {
    if let Err(e) = update_metrics(|metrics| {
        let slot = metrics.slot(counter);
        *slot = slot.saturating_add(1);
    }) {
        log_warn!("Failed to record {:?}: {}", counter, e);
    }
}
