// src/backend/storage/config.rs
use crate::remote::{CompositeIndex, IndexState};
use crate::services::resilience::RetryPolicy;
use crate::storage::memory::{get_config_memory, StableMemory};
use crate::storage::storable::Cbor;
use candid::CandidType;
use ic_stable_structures::StableCell;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

pub const DEFAULT_VAULT_ID: &str = "default-vault";

/// A composite index the store should serve, optionally still building.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct IndexDeclaration {
    pub index: CompositeIndex,
    pub state: IndexState,
    /// Seconds after install at which a `Building` index becomes `Ready`.
    pub build_delay_secs: Option<u64>,
}

impl IndexDeclaration {
    pub fn ready(index: CompositeIndex) -> Self {
        Self {
            index,
            state: IndexState::Ready,
            build_delay_secs: None,
        }
    }
}

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct LegacyConfig {
    pub default_vault_id: String,
    pub retry: RetryPolicy,
    pub indexes: Vec<IndexDeclaration>,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            default_vault_id: DEFAULT_VAULT_ID.to_string(),
            retry: RetryPolicy::default(),
            indexes: default_indexes(),
        }
    }
}

/// Indexes behind the ordered memory feed and the pending invitation lookup.
pub fn default_indexes() -> Vec<IndexDeclaration> {
    vec![
        IndexDeclaration::ready(CompositeIndex::new("memories", ["vaultId"], "createdAt")),
        IndexDeclaration::ready(CompositeIndex::new(
            "invitations",
            ["email", "status"],
            "createdAt",
        )),
    ]
}

thread_local! {
    static CONFIG: RefCell<StableCell<Cbor<LegacyConfig>, StableMemory>> = RefCell::new(
        StableCell::init(get_config_memory(), Cbor(LegacyConfig::default()))
            .expect("Failed to initialize config stable cell")
    );
}

/// Persists the configuration. Called from `init` and `post_upgrade` only.
pub fn init_config(config: LegacyConfig) -> Result<(), String> {
    CONFIG.with(|cell| {
        cell.borrow_mut()
            .set(Cbor(config.clone()))
            .map_err(|e| format!("Failed to set config: {:?}", e))
    })?;
    log_info!(
        "Configuration initialized: vault={}, attempts={}, indexes={}",
        config.default_vault_id,
        config.retry.max_attempts,
        config.indexes.len()
    );
    Ok(())
}

pub fn get_config() -> LegacyConfig {
    CONFIG.with(|cell| cell.borrow().get().0.clone())
}

pub fn update_config<F>(update_fn: F) -> Result<(), String>
where
    F: FnOnce(&mut LegacyConfig),
{
    CONFIG.with(|cell| {
        let mut config = cell.borrow().get().0.clone();
        update_fn(&mut config);
        cell.borrow_mut()
            .set(Cbor(config))
            .map(|_| ())
            .map_err(|e| format!("Failed to update config: {:?}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_is_visible_to_readers() {
        update_config(|c| c.default_vault_id = "smith-family".into()).unwrap();
        assert_eq!(get_config().default_vault_id, "smith-family");
        assert_eq!(get_config().retry, RetryPolicy::default());
    }
}
