// src/backend/lib.rs

#[macro_use]
pub mod utils;

pub mod api;
pub mod error;
pub mod metrics;
pub mod models;
pub mod remote;
pub mod runtime;
pub mod services;
pub mod session;
pub mod storage;

#[cfg(test)]
mod testing;

use crate::error::LegacyError;
use crate::metrics::LayerMetrics;
use crate::models::activity::ActivityEntry;
use crate::models::comment::Comment;
use crate::models::common::{MediaKind, MemoryId, VaultId};
use crate::models::invitation::{Invitation, NewInvitation};
use crate::models::memory::{Memory, NewMemory, Reactions, TimelineYear};
use crate::models::vault_member::VaultMember;
use crate::models::vault_settings::VaultSettings;
use crate::remote::{CompositeIndex, IndexState};
use crate::services::resilience::RetryPolicy;
use crate::storage::config::{get_config, init_config, update_config, IndexDeclaration, LegacyConfig};
use api::{
    AcceptInvitationRequest, ChangeRoleRequest, CommentRequest, IssuedInvitation, ProfileRequest,
    ReactionRequest, SaveSettingsRequest, UpdateMemoryRequest,
};
use candid::{CandidType, Deserialize};
use std::time::Duration;

/// Optional overrides applied at install and upgrade.
#[derive(CandidType, Deserialize, Clone, Debug, Default)]
pub struct InitArgs {
    pub default_vault_id: Option<String>,
    pub retry: Option<RetryPolicy>,
    pub indexes: Option<Vec<IndexDeclaration>>,
}

fn apply_overrides(config: &mut LegacyConfig, args: InitArgs) {
    if let Some(vault_id) = args.default_vault_id {
        config.default_vault_id = vault_id;
    }
    if let Some(retry) = args.retry {
        config.retry = retry;
    }
    if let Some(indexes) = args.indexes {
        config.indexes = indexes;
    }
}

/// Index states live on the heap, so they are declared again after every
/// upgrade. Building indexes with a delay are promoted by a one-shot timer.
fn install_indexes(declarations: &[IndexDeclaration]) {
    let store = api::store();
    for declaration in declarations {
        store.declare_index(declaration.index.clone(), declaration.state);
        if let (IndexState::Building, Some(delay)) = (declaration.state, declaration.build_delay_secs) {
            let index = declaration.index.clone();
            ic_cdk_timers::set_timer(Duration::from_secs(delay), move || {
                if api::store().mark_index_ready(&index) {
                    log_info!("Index on {} by {} finished building", index.collection, index.order_field);
                }
            });
        }
    }
}

#[ic_cdk::init]
fn init(args: Option<InitArgs>) {
    let mut config = LegacyConfig::default();
    apply_overrides(&mut config, args.unwrap_or_default());
    if let Err(e) = init_config(config.clone()) {
        ic_cdk::trap(&e);
    }
    install_indexes(&config.indexes);
    log_info!("Legacy backend canister initialized.");
}

#[ic_cdk::post_upgrade]
fn post_upgrade(args: Option<InitArgs>) {
    if let Some(args) = args {
        if let Err(e) = update_config(|config| apply_overrides(config, args)) {
            ic_cdk::trap(&e);
        }
    }
    install_indexes(&get_config().indexes);
    log_info!("Legacy backend canister upgraded.");
}

// Export Candid interface
ic_cdk::export_candid!();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_only_what_is_given() {
        let mut config = LegacyConfig::default();
        apply_overrides(
            &mut config,
            InitArgs {
                default_vault_id: Some("smith".into()),
                ..Default::default()
            },
        );
        assert_eq!(config.default_vault_id, "smith");
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.indexes, storage::config::default_indexes());
    }
}
