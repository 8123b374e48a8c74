// src/backend/api.rs
// Candid endpoints. Each call runs in a session signed in as the caller.

use crate::{
    error::LegacyError,
    metrics::LayerMetrics,
    models::activity::ActivityEntry,
    models::comment::Comment,
    models::common::{MediaKind, MemoryId, Role, UserId, VaultId},
    models::identity::Identity,
    models::invitation::{Invitation, NewInvitation},
    models::memory::{Memory, MemoryUpdate, NewMemory, Reactions, TimelineYear},
    models::vault_member::VaultMember,
    models::vault_settings::VaultSettings,
    remote::{CompositeIndex, IndexState, StoreError},
    runtime::{CanisterRuntime, Runtime},
    services::{
        activity_service, engagement_service, invite_service, member_service, memory_service,
        settings_service::{self, InMemoryCache},
    },
    session::Session,
    storage::{get_config, get_metrics as get_stored_metrics, StableStore},
    storage::memory::{get_document_counter_memory, get_documents_memory},
    utils::guards::{authenticated_guard, controller_guard, self_guard},
    utils::rng::random_claim_code,
};
use candid::{CandidType, Deserialize};
use ic_cdk_macros::{query, update};
use std::rc::Rc;
use validator::Validate;

thread_local! {
    static STORE: Rc<StableStore> = Rc::new(StableStore::init(
        get_documents_memory(),
        get_document_counter_memory(),
    ));
    static RUNTIME: Rc<CanisterRuntime> = Rc::new(CanisterRuntime);
    static SETTINGS_CACHE: Rc<InMemoryCache> = Rc::new(InMemoryCache::default());
}

pub(crate) fn store() -> Rc<StableStore> {
    STORE.with(Rc::clone)
}

// --- Validation Helper ---
fn validate_request<T: Validate>(req: &T) -> Result<(), LegacyError> {
    req.validate().map_err(|e| LegacyError::InvalidInput(e.to_string()))
}

// --- Request Structs ---

/// Display claims from the identity provider, sent along by the frontend.
/// The email is never taken from the caller; it is bound by redeeming an
/// invitation code.
#[derive(CandidType, Deserialize, Clone, Debug, Default, Validate)]
pub struct ProfileRequest {
    #[validate(length(max = 100))]
    pub display_name: Option<String>,
    #[validate(length(max = 2048))]
    pub avatar_url: Option<String>,
}

#[derive(CandidType, Deserialize, Clone, Debug, Validate)]
pub struct AcceptInvitationRequest {
    #[validate(length(min = 16, max = 128))]
    pub claim_code: String,
    #[validate(nested)]
    pub profile: ProfileRequest,
}

/// A new invitation and the code to deliver to the invited address. The code
/// is returned once and only its hash is kept.
#[derive(CandidType, Deserialize, Clone, Debug)]
pub struct IssuedInvitation {
    pub invitation: Invitation,
    pub claim_code: String,
}

#[derive(CandidType, Deserialize, Clone, Debug, Validate)]
pub struct UpdateMemoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub memory_id: MemoryId,
    #[validate(nested)]
    pub changes: MemoryUpdate,
}

#[derive(CandidType, Deserialize, Clone, Debug, Validate)]
pub struct ReactionRequest {
    #[validate(length(min = 1, max = 100))]
    pub memory_id: MemoryId,
    #[validate(length(min = 1, max = 16))]
    pub symbol: String,
}

#[derive(CandidType, Deserialize, Clone, Debug, Validate)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 100))]
    pub memory_id: MemoryId,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
}

#[derive(CandidType, Deserialize, Clone, Debug, Validate)]
pub struct ChangeRoleRequest {
    pub vault_id: Option<VaultId>,
    #[validate(length(min = 1, max = 100))]
    pub member_id: UserId,
    pub role: Role,
}

#[derive(CandidType, Deserialize, Clone, Debug, Validate)]
pub struct SaveSettingsRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 2048))]
    pub background_image: String,
}

// --- Session ---

fn vault_or_default(vault_id: Option<VaultId>) -> VaultId {
    vault_id.unwrap_or_else(|| get_config().default_vault_id)
}

fn apply_profile(identity: &mut Identity, profile: ProfileRequest) {
    identity.display_name = profile.display_name.or(identity.display_name.take());
    identity.avatar_url = profile.avatar_url.or(identity.avatar_url.take());
}

/// Signs a fresh session in as the caller. The identity is filled from the
/// caller's member record in the default vault, then from `profile`. The
/// email only ever comes from the member record.
async fn caller_session(
    profile: Option<ProfileRequest>,
) -> Result<Session<StableStore, CanisterRuntime>, LegacyError> {
    if let Some(profile) = &profile {
        validate_request(profile)?;
    }
    let config = get_config();
    let runtime = RUNTIME.with(Rc::clone);
    let now = runtime.now();
    let session = Session::initialize(store(), runtime, config.retry);

    let mut identity = Identity::new(ic_cdk::caller().to_text());
    identity.created_at = now;
    identity.last_sign_in_at = now;
    session.sign_in(identity.clone());

    if let Some(member) =
        member_service::find_member(&session, &config.default_vault_id, &identity.id).await?
    {
        let non_empty = |s: String| if s.trim().is_empty() { None } else { Some(s) };
        identity.display_name = non_empty(member.name);
        identity.email = non_empty(member.email);
        identity.avatar_url = non_empty(member.avatar);
    }
    if let Some(profile) = profile {
        apply_profile(&mut identity, profile);
    }
    session.sign_in(identity);
    Ok(session)
}

// --- Memories ---

#[update(guard = "authenticated_guard")]
async fn create_memory(req: NewMemory) -> Result<Memory, LegacyError> {
    let session = caller_session(None).await?;
    memory_service::create_memory(&session, req).await
}

#[update(guard = "authenticated_guard")]
async fn get_memory(memory_id: MemoryId) -> Result<Memory, LegacyError> {
    let session = caller_session(None).await?;
    memory_service::get_memory(&session, &memory_id).await
}

#[update(guard = "authenticated_guard")]
async fn list_memories(
    vault_id: Option<VaultId>,
    kind: Option<MediaKind>,
) -> Result<Vec<Memory>, LegacyError> {
    let session = caller_session(None).await?;
    memory_service::list_memories(&session, &vault_or_default(vault_id), kind).await
}

#[update(guard = "authenticated_guard")]
async fn timeline(vault_id: Option<VaultId>) -> Result<Vec<TimelineYear>, LegacyError> {
    let session = caller_session(None).await?;
    memory_service::timeline(&session, &vault_or_default(vault_id)).await
}

#[update(guard = "authenticated_guard")]
async fn update_memory(req: UpdateMemoryRequest) -> Result<Memory, LegacyError> {
    validate_request(&req)?;
    let session = caller_session(None).await?;
    memory_service::update_memory(&session, &req.memory_id, req.changes).await
}

#[update(guard = "authenticated_guard")]
async fn delete_memory(memory_id: MemoryId) -> Result<(), LegacyError> {
    let session = caller_session(None).await?;
    memory_service::delete_memory(&session, &memory_id).await
}

#[update(guard = "authenticated_guard")]
async fn approve_memory(memory_id: MemoryId) -> Result<Memory, LegacyError> {
    let session = caller_session(None).await?;
    memory_service::approve_memory(&session, &memory_id).await
}

#[update(guard = "authenticated_guard")]
async fn pending_review(vault_id: Option<VaultId>) -> Result<Vec<Memory>, LegacyError> {
    let session = caller_session(None).await?;
    memory_service::pending_review(&session, &vault_or_default(vault_id)).await
}

// --- Reactions & Comments ---

#[update(guard = "authenticated_guard")]
async fn toggle_reaction(req: ReactionRequest) -> Result<Reactions, LegacyError> {
    validate_request(&req)?;
    let session = caller_session(None).await?;
    engagement_service::toggle_reaction(&session, &req.memory_id, &req.symbol).await
}

#[update(guard = "authenticated_guard")]
async fn add_comment(req: CommentRequest) -> Result<Comment, LegacyError> {
    validate_request(&req)?;
    let session = caller_session(None).await?;
    engagement_service::add_comment(&session, &req.memory_id, &req.content).await
}

#[update(guard = "authenticated_guard")]
async fn list_comments(memory_id: MemoryId) -> Result<Vec<Comment>, LegacyError> {
    let session = caller_session(None).await?;
    engagement_service::list_comments(&session, &memory_id).await
}

// --- Invitations & Members ---

#[update(guard = "authenticated_guard")]
async fn create_invitation(req: NewInvitation) -> Result<IssuedInvitation, LegacyError> {
    let session = caller_session(None).await?;
    let claim_code = random_claim_code().await.map_err(|msg| {
        log_error!("create_invitation: {}", msg);
        LegacyError::save_failed("create_invitation", StoreError::unavailable(msg))
    })?;
    let invitation = invite_service::create_invitation(&session, req, &claim_code).await?;
    Ok(IssuedInvitation {
        invitation,
        claim_code,
    })
}

#[update(guard = "authenticated_guard")]
async fn accept_invitation(req: AcceptInvitationRequest) -> Result<VaultMember, LegacyError> {
    validate_request(&req)?;
    let session = caller_session(Some(req.profile)).await?;
    invite_service::accept_invitation(&session, &req.claim_code).await
}

#[update(guard = "authenticated_guard")]
async fn decline_invitation(
    invitation_id: String,
    claim_code: String,
) -> Result<Invitation, LegacyError> {
    let session = caller_session(None).await?;
    invite_service::decline_invitation(&session, &invitation_id, &claim_code).await
}

/// Creates or refreshes the caller's member record in the default vault.
#[update(guard = "authenticated_guard")]
async fn register_member(profile: ProfileRequest) -> Result<VaultMember, LegacyError> {
    let session = caller_session(Some(profile)).await?;
    member_service::upsert_member_profile(&session, &get_config().default_vault_id).await
}

#[update(guard = "authenticated_guard")]
async fn list_members(vault_id: Option<VaultId>) -> Result<Vec<VaultMember>, LegacyError> {
    let session = caller_session(None).await?;
    member_service::list_members(&session, &vault_or_default(vault_id)).await
}

#[update(guard = "authenticated_guard")]
async fn change_member_role(req: ChangeRoleRequest) -> Result<VaultMember, LegacyError> {
    validate_request(&req)?;
    let session = caller_session(None).await?;
    let vault_id = vault_or_default(req.vault_id);
    member_service::change_member_role(&session, &vault_id, &req.member_id, req.role).await
}

// --- Activity & Settings ---

#[update(guard = "authenticated_guard")]
async fn recent_activity(limit: Option<u32>) -> Result<Vec<ActivityEntry>, LegacyError> {
    let session = caller_session(None).await?;
    let limit = limit.map(|l| l as usize).unwrap_or(activity_service::MAX_ACTIVITY_PAGE);
    activity_service::recent_activity(&session, limit).await
}

#[update(guard = "authenticated_guard")]
async fn get_vault_settings() -> Result<VaultSettings, LegacyError> {
    let session = caller_session(None).await?;
    let cache = SETTINGS_CACHE.with(Rc::clone);
    settings_service::load_vault_settings(&session, cache.as_ref()).await
}

#[update(guard = "authenticated_guard")]
async fn save_vault_settings(req: SaveSettingsRequest) -> Result<VaultSettings, LegacyError> {
    validate_request(&req)?;
    let session = caller_session(None).await?;
    let cache = SETTINGS_CACHE.with(Rc::clone);
    settings_service::save_vault_settings(&session, cache.as_ref(), &req.name, &req.background_image)
        .await
}

// --- Operations ---

#[update(guard = "controller_guard")]
fn mark_index_ready(index: CompositeIndex) -> bool {
    let promoted = store().mark_index_ready(&index);
    log_info!(
        "Index {}({}) by {} ready: {}",
        index.collection,
        index.filter_fields.join(","),
        index.order_field,
        promoted
    );
    promoted
}

#[query]
fn list_indexes() -> Vec<(CompositeIndex, IndexState)> {
    store().indexes()
}

#[query]
fn get_metrics() -> LayerMetrics {
    get_stored_metrics()
}

/// Yield point awaited by backoff sleeps.
#[update(guard = "self_guard", hidden = true)]
fn tick() {}
