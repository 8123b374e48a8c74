// src/backend/services/member_service.rs
use crate::error::LegacyError;
use crate::models::common::{MemberStatus, Role, UserId, VaultId};
use crate::models::identity::Identity;
use crate::models::vault_member::VaultMember;
use crate::models::StoredRecord;
use crate::remote::{
    collections, Direction, Document, DocumentPath, DocumentStore, FieldUpdate, Fields, Query, StoreError,
    Value,
};
use crate::runtime::Runtime;
use crate::services::decode_all;
use crate::services::query::fetch_ordered;
use crate::session::{Session, SubscriptionId};

fn member_path(vault_id: &str, user_id: &str) -> DocumentPath {
    DocumentPath::new(collections::members(vault_id), user_id)
}

pub(crate) async fn find_member<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    vault_id: &str,
    user_id: &str,
) -> Result<Option<VaultMember>, LegacyError> {
    let path = member_path(vault_id, user_id);
    let path = &path;
    let store = session.store();
    let doc = session
        .call("get_member", move || store.get(path))
        .await
        .map_err(|e| LegacyError::load_failed("get_member", e))?;
    Ok(doc.map(|d| VaultMember::from_document(&d)).transpose()?)
}

pub async fn get_member<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    vault_id: &str,
    user_id: &str,
) -> Result<VaultMember, LegacyError> {
    session.requester()?;
    find_member(session, vault_id, user_id)
        .await?
        .ok_or_else(|| LegacyError::MemberNotFound(user_id.to_string()))
}

fn member_roster(vault_id: &str) -> Query {
    Query::collection(collections::members(vault_id)).order_by("joinedAt", Direction::Ascending)
}

/// Members in the order they joined.
pub async fn list_members<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    vault_id: &str,
) -> Result<Vec<VaultMember>, LegacyError> {
    session.requester()?;
    let query = member_roster(vault_id);
    let docs = fetch_ordered(session, "list_members", &query)
        .await
        .map_err(|e| LegacyError::load_failed("list_members", e))?;
    Ok(decode_all(docs))
}

/// The requester's own member record, provided it carries the owner role.
pub async fn require_owner<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    vault_id: &str,
    requester: &Identity,
) -> Result<VaultMember, LegacyError> {
    match find_member(session, vault_id, &requester.id).await? {
        Some(member) if member.is_owner() => Ok(member),
        _ => Err(LegacyError::NotAuthorized(
            "Only vault owners can do this".to_string(),
        )),
    }
}

pub(crate) async fn is_owner<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    vault_id: &str,
    requester: &Identity,
) -> Result<bool, LegacyError> {
    match require_owner(session, vault_id, requester).await {
        Ok(_) => Ok(true),
        Err(LegacyError::NotAuthorized(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

pub async fn change_member_role<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    vault_id: &str,
    member_id: &str,
    role: Role,
) -> Result<VaultMember, LegacyError> {
    let requester = session.requester()?;
    if let Err(e) = require_owner(session, vault_id, &requester).await {
        log_warn!(
            "{} tried to make {} a {} in {} without owner rights",
            requester.id,
            member_id,
            role.as_str(),
            vault_id
        );
        return Err(e);
    }

    let mut member = find_member(session, vault_id, member_id)
        .await?
        .ok_or_else(|| LegacyError::MemberNotFound(member_id.to_string()))?;

    let path = member_path(vault_id, member_id);
    let path = &path;
    let store = session.store();
    session
        .call("change_member_role", move || {
            store.update(path, vec![FieldUpdate::set("role", Value::text(role.as_str()))])
        })
        .await
        .map_err(|e| LegacyError::save_failed("change_member_role", e))?;

    log_info!("{} changed role of {} to {}", requester.id, member_id, role.as_str());
    member.role = role;
    Ok(member)
}

/// Creates or refreshes the requester's member record on sign-up. A new
/// member joins as viewer, or as owner of a vault that has nobody yet. An
/// existing member keeps role and status.
pub async fn upsert_member_profile<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    vault_id: &VaultId,
) -> Result<VaultMember, LegacyError> {
    let requester = session.requester()?;
    let user_id: &UserId = &requester.id;
    let path = member_path(vault_id, user_id);
    let path = &path;
    let store = session.store();
    let name = requester.name_or("User");
    let email = requester.email.clone().unwrap_or_default();
    let avatar = requester.avatar();

    if let Some(mut member) = find_member(session, vault_id, user_id).await? {
        let mut profile = Fields::new();
        profile.insert("name".into(), Value::text(&name));
        profile.insert("email".into(), Value::text(&email));
        profile.insert("avatar".into(), Value::text(&avatar));
        session
            .call("upsert_member_profile", move || store.set(path, profile.clone(), true))
            .await
            .map_err(|e| LegacyError::save_failed("upsert_member_profile", e))?;
        member.name = name;
        member.email = email;
        member.avatar = avatar;
        return Ok(member);
    }

    let anyone = Query::collection(collections::members(vault_id)).limit(1);
    let anyone = &anyone;
    let existing = session
        .call("upsert_member_profile", move || store.query(anyone))
        .await
        .map_err(|e| LegacyError::load_failed("upsert_member_profile", e))?;
    let role = if existing.is_empty() { Role::Owner } else { Role::Viewer };

    let member = VaultMember {
        id: user_id.clone(),
        email,
        name,
        avatar,
        role,
        status: MemberStatus::Active,
        joined_at: session.now(),
    };
    let fields = member.to_fields();
    session
        .call("upsert_member_profile", move || store.set(path, fields.clone(), false))
        .await
        .map_err(|e| LegacyError::save_failed("upsert_member_profile", e))?;
    log_info!("{} joined {} as {}", member.id, vault_id, role.as_str());
    Ok(member)
}

/// Live roster of the vault in join order.
pub fn subscribe_members<S, R, F>(
    session: &Session<S, R>,
    vault_id: &str,
    mut on_change: F,
) -> Result<SubscriptionId, LegacyError>
where
    S: DocumentStore,
    R: Runtime,
    F: FnMut(Result<Vec<VaultMember>, LegacyError>) + 'static,
{
    session.requester()?;
    let subscription = session
        .store()
        .subscribe(
            member_roster(vault_id),
            Box::new(move |snapshot: Result<Vec<Document>, StoreError>| {
                on_change(
                    snapshot
                        .map(decode_all::<VaultMember>)
                        .map_err(|e| LegacyError::load_failed("subscribe_members", e)),
                )
            }),
        )
        .map_err(|e| LegacyError::load_failed("subscribe_members", e))?;
    Ok(session.hold(subscription))
}
