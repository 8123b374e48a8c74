// src/backend/services/invite_service.rs
use crate::error::LegacyError;
use crate::metrics::{record, Counter};
use crate::models::common::{InviteStatus, MemberStatus};
use crate::models::identity::Identity;
use crate::models::invitation::{normalize_email, Invitation, NewInvitation};
use crate::models::vault_member::VaultMember;
use crate::models::StoredRecord;
use crate::remote::{
    collections, Direction, DocumentPath, DocumentStore, FieldUpdate, Precondition, Query, Value,
    WriteBatch,
};
use crate::runtime::Runtime;
use crate::services::activity_service::{draft_by, log_activity};
use crate::services::member_service::find_member;
use crate::services::query::fetch_ordered;
use crate::session::Session;
use crate::utils::crypto::claim_hash;
use validator::Validate;

/// Shortest claim code accepted when issuing an invitation.
pub const MIN_CLAIM_CODE_LEN: usize = 16;

const CLAIM_HASH_FIELD: &str = "claimHash";

fn invitation_path(invitation_id: &str) -> DocumentPath {
    DocumentPath::new(collections::INVITATIONS, invitation_id)
}

fn still_pending() -> Option<Precondition> {
    Some(Precondition::FieldEquals(
        "status".to_string(),
        Value::text(InviteStatus::Pending.as_str()),
    ))
}

fn invalid_code() -> LegacyError {
    LegacyError::NotAuthorized("This invitation code is not valid".to_string())
}

/// A session already bound to one email cannot take over another's
/// invitation.
fn ensure_bound_to(requester: &Identity, email: &str) -> Result<(), LegacyError> {
    match requester.email.as_deref().map(normalize_email) {
        Some(own) if !own.is_empty() && own != email => {
            log_warn!(
                "{} (signed in as {}) presented an invitation for {}",
                requester.id,
                own,
                email
            );
            Err(LegacyError::NotAuthorized(
                "This invitation belongs to someone else".to_string(),
            ))
        }
        _ => Ok(()),
    }
}

/// Invites an email address into a vault. Any member of the vault may invite.
/// Only the hash of `claim_code` is stored; whoever receives the code at the
/// invited address proves control of it by presenting the code.
pub async fn create_invitation<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    input: NewInvitation,
    claim_code: &str,
) -> Result<Invitation, LegacyError> {
    let requester = session.requester()?;
    let input = NewInvitation {
        email: normalize_email(&input.email),
        ..input
    };
    input
        .validate()
        .map_err(|e| LegacyError::InvalidInput(e.to_string()))?;
    if claim_code.trim().len() < MIN_CLAIM_CODE_LEN {
        return Err(LegacyError::InvalidInput(format!(
            "Invitation codes need at least {} characters",
            MIN_CLAIM_CODE_LEN
        )));
    }
    if find_member(session, &input.vault_id, &requester.id).await?.is_none() {
        return Err(LegacyError::NotAuthorized(
            "Only vault members can invite".to_string(),
        ));
    }

    let mut invitation = Invitation {
        id: String::new(),
        email: input.email,
        role: input.role,
        status: InviteStatus::Pending,
        invited_by_user_id: requester.id.clone(),
        invited_by_user_name: requester.name_or("Family Member"),
        vault_id: input.vault_id,
        created_at: session.now(),
        accepted_at: None,
    };
    let mut fields = invitation.to_fields();
    fields.insert(CLAIM_HASH_FIELD.into(), Value::text(claim_hash(claim_code.trim())));
    let store = session.store();
    let path = session
        .call("create_invitation", move || store.add(collections::INVITATIONS, fields.clone()))
        .await
        .map_err(|e| LegacyError::save_failed("create_invitation", e))?;
    invitation.id = path.id;
    record(Counter::InvitationCreated);
    log_info!(
        "Invitation {} sent to {} for {} as {} by {}",
        invitation.id,
        invitation.email,
        invitation.vault_id,
        invitation.role.as_str(),
        requester.id
    );
    Ok(invitation)
}

/// The pending invitation a claim code was issued for.
async fn redeem_claim_code<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    claim_code: &str,
) -> Result<Invitation, LegacyError> {
    let query = Query::collection(collections::INVITATIONS)
        .where_eq(CLAIM_HASH_FIELD, Value::text(claim_hash(claim_code.trim())))
        .where_eq("status", Value::text(InviteStatus::Pending.as_str()));
    let query = &query;
    let store = session.store();
    let docs = session
        .call("redeem_claim_code", move || store.query(query))
        .await
        .map_err(|e| LegacyError::load_failed("redeem_claim_code", e))?;
    match docs.first() {
        Some(doc) => Ok(Invitation::from_document(doc)?),
        None => Err(invalid_code()),
    }
}

/// Most recent pending invitation for `email`. Malformed records are skipped.
pub async fn find_pending_invitation<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    email: &str,
) -> Result<Invitation, LegacyError> {
    let email = normalize_email(email);
    let query = Query::collection(collections::INVITATIONS)
        .where_eq("email", Value::text(&email))
        .where_eq("status", Value::text(InviteStatus::Pending.as_str()))
        .order_by("createdAt", Direction::Descending);
    let docs = fetch_ordered(session, "find_pending_invitation", &query)
        .await
        .map_err(|e| LegacyError::load_failed("find_pending_invitation", e))?;
    for doc in &docs {
        match Invitation::from_document(doc) {
            Ok(invitation) => return Ok(invitation),
            Err(e) => log_warn!("Skipping malformed invitation {}", e),
        }
    }
    Err(LegacyError::InvitationNotFound(email))
}

/// Accepts the most recent pending invitation addressed to the email the
/// claim code was issued for. The status change and the membership record
/// commit together, and only while the invitation is still pending.
pub async fn accept_invitation<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    claim_code: &str,
) -> Result<VaultMember, LegacyError> {
    let requester = session.requester()?;
    let claimed = redeem_claim_code(session, claim_code).await?;
    ensure_bound_to(&requester, &claimed.email)?;
    let email = claimed.email;
    let invitation = find_pending_invitation(session, &email).await?;
    invitation.status.transition(InviteStatus::Accepted)?;

    let now = session.now();
    let member = VaultMember {
        id: requester.id.clone(),
        email: email.clone(),
        name: requester.name_or(&email),
        avatar: requester.avatar(),
        role: invitation.role,
        status: MemberStatus::Active,
        joined_at: now,
    };
    let batch = WriteBatch::new()
        .update(
            invitation_path(&invitation.id),
            vec![
                FieldUpdate::set("status", Value::text(InviteStatus::Accepted.as_str())),
                FieldUpdate::set("acceptedAt", Value::timestamp(now)),
            ],
            still_pending(),
        )
        .set(
            DocumentPath::new(collections::members(&invitation.vault_id), requester.id.as_str()),
            member.to_fields(),
            true,
        );
    let store = session.store();
    session
        .call("accept_invitation", move || store.commit(batch.clone()))
        .await
        .map_err(|e| LegacyError::save_failed("accept_invitation", e))?;

    record(Counter::InvitationAccepted);
    log_info!(
        "{} accepted invitation {} into {} as {}",
        requester.id,
        invitation.id,
        invitation.vault_id,
        invitation.role.as_str()
    );
    log_activity(
        session,
        draft_by(&requester, "joined the vault", None, Some("invitation")),
    )
    .await;
    Ok(member)
}

/// Only the holder of the invitation's claim code can decline it. No member
/// record is written.
pub async fn decline_invitation<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    invitation_id: &str,
    claim_code: &str,
) -> Result<Invitation, LegacyError> {
    let requester = session.requester()?;

    let path = invitation_path(invitation_id);
    let path = &path;
    let store = session.store();
    let doc = session
        .call("decline_invitation", move || store.get(path))
        .await
        .map_err(|e| LegacyError::load_failed("decline_invitation", e))?
        .ok_or_else(|| LegacyError::InvitationNotFound(invitation_id.to_string()))?;
    if doc.optional_text(CLAIM_HASH_FIELD)? != Some(claim_hash(claim_code.trim())) {
        log_warn!("{} presented a wrong code for invitation {}", requester.id, invitation_id);
        return Err(invalid_code());
    }
    let mut invitation = Invitation::from_document(&doc)?;
    ensure_bound_to(&requester, &invitation.email)?;
    invitation.status = invitation.status.transition(InviteStatus::Declined)?;

    let batch = WriteBatch::new().update(
        path.clone(),
        vec![FieldUpdate::set("status", Value::text(InviteStatus::Declined.as_str()))],
        still_pending(),
    );
    session
        .call("decline_invitation", move || store.commit(batch.clone()))
        .await
        .map_err(|e| LegacyError::save_failed("decline_invitation", e))?;
    log_info!("{} declined invitation {}", requester.id, invitation_id);
    Ok(invitation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::common::Role;
    use crate::remote::{CompositeIndex, IndexState, StoreError};
    use crate::services::member_service::{get_member, upsert_member_profile};
    use crate::testing::{fresh_store, identity, session_as, session_over, FaultyStore, Op};
    use futures::executor::block_on;
    use std::rc::Rc;

    const VAULT: &str = "default-vault";
    const GUS_CODE: &str = "gus-claim-code-0001";

    fn invite(email: &str, role: Role) -> NewInvitation {
        NewInvitation {
            vault_id: VAULT.into(),
            email: email.into(),
            role,
        }
    }

    /// An invitee whose identity provider supplied no email yet.
    fn newcomer(id: &str, name: &str) -> Identity {
        let mut who = identity(id, name, "");
        who.email = None;
        who
    }

    #[test]
    fn invitation_lifecycle() {
        let store = Rc::new(fresh_store());
        let (owner, runtime) = session_over(store.clone(), Some(identity("olga", "Olga", "olga@example.com")));
        let guest = session_as(&store, &runtime, identity("gus", "Gus", "Gus@Example.com"));

        block_on(async {
            upsert_member_profile(&owner, &VAULT.to_string()).await.unwrap();
            let sent = create_invitation(&owner, invite(" GUS@example.com ", Role::Editor), GUS_CODE)
                .await
                .unwrap();
            assert_eq!(sent.email, "gus@example.com");
            assert_eq!(sent.status, InviteStatus::Pending);
            assert_eq!(sent.invited_by_user_name, "Olga");

            let member = accept_invitation(&guest, GUS_CODE).await.unwrap();
            assert_eq!(member.role, Role::Editor);
            assert_eq!(member.status, MemberStatus::Active);
            assert_eq!(get_member(&owner, VAULT, "gus").await.unwrap(), member);

            let invitations = store.query(&Query::collection(collections::INVITATIONS)).await.unwrap();
            assert_eq!(invitations.len(), 1);
            let stored = Invitation::from_document(&invitations[0]).unwrap();
            assert_eq!(stored.status, InviteStatus::Accepted);
            assert!(stored.accepted_at.is_some());
            let members = store.query(&Query::collection(collections::members(VAULT))).await.unwrap();
            let gus_records = members.iter().filter(|doc| doc.id() == "gus").count();
            assert_eq!(gus_records, 1);
            assert_eq!(members.len(), 2);

            // The code is spent and nothing is pending any more.
            assert!(matches!(
                accept_invitation(&guest, GUS_CODE).await,
                Err(LegacyError::NotAuthorized(_))
            ));
            assert!(matches!(
                find_pending_invitation(&guest, "gus@example.com").await,
                Err(LegacyError::InvitationNotFound(_))
            ));
            assert!(matches!(
                decline_invitation(&guest, &sent.id, GUS_CODE).await,
                Err(LegacyError::InvalidTransition { .. })
            ));
        });
    }

    #[test]
    fn claiming_someone_elses_email_does_not_win_their_invitation() {
        let store = Rc::new(fresh_store());
        let (owner, runtime) = session_over(store.clone(), Some(identity("olga", "Olga", "olga@example.com")));
        let impostor = session_as(&store, &runtime, identity("mallory", "Mal", "gus@example.com"));

        block_on(async {
            upsert_member_profile(&owner, &VAULT.to_string()).await.unwrap();
            let sent = create_invitation(&owner, invite("gus@example.com", Role::Owner), GUS_CODE)
                .await
                .unwrap();
            create_invitation(&owner, invite("mal@example.com", Role::Viewer), "mal-claim-code-0001")
                .await
                .unwrap();

            // A claimed email alone proves nothing.
            assert!(matches!(
                accept_invitation(&impostor, "guessed-code-00000").await,
                Err(LegacyError::NotAuthorized(_))
            ));
            // A real code for another address does not transfer to the claimed one.
            assert!(matches!(
                accept_invitation(&impostor, "mal-claim-code-0001").await,
                Err(LegacyError::NotAuthorized(_))
            ));
            assert!(matches!(
                decline_invitation(&impostor, &sent.id, "guessed-code-00000").await,
                Err(LegacyError::NotAuthorized(_))
            ));

            assert!(get_member(&owner, VAULT, "mallory").await.is_err());
            let still = find_pending_invitation(&owner, "gus@example.com").await.unwrap();
            assert_eq!(still.id, sent.id);

            // The real invitee, with no email on record, gets in through the code.
            let gus = session_as(&store, &runtime, newcomer("gus", "Gus"));
            let member = accept_invitation(&gus, GUS_CODE).await.unwrap();
            assert_eq!(member.email, "gus@example.com");
            assert_eq!(member.role, Role::Owner);
        });
    }

    #[test]
    fn most_recent_pending_invitation_wins_even_without_the_index() {
        let store = Rc::new(fresh_store());
        store.declare_index(
            CompositeIndex::new(collections::INVITATIONS, ["email", "status"], "createdAt"),
            IndexState::Building,
        );
        let (owner, runtime) = session_over(store.clone(), Some(identity("olga", "Olga", "olga@example.com")));
        let guest = session_as(&store, &runtime, identity("gus", "Gus", "gus@example.com"));

        block_on(async {
            upsert_member_profile(&owner, &VAULT.to_string()).await.unwrap();
            create_invitation(&owner, invite("gus@example.com", Role::Viewer), GUS_CODE).await.unwrap();
            create_invitation(&owner, invite("gus@example.com", Role::Owner), "gus-claim-code-0002")
                .await
                .unwrap();

            let found = find_pending_invitation(&guest, "gus@example.com").await.unwrap();
            assert_eq!(found.role, Role::Owner);
            assert_eq!(accept_invitation(&guest, GUS_CODE).await.unwrap().role, Role::Owner);
        });
    }

    #[test]
    fn malformed_newer_invitation_does_not_hide_a_valid_one() {
        let store = Rc::new(fresh_store());
        let (owner, runtime) = session_over(store.clone(), Some(identity("olga", "Olga", "olga@example.com")));
        let guest = session_as(&store, &runtime, identity("gus", "Gus", "gus@example.com"));

        block_on(async {
            upsert_member_profile(&owner, &VAULT.to_string()).await.unwrap();
            let valid = create_invitation(&owner, invite("gus@example.com", Role::Editor), GUS_CODE)
                .await
                .unwrap();
            let mut broken = valid.to_fields();
            broken.insert("role".into(), Value::text("admin"));
            broken.insert("createdAt".into(), Value::timestamp(valid.created_at + 1_000_000_000));
            store.add(collections::INVITATIONS, broken).await.unwrap();

            assert_eq!(find_pending_invitation(&guest, "gus@example.com").await.unwrap().id, valid.id);
            assert_eq!(accept_invitation(&guest, GUS_CODE).await.unwrap().role, Role::Editor);
        });
    }

    #[test]
    fn only_the_code_holder_can_decline() {
        let store = Rc::new(fresh_store());
        let (owner, runtime) = session_over(store.clone(), Some(identity("olga", "Olga", "olga@example.com")));
        let guest = session_as(&store, &runtime, identity("gus", "Gus", "gus@example.com"));

        block_on(async {
            upsert_member_profile(&owner, &VAULT.to_string()).await.unwrap();
            let sent = create_invitation(&owner, invite("gus@example.com", Role::Viewer), GUS_CODE)
                .await
                .unwrap();

            assert!(matches!(
                decline_invitation(&owner, &sent.id, "not-the-code-0000").await,
                Err(LegacyError::NotAuthorized(_))
            ));
            // Holding the code is not enough for a session bound to another email.
            assert!(matches!(
                decline_invitation(&owner, &sent.id, GUS_CODE).await,
                Err(LegacyError::NotAuthorized(_))
            ));
            let declined = decline_invitation(&guest, &sent.id, GUS_CODE).await.unwrap();
            assert_eq!(declined.status, InviteStatus::Declined);
            assert!(matches!(
                get_member(&owner, VAULT, "gus").await,
                Err(LegacyError::MemberNotFound(_))
            ));
            assert!(matches!(
                accept_invitation(&guest, GUS_CODE).await,
                Err(LegacyError::NotAuthorized(_))
            ));
        });
    }

    #[test]
    fn strangers_cannot_invite_and_bad_input_is_rejected() {
        let store = Rc::new(fresh_store());
        let (stranger, _) = session_over(store, Some(identity("sam", "Sam", "sam@example.com")));
        block_on(async {
            assert!(matches!(
                create_invitation(&stranger, invite("not-an-email", Role::Viewer), GUS_CODE).await,
                Err(LegacyError::InvalidInput(_))
            ));
            assert!(matches!(
                create_invitation(&stranger, invite("gus@example.com", Role::Viewer), "short").await,
                Err(LegacyError::InvalidInput(_))
            ));
            assert!(matches!(
                create_invitation(&stranger, invite("gus@example.com", Role::Viewer), GUS_CODE).await,
                Err(LegacyError::NotAuthorized(_))
            ));
        });
    }

    #[test]
    fn failed_commit_leaves_no_member_behind() {
        let store = Rc::new(FaultyStore::new(fresh_store()));
        let (owner, runtime) = session_over(store.clone(), Some(identity("olga", "Olga", "olga@example.com")));
        let guest = session_as(&store, &runtime, identity("gus", "Gus", "gus@example.com"));

        block_on(async {
            upsert_member_profile(&owner, &VAULT.to_string()).await.unwrap();
            create_invitation(&owner, invite("gus@example.com", Role::Viewer), GUS_CODE).await.unwrap();
            store.fail_next(Op::Commit, StoreError::permission_denied("Missing or insufficient permissions."));

            assert!(matches!(
                accept_invitation(&guest, GUS_CODE).await,
                Err(LegacyError::PermissionDenied(_))
            ));
            assert_eq!(store.calls(Op::Commit), 1);
            assert!(get_member(&owner, VAULT, "gus").await.is_err());

            // Still pending, so a later attempt goes through.
            accept_invitation(&guest, GUS_CODE).await.unwrap();
        });
    }
}
