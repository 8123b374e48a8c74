// src/backend/services/activity_service.rs
use crate::error::LegacyError;
use crate::models::activity::{ActivityDraft, ActivityEntry, DEFAULT_ACTOR};
use crate::models::identity::Identity;
use crate::models::StoredRecord;
use crate::remote::{collections, Direction, DocumentStore, Query};
use crate::runtime::Runtime;
use crate::services::decode_all;
use crate::services::query::fetch_ordered;
use crate::session::Session;

pub const MAX_ACTIVITY_PAGE: usize = 100;

/// Draft attributed to `actor`.
pub fn draft_by(actor: &Identity, action: &str, target: Option<&str>, kind: Option<&str>) -> ActivityDraft {
    ActivityDraft {
        actor: actor.name_or(DEFAULT_ACTOR),
        avatar: actor.avatar(),
        action: action.to_string(),
        target: target.map(str::to_string),
        kind: kind.map(str::to_string),
    }
}

/// Appends to the activity feed. Best effort: a failure is logged and the
/// calling operation carries on.
pub async fn log_activity<S: DocumentStore, R: Runtime>(session: &Session<S, R>, draft: ActivityDraft) {
    let entry = draft.into_entry(session.now());
    let fields = entry.to_fields();
    let store = session.store();
    match session
        .call("log_activity", move || store.add(collections::ACTIVITIES, fields.clone()))
        .await
    {
        Ok(path) => log_info!("Activity {}: {} {}", path.id, entry.actor, entry.action),
        Err(e) => log_warn!("Failed to log activity `{}`: {}", entry.action, e),
    }
}

/// Newest entries first.
pub async fn recent_activity<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    limit: usize,
) -> Result<Vec<ActivityEntry>, LegacyError> {
    session.requester()?;
    let query = Query::collection(collections::ACTIVITIES)
        .order_by("timestamp", Direction::Descending)
        .limit(limit.clamp(1, MAX_ACTIVITY_PAGE));
    let docs = fetch_ordered(session, "recent_activity", &query)
        .await
        .map_err(|e| LegacyError::load_failed("recent_activity", e))?;
    Ok(decode_all(docs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::StoreError;
    use crate::testing::{fresh_store, identity, session_over, FaultyStore, Op};
    use futures::executor::block_on;
    use std::rc::Rc;

    #[test]
    fn feed_is_newest_first_and_bounded() {
        let store = Rc::new(fresh_store());
        let ana = identity("u1", "Ana", "ana@example.com");
        let (session, _) = session_over(store, Some(ana.clone()));
        block_on(async {
            for action in ["first", "second", "third"] {
                log_activity(&session, draft_by(&ana, action, None, None)).await;
            }
            let feed = recent_activity(&session, 2).await.unwrap();
            let actions: Vec<_> = feed.iter().map(|e| e.action.as_str()).collect();
            assert_eq!(actions, vec!["third", "second"]);
            assert_eq!(feed[0].actor, "Ana");
        });
    }

    #[test]
    fn logging_failures_are_swallowed() {
        let store = Rc::new(FaultyStore::new(fresh_store()));
        store.fail_next(Op::Add, StoreError::permission_denied("Missing or insufficient permissions."));
        let ana = identity("u1", "Ana", "ana@example.com");
        let (session, _) = session_over(store.clone(), Some(ana.clone()));

        block_on(log_activity(&session, draft_by(&ana, "uploaded a new memory", None, None)));
        assert_eq!(store.calls(Op::Add), 1);
        assert!(block_on(recent_activity(&session, 10)).unwrap().is_empty());
    }
}
