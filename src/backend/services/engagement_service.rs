// src/backend/services/engagement_service.rs
use crate::error::LegacyError;
use crate::models::comment::Comment;
use crate::models::memory::Reactions;
use crate::models::StoredRecord;
use crate::remote::{
    collections, Direction, Document, DocumentPath, DocumentStore, FieldUpdate, Query, StoreError,
    Value,
};
use crate::runtime::Runtime;
use crate::services::decode_all;
use crate::services::memory_service::{load_memory, load_visible_memory};
use crate::services::query::fetch_ordered;
use crate::session::{Session, SubscriptionId};

pub const MAX_COMMENT_LEN: usize = 2_000;
const MAX_SYMBOL_LEN: usize = 16;

fn check_symbol(symbol: &str) -> Result<(), LegacyError> {
    // The symbol becomes a key in a dotted field path.
    if symbol.trim().is_empty() || symbol.contains('.') || symbol.chars().count() > MAX_SYMBOL_LEN {
        return Err(LegacyError::InvalidInput(format!("Invalid reaction `{}`", symbol)));
    }
    Ok(())
}

/// Adds the requester to `symbol`'s holders, or removes them if already
/// there. Returns the memory's reactions after the write.
pub async fn toggle_reaction<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    memory_id: &str,
    symbol: &str,
) -> Result<Reactions, LegacyError> {
    let requester = session.requester()?;
    check_symbol(symbol)?;
    let memory = load_visible_memory(session, &requester, "toggle_reaction", memory_id).await?;

    let holding = memory
        .reaction_holders(symbol)
        .map(|users| users.contains(&requester.id))
        .unwrap_or(false);
    let field_path = format!("reactions.{}", symbol);
    let user = vec![Value::text(&requester.id)];
    let update = if holding {
        FieldUpdate::array_remove(field_path, user)
    } else {
        FieldUpdate::array_union(field_path, user)
    };

    let path = DocumentPath::new(collections::MEMORIES, memory_id);
    let path = &path;
    let store = session.store();
    session
        .call("toggle_reaction", move || store.update(path, vec![update.clone()]))
        .await
        .map_err(|e| LegacyError::save_failed("toggle_reaction", e))?;

    Ok(load_memory(session, "toggle_reaction", memory_id).await?.reactions)
}

pub async fn add_comment<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    memory_id: &str,
    content: &str,
) -> Result<Comment, LegacyError> {
    let requester = session.requester()?;
    let content = content.trim();
    if content.is_empty() {
        return Err(LegacyError::InvalidInput("Comment cannot be empty".to_string()));
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(LegacyError::InvalidInput(format!(
            "Comment is longer than {} characters",
            MAX_COMMENT_LEN
        )));
    }
    load_visible_memory(session, &requester, "add_comment", memory_id).await?;

    let mut comment = Comment {
        id: String::new(),
        memory_id: memory_id.to_string(),
        author_id: requester.id.clone(),
        author_name: requester.name_or("User"),
        author_avatar: requester.avatar(),
        content: content.to_string(),
        created_at: session.now(),
    };
    let fields = comment.to_fields();
    let collection = collections::comments(memory_id);
    let collection = collection.as_str();
    let store = session.store();
    let path = session
        .call("add_comment", move || store.add(collection, fields.clone()))
        .await
        .map_err(|e| LegacyError::save_failed("add_comment", e))?;
    comment.id = path.id;
    Ok(comment)
}

fn comment_thread(memory_id: &str) -> Query {
    Query::collection(collections::comments(memory_id)).order_by("createdAt", Direction::Ascending)
}

/// Oldest first.
pub async fn list_comments<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    memory_id: &str,
) -> Result<Vec<Comment>, LegacyError> {
    let requester = session.requester()?;
    load_visible_memory(session, &requester, "list_comments", memory_id).await?;
    let docs = fetch_ordered(session, "list_comments", &comment_thread(memory_id))
        .await
        .map_err(|e| LegacyError::load_failed("list_comments", e))?;
    Ok(decode_all(docs))
}

pub async fn subscribe_comments<S, R, F>(
    session: &Session<S, R>,
    memory_id: &str,
    mut on_change: F,
) -> Result<SubscriptionId, LegacyError>
where
    S: DocumentStore,
    R: Runtime,
    F: FnMut(Result<Vec<Comment>, LegacyError>) + 'static,
{
    let requester = session.requester()?;
    load_visible_memory(session, &requester, "subscribe_comments", memory_id).await?;
    let subscription = session
        .store()
        .subscribe(
            comment_thread(memory_id),
            Box::new(move |snapshot: Result<Vec<Document>, StoreError>| {
                on_change(
                    snapshot
                        .map(decode_all::<Comment>)
                        .map_err(|e| LegacyError::load_failed("subscribe_comments", e)),
                )
            }),
        )
        .map_err(|e| LegacyError::load_failed("subscribe_comments", e))?;
    Ok(session.hold(subscription))
}
