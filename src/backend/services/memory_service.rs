// src/backend/services/memory_service.rs
use crate::error::LegacyError;
use crate::metrics::{record, Counter};
use crate::models::common::{MediaKind, Privacy, VaultId};
use crate::models::identity::Identity;
use crate::models::memory::{group_by_year, Memory, MemoryUpdate, NewMemory, Reactions, TimelineYear};
use crate::models::StoredRecord;
use crate::remote::{
    collections, Direction, Document, DocumentPath, DocumentStore, FieldUpdate, OrderBy, Query,
    SnapshotListener, StoreError, Value, WriteBatch,
};
use crate::runtime::Runtime;
use crate::services::activity_service::{draft_by, log_activity};
use crate::services::decode_all;
use crate::services::member_service::{is_owner, require_owner};
use crate::services::query::fetch_ordered;
use crate::services::visibility::{is_visible, visible_to};
use crate::session::{Session, SubscriptionId};
use std::cell::RefCell;
use std::rc::Rc;
use validator::Validate;

fn memory_path(memory_id: &str) -> DocumentPath {
    DocumentPath::new(collections::MEMORIES, memory_id)
}

fn vault_feed(vault_id: &str) -> Query {
    Query::collection(collections::MEMORIES)
        .where_eq("vaultId", Value::text(vault_id))
        .order_by("createdAt", Direction::Descending)
}

/// Reads a memory without any visibility check.
pub(crate) async fn load_memory<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    operation: &str,
    memory_id: &str,
) -> Result<Memory, LegacyError> {
    let path = memory_path(memory_id);
    let path = &path;
    let store = session.store();
    let doc = session
        .call(operation, move || store.get(path))
        .await
        .map_err(|e| LegacyError::load_failed(operation, e))?
        .ok_or_else(|| LegacyError::MemoryNotFound(memory_id.to_string()))?;
    Ok(Memory::from_document(&doc)?)
}

/// A memory the requester may see. Hidden memories look absent.
pub(crate) async fn load_visible_memory<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    requester: &Identity,
    operation: &str,
    memory_id: &str,
) -> Result<Memory, LegacyError> {
    let memory = load_memory(session, operation, memory_id).await?;
    if !is_visible(&memory, requester) {
        return Err(LegacyError::MemoryNotFound(memory_id.to_string()));
    }
    Ok(memory)
}

fn of_kind(memories: Vec<Memory>, kind: Option<MediaKind>) -> Vec<Memory> {
    match kind {
        Some(kind) => memories.into_iter().filter(|m| m.media_kind == kind).collect(),
        None => memories,
    }
}

/// Memories of a vault the requester may see, newest first, optionally of
/// one media kind only.
pub async fn list_memories<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    vault_id: &str,
    kind: Option<MediaKind>,
) -> Result<Vec<Memory>, LegacyError> {
    let requester = session.requester()?;
    let docs = fetch_ordered(session, "list_memories", &vault_feed(vault_id))
        .await
        .map_err(|e| LegacyError::load_failed("list_memories", e))?;
    Ok(of_kind(visible_to(decode_all(docs), &requester), kind))
}

/// The visible memories of a vault grouped by the year they were created.
pub async fn timeline<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    vault_id: &str,
) -> Result<Vec<TimelineYear>, LegacyError> {
    Ok(group_by_year(list_memories(session, vault_id, None).await?))
}

pub async fn get_memory<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    memory_id: &str,
) -> Result<Memory, LegacyError> {
    let requester = session.requester()?;
    load_visible_memory(session, &requester, "get_memory", memory_id).await
}

pub async fn create_memory<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    input: NewMemory,
) -> Result<Memory, LegacyError> {
    let requester = session.requester()?;
    input
        .validate()
        .map_err(|e| LegacyError::InvalidInput(e.to_string()))?;
    if !input.has_required_media() {
        return Err(LegacyError::InvalidInput(
            "Please select at least one file to upload".to_string(),
        ));
    }

    let mut memory = Memory {
        id: String::new(),
        title: input.title.trim().to_string(),
        description: input.description.trim().to_string(),
        media_url: input.media_url.unwrap_or_default(),
        media_kind: input.media_kind,
        uploader_id: requester.id.clone(),
        uploader_name: requester.name_or("Unknown User"),
        created_at: session.now(),
        privacy: input.privacy,
        approved: false,
        tags: input.tags,
        reactions: Reactions::new(),
        vault_id: input.vault_id,
    };
    let fields = memory.to_fields();
    let store = session.store();
    let path = session
        .call("create_memory", move || store.add(collections::MEMORIES, fields.clone()))
        .await
        .map_err(|e| LegacyError::save_failed("create_memory", e))?;
    memory.id = path.id;
    record(Counter::MemoryCreated);
    log_info!(
        "Memory {} created in {} by {} ({})",
        memory.id,
        memory.vault_id,
        memory.uploader_id,
        memory.privacy.as_str()
    );

    log_activity(
        session,
        draft_by(
            &requester,
            "uploaded a new memory",
            Some(&memory.title),
            Some(memory.media_kind.as_str()),
        ),
    )
    .await;
    Ok(memory)
}

/// Uploader or vault owner.
async fn require_editor_of<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    requester: &Identity,
    memory: &Memory,
) -> Result<(), LegacyError> {
    if memory.uploader_id == requester.id || is_owner(session, &memory.vault_id, requester).await? {
        return Ok(());
    }
    log_warn!("{} may not modify memory {}", requester.id, memory.id);
    Err(LegacyError::NotAuthorized(
        "Only the uploader or a vault owner can change this memory".to_string(),
    ))
}

pub async fn update_memory<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    memory_id: &str,
    changes: MemoryUpdate,
) -> Result<Memory, LegacyError> {
    let requester = session.requester()?;
    changes
        .validate()
        .map_err(|e| LegacyError::InvalidInput(e.to_string()))?;
    if changes.is_empty() {
        return Err(LegacyError::InvalidInput("Nothing to update".to_string()));
    }

    let mut memory = load_memory(session, "update_memory", memory_id).await?;
    require_editor_of(session, &requester, &memory).await?;

    let mut updates = Vec::new();
    if let Some(title) = changes.title {
        memory.title = title.trim().to_string();
        updates.push(FieldUpdate::set("title", Value::text(&memory.title)));
    }
    if let Some(description) = changes.description {
        memory.description = description.trim().to_string();
        updates.push(FieldUpdate::set("description", Value::text(&memory.description)));
    }
    if let Some(tags) = changes.tags {
        updates.push(FieldUpdate::set("tags", Value::text_array(tags.iter().cloned())));
        memory.tags = tags;
    }

    let path = memory_path(memory_id);
    let path = &path;
    let store = session.store();
    session
        .call("update_memory", move || store.update(path, updates.clone()))
        .await
        .map_err(|e| LegacyError::save_failed("update_memory", e))?;
    Ok(memory)
}

/// Removes the memory together with its comment thread.
pub async fn delete_memory<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    memory_id: &str,
) -> Result<(), LegacyError> {
    let requester = session.requester()?;
    let memory = load_memory(session, "delete_memory", memory_id).await?;
    require_editor_of(session, &requester, &memory).await?;

    let thread = Query::collection(collections::comments(memory_id));
    let thread = &thread;
    let store = session.store();
    let comments = session
        .call("delete_memory", move || store.query(thread))
        .await
        .map_err(|e| LegacyError::load_failed("delete_memory", e))?;
    let batch = comments
        .iter()
        .fold(WriteBatch::new().delete(memory_path(memory_id)), |batch, comment| {
            batch.delete(comment.path.clone())
        });
    session
        .call("delete_memory", move || store.commit(batch.clone()))
        .await
        .map_err(|e| LegacyError::save_failed("delete_memory", e))?;
    log_info!(
        "Memory {} deleted by {} with {} comments",
        memory_id,
        requester.id,
        comments.len()
    );
    Ok(())
}

/// Publishes an admin-reviewed memory to the vault.
pub async fn approve_memory<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    memory_id: &str,
) -> Result<Memory, LegacyError> {
    let requester = session.requester()?;
    let mut memory = load_memory(session, "approve_memory", memory_id).await?;
    require_owner(session, &memory.vault_id, &requester).await?;
    if memory.privacy != Privacy::AdminReviewed {
        return Err(LegacyError::InvalidInput(
            "Only admin-reviewed memories need approval".to_string(),
        ));
    }

    let path = memory_path(memory_id);
    let path = &path;
    let store = session.store();
    session
        .call("approve_memory", move || {
            store.update(path, vec![FieldUpdate::set("approved", Value::Bool(true))])
        })
        .await
        .map_err(|e| LegacyError::save_failed("approve_memory", e))?;
    log_info!("Memory {} approved by {}", memory_id, requester.id);
    memory.approved = true;
    Ok(memory)
}

/// The owner's review queue: admin-reviewed memories not yet approved,
/// newest first.
pub async fn pending_review<S: DocumentStore, R: Runtime>(
    session: &Session<S, R>,
    vault_id: &VaultId,
) -> Result<Vec<Memory>, LegacyError> {
    let requester = session.requester()?;
    require_owner(session, vault_id, &requester).await?;
    let query = vault_feed(vault_id).where_eq("privacy", Value::text(Privacy::AdminReviewed.as_str()));
    let docs = fetch_ordered(session, "pending_review", &query)
        .await
        .map_err(|e| LegacyError::load_failed("pending_review", e))?;
    Ok(decode_all::<Memory>(docs)
        .into_iter()
        .filter(|m| !m.approved)
        .collect())
}

fn memory_listener<F>(
    requester: Identity,
    kind: Option<MediaKind>,
    order: Option<OrderBy>,
    handler: Rc<RefCell<F>>,
) -> SnapshotListener
where
    F: FnMut(Result<Vec<Memory>, LegacyError>) + 'static,
{
    Box::new(move |snapshot: Result<Vec<Document>, StoreError>| {
        let update = snapshot
            .map(|mut docs| {
                if let Some(order) = &order {
                    order.sort(&mut docs);
                }
                of_kind(visible_to(decode_all(docs), &requester), kind)
            })
            .map_err(|e| LegacyError::load_failed("subscribe_memories", e));
        let mut handler = handler.borrow_mut();
        (*handler)(update);
    })
}

/// Live feed of the vault, filtered and newest first, optionally of one
/// media kind only. Falls back to an
/// unordered subscription sorted here when the store cannot order it.
pub fn subscribe_memories<S, R, F>(
    session: &Session<S, R>,
    vault_id: &str,
    kind: Option<MediaKind>,
    on_change: F,
) -> Result<SubscriptionId, LegacyError>
where
    S: DocumentStore,
    R: Runtime,
    F: FnMut(Result<Vec<Memory>, LegacyError>) + 'static,
{
    let requester = session.requester()?;
    let handler = Rc::new(RefCell::new(on_change));
    let query = vault_feed(vault_id);

    let listener = memory_listener(requester.clone(), kind, None, handler.clone());
    let subscription = match session.store().subscribe(query.clone(), listener) {
        Ok(subscription) => subscription,
        Err(e) if e.is_index_unavailable() => {
            log_warn!("subscribe_memories: live ordering unavailable ({}), sorting in memory", e.message);
            record(Counter::FallbackQuery);
            let listener = memory_listener(requester, kind, query.order_by.clone(), handler);
            session
                .store()
                .subscribe(query.without_ordering(), listener)
                .map_err(|e| LegacyError::load_failed("subscribe_memories", e))?
        }
        Err(e) => return Err(LegacyError::load_failed("subscribe_memories", e)),
    };
    Ok(session.hold(subscription))
}
