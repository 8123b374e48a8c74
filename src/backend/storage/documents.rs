// src/backend/storage/documents.rs
//! Canister-local implementation of the document store, kept in stable
//! memory. Documents are keyed by their full path (`collection/id`), so a
//! nested collection such as `memories/{id}/comments` lives next to its parent
//! and is excluded from scans of the parent collection.

use crate::remote::{
    CompositeIndex, Document, DocumentPath, DocumentStore, FieldUpdate, Fields, IndexState,
    Precondition, Query, SnapshotListener, StoreError, Subscription, Write, WriteBatch,
};
use crate::storage::memory::StableMemory;
use crate::storage::storable::Cbor;
use crate::utils::crypto::document_id;
use ic_stable_structures::{StableBTreeMap, StableCell};
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::rc::Rc;

type StorableFields = Cbor<Fields>;

struct ActiveQuery {
    query: Query,
    listener: SnapshotListener,
    last: Vec<Document>,
}

type Listeners = Rc<RefCell<BTreeMap<u64, Rc<RefCell<ActiveQuery>>>>>;

pub struct StableStore {
    documents: RefCell<StableBTreeMap<String, StorableFields, StableMemory>>,
    sequence: RefCell<StableCell<u64, StableMemory>>,
    indexes: RefCell<BTreeMap<CompositeIndex, IndexState>>,
    listeners: Listeners,
    next_listener: Cell<u64>,
    connected: Cell<bool>,
}

impl StableStore {
    pub fn init(documents: StableMemory, sequence: StableMemory) -> Self {
        Self {
            documents: RefCell::new(StableBTreeMap::init(documents)),
            sequence: RefCell::new(
                StableCell::init(sequence, 0).expect("Failed to initialize document sequence cell"),
            ),
            indexes: RefCell::new(BTreeMap::new()),
            listeners: Rc::new(RefCell::new(BTreeMap::new())),
            next_listener: Cell::new(0),
            connected: Cell::new(true),
        }
    }

    pub fn declare_index(&self, index: CompositeIndex, state: IndexState) {
        log_info!(
            "Index {}({}) by {} declared {:?}",
            index.collection,
            index.filter_fields.join(","),
            index.order_field,
            state
        );
        self.indexes.borrow_mut().insert(index, state);
    }

    /// Returns false when the index was never declared.
    pub fn mark_index_ready(&self, index: &CompositeIndex) -> bool {
        match self.indexes.borrow_mut().get_mut(index) {
            Some(state) => {
                *state = IndexState::Ready;
                true
            }
            None => false,
        }
    }

    pub fn indexes(&self) -> Vec<(CompositeIndex, IndexState)> {
        self.indexes
            .borrow()
            .iter()
            .map(|(index, state)| (index.clone(), *state))
            .collect()
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.set(connected);
    }

    pub fn len(&self) -> u64 {
        self.documents.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_index(&self, query: &Query) -> Result<(), StoreError> {
        let Some(index) = query.required_index() else {
            return Ok(());
        };
        match self.indexes.borrow().get(&index) {
            Some(IndexState::Ready) => Ok(()),
            Some(IndexState::Building) => Err(StoreError::failed_precondition(
                "The query requires an index. That index is currently building and cannot be used yet.",
            )),
            None => Err(StoreError::failed_precondition(format!(
                "The query requires an index on {} ({}) ordered by {}",
                index.collection,
                index.filter_fields.join(", "),
                index.order_field
            ))),
        }
    }

    fn scan(&self, collection: &str) -> Vec<Document> {
        let prefix = format!("{}/", collection);
        self.documents
            .borrow()
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter(|(key, _)| !key[prefix.len()..].contains('/'))
            .filter_map(|(key, fields)| DocumentPath::parse(&key).map(|path| Document::new(path, fields.0)))
            .collect()
    }

    fn run_query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.check_index(query)?;
        Ok(query.apply(self.scan(&query.collection)))
    }

    fn read(&self, path: &DocumentPath) -> Option<Fields> {
        self.documents.borrow().get(&path.key()).map(|f| f.0)
    }

    fn next_id(&self, collection: &str) -> Result<String, StoreError> {
        let mut sequence = self.sequence.borrow_mut();
        let mut next = *sequence.get();
        loop {
            next = next.saturating_add(1);
            let id = document_id(collection, next);
            if self.read(&DocumentPath::new(collection, id.as_str())).is_none() {
                sequence
                    .set(next)
                    .map_err(|e| StoreError::internal(format!("Failed to advance id sequence: {:?}", e)))?;
                return Ok(id);
            }
        }
    }

    fn validate_path(path: &DocumentPath) -> Result<(), StoreError> {
        if path.collection.is_empty() || path.id.is_empty() || path.id.contains('/') {
            return Err(StoreError::invalid_argument(format!("Invalid document path `{}`", path)));
        }
        Ok(())
    }

    /// Pushes fresh snapshots to every live query whose result changed.
    fn notify(&self) {
        let active: Vec<_> = self.listeners.borrow().values().cloned().collect();
        for entry in active {
            // A listener busy with its own callback will see the next change.
            let Ok(mut active) = entry.try_borrow_mut() else {
                continue;
            };
            match self.run_query(&active.query) {
                Ok(snapshot) if snapshot != active.last => {
                    active.last = snapshot.clone();
                    (active.listener)(Ok(snapshot));
                }
                Ok(_) => {}
                Err(e) => (active.listener)(Err(e)),
            }
        }
    }

    fn apply_updates(
        path: &DocumentPath,
        current: Option<Fields>,
        updates: &[FieldUpdate],
    ) -> Result<Fields, StoreError> {
        let mut fields = current.ok_or_else(|| {
            StoreError::not_found(format!("No document to update: {}", path))
        })?;
        for update in updates {
            update.apply(&mut fields)?;
        }
        Ok(fields)
    }

    fn check_precondition(
        path: &DocumentPath,
        current: Option<&Fields>,
        precondition: &Precondition,
    ) -> Result<(), StoreError> {
        let current = current.ok_or_else(|| {
            StoreError::not_found(format!("No document to update: {}", path))
        })?;
        match precondition {
            Precondition::Exists => Ok(()),
            Precondition::FieldEquals(field, expected) => {
                let holds = current
                    .get(field)
                    .map(|actual| actual.sort_cmp(expected) == Ordering::Equal)
                    .unwrap_or(false);
                if holds {
                    Ok(())
                } else {
                    Err(StoreError::failed_precondition(format!(
                        "Precondition on `{}` failed for {}",
                        field, path
                    )))
                }
            }
        }
    }
}

impl DocumentStore for StableStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError> {
        Self::validate_path(path)?;
        Ok(self.read(path).map(|fields| Document::new(path.clone(), fields)))
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<DocumentPath, StoreError> {
        let id = self.next_id(collection)?;
        let path = DocumentPath::new(collection, id);
        self.documents.borrow_mut().insert(path.key(), Cbor(fields));
        self.notify();
        Ok(path)
    }

    async fn set(&self, path: &DocumentPath, fields: Fields, merge: bool) -> Result<(), StoreError> {
        Self::validate_path(path)?;
        let merged = match (merge, self.read(path)) {
            (true, Some(mut existing)) => {
                existing.extend(fields);
                existing
            }
            _ => fields,
        };
        self.documents.borrow_mut().insert(path.key(), Cbor(merged));
        self.notify();
        Ok(())
    }

    async fn update(&self, path: &DocumentPath, updates: Vec<FieldUpdate>) -> Result<(), StoreError> {
        Self::validate_path(path)?;
        let fields = Self::apply_updates(path, self.read(path), &updates)?;
        self.documents.borrow_mut().insert(path.key(), Cbor(fields));
        self.notify();
        Ok(())
    }

    async fn delete(&self, path: &DocumentPath) -> Result<(), StoreError> {
        Self::validate_path(path)?;
        if self.documents.borrow_mut().remove(&path.key()).is_some() {
            self.notify();
        }
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.run_query(query)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        // Stage every write against an overlay so a failing write leaves the
        // store untouched.
        let mut staged: BTreeMap<String, Option<Fields>> = BTreeMap::new();
        for write in batch.writes() {
            let path = write.path();
            Self::validate_path(path)?;
            let key = path.key();
            let current = match staged.get(&key) {
                Some(staged) => staged.clone(),
                None => self.read(path),
            };
            let next = match write {
                Write::Set { fields, merge, .. } => {
                    let mut base = if *merge { current.unwrap_or_default() } else { Fields::new() };
                    base.extend(fields.clone());
                    Some(base)
                }
                Write::Update {
                    updates,
                    precondition,
                    ..
                } => {
                    if let Some(precondition) = precondition {
                        Self::check_precondition(path, current.as_ref(), precondition)?;
                    }
                    Some(Self::apply_updates(path, current, updates)?)
                }
                Write::Delete { .. } => None,
            };
            staged.insert(key, next);
        }

        {
            let mut documents = self.documents.borrow_mut();
            for (key, fields) in staged {
                match fields {
                    Some(fields) => {
                        documents.insert(key, Cbor(fields));
                    }
                    None => {
                        documents.remove(&key);
                    }
                }
            }
        }
        self.notify();
        Ok(())
    }

    fn subscribe(&self, query: Query, mut listener: SnapshotListener) -> Result<Subscription, StoreError> {
        let initial = self.run_query(&query)?;
        listener(Ok(initial.clone()));

        let id = self.next_listener.get();
        self.next_listener.set(id + 1);
        self.listeners.borrow_mut().insert(
            id,
            Rc::new(RefCell::new(ActiveQuery {
                query,
                listener,
                last: initial,
            })),
        );

        let listeners = Rc::downgrade(&self.listeners);
        Ok(Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.borrow_mut().remove(&id);
            }
        }))
    }

    fn is_connected(&self) -> bool {
        self.connected.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{collections, Direction, StoreErrorKind, Value};
    use crate::testing::fresh_store;
    use futures::executor::block_on;

    fn memory_fields(vault: &str, created_ms: i64) -> Fields {
        let mut fields = Fields::new();
        fields.insert("vaultId".into(), Value::text(vault));
        fields.insert("createdAt".into(), Value::DateMillis(created_ms));
        fields
    }

    fn feed(vault: &str) -> Query {
        Query::collection(collections::MEMORIES)
            .where_eq("vaultId", Value::text(vault))
            .order_by("createdAt", Direction::Descending)
    }

    #[test]
    fn nested_collections_stay_out_of_parent_scans() {
        let store = fresh_store();
        block_on(async {
            let memory = store.add(collections::MEMORIES, memory_fields("v", 1)).await.unwrap();
            store
                .add(&collections::comments(&memory.id), Fields::new())
                .await
                .unwrap();
            let all = store
                .query(&Query::collection(collections::MEMORIES))
                .await
                .unwrap();
            assert_eq!(all.len(), 1);
            let comments = store
                .query(&Query::collection(collections::comments(&memory.id)))
                .await
                .unwrap();
            assert_eq!(comments.len(), 1);
        });
    }

    #[test]
    fn ordered_query_needs_a_ready_index() {
        let store = fresh_store();
        let index = feed("v").required_index().unwrap();
        store.indexes.borrow_mut().clear();

        let err = block_on(store.query(&feed("v"))).unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::FailedPrecondition);
        assert!(err.is_index_unavailable());

        store.declare_index(index.clone(), IndexState::Building);
        let err = block_on(store.query(&feed("v"))).unwrap_err();
        assert!(err.message.contains("currently building"));

        assert!(store.mark_index_ready(&index));
        assert!(block_on(store.query(&feed("v"))).unwrap().is_empty());
    }

    #[test]
    fn update_of_missing_document_is_not_found() {
        let store = fresh_store();
        let err = block_on(store.update(
            &DocumentPath::new(collections::MEMORIES, "nope"),
            vec![FieldUpdate::set("approved", Value::Bool(true))],
        ))
        .unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::NotFound);
    }

    #[test]
    fn merge_set_keeps_untouched_fields() {
        let store = fresh_store();
        let path = DocumentPath::new(collections::SETTINGS, "u1");
        block_on(async {
            store.set(&path, memory_fields("v", 5), false).await.unwrap();
            let mut overlay = Fields::new();
            overlay.insert("vaultId".into(), Value::text("w"));
            store.set(&path, overlay, true).await.unwrap();
            let doc = store.get(&path).await.unwrap().unwrap();
            assert_eq!(doc.field("vaultId"), Some(&Value::text("w")));
            assert_eq!(doc.field("createdAt"), Some(&Value::DateMillis(5)));
        });
    }

    #[test]
    fn failed_precondition_rolls_back_the_whole_batch() {
        let store = fresh_store();
        let invite = DocumentPath::new(collections::INVITATIONS, "i1");
        let member = DocumentPath::new(collections::members("v"), "u1");
        block_on(async {
            let mut fields = Fields::new();
            fields.insert("status".into(), Value::text("accepted"));
            store.set(&invite, fields, false).await.unwrap();

            let batch = WriteBatch::new()
                .set(member.clone(), Fields::new(), true)
                .update(
                    invite.clone(),
                    vec![FieldUpdate::set("status", Value::text("accepted"))],
                    Some(Precondition::FieldEquals("status".into(), Value::text("pending"))),
                );
            let err = store.commit(batch).await.unwrap_err();
            assert_eq!(err.kind, StoreErrorKind::FailedPrecondition);
            assert_eq!(store.get(&member).await.unwrap(), None);
        });
    }

    #[test]
    fn subscribers_get_initial_and_changed_snapshots_until_cancelled() {
        let store = fresh_store();
        let seen: Rc<RefCell<Vec<usize>>> = Rc::default();
        let sink = seen.clone();
        let sub = store
            .subscribe(
                feed("v"),
                Box::new(move |snapshot: Result<Vec<Document>, StoreError>| {
                    sink.borrow_mut().push(snapshot.unwrap().len())
                }),
            )
            .unwrap();

        block_on(async {
            store.add(collections::MEMORIES, memory_fields("v", 1)).await.unwrap();
            // Unrelated vault: result unchanged, no delivery.
            store.add(collections::MEMORIES, memory_fields("w", 2)).await.unwrap();
            store.add(collections::MEMORIES, memory_fields("v", 3)).await.unwrap();
        });
        sub.unsubscribe();
        block_on(store.add(collections::MEMORIES, memory_fields("v", 4))).unwrap();

        assert_eq!(*seen.borrow(), vec![0, 1, 2]);
    }
}
