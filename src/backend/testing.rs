// src/backend/testing.rs
//! Off-chain doubles shared by the unit tests.

use crate::models::common::Timestamp;
use crate::models::identity::Identity;
use crate::remote::{
    Document, DocumentPath, DocumentStore, FieldUpdate, Fields, Query, SnapshotListener,
    StoreError, Subscription, WriteBatch,
};
use crate::runtime::Runtime;
use crate::services::resilience::RetryPolicy;
use crate::session::Session;
use crate::storage::config::default_indexes;
use crate::storage::documents::StableStore;
use ic_stable_structures::memory_manager::{MemoryId, MemoryManager};
use ic_stable_structures::DefaultMemoryImpl;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

const START: Timestamp = 1_700_000_000_000_000_000;
const TICK: Timestamp = 1_000_000;

/// Clock that moves forward 1 ms on every read and records every sleep.
pub struct ManualRuntime {
    clock: Cell<Timestamp>,
    sleeps: RefCell<Vec<Duration>>,
}

impl ManualRuntime {
    pub fn new() -> Self {
        Self {
            clock: Cell::new(START),
            sleeps: RefCell::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Runtime for ManualRuntime {
    fn now(&self) -> Timestamp {
        let now = self.clock.get();
        self.clock.set(now + TICK);
        now
    }

    async fn sleep(&self, delay: Duration) {
        self.sleeps.borrow_mut().push(delay);
        self.clock
            .set(self.clock.get() + delay.as_nanos() as Timestamp);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Op {
    Get,
    Add,
    Set,
    Update,
    Delete,
    Query,
    Commit,
}

/// Wraps a store and fails scripted calls before they reach it.
pub struct FaultyStore<S> {
    inner: S,
    faults: RefCell<BTreeMap<Op, VecDeque<StoreError>>>,
    calls: RefCell<BTreeMap<Op, usize>>,
}

impl<S: DocumentStore> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: RefCell::default(),
            calls: RefCell::default(),
        }
    }

    pub fn fail_next(&self, op: Op, error: StoreError) {
        self.faults.borrow_mut().entry(op).or_default().push_back(error);
    }

    pub fn calls(&self, op: Op) -> usize {
        self.calls.borrow().get(&op).copied().unwrap_or(0)
    }

    fn gate(&self, op: Op) -> Result<(), StoreError> {
        *self.calls.borrow_mut().entry(op).or_default() += 1;
        match self.faults.borrow_mut().get_mut(&op).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl<S: DocumentStore> DocumentStore for FaultyStore<S> {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError> {
        self.gate(Op::Get)?;
        self.inner.get(path).await
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<DocumentPath, StoreError> {
        self.gate(Op::Add)?;
        self.inner.add(collection, fields).await
    }

    async fn set(&self, path: &DocumentPath, fields: Fields, merge: bool) -> Result<(), StoreError> {
        self.gate(Op::Set)?;
        self.inner.set(path, fields, merge).await
    }

    async fn update(&self, path: &DocumentPath, updates: Vec<FieldUpdate>) -> Result<(), StoreError> {
        self.gate(Op::Update)?;
        self.inner.update(path, updates).await
    }

    async fn delete(&self, path: &DocumentPath) -> Result<(), StoreError> {
        self.gate(Op::Delete)?;
        self.inner.delete(path).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.gate(Op::Query)?;
        self.inner.query(query).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        self.gate(Op::Commit)?;
        self.inner.commit(batch).await
    }

    fn subscribe(&self, query: Query, listener: SnapshotListener) -> Result<Subscription, StoreError> {
        self.inner.subscribe(query, listener)
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }
}

/// A store on its own memory manager with the default indexes ready.
pub fn fresh_store() -> StableStore {
    let manager = MemoryManager::init(DefaultMemoryImpl::default());
    let store = StableStore::init(manager.get(MemoryId::new(0)), manager.get(MemoryId::new(1)));
    for declaration in default_indexes() {
        store.declare_index(declaration.index, declaration.state);
    }
    store
}

pub fn session_over<S: DocumentStore>(
    store: Rc<S>,
    identity: Option<Identity>,
) -> (Session<S, ManualRuntime>, Rc<ManualRuntime>) {
    let runtime = Rc::new(ManualRuntime::new());
    let session = Session::initialize(store, runtime.clone(), RetryPolicy::default());
    if let Some(identity) = identity {
        session.sign_in(identity);
    }
    (session, runtime)
}

pub fn session(identity: Option<Identity>) -> Session<StableStore, ManualRuntime> {
    session_over(Rc::new(fresh_store()), identity).0
}

pub fn identity(id: &str, name: &str, email: &str) -> Identity {
    Identity {
        id: id.to_string(),
        display_name: Some(name.to_string()),
        email: Some(email.to_string()),
        avatar_url: Some(format!("https://media.example/{}.png", id)),
        created_at: START,
        last_sign_in_at: START,
    }
}

/// Another signed-in view over the same store and clock.
pub fn session_as<S: DocumentStore>(
    store: &Rc<S>,
    runtime: &Rc<ManualRuntime>,
    who: Identity,
) -> Session<S, ManualRuntime> {
    let session = Session::initialize(store.clone(), runtime.clone(), RetryPolicy::default());
    session.sign_in(who);
    session
}
