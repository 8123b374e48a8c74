// src/backend/session.rs
use crate::error::LegacyError;
use crate::models::common::Timestamp;
use crate::models::identity::Identity;
use crate::remote::{DocumentStore, StoreError, Subscription};
use crate::runtime::Runtime;
use crate::services::resilience::RetryPolicy;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::future::Future;
use std::rc::Rc;

pub type SubscriptionId = u64;

/// Everything a service call needs: the store, the clock, the retry policy
/// and who is asking. Live subscriptions opened through the session are owned
/// by it and released on sign-out or teardown.
pub struct Session<S: DocumentStore, R: Runtime> {
    store: Rc<S>,
    runtime: Rc<R>,
    retry: RetryPolicy,
    identity: RefCell<Option<Identity>>,
    subscriptions: RefCell<BTreeMap<SubscriptionId, Subscription>>,
    next_subscription: Cell<SubscriptionId>,
}

impl<S: DocumentStore, R: Runtime> Session<S, R> {
    pub fn initialize(store: Rc<S>, runtime: Rc<R>, retry: RetryPolicy) -> Self {
        Self {
            store,
            runtime,
            retry,
            identity: RefCell::new(None),
            subscriptions: RefCell::new(BTreeMap::new()),
            next_subscription: Cell::new(0),
        }
    }

    pub fn sign_in(&self, identity: Identity) {
        log_info!("Session signed in as {}", identity.id);
        *self.identity.borrow_mut() = Some(identity);
    }

    /// Forgets the identity and cancels its live subscriptions.
    pub fn sign_out(&self) {
        if let Some(identity) = self.identity.borrow_mut().take() {
            log_info!("Session signed out {}", identity.id);
        }
        self.release_subscriptions();
    }

    pub fn identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    pub fn requester(&self) -> Result<Identity, LegacyError> {
        self.identity().ok_or(LegacyError::Unauthenticated)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now(&self) -> Timestamp {
        self.runtime.now()
    }

    /// Runs a remote call under the session's retry policy.
    pub async fn call<T, F, Fut>(&self, operation: &str, op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        self.retry
            .run(self.runtime.as_ref(), self.store.as_ref(), operation, op)
            .await
    }

    pub fn hold(&self, subscription: Subscription) -> SubscriptionId {
        let id = self.next_subscription.get();
        self.next_subscription.set(id + 1);
        self.subscriptions.borrow_mut().insert(id, subscription);
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.subscriptions.borrow_mut().remove(&id);
        match removed {
            Some(subscription) => {
                subscription.unsubscribe();
                true
            }
            None => false,
        }
    }

    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    fn release_subscriptions(&self) {
        let released = std::mem::take(&mut *self.subscriptions.borrow_mut());
        for (_, subscription) in released {
            subscription.unsubscribe();
        }
    }

    /// Ends the session, cancelling every live subscription.
    pub fn teardown(self) {
        self.release_subscriptions();
    }
}
