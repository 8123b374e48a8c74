// src/backend/remote/subscription.rs
use crate::remote::document::Document;
use crate::remote::error::StoreError;

/// Receives the full result set of a live query every time it changes, or
/// the error that ended the stream.
pub type SnapshotListener = Box<dyn FnMut(Result<Vec<Document>, StoreError>)>;

/// Handle to a live query. Dropping it detaches the listener.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn cancel_runs_exactly_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let sub = Subscription::new(move || counter.set(counter.get() + 1));
        sub.unsubscribe();
        assert_eq!(calls.get(), 1);

        let counter = calls.clone();
        drop(Subscription::new(move || counter.set(counter.get() + 1)));
        assert_eq!(calls.get(), 2);
    }
}
