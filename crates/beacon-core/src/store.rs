use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use parking_lot::{Mutex, ReentrantMutex};

use crate::record::{Progress, SessionError, SessionStatusRecord};

/// Observer callback. Receives the effective state after a mutation, `None`
/// when the session has nothing to show or was cleared.
pub type StatusCallback = Arc<dyn Fn(Option<&SessionStatusRecord>) + Send + Sync>;

struct Observer {
    id: u64,
    callback: StatusCallback,
}

#[derive(Default)]
struct StoreState {
    records: HashMap<String, SessionStatusRecord>,
    observers: HashMap<String, Vec<Observer>>,
}

impl StoreState {
    fn effective(&self, session_id: &str) -> Option<SessionStatusRecord> {
        self.records
            .get(session_id)
            .filter(|record| !record.is_empty())
            .cloned()
    }

    fn callbacks(&self, session_id: &str) -> Vec<StatusCallback> {
        self.observers
            .get(session_id)
            .map(|observers| observers.iter().map(|o| o.callback.clone()).collect())
            .unwrap_or_default()
    }
}

struct StoreInner {
    state: Mutex<StoreState>,
    // Serializes mutate-then-notify so observers see one session's changes in
    // order. Reentrant so an observer may call back into the store.
    dispatch: ReentrantMutex<()>,
    next_observer_id: AtomicU64,
}

/// In-memory status store keyed by session id.
///
/// Cloning is cheap and yields another handle to the same store. All
/// mutations are synchronous; observers registered for a session are invoked
/// on the mutating thread after the internal lock is released, so they may
/// read the store again.
#[derive(Clone)]
pub struct SessionStatusStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for SessionStatusStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("SessionStatusStore")
            .field("sessions", &state.records.len())
            .field("observed_sessions", &state.observers.len())
            .finish()
    }
}

impl Default for SessionStatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStatusStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(StoreState::default()),
                dispatch: ReentrantMutex::new(()),
                next_observer_id: AtomicU64::new(1),
            }),
        }
    }

    /// Mark a session as loading or not.
    ///
    /// `true` creates the record when absent and clears any previous error.
    /// `false` on an unknown session does nothing; otherwise progress is
    /// dropped and an error set in the same transition is kept.
    pub fn set_loading(&self, session_id: &str, loading: bool) {
        self.mutate(session_id, |records| {
            if loading {
                records
                    .entry(session_id.to_string())
                    .or_insert_with(|| SessionStatusRecord::new(session_id))
                    .start_loading(Utc::now());
                return true;
            }
            match records.get_mut(session_id) {
                Some(record) => {
                    record.stop_loading();
                    true
                }
                None => false,
            }
        });
    }

    /// Replace the progress gauge of a loading session.
    ///
    /// Ignored unless the session is currently loading, so late progress for a
    /// cancelled or cleared session never resurrects it. Returns whether the
    /// update was applied.
    pub fn update_progress(&self, session_id: &str, progress: Progress) -> bool {
        self.mutate(session_id, |records| match records.get_mut(session_id) {
            Some(record) if record.is_loading => {
                record.progress = Some(progress);
                true
            }
            _ => false,
        })
    }

    /// Move a session to its terminal error state, creating it if needed.
    pub fn set_error(&self, session_id: &str, code: impl Into<String>, message: impl Into<String>) {
        let error = SessionError::new(code, message);
        self.mutate(session_id, |records| {
            records
                .entry(session_id.to_string())
                .or_insert_with(|| SessionStatusRecord::new(session_id))
                .fail(error);
            true
        });
    }

    /// Flag a loading session as having a cancellation in flight.
    ///
    /// Loading state is untouched; only a later backend event ends the job.
    pub fn mark_cancellation_requested(&self, session_id: &str) -> bool {
        self.mutate(session_id, |records| match records.get_mut(session_id) {
            Some(record) if record.is_loading && !record.cancellation_requested => {
                record.cancellation_requested = true;
                true
            }
            _ => false,
        })
    }

    /// Drop the cancellation flag after a request that never reached the backend.
    pub fn reset_cancellation_request(&self, session_id: &str) -> bool {
        self.mutate(session_id, |records| match records.get_mut(session_id) {
            Some(record) if record.cancellation_requested => {
                record.cancellation_requested = false;
                true
            }
            _ => false,
        })
    }

    /// Current state of a session, `None` when untouched, cleared, or idle.
    pub fn get_session_state(&self, session_id: &str) -> Option<SessionStatusRecord> {
        self.inner.state.lock().effective(session_id)
    }

    pub fn is_loading(&self, session_id: &str) -> bool {
        self.inner
            .state
            .lock()
            .records
            .get(session_id)
            .is_some_and(|record| record.is_loading)
    }

    /// Register an observer for one session.
    ///
    /// The callback fires on every mutation of that session only, never for
    /// other ids. It stays registered until the returned guard is dropped or
    /// [`Subscription::unsubscribe`] is called.
    pub fn subscribe_to_session<F>(&self, session_id: &str, callback: F) -> Subscription
    where
        F: Fn(Option<&SessionStatusRecord>) + Send + Sync + 'static,
    {
        self.register(session_id, Arc::new(callback)).0
    }

    /// Register an observer and deliver the session's current state to it
    /// before any later mutation can.
    ///
    /// Registration and the initial delivery hold the dispatch lock, so a
    /// concurrent mutation is either already reflected in the initial state
    /// or notified after it, never lost or reordered.
    pub fn subscribe_with_current<F>(&self, session_id: &str, callback: F) -> Subscription
    where
        F: Fn(Option<&SessionStatusRecord>) + Send + Sync + 'static,
    {
        let _dispatch = self.inner.dispatch.lock();
        let callback: StatusCallback = Arc::new(callback);
        let (subscription, current) = self.register(session_id, callback.clone());

        let delivered = catch_unwind(AssertUnwindSafe(|| callback(current.as_ref())));
        if delivered.is_err() {
            tracing::warn!(session_id, "Session status observer panicked");
        }
        subscription
    }

    fn register(
        &self,
        session_id: &str,
        callback: StatusCallback,
    ) -> (Subscription, Option<SessionStatusRecord>) {
        let id = self.inner.next_observer_id.fetch_add(1, Ordering::Relaxed);
        let current = {
            let mut state = self.inner.state.lock();
            state
                .observers
                .entry(session_id.to_string())
                .or_default()
                .push(Observer { id, callback });
            state.effective(session_id)
        };

        let subscription = Subscription {
            store: Arc::downgrade(&self.inner),
            session_id: session_id.to_string(),
            observer_id: id,
            released: false,
        };
        (subscription, current)
    }

    /// Delete a session's record.
    ///
    /// Its observers are notified once with `None` and stay registered.
    /// Returns whether a record existed.
    pub fn clear_session(&self, session_id: &str) -> bool {
        self.mutate(session_id, |records| records.remove(session_id).is_some())
    }

    /// Ids of every session with a record, sorted.
    pub fn session_ids(&self) -> Vec<String> {
        let state = self.inner.state.lock();
        let mut ids: Vec<String> = state.records.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Ids of every session currently loading, sorted.
    pub fn loading_sessions(&self) -> Vec<String> {
        let state = self.inner.state.lock();
        let mut ids: Vec<String> = state
            .records
            .values()
            .filter(|record| record.is_loading)
            .map(|record| record.session_id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn subscriber_count(&self, session_id: &str) -> usize {
        self.inner
            .state
            .lock()
            .observers
            .get(session_id)
            .map_or(0, Vec::len)
    }

    fn mutate<F>(&self, session_id: &str, apply: F) -> bool
    where
        F: FnOnce(&mut HashMap<String, SessionStatusRecord>) -> bool,
    {
        let _dispatch = self.inner.dispatch.lock();

        let (snapshot, callbacks) = {
            let mut state = self.inner.state.lock();
            if !apply(&mut state.records) {
                return false;
            }
            (state.effective(session_id), state.callbacks(session_id))
        };

        tracing::trace!(
            session_id,
            observers = callbacks.len(),
            loading = snapshot.as_ref().is_some_and(|r| r.is_loading),
            "Session status changed"
        );

        for callback in callbacks {
            let delivered = catch_unwind(AssertUnwindSafe(|| callback(snapshot.as_ref())));
            if delivered.is_err() {
                tracing::warn!(session_id, "Session status observer panicked");
            }
        }

        true
    }
}

/// Registration handle returned by [`SessionStatusStore::subscribe_to_session`].
///
/// Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    store: Weak<StoreInner>,
    session_id: String,
    observer_id: u64,
    released: bool,
}

impl Subscription {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if std::mem::replace(&mut self.released, true) {
            return;
        }
        let Some(inner) = self.store.upgrade() else {
            return;
        };
        let mut state = inner.state.lock();
        if let Some(observers) = state.observers.get_mut(&self.session_id) {
            observers.retain(|observer| observer.id != self.observer_id);
            if observers.is_empty() {
                state.observers.remove(&self.session_id);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("session_id", &self.session_id)
            .field("observer_id", &self.observer_id)
            .finish()
    }
}
