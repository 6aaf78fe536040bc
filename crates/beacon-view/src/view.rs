use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use beacon_config::ViewSettings;
use beacon_core::{Progress, SessionError, SessionStatusRecord, SessionStatusStore, Subscription};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::format::format_elapsed;

/// What a status indicator renders for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub is_loading: bool,
    pub progress: Option<Progress>,
    pub error: Option<SessionError>,
    pub cancellation_requested: bool,
    /// Time since loading began. `None` unless loading.
    pub elapsed: Option<Duration>,
}

impl StatusSnapshot {
    pub fn elapsed_label(&self) -> Option<String> {
        self.elapsed.map(format_elapsed)
    }
}

struct Anchor {
    started_at: DateTime<Utc>,
    instant: Instant,
}

#[derive(Default)]
struct ViewState {
    record: Option<SessionStatusRecord>,
    anchor: Option<Anchor>,
}

impl ViewState {
    // Pin the record's wall-clock start to the runtime clock once per loading run.
    fn reanchor(&mut self) {
        let Some((started_at, already)) = self
            .record
            .as_ref()
            .filter(|record| record.is_loading)
            .and_then(|record| Some((record.started_at?, record.elapsed_at(Utc::now())?)))
        else {
            self.anchor = None;
            return;
        };

        if self
            .anchor
            .as_ref()
            .is_some_and(|anchor| anchor.started_at == started_at)
        {
            return;
        }

        let now = Instant::now();
        self.anchor = Some(Anchor {
            started_at,
            instant: now.checked_sub(already).unwrap_or(now),
        });
    }

    fn snapshot(&self) -> StatusSnapshot {
        let Some(record) = &self.record else {
            return StatusSnapshot::default();
        };
        StatusSnapshot {
            is_loading: record.is_loading,
            progress: record.progress.clone(),
            error: record.error.clone(),
            cancellation_requested: record.cancellation_requested,
            elapsed: self
                .anchor
                .as_ref()
                .filter(|_| record.is_loading)
                .map(|anchor| anchor.instant.elapsed()),
        }
    }
}

struct Publisher {
    snapshots: watch::Sender<StatusSnapshot>,
    loading: watch::Sender<bool>,
    state: Mutex<ViewState>,
    disposed: AtomicBool,
}

impl Publisher {
    fn on_change(&self, record: Option<&SessionStatusRecord>) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }

        let snapshot = {
            let mut state = self.state.lock();
            state.record = record.cloned();
            state.reanchor();
            state.snapshot()
        };
        let loading = snapshot.is_loading;

        self.snapshots.send_replace(snapshot);
        self.loading.send_if_modified(|current| {
            let modified = *current != loading;
            *current = loading;
            modified
        });
    }

    fn tick(&self) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        let snapshot = self.state.lock().snapshot();
        if snapshot.is_loading {
            self.snapshots.send_replace(snapshot);
        }
    }
}

async fn run_ticker(
    publisher: Arc<Publisher>,
    mut loading: watch::Receiver<bool>,
    period: Duration,
) {
    loop {
        while !*loading.borrow_and_update() {
            if loading.changed().await.is_err() {
                return;
            }
        }

        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => publisher.tick(),
                changed = loading.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if !*loading.borrow_and_update() {
                        break;
                    }
                }
            }
        }
    }
}

/// Live status of one session for a UI indicator.
///
/// Holds a store subscription and, while the session is loading, a ticker
/// that republishes the snapshot every `tick_interval` so the elapsed time
/// advances. Both are released by [`dispose`](Self::dispose) or on drop.
pub struct SessionStatusView {
    session_id: String,
    receiver: watch::Receiver<StatusSnapshot>,
    publisher: Arc<Publisher>,
    subscription: Option<Subscription>,
    ticker: Option<JoinHandle<()>>,
}

impl SessionStatusView {
    /// Start observing `session_id`.
    ///
    /// Outside a Tokio runtime the view still follows the store but the
    /// elapsed time only refreshes on store changes.
    pub fn acquire(store: &SessionStatusStore, session_id: &str, settings: &ViewSettings) -> Self {
        let (snapshots, mut receiver) = watch::channel(StatusSnapshot::default());
        let (loading, loading_rx) = watch::channel(false);
        let publisher = Arc::new(Publisher {
            snapshots,
            loading,
            state: Mutex::new(ViewState::default()),
            disposed: AtomicBool::new(false),
        });

        let observer = publisher.clone();
        let subscription =
            store.subscribe_with_current(session_id, move |record| observer.on_change(record));
        receiver.borrow_and_update();

        let ticker = match tokio::runtime::Handle::try_current() {
            Ok(handle) => Some(handle.spawn(run_ticker(
                publisher.clone(),
                loading_rx,
                settings.tick_interval(),
            ))),
            Err(_) => {
                tracing::debug!(session_id, "No runtime, status view will not tick");
                None
            }
        };

        Self {
            session_id: session_id.to_string(),
            receiver,
            publisher,
            subscription: Some(subscription),
            ticker,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.receiver.borrow().clone()
    }

    /// A receiver that observes every snapshot published from now on.
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.receiver.clone()
    }

    /// Wait for the next snapshot. Returns `false` once nothing more can arrive.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Stop observing. Equivalent to dropping the view.
    pub fn dispose(self) {}
}

impl Drop for SessionStatusView {
    fn drop(&mut self) {
        self.publisher.disposed.store(true, Ordering::Release);
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        tracing::trace!(session_id = %self.session_id, "Status view disposed");
    }
}

impl std::fmt::Debug for SessionStatusView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStatusView")
            .field("session_id", &self.session_id)
            .field("snapshot", &*self.receiver.borrow())
            .finish()
    }
}
