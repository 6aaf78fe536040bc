use beacon_config::LegacyLoadingPolicy;
use beacon_core::{Progress, SessionStatusStore};
use beacon_protocol::{BackendEvent, DecodeError, ProgressReport, RawEvent};
use tokio::sync::broadcast;

use crate::active::ActiveSession;

/// Routes backend events into a [`SessionStatusStore`].
///
/// Structured payloads are applied to the session id they carry. The id-less
/// legacy loading flag is resolved through [`ActiveSession`] at the moment it
/// is handled, subject to [`LegacyLoadingPolicy`].
pub struct EventBridge {
    store: SessionStatusStore,
    active: ActiveSession,
    legacy_policy: LegacyLoadingPolicy,
}

impl EventBridge {
    pub fn new(store: SessionStatusStore, active: ActiveSession) -> Self {
        Self {
            store,
            active,
            legacy_policy: LegacyLoadingPolicy::default(),
        }
    }

    pub fn with_legacy_policy(mut self, policy: LegacyLoadingPolicy) -> Self {
        self.legacy_policy = policy;
        self
    }

    /// Decode and apply one raw event. Returns whether the store was touched.
    pub fn handle(&self, raw: &RawEvent) -> bool {
        match BackendEvent::decode(raw) {
            Ok(event) => self.apply(event),
            // Other topics share the channel and are not ours to route.
            Err(DecodeError::UnknownTopic(topic)) => {
                tracing::debug!(topic = %topic, "Skipping unrelated backend event");
                false
            }
            Err(e) => {
                tracing::warn!(topic = %raw.topic, "Dropping backend event: {}", e);
                false
            }
        }
    }

    /// Apply a decoded event. Returns whether the store was touched.
    pub fn apply(&self, event: BackendEvent) -> bool {
        match event {
            BackendEvent::Loading {
                session_id,
                loading,
                progress,
            } => {
                tracing::debug!(session_id = %session_id, loading, "Loading changed");
                self.store.set_loading(&session_id, loading);
                if let (true, Some(progress)) = (loading, progress) {
                    self.store
                        .update_progress(&session_id, into_progress(progress));
                }
                true
            }
            BackendEvent::LegacyLoading { loading } => self.apply_legacy_loading(loading),
            BackendEvent::Progress {
                session_id,
                progress,
            } => {
                let applied = self
                    .store
                    .update_progress(&session_id, into_progress(progress));
                if !applied {
                    tracing::debug!(
                        session_id = %session_id,
                        "Dropping progress for a session that is not loading"
                    );
                }
                applied
            }
            BackendEvent::QueueStatus {
                session_id,
                status,
                message,
                position,
            } => {
                tracing::debug!(
                    session_id = %session_id,
                    status = status.as_str(),
                    ?position,
                    "Analysis queue status"
                );
                let applied = self.store.update_progress(
                    &session_id,
                    Progress::new(status.as_str(), 0, message, 0, 0),
                );
                if !applied {
                    tracing::debug!(
                        session_id = %session_id,
                        "Dropping queue status for a session that is not loading"
                    );
                }
                applied
            }
            BackendEvent::Failed {
                session_id,
                code,
                message,
            } => {
                tracing::debug!(session_id = %session_id, code = %code, "Analysis failed");
                self.store.set_error(&session_id, code, message);
                true
            }
            BackendEvent::Cancelled {
                session_id,
                code,
                message,
            } => {
                tracing::info!(session_id = %session_id, "Analysis cancelled by backend");
                self.store.set_error(&session_id, code, message);
                true
            }
        }
    }

    fn apply_legacy_loading(&self, loading: bool) -> bool {
        if self.legacy_policy == LegacyLoadingPolicy::Ignore {
            tracing::debug!(loading, "Ignoring legacy loading flag");
            return false;
        }

        match self.active.current() {
            Some(session_id) => {
                tracing::debug!(session_id = %session_id, loading, "Legacy loading flag routed to focused session");
                self.store.set_loading(&session_id, loading);
                true
            }
            None => {
                tracing::debug!(loading, "Dropping legacy loading flag, no session focused");
                false
            }
        }
    }

    pub async fn run(&self, mut receiver: broadcast::Receiver<RawEvent>) {
        tracing::info!("Event bridge started");
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    self.handle(&event);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Backend channel closed, stopping event bridge");
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event bridge lagged, missed {} events", n);
                }
            }
        }
    }

    /// Subscribe once: the bridge is consumed by its receive task.
    pub fn start(self, receiver: broadcast::Receiver<RawEvent>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run(receiver).await;
        })
    }
}

fn into_progress(report: ProgressReport) -> Progress {
    Progress::new(
        report.stage,
        report.percent,
        report.message,
        report.step,
        report.total,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BackendBus;
    use beacon_core::SessionStatusRecord;
    use beacon_protocol::{error_codes, topics};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn bridge() -> (EventBridge, SessionStatusStore, ActiveSession) {
        let store = SessionStatusStore::new();
        let active = ActiveSession::new();
        let bridge = EventBridge::new(store.clone(), active.clone());
        (bridge, store, active)
    }

    fn loading(session_id: &str, loading: bool) -> RawEvent {
        RawEvent::new(
            topics::LOADING,
            json!({"threadId": session_id, "loading": loading}),
        )
    }

    #[test]
    fn test_structured_loading_routes_by_payload_id() {
        let (bridge, store, active) = bridge();
        active.focus("A");

        assert!(bridge.handle(&loading("B", true)));

        assert!(store.is_loading("B"));
        assert!(store.get_session_state("A").is_none());
    }

    #[test]
    fn test_loading_with_progress_fields() {
        let (bridge, store, _) = bridge();
        bridge.handle(&RawEvent::new(
            topics::LOADING,
            json!({
                "threadId": "t1",
                "loading": true,
                "stage": "schema",
                "progress": 10,
                "message": "Reading table schema...",
                "step": 1,
                "total": 5
            }),
        ));

        let progress = store.get_session_state("t1").unwrap().progress.unwrap();
        assert_eq!(progress.stage, "schema");
        assert_eq!(progress.percent, 10);
        assert_eq!(progress.total, 5);
    }

    #[test]
    fn test_loading_false_ignores_progress_fields() {
        let (bridge, store, _) = bridge();
        bridge.handle(&loading("t1", true));
        bridge.handle(&RawEvent::new(
            topics::LOADING,
            json!({"threadId": "t1", "loading": false, "stage": "done", "progress": 100}),
        ));
        assert!(store.get_session_state("t1").is_none());
    }

    #[test]
    fn test_legacy_flag_follows_current_focus() {
        let (bridge, store, active) = bridge();
        active.focus("A");
        active.focus("B");

        assert!(bridge.handle(&RawEvent::new(topics::LOADING, json!(true))));

        assert!(store.is_loading("B"));
        assert!(!store.is_loading("A"));
    }

    #[test]
    fn test_legacy_flag_without_focus_is_dropped() {
        let (bridge, store, _) = bridge();
        assert!(!bridge.handle(&RawEvent::new(topics::LOADING, json!(true))));
        assert!(store.session_ids().is_empty());
    }

    #[test]
    fn test_legacy_flag_ignored_by_policy() {
        let store = SessionStatusStore::new();
        let active = ActiveSession::new();
        active.focus("A");
        let bridge = EventBridge::new(store.clone(), active)
            .with_legacy_policy(LegacyLoadingPolicy::Ignore);

        assert!(!bridge.handle(&RawEvent::new(topics::LOADING, json!(true))));
        assert!(store.get_session_state("A").is_none());
    }

    #[test]
    fn test_progress_for_idle_session_is_dropped() {
        let (bridge, store, _) = bridge();
        let progress = RawEvent::new(
            topics::PROGRESS,
            json!({"threadId": "t1", "stage": "query", "progress": 40, "step": 2, "total": 5}),
        );

        assert!(!bridge.handle(&progress));
        assert!(store.get_session_state("t1").is_none());

        bridge.handle(&loading("t1", true));
        assert!(bridge.handle(&progress));
        assert_eq!(
            store.get_session_state("t1").unwrap().progress.unwrap().percent,
            40
        );
    }

    #[test]
    fn test_queue_status_shows_waiting_message() {
        let (bridge, store, _) = bridge();
        let waiting = RawEvent::new(
            topics::QUEUE_STATUS,
            json!({
                "threadId": "t1",
                "status": "waiting",
                "message": "Waiting in analysis queue... (3/3 tasks in progress)",
                "position": 1
            }),
        );

        // Guarded like any other progress update.
        assert!(!bridge.handle(&waiting));
        assert!(store.get_session_state("t1").is_none());

        bridge.handle(&loading("t1", true));
        assert!(bridge.handle(&waiting));
        let progress = store.get_session_state("t1").unwrap().progress.unwrap();
        assert_eq!(progress.stage, "waiting");
        assert_eq!(progress.percent, 0);
        assert_eq!((progress.step, progress.total), (0, 0));
        assert!(progress.message.starts_with("Waiting in analysis queue"));

        assert!(bridge.handle(&RawEvent::new(
            topics::QUEUE_STATUS,
            json!({"threadId": "t1", "status": "starting", "message": "Processing..."}),
        )));
        let progress = store.get_session_state("t1").unwrap().progress.unwrap();
        assert_eq!(progress.stage, "starting");
        assert_eq!(progress.message, "Processing...");
    }

    #[test]
    fn test_unrelated_topics_are_skipped() {
        let (bridge, store, _) = bridge();
        bridge.handle(&loading("t1", true));
        let before = store.get_session_state("t1");

        assert!(!bridge.handle(&RawEvent::new(
            "analysis-result-update",
            json!({"threadId": "t1", "items": []}),
        )));
        assert!(!bridge.handle(&RawEvent::new(
            "analysis-completed",
            json!({"threadId": "t1"}),
        )));
        assert_eq!(store.get_session_state("t1"), before);
    }

    #[test]
    fn test_error_event_sets_terminal_state() {
        let (bridge, store, _) = bridge();
        bridge.handle(&loading("t1", true));
        bridge.handle(&RawEvent::new(
            topics::ERROR,
            json!({"threadId": "t1", "code": "NETWORK_ERROR", "error": "timeout"}),
        ));

        let state = store.get_session_state("t1").unwrap();
        assert!(!state.is_loading);
        let error = state.error.unwrap();
        assert_eq!(error.code, error_codes::NETWORK_ERROR);
        assert_eq!(error.message, "timeout");
    }

    #[test]
    fn test_cancelled_event_sets_cancelled_error() {
        let (bridge, store, _) = bridge();
        bridge.handle(&loading("t1", true));
        store.mark_cancellation_requested("t1");

        bridge.handle(&RawEvent::new(topics::CANCELLED, json!({"sessionId": "t1"})));

        let state = store.get_session_state("t1").unwrap();
        assert!(!state.is_loading);
        assert!(!state.cancellation_requested);
        assert_eq!(state.error.unwrap().code, error_codes::ANALYSIS_CANCELLED);
    }

    #[test]
    fn test_malformed_payloads_are_dropped() {
        let (bridge, store, _) = bridge();
        assert!(!bridge.handle(&RawEvent::new(topics::LOADING, json!({"loading": true}))));
        assert!(!bridge.handle(&RawEvent::new(
            topics::LOADING,
            json!({"threadId": "", "loading": true})
        )));
        assert!(!bridge.handle(&RawEvent::new(topics::PROGRESS, json!("half done"))));
        assert!(!bridge.handle(&RawEvent::new("chat-typing", json!({"threadId": "t1"}))));
        assert!(store.session_ids().is_empty());
    }

    #[tokio::test]
    async fn test_started_bridge_applies_published_events() {
        let bus = BackendBus::new();
        let store = SessionStatusStore::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<Option<SessionStatusRecord>>();
        let _sub = store.subscribe_to_session("t1", move |state| {
            let _ = tx.send(state.cloned());
        });

        let handle = EventBridge::new(store.clone(), ActiveSession::new()).start(bus.subscribe());

        bus.publish(loading("t1", true));
        bus.emit(&BackendEvent::Failed {
            session_id: "t1".to_string(),
            code: error_codes::ANALYSIS_TIMEOUT.to_string(),
            message: "took too long".to_string(),
        });

        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(first.unwrap().is_loading);

        let second = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.unwrap().error.unwrap().code, error_codes::ANALYSIS_TIMEOUT);

        handle.abort();
    }

    #[tokio::test]
    async fn test_bridge_stops_when_channel_closes() {
        let bus = BackendBus::new();
        let (bridge, _, _) = bridge();
        let handle = bridge.start(bus.subscribe());

        drop(bus);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
