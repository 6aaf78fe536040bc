use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest progress reading for a running job. Each update replaces the last one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub stage: String,
    pub percent: u8,
    pub message: String,
    pub step: u32,
    pub total: u32,
}

impl Progress {
    pub fn new(
        stage: impl Into<String>,
        percent: u8,
        message: impl Into<String>,
        step: u32,
        total: u32,
    ) -> Self {
        Self {
            stage: stage.into(),
            percent: percent.min(100),
            message: message.into(),
            step,
            total,
        }
    }
}

/// Terminal error reported for a session. The code is opaque to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionError {
    pub code: String,
    pub message: String,
}

impl SessionError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Status of the analysis job attached to one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusRecord {
    pub session_id: String,
    pub is_loading: bool,
    pub progress: Option<Progress>,
    pub error: Option<SessionError>,
    /// Stamped when the session enters loading from any other state.
    pub started_at: Option<DateTime<Utc>>,
    pub cancellation_requested: bool,
}

impl SessionStatusRecord {
    pub(crate) fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            is_loading: false,
            progress: None,
            error: None,
            started_at: None,
            cancellation_requested: false,
        }
    }

    /// A record with nothing to show reads the same as no record at all.
    pub fn is_empty(&self) -> bool {
        !self.is_loading && self.error.is_none() && self.progress.is_none()
    }

    /// Wall-clock time since loading began, while the session is loading.
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        if !self.is_loading {
            return None;
        }
        let started_at = self.started_at?;
        Some((now - started_at).to_std().unwrap_or(Duration::ZERO))
    }

    pub(crate) fn start_loading(&mut self, now: DateTime<Utc>) {
        if !self.is_loading {
            self.started_at = Some(now);
        }
        self.is_loading = true;
        self.error = None;
        self.cancellation_requested = false;
    }

    pub(crate) fn stop_loading(&mut self) {
        self.is_loading = false;
        self.progress = None;
        self.cancellation_requested = false;
    }

    pub(crate) fn fail(&mut self, error: SessionError) {
        self.stop_loading();
        self.error = Some(error);
    }
}
