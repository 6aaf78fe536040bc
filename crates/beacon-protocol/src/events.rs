//! Backend event envelope and the decoded variants routed by the bridge

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error_codes;

/// Topic names carried on the multiplexed backend channel.
pub mod topics {
    /// Loading transitions, structured (`{threadId, loading, ..}`) or a bare legacy `bool`.
    pub const LOADING: &str = "chat-loading";
    /// Progress gauge updates for a running analysis.
    pub const PROGRESS: &str = "analysis-progress";
    /// Terminal analysis failures.
    pub const ERROR: &str = "analysis-error";
    /// Backend confirmation that an analysis stopped after a cancellation request.
    pub const CANCELLED: &str = "analysis-cancelled";
    /// Queue position updates while an analysis waits for a free slot.
    pub const QUEUE_STATUS: &str = "analysis-queue-status";
}

const DEFAULT_CANCELLED_MESSAGE: &str = "Analysis cancelled";

/// An undecoded event as emitted by the backend: a topic plus a JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub topic: String,
    pub payload: Value,
}

impl RawEvent {
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }
}

/// One progress gauge reading reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub stage: String,
    /// Always within `0..=100`.
    pub percent: u8,
    pub message: String,
    pub step: u32,
    pub total: u32,
}

/// Where a queued analysis stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueState {
    Waiting,
    Starting,
}

impl QueueState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Starting => "starting",
        }
    }
}

/// A decoded backend event.
///
/// Every variant except [`BackendEvent::LegacyLoading`] names the session it
/// applies to. The legacy form carries no id and can only be resolved against
/// whatever session the UI has focused at the moment it is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    Loading {
        session_id: String,
        loading: bool,
        progress: Option<ProgressReport>,
    },
    LegacyLoading {
        loading: bool,
    },
    Progress {
        session_id: String,
        progress: ProgressReport,
    },
    Failed {
        session_id: String,
        code: String,
        message: String,
    },
    Cancelled {
        session_id: String,
        code: String,
        message: String,
    },
    QueueStatus {
        session_id: String,
        status: QueueState,
        message: String,
        position: Option<u32>,
    },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    #[error("{topic} payload has no session id")]
    MissingSessionId { topic: String },

    #[error("malformed {topic} payload: {source}")]
    Malformed {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadingWire {
    loading: bool,
    #[serde(flatten)]
    progress: ProgressWire,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressWire {
    #[serde(default)]
    thread_id: Option<String>,
    #[serde(default)]
    stage: Option<String>,
    #[serde(default)]
    percent: Option<f64>,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    step: Option<f64>,
    #[serde(default)]
    total: Option<f64>,
}

impl ProgressWire {
    fn into_report(self) -> Option<ProgressReport> {
        let stage = self.stage?;
        let percent = self.percent.or(self.progress).unwrap_or(0.0);
        Some(ProgressReport {
            stage,
            percent: clamp_percent(percent),
            message: self.message.unwrap_or_default(),
            step: self.step.map_or(0, clamp_count),
            total: self.total.map_or(0, clamp_count),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FailureWire {
    #[serde(default)]
    thread_id: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl FailureWire {
    fn session_id(&mut self) -> Option<String> {
        non_empty(self.thread_id.take()).or_else(|| non_empty(self.session_id.take()))
    }

    fn message(&mut self) -> Option<String> {
        non_empty(self.message.take()).or_else(|| non_empty(self.error.take()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueWire {
    #[serde(default)]
    thread_id: Option<String>,
    status: QueueState,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    position: Option<f64>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn clamp_percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

fn clamp_count(value: f64) -> u32 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, u32::MAX as f64) as u32
}

fn parse<T: for<'de> Deserialize<'de>>(topic: &str, payload: &Value) -> Result<T, DecodeError> {
    T::deserialize(payload).map_err(|source| DecodeError::Malformed {
        topic: topic.to_string(),
        source,
    })
}

fn missing_id(topic: &str) -> DecodeError {
    DecodeError::MissingSessionId {
        topic: topic.to_string(),
    }
}

impl BackendEvent {
    /// Decode a raw backend event into a routable variant.
    pub fn decode(raw: &RawEvent) -> Result<Self, DecodeError> {
        let topic = raw.topic.as_str();
        match topic {
            topics::LOADING => {
                if let Value::Bool(loading) = &raw.payload {
                    return Ok(Self::LegacyLoading { loading: *loading });
                }
                let mut wire: LoadingWire = parse(topic, &raw.payload)?;
                let session_id =
                    non_empty(wire.progress.thread_id.take()).ok_or_else(|| missing_id(topic))?;
                Ok(Self::Loading {
                    session_id,
                    loading: wire.loading,
                    progress: wire.progress.into_report(),
                })
            }
            topics::PROGRESS => {
                let mut wire: ProgressWire = parse(topic, &raw.payload)?;
                let session_id =
                    non_empty(wire.thread_id.take()).ok_or_else(|| missing_id(topic))?;
                let progress = wire.into_report().ok_or_else(|| DecodeError::Malformed {
                    topic: topic.to_string(),
                    source: serde::de::Error::missing_field("stage"),
                })?;
                Ok(Self::Progress {
                    session_id,
                    progress,
                })
            }
            topics::ERROR => {
                let mut wire: FailureWire = parse(topic, &raw.payload)?;
                let session_id = wire.session_id().ok_or_else(|| missing_id(topic))?;
                let message = wire.message().unwrap_or_default();
                Ok(Self::Failed {
                    session_id,
                    code: non_empty(wire.code)
                        .unwrap_or_else(|| error_codes::ANALYSIS_ERROR.to_string()),
                    message,
                })
            }
            topics::CANCELLED => {
                let mut wire: FailureWire = parse(topic, &raw.payload)?;
                let session_id = wire.session_id().ok_or_else(|| missing_id(topic))?;
                let message = wire
                    .message()
                    .unwrap_or_else(|| DEFAULT_CANCELLED_MESSAGE.to_string());
                Ok(Self::Cancelled {
                    session_id,
                    code: non_empty(wire.code)
                        .unwrap_or_else(|| error_codes::ANALYSIS_CANCELLED.to_string()),
                    message,
                })
            }
            topics::QUEUE_STATUS => {
                let wire: QueueWire = parse(topic, &raw.payload)?;
                let session_id = non_empty(wire.thread_id).ok_or_else(|| missing_id(topic))?;
                Ok(Self::QueueStatus {
                    session_id,
                    status: wire.status,
                    message: wire.message.unwrap_or_default(),
                    position: wire.position.map(clamp_count),
                })
            }
            other => Err(DecodeError::UnknownTopic(other.to_string())),
        }
    }

    /// Encode back into the envelope shape the backend emits.
    pub fn to_raw(&self) -> RawEvent {
        match self {
            Self::Loading {
                session_id,
                loading,
                progress,
            } => {
                let mut payload = serde_json::json!({
                    "threadId": session_id,
                    "loading": loading,
                });
                if let (Some(progress), Value::Object(map)) = (progress, &mut payload) {
                    map.insert("stage".into(), progress.stage.clone().into());
                    map.insert("percent".into(), progress.percent.into());
                    map.insert("message".into(), progress.message.clone().into());
                    map.insert("step".into(), progress.step.into());
                    map.insert("total".into(), progress.total.into());
                }
                RawEvent::new(topics::LOADING, payload)
            }
            Self::LegacyLoading { loading } => RawEvent::new(topics::LOADING, Value::Bool(*loading)),
            Self::Progress {
                session_id,
                progress,
            } => RawEvent::new(
                topics::PROGRESS,
                serde_json::json!({
                    "threadId": session_id,
                    "stage": progress.stage,
                    "progress": progress.percent,
                    "message": progress.message,
                    "step": progress.step,
                    "total": progress.total,
                }),
            ),
            Self::Failed {
                session_id,
                code,
                message,
            } => RawEvent::new(
                topics::ERROR,
                serde_json::json!({
                    "threadId": session_id,
                    "sessionId": session_id,
                    "code": code,
                    "error": message,
                    "message": message,
                }),
            ),
            Self::Cancelled {
                session_id,
                code,
                message,
            } => RawEvent::new(
                topics::CANCELLED,
                serde_json::json!({
                    "threadId": session_id,
                    "sessionId": session_id,
                    "code": code,
                    "message": message,
                }),
            ),
            Self::QueueStatus {
                session_id,
                status,
                message,
                position,
            } => {
                let mut payload = serde_json::json!({
                    "threadId": session_id,
                    "status": status.as_str(),
                    "message": message,
                });
                if let (Some(position), Value::Object(map)) = (position, &mut payload) {
                    map.insert("position".into(), (*position).into());
                }
                RawEvent::new(topics::QUEUE_STATUS, payload)
            }
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Loading { session_id, .. }
            | Self::Progress { session_id, .. }
            | Self::Failed { session_id, .. }
            | Self::Cancelled { session_id, .. }
            | Self::QueueStatus { session_id, .. } => Some(session_id),
            Self::LegacyLoading { .. } => None,
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Loading { .. } => "loading",
            Self::LegacyLoading { .. } => "legacy_loading",
            Self::Progress { .. } => "progress",
            Self::Failed { .. } => "failed",
            Self::Cancelled { .. } => "cancelled",
            Self::QueueStatus { .. } => "queue_status",
        }
    }
}
