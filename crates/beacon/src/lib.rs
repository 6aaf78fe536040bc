//! Live status tracking for concurrent backend analysis sessions.
//!
//! A backend publishes [`RawEvent`]s on a [`BackendBus`]; the [`EventBridge`]
//! applies them to a [`SessionStatusStore`]; UI code reads the store through
//! [`SessionStatusView`]s and stops jobs through the [`CancellationGateway`].
//! [`StatusRuntime`] wires all of it from a [`BeaconConfig`].

mod runtime;

pub use beacon_config::{
    load_config, BeaconConfig, BridgeSettings, CancelSettings, LegacyLoadingPolicy, ViewSettings,
};
pub use beacon_core::{Progress, SessionError, SessionStatusRecord, SessionStatusStore, Subscription};
pub use beacon_events::{ActiveSession, BackendBus, EventBridge};
pub use beacon_gateway::{
    AlwaysConfirm, CancelConfirmer, CancelError, CancelOutcome, CancellationGateway,
    CancellationRpc, RpcError,
};
pub use beacon_protocol::{error_codes, recovery_hints, topics, BackendEvent, QueueState, RawEvent};
pub use beacon_telemetry::{init_subscriber, try_init_subscriber, TelemetryConfig};
pub use beacon_view::{format_elapsed, SessionStatusView, StatusSnapshot};
pub use runtime::StatusRuntime;
