use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CancelError {
    #[error("No analysis is currently running")]
    NotLoading,

    #[error("Cancellation already requested")]
    AlreadyRequested,

    #[error("Cancellation request failed: {0}")]
    Rpc(String),

    #[error("Cancellation request timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure reported by a [`CancellationRpc`](crate::CancellationRpc) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error("Backend has no running analysis for this session")]
    NotRunning,

    #[error("Failed to reach backend: {0}")]
    Transport(String),
}
