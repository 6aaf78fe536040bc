use async_trait::async_trait;

use crate::error::RpcError;

/// Transport that asks the backend to stop a session's analysis.
///
/// Success means the request was accepted, not that the job has stopped.
#[async_trait]
pub trait CancellationRpc: Send + Sync {
    async fn request_cancellation(&self, session_id: &str) -> Result<(), RpcError>;
}

/// Asks the user whether to go ahead with a cancellation.
#[async_trait]
pub trait CancelConfirmer: Send + Sync {
    async fn confirm(&self, session_id: &str) -> bool;
}

/// Confirmer for callers that have already asked, or never ask.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConfirm;

#[async_trait]
impl CancelConfirmer for AlwaysConfirm {
    async fn confirm(&self, _session_id: &str) -> bool {
        true
    }
}
