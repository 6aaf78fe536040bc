use std::sync::Arc;
use std::time::Duration;

use beacon_config::CancelSettings;
use beacon_core::SessionStatusStore;
use tokio::time::timeout;

use crate::error::CancelError;
use crate::rpc::{AlwaysConfirm, CancelConfirmer, CancellationRpc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The backend accepted the request. The session keeps loading until the
    /// backend reports the job as stopped.
    Requested,
    /// The user declined; nothing changed.
    Declined,
}

pub struct CancellationGateway {
    store: SessionStatusStore,
    rpc: Arc<dyn CancellationRpc>,
    confirmer: Arc<dyn CancelConfirmer>,
    rpc_timeout: Duration,
}

impl CancellationGateway {
    pub fn new(store: SessionStatusStore, rpc: Arc<dyn CancellationRpc>) -> Self {
        Self {
            store,
            rpc,
            confirmer: Arc::new(AlwaysConfirm),
            rpc_timeout: CancelSettings::default().rpc_timeout(),
        }
    }

    pub fn with_confirmer(mut self, confirmer: Arc<dyn CancelConfirmer>) -> Self {
        self.set_confirmer(confirmer);
        self
    }

    pub fn set_confirmer(&mut self, confirmer: Arc<dyn CancelConfirmer>) {
        self.confirmer = confirmer;
    }

    pub fn with_rpc_timeout(mut self, rpc_timeout: Duration) -> Self {
        self.rpc_timeout = rpc_timeout;
        self
    }

    pub fn with_settings(self, settings: &CancelSettings) -> Self {
        self.with_rpc_timeout(settings.rpc_timeout())
    }

    pub fn rpc_timeout(&self) -> Duration {
        self.rpc_timeout
    }

    /// Whether a cancel control should be enabled for `session_id`.
    pub fn can_cancel(&self, session_id: &str) -> bool {
        self.check_intent(session_id).is_ok()
    }

    /// Ask the backend to stop the analysis running for `session_id`.
    ///
    /// Loading state is left alone on success. On failure the session's
    /// cancellation flag is cleared so the user can try again.
    pub async fn cancel(&self, session_id: &str) -> Result<CancelOutcome, CancelError> {
        self.check_intent(session_id)?;

        if !self.confirmer.confirm(session_id).await {
            tracing::debug!(session_id, "Cancellation declined");
            return Ok(CancelOutcome::Declined);
        }

        // The job may have ended or been cancelled while the user was deciding.
        if !self.store.mark_cancellation_requested(session_id) {
            return Err(self.check_intent(session_id).err().unwrap_or(CancelError::NotLoading));
        }

        // Cleared on every exit except an accepted request, including this
        // future being dropped mid-call.
        let pending = PendingRequest {
            store: &self.store,
            session_id,
            armed: true,
        };

        tracing::info!(session_id, "Requesting analysis cancellation");

        let error = match timeout(self.rpc_timeout, self.rpc.request_cancellation(session_id)).await
        {
            Ok(Ok(())) => {
                pending.disarm();
                return Ok(CancelOutcome::Requested);
            }
            Ok(Err(e)) => CancelError::Rpc(e.to_string()),
            Err(_) => CancelError::Timeout(self.rpc_timeout),
        };

        tracing::warn!(session_id, "Cancellation request failed: {}", error);
        Err(error)
    }

    fn check_intent(&self, session_id: &str) -> Result<(), CancelError> {
        match self.store.get_session_state(session_id) {
            Some(state) if state.is_loading && state.cancellation_requested => {
                Err(CancelError::AlreadyRequested)
            }
            Some(state) if state.is_loading => Ok(()),
            _ => Err(CancelError::NotLoading),
        }
    }
}

struct PendingRequest<'a> {
    store: &'a SessionStatusStore,
    session_id: &'a str,
    armed: bool,
}

impl PendingRequest<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        if self.armed && self.store.reset_cancellation_request(self.session_id) {
            tracing::debug!(session_id = self.session_id, "Cancellation flag cleared");
        }
    }
}
