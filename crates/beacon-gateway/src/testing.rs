//! Test doubles for the gateway's collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::RpcError;
use crate::rpc::{CancelConfirmer, CancellationRpc};

pub struct MockCancellationRpc {
    delay: Option<Duration>,
    error: Mutex<Option<RpcError>>,
    requests: Mutex<Vec<String>>,
    call_count: AtomicUsize,
}

impl MockCancellationRpc {
    pub fn new() -> Self {
        Self {
            delay: None,
            error: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next request only.
    pub fn with_error(self, error: RpcError) -> Self {
        *self.error.lock() = Some(error);
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn requested_sessions(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

impl Default for MockCancellationRpc {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CancellationRpc for MockCancellationRpc {
    async fn request_cancellation(&self, session_id: &str) -> Result<(), RpcError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(session_id.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.error.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub struct MockConfirmer {
    answer: bool,
    asked: AtomicUsize,
}

impl MockConfirmer {
    pub fn accepting() -> Self {
        Self {
            answer: true,
            asked: AtomicUsize::new(0),
        }
    }

    pub fn declining() -> Self {
        Self {
            answer: false,
            asked: AtomicUsize::new(0),
        }
    }

    pub fn asked_count(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CancelConfirmer for MockConfirmer {
    async fn confirm(&self, _session_id: &str) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}
