use parking_lot::RwLock;
use std::sync::Arc;

/// The session currently focused in the UI.
///
/// Shared by cloning. Readers always see the latest focus, so code that
/// resolves an id-less event must read it when the event is handled rather
/// than keep a copy around.
#[derive(Debug, Clone, Default)]
pub struct ActiveSession {
    current: Arc<RwLock<Option<String>>>,
}

impl ActiveSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focus(&self, session_id: impl Into<String>) {
        let session_id = session_id.into();
        tracing::debug!(session_id = %session_id, "Session focused");
        *self.current.write() = Some(session_id);
    }

    /// Drop focus. Returns the session that was focused, if any.
    pub fn blur(&self) -> Option<String> {
        self.current.write().take()
    }

    pub fn current(&self) -> Option<String> {
        self.current.read().clone()
    }

    pub fn is_focused(&self, session_id: &str) -> bool {
        self.current.read().as_deref() == Some(session_id)
    }
}
