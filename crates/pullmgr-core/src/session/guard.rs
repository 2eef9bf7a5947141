//! RAII guard that ends a session when dropped.

use std::sync::Arc;

use super::TransferSession;

/// Ends the wrapped session exactly once, on every exit path.
pub struct SessionGuard {
    session: Arc<dyn TransferSession>,
}

impl SessionGuard {
    pub fn new(session: Arc<dyn TransferSession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<dyn TransferSession> {
        &self.session
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        tracing::debug!(session = %self.session.identity(), "ending session");
        self.session.end();
    }
}
