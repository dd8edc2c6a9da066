//! Per-session state addressed by id.

use std::collections::HashMap;
use std::sync::Arc;

use fixdesk_core::session::{ConversationSession, SessionId};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// All live sessions. Each session has its own lock, so turns on distinct
/// sessions never wait on each other.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<ConversationSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The session for `id`, created in the initial stage if absent.
    pub async fn get_or_create(&self, id: &SessionId) -> Arc<Mutex<ConversationSession>> {
        if let Some(session) = self.sessions.read().await.get(id) {
            return session.clone();
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(session_id = %id, "Session created");
                Arc::new(Mutex::new(ConversationSession::new(id.clone())))
            })
            .clone()
    }

    pub async fn get(&self, id: &SessionId) -> Option<Arc<Mutex<ConversationSession>>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Discard the session and start a fresh one under the same id.
    pub async fn reset(&self, id: &SessionId) -> Arc<Mutex<ConversationSession>> {
        let fresh = Arc::new(Mutex::new(ConversationSession::new(id.clone())));
        self.sessions.write().await.insert(id.clone(), fresh.clone());
        debug!(session_id = %id, "Session reset");
        fresh
    }

    /// Discard the session. Returns whether it existed.
    pub async fn remove(&self, id: &SessionId) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    /// A copy of the session's current state.
    pub async fn snapshot(&self, id: &SessionId) -> Option<ConversationSession> {
        let session = self.get(id).await?;
        let guard = session.lock().await;
        Some(guard.clone())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
