use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{SessionData, SessionError, SessionKey, SessionStore};

/// Process-local sessions. Lost on restart.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionKey, SessionData>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &SessionKey) -> Result<Option<SessionData>, SessionError> {
        Ok(self.sessions.read().await.get(key).cloned())
    }

    async fn set(&self, key: &SessionKey, data: SessionData) -> Result<(), SessionError> {
        self.sessions.write().await.insert(key.clone(), data);
        Ok(())
    }

    async fn clear(&self, key: &SessionKey) -> Result<(), SessionError> {
        self.sessions.write().await.remove(key);
        Ok(())
    }
}
