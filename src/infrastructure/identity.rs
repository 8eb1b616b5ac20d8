use crate::domain::ports::IdentityProvider;
use crate::domain::user::Identity;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Session-token identity provider held in memory.
///
/// Tokens are registered up front (from the seed file or by tests); signing
/// out revokes the token.
#[derive(Default, Clone)]
pub struct InMemoryIdentityProvider {
    sessions: Arc<RwLock<HashMap<String, Identity>>>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_session(&self, token: impl Into<String>, identity: Identity) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(token.into(), identity);
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn current_user(&self, token: &str) -> Result<Option<Identity>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(token).cloned())
    }

    async fn sign_out(&self, token: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(token).is_some() {
            tracing::debug!("session revoked");
        }
        Ok(())
    }
}
