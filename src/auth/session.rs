//! Session token storage.
//!
//! Applying a token after verification is fire-and-forget: the user has
//! already been verified by the time the token arrives, so a slow or failed
//! store never blocks navigation.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;

use super::SessionToken;
use crate::error::GatewayError;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist the token returned by a successful verify.
    async fn apply(&self, token: SessionToken) -> Result<(), GatewayError>;

    /// Forget the current token.
    async fn clear(&self) -> Result<(), GatewayError>;

    /// Access token of the current session, if one has been applied.
    async fn access_token(&self) -> Option<SecretString>;
}

/// In-process store holding the latest token.
#[derive(Default)]
pub struct MemorySessionStore {
    current: RwLock<Option<SessionToken>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn has_session(&self) -> bool {
        self.current.read().await.is_some()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn apply(&self, token: SessionToken) -> Result<(), GatewayError> {
        if token.access_token.expose_secret().is_empty() {
            return Err(GatewayError::InvalidResponse {
                operation: "apply_session".into(),
                reason: "empty access token".into(),
            });
        }
        *self.current.write().await = Some(token);
        tracing::debug!("Session token applied");
        Ok(())
    }

    async fn clear(&self) -> Result<(), GatewayError> {
        *self.current.write().await = None;
        Ok(())
    }

    async fn access_token(&self) -> Option<SecretString> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|t| t.access_token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(access: &str) -> SessionToken {
        SessionToken {
            access_token: SecretString::from(access.to_string()),
            refresh_token: SecretString::from("refresh".to_string()),
        }
    }

    #[tokio::test]
    async fn apply_then_clear() {
        let store = MemorySessionStore::new();
        assert!(!store.has_session().await);

        store.apply(token("access-1")).await.unwrap();
        let access = store.access_token().await.unwrap();
        assert_eq!(access.expose_secret(), "access-1");

        store.clear().await.unwrap();
        assert!(!store.has_session().await);
        assert!(store.access_token().await.is_none());
    }

    #[tokio::test]
    async fn empty_token_is_refused() {
        let store = MemorySessionStore::new();
        assert!(store.apply(token("")).await.is_err());
        assert!(!store.has_session().await);
    }
}
