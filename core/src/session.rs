//! Access-token source for authenticated calls.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

/// Supplies bearer tokens and forgets them when the server rejects them.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// A current access token, or `None` when signed out.
    async fn access_token(&self) -> Option<String>;

    /// Drop stored credentials so the next access forces a sign-in.
    async fn clear_tokens(&self);
}

/// In-memory session holding a single token.
#[derive(Debug, Default)]
pub struct MemorySession {
    token: Mutex<Option<String>>,
}

impl MemorySession {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    pub fn is_signed_in(&self) -> bool {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[async_trait]
impl SessionProvider for MemorySession {
    async fn access_token(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn clear_tokens(&self) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
