//! Identity boundary: maps an external credential to an internal user id.
//!
//! Handlers take a [`Caller`] argument to require an authenticated user.
//! The extractor reads `Authorization: Bearer <token>` and resolves the token
//! through the [`IdentityResolver`] in [`AppState`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::app_state::AppState;
use crate::domain::UserId;
use crate::error::MarketError;
use crate::persistence::Store;

/// Resolves a bearer credential to a user.
#[async_trait]
pub trait IdentityResolver: Send + Sync + fmt::Debug {
    /// Returns the user behind `token`, or `None` if it is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] if the lookup fails.
    async fn resolve(&self, token: &str) -> Result<Option<UserId>, MarketError>;
}

/// Treats the bearer token as the user's external identity subject.
///
/// Suitable behind an authenticating proxy that forwards the verified
/// subject; swap for a token-verifying resolver otherwise.
#[derive(Debug, Clone)]
pub struct StoreIdentityResolver {
    store: Arc<dyn Store>,
}

impl StoreIdentityResolver {
    /// Creates a resolver over the user collection of `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl IdentityResolver for StoreIdentityResolver {
    async fn resolve(&self, token: &str) -> Result<Option<UserId>, MarketError> {
        Ok(self
            .store
            .user_by_external_id(token)
            .await?
            .map(|user| user.id))
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub UserId);

impl Caller {
    /// Internal user id.
    #[must_use]
    pub const fn id(self) -> UserId {
        self.0
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = MarketError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(MarketError::Unauthorized)?;

        match state.identity.resolve(token).await? {
            Some(user_id) => Ok(Self(user_id)),
            None => {
                tracing::debug!("bearer token did not resolve to a user");
                Err(MarketError::Unauthorized)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::User;
    use crate::persistence::MemoryStore;

    #[tokio::test]
    async fn resolves_known_subject_only() {
        let store = Arc::new(MemoryStore::new());
        let user = User {
            id: UserId::new(),
            external_id: "auth0|alice".to_string(),
            accepted_terms_version: None,
        };
        let _ = store.save_user(user.clone()).await;
        let resolver = StoreIdentityResolver::new(store);

        let Ok(found) = resolver.resolve("auth0|alice").await else {
            panic!("lookup failed");
        };
        assert_eq!(found, Some(user.id));
        assert!(matches!(resolver.resolve("auth0|mallory").await, Ok(None)));
    }
}
