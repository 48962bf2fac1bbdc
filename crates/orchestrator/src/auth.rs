//! Caller identity
//!
//! Every service route needs `Authorization: Bearer <token>`. The token is
//! resolved to an owner id by the configured [`IdentityVerifier`].

use crate::handlers::{ApiError, AppState};
use architect_common::{Error, Result};
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves bearer tokens to owner ids
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Errors are [`Error::Unauthorized`]
    async fn verify(&self, token: &str) -> Result<String>;
}

/// Treats the token itself as the owner id; development only
#[derive(Debug, Default)]
pub struct TrustedTokenVerifier;

#[async_trait]
impl IdentityVerifier for TrustedTokenVerifier {
    async fn verify(&self, token: &str) -> Result<String> {
        Ok(token.to_string())
    }
}

/// Fixed token → owner table
#[derive(Debug, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, String>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl IdentityVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<String> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| Error::Unauthorized("Invalid authentication credentials".to_string()))
    }
}

/// Authenticated caller, extracted from the request headers
#[derive(Debug, Clone)]
pub struct Owner(pub String);

impl FromRequestParts<Arc<AppState>> for Owner {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| Error::Unauthorized("Missing Authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::Unauthorized("Expected a bearer token".to_string()))?;

        let owner = state.verifier.verify(token).await?;
        Ok(Owner(owner))
    }
}
