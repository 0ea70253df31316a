//! Bearer-token extractors.
//!
//! Handlers take a [`Caller`] to require any signed-in user, or an
//! [`Admin`] to additionally require the admin role. Both read
//! `Authorization: Bearer <access token>` and verify it with the engine's
//! token codec; no store lookup is needed.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use streamgate_session::Identity;

use crate::{ApiError, AppState};

/// Returns the token from an `Authorization: Bearer …` header, or `""`.
pub(crate) fn bearer_token(headers: &HeaderMap) -> &str {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or_default()
}

/// A verified, signed-in caller.
#[derive(Debug, Clone)]
pub struct Caller(pub Identity);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let identity = state.engine.authenticate(bearer_token(&parts.headers))?;
        Ok(Self(identity))
    }
}

/// A verified caller holding the admin role.
#[derive(Debug, Clone)]
pub struct Admin(pub Identity);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Caller(identity) = Caller::from_request_parts(parts, state).await?;
        state.engine.require_admin(&identity)?;
        Ok(Self(identity))
    }
}
