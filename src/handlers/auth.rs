// src/handlers/auth.rs
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;

use crate::errors::RideError;
use crate::models::identity::Identity;
use crate::state::AppState;

/// Any caller with a bearer token the identity provider recognises.
pub struct AuthUser(pub Identity);

/// A caller resolved to the operator role.
pub struct Operator(pub Identity);

fn bearer_token(parts: &Parts) -> Result<&str, RideError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| RideError::unauthorized("missing Authorization header"))?
        .to_str()
        .map_err(|_| RideError::TokenInvalid)?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(RideError::TokenInvalid)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = RideError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let identity = state.identity.resolve(token).await?;
        Ok(AuthUser(identity))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Operator {
    type Rejection = RideError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;
        if !identity.is_operator() {
            return Err(RideError::InsufficientPermissions);
        }
        Ok(Operator(identity))
    }
}
