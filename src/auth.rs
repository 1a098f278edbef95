use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    repository::RepositoryState,
};

pub const ADMIN_ROLE: &str = "admin";

/// Claims
///
/// The payload expected inside a bearer JWT issued by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's UUID, matching `users.id`.
    pub sub: Uuid,
    /// Expiration time (seconds since the epoch). Always validated.
    pub exp: usize,
    /// Issued at.
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Taking it as a handler
/// argument is the "authentication required" gate: the request is rejected
/// with 401 before the handler runs.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    /// 'user' or 'admin'.
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Local bypass: in `Env::Local`, an `x-user-id` header naming an existing user is accepted.
/// 2. Bearer token extraction and JWT decoding with expiry validation.
/// 3. Repository lookup, so tokens of removed users stop working.
///
/// Rejection: `StatusCode::UNAUTHORIZED` on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|id_str| Uuid::parse_str(id_str).ok());

            if let Some(user_id) = bypass_id {
                if let Ok(Some(user)) = repo.get_user(user_id).await {
                    return Ok(AuthUser {
                        id: user.id,
                        role: user.role,
                    });
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            tracing::debug!("rejected bearer token: {:?}", e.kind());
            StatusCode::UNAUTHORIZED
        })?;

        let user = match repo.get_user(token_data.claims.sub).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(StatusCode::UNAUTHORIZED),
            Err(e) => {
                tracing::error!("user lookup failed during authentication: {}", e);
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        Ok(AuthUser {
            id: user.id,
            role: user.role,
        })
    }
}

/// MaybeUser
///
/// Optional identity for public pages. Anonymous visitors, and requests whose
/// credentials do not check out, are treated alike as `MaybeUser(None)`.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthUser>);

impl MaybeUser {
    pub fn id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|user| user.id)
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            AuthUser::from_request_parts(parts, state).await.ok(),
        ))
    }
}
