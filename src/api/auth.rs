//! Sign-up, sign-in and token refresh endpoints, plus the bearer-token
//! middleware and extractor guarding everything under `/user`.

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::Response,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::error::ApiError;
use super::extract::JsonBody;
use super::metrics;
use crate::auth::UserClaims;
use crate::db::{SignInRequest, SignInResponse, SignUpRequest, TokenRefreshRequest};
use crate::AppState;

/// The caller of an authenticated request, as proven by its access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub first_name: String,
}

impl From<UserClaims> for AuthUser {
    fn from(claims: UserClaims) -> Self {
        Self {
            id: claims.id,
            email: claims.email,
            first_name: claims.first_name,
        }
    }
}

/// POST /auth/signup
pub async fn signup(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<SignUpRequest>,
) -> Result<Json<Value>, ApiError> {
    let result = state.auth.sign_up(request).await;
    metrics::record_sign_up(result.is_ok());
    result?;

    Ok(Json(json!({ "message": "User created successfully" })))
}

/// POST /auth/signin
pub async fn signin(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<SignInRequest>,
) -> Result<Json<Value>, ApiError> {
    let result = state.auth.sign_in(request).await;
    metrics::record_sign_in(result.is_ok());
    let pair = result?;

    Ok(Json(json!({
        "message": SignInResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    })))
}

/// POST /auth/tokenrefresh
pub async fn token_refresh(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<TokenRefreshRequest>,
) -> Result<Json<Value>, ApiError> {
    let result = state
        .auth
        .token_refresh(request.refresh_token.as_deref())
        .await;
    metrics::record_token_refresh(result.is_ok());
    let access_token = result?;

    Ok(Json(json!({ "message": access_token })))
}

/// Extract the bearer token from the Authorization header
fn extract_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    let header = headers.get("Authorization").and_then(|h| h.to_str().ok())?;
    let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

async fn authenticate(state: &AppState, headers: &axum::http::HeaderMap) -> Result<AuthUser, ApiError> {
    let token = extract_token(headers).ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;
    let claims = state.auth.authenticate(token).await.map_err(|e| {
        tracing::debug!(error = %e, "Rejected access token");
        ApiError::from(e)
    })?;
    Ok(AuthUser::from(claims))
}

/// Auth middleware that validates access tokens and stores the caller in request extensions
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(&state, request.headers()).await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Extractor for the authenticated caller.
///
/// Reuses the identity established by [`auth_middleware`] when present, so
/// routes outside the middleware (product writes) can require auth on their own.
#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let user = authenticate(state, &parts.headers).await?;
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[test]
    fn test_extract_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert("Authorization", "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(extract_token(&headers), Some("abc.def.ghi"));

        headers.insert("Authorization", "abc.def.ghi".parse().unwrap());
        assert_eq!(extract_token(&headers), Some("abc.def.ghi"));

        headers.insert("Authorization", "Bearer ".parse().unwrap());
        assert_eq!(extract_token(&headers), None);
    }
}
