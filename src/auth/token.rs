//! HS256 session tokens.
//!
//! A session is an (access, refresh) pair of JWTs carrying the same identity
//! claims with independent expiries. Validation happens in two phases:
//! [`TokenService::decode`] checks signature and expiry, then the caller
//! compares the presented token with the one stored on the user via
//! [`tokens_match`]. Only the most recently issued pair passes phase two.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::AuthConfig;
use crate::db::store::StoreError;

/// Who a token is issued for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub first_name: String,
}

impl From<&crate::db::User> for Identity {
    fn from(user: &crate::db::User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    pub email: String,
    pub first_name: String,
    pub id: String,
    /// Expiry as seconds since the Unix epoch
    pub exp: i64,
    /// Unique per issuance, so two tokens minted in the same second still differ
    pub jti: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is expired")]
    Expired,
    #[error("token is invalid")]
    Malformed,
    #[error("token has been superseded by a newer session")]
    Superseded,
    #[error("user not found")]
    UnknownUser,
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("error while updating token")]
    Persist,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Issues and verifies session tokens. Keys are derived once and never change.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Build from configuration, generating a throwaway secret when none is set.
    pub fn from_config(config: &AuthConfig) -> Self {
        let secret = match config.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => secret.to_string(),
            _ => {
                tracing::warn!(
                    "No JWT secret configured; generated a random one. Tokens will not survive a restart."
                );
                crate::crypto::generate_secret()
            }
        };

        Self::new(
            &secret,
            Duration::minutes(config.access_token_minutes),
            Duration::hours(config.refresh_token_hours),
        )
    }

    pub fn issue_pair(&self, identity: &Identity) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.sign(identity, self.access_ttl)?,
            refresh_token: self.sign(identity, self.refresh_ttl)?,
        })
    }

    pub fn issue_access(&self, identity: &Identity) -> Result<String, TokenError> {
        self.sign(identity, self.access_ttl)
    }

    fn sign(&self, identity: &Identity, ttl: Duration) -> Result<String, TokenError> {
        let claims = UserClaims {
            email: identity.email.clone(),
            first_name: identity.first_name.clone(),
            id: identity.id.clone(),
            exp: (Utc::now() + ttl).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(TokenError::Signing)
    }

    /// Verify signature and expiry. Does not consult the store.
    pub fn decode(&self, token: &str) -> Result<UserClaims, TokenError> {
        let data = decode::<UserClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            }
        })?;

        if uuid::Uuid::parse_str(&data.claims.id).is_err() {
            return Err(TokenError::Malformed);
        }

        Ok(data.claims)
    }
}

/// Constant-time comparison of a presented token with the stored one
pub fn tokens_match(presented: &str, stored: &str) -> bool {
    let presented = presented.as_bytes();
    let stored = stored.as_bytes();
    // Only compare if lengths match (constant-time check)
    !stored.is_empty() && presented.len() == stored.len() && presented.ct_eq(stored).into()
}
