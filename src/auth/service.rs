//! Sign-up, sign-in, token refresh and request authentication.

use std::sync::Arc;
use thiserror::Error;

use super::token::{tokens_match, Identity, TokenError, TokenPair, TokenService, UserClaims};
use crate::crypto::{self, HashError};
use crate::db::store::{StoreError, UserStore};
use crate::db::{SignInRequest, SignUpRequest, User};
use crate::validation;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{message}")]
    InvalidInput {
        field: &'static str,
        message: String,
    },
    #[error("user with that email already exists")]
    UserAlreadyExists,
    #[error("user not found")]
    UserNotFound,
    #[error("password is incorrect")]
    IncorrectPassword,
    #[error("error while updating token")]
    TokenUpdate,
    #[error("failed to store user: {0}")]
    Persist(#[source] StoreError),
    #[error(transparent)]
    Hash(#[from] HashError),
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl AuthError {
    fn invalid(field: &'static str, message: String) -> Self {
        AuthError::InvalidInput { field, message }
    }
}

/// Stateless between requests; holds only the store and the signing keys.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, tokens: TokenService) -> Self {
        Self { users, tokens }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Register a new user. The created session pair is stored but not returned.
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<User, AuthError> {
        let email = request.email.trim().to_string();
        let first_name = request.first_name.trim().to_string();

        validation::validate_email(&email).map_err(|m| AuthError::invalid("email", m))?;
        validation::validate_password(&request.password)
            .map_err(|m| AuthError::invalid("password", m))?;
        validation::validate_first_name(&first_name)
            .map_err(|m| AuthError::invalid("first_name", m))?;

        if self.users.email_exists(&email).await.map_err(AuthError::Persist)? {
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = crypto::hash_password(&request.password)?;
        let now = chrono::Utc::now().to_rfc3339();
        let mut user = User {
            id: uuid::Uuid::new_v4().to_string(),
            first_name,
            last_name: request.last_name.trim().to_string(),
            email,
            password_hash,
            token: String::new(),
            refresh_token: String::new(),
            created_at: now.clone(),
            updated_at: now,
        };

        let pair = self.tokens.issue_pair(&Identity::from(&user))?;
        user.token = pair.access_token;
        user.refresh_token = pair.refresh_token;

        match self.users.insert(&user).await {
            Ok(()) => {}
            // Lost a race with a concurrent sign-up for the same email
            Err(StoreError::Conflict) => return Err(AuthError::UserAlreadyExists),
            Err(e) => return Err(AuthError::Persist(e)),
        }

        tracing::info!(user_id = %user.id, "User signed up");
        Ok(user)
    }

    /// Verify credentials and rotate the session pair.
    pub async fn sign_in(&self, request: SignInRequest) -> Result<TokenPair, AuthError> {
        let email = request.email.trim();

        validation::validate_email(email).map_err(|m| AuthError::invalid("email", m))?;
        validation::validate_password(&request.password)
            .map_err(|m| AuthError::invalid("password", m))?;

        let user = self
            .users
            .find_by_email(email)
            .await
            .map_err(AuthError::Persist)?
            .ok_or(AuthError::UserNotFound)?;

        // Session state is untouched unless the password checks out
        if !crypto::verify_password(&user.password_hash, &request.password) {
            tracing::debug!(user_id = %user.id, "Sign-in rejected: incorrect password");
            return Err(AuthError::IncorrectPassword);
        }

        let pair = self.tokens.issue_pair(&Identity::from(&user))?;

        match self
            .users
            .update_tokens(&user.id, &pair.access_token, &pair.refresh_token)
            .await
        {
            Ok(0) => return Err(AuthError::TokenUpdate),
            Ok(_) => {}
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "Failed to persist session tokens");
                return Err(AuthError::TokenUpdate);
            }
        }

        tracing::info!(user_id = %user.id, "User signed in");
        Ok(pair)
    }

    /// Body-level entry point for `POST /auth/tokenrefresh`.
    pub async fn token_refresh(&self, refresh_token: Option<&str>) -> Result<String, AuthError> {
        let refresh_token = match refresh_token.map(str::trim) {
            Some(token) if !token.is_empty() => token,
            _ => {
                return Err(AuthError::invalid(
                    "refresh_token",
                    "refresh_token is required".to_string(),
                ))
            }
        };

        Ok(self.refresh_access_token(refresh_token).await?)
    }

    /// Exchange a live refresh token for a new access token.
    ///
    /// The new access token is persisted only while `refresh_token` is still the
    /// user's stored one, so a concurrent sign-in wins over this refresh.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, TokenError> {
        let claims = self.tokens.decode(refresh_token)?;
        let user = self
            .users
            .find_by_id(&claims.id)
            .await?
            .ok_or(TokenError::UnknownUser)?;

        if !tokens_match(refresh_token, &user.refresh_token) {
            return Err(TokenError::Superseded);
        }

        let access_token = self.tokens.issue_access(&Identity::from(&user))?;

        match self
            .users
            .update_access_token(&user.id, refresh_token, &access_token)
            .await
        {
            Ok(0) => return Err(TokenError::Persist),
            Ok(_) => {}
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "Failed to persist refreshed access token");
                return Err(TokenError::Persist);
            }
        }

        tracing::debug!(user_id = %user.id, "Access token refreshed");
        Ok(access_token)
    }

    /// Two-phase validation of a bearer access token.
    pub async fn authenticate(&self, access_token: &str) -> Result<UserClaims, TokenError> {
        let claims = self.tokens.decode(access_token)?;
        let user = self
            .users
            .find_by_id(&claims.id)
            .await?
            .ok_or(TokenError::UnknownUser)?;

        if !tokens_match(access_token, &user.token) {
            return Err(TokenError::Superseded);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_store;
    use chrono::Duration;

    async fn service() -> (AuthService, Arc<dyn UserStore>) {
        let store: Arc<dyn UserStore> = Arc::new(memory_store().await);
        let tokens = TokenService::new("test-secret", Duration::minutes(5), Duration::hours(2190));
        (AuthService::new(store.clone(), tokens), store)
    }

    fn sign_up_request(email: &str) -> SignUpRequest {
        SignUpRequest {
            first_name: "Alice".to_string(),
            last_name: "Doe".to_string(),
            email: email.to_string(),
            password: "secret-pw".to_string(),
        }
    }

    fn sign_in_request(email: &str, password: &str) -> SignInRequest {
        SignInRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_sign_up_succeeds_once_per_email() {
        let (auth, store) = service().await;

        let user = auth.sign_up(sign_up_request("alice@example.com")).await.unwrap();
        assert_ne!(user.password_hash, "secret-pw");
        assert!(!user.token.is_empty());
        assert!(!user.refresh_token.is_empty());
        assert!(store.list_addresses(&user.id).await.unwrap().is_empty());
        assert!(store.list_orders(&user.id).await.unwrap().is_empty());

        let err = auth.sign_up(sign_up_request("alice@example.com")).await.unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists));
    }

    #[tokio::test]
    async fn test_sign_up_validates_input() {
        let (auth, _) = service().await;

        let mut short_password = sign_up_request("bob@example.com");
        short_password.password = "12345".to_string();
        assert!(matches!(
            auth.sign_up(short_password).await,
            Err(AuthError::InvalidInput { field: "password", .. })
        ));

        let mut bad_email = sign_up_request("not-an-email");
        bad_email.first_name = "Bob".to_string();
        assert!(matches!(
            auth.sign_up(bad_email).await,
            Err(AuthError::InvalidInput { field: "email", .. })
        ));

        let mut short_name = sign_up_request("bob@example.com");
        short_name.first_name = "Bo".to_string();
        assert!(matches!(
            auth.sign_up(short_name).await,
            Err(AuthError::InvalidInput { field: "first_name", .. })
        ));
    }

    #[tokio::test]
    async fn test_sign_in_rotates_session() {
        let (auth, store) = service().await;
        let user = auth.sign_up(sign_up_request("carol@example.com")).await.unwrap();

        let pair = auth
            .sign_in(sign_in_request("carol@example.com", "secret-pw"))
            .await
            .unwrap();

        let stored = store.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.token, pair.access_token);
        assert_eq!(stored.refresh_token, pair.refresh_token);
        assert_ne!(stored.token, user.token);

        let claims = auth.authenticate(&pair.access_token).await.unwrap();
        assert_eq!(claims.id, user.id);
        assert_eq!(claims.email, "carol@example.com");
    }

    #[tokio::test]
    async fn test_wrong_password_leaves_session_untouched() {
        let (auth, store) = service().await;
        let user = auth.sign_up(sign_up_request("dave@example.com")).await.unwrap();

        let err = auth
            .sign_in(sign_in_request("dave@example.com", "wrong-pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::IncorrectPassword));

        let stored = store.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.token, user.token);
        assert_eq!(stored.refresh_token, user.refresh_token);
    }

    #[tokio::test]
    async fn test_sign_in_unknown_email() {
        let (auth, _) = service().await;
        let err = auth
            .sign_in(sign_in_request("nobody@example.com", "secret-pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn test_later_sign_in_supersedes_earlier_tokens() {
        let (auth, _) = service().await;
        auth.sign_up(sign_up_request("erin@example.com")).await.unwrap();

        let first = auth
            .sign_in(sign_in_request("erin@example.com", "secret-pw"))
            .await
            .unwrap();
        let second = auth
            .sign_in(sign_in_request("erin@example.com", "secret-pw"))
            .await
            .unwrap();

        assert!(matches!(
            auth.authenticate(&first.access_token).await,
            Err(TokenError::Superseded)
        ));
        assert!(matches!(
            auth.refresh_access_token(&first.refresh_token).await,
            Err(TokenError::Superseded)
        ));
        assert!(auth.authenticate(&second.access_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_replaces_access_token() {
        let (auth, store) = service().await;
        let user = auth.sign_up(sign_up_request("frank@example.com")).await.unwrap();
        let pair = auth
            .sign_in(sign_in_request("frank@example.com", "secret-pw"))
            .await
            .unwrap();

        let refreshed = auth.refresh_access_token(&pair.refresh_token).await.unwrap();
        assert_ne!(refreshed, pair.access_token);

        let stored = store.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.token, refreshed);
        assert_eq!(stored.refresh_token, pair.refresh_token);

        assert!(auth.authenticate(&refreshed).await.is_ok());
        assert!(matches!(
            auth.authenticate(&pair.access_token).await,
            Err(TokenError::Superseded)
        ));
    }

    #[tokio::test]
    async fn test_expired_refresh_token_issues_nothing() {
        let store: Arc<dyn UserStore> = Arc::new(memory_store().await);
        let expired = TokenService::new("test-secret", Duration::minutes(-1), Duration::minutes(-1));
        let auth = AuthService::new(store.clone(), expired);

        let user = auth.sign_up(sign_up_request("gina@example.com")).await.unwrap();
        let err = auth.refresh_access_token(&user.refresh_token).await.unwrap_err();
        assert!(matches!(err, TokenError::Expired));

        let stored = store.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.token, user.token);
    }

    #[tokio::test]
    async fn test_token_refresh_requires_token() {
        let (auth, _) = service().await;
        assert!(matches!(
            auth.token_refresh(None).await,
            Err(AuthError::InvalidInput { field: "refresh_token", .. })
        ));
        assert!(matches!(
            auth.token_refresh(Some("  ")).await,
            Err(AuthError::InvalidInput { .. })
        ));
        assert!(matches!(
            auth.token_refresh(Some("not-a-jwt")).await,
            Err(AuthError::Token(TokenError::Malformed))
        ));
    }

    #[tokio::test]
    async fn test_token_for_deleted_user_is_unknown() {
        let (auth, _) = service().await;
        let stranger = Identity {
            id: uuid::Uuid::new_v4().to_string(),
            email: "ghost@example.com".to_string(),
            first_name: "Ghost".to_string(),
        };
        let token = auth.tokens().issue_access(&stranger).unwrap();
        assert!(matches!(
            auth.authenticate(&token).await,
            Err(TokenError::UnknownUser)
        ));
    }
}
