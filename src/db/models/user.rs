//! User, profile and authentication models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{Address, AddressRequest, Order};

/// A registered shopper. The token columns hold the single live session pair.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub token: String,
    #[serde(skip_serializing)]
    pub refresh_token: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SignUpRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SignInRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenRefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Profile view returned by `GET /user/profile`
#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    pub userid: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
    pub address: Vec<Address>,
    pub orders: Vec<Order>,
}

impl ProfileResponse {
    pub fn new(user: User, address: Vec<Address>, orders: Vec<Order>) -> Self {
        Self {
            userid: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
            address,
            orders,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    /// Replaces the whole address book when present
    #[serde(default)]
    pub address: Option<Vec<AddressRequest>>,
}

/// Validated profile changes handed to the store
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub addresses: Option<Vec<Address>>,
    pub updated_at: String,
}
