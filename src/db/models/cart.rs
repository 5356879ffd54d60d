//! Cart line models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CartLine {
    #[serde(rename = "cart_id")]
    pub id: String,
    #[serde(skip_serializing)]
    pub user_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl CartLine {
    pub fn new(user_id: &str, product_id: &str, quantity: i64) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            product_id: product_id.to_string(),
            quantity,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Result of adding a product to a cart
#[derive(Debug, Clone, PartialEq)]
pub enum CartMerge {
    /// No line existed for the product; a new one was inserted
    Created(CartLine),
    /// The product was already in the cart; its quantity was incremented
    Merged(CartLine),
}

impl CartMerge {
    pub fn line(&self) -> &CartLine {
        match self {
            CartMerge::Created(line) | CartMerge::Merged(line) => line,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AddCartItemRequest {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
}

/// Full replacement of a cart line. The line id comes from the path, never the body.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCartLineRequest {
    #[serde(default)]
    pub cart_id: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
}
