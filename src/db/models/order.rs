//! Order history rows. Orders are read-only here; nothing in this service places them.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    #[serde(rename = "order_id")]
    pub id: String,
    #[serde(skip_serializing)]
    pub user_id: String,
    pub discount: f64,
    pub payment_method: String,
    pub quantity: i64,
    pub created_at: String,
    pub updated_at: String,
}
