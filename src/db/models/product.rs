//! Product catalog models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Product {
    #[serde(rename = "product_id")]
    pub id: String,
    #[serde(rename = "product_name")]
    pub name: String,
    pub price: f64,
    pub rating: f64,
    #[serde(rename = "image")]
    pub image_url: String,
    #[serde(skip_serializing)]
    pub created_at: String,
    #[serde(skip_serializing)]
    pub updated_at: String,
}

/// Body for `POST /product` and `PUT /product/:id`
#[derive(Debug, Default, Deserialize)]
pub struct ProductRequest {
    /// Ids are assigned by the server; a client-supplied one is rejected
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Serialize)]
pub struct CreateProductResponse {
    pub message: String,
    pub id: String,
}

/// Query string for `GET /product/price`
#[derive(Debug, Default, Deserialize)]
pub struct PriceRangeQuery {
    #[serde(default, rename = "minPrice")]
    pub min_price: Option<String>,
    #[serde(default, rename = "maxPrice")]
    pub max_price: Option<String>,
}

/// Query string for `GET /product/keyword`
#[derive(Debug, Default, Deserialize)]
pub struct KeywordQuery {
    #[serde(default)]
    pub keyword: String,
}
