//! Product catalog: reads are public, writes require a signed-in caller.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::JsonBody;
use crate::db::store::StoreError;
use crate::db::{CreateProductResponse, KeywordQuery, PriceRangeQuery, Product, ProductRequest};
use crate::validation;
use crate::AppState;

/// Fields shared by create and full-replacement update
struct ProductFields {
    name: String,
    price: f64,
    rating: f64,
    image_url: String,
}

fn validate_product(request: ProductRequest) -> Result<ProductFields, ApiError> {
    let name = request.product_name.trim().to_string();
    let image_url = request.image.trim().to_string();
    let rating = request.rating.unwrap_or(0.0);

    let mut errors = ValidationErrorBuilder::new();
    if name.is_empty() {
        errors.add("product_name", "product_name is required");
    }
    if image_url.is_empty() {
        errors.add("image", "image is required");
    }
    match request.price {
        Some(price) => {
            errors.check("price", validation::validate_amount(price, "price"));
        }
        None => {
            errors.add("price", "price is required");
        }
    }
    errors.check("rating", validation::validate_amount(rating, "rating"));
    errors.finish()?;

    Ok(ProductFields {
        name,
        price: request.price.unwrap_or_default(),
        rating,
        image_url,
    })
}

fn parse_product_id(id: &str) -> Result<(), ApiError> {
    validation::validate_uuid(id, "product_id").map_err(|_| ApiError::bad_request("Invalid product ID"))
}

/// Parse an optional price bound; blank means unbounded.
fn parse_bound(raw: Option<&str>, param: &str) -> Result<Option<f64>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => match value.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(ApiError::bad_request(format!("Invalid {} value", param))),
        },
    }
}

/// POST /product
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    JsonBody(request): JsonBody<ProductRequest>,
) -> Result<(StatusCode, Json<CreateProductResponse>), ApiError> {
    if request.product_id.is_some() {
        return Err(ApiError::bad_request(
            "Cannot provide productID in the request body",
        ));
    }

    let fields = validate_product(request)?;

    if state.products.find_by_name(&fields.name).await?.is_some() {
        return Err(ApiError::conflict("Product already exists"));
    }

    let now = chrono::Utc::now().to_rfc3339();
    let product = Product {
        id: uuid::Uuid::new_v4().to_string(),
        name: fields.name,
        price: fields.price,
        rating: fields.rating,
        image_url: fields.image_url,
        created_at: now.clone(),
        updated_at: now,
    };

    match state.products.insert(&product).await {
        Ok(()) => {}
        Err(StoreError::Conflict) => return Err(ApiError::conflict("Product already exists")),
        Err(e) => return Err(e.into()),
    }

    tracing::info!(product_id = %product.id, created_by = %user.id, "Product created");
    Ok((
        StatusCode::CREATED,
        Json(CreateProductResponse {
            message: "Product created successfully".to_string(),
            id: product.id,
        }),
    ))
}

/// GET /product/:id
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    parse_product_id(&id)?;

    let product = state
        .products
        .find_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    Ok(Json(product))
}

/// PUT /product/:id
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<ProductRequest>,
) -> Result<Json<Value>, ApiError> {
    parse_product_id(&id)?;

    if request.product_id.as_deref().is_some_and(|body_id| body_id != id) {
        return Err(ApiError::bad_request("Cannot change productID"));
    }

    let fields = validate_product(request)?;

    let existing = state
        .products
        .find_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    let product = Product {
        name: fields.name,
        price: fields.price,
        rating: fields.rating,
        image_url: fields.image_url,
        updated_at: chrono::Utc::now().to_rfc3339(),
        ..existing
    };

    match state.products.update(&product).await {
        Ok(0) => return Err(ApiError::not_found("Product not found")),
        Ok(_) => {}
        Err(StoreError::Conflict) => return Err(ApiError::conflict("Product already exists")),
        Err(e) => return Err(e.into()),
    }

    tracing::info!(product_id = %id, updated_by = %user.id, "Product updated");
    Ok(Json(json!({ "message": "Product updated successfully" })))
}

/// DELETE /product/:id
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    parse_product_id(&id)?;

    if state.products.delete(&id).await? == 0 {
        return Err(ApiError::not_found("Product not found"));
    }

    tracing::info!(product_id = %id, deleted_by = %user.id, "Product deleted");
    Ok(Json(json!({ "message": "Product deleted successfully" })))
}

/// GET /product/price?minPrice=&maxPrice=
pub async fn products_by_price_range(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PriceRangeQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let min = parse_bound(query.min_price.as_deref(), "minPrice")?;
    let max = parse_bound(query.max_price.as_deref(), "maxPrice")?;

    match (min, max) {
        (None, None) => return Err(ApiError::bad_request("Invalid price range")),
        (Some(min), Some(max)) if min > max => {
            return Err(ApiError::bad_request("Invalid price range"))
        }
        _ => {}
    }

    let products = state.products.by_price_range(min, max).await?;
    if products.is_empty() {
        return Err(ApiError::not_found("No products found"));
    }

    Ok(Json(products))
}

/// GET /product/price/:price
pub async fn products_by_price(
    State(state): State<Arc<AppState>>,
    Path(price): Path<String>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let price = parse_bound(Some(&price), "price")?
        .ok_or_else(|| ApiError::bad_request("No price provided"))?;

    let products = state.products.by_price(price).await?;
    if products.is_empty() {
        return Err(ApiError::not_found("No products found"));
    }

    Ok(Json(products))
}

/// GET /product/keyword?keyword=
pub async fn products_by_keyword(
    State(state): State<Arc<AppState>>,
    Query(query): Query<KeywordQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let products = state.products.by_keyword(query.keyword.trim()).await?;
    Ok(Json(products))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, price: Option<f64>) -> ProductRequest {
        ProductRequest {
            product_id: None,
            product_name: name.to_string(),
            price,
            rating: Some(4.5),
            image: "https://img.example/p.png".to_string(),
        }
    }

    #[test]
    fn test_parse_bound() {
        assert_eq!(parse_bound(None, "minPrice").unwrap(), None);
        assert_eq!(parse_bound(Some(""), "minPrice").unwrap(), None);
        assert_eq!(parse_bound(Some("12.5"), "minPrice").unwrap(), Some(12.5));

        let err = parse_bound(Some("cheap"), "minPrice").unwrap_err();
        assert_eq!(err.message(), "Invalid minPrice value");
        assert!(parse_bound(Some("NaN"), "maxPrice").is_err());
    }

    #[test]
    fn test_validate_product() {
        let fields = validate_product(request(" Lamp ", Some(30.0))).unwrap();
        assert_eq!(fields.name, "Lamp");
        assert_eq!(fields.price, 30.0);

        assert!(validate_product(request("Lamp", None)).is_err());
        assert!(validate_product(request("Lamp", Some(-1.0))).is_err());
        assert!(validate_product(request("", Some(1.0))).is_err());
    }
}
