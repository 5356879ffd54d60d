use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::auth::AuthUser;
use super::error::ApiError;
use super::extract::JsonBody;
use super::metrics;
use crate::db::{AddCartItemRequest, CartMerge, UpdateCartLineRequest};
use crate::AppState;

/// GET /user/cart
pub async fn get_cart(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>, ApiError> {
    let lines = state.cart.list(&user.id).await?;
    Ok(Json(json!({ "message": lines })))
}

/// POST /user/cart
pub async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    JsonBody(request): JsonBody<AddCartItemRequest>,
) -> Result<Json<Value>, ApiError> {
    let message = match state.cart.add_item(&user.id, request).await? {
        CartMerge::Merged(_) => {
            metrics::record_cart_mutation("merge");
            "Cart updated successfully".to_string()
        }
        CartMerge::Created(line) => {
            metrics::record_cart_mutation("create");
            format!("Cart with ID {} created successfully", line.id)
        }
    };

    Ok(Json(json!({ "message": message })))
}

/// PUT /user/cart/:cart_id
pub async fn update_cart_line(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(cart_id): Path<String>,
    JsonBody(request): JsonBody<UpdateCartLineRequest>,
) -> Result<Json<Value>, ApiError> {
    state.cart.update_line(&user.id, &cart_id, request).await?;
    metrics::record_cart_mutation("update");

    Ok(Json(json!({
        "message": format!("Cart with ID {} updated successfully", cart_id)
    })))
}

/// DELETE /user/cart/:cart_id
pub async fn delete_cart_line(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(cart_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.cart.remove_line(&user.id, &cart_id).await?;
    metrics::record_cart_mutation("remove");

    Ok(Json(json!({
        "message": format!("Cart with ID {} deleted successfully", cart_id)
    })))
}

/// DELETE /user/cart
pub async fn clear_cart(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>, ApiError> {
    state.cart.clear(&user.id).await?;
    metrics::record_cart_mutation("clear");

    Ok(Json(json!({ "message": "All carts are successfully deleted" })))
}
