use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::JsonBody;
use crate::db::AddressRequest;
use crate::AppState;

async fn ensure_user(state: &AppState, user_id: &str) -> Result<(), ApiError> {
    match state.users.find_by_id(user_id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::not_found("User not found")),
    }
}

/// GET /user/address
pub async fn list_addresses(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>, ApiError> {
    ensure_user(&state, &user.id).await?;
    let addresses = state.users.list_addresses(&user.id).await?;
    Ok(Json(json!({ "message": addresses })))
}

/// POST /user/address
pub async fn add_address(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    JsonBody(request): JsonBody<AddressRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    ensure_user(&state, &user.id).await?;

    let mut errors = ValidationErrorBuilder::new();
    for field in request.missing_fields() {
        errors.add(field, format!("{} is required", field));
    }
    errors.finish()?;

    let address = request.into_address(&user.id);
    state.users.add_address(&address).await?;

    tracing::info!(user_id = %user.id, address_id = %address.id, "Address added");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Address created successfully" })),
    ))
}

/// DELETE /user/address
pub async fn clear_addresses(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>, ApiError> {
    ensure_user(&state, &user.id).await?;
    let removed = state.users.clear_addresses(&user.id).await?;

    tracing::info!(user_id = %user.id, removed, "Address book cleared");
    Ok(Json(json!({ "message": "All Addresses successfully deleted" })))
}

/// DELETE /user/address/:address_id
pub async fn delete_address(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(address_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if uuid::Uuid::parse_str(&address_id).is_err() {
        return Err(ApiError::bad_request("Invalid address ID"));
    }

    ensure_user(&state, &user.id).await?;

    if state.users.remove_address(&user.id, &address_id).await? == 0 {
        return Err(ApiError::not_found("Address not found"));
    }

    Ok(Json(json!({
        "message": format!("Address with ID {} deleted successfully", address_id)
    })))
}
