use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::JsonBody;
use crate::db::store::StoreError;
use crate::db::{ProfileResponse, ProfileUpdate, UpdateProfileRequest};
use crate::validation;
use crate::AppState;

/// GET /user/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let record = state
        .users
        .find_by_id(&user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let addresses = state.users.list_addresses(&user.id).await?;
    let orders = state.users.list_orders(&user.id).await?;

    Ok(Json(ProfileResponse::new(record, addresses, orders)))
}

/// POST /user/profile
///
/// Replaces names and email. When `address` is present the whole address book
/// is replaced with it.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    JsonBody(request): JsonBody<UpdateProfileRequest>,
) -> Result<Json<Value>, ApiError> {
    let first_name = request.first_name.trim().to_string();
    let email = request.email.trim().to_string();

    let mut errors = ValidationErrorBuilder::new();
    errors.check("first_name", validation::validate_first_name(&first_name));
    errors.check("email", validation::validate_email(&email));
    if let Some(addresses) = &request.address {
        for (i, address) in addresses.iter().enumerate() {
            let missing = address.missing_fields();
            if !missing.is_empty() {
                errors.add(
                    format!("address[{}]", i),
                    format!("{} required", missing.join(", ")),
                );
            }
        }
    }
    errors.finish()?;

    let update = ProfileUpdate {
        first_name,
        last_name: request.last_name.trim().to_string(),
        email,
        addresses: request.address.map(|addresses| {
            addresses
                .into_iter()
                .map(|a| a.into_address(&user.id))
                .collect()
        }),
        updated_at: chrono::Utc::now().to_rfc3339(),
    };

    let matched = match state.users.update_profile(&user.id, &update).await {
        Ok(matched) => matched,
        Err(StoreError::Conflict) => {
            return Err(ApiError::conflict("user with that email already exists"))
        }
        Err(e) => return Err(e.into()),
    };

    if matched == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!(user_id = %user.id, "Profile updated");
    Ok(Json(json!({ "message": "User updated successfully" })))
}
