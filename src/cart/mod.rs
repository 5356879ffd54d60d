//! Cart mutations.
//!
//! A user's cart holds at most one line per product. Adding a product that is
//! already present increments that line instead of creating a second one; the
//! store performs the check and the write as a single upsert so concurrent adds
//! for the same product cannot both insert.

use std::sync::Arc;
use thiserror::Error;

use crate::db::store::{CartStore, ProductStore, StoreError, UserStore};
use crate::db::{AddCartItemRequest, CartLine, CartMerge, UpdateCartLineRequest};
use crate::validation;

#[derive(Debug, Error)]
pub enum CartError {
    #[error("user not found")]
    UserNotFound,
    #[error("{message}")]
    InvalidInput {
        field: &'static str,
        message: String,
    },
    #[error("Invalid cart ID")]
    InvalidId,
    #[error("Product not found")]
    ProductNotFound,
    #[error("This cart is not found")]
    LineNotFound,
    #[error("Failed to update cart")]
    UpdateFailed,
    #[error("Failed to create cart")]
    CreateFailed,
    #[error("This product already has a line in the cart")]
    Conflict,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CartError {
    fn invalid(field: &'static str, message: String) -> Self {
        CartError::InvalidInput { field, message }
    }
}

#[derive(Clone)]
pub struct CartService {
    users: Arc<dyn UserStore>,
    carts: Arc<dyn CartStore>,
    products: Arc<dyn ProductStore>,
}

impl CartService {
    pub fn new(
        users: Arc<dyn UserStore>,
        carts: Arc<dyn CartStore>,
        products: Arc<dyn ProductStore>,
    ) -> Self {
        Self {
            users,
            carts,
            products,
        }
    }

    async fn ensure_user(&self, user_id: &str) -> Result<(), CartError> {
        match self.users.find_by_id(user_id).await? {
            Some(_) => Ok(()),
            None => Err(CartError::UserNotFound),
        }
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<CartLine>, CartError> {
        self.ensure_user(user_id).await?;
        Ok(self.carts.list_cart(user_id).await?)
    }

    /// Add `quantity` of a product, merging into an existing line for the same product.
    pub async fn add_item(
        &self,
        user_id: &str,
        request: AddCartItemRequest,
    ) -> Result<CartMerge, CartError> {
        self.ensure_user(user_id).await?;

        let product_id = request.product_id.unwrap_or_default();
        validation::validate_uuid(&product_id, "product_id")
            .map_err(|m| CartError::invalid("product_id", m))?;
        let quantity = validation::validate_quantity(request.quantity)
            .map_err(|m| CartError::invalid("quantity", m))?;

        if !self.products.exists(&product_id).await? {
            return Err(CartError::ProductNotFound);
        }

        let line = CartLine::new(user_id, &product_id, quantity);
        let merge = match self.carts.upsert_cart_line(&line).await {
            Ok(Some(merge)) => merge,
            // The merge guard refused to overflow the stored quantity
            Ok(None) => return Err(CartError::UpdateFailed),
            Err(StoreError::Database(e)) => {
                tracing::error!(user_id = %user_id, product_id = %product_id, error = %e, "Cart upsert failed");
                return Err(CartError::CreateFailed);
            }
            Err(e) => return Err(e.into()),
        };

        match &merge {
            CartMerge::Created(line) => {
                tracing::debug!(user_id = %user_id, cart_id = %line.id, "Cart line created")
            }
            CartMerge::Merged(line) => tracing::debug!(
                user_id = %user_id,
                cart_id = %line.id,
                quantity = line.quantity,
                "Cart line merged"
            ),
        }

        Ok(merge)
    }

    /// Replace the product and quantity of an existing line. The line id never changes.
    pub async fn update_line(
        &self,
        user_id: &str,
        line_id: &str,
        request: UpdateCartLineRequest,
    ) -> Result<(), CartError> {
        if uuid::Uuid::parse_str(line_id).is_err() {
            return Err(CartError::InvalidId);
        }

        self.ensure_user(user_id).await?;

        if request.cart_id.is_some() {
            return Err(CartError::invalid(
                "cart_id",
                "Cannot provide cartID in the request body".to_string(),
            ));
        }

        let product_id = request.product_id.unwrap_or_default();
        validation::validate_uuid(&product_id, "product_id")
            .map_err(|m| CartError::invalid("product_id", m))?;
        let quantity = validation::validate_quantity(request.quantity)
            .map_err(|m| CartError::invalid("quantity", m))?;

        if !self.carts.cart_line_exists(user_id, line_id).await? {
            return Err(CartError::LineNotFound);
        }

        if !self.products.exists(&product_id).await? {
            return Err(CartError::ProductNotFound);
        }

        let now = chrono::Utc::now().to_rfc3339();
        match self
            .carts
            .replace_cart_line(user_id, line_id, &product_id, quantity, &now)
            .await
        {
            Ok(0) => Err(CartError::UpdateFailed),
            Ok(_) => Ok(()),
            Err(StoreError::Conflict) => Err(CartError::Conflict),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn remove_line(&self, user_id: &str, line_id: &str) -> Result<(), CartError> {
        if uuid::Uuid::parse_str(line_id).is_err() {
            return Err(CartError::InvalidId);
        }

        self.ensure_user(user_id).await?;

        match self.carts.remove_cart_line(user_id, line_id).await? {
            0 => Err(CartError::LineNotFound),
            _ => Ok(()),
        }
    }

    /// Empty the cart. Clearing an empty cart succeeds.
    pub async fn clear(&self, user_id: &str) -> Result<u64, CartError> {
        self.ensure_user(user_id).await?;
        Ok(self.carts.clear_cart(user_id).await?)
    }
}
