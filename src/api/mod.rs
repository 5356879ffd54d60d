mod addresses;
pub mod auth;
mod cart;
pub mod error;
mod extract;
pub mod metrics;
mod products;
mod profile;
pub mod rate_limit;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use self::error::ApiError;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Credential endpoints (public, tighter rate limit)
    let auth_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/signin", post(auth::signin))
        .route("/tokenrefresh", post(auth::token_refresh))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_auth,
        ));

    // Per-user resources, protected by the access token
    let user_routes = Router::new()
        .route("/profile", get(profile::get_profile).post(profile::update_profile))
        .route(
            "/address",
            get(addresses::list_addresses)
                .post(addresses::add_address)
                .delete(addresses::clear_addresses),
        )
        .route("/address/:address_id", delete(addresses::delete_address))
        .route(
            "/cart",
            get(cart::get_cart)
                .post(cart::add_to_cart)
                .delete(cart::clear_cart),
        )
        .route(
            "/cart/:cart_id",
            put(cart::update_cart_line).delete(cart::delete_cart_line),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    // Catalog: reads are public, writes authenticate through the AuthUser extractor
    let product_routes = Router::new()
        .route("/product", post(products::create_product))
        .route("/product/price", get(products::products_by_price_range))
        .route("/product/price/:price", get(products::products_by_price))
        .route("/product/keyword", get(products::products_by_keyword))
        .route(
            "/product/:id",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        );

    let api_routes = Router::new()
        .nest("/user", user_routes)
        .merge(product_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_api,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_endpoint))
        .nest("/auth", auth_routes)
        .merge(api_routes)
        .fallback(route_not_found)
        .layer(middleware::from_fn(metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not defined")
}
