pub mod api;
pub mod auth;
pub mod cart;
pub mod config;
pub mod crypto;
pub mod db;
pub mod validation;

pub use db::DbPool;

use config::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;

use crate::api::rate_limit::RateLimiter;
use crate::auth::{AuthService, TokenService};
use crate::cart::CartService;
use crate::db::store::{ProductStore, SqliteStore, UserStore};

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub users: Arc<dyn UserStore>,
    pub products: Arc<dyn ProductStore>,
    pub auth: AuthService,
    pub cart: CartService,
    pub rate_limiter: Arc<RateLimiter>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let store = Arc::new(SqliteStore::new(
            db.clone(),
            Duration::from_secs(config.database.timeout_secs.max(1)),
        ));
        let tokens = TokenService::from_config(&config.auth);
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));

        Self {
            auth: AuthService::new(store.clone(), tokens),
            cart: CartService::new(store.clone(), store.clone(), store.clone()),
            users: store.clone(),
            products: store,
            config,
            db,
            rate_limiter,
            metrics_handle: None,
        }
    }

    /// Set the Prometheus metrics handle
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}
