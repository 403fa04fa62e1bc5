//! HTTP API server for the cafe ordering service.
//!
//! Provides REST endpoints for orders, payments and loyalty cards, with every
//! response wrapped in a `{success, data, message}` envelope, structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use datastore::{Datastore, DatastoreError, MemoryDatastore, PostgresDatastore};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Datastore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/orders/{id}/status",
            post(routes::orders::update_status::<S>),
        )
        .route("/orders/{id}/quote", get(routes::orders::quote::<S>))
        .route("/transactions", post(routes::transactions::create::<S>))
        .route("/loyalty", get(routes::loyalty::card::<S>))
        .route("/loyalty/enroll", post(routes::loyalty::enroll::<S>))
        .route("/loyalty/redeem", post(routes::loyalty::redeem::<S>))
        .route("/currencies", get(routes::currencies::list::<S>))
        .with_state(state)
        .merge(metrics_router)
        .fallback(routes::not_found)
        .method_not_allowed_fallback(routes::method_not_allowed)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state over the in-memory datastore seeded with the
/// demo catalog.
pub async fn create_memory_state(config: &Config) -> Arc<AppState<MemoryDatastore>> {
    let store = MemoryDatastore::new().with_lock_timeout(config.lock_timeout);
    store.seed_demo().await;
    Arc::new(AppState::new(store, config.transitions, config.pricing))
}

/// Connects to PostgreSQL, applies migrations and creates application state.
pub async fn create_postgres_state(
    config: &Config,
    database_url: &str,
) -> Result<Arc<AppState<PostgresDatastore>>, DatastoreError> {
    let store =
        PostgresDatastore::connect(database_url, config.max_connections, config.lock_timeout)
            .await?;
    store.run_migrations().await?;
    Ok(Arc::new(AppState::new(
        store,
        config.transitions,
        config.pricing,
    )))
}
