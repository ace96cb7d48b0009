use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers;
use crate::logic::ModelDeployer;
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<Arc<ModelDeployer<S>>> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/deployment/candidates", get(handlers::get_candidates::<S>))
        .route("/deployment/validate", post(handlers::validate_path::<S>))
        .route("/deployment/deploy", post(handlers::deploy::<S>))
}
