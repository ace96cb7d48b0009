use axum::{extract::State, http::StatusCode, Json};
use log::error;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::DeployError;
use crate::logic::{DeploymentRequest, ModelDeployer};
use crate::model::{DeploymentOutcome, DeploymentValidationReport, Path, ValidationReport};
use crate::store::traits::Store;

pub type DeployerState<S> = State<Arc<ModelDeployer<S>>>;
pub type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub path: Path,
}

/// Status code and body for an engine error
pub fn error_response(e: DeployError) -> ApiError {
    let status = match &e {
        DeployError::Configuration { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        DeployError::NodeNotFound(_) => StatusCode::NOT_FOUND,
        DeployError::NotAnAttribute(_) | DeployError::InvalidPath(_) => StatusCode::BAD_REQUEST,
        DeployError::UnknownVersion { .. } => StatusCode::CONFLICT,
        DeployError::Persistence(_) => {
            error!("Deployment request failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ErrorResponse::new(&e.to_string())))
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Every top level node with pending changes, validated
pub async fn get_candidates<S: Store + 'static>(
    State(deployer): DeployerState<S>,
) -> Result<Json<DeploymentValidationReport>, ApiError> {
    deployer
        .validate_candidates()
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn validate_path<S: Store + 'static>(
    State(deployer): DeployerState<S>,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<ValidationReport>, ApiError> {
    deployer
        .validate(&request.path)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn deploy<S: Store + 'static>(
    State(deployer): DeployerState<S>,
    Json(request): Json<DeploymentRequest>,
) -> Result<Json<DeploymentOutcome>, ApiError> {
    if request.paths.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("At least one path is required")),
        ));
    }
    deployer
        .deploy_request(&request)
        .await
        .map(Json)
        .map_err(error_response)
}
