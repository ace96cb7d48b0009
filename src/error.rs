use thiserror::Error;

use crate::model::{Path, PathError};

#[derive(Debug, Error)]
pub enum DeployError {
    /// Missing or blank data the deployment needs; a defect in the model, not a user error
    #[error("configuration error at {path}: {message}")]
    Configuration { path: Path, message: String },
    #[error("model node not found: {0}")]
    NodeNotFound(Path),
    #[error("path {0} does not address an attribute")]
    NotAnAttribute(Path),
    #[error(transparent)]
    InvalidPath(#[from] PathError),
    #[error("requested models version {requested} is newer than the current version {current}")]
    UnknownVersion { requested: i64, current: i64 },
    /// A sink failed while committing; nothing of the failed group was marked deployed
    #[error("persistence failure: {0:#}")]
    Persistence(#[from] anyhow::Error),
}

impl DeployError {
    pub fn configuration(path: &Path, message: impl Into<String>) -> Self {
        DeployError::Configuration {
            path: path.clone(),
            message: message.into(),
        }
    }
}

pub type DeployResult<T> = Result<T, DeployError>;
