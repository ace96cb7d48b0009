use anyhow::Result;
use std::collections::BTreeSet;

use crate::model::{CodeValueUpdate, LabelMap, Statement, ValidationMessage};

/// Semantic (triple) store used as the sink for class and property deployment
#[async_trait::async_trait]
pub trait SemanticStore: Send + Sync {
    /// Remove then add the given statements as one atomic write
    async fn save_changes(&self, adds: &[Statement], removes: &[Statement]) -> Result<()>;
    /// Read-only check that every expected statement is still present; one error per missing statement
    async fn validate_database_state(&self, removes: &[Statement]) -> Result<Vec<ValidationMessage>>;
}

/// Relational label store holding label texts keyed by label id
#[async_trait::async_trait]
pub trait LabelStore: Send + Sync {
    /// Replace the texts of a label and record the definition that defines it
    async fn save_labels(&self, label_id: &str, definition_id: &str, labels: &LabelMap) -> Result<()>;
    /// Remove a label with all its texts; false if it did not exist
    async fn remove_labels(&self, label_id: &str) -> Result<bool>;
    /// Ids of the definitions a label is defined in
    async fn defined_in(&self, label_id: &str) -> Result<BTreeSet<String>>;
}

/// Code list service consumed for labels of code-list governed definition types
#[async_trait::async_trait]
pub trait CodeListStore: Send + Sync {
    /// Validation errors for the update, empty if it can be saved
    async fn validate_code_value(&self, update: &CodeValueUpdate) -> Result<Vec<String>>;
    async fn save_code_value(&self, update: &CodeValueUpdate) -> Result<()>;
}

/// Store independent checks of a code value update
pub fn code_value_problems(update: &CodeValueUpdate) -> Vec<String> {
    let mut errors = Vec::new();
    if update.value.trim().is_empty() {
        errors.push("Code value must not be blank".to_string());
    }
    if update.descriptions.is_empty() {
        errors.push(format!(
            "Code value {} must have at least one description",
            update.value
        ));
    }
    for (language, text) in &update.descriptions {
        if text.trim().is_empty() {
            errors.push(format!("Description in '{}' must not be blank", language));
        }
    }
    errors
}

/// Persistent side of the change set log
#[async_trait::async_trait]
pub trait ChangeLogStore: Send + Sync {
    async fn mark_as_deployed(&self, indices: &BTreeSet<i64>) -> Result<()>;
    async fn deployed_indices(&self) -> Result<BTreeSet<i64>>;
}

pub trait Store: SemanticStore + LabelStore + CodeListStore + ChangeLogStore + Send + Sync {}
impl<T: SemanticStore + LabelStore + CodeListStore + ChangeLogStore + Send + Sync> Store for T {}
