use anyhow::Result;
use std::collections::BTreeSet;

use crate::model::{CodeValueUpdate, LabelMap, Statement, ValidationMessage};
use crate::store::postgres::PostgresStore;
use crate::store::sparql::SparqlEndpointStore;
use crate::store::traits::{ChangeLogStore, CodeListStore, LabelStore, SemanticStore};

/// Production store: statements go to the SPARQL endpoint, everything else to PostgreSQL
#[derive(Debug, Clone)]
pub struct PlatformStore {
    relational: PostgresStore,
    semantic: SparqlEndpointStore,
}

impl PlatformStore {
    pub fn new(relational: PostgresStore, semantic: SparqlEndpointStore) -> Self {
        Self { relational, semantic }
    }
}

#[async_trait::async_trait]
impl SemanticStore for PlatformStore {
    async fn save_changes(&self, adds: &[Statement], removes: &[Statement]) -> Result<()> {
        self.semantic.save_changes(adds, removes).await
    }

    async fn validate_database_state(&self, removes: &[Statement]) -> Result<Vec<ValidationMessage>> {
        self.semantic.validate_database_state(removes).await
    }
}

#[async_trait::async_trait]
impl LabelStore for PlatformStore {
    async fn save_labels(&self, label_id: &str, definition_id: &str, labels: &LabelMap) -> Result<()> {
        self.relational.save_labels(label_id, definition_id, labels).await
    }

    async fn remove_labels(&self, label_id: &str) -> Result<bool> {
        self.relational.remove_labels(label_id).await
    }

    async fn defined_in(&self, label_id: &str) -> Result<BTreeSet<String>> {
        self.relational.defined_in(label_id).await
    }
}

#[async_trait::async_trait]
impl CodeListStore for PlatformStore {
    async fn validate_code_value(&self, update: &CodeValueUpdate) -> Result<Vec<String>> {
        self.relational.validate_code_value(update).await
    }

    async fn save_code_value(&self, update: &CodeValueUpdate) -> Result<()> {
        self.relational.save_code_value(update).await
    }
}

#[async_trait::async_trait]
impl ChangeLogStore for PlatformStore {
    async fn mark_as_deployed(&self, indices: &BTreeSet<i64>) -> Result<()> {
        self.relational.mark_as_deployed(indices).await
    }

    async fn deployed_indices(&self) -> Result<BTreeSet<i64>> {
        self.relational.deployed_indices().await
    }
}
