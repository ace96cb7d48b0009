use anyhow::{anyhow, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{CodeValueUpdate, LabelMap, Statement, ValidationMessage};
use crate::store::traits::{code_value_problems, ChangeLogStore, CodeListStore, LabelStore, SemanticStore};

/// A write that reached one of the in-memory sinks
#[derive(Debug, Clone, PartialEq)]
pub enum SinkWrite {
    SaveChanges {
        adds: Vec<Statement>,
        removes: Vec<Statement>,
    },
    SaveLabels {
        label_id: String,
        definition_id: String,
        labels: LabelMap,
    },
    RemoveLabels {
        label_id: String,
    },
    SaveCodeValue(CodeValueUpdate),
    MarkDeployed(BTreeSet<i64>),
}

#[derive(Debug, Clone, Default)]
struct StoredLabel {
    defined_in: BTreeSet<String>,
    texts: LabelMap,
}

/// Store keeping every sink in process memory.
///
/// Used for tests and local runs. Every write is journaled so callers can
/// assert on exactly what reached the sinks, and statement saves can be made
/// to fail for chosen subjects.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    statements: RwLock<BTreeSet<Statement>>,
    labels: RwLock<BTreeMap<String, StoredLabel>>,
    /// code list id -> code value -> descriptions
    code_lists: RwLock<BTreeMap<String, BTreeMap<String, LabelMap>>>,
    deployed: RwLock<BTreeSet<i64>>,
    failing_subjects: RwLock<BTreeSet<String>>,
    fail_deployed_marks: RwLock<bool>,
    journal: Mutex<Vec<SinkWrite>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statement(self, statement: Statement) -> Self {
        self.statements.write().insert(statement);
        self
    }

    pub fn with_label(self, label_id: &str, definition_id: &str, labels: LabelMap) -> Self {
        self.labels.write().insert(
            label_id.to_string(),
            StoredLabel {
                defined_in: BTreeSet::from([definition_id.to_string()]),
                texts: labels,
            },
        );
        self
    }

    pub fn with_code_list(self, code_list_id: &str) -> Self {
        self.code_lists
            .write()
            .entry(code_list_id.to_string())
            .or_default();
        self
    }

    /// Make every statement save touching `subject` fail without writing anything
    pub fn fail_saves_for(&self, subject: &str) {
        self.failing_subjects.write().insert(subject.to_string());
    }

    /// Make marking changes as deployed fail until switched off again
    pub fn fail_deployed_marks(&self, fail: bool) {
        *self.fail_deployed_marks.write() = fail;
    }

    pub fn contains(&self, statement: &Statement) -> bool {
        self.statements.read().contains(statement)
    }

    pub fn statements_about(&self, subject: &str) -> Vec<Statement> {
        self.statements
            .read()
            .iter()
            .filter(|s| s.subject == subject)
            .cloned()
            .collect()
    }

    pub fn label(&self, label_id: &str) -> Option<LabelMap> {
        self.labels.read().get(label_id).map(|l| l.texts.clone())
    }

    pub fn code_value(&self, code_list_id: &str, value: &str) -> Option<LabelMap> {
        self.code_lists
            .read()
            .get(code_list_id)
            .and_then(|values| values.get(value))
            .cloned()
    }

    pub fn journal(&self) -> Vec<SinkWrite> {
        self.journal.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.journal.lock().len()
    }

    fn record(&self, write: SinkWrite) {
        self.journal.lock().push(write);
    }
}

#[async_trait::async_trait]
impl SemanticStore for InMemoryStore {
    async fn save_changes(&self, adds: &[Statement], removes: &[Statement]) -> Result<()> {
        {
            let failing = self.failing_subjects.read();
            if let Some(statement) = adds
                .iter()
                .chain(removes)
                .find(|s| failing.contains(&s.subject))
            {
                return Err(anyhow!(
                    "semantic store rejected the write for {}",
                    statement.subject
                ));
            }
        }

        let mut statements = self.statements.write();
        for statement in removes {
            statements.remove(statement);
        }
        statements.extend(adds.iter().cloned());
        drop(statements);

        self.record(SinkWrite::SaveChanges {
            adds: adds.to_vec(),
            removes: removes.to_vec(),
        });
        Ok(())
    }

    async fn validate_database_state(&self, removes: &[Statement]) -> Result<Vec<ValidationMessage>> {
        let statements = self.statements.read();
        Ok(removes
            .iter()
            .filter(|s| !statements.contains(*s))
            .map(|s| {
                ValidationMessage::error(
                    s.subject.clone(),
                    format!("Expected statement is missing from the database: {}", s),
                )
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl LabelStore for InMemoryStore {
    async fn save_labels(&self, label_id: &str, definition_id: &str, labels: &LabelMap) -> Result<()> {
        {
            let mut stored = self.labels.write();
            let label = stored.entry(label_id.to_string()).or_default();
            label.defined_in.insert(definition_id.to_string());
            label.texts = labels.clone();
        }
        self.record(SinkWrite::SaveLabels {
            label_id: label_id.to_string(),
            definition_id: definition_id.to_string(),
            labels: labels.clone(),
        });
        Ok(())
    }

    async fn remove_labels(&self, label_id: &str) -> Result<bool> {
        let removed = self.labels.write().remove(label_id).is_some();
        if removed {
            self.record(SinkWrite::RemoveLabels {
                label_id: label_id.to_string(),
            });
        }
        Ok(removed)
    }

    async fn defined_in(&self, label_id: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .labels
            .read()
            .get(label_id)
            .map(|l| l.defined_in.clone())
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl CodeListStore for InMemoryStore {
    async fn validate_code_value(&self, update: &CodeValueUpdate) -> Result<Vec<String>> {
        let mut errors = Vec::new();
        if !self.code_lists.read().contains_key(&update.code_list_id) {
            errors.push(format!("Code list {} does not exist", update.code_list_id));
        }
        errors.extend(code_value_problems(update));
        Ok(errors)
    }

    async fn save_code_value(&self, update: &CodeValueUpdate) -> Result<()> {
        self.code_lists
            .write()
            .entry(update.code_list_id.clone())
            .or_default()
            .insert(update.value.clone(), update.descriptions.clone());
        self.record(SinkWrite::SaveCodeValue(update.clone()));
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChangeLogStore for InMemoryStore {
    async fn mark_as_deployed(&self, indices: &BTreeSet<i64>) -> Result<()> {
        if *self.fail_deployed_marks.read() {
            return Err(anyhow!("change log store is unavailable"));
        }
        self.deployed.write().extend(indices.iter().copied());
        self.record(SinkWrite::MarkDeployed(indices.clone()));
        Ok(())
    }

    async fn deployed_indices(&self) -> Result<BTreeSet<i64>> {
        Ok(self.deployed.read().clone())
    }
}
