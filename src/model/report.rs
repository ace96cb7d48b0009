use serde::{Deserialize, Serialize};

use crate::model::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational, never blocks deployment
    Warning,
    /// Blocks deployment of the affected group
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationMessage {
    pub severity: Severity,
    /// Id of the node or resource the message is about
    pub target: String,
    pub message: String,
}

impl ValidationMessage {
    pub fn error(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn warning(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Messages produced by validating one path, without side effects
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub messages: Vec<ValidationMessage>,
}

impl ValidationReport {
    pub fn valid() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        !self.messages.iter().any(ValidationMessage::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationMessage> {
        self.messages.iter().filter(|m| m.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationMessage> {
        self.messages.iter().filter(|m| !m.is_error())
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings().next().is_some()
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = ValidationMessage>) {
        self.messages.extend(messages);
    }
}

/// Validation outcome for one deployment candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReportEntry {
    pub id: String,
    pub path: Path,
    pub valid: bool,
    pub messages: Vec<ValidationMessage>,
}

/// Report over every node with pending changes, pinned to the models version it was built from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentValidationReport {
    pub version: i64,
    pub nodes: Vec<ValidationReportEntry>,
}

impl DeploymentValidationReport {
    pub fn is_valid(&self) -> bool {
        self.nodes.iter().all(|n| n.valid)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn entries_with_warnings(&self) -> Vec<&ValidationReportEntry> {
        self.nodes
            .iter()
            .filter(|n| n.messages.iter().any(|m| !m.is_error()))
            .collect()
    }

    /// Paths of the valid candidates, suitable for a deployment request
    pub fn deployable_paths(&self) -> Vec<Path> {
        self.nodes
            .iter()
            .filter(|n| n.valid)
            .map(|n| n.path.clone())
            .collect()
    }
}

/// Lifecycle of one deployment group within a deploy call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentState {
    /// Planned, nothing checked yet
    Pending,
    Validating,
    /// Validation errors stopped the group; terminal for this call
    Blocked,
    Deploying,
    Deployed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupOutcome {
    pub step: String,
    pub target: Path,
    pub state: DeploymentState,
    pub report: ValidationReport,
    /// Change log indices marked deployed by this group
    pub deployed_indices: Vec<i64>,
}

/// Result of one deploy call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentOutcome {
    pub deployment_id: String,
    pub version: i64,
    pub groups: Vec<GroupOutcome>,
    /// Pending paths no deployment step claims; they stay pending
    pub unhandled: Vec<Path>,
    /// True when the reload signal was fired
    pub reloaded: bool,
}

impl DeploymentOutcome {
    pub fn deployed(&self) -> impl Iterator<Item = &GroupOutcome> {
        self.groups
            .iter()
            .filter(|g| g.state == DeploymentState::Deployed)
    }

    pub fn blocked(&self) -> impl Iterator<Item = &GroupOutcome> {
        self.groups
            .iter()
            .filter(|g| g.state == DeploymentState::Blocked)
    }
}
