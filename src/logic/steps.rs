use std::collections::BTreeSet;
use std::fmt;

use crate::error::DeployResult;
use crate::logic::{labels, semantic};
use crate::model::path::{ATTRIBUTE, CLASS, DEFINITION, KEY, PROPERTY};
use crate::model::{DeploymentModels, Models, Path, PendingChange, ValidationMessage};
use crate::store::traits::Store;

/// Kind of label attribute handled by the generic label step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LabelCategory {
    Label,
    Tooltip,
    Confirmation,
}

impl LabelCategory {
    pub const ALL: [LabelCategory; 3] = [
        LabelCategory::Label,
        LabelCategory::Tooltip,
        LabelCategory::Confirmation,
    ];

    /// Attribute holding the label texts
    pub fn attribute(&self) -> &'static str {
        match self {
            LabelCategory::Label => "label",
            LabelCategory::Tooltip => "tooltip",
            LabelCategory::Confirmation => "confirmation",
        }
    }

    /// Attribute holding the id of the persisted label
    pub fn id_attribute(&self) -> &'static str {
        match self {
            LabelCategory::Label => "labelId",
            LabelCategory::Tooltip => "tooltipId",
            LabelCategory::Confirmation => "confirmationId",
        }
    }
}

/// Unit of deployment logic claiming a family of paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeploymentStep {
    /// Labels of a definition whose type is governed by a code list
    CodeListLabel,
    Label(LabelCategory),
    /// Creation or removal of a field or region, which owns labels of every category
    NodeLabels,
    SemanticClass,
    SemanticProperty,
}

/// Change set entries of one deployment group
#[derive(Debug, Clone, PartialEq)]
pub struct StepPayload {
    /// Node path for semantic steps, attribute path for label steps
    pub target: Path,
    pub changes: Vec<PendingChange>,
}

impl StepPayload {
    pub fn positions(&self) -> Vec<usize> {
        self.changes.iter().map(|c| c.position).collect()
    }

    pub fn indices(&self) -> BTreeSet<i64> {
        self.changes.iter().filter_map(|c| c.change.index).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// Something was written to a sink
    pub changed: bool,
}

impl StepOutcome {
    pub fn changed() -> Self {
        Self { changed: true }
    }

    pub fn unchanged() -> Self {
        Self { changed: false }
    }
}

/// Exactly `definition=D/attribute=label`
pub fn is_code_list_labels_path(path: &Path) -> bool {
    path.len() == 2
        && path.head().name() == DEFINITION
        && path
            .next()
            .map_or(false, |next| next.name() == ATTRIBUTE && next.value() == "label")
}

/// A node below a definition, e.g. `definition=D/field=F`
pub fn is_definition_child_path(path: &Path) -> bool {
    path.len() > 1 && path.first().is(DEFINITION) && !path.last().is(ATTRIBUTE) && !path.last().is(KEY)
}

impl DeploymentStep {
    pub fn name(&self) -> String {
        match self {
            DeploymentStep::CodeListLabel => "code-list-label".to_string(),
            DeploymentStep::Label(category) => format!("{}-label", category.attribute()),
            DeploymentStep::NodeLabels => "node-labels".to_string(),
            DeploymentStep::SemanticClass => "semantic-class".to_string(),
            DeploymentStep::SemanticProperty => "semantic-property".to_string(),
        }
    }

    /// Whether this step owns the change at `path`; map keys are ignored
    pub fn check_path(&self, path: &Path) -> bool {
        let path = path.attribute_path();
        match self {
            DeploymentStep::CodeListLabel => is_code_list_labels_path(&path),
            DeploymentStep::Label(category) => {
                let tail = path.tail();
                path.len() > 1
                    && path.head().name() == DEFINITION
                    && tail.name() == ATTRIBUTE
                    && tail.value() == category.attribute()
                    && !is_code_list_labels_path(&path)
            }
            DeploymentStep::NodeLabels => is_definition_child_path(&path),
            DeploymentStep::SemanticClass => path.first().is(CLASS),
            DeploymentStep::SemanticProperty => path.first().is(PROPERTY),
        }
    }

    /// Key of the group a claimed change belongs to
    pub fn target(&self, path: &Path) -> Path {
        match self {
            DeploymentStep::CodeListLabel | DeploymentStep::Label(_) => path.attribute_path(),
            DeploymentStep::NodeLabels => path.node_path(),
            DeploymentStep::SemanticClass | DeploymentStep::SemanticProperty => path.head(),
        }
    }

    /// Read-only validation of one group
    pub async fn validate<S: Store>(
        &self,
        payload: &StepPayload,
        models: &DeploymentModels<'_>,
        store: &S,
    ) -> DeployResult<Vec<ValidationMessage>> {
        match self {
            DeploymentStep::CodeListLabel => labels::validate_code_list(payload, models, store).await,
            DeploymentStep::Label(category) => Ok(labels::validate_labels(*category, payload, models)),
            DeploymentStep::NodeLabels => Ok(labels::validate_node_labels(payload, models)),
            DeploymentStep::SemanticClass | DeploymentStep::SemanticProperty => {
                semantic::validate(payload, models, store).await
            }
        }
    }

    /// Commit one group to its sink and apply the resulting graph mutations
    pub async fn handle<S: Store>(
        &self,
        payload: &StepPayload,
        models: &mut Models,
        store: &S,
    ) -> DeployResult<StepOutcome> {
        match self {
            DeploymentStep::CodeListLabel => labels::deploy_code_list(payload, models, store).await,
            DeploymentStep::Label(category) => labels::deploy_labels(*category, payload, models, store).await,
            DeploymentStep::NodeLabels => labels::deploy_node_labels(payload, models, store).await,
            DeploymentStep::SemanticClass | DeploymentStep::SemanticProperty => {
                semantic::deploy(payload, models, store).await
            }
        }
    }
}

impl fmt::Display for DeploymentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Steps in priority order, first match wins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRegistry {
    steps: Vec<DeploymentStep>,
}

impl Default for StepRegistry {
    fn default() -> Self {
        let mut steps = vec![DeploymentStep::CodeListLabel];
        steps.extend(LabelCategory::ALL.into_iter().map(DeploymentStep::Label));
        steps.push(DeploymentStep::NodeLabels);
        steps.push(DeploymentStep::SemanticClass);
        steps.push(DeploymentStep::SemanticProperty);
        Self { steps }
    }
}

impl StepRegistry {
    pub fn find(&self, path: &Path) -> Option<DeploymentStep> {
        self.steps.iter().copied().find(|step| step.check_path(path))
    }

    /// Every step claiming `path`; more than one means the predicates overlap
    pub fn claimants(&self, path: &Path) -> Vec<DeploymentStep> {
        self.steps
            .iter()
            .copied()
            .filter(|step| step.check_path(path))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> Path {
        s.parse().unwrap()
    }

    #[test]
    fn test_step_predicates_are_mutually_exclusive() {
        let registry = StepRegistry::default();
        let samples = [
            "definition=D/attribute=label",
            "definition=D/attribute=label/key=en",
            "definition=D/attribute=tooltip",
            "definition=D/field=F/attribute=label",
            "definition=D/field=F/attribute=label/key=bg",
            "definition=D/region=R/attribute=tooltip/key=en",
            "definition=D/field=F/attribute=confirmation",
            "definition=D/field=F/attribute=labelId",
            "definition=D/field=F",
            "definition=D/region=R/field=F",
            "definition=D",
            "class=http://example.com/Case",
            "class=emf:Case/attribute=title/key=en",
            "property=emf:status/attribute=searchable",
            "property=emf:status",
        ];
        for sample in samples {
            let claimants = registry.claimants(&path(sample));
            assert!(claimants.len() <= 1, "{} is claimed by {:?}", sample, claimants);
        }
    }

    #[test]
    fn test_routing() {
        let registry = StepRegistry::default();
        assert_eq!(
            registry.find(&path("definition=D/attribute=label/key=en")),
            Some(DeploymentStep::CodeListLabel)
        );
        assert_eq!(
            registry.find(&path("definition=D/field=F/attribute=label/key=en")),
            Some(DeploymentStep::Label(LabelCategory::Label))
        );
        assert_eq!(
            registry.find(&path("definition=D/attribute=tooltip")),
            Some(DeploymentStep::Label(LabelCategory::Tooltip))
        );
        assert_eq!(
            registry.find(&path("class=emf:Case/attribute=title")),
            Some(DeploymentStep::SemanticClass)
        );
        assert_eq!(registry.find(&path("property=emf:status")), Some(DeploymentStep::SemanticProperty));
        assert_eq!(registry.find(&path("definition=D/field=F/attribute=labelId")), None);
        assert_eq!(registry.find(&path("definition=D")), None);
        assert_eq!(registry.find(&path("definition=D/field=F")), Some(DeploymentStep::NodeLabels));
    }

    #[test]
    fn test_group_targets() {
        let label = DeploymentStep::Label(LabelCategory::Label);
        assert_eq!(
            label.target(&path("definition=D/field=F/attribute=label/key=en")),
            path("definition=D/field=F/attribute=label")
        );
        assert_eq!(
            DeploymentStep::SemanticClass.target(&path("class=emf:Case/attribute=title/key=en")),
            path("class=emf:Case")
        );
        assert_eq!(
            DeploymentStep::NodeLabels.target(&path("definition=D/region=R")),
            path("definition=D/region=R")
        );
    }
}
