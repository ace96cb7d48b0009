use log::{debug, info};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::error::{DeployError, DeployResult};
use crate::logic::aggregate::{aggregate, by_attribute, by_path};
use crate::logic::steps::{LabelCategory, StepOutcome, StepPayload};
use crate::model::path::{ATTRIBUTE, FIELD};
use crate::model::{
    AttributeValue, CodeValueUpdate, DeploymentModels, LabelMap, Models, Path, ValidationMessage, Walked,
};
use crate::store::traits::{CodeListStore, LabelStore};

/// Field of a definition describing its type
pub const TYPE_FIELD: &str = "type";
pub const CODE_LIST_ATTRIBUTE: &str = "codeList";
pub const VALUE_ATTRIBUTE: &str = "value";

/// Id of a label minted for a node that has none yet
pub fn generate_label_id(definition_id: &str, node_id: &str, category: LabelCategory) -> String {
    format!("{}.{}.{}", definition_id, node_id, category.attribute())
}

/// Everything the label step needs to know about the node owning a label attribute
#[derive(Debug, Clone)]
struct LabelTarget {
    definition_id: String,
    node_id: String,
    id_path: Path,
    /// Missing from the graph or removed by a pending change
    node_detached: bool,
    /// Current attached label value
    value: Option<AttributeValue>,
    attached_id: Option<String>,
    detached_id: Option<String>,
}

fn resolve_target(
    category: LabelCategory,
    target: &Path,
    models: &DeploymentModels<'_>,
) -> DeployResult<LabelTarget> {
    let node_path = target.node_path();
    let id_path = node_path.child(ATTRIBUTE, category.id_attribute())?;

    Ok(LabelTarget {
        definition_id: target.value().to_string(),
        node_id: node_path.last().value().to_string(),
        node_detached: models.node(&node_path).map(|n| n.detached).unwrap_or(true),
        value: match models.walk(target) {
            Some(Walked::Attribute(attribute)) => Some(attribute.value.clone()),
            _ => None,
        },
        attached_id: models
            .node(&node_path)
            .and_then(|n| n.attribute_value(category.id_attribute()))
            .and_then(AttributeValue::as_str)
            .map(str::to_string),
        detached_id: models
            .detached_attribute(&id_path)
            .and_then(|a| a.value.as_str())
            .map(str::to_string),
        id_path,
    })
}

/// Attached id first, then the detached one, keeping only ids defined in the current definition
async fn existing_label_id<S: LabelStore>(target: &LabelTarget, store: &S) -> DeployResult<Option<String>> {
    for candidate in [&target.attached_id, &target.detached_id].into_iter().flatten() {
        if store.defined_in(candidate).await?.contains(&target.definition_id) {
            return Ok(Some(candidate.clone()));
        }
        debug!(
            "Label {} is not defined in {}, it will not be reused",
            candidate, target.definition_id
        );
    }
    Ok(None)
}

pub fn validate_labels(
    category: LabelCategory,
    payload: &StepPayload,
    models: &DeploymentModels<'_>,
) -> Vec<ValidationMessage> {
    let node_path = payload.target.node_path();
    let node_id = node_path.last().value();
    let mut messages = Vec::new();

    if models.node(&node_path).is_none() && models.detached_attribute(&payload.target).is_none() {
        messages.push(ValidationMessage::warning(
            node_id,
            format!("No model node owns {}, nothing will be deployed", payload.target),
        ));
    }

    for change in aggregate(&payload.changes, by_attribute) {
        let Some(labels) = change.new_value.as_ref().and_then(AttributeValue::as_labels) else {
            continue;
        };
        for (language, text) in labels {
            if text.trim().is_empty() {
                messages.push(ValidationMessage::warning(
                    node_id,
                    format!(
                        "Blank {} translation for '{}' will be dropped",
                        category.attribute(),
                        language
                    ),
                ));
            }
        }
    }
    messages
}

/// Save or remove the label texts behind a label attribute and keep the node's id attribute in sync
pub async fn deploy_labels<S: LabelStore>(
    category: LabelCategory,
    payload: &StepPayload,
    models: &mut Models,
    store: &S,
) -> DeployResult<StepOutcome> {
    let target = resolve_target(category, &payload.target, &models.deployment_view(None))?;
    let value = if target.node_detached {
        None
    } else {
        value_at_payload(target.value.clone(), payload, models)
    };
    let labels: LabelMap = value
        .as_ref()
        .map(AttributeValue::normalized_labels)
        .unwrap_or_default();

    // no text left in any language, the persisted label goes away with its id
    if labels.is_empty() {
        let outcome = remove_labels(&target, models, store).await?;
        models.drop_detached(&payload.target);
        return Ok(outcome);
    }

    // reuse the id the definition already owns, otherwise mint one
    let label_id = match existing_label_id(&target, store).await? {
        Some(id) => id,
        None => generate_label_id(&target.definition_id, &target.node_id, category),
    };
    store
        .save_labels(&label_id, &target.definition_id, &labels)
        .await?;

    // the id is written back even when it did not change, re-attaching a detached one
    models.set_attribute_value(&target.id_path, AttributeValue::text(label_id.as_str()))?;

    info!(
        "Saved {} translations of {} for {}",
        labels.len(),
        label_id,
        payload.target
    );
    Ok(StepOutcome::changed())
}

/// The current value with pending edits that are not part of the payload undone, newest first
fn value_at_payload(
    current: Option<AttributeValue>,
    payload: &StepPayload,
    models: &Models,
) -> Option<AttributeValue> {
    let included: BTreeSet<usize> = payload.positions().into_iter().collect();
    models
        .deployable_changes_for(&payload.target, None)
        .into_iter()
        .rev()
        .filter(|pending| !included.contains(&pending.position))
        .fold(current, |value, pending| {
            let change = pending.change;
            match change.path.map_key() {
                Some(key) => {
                    let text = change
                        .old_value
                        .as_ref()
                        .and_then(AttributeValue::as_str)
                        .map(str::to_string);
                    Some(
                        value
                            .unwrap_or_else(|| AttributeValue::Labels(Default::default()))
                            .with_entry(key, text),
                    )
                }
                None => change.old_value,
            }
        })
}

pub fn validate_node_labels(payload: &StepPayload, models: &DeploymentModels<'_>) -> Vec<ValidationMessage> {
    match models.node(&payload.target) {
        Some(_) => Vec::new(),
        None => vec![ValidationMessage::warning(
            payload.target.last().value(),
            format!("No model node at {}, nothing will be deployed", payload.target),
        )],
    }
}

/// Remove the labels of every category owned by a removed field or region
pub async fn deploy_node_labels<S: LabelStore>(
    payload: &StepPayload,
    models: &mut Models,
    store: &S,
) -> DeployResult<StepOutcome> {
    let node_path = &payload.target;
    let removed = aggregate(&payload.changes, by_path)
        .iter()
        .any(|change| change.key == *node_path && change.new_value.is_none());
    if !removed {
        // created nodes get their labels through the label steps
        debug!("{} was created, no labels to remove", node_path);
        return Ok(StepOutcome::unchanged());
    }

    let mut outcome = StepOutcome::unchanged();
    for category in LabelCategory::ALL {
        let attribute = node_path.child(ATTRIBUTE, category.attribute())?;
        let target = resolve_target(category, &attribute, &models.deployment_view(None))?;
        outcome.changed |= remove_labels(&target, models, store).await?.changed;
    }
    models.remove_detached_node(node_path);

    info!("Removed {} with its labels", node_path);
    Ok(outcome)
}

async fn remove_labels<S: LabelStore>(
    target: &LabelTarget,
    models: &mut Models,
    store: &S,
) -> DeployResult<StepOutcome> {
    let mut outcome = StepOutcome::unchanged();
    if let Some(label_id) = existing_label_id(target, store).await? {
        outcome.changed = store.remove_labels(&label_id).await?;
        info!("Removed label {}", label_id);
    }
    models.clear_attribute(&target.id_path);
    Ok(outcome)
}

fn code_value_update(target: &Path, models: &DeploymentModels<'_>) -> DeployResult<CodeValueUpdate> {
    let definition_path = target.node_path();
    let type_path = definition_path.child(FIELD, TYPE_FIELD)?;
    let field = models
        .node(&type_path)
        .ok_or_else(|| DeployError::configuration(&type_path, "definition has no type field"))?;

    let code_list_id = match field.attribute_value(CODE_LIST_ATTRIBUTE) {
        Some(AttributeValue::Scalar(Value::String(id))) if !id.trim().is_empty() => id.trim().to_string(),
        Some(AttributeValue::Scalar(Value::Number(id))) => id.to_string(),
        _ => {
            return Err(DeployError::configuration(
                &type_path,
                "type field is not bound to a code list",
            ))
        }
    };
    let value = field
        .attribute_value(VALUE_ATTRIBUTE)
        .and_then(AttributeValue::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DeployError::configuration(&type_path, "type field has a blank value"))?
        .to_string();

    let descriptions = models
        .node(&definition_path)
        .filter(|n| !n.detached)
        .and_then(|n| n.attribute_value("label"))
        .map(AttributeValue::normalized_labels)
        .unwrap_or_default();

    Ok(CodeValueUpdate {
        code_list_id,
        value,
        descriptions,
    })
}

pub async fn validate_code_list<S: CodeListStore>(
    payload: &StepPayload,
    models: &DeploymentModels<'_>,
    store: &S,
) -> DeployResult<Vec<ValidationMessage>> {
    let update = code_value_update(&payload.target, models)?;
    let definition_id = payload.target.value();
    Ok(store
        .validate_code_value(&update)
        .await?
        .into_iter()
        .map(|error| ValidationMessage::error(definition_id, error))
        .collect())
}

/// Write the definition labels as descriptions of the code value its type field points at
pub async fn deploy_code_list<S: CodeListStore>(
    payload: &StepPayload,
    models: &mut Models,
    store: &S,
) -> DeployResult<StepOutcome> {
    let update = code_value_update(&payload.target, &models.deployment_view(None))?;
    let errors = store.validate_code_value(&update).await?;
    if !errors.is_empty() {
        return Err(DeployError::configuration(&payload.target, errors.join("; ")));
    }

    store.save_code_value(&update).await?;
    info!(
        "Saved code value {} of code list {} with {} descriptions",
        update.value,
        update.code_list_id,
        update.descriptions.len()
    );
    Ok(StepOutcome::changed())
}
