use itertools::Itertools;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::error::{DeployError, DeployResult};
use crate::logic::reload::{ModelsReload, ReloadNotifier};
use crate::logic::steps::{DeploymentStep, StepPayload, StepRegistry};
use crate::model::{
    DeploymentModels, DeploymentOutcome, DeploymentState, DeploymentValidationReport, GroupOutcome, Models,
    Path, ValidationMessage, ValidationReport, ValidationReportEntry,
};
use crate::store::traits::Store;

/// Paths to deploy, optionally pinned to the models version a candidate report was built at
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    pub paths: Vec<Path>,
}

impl DeploymentRequest {
    pub fn new(paths: Vec<Path>) -> Self {
        Self {
            version: None,
            paths,
        }
    }

    pub fn at_version(version: i64, paths: Vec<Path>) -> Self {
        Self {
            version: Some(version),
            paths,
        }
    }
}

/// Changes of one step for one target, restricted to the requested scope
#[derive(Debug, Clone, PartialEq)]
struct DeploymentGroup {
    step: DeploymentStep,
    target: Path,
    scope: Path,
}

#[derive(Debug, Default)]
struct DeploymentPlan {
    groups: Vec<DeploymentGroup>,
    /// Paths with pending changes that no step claims
    unhandled: Vec<Path>,
}

fn plan(registry: &StepRegistry, models: &DeploymentModels<'_>, scope: &Path) -> DeploymentPlan {
    let mut groups: BTreeMap<Path, DeploymentStep> = BTreeMap::new();
    let mut unhandled = Vec::new();

    for change in models.deployable_changes_for(scope) {
        match registry.find(&change.change.path) {
            Some(step) => {
                groups.entry(step.target(&change.change.path)).or_insert(step);
            }
            None => unhandled.push(change.change.path),
        }
    }

    DeploymentPlan {
        groups: groups
            .into_iter()
            .map(|(target, step)| DeploymentGroup {
                step,
                target,
                scope: scope.clone(),
            })
            .collect(),
        unhandled: unhandled.into_iter().unique().collect(),
    }
}

fn payload(registry: &StepRegistry, models: &DeploymentModels<'_>, group: &DeploymentGroup) -> StepPayload {
    let changes = models
        .deployable_changes_for(&group.scope)
        .into_iter()
        .filter(|c| {
            registry.find(&c.change.path) == Some(group.step) && group.step.target(&c.change.path) == group.target
        })
        .collect();
    StepPayload {
        target: group.target.clone(),
        changes,
    }
}

/// Validates and deploys pending model changes to the backing stores.
///
/// The models graph sits behind a read/write lock: validation only reads,
/// deployment holds the write lock for one group at a time.
pub struct ModelDeployer<S: Store> {
    models: Arc<RwLock<Models>>,
    store: Arc<S>,
    registry: StepRegistry,
    reload: ReloadNotifier,
}

impl<S: Store> ModelDeployer<S> {
    pub fn new(models: Models, store: Arc<S>) -> Self {
        Self {
            models: Arc::new(RwLock::new(models)),
            store,
            registry: StepRegistry::default(),
            reload: ReloadNotifier::default(),
        }
    }

    pub fn models(&self) -> Arc<RwLock<Models>> {
        self.models.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModelsReload> {
        self.reload.subscribe()
    }

    pub async fn version(&self) -> i64 {
        self.models.read().await.version()
    }

    /// Flag the changes the change log store already has as deployed, returning how many indices it knows
    pub async fn restore_deployed_state(&self) -> DeployResult<usize> {
        let indices = self.store.deployed_indices().await?;
        self.models.write().await.apply_deployed_indices(&indices);
        Ok(indices.len())
    }

    /// Validate the pending changes at or below `path` without touching any store
    pub async fn validate(&self, path: &Path) -> DeployResult<ValidationReport> {
        let models = self.models.read().await;
        self.validate_with(&models.deployment_view(None), path).await
    }

    async fn validate_with(&self, models: &DeploymentModels<'_>, path: &Path) -> DeployResult<ValidationReport> {
        let plan = plan(&self.registry, models, path);
        let mut report = ValidationReport::valid();
        for group in &plan.groups {
            let payload = payload(&self.registry, models, group);
            report.extend(group.step.validate(&payload, models, self.store.as_ref()).await?);
        }
        report.extend(plan.unhandled.iter().map(|p| {
            ValidationMessage::warning(
                p.value(),
                format!("No deployment step handles {}, it stays pending", p),
            )
        }));
        Ok(report)
    }

    /// Validate every top level node with pending changes
    pub async fn validate_candidates(&self) -> DeployResult<DeploymentValidationReport> {
        let models = self.models.read().await;
        let view = models.deployment_view(None);
        let mut nodes = Vec::new();

        for path in models.paths_with_pending_changes() {
            let messages = match self.validate_with(&view, &path).await {
                Ok(report) => report.messages,
                Err(DeployError::Persistence(e)) => return Err(DeployError::Persistence(e)),
                Err(e) => vec![ValidationMessage::error(path.value(), e.to_string())],
            };
            nodes.push(ValidationReportEntry {
                id: path.value().to_string(),
                valid: !messages.iter().any(ValidationMessage::is_error),
                messages,
                path,
            });
        }

        Ok(DeploymentValidationReport {
            version: view.version(),
            nodes,
        })
    }

    pub async fn deploy(&self, paths: &[Path]) -> DeployResult<DeploymentOutcome> {
        self.deploy_request(&DeploymentRequest::new(paths.to_vec())).await
    }

    /// Deploy every group under the requested paths.
    ///
    /// Groups commit independently. Groups with validation errors are
    /// reported as blocked and the call goes on; any other failure stops the
    /// call after the reload signal was fired for groups already committed.
    pub async fn deploy_request(&self, request: &DeploymentRequest) -> DeployResult<DeploymentOutcome> {
        // a pinned version must not be ahead of the graph
        let current = self.version().await;
        if let Some(requested) = request.version {
            if requested > current {
                return Err(DeployError::UnknownVersion { requested, current });
            }
        }

        let mut outcome = DeploymentOutcome {
            deployment_id: Uuid::new_v4().to_string(),
            version: request.version.unwrap_or(current),
            ..Default::default()
        };
        info!(
            "Deployment {} started for {} paths at version {}",
            outcome.deployment_id,
            request.paths.len(),
            outcome.version
        );

        let mut changed = false;
        for scope in request.paths.iter().unique() {
            // plan under the read lock, every group then takes the write lock on its own
            let plan = {
                let models = self.models.read().await;
                plan(&self.registry, &models.deployment_view(request.version), scope)
            };
            for path in &plan.unhandled {
                warn!("No deployment step handles {}, it stays pending", path);
            }
            outcome.unhandled.extend(plan.unhandled);

            for group in &plan.groups {
                match self.deploy_group(group, request.version, &mut changed).await {
                    Ok(Some(group_outcome)) => outcome.groups.push(group_outcome),
                    Ok(None) => {}
                    Err(e) => {
                        // stores written before the failure still need a reload
                        error!(
                            "Deployment {} failed at {} for {}: {}",
                            outcome.deployment_id, group.step, group.target, e
                        );
                        if changed {
                            self.reload.fire();
                        }
                        return Err(e);
                    }
                }
            }
        }

        outcome.unhandled = outcome.unhandled.into_iter().unique().collect();
        // one reload for the whole call
        if changed {
            self.reload.fire();
            outcome.reloaded = true;
        }
        info!(
            "Deployment {} finished: {} deployed, {} blocked",
            outcome.deployment_id,
            outcome.deployed().count(),
            outcome.blocked().count()
        );
        Ok(outcome)
    }

    /// Validate and commit one group under the graph write lock.
    ///
    /// `None` when nothing of the group is pending anymore. `changed` is set as
    /// soon as the step wrote to a store, even if marking the changes fails after.
    async fn deploy_group(
        &self,
        group: &DeploymentGroup,
        version: Option<i64>,
        changed: &mut bool,
    ) -> DeployResult<Option<GroupOutcome>> {
        debug!("{} for {} is {:?}", group.step, group.target, DeploymentState::Pending);
        let mut models = self.models.write().await;
        let payload = payload(&self.registry, &models.deployment_view(version), group);
        if payload.is_empty() {
            debug!("{} for {} has nothing pending", group.step, group.target);
            return Ok(None);
        }

        debug!("{} for {} is {:?}", group.step, group.target, DeploymentState::Validating);
        let messages = group
            .step
            .validate(&payload, &models.deployment_view(version), self.store.as_ref())
            .await?;
        let report = ValidationReport { messages };
        if !report.is_valid() {
            warn!(
                "{} for {} is blocked by {} validation errors",
                group.step,
                group.target,
                report.errors().count()
            );
            return Ok(Some(GroupOutcome {
                step: group.step.name(),
                target: group.target.clone(),
                state: DeploymentState::Blocked,
                report,
                deployed_indices: Vec::new(),
            }));
        }

        debug!("{} for {} is {:?}", group.step, group.target, DeploymentState::Deploying);
        let step_outcome = group
            .step
            .handle(&payload, &mut models, self.store.as_ref())
            .await?;
        *changed |= step_outcome.changed;

        // persistent log first, the in-memory flags follow
        let indices = payload.indices();
        if !indices.is_empty() {
            self.store.mark_as_deployed(&indices).await?;
        }
        models.mark_deployed(&payload.positions());
        info!(
            "{} for {} deployed {} changes",
            group.step,
            group.target,
            payload.changes.len()
        );

        Ok(Some(GroupOutcome {
            step: group.step.name(),
            target: group.target.clone(),
            state: DeploymentState::Deployed,
            report,
            deployed_indices: indices.into_iter().collect(),
        }))
    }
}
