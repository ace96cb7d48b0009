use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{DeployError, DeployResult};
use crate::model::{
    AttributeValue, ChangeSetLog, ModelAttribute, ModelNode, ModelsMetaInfo, Path, PendingChange,
};

/// Result of walking a path in the models graph
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Walked<'a> {
    Node(&'a ModelNode),
    Attribute(&'a ModelAttribute),
}

/// In-memory models graph: nodes keyed by path, the detached attribute overlay and the change log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Models {
    #[serde(default)]
    nodes: BTreeMap<Path, ModelNode>,
    /// Attributes removed by changes that are not deployed yet, keyed by attribute path
    #[serde(default)]
    detached: BTreeMap<Path, ModelAttribute>,
    #[serde(default)]
    changes: ChangeSetLog,
    #[serde(default)]
    meta: ModelsMetaInfo,
}

impl Models {
    pub fn new(meta: ModelsMetaInfo) -> Self {
        Self {
            meta,
            ..Self::default()
        }
    }

    pub fn meta(&self) -> &ModelsMetaInfo {
        &self.meta
    }

    pub fn changes(&self) -> &ChangeSetLog {
        &self.changes
    }

    pub fn version(&self) -> i64 {
        self.changes.version()
    }

    /// Add an already persisted node, no change is recorded
    pub fn add_node(&mut self, node: ModelNode) {
        self.nodes.insert(node.path.clone(), node);
    }

    pub fn node(&self, path: &Path) -> Option<&ModelNode> {
        self.nodes.get(path)
    }

    pub fn node_mut(&mut self, path: &Path) -> Option<&mut ModelNode> {
        self.nodes.get_mut(path)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ModelNode> {
        self.nodes.values()
    }

    /// Node or attached attribute addressed by `path`. A map key segment resolves to the attribute
    pub fn walk(&self, path: &Path) -> Option<Walked<'_>> {
        match path.attribute_name() {
            Some(name) => self
                .nodes
                .get(&path.node_path())
                .and_then(|node| node.attribute(name))
                .map(Walked::Attribute),
            None => self.nodes.get(path).map(Walked::Node),
        }
    }

    pub fn detached_attribute(&self, path: &Path) -> Option<&ModelAttribute> {
        self.detached.get(&path.attribute_path())
    }

    /// Record an edit of the attribute slot at `path` and apply it to the graph.
    ///
    /// A `key` segment edits one entry of a label map. Setting a whole
    /// attribute to `None` detaches it.
    pub fn update(&mut self, path: &Path, new_value: Option<AttributeValue>) -> DeployResult<i64> {
        let name = path
            .attribute_name()
            .ok_or_else(|| DeployError::NotAnAttribute(path.clone()))?
            .to_string();
        let attribute_path = path.attribute_path();
        let node_path = path.node_path();
        let node = self
            .nodes
            .get_mut(&node_path)
            .ok_or_else(|| DeployError::NodeNotFound(node_path.clone()))?;

        let mut current = node.attribute_value(&name).cloned();
        let index = match path.map_key() {
            Some(key) => {
                // a plain value becomes a label map; record the conversion so the plain value gets removed
                let plain = current
                    .as_ref()
                    .filter(|v| v.as_labels().is_none() && !v.is_empty())
                    .cloned();
                if let Some(plain) = plain {
                    let empty = AttributeValue::Labels(Default::default());
                    node.set_attribute(&name, empty.clone());
                    self.changes.record(attribute_path.clone(), Some(plain), Some(empty));
                    current = None;
                }
                let old = current
                    .as_ref()
                    .and_then(|v| v.entry(key))
                    .map(AttributeValue::text);
                let text = new_value.as_ref().and_then(|v| v.as_str()).map(str::to_string);
                let updated = current
                    .unwrap_or_else(|| AttributeValue::Labels(Default::default()))
                    .with_entry(key, text);
                node.set_attribute(&name, updated);
                self.detached.remove(&attribute_path);
                self.changes.record(path.clone(), old, new_value)
            }
            None => {
                match &new_value {
                    Some(value) => {
                        node.set_attribute(&name, value.clone());
                        self.detached.remove(&attribute_path);
                    }
                    None => {
                        if let Some(mut attribute) = node.remove_attribute(&name) {
                            attribute.detached = true;
                            self.detached.insert(attribute_path, attribute);
                        }
                    }
                }
                self.changes.record(path.clone(), current, new_value)
            }
        };
        Ok(index)
    }

    pub fn detach_attribute(&mut self, path: &Path) -> DeployResult<i64> {
        self.update(&path.attribute_path(), None)
    }

    /// Add a node that does not exist in the backing stores yet and record its creation
    pub fn create_node(&mut self, node: ModelNode) -> i64 {
        let path = node.path.clone();
        let kind = AttributeValue::text(node.kind.segment_name());
        self.nodes.insert(path.clone(), node);
        self.changes.record(path, None, Some(kind))
    }

    /// Mark the node as removed by a pending change and record the removal
    pub fn detach_node(&mut self, path: &Path) -> DeployResult<i64> {
        let node = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| DeployError::NodeNotFound(path.clone()))?;
        node.detached = true;
        let kind = AttributeValue::text(node.kind.segment_name());
        Ok(self.changes.record(path.clone(), Some(kind), None))
    }

    /// Set an attribute value without recording a change, re-attaching it if it was detached
    pub fn set_attribute_value(&mut self, path: &Path, value: AttributeValue) -> DeployResult<()> {
        let name = path
            .attribute_name()
            .ok_or_else(|| DeployError::NotAnAttribute(path.clone()))?
            .to_string();
        let node_path = path.node_path();
        let node = self
            .nodes
            .get_mut(&node_path)
            .ok_or_else(|| DeployError::NodeNotFound(node_path.clone()))?;
        node.set_attribute(&name, value);
        self.detached.remove(&path.attribute_path());
        Ok(())
    }

    /// Remove an attribute from the node and from the detached overlay without recording a change
    pub fn clear_attribute(&mut self, path: &Path) {
        let attribute_path = path.attribute_path();
        if let Some(name) = attribute_path.attribute_name() {
            if let Some(node) = self.nodes.get_mut(&attribute_path.node_path()) {
                node.remove_attribute(name);
            }
        }
        self.detached.remove(&attribute_path);
    }

    /// Forget a detached attribute once its removal is deployed; an attached value is left alone
    pub fn drop_detached(&mut self, path: &Path) {
        self.detached.remove(&path.attribute_path());
    }

    /// Remove a node whose removal is deployed, together with its detached attributes
    pub fn remove_detached_node(&mut self, path: &Path) -> bool {
        if !self.nodes.get(path).map(|n| n.detached).unwrap_or(false) {
            return false;
        }
        self.nodes.remove(path);
        self.detached.retain(|attribute_path, _| !attribute_path.starts_with(path));
        true
    }

    pub fn deployable_changes_for(&self, path: &Path, version: Option<i64>) -> Vec<PendingChange> {
        self.changes.deployable_for(path, version)
    }

    pub fn mark_deployed(&mut self, positions: &[usize]) -> BTreeSet<i64> {
        self.changes.mark_deployed(positions)
    }

    pub fn apply_deployed_indices(&mut self, indices: &BTreeSet<i64>) {
        self.changes.apply_deployed_indices(indices);
    }

    /// Top level node paths (definition, class, property) with pending changes, in path order
    pub fn paths_with_pending_changes(&self) -> BTreeSet<Path> {
        self.changes.pending_paths().map(Path::head).collect()
    }

    pub fn deployment_view(&self, version: Option<i64>) -> DeploymentModels<'_> {
        DeploymentModels {
            models: self,
            version,
        }
    }
}

/// Read-only view of the models graph pinned to an optional models version
#[derive(Debug, Clone, Copy)]
pub struct DeploymentModels<'a> {
    models: &'a Models,
    version: Option<i64>,
}

impl<'a> DeploymentModels<'a> {
    pub fn deployable_changes_for(&self, path: &Path) -> Vec<PendingChange> {
        self.models.deployable_changes_for(path, self.version)
    }

    pub fn walk(&self, path: &Path) -> Option<Walked<'a>> {
        self.models.walk(path)
    }

    pub fn node(&self, path: &Path) -> Option<&'a ModelNode> {
        self.models.node(path)
    }

    pub fn detached_attribute(&self, path: &Path) -> Option<&'a ModelAttribute> {
        self.models.detached_attribute(path)
    }

    pub fn meta(&self) -> &'a ModelsMetaInfo {
        self.models.meta()
    }

    pub fn version(&self) -> i64 {
        self.version.unwrap_or_else(|| self.models.version())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeKind;

    fn path(s: &str) -> Path {
        s.parse().unwrap()
    }

    fn models() -> Models {
        let mut models = Models::default();
        models.add_node(ModelNode::new(NodeKind::Definition, path("definition=D")));
        models.add_node(
            ModelNode::new(NodeKind::Field, path("definition=D/field=F"))
                .with_attribute("label", AttributeValue::labels([("en", "Old")])),
        );
        models
    }

    #[test]
    fn test_update_label_entry_records_entry_level_change() {
        let mut models = models();
        let index = models
            .update(&path("definition=D/field=F/attribute=label/key=en"), Some("New".into()))
            .unwrap();
        assert_eq!(index, 1);

        let change = &models.changes().entries()[0];
        assert_eq!(change.old_value, Some(AttributeValue::text("Old")));
        assert_eq!(change.new_value, Some(AttributeValue::text("New")));

        match models.walk(&path("definition=D/field=F/attribute=label")) {
            Some(Walked::Attribute(attribute)) => assert_eq!(attribute.value.entry("en"), Some("New")),
            other => panic!("unexpected walk result: {:?}", other),
        }
    }

    #[test]
    fn test_detached_attribute_moves_to_overlay() {
        let mut models = models();
        let label = path("definition=D/field=F/attribute=label");
        models.detach_attribute(&label).unwrap();

        assert!(models.walk(&label).is_none());
        let detached = models.detached_attribute(&label).unwrap();
        assert!(detached.detached);
        assert_eq!(detached.value.entry("en"), Some("Old"));

        models.set_attribute_value(&label, AttributeValue::labels([("en", "Back")])).unwrap();
        assert!(models.detached_attribute(&label).is_none());
    }

    #[test]
    fn test_update_requires_existing_node_and_attribute_path() {
        let mut models = models();
        assert!(matches!(
            models.update(&path("definition=D/field=missing/attribute=label"), None),
            Err(DeployError::NodeNotFound(_))
        ));
        assert!(matches!(
            models.update(&path("definition=D/field=F"), None),
            Err(DeployError::NotAnAttribute(_))
        ));
    }

    #[test]
    fn test_keyed_edit_of_plain_value_records_conversion() {
        let mut models = models();
        models
            .node_mut(&path("definition=D/field=F"))
            .unwrap()
            .set_attribute("title", AttributeValue::text("Case"));

        let index = models
            .update(&path("definition=D/field=F/attribute=title/key=en"), Some("Legal case".into()))
            .unwrap();
        assert_eq!(index, 2);

        let entries = models.changes().entries();
        assert_eq!(entries[0].path, path("definition=D/field=F/attribute=title"));
        assert_eq!(entries[0].old_value, Some(AttributeValue::text("Case")));
        assert_eq!(entries[0].new_value, Some(AttributeValue::Labels(Default::default())));
        assert_eq!(entries[1].old_value, None);

        let view = models.deployment_view(None);
        match view.walk(&path("definition=D/field=F/attribute=title")) {
            Some(Walked::Attribute(attribute)) => {
                assert_eq!(attribute.value, AttributeValue::labels([("en", "Legal case")]))
            }
            other => panic!("unexpected walk result: {:?}", other),
        }
    }

    #[test]
    fn test_detached_node_is_removed_once_deployed() {
        let mut models = models();
        let field = path("definition=D/field=F");
        assert!(!models.remove_detached_node(&field));

        models.detach_node(&field).unwrap();
        let change = &models.changes().entries()[0];
        assert_eq!(change.path, field);
        assert_eq!(change.new_value, None);

        assert!(models.remove_detached_node(&field));
        assert!(models.node(&field).is_none());
    }

    #[test]
    fn test_snapshot_round_trip_keeps_path_keys() {
        let mut models = models();
        models
            .update(&path("definition=D/field=F/attribute=tooltip"), Some(AttributeValue::labels([("en", "Tip")])))
            .unwrap();
        let json = serde_json::to_string(&models).unwrap();
        let restored: Models = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, models);
        assert_eq!(
            restored.paths_with_pending_changes().into_iter().collect::<Vec<_>>(),
            vec![path("definition=D")]
        );
    }
}
