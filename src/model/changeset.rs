use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::{AttributeValue, Path};

/// One pending edit of a model attribute or node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelChangeSetInfo {
    /// Position in the persisted change log. Edits synthesized in memory have none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    pub path: Path,
    pub old_value: Option<AttributeValue>,
    pub new_value: Option<AttributeValue>,
    #[serde(default)]
    pub deployed: bool,
}

/// A change set entry together with its position in the log
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChange {
    pub position: usize,
    pub change: ModelChangeSetInfo,
}

/// Ordered log of model edits, the single source of truth for what is deployed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSetLog {
    entries: Vec<ModelChangeSetInfo>,
    #[serde(default)]
    last_index: i64,
}

impl ChangeSetLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an edit under the next index and return that index
    pub fn record(
        &mut self,
        path: Path,
        old_value: Option<AttributeValue>,
        new_value: Option<AttributeValue>,
    ) -> i64 {
        self.last_index += 1;
        self.entries.push(ModelChangeSetInfo {
            index: Some(self.last_index),
            path,
            old_value,
            new_value,
            deployed: false,
        });
        self.last_index
    }

    /// Append an entry as is, e.g. one restored from storage or synthesized in memory
    pub fn push(&mut self, change: ModelChangeSetInfo) {
        if let Some(index) = change.index {
            self.last_index = self.last_index.max(index);
        }
        self.entries.push(change);
    }

    /// Highest index ever recorded, used as the models version
    pub fn version(&self) -> i64 {
        self.last_index
    }

    pub fn entries(&self) -> &[ModelChangeSetInfo] {
        &self.entries
    }

    /// Not deployed entries at or below `path`, in index order.
    ///
    /// With a `version` only entries with an index up to it are returned;
    /// entries without index are always included and sort after indexed ones.
    pub fn deployable_for(&self, path: &Path, version: Option<i64>) -> Vec<PendingChange> {
        let mut pending: Vec<PendingChange> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, change)| !change.deployed && change.path.starts_with(path))
            .filter(|(_, change)| match (version, change.index) {
                (Some(version), Some(index)) => index <= version,
                _ => true,
            })
            .map(|(position, change)| PendingChange {
                position,
                change: change.clone(),
            })
            .collect();
        pending.sort_by_key(|p| (p.change.index.unwrap_or(i64::MAX), p.position));
        pending
    }

    /// Paths of all not deployed entries, in log order
    pub fn pending_paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().filter(|c| !c.deployed).map(|c| &c.path)
    }

    /// Flag the entries at the given positions as deployed and return their indices
    pub fn mark_deployed(&mut self, positions: &[usize]) -> BTreeSet<i64> {
        let mut indices = BTreeSet::new();
        for position in positions {
            if let Some(change) = self.entries.get_mut(*position) {
                change.deployed = true;
                if let Some(index) = change.index {
                    indices.insert(index);
                }
            }
        }
        indices
    }

    /// Flag entries already recorded as deployed in the persistent change log
    pub fn apply_deployed_indices(&mut self, indices: &BTreeSet<i64>) {
        for change in &mut self.entries {
            if change.index.map(|i| indices.contains(&i)).unwrap_or(false) {
                change.deployed = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> Path {
        s.parse().unwrap()
    }

    #[test]
    fn test_record_assigns_increasing_indices() {
        let mut log = ChangeSetLog::new();
        let first = log.record(path("class=X/attribute=a"), None, Some("1".into()));
        let second = log.record(path("class=X/attribute=b"), None, Some("2".into()));
        assert_eq!((first, second), (1, 2));
        assert_eq!(log.version(), 2);
    }

    #[test]
    fn test_deployable_for_filters_by_prefix_version_and_state() {
        let mut log = ChangeSetLog::new();
        log.record(path("class=X/attribute=a"), None, Some("1".into()));
        log.record(path("class=Y/attribute=a"), None, Some("2".into()));
        log.record(path("class=X/attribute=b"), None, Some("3".into()));

        let all = log.deployable_for(&path("class=X"), None);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].position, 0);

        let pinned = log.deployable_for(&path("class=X"), Some(2));
        assert_eq!(pinned.len(), 1);

        let indices = log.mark_deployed(&[0]);
        assert_eq!(indices.into_iter().collect::<Vec<_>>(), vec![1]);
        assert_eq!(log.deployable_for(&path("class=X"), None).len(), 1);
    }

    #[test]
    fn test_synthesized_entries_sort_last() {
        let mut log = ChangeSetLog::new();
        log.push(ModelChangeSetInfo {
            index: None,
            path: path("class=X/attribute=a"),
            old_value: None,
            new_value: Some("synthetic".into()),
            deployed: false,
        });
        log.record(path("class=X/attribute=a"), None, Some("logged".into()));

        let pending = log.deployable_for(&path("class=X"), None);
        assert_eq!(pending[0].change.index, Some(1));
        assert_eq!(pending[1].change.index, None);
        assert!(log.mark_deployed(&[0]).is_empty());
    }
}
