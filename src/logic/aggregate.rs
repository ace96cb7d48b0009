use std::collections::BTreeMap;

use crate::model::{AttributeValue, LabelMap, Path, PendingChange};

/// Net effect of a group of change set entries
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedChange {
    /// Collapse key the group was built from
    pub key: Path,
    pub old_value: Option<AttributeValue>,
    pub new_value: Option<AttributeValue>,
    /// Log positions of every entry folded into this change
    pub positions: Vec<usize>,
    /// Indices of the entries that have one
    pub indices: Vec<i64>,
}

impl AggregatedChange {
    /// Old and new are equal after squashing; steps still run for these
    pub fn is_noop(&self) -> bool {
        self.old_value == self.new_value
    }
}

/// Collapse key that keeps every path apart, language keys included
pub fn by_path(path: &Path) -> Path {
    path.clone()
}

/// Collapse key that folds `.../attribute=x/key=lang` edits into one change of `attribute=x`
pub fn by_attribute(path: &Path) -> Path {
    path.attribute_path()
}

/// Squash entries into one (old, new) pair per collapse key.
///
/// Per distinct path the old value of the first entry and the new value of the
/// last entry in index order win. When a group spans map keys the per key
/// results are folded into label maps; keys whose last new value is `None`
/// are left out of the new map.
pub fn aggregate<F>(changes: &[PendingChange], collapse_key: F) -> Vec<AggregatedChange>
where
    F: Fn(&Path) -> Path,
{
    let mut ordered: Vec<&PendingChange> = changes.iter().collect();
    ordered.sort_by_key(|c| (c.change.index.unwrap_or(i64::MAX), c.position));

    let mut groups: BTreeMap<Path, Vec<&PendingChange>> = BTreeMap::new();
    for change in ordered {
        groups
            .entry(collapse_key(&change.change.path))
            .or_default()
            .push(change);
    }

    groups
        .into_iter()
        .filter(|(_, entries)| !entries.is_empty())
        .map(|(key, entries)| squash(key, &entries))
        .collect()
}

fn squash(key: Path, entries: &[&PendingChange]) -> AggregatedChange {
    // path -> (old of first entry, new of last entry)
    let mut slots: BTreeMap<&Path, (Option<AttributeValue>, Option<AttributeValue>)> = BTreeMap::new();
    for entry in entries {
        let slot = slots
            .entry(&entry.change.path)
            .or_insert_with(|| (entry.change.old_value.clone(), None));
        slot.1 = entry.change.new_value.clone();
    }

    let positions = entries.iter().map(|e| e.position).collect();
    let indices = entries.iter().filter_map(|e| e.change.index).collect();

    let (old_value, new_value) = if slots.len() == 1 && slots.keys().all(|p| **p == key) {
        slots.into_values().next().unwrap_or((None, None))
    } else {
        fold_map_keys(slots)
    };

    AggregatedChange {
        key,
        old_value,
        new_value,
        positions,
        indices,
    }
}

fn fold_map_keys(
    slots: BTreeMap<&Path, (Option<AttributeValue>, Option<AttributeValue>)>,
) -> (Option<AttributeValue>, Option<AttributeValue>) {
    let mut old_map = LabelMap::new();
    let mut new_map = LabelMap::new();
    let (mut has_old, mut has_new) = (false, false);

    // whole map edits sort before keyed ones for the same attribute, so keyed edits override them
    for (path, (old, new)) in slots {
        match path.map_key() {
            Some(key) => {
                if let Some(text) = old.as_ref().and_then(|v| v.as_str()) {
                    old_map.insert(key.to_string(), text.to_string());
                    has_old = true;
                }
                if let Some(text) = new.as_ref().and_then(|v| v.as_str()) {
                    new_map.insert(key.to_string(), text.to_string());
                    has_new = true;
                }
            }
            None => {
                if let Some(map) = old.as_ref().and_then(|v| v.as_labels()) {
                    old_map.extend(map.clone());
                    has_old = true;
                }
                if let Some(map) = new.as_ref().and_then(|v| v.as_labels()) {
                    new_map.extend(map.clone());
                    has_new = true;
                }
            }
        }
    }

    (
        has_old.then(|| AttributeValue::Labels(old_map)),
        has_new.then(|| AttributeValue::Labels(new_map)),
    )
}
