use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Id = String;

/// Language code to text, ordered so that persisted and compared maps are stable
pub type LabelMap = BTreeMap<String, String>;

/// Value held by a model attribute or recorded in a change set entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Label-like value: language code to text
    Labels(LabelMap),
    /// Any other JSON value (string, number, boolean, null)
    Scalar(serde_json::Value),
}

impl AttributeValue {
    pub fn text(value: impl Into<String>) -> Self {
        AttributeValue::Scalar(serde_json::Value::String(value.into()))
    }

    pub fn boolean(value: bool) -> Self {
        AttributeValue::Scalar(serde_json::Value::Bool(value))
    }

    pub fn labels<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        AttributeValue::Labels(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Null, a blank string, or a map without entries
    pub fn is_empty(&self) -> bool {
        match self {
            AttributeValue::Labels(map) => map.is_empty(),
            AttributeValue::Scalar(serde_json::Value::Null) => true,
            AttributeValue::Scalar(serde_json::Value::String(s)) => s.trim().is_empty(),
            AttributeValue::Scalar(_) => false,
        }
    }

    pub fn as_labels(&self) -> Option<&LabelMap> {
        match self {
            AttributeValue::Labels(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Scalar(serde_json::Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Entry of a label map
    pub fn entry(&self, key: &str) -> Option<&str> {
        match self {
            AttributeValue::Labels(map) => map.get(key).map(String::as_str),
            _ => None,
        }
    }

    /// Copy of the value as a label map with `key` set to `text`, or removed when `text` is `None`
    pub fn with_entry(&self, key: &str, text: Option<String>) -> AttributeValue {
        let mut map = self.as_labels().cloned().unwrap_or_default();
        match text {
            Some(text) => {
                map.insert(key.to_string(), text);
            }
            None => {
                map.remove(key);
            }
        }
        AttributeValue::Labels(map)
    }

    /// Label map with trimmed texts and blank entries dropped
    pub fn normalized_labels(&self) -> LabelMap {
        self.as_labels()
            .map(|map| {
                map.iter()
                    .filter_map(|(lang, text)| {
                        let text = text.trim();
                        (!text.is_empty()).then(|| (lang.clone(), text.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Code value write request built from a definition type field and its labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeValueUpdate {
    pub code_list_id: String,
    pub value: String,
    pub descriptions: LabelMap,
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::text(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::boolean(value)
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(value: serde_json::Value) -> Self {
        AttributeValue::Scalar(value)
    }
}
