use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::path::{self, Path};
use crate::model::{AttributeValue, Id};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Definition,
    Field,
    Region,
    Class,
    Property,
}

impl NodeKind {
    /// Path segment name used to address nodes of this kind
    pub fn segment_name(&self) -> &'static str {
        match self {
            NodeKind::Definition => path::DEFINITION,
            NodeKind::Field => path::FIELD,
            NodeKind::Region => path::REGION,
            NodeKind::Class => path::CLASS,
            NodeKind::Property => path::PROPERTY,
        }
    }

    pub fn from_segment_name(name: &str) -> Option<Self> {
        match name {
            path::DEFINITION => Some(NodeKind::Definition),
            path::FIELD => Some(NodeKind::Field),
            path::REGION => Some(NodeKind::Region),
            path::CLASS => Some(NodeKind::Class),
            path::PROPERTY => Some(NodeKind::Property),
            _ => None,
        }
    }
}

/// A named value owned by exactly one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAttribute {
    pub name: String,
    pub value: AttributeValue,
    /// Removed by a change that is not deployed yet, the value only drives removal
    #[serde(default)]
    pub detached: bool,
    /// Path of the owning node
    pub context: Path,
}

impl ModelAttribute {
    pub fn new(context: Path, name: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            value,
            detached: false,
            context,
        }
    }
}

/// Addressable entity of the models graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelNode {
    pub id: Id,
    pub kind: NodeKind,
    pub path: Path,
    /// Back-reference to the parent node, never ownership
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Path>,
    #[serde(default)]
    pub attributes: BTreeMap<String, ModelAttribute>,
    #[serde(default)]
    pub detached: bool,
}

impl ModelNode {
    pub fn new(kind: NodeKind, path: Path) -> Self {
        let id = path.last().value().to_string();
        let parent = path.parent();
        Self {
            id,
            kind,
            path,
            parent,
            attributes: BTreeMap::new(),
            detached: false,
        }
    }

    /// Attached attribute by name; detached attributes are not visible here
    pub fn attribute(&self, name: &str) -> Option<&ModelAttribute> {
        self.attributes.get(name).filter(|a| !a.detached)
    }

    pub fn attribute_value(&self, name: &str) -> Option<&AttributeValue> {
        self.attribute(name).map(|a| &a.value)
    }

    pub fn set_attribute(&mut self, name: &str, value: AttributeValue) {
        self.attributes.insert(
            name.to_string(),
            ModelAttribute::new(self.path.clone(), name, value),
        );
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<ModelAttribute> {
        self.attributes.remove(name)
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.set_attribute(name, value.into());
        self
    }
}
