use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::NodeKind;

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDF_PROPERTY: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#Property";
pub const RDFS_SUB_CLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
pub const RDFS_DOMAIN: &str = "http://www.w3.org/2000/01/rdf-schema#domain";
pub const RDFS_RANGE: &str = "http://www.w3.org/2000/01/rdf-schema#range";
pub const OWL_CLASS: &str = "http://www.w3.org/2002/07/owl#Class";
pub const OWL_INVERSE_OF: &str = "http://www.w3.org/2002/07/owl#inverseOf";
pub const DCTERMS_TITLE: &str = "http://purl.org/dc/terms/title";
pub const DCTERMS_DESCRIPTION: &str = "http://purl.org/dc/terms/description";
pub const DC_CREATOR: &str = "http://purl.org/dc/elements/1.1/creator";
pub const EMF_NAMESPACE: &str = "http://ittruse.ittbg.com/ontology/enterpriseManagementFramework#";

/// How an attribute value is written as a statement object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SemanticKind {
    /// Typed literal, datatype derived from the JSON value
    Literal,
    /// Language tagged string
    LanguageLiteral,
    /// Resource reference
    Reference,
}

/// Mapping of one model attribute to a semantic predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetaInfo {
    pub id: String,
    pub uri: String,
    pub kind: SemanticKind,
}

impl ModelMetaInfo {
    pub fn new(id: &str, uri: impl Into<String>, kind: SemanticKind) -> Self {
        Self {
            id: id.to_string(),
            uri: uri.into(),
            kind,
        }
    }
}

/// Attribute meta information for semantic classes and properties
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelsMetaInfo {
    #[serde(default)]
    pub classes: BTreeMap<String, ModelMetaInfo>,
    #[serde(default)]
    pub properties: BTreeMap<String, ModelMetaInfo>,
}

impl ModelsMetaInfo {
    /// The attribute mappings used by the platform ontology
    pub fn standard() -> Self {
        use SemanticKind::*;

        let emf = |local: &str| format!("{}{}", EMF_NAMESPACE, local);
        let shared = [
            ModelMetaInfo::new("title", DCTERMS_TITLE, LanguageLiteral),
            ModelMetaInfo::new("description", DCTERMS_DESCRIPTION, LanguageLiteral),
            ModelMetaInfo::new("creator", DC_CREATOR, LanguageLiteral),
            ModelMetaInfo::new("searchable", emf("isSearchable"), Literal),
        ];
        let class_only = [
            ModelMetaInfo::new("parent", RDFS_SUB_CLASS_OF, Reference),
            ModelMetaInfo::new("createable", emf("isCreateable"), Literal),
            ModelMetaInfo::new("uploadable", emf("isUploadable"), Literal),
            ModelMetaInfo::new(
                "allowInheritLibraryPermissions",
                emf("allowInheritLibraryPermissions"),
                Literal,
            ),
        ];
        let property_only = [
            ModelMetaInfo::new("domainClass", RDFS_DOMAIN, Reference),
            ModelMetaInfo::new("rangeClass", RDFS_RANGE, Reference),
            ModelMetaInfo::new("inverseRelation", OWL_INVERSE_OF, Reference),
            ModelMetaInfo::new("auditEvent", emf("auditEvent"), Literal),
            ModelMetaInfo::new("isSystemProperty", emf("isSystemProperty"), Literal),
        ];

        let index = |infos: Vec<ModelMetaInfo>| {
            infos
                .into_iter()
                .map(|info| (info.id.clone(), info))
                .collect::<BTreeMap<_, _>>()
        };

        Self {
            classes: index(shared.iter().cloned().chain(class_only).collect()),
            properties: index(shared.into_iter().chain(property_only).collect()),
        }
    }

    pub fn lookup(&self, kind: NodeKind, attribute: &str) -> Option<&ModelMetaInfo> {
        match kind {
            NodeKind::Class => self.classes.get(attribute),
            NodeKind::Property => self.properties.get(attribute),
            _ => None,
        }
    }
}
