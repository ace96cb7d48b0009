#![allow(dead_code)]

use model_deploy::store::memory::SinkWrite;
use model_deploy::{
    AttributeValue, InMemoryStore, ModelNode, Models, ModelsMetaInfo, NodeKind, Path, Statement, Term,
    DCTERMS_TITLE,
};

pub const CASE: &str = "emf:Case";
pub const PROJECT: &str = "emf:Project";
pub const STATUS: &str = "emf:status";

pub fn path(s: &str) -> Path {
    s.parse().unwrap()
}

pub fn title(subject: &str, text: &str, language: &str) -> Statement {
    Statement::new(subject, DCTERMS_TITLE, Term::lang_string(text, language))
}

/// Definition D with fields F and type, classes Case and Project, property status
pub fn models() -> Models {
    let mut models = Models::new(ModelsMetaInfo::standard());
    models.add_node(
        ModelNode::new(NodeKind::Definition, path("definition=D"))
            .with_attribute("label", AttributeValue::labels([("en", "Case")])),
    );
    models.add_node(ModelNode::new(NodeKind::Field, path("definition=D/field=F")));
    models.add_node(
        ModelNode::new(NodeKind::Field, path("definition=D/field=type"))
            .with_attribute("codeList", "CL1")
            .with_attribute("value", "CS0001"),
    );
    models.add_node(
        ModelNode::new(NodeKind::Class, path(&format!("class={}", CASE)))
            .with_attribute("title", AttributeValue::labels([("en", "Case")])),
    );
    models.add_node(
        ModelNode::new(NodeKind::Class, path(&format!("class={}", PROJECT)))
            .with_attribute("title", AttributeValue::labels([("en", "Project")])),
    );
    models.add_node(
        ModelNode::new(NodeKind::Property, path(&format!("property={}", STATUS)))
            .with_attribute("title", AttributeValue::labels([("en", "A")])),
    );
    models
}

/// Store holding the statements the fixture classes were deployed with
pub fn store() -> InMemoryStore {
    InMemoryStore::new()
        .with_statement(title(CASE, "Case", "en"))
        .with_statement(title(PROJECT, "Project", "en"))
        .with_code_list("CL1")
}

pub fn label_writes(store: &InMemoryStore) -> Vec<SinkWrite> {
    store
        .journal()
        .into_iter()
        .filter(|w| matches!(w, SinkWrite::SaveLabels { .. } | SinkWrite::RemoveLabels { .. }))
        .collect()
}

pub fn statement_writes(store: &InMemoryStore) -> Vec<SinkWrite> {
    store
        .journal()
        .into_iter()
        .filter(|w| matches!(w, SinkWrite::SaveChanges { .. }))
        .collect()
}
