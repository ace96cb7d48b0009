use log::{debug, info};
use serde_json::Value;

use crate::error::{DeployError, DeployResult};
use crate::logic::aggregate::{aggregate, by_path, AggregatedChange};
use crate::logic::steps::{StepOutcome, StepPayload};
use crate::model::statement::{check_iri, XSD_DOUBLE, XSD_INTEGER};
use crate::model::{
    AttributeValue, DeploymentModels, ModelMetaInfo, Models, ModelsMetaInfo, NodeKind, Path, PendingChange,
    SemanticKind, Statement, Term, TermError, ValidationMessage, OWL_CLASS, RDF_PROPERTY, RDF_TYPE,
};
use crate::store::traits::SemanticStore;

/// Statements to remove and to add for one class or property
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementChanges {
    pub adds: Vec<Statement>,
    pub removes: Vec<Statement>,
}

impl StatementChanges {
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.removes.is_empty()
    }

    /// One SPARQL update, removals first
    pub fn to_sparql_update(&self) -> Result<String, TermError> {
        let mut operations = Vec::new();
        if !self.removes.is_empty() {
            operations.push(format!("DELETE DATA {{ {} }}", triples(&self.removes)?));
        }
        if !self.adds.is_empty() {
            operations.push(format!("INSERT DATA {{ {} }}", triples(&self.adds)?));
        }
        Ok(operations.join(" ;\n"))
    }
}

fn triples(statements: &[Statement]) -> Result<String, TermError> {
    Ok(statements
        .iter()
        .map(Statement::to_sparql)
        .collect::<Result<Vec<_>, _>>()?
        .join(" "))
}

/// `ASK` query that is true when the statement is present
pub fn ask_query(statement: &Statement) -> Result<String, TermError> {
    Ok(format!("ASK {{ {} }}", statement.to_sparql()?))
}

/// Outcome of generating statements; problems block the deployment of the node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedChanges {
    pub changes: StatementChanges,
    pub problems: Vec<ValidationMessage>,
}

/// Turns squashed attribute changes of a class or property into statement changes
pub struct SemanticModelGenerator<'a> {
    meta: &'a ModelsMetaInfo,
}

impl<'a> SemanticModelGenerator<'a> {
    pub fn new(meta: &'a ModelsMetaInfo) -> Self {
        Self { meta }
    }

    pub fn generate(&self, target: &Path, changes: &[PendingChange]) -> GeneratedChanges {
        let subject = target.value();
        let mut generated = GeneratedChanges::default();

        let kind = match NodeKind::from_segment_name(target.name()) {
            Some(kind @ (NodeKind::Class | NodeKind::Property)) => kind,
            _ => {
                generated.problems.push(ValidationMessage::error(
                    subject,
                    format!("{} is not a semantic class or property", target),
                ));
                return generated;
            }
        };

        for change in aggregate(changes, by_path) {
            if change.is_noop() {
                debug!("{} is unchanged after squashing, its statements are rewritten", change.key);
            }
            if let Err(message) = self.add_statements(kind, target, &change, &mut generated.changes) {
                generated.problems.push(ValidationMessage::error(subject, message));
            }
        }

        for statement in generated.changes.removes.iter().chain(&generated.changes.adds) {
            if let Err(e) = statement.to_sparql() {
                generated
                    .problems
                    .push(ValidationMessage::error(subject, e.to_string()));
            }
        }
        generated.problems.dedup();
        generated
    }

    fn add_statements(
        &self,
        kind: NodeKind,
        target: &Path,
        change: &AggregatedChange,
        out: &mut StatementChanges,
    ) -> Result<(), String> {
        let subject = target.value();

        if change.key == *target {
            let node_type = match kind {
                NodeKind::Class => OWL_CLASS,
                _ => RDF_PROPERTY,
            };
            let statement = Statement::new(subject, RDF_TYPE, Term::iri(node_type));
            if change.old_value.is_some() {
                out.removes.push(statement.clone());
            }
            if change.new_value.is_some() {
                out.adds.push(statement);
            }
            return Ok(());
        }

        let attribute = change
            .key
            .attribute_name()
            .ok_or_else(|| format!("{} does not address an attribute", change.key))?;
        let info = self.meta.lookup(kind, attribute).ok_or_else(|| {
            format!(
                "Attribute {} of {} has no semantic mapping",
                attribute,
                kind.segment_name()
            )
        })?;

        for object in objects(info, &change.key, change.old_value.as_ref())? {
            out.removes.push(Statement::new(subject, info.uri.as_str(), object));
        }
        for object in objects(info, &change.key, change.new_value.as_ref())? {
            out.adds.push(Statement::new(subject, info.uri.as_str(), object));
        }
        Ok(())
    }
}

/// Statement objects for one attribute value, coerced by the attribute's semantic kind
fn objects(info: &ModelMetaInfo, key: &Path, value: Option<&AttributeValue>) -> Result<Vec<Term>, String> {
    let value = match value {
        Some(value) if !value.is_empty() => value,
        _ => return Ok(Vec::new()),
    };

    match (info.kind, value) {
        (SemanticKind::Literal, AttributeValue::Scalar(scalar)) => literal(scalar)
            .map(|term| vec![term])
            .ok_or_else(|| format!("Value of {} is not a plain literal", key)),
        (SemanticKind::LanguageLiteral, AttributeValue::Labels(map)) => Ok(map
            .iter()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(language, text)| Term::lang_string(text.as_str(), language.as_str()))
            .collect()),
        (SemanticKind::LanguageLiteral, AttributeValue::Scalar(Value::String(text))) => match key.map_key() {
            Some(language) => Ok(vec![Term::lang_string(text.as_str(), language)]),
            // a plain value that predates translations is stored untagged
            None => Ok(vec![Term::string(text.as_str())]),
        },
        (SemanticKind::Reference, AttributeValue::Scalar(Value::String(iri))) => {
            check_iri(iri.trim()).map_err(|e| e.to_string())?;
            Ok(vec![Term::iri(iri.trim())])
        }
        _ => Err(format!(
            "Value of {} cannot be written as {:?}",
            key, info.kind
        )),
    }
}

fn literal(value: &Value) -> Option<Term> {
    match value {
        Value::Bool(b) => Some(Term::boolean(*b)),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(Term::typed(n.to_string(), XSD_INTEGER)),
        Value::Number(n) => Some(Term::typed(n.to_string(), XSD_DOUBLE)),
        Value::String(s) => Some(Term::string(s.as_str())),
        _ => None,
    }
}

/// True when a previous write of these changes went through: every add is present and
/// every remove that is not also an add is gone
async fn already_committed<S: SemanticStore>(changes: &StatementChanges, store: &S) -> DeployResult<bool> {
    if changes.adds.is_empty() || !store.validate_database_state(&changes.adds).await?.is_empty() {
        return Ok(false);
    }
    for remove in changes.removes.iter().filter(|s| !changes.adds.contains(s)) {
        if store
            .validate_database_state(std::slice::from_ref(remove))
            .await?
            .is_empty()
        {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Generator problems, or else one error per expected statement missing from the store
pub async fn validate<S: SemanticStore>(
    payload: &StepPayload,
    models: &DeploymentModels<'_>,
    store: &S,
) -> DeployResult<Vec<ValidationMessage>> {
    let generated = SemanticModelGenerator::new(models.meta()).generate(&payload.target, &payload.changes);
    if !generated.problems.is_empty() {
        return Ok(generated.problems);
    }
    if generated.changes.removes.is_empty() {
        return Ok(Vec::new());
    }
    let missing = store
        .validate_database_state(&generated.changes.removes)
        .await?;
    if !missing.is_empty() && already_committed(&generated.changes, store).await? {
        debug!("Statements of {} are already committed", payload.target);
        return Ok(Vec::new());
    }
    Ok(missing)
}

/// Commit the statement changes of one class or property in a single write
pub async fn deploy<S: SemanticStore>(
    payload: &StepPayload,
    models: &mut Models,
    store: &S,
) -> DeployResult<StepOutcome> {
    let generated = SemanticModelGenerator::new(models.meta()).generate(&payload.target, &payload.changes);
    if let Some(problem) = generated.problems.first() {
        return Err(DeployError::configuration(&payload.target, problem.message.clone()));
    }

    let changes = generated.changes;
    if changes.is_empty() {
        debug!("No statement changes for {}", payload.target);
        return Ok(StepOutcome::unchanged());
    }

    // an interrupted earlier deploy may have written these already
    let committed = already_committed(&changes, store).await?;
    if committed {
        info!("Statements of {} were committed before, skipping the write", payload.target);
    } else {
        store.save_changes(&changes.adds, &changes.removes).await?;
        info!(
            "Committed {} added and {} removed statements for {}",
            changes.adds.len(),
            changes.removes.len(),
            payload.target
        );
    }

    // removals are deployed now, forget what they left behind
    for change in aggregate(&payload.changes, by_path) {
        if change.new_value.is_some() {
            continue;
        }
        if change.key == payload.target {
            models.remove_detached_node(&payload.target);
        } else {
            models.drop_detached(&change.key);
        }
    }
    if committed {
        return Ok(StepOutcome::unchanged());
    }
    Ok(StepOutcome::changed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelChangeSetInfo, ModelNode, DCTERMS_TITLE, RDFS_SUB_CLASS_OF, XSD_BOOLEAN};
    use crate::store::memory::InMemoryStore;

    fn path(s: &str) -> Path {
        s.parse().unwrap()
    }

    fn change(position: usize, p: &str, old: Option<AttributeValue>, new: Option<AttributeValue>) -> PendingChange {
        PendingChange {
            position,
            change: ModelChangeSetInfo {
                index: Some(position as i64 + 1),
                path: path(p),
                old_value: old,
                new_value: new,
                deployed: false,
            },
        }
    }

    #[test]
    fn test_language_literal_changes() {
        let meta = ModelsMetaInfo::standard();
        let generated = SemanticModelGenerator::new(&meta).generate(
            &path("class=http://example.com/Case"),
            &[change(
                0,
                "class=http://example.com/Case/attribute=title/key=en",
                Some("Case".into()),
                Some("Legal case".into()),
            )],
        );
        assert!(generated.problems.is_empty());
        assert_eq!(
            generated.changes.removes,
            vec![Statement::new(
                "http://example.com/Case",
                DCTERMS_TITLE,
                Term::lang_string("Case", "en")
            )]
        );
        assert_eq!(generated.changes.adds[0].object, Term::lang_string("Legal case", "en"));
    }

    #[test]
    fn test_literal_and_reference_coercion() {
        let meta = ModelsMetaInfo::standard();
        let generated = SemanticModelGenerator::new(&meta).generate(
            &path("class=emf:Case"),
            &[
                change(0, "class=emf:Case/attribute=searchable", None, Some(true.into())),
                change(1, "class=emf:Case/attribute=parent", None, Some("emf:Activity".into())),
            ],
        );
        assert!(generated.problems.is_empty());
        assert!(generated
            .changes
            .adds
            .contains(&Statement::new("emf:Case", RDFS_SUB_CLASS_OF, Term::iri("emf:Activity"))));
        assert!(generated.changes.adds.iter().any(|s| matches!(
            &s.object,
            Term::Literal { value, datatype } if value == "true" && datatype == XSD_BOOLEAN
        )));
    }

    #[test]
    fn test_node_creation_adds_type_statement() {
        let meta = ModelsMetaInfo::standard();
        let generated = SemanticModelGenerator::new(&meta).generate(
            &path("property=emf:status"),
            &[change(0, "property=emf:status", None, Some("property".into()))],
        );
        assert_eq!(
            generated.changes.adds,
            vec![Statement::new("emf:status", RDF_TYPE, Term::iri(RDF_PROPERTY))]
        );
        assert!(generated.changes.removes.is_empty());
    }

    #[test]
    fn test_unmapped_attribute_and_bad_iri_are_problems() {
        let meta = ModelsMetaInfo::standard();
        let generated = SemanticModelGenerator::new(&meta).generate(
            &path("class=emf:Case"),
            &[
                change(0, "class=emf:Case/attribute=colour", None, Some("red".into())),
                change(1, "class=emf:Case/attribute=parent", None, Some("emf:Bad> <x".into())),
            ],
        );
        assert_eq!(generated.problems.len(), 2);
        assert!(generated.problems.iter().all(|p| p.is_error()));
    }

    #[test]
    fn test_identical_pairs_are_kept() {
        let meta = ModelsMetaInfo::standard();
        let generated = SemanticModelGenerator::new(&meta).generate(
            &path("class=emf:Case"),
            &[
                change(0, "class=emf:Case/attribute=title/key=en", Some("A".into()), Some("B".into())),
                change(1, "class=emf:Case/attribute=title/key=en", Some("B".into()), Some("A".into())),
            ],
        );
        assert_eq!(generated.changes.removes.len(), 1);
        assert_eq!(generated.changes.removes, generated.changes.adds);
    }

    #[test]
    fn test_plain_title_is_removed_as_untagged_literal() {
        let meta = ModelsMetaInfo::standard();
        let generated = SemanticModelGenerator::new(&meta).generate(
            &path("class=emf:Case"),
            &[
                change(
                    0,
                    "class=emf:Case/attribute=title",
                    Some("Case".into()),
                    Some(AttributeValue::Labels(Default::default())),
                ),
                change(1, "class=emf:Case/attribute=title/key=en", None, Some("Legal case".into())),
            ],
        );
        assert!(generated.problems.is_empty());
        assert_eq!(
            generated.changes.removes,
            vec![Statement::new("emf:Case", DCTERMS_TITLE, Term::string("Case"))]
        );
        assert_eq!(
            generated.changes.adds,
            vec![Statement::new("emf:Case", DCTERMS_TITLE, Term::lang_string("Legal case", "en"))]
        );
    }

    #[tokio::test]
    async fn test_committed_statements_are_not_written_again() {
        let store = InMemoryStore::new().with_statement(Statement::new(
            "emf:Case",
            DCTERMS_TITLE,
            Term::lang_string("Legal case", "en"),
        ));
        let mut models = Models::new(ModelsMetaInfo::standard());
        models.add_node(
            ModelNode::new(NodeKind::Class, path("class=emf:Case"))
                .with_attribute("title", AttributeValue::labels([("en", "Case")])),
        );
        models
            .update(&path("class=emf:Case/attribute=title/key=en"), Some("Legal case".into()))
            .unwrap();
        let target = path("class=emf:Case");
        let payload = StepPayload {
            changes: models.deployable_changes_for(&target, None),
            target,
        };

        let messages = validate(&payload, &models.deployment_view(None), &store).await.unwrap();
        assert!(messages.is_empty());

        let outcome = deploy(&payload, &mut models, &store).await.unwrap();
        assert!(!outcome.changed);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_statement_without_added_side_blocks() {
        let store = InMemoryStore::new();
        let changes = StatementChanges {
            adds: vec![Statement::new("emf:Case", DCTERMS_TITLE, Term::lang_string("New", "en"))],
            removes: vec![Statement::new("emf:Case", DCTERMS_TITLE, Term::lang_string("Old", "en"))],
        };
        assert!(!already_committed(&changes, &store).await.unwrap());
    }

    #[test]
    fn test_sparql_update_removes_first() {
        let changes = StatementChanges {
            adds: vec![Statement::new("emf:Case", DCTERMS_TITLE, Term::lang_string("New \"one\"", "en"))],
            removes: vec![Statement::new("emf:Case", DCTERMS_TITLE, Term::lang_string("Old", "en"))],
        };
        let update = changes.to_sparql_update().unwrap();
        let delete = update.find("DELETE DATA").unwrap();
        let insert = update.find("INSERT DATA").unwrap();
        assert!(delete < insert);
        assert!(update.contains(r#""New \"one\""@en"#));
        assert_eq!(
            ask_query(&changes.removes[0]).unwrap(),
            format!("ASK {{ <emf:Case> <{}> \"Old\"@en . }}", DCTERMS_TITLE)
        );
    }
}
