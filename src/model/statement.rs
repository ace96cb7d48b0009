use serde::{Deserialize, Serialize};
use std::fmt;

pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";

/// Object position of a statement
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Term {
    Iri { value: String },
    Literal { value: String, datatype: String },
    LangLiteral { value: String, language: String },
}

impl Term {
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri {
            value: value.into(),
        }
    }

    pub fn typed(value: impl Into<String>, datatype: &str) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: datatype.to_string(),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Term::typed(value, XSD_STRING)
    }

    pub fn boolean(value: bool) -> Self {
        Term::typed(value.to_string(), XSD_BOOLEAN)
    }

    pub fn lang_string(value: impl Into<String>, language: impl Into<String>) -> Self {
        Term::LangLiteral {
            value: value.into(),
            language: language.into(),
        }
    }
}

/// A triple in the semantic store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Statement {
    pub subject: String,
    pub predicate: String,
    pub object: Term,
}

impl Statement {
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: Term) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TermError {
    #[error("'{0}' is not a valid IRI")]
    InvalidIri(String),
    #[error("'{0}' is not a valid language tag")]
    InvalidLanguage(String),
}

/// Characters that may not appear in an IRI reference
fn is_forbidden_iri_char(c: char) -> bool {
    c.is_whitespace() || c.is_control() || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\')
}

pub fn check_iri(iri: &str) -> Result<&str, TermError> {
    if iri.is_empty() || !iri.contains(':') || iri.chars().any(is_forbidden_iri_char) {
        return Err(TermError::InvalidIri(iri.to_string()));
    }
    Ok(iri)
}

fn check_language(language: &str) -> Result<&str, TermError> {
    let valid = !language.is_empty()
        && language.split('-').all(|part| {
            !part.is_empty() && part.len() <= 8 && part.chars().all(|c| c.is_ascii_alphanumeric())
        });
    if valid {
        Ok(language)
    } else {
        Err(TermError::InvalidLanguage(language.to_string()))
    }
}

/// Escape a string for use inside a quoted SPARQL / N-Triples literal
pub fn escape_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

impl Term {
    /// SPARQL form of the term, rejecting identifiers that cannot be written safely
    pub fn to_sparql(&self) -> Result<String, TermError> {
        match self {
            Term::Iri { value } => Ok(format!("<{}>", check_iri(value)?)),
            Term::Literal { value, datatype } => Ok(format!(
                "\"{}\"^^<{}>",
                escape_literal(value),
                check_iri(datatype)?
            )),
            Term::LangLiteral { value, language } => Ok(format!(
                "\"{}\"@{}",
                escape_literal(value),
                check_language(language)?
            )),
        }
    }
}

impl Statement {
    /// SPARQL triple pattern terminated with ` .`
    pub fn to_sparql(&self) -> Result<String, TermError> {
        Ok(format!(
            "<{}> <{}> {} .",
            check_iri(&self.subject)?,
            check_iri(&self.predicate)?,
            self.object.to_sparql()?
        ))
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let object = match &self.object {
            Term::Iri { value } => value.clone(),
            Term::Literal { value, .. } => format!("\"{}\"", value),
            Term::LangLiteral { value, language } => format!("\"{}\"@{}", value, language),
        };
        write!(f, "{} {} {}", self.subject, self.predicate, object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_escaping() {
        let term = Term::lang_string("say \"hi\"\n\\ done", "en");
        assert_eq!(term.to_sparql().unwrap(), r#""say \"hi\"\n\\ done"@en"#);
    }

    #[test]
    fn test_adversarial_identifiers_are_rejected() {
        let injected = Statement::new(
            "http://example.com/a> } ; DROP ALL ; INSERT DATA { <http://x",
            "http://purl.org/dc/terms/title",
            Term::string("x"),
        );
        assert!(matches!(injected.to_sparql(), Err(TermError::InvalidIri(_))));

        let bad_language = Term::lang_string("x", "en\" } DROP ALL");
        assert!(matches!(bad_language.to_sparql(), Err(TermError::InvalidLanguage(_))));

        assert!(check_iri("no-scheme").is_err());
        assert!(check_iri("http://example.com/a b").is_err());
        assert!(check_iri("http://example.com/a#b").is_ok());
    }

    #[test]
    fn test_statement_rendering() {
        let statement = Statement::new(
            "http://example.com/Case",
            "http://example.com/isSearchable",
            Term::boolean(true),
        );
        assert_eq!(
            statement.to_sparql().unwrap(),
            "<http://example.com/Case> <http://example.com/isSearchable> \"true\"^^<http://www.w3.org/2001/XMLSchema#boolean> ."
        );
    }
}
