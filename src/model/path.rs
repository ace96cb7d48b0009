use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFINITION: &str = "definition";
pub const FIELD: &str = "field";
pub const REGION: &str = "region";
pub const CLASS: &str = "class";
pub const PROPERTY: &str = "property";
pub const ATTRIBUTE: &str = "attribute";
/// Map key inside an attribute value, usually a language code
pub const KEY: &str = "key";

/// Segment names recognized when parsing a pretty printed path
pub const SEGMENT_NAMES: &[&str] = &[DEFINITION, FIELD, REGION, CLASS, PROPERTY, ATTRIBUTE, KEY];

const SEPARATOR: char = '/';
const ASSIGN: char = '=';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("a path must have at least one segment")]
    Empty,
    #[error("path segment {position} has an empty {part}")]
    EmptySegment { position: usize, part: &'static str },
    #[error("path segment name '{0}' contains a reserved character")]
    ReservedCharacter(String),
    #[error("malformed path '{0}'")]
    Malformed(String),
}

/// One step of a [`Path`]: a segment name (node kind, `attribute` or `key`) and its value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathSegment {
    name: String,
    value: String,
}

impl PathSegment {
    fn at(position: usize, name: String, value: String) -> Result<Self, PathError> {
        if name.is_empty() {
            return Err(PathError::EmptySegment { position, part: "name" });
        }
        if value.is_empty() {
            return Err(PathError::EmptySegment { position, part: "value" });
        }
        if name.contains(SEPARATOR) || name.contains(ASSIGN) {
            return Err(PathError::ReservedCharacter(name));
        }
        Ok(Self { name, value })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}

/// Immutable address of a node or attribute slot in the models graph.
///
/// A path always has at least one segment and no segment carries an empty
/// name or value. The pretty form is `name=value` pairs joined with `/`,
/// e.g. `definition=D/field=F/attribute=label/key=en`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    pub fn new(segments: Vec<PathSegment>) -> Result<Self, PathError> {
        if segments.is_empty() {
            return Err(PathError::Empty);
        }
        Ok(Self { segments })
    }

    /// New path with one more segment at the end
    pub fn child(&self, name: impl Into<String>, value: impl Into<String>) -> Result<Self, PathError> {
        let segment = PathSegment::at(self.segments.len(), name.into(), value.into())?;
        Ok(self.append(&Path {
            segments: vec![segment],
        }))
    }

    pub fn append(&self, other: &Path) -> Path {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Path { segments }
    }

    /// First segment as a one segment path
    pub fn head(&self) -> Path {
        Path {
            segments: vec![self.segments[0].clone()],
        }
    }

    /// Last segment as a one segment path
    pub fn tail(&self) -> Path {
        Path {
            segments: vec![self.last().clone()],
        }
    }

    /// Second segment, if there is one
    pub fn next(&self) -> Option<Path> {
        self.segments.get(1).map(|segment| Path {
            segments: vec![segment.clone()],
        })
    }

    pub fn first(&self) -> &PathSegment {
        &self.segments[0]
    }

    pub fn last(&self) -> &PathSegment {
        &self.segments[self.segments.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Never true, kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Name of the first segment
    pub fn name(&self) -> &str {
        self.first().name()
    }

    /// Value of the first segment
    pub fn value(&self) -> &str {
        self.first().value()
    }

    pub fn parent(&self) -> Option<Path> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Path {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// True if `prefix` addresses this path or one of its ancestors
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Trailing map key, e.g. the language of `attribute=label/key=en`
    pub fn map_key(&self) -> Option<&str> {
        let last = self.last();
        if last.is(KEY) && self.segments.len() > 1 {
            Some(last.value())
        } else {
            None
        }
    }

    /// The path with a trailing map key removed
    pub fn attribute_path(&self) -> Path {
        match self.map_key() {
            Some(_) => Path {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            },
            None => self.clone(),
        }
    }

    /// Attribute name if this path addresses an attribute slot (with or without map key)
    pub fn attribute_name(&self) -> Option<&str> {
        let position = match self.map_key() {
            Some(_) => self.segments.len() - 2,
            None => self.segments.len() - 1,
        };
        let segment = &self.segments[position];
        segment.is(ATTRIBUTE).then(|| segment.value())
    }

    /// The path of the node owning this slot: trailing attribute and key segments removed
    pub fn node_path(&self) -> Path {
        let end = self
            .segments
            .iter()
            .rposition(|s| !s.is(ATTRIBUTE) && !s.is(KEY))
            .map(|p| p + 1)
            .unwrap_or(1);
        Path {
            segments: self.segments[..end].to_vec(),
        }
    }

    pub fn pretty_print(&self) -> String {
        self.segments
            .iter()
            .map(|s| format!("{}{}{}", s.name, ASSIGN, s.value))
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pretty_print())
    }
}

impl FromStr for Path {
    type Err = PathError;

    /// Splits on `/` only before a known segment name so that values may hold IRIs
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts: Vec<(String, String)> = Vec::new();
        for token in s.split(SEPARATOR) {
            match token.split_once(ASSIGN) {
                Some((name, value)) if SEGMENT_NAMES.contains(&name) => {
                    parts.push((name.to_string(), value.to_string()));
                }
                _ => match parts.last_mut() {
                    Some((_, value)) => {
                        value.push(SEPARATOR);
                        value.push_str(token);
                    }
                    None => return Err(PathError::Malformed(s.to_string())),
                },
            }
        }

        let segments = parts
            .into_iter()
            .enumerate()
            .map(|(position, (name, value))| PathSegment::at(position, name, value))
            .collect::<Result<Vec<_>, _>>()?;
        Path::new(segments)
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.pretty_print())
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> Path {
        s.parse().unwrap()
    }

    #[test]
    fn test_head_tail_next() {
        let p = path("definition=D/field=F/attribute=label/key=en");
        assert_eq!(p.head(), path("definition=D"));
        assert_eq!(p.tail(), path("key=en"));
        assert_eq!(p.next(), Some(path("field=F")));
        assert_eq!(path("class=X").next(), None);
    }

    #[test]
    fn test_attribute_and_node_paths() {
        let p = path("definition=D/field=F/attribute=label/key=en");
        assert_eq!(p.map_key(), Some("en"));
        assert_eq!(p.attribute_path(), path("definition=D/field=F/attribute=label"));
        assert_eq!(p.attribute_name(), Some("label"));
        assert_eq!(p.node_path(), path("definition=D/field=F"));
        assert_eq!(path("definition=D").node_path(), path("definition=D"));
        assert_eq!(path("definition=D").attribute_name(), None);
    }

    #[test]
    fn test_parse_keeps_iri_values() {
        let raw = "class=http://example.com/onto#Case/attribute=title/key=en";
        let p = path(raw);
        assert_eq!(p.len(), 3);
        assert_eq!(p.value(), "http://example.com/onto#Case");
        assert_eq!(p.pretty_print(), raw);
    }

    #[test]
    fn test_empty_segments_are_rejected() {
        assert_eq!(
            "definition=D/field=".parse::<Path>(),
            Err(PathError::EmptySegment { position: 1, part: "value" })
        );
        assert!(matches!("".parse::<Path>(), Err(PathError::Malformed(_))));
        assert!(matches!(Path::new(vec![]), Err(PathError::Empty)));
        assert_eq!(
            path("definition=D").child("field", "F").unwrap(),
            path("definition=D/field=F")
        );
        assert!(path("definition=D").child("", "x").is_err());
        assert!(path("definition=D").child("a/b", "x").is_err());
    }

    #[test]
    fn test_child_and_starts_with() {
        let base = path("definition=D");
        let full = base.append(&path("field=F/attribute=tooltip"));
        assert_eq!(full.pretty_print(), "definition=D/field=F/attribute=tooltip");
        assert!(full.starts_with(&base));
        assert!(!base.starts_with(&full));
        assert!(!path("definition=DX").starts_with(&base));
        assert_eq!(full.parent(), Some(path("definition=D/field=F")));
    }

    #[test]
    fn test_serde_as_string() {
        let p = path("property=emf:status/attribute=searchable");
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"property=emf:status/attribute=searchable\"");
        let back: Path = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
