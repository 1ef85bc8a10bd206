//! Typed field paths.
//!
//! Filter keys address nested document fields. Three spellings are
//! accepted and parsed into the same [`FieldPath`]:
//!
//! - bracket form: `$['ods:hasEvents'][*]['ods:hasLocation']`
//! - dotted form: `$.ods:hasEvents.ods:hasLocation`
//! - bare form: `ods:topicDiscipline` or `ods:hasEvents.ods:hasLocation`
//!
//! The same path drives the index field name used by the query compiler
//! and the document walk used by the local evaluator. Positional array
//! indexes are rejected: the search index flattens arrays, so `[0]` has no
//! meaning there and the two evaluators would disagree.

use std::fmt;

use serde_json::Value;

use crate::error::FilterError;
use crate::schema::ScalarKind;

/// Suffix of the exact-match sub-field for text values in the search index.
pub const KEYWORD_SUFFIX: &str = ".keyword";

/// One step of a field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object member by name.
    Field(String),
    /// Every element of an array. Arrays are already flattened by the
    /// document walk and the index, so this never changes a result.
    Wildcard,
}

/// A parsed, validated field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

/// Result of resolving a path against a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<'a> {
    /// No value exists at the path (or only empty arrays do).
    Missing,
    /// Every scalar-or-structure reached by the path, arrays flattened.
    Found(Vec<&'a Value>),
}

impl Resolved<'_> {
    /// True if any resolved value satisfies `pred`. Missing never does.
    pub fn any(&self, pred: impl Fn(&Value) -> bool) -> bool {
        match self {
            Resolved::Missing => false,
            Resolved::Found(values) => values.iter().any(|v| pred(*v)),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Resolved::Missing)
    }
}

impl FieldPath {
    /// Parse a filter key into a path.
    pub fn parse(key: &str) -> Result<Self, FilterError> {
        let invalid = |reason: &str| FilterError::InvalidPath {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(invalid("key is empty"));
        }

        let chars: Vec<char> = trimmed.chars().collect();
        let mut segments = Vec::new();
        let mut pos = 0;

        if chars[0] == '$' {
            pos = 1;
            if pos < chars.len() && chars[pos] != '.' && chars[pos] != '[' {
                return Err(invalid("expected '.' or '[' after '$'"));
            }
        } else {
            let name = read_name(&chars, &mut pos);
            if name.is_empty() {
                return Err(invalid("expected a field name"));
            }
            segments.push(name_segment(name));
        }

        while pos < chars.len() {
            match chars[pos] {
                '.' => {
                    pos += 1;
                    if chars.get(pos) == Some(&'.') {
                        return Err(invalid("recursive descent is not supported"));
                    }
                    let name = read_name(&chars, &mut pos);
                    if name.is_empty() {
                        return Err(invalid("empty field name after '.'"));
                    }
                    segments.push(name_segment(name));
                }
                '[' => {
                    pos += 1;
                    segments.push(read_bracket(&chars, &mut pos).map_err(|r| invalid(&r))?);
                }
                c => return Err(invalid(&format!("unexpected character '{}'", c))),
            }
        }

        if !segments.iter().any(|s| matches!(s, PathSegment::Field(_))) {
            return Err(invalid("path must name at least one field"));
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Names of the field segments, in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            PathSegment::Field(name) => Some(name.as_str()),
            PathSegment::Wildcard => None,
        })
    }

    /// Field name in the search index for values of `kind`.
    ///
    /// Field segments are joined with `.`; wildcard steps are dropped
    /// because the index flattens arrays. Text values target the
    /// exact-match keyword sub-field.
    pub fn index_field(&self, kind: ScalarKind) -> String {
        let mut field = self.field_names().collect::<Vec<_>>().join(".");
        if kind == ScalarKind::Text {
            field.push_str(KEYWORD_SUFFIX);
        }
        field
    }

    /// Walk `doc` along the path.
    ///
    /// The walk follows the index's flattening: arrays are transparent at
    /// every level, so wildcards add nothing, and a document key containing
    /// `.` consumes one segment per dotted part. `{"a.b": 1}` and
    /// `{"a": {"b": 1}}` both resolve under `a.b`. A final array
    /// contributes its elements.
    pub fn resolve<'a>(&self, doc: &'a Value) -> Resolved<'a> {
        let names: Vec<&str> = self.field_names().collect();
        let mut values = Vec::new();
        walk(doc, &names, &mut values);
        if values.is_empty() {
            Resolved::Missing
        } else {
            Resolved::Found(values)
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for segment in &self.segments {
            match segment {
                PathSegment::Field(name) => write!(f, "['{}']", name)?,
                PathSegment::Wildcard => write!(f, "[*]")?,
            }
        }
        Ok(())
    }
}

// ── Parsing helpers ─────────────────────────────────────────────────

fn name_segment(name: String) -> PathSegment {
    if name == "*" {
        PathSegment::Wildcard
    } else {
        PathSegment::Field(name)
    }
}

/// Read an unquoted name up to the next `.` or `[`.
fn read_name(chars: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while *pos < chars.len() && chars[*pos] != '.' && chars[*pos] != '[' {
        *pos += 1;
    }
    chars[start..*pos].iter().collect::<String>().trim().to_string()
}

/// Read the body of a `[...]` selector; `pos` starts just after `[`.
fn read_bracket(chars: &[char], pos: &mut usize) -> Result<PathSegment, String> {
    let segment = match chars.get(*pos) {
        Some(&quote) if quote == '\'' || quote == '"' => {
            *pos += 1;
            let start = *pos;
            while *pos < chars.len() && chars[*pos] != quote {
                *pos += 1;
            }
            if *pos >= chars.len() {
                return Err("unterminated quoted field name".to_string());
            }
            let name: String = chars[start..*pos].iter().collect();
            *pos += 1;
            if name.is_empty() {
                return Err("empty quoted field name".to_string());
            }
            if name.contains('.') {
                return Err(format!("field name '{}' contains '.'", name));
            }
            PathSegment::Field(name)
        }
        Some(_) => {
            let start = *pos;
            while *pos < chars.len() && chars[*pos] != ']' {
                *pos += 1;
            }
            let body: String = chars[start..*pos].iter().collect();
            let body = body.trim();
            if body == "*" {
                PathSegment::Wildcard
            } else if body.parse::<usize>().is_ok() {
                return Err("positional array indexes are not supported".to_string());
            } else if body.is_empty() {
                return Err("empty selector '[]'".to_string());
            } else if body.contains('.') {
                return Err(format!("field name '{}' contains '.'", body));
            } else {
                PathSegment::Field(body.to_string())
            }
        }
        None => return Err("unterminated '['".to_string()),
    };

    if chars.get(*pos) != Some(&']') {
        return Err("expected ']'".to_string());
    }
    *pos += 1;
    Ok(segment)
}

// ── Document walk ───────────────────────────────────────────────────

fn walk<'a>(node: &'a Value, names: &[&str], out: &mut Vec<&'a Value>) {
    if names.is_empty() {
        flatten_into(node, out);
        return;
    }
    match node {
        Value::Array(items) => {
            for item in items {
                walk(item, names, out);
            }
        }
        Value::Object(map) => {
            for (key, child) in map {
                if let Some(rest) = strip_key(key, names) {
                    walk(child, rest, out);
                }
            }
        }
        _ => {}
    }
}

/// Segments left after matching `key`, one segment per dotted part.
fn strip_key<'p, 's>(key: &str, names: &'p [&'s str]) -> Option<&'p [&'s str]> {
    let mut rest = names;
    for part in key.split('.') {
        match rest.split_first() {
            Some((name, tail)) if *name == part => rest = tail,
            _ => return None,
        }
    }
    Some(rest)
}

fn flatten_into<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_into(item, out);
            }
        }
        other => out.push(other),
    }
}
