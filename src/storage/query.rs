// ============================================================================
// src/storage/query.rs - Content query evaluation for the in-memory store
// ============================================================================
//
// Supported syntax:
// - Filter clauses: `+InTree:'<path>'` and `+TypeIs:'<type>'`, all required
// - Ordering: `"<Field> [asc|desc]"`, multiple keys, ties broken by `Id`
// - Projection: selected fields only (`Id`, `Path`, `Name`, `Type` are always
//   carried by the object itself)
//
// ============================================================================

use crate::core::path;
use crate::interface::{ContentObject, QueryRequest, RemoteError};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;

lazy_static! {
    static ref CLAUSE: Regex = Regex::new(r"\+(\w+):'([^']*)'").expect("clause pattern is valid");
}

const STRUCTURAL_FIELDS: &[&str] = &["Id", "Path", "Name", "Type"];

// ============================================================================
// FILTER
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentFilter {
    in_tree: Vec<String>,
    type_is: Vec<String>,
}

impl ContentFilter {
    pub fn parse(content_query: &str) -> Result<Self, RemoteError> {
        let mut filter = Self::default();
        let mut consumed = 0;

        for capture in CLAUSE.captures_iter(content_query) {
            let (Some(whole), Some(key), Some(value)) =
                (capture.get(0), capture.get(1), capture.get(2))
            else {
                continue;
            };
            if !content_query[consumed..whole.start()].trim().is_empty() {
                return Err(invalid_query(content_query));
            }
            consumed = whole.end();

            match key.as_str() {
                "InTree" => filter.in_tree.push(value.as_str().to_string()),
                "TypeIs" => filter.type_is.push(value.as_str().to_string()),
                other => {
                    return Err(RemoteError::rejected(format!(
                        "Unsupported query clause '{other}'"
                    )));
                }
            }
        }

        if !content_query[consumed..].trim().is_empty() {
            return Err(invalid_query(content_query));
        }
        Ok(filter)
    }

    pub fn matches(&self, object: &ContentObject) -> bool {
        let object_path = object.path();
        self.in_tree
            .iter()
            .all(|root| path::is_in_tree(&object_path, root))
            && self.type_is.iter().all(|t| *t == object.type_name)
    }
}

fn invalid_query(content_query: &str) -> RemoteError {
    RemoteError::rejected(format!("Invalid content query: {content_query}"))
}

// ============================================================================
// ORDERING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    field: String,
    descending: bool,
}

impl OrderKey {
    pub fn parse(clause: &str) -> Result<Self, RemoteError> {
        let mut parts = clause.split_whitespace();
        let field = parts
            .next()
            .ok_or_else(|| RemoteError::rejected("Empty order by clause"))?;
        let descending = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => false,
            Some("desc") => true,
            Some(other) => {
                return Err(RemoteError::rejected(format!(
                    "Invalid sort direction '{other}'"
                )));
            }
        };
        if parts.next().is_some() {
            return Err(RemoteError::rejected(format!("Invalid order by clause '{clause}'")));
        }
        Ok(Self {
            field: field.to_string(),
            descending,
        })
    }

    fn compare(&self, a: &ContentObject, b: &ContentObject) -> Ordering {
        let ordering = compare_json(&sort_value(a, &self.field), &sort_value(b, &self.field));
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

fn sort_value(object: &ContentObject, field: &str) -> JsonValue {
    match field {
        "Id" => object.id.map(JsonValue::from).unwrap_or(JsonValue::Null),
        "Path" => JsonValue::String(object.path()),
        "Name" => JsonValue::String(object.name.clone()),
        "Type" => JsonValue::String(object.type_name.clone()),
        other => object.field(other).cloned().unwrap_or(JsonValue::Null),
    }
}

/// Null < bool < number < string; arrays and objects compare by their text.
fn compare_json(a: &JsonValue, b: &JsonValue) -> Ordering {
    fn rank(value: &JsonValue) -> u8 {
        match value {
            JsonValue::Null => 0,
            JsonValue::Bool(_) => 1,
            JsonValue::Number(_) => 2,
            JsonValue::String(_) => 3,
            JsonValue::Array(_) | JsonValue::Object(_) => 4,
        }
    }

    match (a, b) {
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x.cmp(y),
        (JsonValue::Number(x), JsonValue::Number(y)) => {
            match (x.as_i64(), y.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => x
                    .as_f64()
                    .partial_cmp(&y.as_f64())
                    .unwrap_or(Ordering::Equal),
            }
        }
        (JsonValue::String(x), JsonValue::String(y)) => x.cmp(y),
        _ if rank(a) == rank(b) => a.to_string().cmp(&b.to_string()),
        _ => rank(a).cmp(&rank(b)),
    }
}

// ============================================================================
// EVALUATION
// ============================================================================

/// Runs `request` over `objects`.
pub fn evaluate<'a, I>(objects: I, request: &QueryRequest) -> Result<Vec<ContentObject>, RemoteError>
where
    I: IntoIterator<Item = &'a ContentObject>,
{
    let filter = ContentFilter::parse(&request.content_query)?;
    let keys = request
        .order_by
        .iter()
        .map(|clause| OrderKey::parse(clause))
        .collect::<Result<Vec<_>, _>>()?;

    let mut matched: Vec<ContentObject> = objects
        .into_iter()
        .filter(|object| filter.matches(object))
        .cloned()
        .collect();

    matched.sort_by(|a, b| {
        keys.iter()
            .map(|key| key.compare(a, b))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or_else(|| a.id.cmp(&b.id))
    });

    if !request.select.is_empty() {
        for object in &mut matched {
            object.fields.retain(|name, _| {
                request.select.iter().any(|selected| selected == name)
                    && !STRUCTURAL_FIELDS.contains(&name.as_str())
            });
        }
    }

    Ok(matched)
}
