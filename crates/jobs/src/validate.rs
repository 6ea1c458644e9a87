use lq_domain::artifact::ArtifactKind;
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("expected a list of records, got {0}")]
    NotAList(&'static str),
    #[error("list is empty")]
    Empty,
    #[error("item {index} is not an object")]
    NotARecord { index: usize },
    #[error("item {index} has keys {found:?}, expected {expected:?}")]
    MismatchedKeys {
        index: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("{kind} needs at least {min} items, got {got}")]
    TooFew {
        kind: ArtifactKind,
        min: usize,
        got: usize,
    },
}

/// Check that `value` is a non-empty list of same-shaped records with at
/// least `min_items` entries, and return the records.
///
/// An object with a single array-valued field (`{"questions": [...]}`) is
/// unwrapped first.
pub fn validate_shape(
    kind: ArtifactKind,
    value: Value,
    min_items: usize,
) -> Result<Vec<Value>, ShapeError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) if map.len() == 1 => match map.into_iter().next() {
            Some((_, Value::Array(items))) => items,
            _ => return Err(ShapeError::NotAList("object")),
        },
        other => return Err(ShapeError::NotAList(type_name(&other))),
    };

    if items.is_empty() {
        return Err(ShapeError::Empty);
    }

    let mut expected: Option<BTreeSet<&str>> = None;
    for (index, item) in items.iter().enumerate() {
        let Value::Object(record) = item else {
            return Err(ShapeError::NotARecord { index });
        };
        let keys: BTreeSet<&str> = record.keys().map(String::as_str).collect();
        match &expected {
            None => expected = Some(keys),
            Some(first) if *first != keys => {
                return Err(ShapeError::MismatchedKeys {
                    index,
                    expected: first.iter().map(|k| k.to_string()).collect(),
                    found: keys.iter().map(|k| k.to_string()).collect(),
                });
            }
            Some(_) => {}
        }
    }

    if items.len() < min_items {
        return Err(ShapeError::TooFew {
            kind,
            min: min_items,
            got: items.len(),
        });
    }
    Ok(items)
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
