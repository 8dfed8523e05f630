//! Filter evaluation for the in-memory store.
//!
//! Supports the subset of the document-database query language the engine
//! emits: implicit equality, `$eq`, `$ne`, `$in`, `$nin`, `$lt`, `$lte`, `$gt`,
//! `$gte`, `$regex` (with `$options`), `$exists`, `$and`, `$or`. Dotted paths
//! descend into sub-documents and fan out over arrays of sub-documents; a
//! condition on an array field matches when any element satisfies it.

use super::types::{Document, SortOrder};
use crate::error::StoreError;

use regex::RegexBuilder;
use serde_json::Value;
use std::cmp::Ordering;

/// Resolves a dotted path. Traversing an array of sub-documents collects the
/// matching values into an array.
pub fn lookup_path(value: &Value, path: &str) -> Option<Value> {
    let segments: Vec<&str> = path.split('.').collect();
    lookup_segments(value, &segments)
}

fn lookup_segments(value: &Value, segments: &[&str]) -> Option<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(value.clone());
    };

    match value {
        Value::Object(map) => map.get(*head).and_then(|v| lookup_segments(v, rest)),
        Value::Array(items) => {
            let collected: Vec<Value> = items
                .iter()
                .filter(|item| item.is_object())
                .filter_map(|item| lookup_segments(item, segments))
                .collect();
            if collected.is_empty() {
                None
            } else {
                Some(Value::Array(collected))
            }
        }
        _ => None,
    }
}

/// Same as [`lookup_path`] but starting from a document.
pub fn lookup_field(doc: &Document, path: &str) -> Option<Value> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let value = doc.get(head)?;
    match rest {
        Some(rest) => lookup_path(value, rest),
        None => Some(value.clone()),
    }
}

/// The value itself plus, for arrays, each of its elements.
fn candidates(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => std::iter::once(value).chain(items.iter()).collect(),
        other => vec![other],
    }
}

/// Equality with numbers compared by value, so `1` equals `1.0`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering between values of the same kind; `None` across kinds.
fn compare_same_kind(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn kind_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

/// Total order used by sorts: missing and null first, then numbers, strings,
/// sub-documents, arrays, booleans.
pub fn total_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let by_kind = kind_rank(a).cmp(&kind_rank(b));
    if by_kind != Ordering::Equal {
        return by_kind;
    }
    match (a, b) {
        (Some(x), Some(y)) => compare_same_kind(x, y)
            .unwrap_or_else(|| x.to_string().cmp(&y.to_string())),
        _ => Ordering::Equal,
    }
}

pub fn sort_documents(docs: &mut [Document], keys: &[(String, SortOrder)]) {
    if keys.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        for (field, order) in keys {
            let left = lookup_field(a, field);
            let right = lookup_field(b, field);
            let ord = total_cmp(left.as_ref(), right.as_ref());
            let ord = match order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// Evaluates a filter document against `doc`.
pub fn matches(doc: &Document, filter: &Value) -> Result<bool, StoreError> {
    let clauses = match filter {
        Value::Null => return Ok(true),
        Value::Object(clauses) => clauses,
        other => return Err(StoreError::query(format!("filter must be an object, got {}", other))),
    };

    for (key, condition) in clauses {
        let ok = match key.as_str() {
            "$and" => all_match(doc, condition)?,
            "$or" => any_match(doc, condition)?,
            op if op.starts_with('$') => {
                return Err(StoreError::query(format!("unsupported top-level operator {}", op)));
            }
            path => field_matches(lookup_field(doc, path).as_ref(), condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn sub_filters(condition: &Value) -> Result<&Vec<Value>, StoreError> {
    condition
        .as_array()
        .ok_or_else(|| StoreError::query("$and/$or expect an array of filters"))
}

fn all_match(doc: &Document, condition: &Value) -> Result<bool, StoreError> {
    for filter in sub_filters(condition)? {
        if !matches(doc, filter)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn any_match(doc: &Document, condition: &Value) -> Result<bool, StoreError> {
    for filter in sub_filters(condition)? {
        if matches(doc, filter)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn is_operator_object(condition: &Value) -> bool {
    condition
        .as_object()
        .is_some_and(|map| !map.is_empty() && map.keys().all(|k| k.starts_with('$')))
}

fn field_matches(value: Option<&Value>, condition: &Value) -> Result<bool, StoreError> {
    if !is_operator_object(condition) {
        return Ok(equals_any(value, condition));
    }

    let ops = condition.as_object().into_iter().flatten();
    let options = condition
        .get("$options")
        .and_then(Value::as_str)
        .unwrap_or_default();

    for (op, operand) in ops {
        let ok = match op.as_str() {
            "$eq" => equals_any(value, operand),
            "$ne" => !equals_any(value, operand),
            "$in" => in_list(value, operand)?,
            "$nin" => !in_list(value, operand)?,
            "$lt" => compares(value, operand, |o| o == Ordering::Less),
            "$lte" => compares(value, operand, |o| o != Ordering::Greater),
            "$gt" => compares(value, operand, |o| o == Ordering::Greater),
            "$gte" => compares(value, operand, |o| o != Ordering::Less),
            "$exists" => value.is_some() == operand.as_bool().unwrap_or(true),
            "$regex" => regex_matches(value, operand, options)?,
            "$options" => true,
            other => return Err(StoreError::query(format!("unsupported operator {}", other))),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn equals_any(value: Option<&Value>, expected: &Value) -> bool {
    match value {
        Some(value) => candidates(value).into_iter().any(|c| values_equal(c, expected)),
        None => expected.is_null(),
    }
}

fn in_list(value: Option<&Value>, operand: &Value) -> Result<bool, StoreError> {
    let list = operand
        .as_array()
        .ok_or_else(|| StoreError::query("$in/$nin expect an array"))?;
    Ok(list.iter().any(|expected| equals_any(value, expected)))
}

fn compares(value: Option<&Value>, operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    let Some(value) = value else {
        return false;
    };
    candidates(value)
        .into_iter()
        .filter_map(|c| compare_same_kind(c, operand))
        .any(accept)
}

fn regex_matches(value: Option<&Value>, pattern: &Value, options: &str) -> Result<bool, StoreError> {
    let pattern = pattern
        .as_str()
        .ok_or_else(|| StoreError::query("$regex expects a string pattern"))?;
    let re = RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .build()
        .map_err(|e| StoreError::query(format!("bad $regex {:?}: {}", pattern, e)))?;

    let Some(value) = value else {
        return Ok(false);
    };
    Ok(candidates(value)
        .into_iter()
        .filter_map(Value::as_str)
        .any(|s| re.is_match(s)))
}

/// Keeps `_id` and the top-level segment of every projected path.
pub fn project(doc: Document, fields: &[String]) -> Document {
    doc.into_iter()
        .filter(|(key, _)| {
            key == super::types::ID_FIELD
                || fields
                    .iter()
                    .any(|f| f.split('.').next() == Some(key.as_str()))
        })
        .collect()
}
