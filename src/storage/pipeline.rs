//! Aggregation pipeline evaluation for the in-memory store.
//!
//! Stages: `$match`, `$unwind`, `$group` (`$sum`, `$first`, `$push`),
//! `$sort`, `$project`, `$lookup`, `$limit`, `$skip`.

use super::query::{lookup_field, matches, sort_documents, values_equal};
use super::types::{Document, ID_FIELD, SortOrder};
use crate::error::StoreError;

use serde_json::{Map, Number, Value};
use std::collections::HashMap;

/// Resolves the `from` collection of a `$lookup` stage.
pub type CollectionSource<'a> = dyn Fn(&str) -> Vec<Document> + Send + Sync + 'a;

pub fn run_pipeline(
    mut docs: Vec<Document>,
    pipeline: &[Value],
    source: &CollectionSource<'_>,
) -> Result<Vec<Document>, StoreError> {
    for stage in pipeline {
        let (name, spec) = single_entry(stage)?;
        docs = match name {
            "$match" => {
                let mut kept = Vec::with_capacity(docs.len());
                for doc in docs {
                    if matches(&doc, spec)? {
                        kept.push(doc);
                    }
                }
                kept
            }
            "$unwind" => unwind(docs, spec)?,
            "$group" => group(docs, spec)?,
            "$sort" => {
                let keys = sort_keys(spec)?;
                sort_documents(&mut docs, &keys);
                docs
            }
            "$project" => project(docs, spec)?,
            "$lookup" => lookup(docs, spec, source)?,
            "$limit" => {
                docs.truncate(count_operand(name, spec)?);
                docs
            }
            "$skip" => docs.into_iter().skip(count_operand(name, spec)?).collect(),
            other => return Err(StoreError::query(format!("unsupported stage {}", other))),
        };
    }
    Ok(docs)
}

fn single_entry(stage: &Value) -> Result<(&str, &Value), StoreError> {
    let entry = stage
        .as_object()
        .filter(|map| map.len() == 1)
        .and_then(|map| map.iter().next());
    match entry {
        Some((name, spec)) => Ok((name.as_str(), spec)),
        None => Err(StoreError::query(format!(
            "pipeline stage must have exactly one key: {}",
            stage
        ))),
    }
}

fn count_operand(stage: &str, spec: &Value) -> Result<usize, StoreError> {
    spec.as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| StoreError::query(format!("{} expects a non-negative integer", stage)))
}

fn field_ref(expr: &Value) -> Option<&str> {
    expr.as_str().and_then(|s| s.strip_prefix('$'))
}

/// Evaluates an expression: `"$$ROOT"`, `"$path"`, a sub-document of
/// expressions, or a literal.
fn eval(doc: &Document, expr: &Value) -> Value {
    match expr {
        Value::String(s) if s == "$$ROOT" => Value::Object(doc.clone()),
        Value::String(s) if s.starts_with('$') => {
            lookup_field(doc, &s[1..]).unwrap_or(Value::Null)
        }
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), eval(doc, v)))
                .collect(),
        ),
        literal => literal.clone(),
    }
}

fn unwind(docs: Vec<Document>, spec: &Value) -> Result<Vec<Document>, StoreError> {
    let (path, preserve) = match spec {
        Value::Object(options) => (
            options.get("path").and_then(field_ref),
            options
                .get("preserveNullAndEmptyArrays")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        ),
        other => (field_ref(other), false),
    };
    let path = path.ok_or_else(|| StoreError::query("$unwind expects a \"$field\" path"))?;

    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        match lookup_field(&doc, path) {
            Some(Value::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut copy = doc.clone();
                    set_path(&mut copy, path, item);
                    out.push(copy);
                }
            }
            Some(Value::Array(_)) | Some(Value::Null) | None => {
                if preserve {
                    out.push(doc);
                }
            }
            Some(_) => out.push(doc),
        }
    }
    Ok(out)
}

fn set_path(doc: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(child) = child {
                set_path(child, rest, value);
            }
        }
    }
}

enum Accumulator {
    Sum { expr: Value, total: f64, integral: bool },
    First { expr: Value, value: Option<Value> },
    Push { expr: Value, values: Vec<Value> },
}

impl Accumulator {
    fn parse(name: &str, spec: &Value) -> Result<Self, StoreError> {
        let (op, expr) = single_entry(spec)
            .map_err(|_| StoreError::query(format!("accumulator {} must have one operator", name)))?;
        let expr = expr.clone();
        match op {
            "$sum" => Ok(Self::Sum { expr, total: 0.0, integral: true }),
            "$first" => Ok(Self::First { expr, value: None }),
            "$push" => Ok(Self::Push { expr, values: Vec::new() }),
            other => Err(StoreError::query(format!("unsupported accumulator {}", other))),
        }
    }

    fn feed(&mut self, doc: &Document) {
        match self {
            Self::Sum { expr, total, integral } => {
                // non-numeric values (missing fields, arrays) are ignored
                if let Value::Number(n) = eval(doc, expr) {
                    *integral &= n.is_i64() || n.is_u64();
                    *total += n.as_f64().unwrap_or(0.0);
                }
            }
            Self::First { expr, value } => {
                if value.is_none() {
                    *value = Some(eval(doc, expr));
                }
            }
            Self::Push { expr, values } => values.push(eval(doc, expr)),
        }
    }

    fn finish(self) -> Value {
        match self {
            Self::Sum { total, integral, .. } => {
                if integral && total.fract() == 0.0 && total.abs() < i64::MAX as f64 {
                    Value::from(total as i64)
                } else {
                    Number::from_f64(total).map(Value::Number).unwrap_or(Value::Null)
                }
            }
            Self::First { value, .. } => value.unwrap_or(Value::Null),
            Self::Push { values, .. } => Value::Array(values),
        }
    }
}

fn group(docs: Vec<Document>, spec: &Value) -> Result<Vec<Document>, StoreError> {
    let spec = spec
        .as_object()
        .ok_or_else(|| StoreError::query("$group expects an object"))?;
    let key_expr = spec
        .get(ID_FIELD)
        .ok_or_else(|| StoreError::query("$group requires an _id expression"))?;

    // groups keep first-seen order
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(Value, Vec<(String, Accumulator)>)> = Vec::new();

    for doc in &docs {
        let key = eval(doc, key_expr);
        let slot = match index.get(&key.to_string()) {
            Some(&slot) => slot,
            None => {
                let mut accumulators = Vec::new();
                for (name, acc_spec) in spec.iter().filter(|(k, _)| k.as_str() != ID_FIELD) {
                    accumulators.push((name.clone(), Accumulator::parse(name, acc_spec)?));
                }
                index.insert(key.to_string(), groups.len());
                groups.push((key, accumulators));
                groups.len() - 1
            }
        };
        for (_, acc) in groups[slot].1.iter_mut() {
            acc.feed(doc);
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, accumulators)| {
            let mut row = Document::new();
            row.insert(ID_FIELD.to_string(), key);
            for (name, acc) in accumulators {
                row.insert(name, acc.finish());
            }
            row
        })
        .collect())
}

fn sort_keys(spec: &Value) -> Result<Vec<(String, SortOrder)>, StoreError> {
    let spec = spec
        .as_object()
        .ok_or_else(|| StoreError::query("$sort expects an object"))?;
    spec.iter()
        .map(|(field, dir)| match dir.as_i64() {
            Some(1) => Ok((field.clone(), SortOrder::Ascending)),
            Some(-1) => Ok((field.clone(), SortOrder::Descending)),
            _ => Err(StoreError::query(format!("$sort direction for {} must be 1 or -1", field))),
        })
        .collect()
}

fn is_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }
}

fn project(docs: Vec<Document>, spec: &Value) -> Result<Vec<Document>, StoreError> {
    let spec = spec
        .as_object()
        .ok_or_else(|| StoreError::query("$project expects an object"))?;

    let inclusion = spec
        .iter()
        .any(|(k, v)| k != ID_FIELD && is_flag(v) != Some(false));

    Ok(docs
        .into_iter()
        .map(|doc| {
            if !inclusion {
                return doc
                    .into_iter()
                    .filter(|(k, _)| spec.get(k).and_then(is_flag) != Some(false))
                    .collect();
            }

            let mut out = Document::new();
            let keep_id = spec.get(ID_FIELD).and_then(is_flag) != Some(false);
            if keep_id && let Some(id) = doc.get(ID_FIELD) {
                out.insert(ID_FIELD.to_string(), id.clone());
            }
            for (key, value) in spec {
                match is_flag(value) {
                    Some(false) => {}
                    Some(true) => {
                        if let Some(found) = lookup_field(&doc, key) {
                            out.insert(key.clone(), found);
                        }
                    }
                    None => {
                        out.insert(key.clone(), eval(&doc, value));
                    }
                }
            }
            out
        })
        .collect())
}

fn lookup(
    docs: Vec<Document>,
    spec: &Value,
    source: &CollectionSource<'_>,
) -> Result<Vec<Document>, StoreError> {
    let field = |name: &str| {
        spec.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::query(format!("$lookup requires '{}'", name)))
    };
    let from = field("from")?;
    let local_field = field("localField")?;
    let foreign_field = field("foreignField")?;
    let as_field = field("as")?;

    let foreign = source(from);

    Ok(docs
        .into_iter()
        .map(|mut doc| {
            let local = lookup_field(&doc, local_field).unwrap_or(Value::Null);
            let local_values = match &local {
                Value::Array(items) => items.clone(),
                other => vec![other.clone()],
            };
            let joined: Vec<Value> = foreign
                .iter()
                .filter(|candidate| {
                    let theirs = lookup_field(candidate, foreign_field).unwrap_or(Value::Null);
                    local_values.iter().any(|mine| values_equal(mine, &theirs))
                })
                .map(|candidate| Value::Object(candidate.clone()))
                .collect();
            doc.insert(as_field.to_string(), Value::Array(joined));
            doc
        })
        .collect())
}
