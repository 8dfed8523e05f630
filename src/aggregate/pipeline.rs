use super::types::{GroupBy, SumBy};
use crate::days::CollectionRef;
use crate::error::Result;
use crate::storage::types::ID_FIELD;

use serde_json::{Value, json};

/// Summed value of a group row.
pub const VALUE_FIELD: &str = "value";
/// Joined posts of a self-relation group row.
pub const DOC_FIELD: &str = "doc";

/// Builds the per-collection group/sum pipeline:
/// `$match` → `$unwind` (array keys) → `$group` → `$lookup` (self-relations,
/// when docs are wanted) → `$sort` by value descending.
pub fn build_pipeline(
    collection: CollectionRef,
    predicate: Value,
    group_by: GroupBy,
    sum_by: SumBy,
    include_docs: bool,
) -> Result<Vec<Value>> {
    let accumulator = sum_by.accumulator(group_by)?;

    let mut pipeline = vec![json!({"$match": predicate})];
    if let Some(path) = group_by.unwind_path() {
        pipeline.push(json!({"$unwind": format!("${}", path)}));
    }
    pipeline.push(json!({
        "$group": {
            ID_FIELD: format!("${}", group_by.field_path()),
            VALUE_FIELD: {"$sum": accumulator},
        }
    }));
    if include_docs && group_by.is_self_relation() {
        pipeline.push(json!({
            "$lookup": {
                "from": collection.name(),
                "localField": ID_FIELD,
                "foreignField": ID_FIELD,
                "as": DOC_FIELD,
            }
        }));
    }
    pipeline.push(json!({"$sort": {VALUE_FIELD: -1}}));

    Ok(pipeline)
}
