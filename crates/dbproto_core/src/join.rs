//! Two-table equality joins.
//!
//! A merged row carries every field of the left record under a `t1.`
//! prefix and every field of the right record under `t2.`. Values
//! compare under the stored-value equality rules, so an integer key on
//! one side matches an integer key on the other regardless of how each
//! was written.

use crate::error::EngineResult;
use crate::table::{Row, Table, TableState};
use dbproto_codec::{Record, Value};
use tracing::debug;

/// Null-handling policy for a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// Emit only matched pairs.
    Inner,
    /// Also emit each unmatched left record alone.
    Left,
    /// Also emit each unmatched right record alone.
    Right,
    /// Both of the above.
    FullOuter,
}

/// Joins two tables on `t1.fields[key1] == t2.fields[key2]`.
///
/// Both tables' indexes are rebuilt from their files first, so the scan
/// sees exactly the persisted state. The left table's lock is taken
/// before the right one's; callers joining the same pair of tables
/// concurrently must pass them in a consistent order.
///
/// # Errors
///
/// Returns an error if either table cannot be re-read or a matched
/// record fails to decode.
pub fn join_tables(
    t1: &Table,
    t2: &Table,
    key1: &str,
    key2: &str,
    join_type: JoinType,
) -> EngineResult<Vec<Row>> {
    t1.reset_and_load_indexes()?;
    t2.reset_and_load_indexes()?;

    let s1 = t1.state.read();
    let s2 = t2.state.read();
    let left = bucket_records(&s1, key1);
    let right = bucket_records(&s2, key2);
    debug!(left = left.len(), right = right.len(), ?join_type, "joining tables");

    let mut results = Vec::new();
    let mut right_matched = vec![false; right.len()];

    for rec1 in &left {
        let mut matched = false;
        for (j, rec2) in right.iter().enumerate() {
            if values_match(rec1.fields.get(key1), rec2.fields.get(key2)) {
                results.push(merge_records(Some(rec1), Some(rec2))?);
                matched = true;
                right_matched[j] = true;
            }
        }
        if !matched && matches!(join_type, JoinType::Left | JoinType::FullOuter) {
            results.push(merge_records(Some(rec1), None)?);
        }
    }

    if matches!(join_type, JoinType::Right | JoinType::FullOuter) {
        for (j, rec2) in right.iter().enumerate() {
            if !right_matched[j] {
                results.push(merge_records(None, Some(rec2))?);
            }
        }
    }

    Ok(results)
}

/// Resolves a field's index bucket to its records.
fn bucket_records<'s>(state: &'s TableState, field: &str) -> Vec<&'s Record> {
    state
        .indexes
        .get(field)
        .map(|bucket| {
            bucket
                .iter()
                .filter_map(|key| state.records.get(key))
                .collect()
        })
        .unwrap_or_default()
}

fn values_match(a: Option<&Value>, b: Option<&Value>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

/// Builds the merged row, decoding stored values back to host scalars.
fn merge_records(rec1: Option<&Record>, rec2: Option<&Record>) -> EngineResult<Row> {
    let mut merged = Row::new();
    if let Some(record) = rec1 {
        for (field, value) in &record.fields {
            merged.insert(format!("t1.{field}"), value.decode()?);
        }
    }
    if let Some(record) = rec2 {
        for (field, value) in &record.fields {
            merged.insert(format!("t2.{field}"), value.decode()?);
        }
    }
    Ok(merged)
}
