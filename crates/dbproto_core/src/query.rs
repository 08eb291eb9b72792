//! Query planning and execution.
//!
//! The planner picks, among the filter fields, the index bucket with
//! the lowest selectivity (`bucket length / record count`); anything at
//! or above 1.0 loses to a full scan. The executor filters, sorts,
//! then applies offset and limit.

use crate::error::EngineResult;
use crate::table::{Row, Table, TableState};
use dbproto_codec::{Record, Value};
use std::cmp::Ordering;
use tracing::debug;

/// A query over one table.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Exact-equality constraints, all of which must match.
    pub filters: Row,
    /// Field to sort by (numeric projection); primary-key order when
    /// unset.
    pub sort_by: Option<String>,
    /// Maximum number of records to return; zero means no limit.
    pub limit: usize,
    /// Number of records to skip.
    pub offset: usize,
}

/// The plan the executor will follow for a [`Query`].
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Index bucket to scan, or `None` for a full scan.
    pub index_to_use: Option<String>,
    /// Field to sort by.
    pub sort_by: Option<String>,
    /// Maximum number of records to return; zero means no limit.
    pub limit: usize,
    /// Number of records to skip.
    pub offset: usize,
}

impl Table {
    /// Computes the execution plan for a query without running it.
    pub fn plan(&self, query: &Query) -> ExecutionPlan {
        let state = self.state.read();
        ExecutionPlan {
            index_to_use: Self::select_best_index(&state, query),
            sort_by: query.sort_by.clone(),
            limit: query.limit,
            offset: query.offset,
        }
    }

    /// Plans and executes a query.
    ///
    /// Sort order: with `sort_by`, ascending by that field's numeric
    /// projection; records without one come after all numeric records,
    /// ordered by primary-key string (ties too). Without `sort_by`,
    /// ascending by primary-key string.
    ///
    /// # Errors
    ///
    /// Returns an error if a matched record fails to decode.
    pub fn query(&self, query: &Query) -> EngineResult<Vec<Row>> {
        let state = self.state.read();
        let index = Self::select_best_index(&state, query);
        debug!(index = ?index, filters = query.filters.len(), "executing query");

        let filters: Vec<(&String, Value)> = query
            .filters
            .iter()
            .map(|(field, value)| (field, value.encode()))
            .collect();

        let mut matches: Vec<(&String, &Record)> = Vec::new();
        if let Some(field) = &index {
            self.metrics().record_index_lookup();
            if let Some(bucket) = state.indexes.get(field) {
                for key in bucket {
                    if let Some(record) = state.records.get(key) {
                        if matches_filters(record, &filters) {
                            matches.push((key, record));
                        }
                    }
                }
            }
        } else {
            self.metrics().record_full_scan();
            for (key, record) in &state.records {
                if matches_filters(record, &filters) {
                    matches.push((key, record));
                }
            }
        }

        match &query.sort_by {
            Some(field) => matches.sort_by(|(key_a, a), (key_b, b)| {
                let na = numeric_projection(a.fields.get(field.as_str()));
                let nb = numeric_projection(b.fields.get(field.as_str()));
                match (na, nb) {
                    (Some(x), Some(y)) => x
                        .partial_cmp(&y)
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| key_a.cmp(key_b)),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => key_a.cmp(key_b),
                }
            }),
            None => matches.sort_by(|(key_a, _), (key_b, _)| key_a.cmp(key_b)),
        }

        if query.offset > 0 {
            if query.offset >= matches.len() {
                return Ok(Vec::new());
            }
            matches.drain(..query.offset);
        }
        if query.limit > 0 && query.limit < matches.len() {
            matches.truncate(query.limit);
        }

        self.metrics().record_query();
        matches
            .into_iter()
            .map(|(_, record)| Ok(record.to_scalars()?))
            .collect()
    }

    /// Picks the filter field with the lowest selectivity, if any beats
    /// a full scan.
    fn select_best_index(state: &TableState, query: &Query) -> Option<String> {
        let total = state.records.len();
        if total == 0 {
            return None;
        }

        let mut best_field = None;
        let mut best_selectivity = 1.0f64;
        for field in query.filters.keys() {
            if let Some(bucket) = state.indexes.get(field) {
                let selectivity = bucket.len() as f64 / total as f64;
                if selectivity < best_selectivity {
                    best_selectivity = selectivity;
                    best_field = Some(field.clone());
                }
            }
        }
        best_field
    }
}

fn matches_filters(record: &Record, filters: &[(&String, Value)]) -> bool {
    filters
        .iter()
        .all(|(field, value)| record.fields.get(field.as_str()) == Some(value))
}

/// Numeric projection of a stored value: a wire number, or a `num:`
/// string parsed back to its integer.
fn numeric_projection(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => Some(*n),
        Value::Text(s) => s.strip_prefix("num:")?.parse::<i64>().ok().map(|n| n as f64),
        Value::Bool(_) => None,
    }
}
