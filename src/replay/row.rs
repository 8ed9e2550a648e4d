//! Whole-row interpolation over raw measurement rows.
//!
//! The rowwise replay variant fetches the exact row at a timestamp, or the
//! nearest rows on either side, and materializes one row at the query time
//! by interpolating every numeric field with a shared fractional weight.

use std::collections::BTreeMap;

use rusqlite::types::Value;

use crate::error::{SimError, SimResult};

/// Provenance of a stored row relative to a query timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Exact,
    Prev,
    Next,
}

/// One raw measurement row with its provenance tag.
///
/// `read_ts` and the entity key are held apart from `fields` so they are
/// never interpolated.
#[derive(Debug, Clone)]
pub struct StoredRow {
    pub kind: RowKind,
    pub read_ts: f64,
    pub entity: i64,
    pub fields: BTreeMap<String, Value>,
}

/// A measurement row materialized at a query timestamp.
#[derive(Debug, Clone)]
pub struct RowAt {
    pub read_ts: f64,
    pub entity: i64,
    fields: BTreeMap<String, Value>,
}

impl RowAt {
    /// Numeric field accessor.
    ///
    /// # Errors
    ///
    /// [`SimError::BadColumn`] when the column is absent or non-numeric.
    pub fn number(&self, column: &str) -> SimResult<f64> {
        match self.fields.get(column) {
            Some(Value::Real(v)) => Ok(*v),
            Some(Value::Integer(v)) => Ok(*v as f64),
            _ => Err(SimError::BadColumn(column.to_string())),
        }
    }

    /// Raw field accessor for non-numeric columns.
    pub fn field(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }
}

fn passthrough(row: &StoredRow) -> RowAt {
    RowAt {
        read_ts: row.read_ts,
        entity: row.entity,
        fields: row.fields.clone(),
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Real(v) => Some(*v),
        Value::Integer(v) => Some(*v as f64),
        _ => None,
    }
}

/// Materializes one row at `ts` from a `rows_around` result set.
///
/// An exact row wins outright. A prev/next pair interpolates each numeric
/// field at the shared fractional position; non-numeric fields pass through
/// from the earlier row. A lone row on either side passes through verbatim.
///
/// # Errors
///
/// [`SimError::NoData`] when `rows` is empty.
pub fn interpolate_row(rows: &[StoredRow], ts: f64) -> SimResult<RowAt> {
    if let Some(exact) = rows.iter().find(|r| r.kind == RowKind::Exact) {
        return Ok(passthrough(exact));
    }

    let prev = rows.iter().find(|r| r.kind == RowKind::Prev);
    let next = rows.iter().find(|r| r.kind == RowKind::Next);

    match (prev, next) {
        (Some(prev), Some(next)) => {
            if next.read_ts == prev.read_ts {
                return Ok(passthrough(prev));
            }
            let alpha = (ts - prev.read_ts) / (next.read_ts - prev.read_ts);
            let fields = prev
                .fields
                .iter()
                .map(|(key, before)| {
                    let value = match (as_f64(before), next.fields.get(key).and_then(as_f64)) {
                        (Some(v0), Some(v1)) => Value::Real(v0 + alpha * (v1 - v0)),
                        _ => before.clone(),
                    };
                    (key.clone(), value)
                })
                .collect();
            Ok(RowAt {
                read_ts: ts,
                entity: prev.entity,
                fields,
            })
        }
        (Some(single), None) | (None, Some(single)) => Ok(passthrough(single)),
        (None, None) => Err(SimError::NoData("measurements".to_string())),
    }
}
