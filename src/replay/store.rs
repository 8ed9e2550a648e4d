//! Historical telemetry store backed by SQLite.
//!
//! The schema itself belongs to the data-collection side; this layer only
//! needs a wide measurement table (`entity`, `read_ts`, one column per
//! channel) and a `context` annotation table. Identifiers are validated
//! before any SQL is assembled from them.

use std::path::Path;

use rusqlite::Connection;

use crate::error::{SimError, SimResult};
use crate::replay::row::{RowKind, StoredRow};
use crate::replay::series::{Sample, Series};
use crate::sim::clock::Clock;
use crate::sim::types::ContextRecord;

/// Rejects anything but `[A-Za-z_][A-Za-z0-9_]*`.
///
/// Channel and table names arrive from configuration, not from code, so
/// they must never reach SQL unchecked.
pub fn validate_identifier(name: &str) -> SimResult<()> {
    let mut chars = name.chars();
    let ok = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(SimError::UnsafeIdentifier(name.to_string()))
    }
}

/// Read-only access to one measurement table of a telemetry database.
///
/// Safe for sequential reuse across components; replay adapters share one
/// store behind an `Rc`.
pub struct MeasurementStore {
    conn: Connection,
    table: String,
}

impl MeasurementStore {
    /// Opens the database at `path`, reading from `table`.
    pub fn open(path: &Path, table: &str) -> SimResult<Self> {
        Self::from_connection(Connection::open(path)?, table)
    }

    /// Wraps an existing connection, e.g. an in-memory fixture database.
    pub fn from_connection(conn: Connection, table: &str) -> SimResult<Self> {
        validate_identifier(table)?;
        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }

    /// All samples for `channel`, anchored so the first row at or before
    /// `at_seconds` is included, ordered by time ascending.
    ///
    /// With no row at or before the anchor the series starts at the first
    /// later row instead.
    pub fn channel_series(&self, channel: &str, entity: i64, at_seconds: f64) -> SimResult<Series> {
        validate_identifier(channel)?;
        let sql = format!(
            "SELECT read_ts, {channel} FROM {table} \
             WHERE entity = :entity AND {channel} IS NOT NULL \
               AND read_ts >= COALESCE( \
                   (SELECT read_ts FROM {table} \
                     WHERE entity = :entity AND {channel} IS NOT NULL \
                       AND read_ts <= :ts \
                     ORDER BY read_ts DESC LIMIT 1), \
                   :ts) \
             ORDER BY read_ts",
            table = self.table,
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let samples = stmt
            .query_map(
                rusqlite::named_params! { ":entity": entity, ":ts": at_seconds },
                |row| {
                    Ok(Sample {
                        ts: row.get(0)?,
                        value: row.get(1)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Series::new(channel, samples))
    }

    /// The exact row at `ts`, or the nearest rows before and after it,
    /// each tagged with its provenance.
    pub fn rows_around(&self, entity: i64, ts: f64) -> SimResult<Vec<StoredRow>> {
        let sql = format!(
            "WITH exact AS ( \
               SELECT 'exact' AS kind, m.* FROM {table} m \
                WHERE m.entity = :entity AND m.read_ts = :ts), \
             prev AS ( \
               SELECT 'prev' AS kind, m.* FROM {table} m \
                WHERE m.entity = :entity AND m.read_ts < :ts \
                ORDER BY m.read_ts DESC LIMIT 1), \
             next AS ( \
               SELECT 'next' AS kind, m.* FROM {table} m \
                WHERE m.entity = :entity AND m.read_ts > :ts \
                ORDER BY m.read_ts ASC LIMIT 1) \
             SELECT * FROM exact \
             UNION ALL SELECT * FROM prev WHERE NOT EXISTS (SELECT 1 FROM exact) \
             UNION ALL SELECT * FROM next WHERE NOT EXISTS (SELECT 1 FROM exact)",
            table = self.table,
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let rows = stmt
            .query_map(
                rusqlite::named_params! { ":entity": entity, ":ts": ts },
                |row| {
                    let kind: String = row.get("kind")?;
                    let kind = match kind.as_str() {
                        "exact" => RowKind::Exact,
                        "prev" => RowKind::Prev,
                        _ => RowKind::Next,
                    };
                    let mut fields = std::collections::BTreeMap::new();
                    for (i, name) in columns.iter().enumerate() {
                        if matches!(name.as_str(), "kind" | "read_ts" | "entity") {
                            continue;
                        }
                        fields.insert(name.clone(), row.get_ref(i)?.into());
                    }
                    Ok(StoredRow {
                        kind,
                        read_ts: row.get("read_ts")?,
                        entity: row.get("entity")?,
                        fields,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// First and last measurement timestamps for `entity`, if any rows
    /// exist. The block resampler draws its windows from this range.
    pub fn time_bounds(&self, entity: i64) -> SimResult<Option<(f64, f64)>> {
        let sql = format!(
            "SELECT MIN(read_ts), MAX(read_ts) FROM {table} WHERE entity = :entity",
            table = self.table,
        );
        let bounds = self.conn.query_row(
            &sql,
            rusqlite::named_params! { ":entity": entity },
            |row| {
                let min: Option<f64> = row.get(0)?;
                let max: Option<f64> = row.get(1)?;
                Ok(min.zip(max))
            },
        )?;
        Ok(bounds)
    }

    /// Annotation records whose validity has not ended before `since`,
    /// filtered to sources at a matching location.
    ///
    /// Payloads parse as JSON where possible; other text is carried as a
    /// plain string value.
    pub fn context_records(&self, location: &str, since: &Clock) -> SimResult<Vec<ContextRecord>> {
        let res = since.resolution();
        let pattern = format!("%{location}%");
        let mut stmt = self.conn.prepare(
            "SELECT recorded, valid_from, valid_to, source, payload FROM context \
             WHERE valid_to >= :since AND location LIKE :location \
             ORDER BY valid_from",
        )?;
        let records = stmt
            .query_map(
                rusqlite::named_params! { ":since": since.to_seconds(), ":location": pattern },
                |row| {
                    let payload: String = row.get(4)?;
                    Ok(ContextRecord {
                        recorded_at: Clock::from_seconds(row.get(0)?, res),
                        valid_from: Clock::from_seconds(row.get(1)?, res),
                        valid_to: Clock::from_seconds(row.get(2)?, res),
                        source: row.get(3)?,
                        payload: serde_json::from_str(&payload)
                            .unwrap_or(serde_json::Value::String(payload)),
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
