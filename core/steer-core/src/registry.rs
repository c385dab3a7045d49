//! Query Registry — distinct benchmark queries by path.
//!
//! A query's fingerprint is content-addressing: once set it never changes, and
//! later registrations either match it or report a conflict.

use crate::error::{StoreError, StoreResult};
use crate::storage::{InsertOutcome, Store};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, warn};

/// Outcome of a fingerprint registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintStatus {
    /// Fingerprint stored now, or identical to the stored one
    Accepted,
    /// A different fingerprint is already stored; it was left untouched
    Conflict,
}

impl FingerprintStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, FingerprintStatus::Accepted)
    }
}

/// A registered query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRecord {
    pub id: i64,
    pub path: String,
    pub fingerprint: Option<String>,
}

/// Resolve a query id, failing when the path was never registered.
pub(crate) fn query_id(conn: &Connection, path: &str) -> StoreResult<i64> {
    conn.query_row(
        "SELECT id FROM queries WHERE query_path = ?1",
        [path],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| StoreError::QueryNotFound(path.to_string()))
}

impl Store {
    /// 쿼리 등록 (이미 있으면 아무 것도 하지 않음)
    pub fn register_query(&self, path: &str) -> StoreResult<InsertOutcome> {
        let outcome = self.session().insert_if_absent(
            "INSERT INTO queries (query_path, fingerprint) VALUES (?1, NULL)",
            [path],
        )?;
        debug!("register query {}: {:?}", path, outcome);
        Ok(outcome)
    }

    /// Register the result fingerprint of a query.
    ///
    /// The first fingerprint is stored. Afterwards an equal fingerprint is
    /// accepted and a different one reports [`FingerprintStatus::Conflict`]
    /// without touching the stored value; the caller decides whether to abort
    /// or re-baseline.
    pub fn register_fingerprint(&self, path: &str, fingerprint: &str) -> StoreResult<FingerprintStatus> {
        let session = self.session();
        let stored: Option<String> = session
            .query_row(
                "SELECT fingerprint FROM queries WHERE query_path = ?1",
                [path],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StoreError::QueryNotFound(path.to_string()))?;

        match stored {
            None => {
                // fingerprint IS NULL guard keeps the first writer's value
                session.execute(
                    "UPDATE queries SET fingerprint = ?1 WHERE query_path = ?2 AND fingerprint IS NULL",
                    params![fingerprint, path],
                )?;
                debug!("fingerprint set for {}", path);
                Ok(FingerprintStatus::Accepted)
            }
            Some(existing) if existing == fingerprint => Ok(FingerprintStatus::Accepted),
            Some(existing) => {
                warn!(
                    "fingerprint mismatch for {}: stored {}, got {}",
                    path, existing, fingerprint
                );
                Ok(FingerprintStatus::Conflict)
            }
        }
    }

    pub fn query(&self, path: &str) -> StoreResult<Option<QueryRecord>> {
        let record = self
            .session()
            .query_row(
                "SELECT id, query_path, fingerprint FROM queries WHERE query_path = ?1",
                [path],
                |row| {
                    Ok(QueryRecord {
                        id: row.get(0)?,
                        path: row.get(1)?,
                        fingerprint: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// All registered queries in registration order
    pub fn queries(&self) -> StoreResult<Vec<QueryRecord>> {
        let session = self.session();
        let mut stmt = session.prepare("SELECT id, query_path, fingerprint FROM queries ORDER BY id")?;
        let records = stmt
            .query_map([], |row| {
                Ok(QueryRecord {
                    id: row.get(0)?,
                    path: row.get(1)?,
                    fingerprint: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
