//! Storage module — the persistent store behind every registration and read.
//!
//! A [`Store`] is opened once by the experiment driver and passed to every
//! operation. Each operation takes a [`Session`] for the duration of exactly
//! one call; dropping the session releases the connection on every exit path.
//!
//! # Contract
//!
//! - All statements are static SQL with bound parameters.
//! - Duplicate suppression goes through [`Session::insert_if_absent`], which
//!   reports [`InsertOutcome`] instead of failing.
//! - Ordering violations (missing parent rows) surface as errors.

pub mod median;
pub mod schema;
pub mod tabular;

use crate::config::{StoreConfig, StoreLocation};
use crate::error::StoreResult;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, ErrorCode, Params, ffi};
use std::ops::Deref;
use tracing::{debug, info, instrument, warn};

/// Result of an insert-if-absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was written
    Inserted,
    /// A row with the same unique key already exists
    AlreadyPresent,
    /// The store refused the row (foreign key, NOT NULL, CHECK, or an
    /// `INSERT ... SELECT` whose source matched nothing)
    Rejected,
}

impl InsertOutcome {
    /// `Inserted` or `AlreadyPresent`
    pub fn is_stored(&self) -> bool {
        !matches!(self, InsertOutcome::Rejected)
    }
}

/// Experiment result store
///
/// # 예제
///
/// ```rust
/// use steer_core::{Store, StoreConfig};
///
/// # fn main() -> steer_core::StoreResult<()> {
/// let store = Store::open(StoreConfig::in_memory())?;
/// store.register_query("tpch/q01.sql")?;
/// store.close()?;
/// # Ok(())
/// # }
/// ```
pub struct Store {
    conn: Mutex<Connection>,
    config: StoreConfig,
}

/// Connection borrowed for a single store call.
pub struct Session<'a> {
    conn: MutexGuard<'a, Connection>,
}

impl Store {
    /// 스토어를 열거나 생성합니다.
    ///
    /// MEDIAN 집계 함수를 등록하고, 외래 키를 활성화한 뒤 스키마를 초기화합니다.
    /// 실패하면 실험을 계속할 수 없으므로 에러를 그대로 반환합니다.
    #[instrument(skip(config), fields(location = ?config.location))]
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;

        let conn = match &config.location {
            StoreLocation::InMemory => Connection::open_in_memory()?,
            StoreLocation::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                Connection::open(path)?
            }
        };

        median::register(&conn)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::initialize(&conn)?;

        info!(
            "store opened (ceiling={}, convention={})",
            config.baseline_ceiling,
            config.runtime_convention.as_str()
        );
        Ok(Self {
            conn: Mutex::new(conn),
            config,
        })
    }

    /// In-memory store with default configuration
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open(StoreConfig::in_memory())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Borrow the connection for one call.
    pub fn session(&self) -> Session<'_> {
        Session {
            conn: self.conn.lock(),
        }
    }

    /// Close the underlying connection, reporting any close failure.
    pub fn close(self) -> StoreResult<()> {
        let conn = self.conn.into_inner();
        conn.close().map_err(|(_, err)| err)?;
        info!("store closed");
        Ok(())
    }
}

impl Session<'_> {
    /// Run an INSERT and classify the outcome instead of failing on
    /// constraint conflicts.
    pub fn insert_if_absent<P: Params>(&self, sql: &str, params: P) -> StoreResult<InsertOutcome> {
        match self.conn.execute(sql, params) {
            Ok(0) => Ok(InsertOutcome::Rejected),
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(rusqlite::Error::SqliteFailure(err, msg))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                match err.extended_code {
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        debug!("insert skipped, row already present");
                        Ok(InsertOutcome::AlreadyPresent)
                    }
                    _ => {
                        warn!("insert rejected: {}", msg.as_deref().unwrap_or("constraint"));
                        Ok(InsertOutcome::Rejected)
                    }
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Deref for Session<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_initializes_schema() {
        let store = Store::open_in_memory().unwrap();
        let names = schema::table_names(&store.session()).unwrap();
        assert!(names.contains(&"queries".to_string()));
        assert!(names.contains(&"measurements".to_string()));
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let result = Store::open(StoreConfig::in_memory().with_baseline_ceiling(0.0));
        assert!(result.is_err());
    }

    #[test]
    fn test_insert_if_absent_tri_state() {
        let store = Store::open_in_memory().unwrap();
        let session = store.session();

        let first = session
            .insert_if_absent("INSERT INTO queries (query_path) VALUES (?1)", ["q1.sql"])
            .unwrap();
        let second = session
            .insert_if_absent("INSERT INTO queries (query_path) VALUES (?1)", ["q1.sql"])
            .unwrap();
        // query 999 does not exist: foreign key rejects the row
        let orphan = session
            .insert_if_absent(
                "INSERT INTO query_required_optimizers (query_id, optimizer) VALUES (999, ?1)",
                ["JoinReorder"],
            )
            .unwrap();

        assert_eq!(first, InsertOutcome::Inserted);
        assert_eq!(second, InsertOutcome::AlreadyPresent);
        assert_eq!(orphan, InsertOutcome::Rejected);
        assert!(second.is_stored());
        assert!(!orphan.is_stored());
    }

    #[test]
    fn test_insert_select_matching_nothing_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        let outcome = store
            .session()
            .insert_if_absent(
                "INSERT INTO query_required_optimizers (query_id, optimizer)
                 SELECT id, ?1 FROM queries WHERE query_path = ?2",
                ["JoinReorder", "missing.sql"],
            )
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Rejected);
    }

    #[test]
    fn test_non_constraint_errors_propagate() {
        let store = Store::open_in_memory().unwrap();
        let result = store
            .session()
            .insert_if_absent("INSERT INTO no_such_table VALUES (1)", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_session_released_after_error() {
        let store = Store::open_in_memory().unwrap();
        let _ = store
            .session()
            .insert_if_absent("INSERT INTO no_such_table VALUES (1)", []);
        // lock would deadlock here if the failed session leaked
        let count: i64 = store
            .session()
            .query_row("SELECT count(*) FROM queries", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_close() {
        let store = Store::open_in_memory().unwrap();
        store.close().unwrap();
    }
}
