//! Schema Store — table definitions and idempotent initialization.

use crate::error::StoreResult;
use rusqlite::Connection;
use tracing::debug;

/// Bumped whenever a table definition changes.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS queries (
    id          INTEGER PRIMARY KEY,
    query_path  TEXT NOT NULL UNIQUE,
    fingerprint TEXT
);

CREATE TABLE IF NOT EXISTS query_optimizer_configs (
    id                 INTEGER PRIMARY KEY,
    query_id           INTEGER NOT NULL REFERENCES queries (id) ON DELETE CASCADE,
    disabled_rules     TEXT    NOT NULL,
    num_disabled_rules INTEGER NOT NULL,
    plan               TEXT,
    hash               INTEGER NOT NULL,
    duplicated_plan    INTEGER NOT NULL DEFAULT 0,
    UNIQUE (query_id, disabled_rules)
);

CREATE TABLE IF NOT EXISTS measurements (
    id              INTEGER PRIMARY KEY,
    config_id       INTEGER NOT NULL REFERENCES query_optimizer_configs (id) ON DELETE CASCADE,
    walltime        REAL,
    cpu_time        REAL,
    running         REAL,
    finishing       REAL,
    machine         TEXT    NOT NULL,
    time            TEXT    NOT NULL,
    input_data_size INTEGER,
    nodes           INTEGER
);

CREATE INDEX IF NOT EXISTS measurements_config_idx ON measurements (config_id);

CREATE TABLE IF NOT EXISTS query_required_optimizers (
    query_id  INTEGER NOT NULL REFERENCES queries (id) ON DELETE CASCADE,
    optimizer TEXT    NOT NULL,
    UNIQUE (query_id, optimizer)
);

CREATE TABLE IF NOT EXISTS query_effective_optimizers (
    query_id  INTEGER NOT NULL REFERENCES queries (id) ON DELETE CASCADE,
    optimizer TEXT    NOT NULL,
    UNIQUE (query_id, optimizer)
);

CREATE TABLE IF NOT EXISTS query_effective_optimizers_dependencies (
    query_id            INTEGER NOT NULL REFERENCES queries (id) ON DELETE CASCADE,
    optimizer           TEXT    NOT NULL,
    dependent_optimizer TEXT    NOT NULL,
    UNIQUE (query_id, optimizer, dependent_optimizer)
);

CREATE TABLE IF NOT EXISTS query_required_rules (
    query_id INTEGER NOT NULL REFERENCES queries (id) ON DELETE CASCADE,
    rule     TEXT    NOT NULL,
    UNIQUE (query_id, rule)
);

CREATE TABLE IF NOT EXISTS query_effective_rules (
    query_id INTEGER NOT NULL REFERENCES queries (id) ON DELETE CASCADE,
    rule     TEXT    NOT NULL,
    UNIQUE (query_id, rule)
);
";

/// Tables created by [`initialize`], in creation order.
pub const TABLES: &[&str] = &[
    "queries",
    "query_optimizer_configs",
    "measurements",
    "query_required_optimizers",
    "query_effective_optimizers",
    "query_effective_optimizers_dependencies",
    "query_required_rules",
    "query_effective_rules",
];

/// Create every table that does not exist yet. Safe to run on each open.
pub fn initialize(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    debug!("schema initialized (version {})", SCHEMA_VERSION);
    Ok(())
}

/// User tables currently present, sorted by name.
pub fn table_names(conn: &Connection) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}
