//! Configuration Store — one variant per (query, disabled rule set).
//!
//! Registering a configuration also answers whether its plan is a structural
//! duplicate: another rule set of the same query already produced the same
//! plan hash, so disabling these rules had no effect of its own.

use crate::error::{StoreError, StoreResult};
use crate::registry::query_id;
use crate::storage::{InsertOutcome, Store};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::debug;

/// Encoding of the baseline rule set (nothing disabled)
pub const BASELINE_RULES: &str = "None";

/// A disabled rule set in its stored textual encoding.
///
/// Rules are comma separated in the order the driver disabled them. The empty
/// set is the baseline and is encoded as [`BASELINE_RULES`]; `none` in any
/// letter case parses to the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisabledRules(String);

impl DisabledRules {
    pub fn baseline() -> Self {
        DisabledRules(BASELINE_RULES.to_string())
    }

    pub fn parse(encoding: &str) -> Self {
        let trimmed = encoding.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(BASELINE_RULES) {
            Self::baseline()
        } else {
            DisabledRules(trimmed.to_string())
        }
    }

    pub fn from_rules<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = rules
            .into_iter()
            .map(|r| r.as_ref().trim().to_string())
            .filter(|r| !r.is_empty())
            .collect::<Vec<_>>()
            .join(",");
        Self::parse(&joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_baseline(&self) -> bool {
        self.0 == BASELINE_RULES
    }

    /// Number of disabled rules, 0 for the baseline
    pub fn count(&self) -> i64 {
        if self.is_baseline() {
            0
        } else {
            self.0.matches(',').count() as i64 + 1
        }
    }

    pub fn rules(&self) -> Vec<&str> {
        if self.is_baseline() {
            Vec::new()
        } else {
            self.0.split(',').collect()
        }
    }
}

impl fmt::Display for DisabledRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DisabledRules {
    fn from(encoding: &str) -> Self {
        Self::parse(encoding)
    }
}

/// Structural hash of a plan.
///
/// SHA-256 over the compact JSON encoding with object keys sorted, truncated
/// to 8 bytes. Equal trees hash equally regardless of the key order they were
/// built with.
pub fn plan_hash(plan: &Value) -> StoreResult<i64> {
    let bytes = serde_json::to_vec(&canonical(plan))?;
    let digest = Sha256::digest(&bytes);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    Ok(i64::from_be_bytes(head))
}

// serde_json may be built with `preserve_order`; rebuild maps in key order
fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonical(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

pub(crate) fn decode_plan(text: Option<String>) -> StoreResult<Option<Value>> {
    text.map(|t| serde_json::from_str(&t)).transpose().map_err(StoreError::from)
}

/// A stored configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationRecord {
    pub id: i64,
    pub query_id: i64,
    pub disabled_rules: DisabledRules,
    pub num_disabled_rules: i64,
    pub plan: Option<Value>,
    pub plan_hash: i64,
    pub duplicated_plan: bool,
}

const SELECT_CONFIGURATION: &str = "
    SELECT c.id, c.query_id, c.disabled_rules, c.num_disabled_rules, c.plan, c.hash, c.duplicated_plan
    FROM query_optimizer_configs c JOIN queries q ON q.id = c.query_id
    WHERE q.query_path = ?1";

type RawConfiguration = (i64, i64, String, i64, Option<String>, i64, bool);

fn raw_configuration(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawConfiguration> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn into_record(raw: RawConfiguration) -> StoreResult<ConfigurationRecord> {
    let (id, query_id, disabled_rules, num_disabled_rules, plan, plan_hash, duplicated_plan) = raw;
    Ok(ConfigurationRecord {
        id,
        query_id,
        disabled_rules: DisabledRules(disabled_rules),
        num_disabled_rules,
        plan: decode_plan(plan)?,
        plan_hash,
        duplicated_plan,
    })
}

/// Resolve a configuration id, failing when it was never registered.
pub(crate) fn config_id(conn: &Connection, path: &str, rules: &DisabledRules) -> StoreResult<i64> {
    conn.query_row(
        "SELECT c.id FROM query_optimizer_configs c JOIN queries q ON q.id = c.query_id
         WHERE q.query_path = ?1 AND c.disabled_rules = ?2",
        params![path, rules.as_str()],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| StoreError::ConfigurationNotFound {
        path: path.to_string(),
        disabled_rules: rules.to_string(),
    })
}

impl Store {
    /// 쿼리 옵티마이저 구성 저장
    ///
    /// Returns whether the plan duplicates one produced by a *different* rule
    /// set of the same query. Re-registering an existing (query, rules) pair
    /// leaves the stored row untouched and reports the duplicate state as of
    /// now.
    pub fn register_configuration(
        &self,
        path: &str,
        disabled_rules: &DisabledRules,
        plan: Option<&Value>,
        plan_hash: i64,
    ) -> StoreResult<bool> {
        let session = self.session();
        let id = query_id(&session, path)?;

        let others: i64 = session.query_row(
            "SELECT count(*) FROM query_optimizer_configs
             WHERE query_id = ?1 AND hash = ?2 AND disabled_rules != ?3",
            params![id, plan_hash, disabled_rules.as_str()],
            |row| row.get(0),
        )?;
        let is_duplicate = others > 0;

        let plan_json = plan.map(serde_json::to_string).transpose()?;
        let outcome = session.insert_if_absent(
            "INSERT INTO query_optimizer_configs
                 (query_id, disabled_rules, num_disabled_rules, plan, hash, duplicated_plan)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                disabled_rules.as_str(),
                disabled_rules.count(),
                plan_json,
                plan_hash,
                is_duplicate
            ],
        )?;

        if outcome == InsertOutcome::Rejected {
            return Err(StoreError::ConstraintViolation(format!(
                "configuration [{disabled_rules}] for '{path}' rejected"
            )));
        }

        debug!(
            "register configuration [{}] for {}: {:?}, duplicate={}",
            disabled_rules, path, outcome, is_duplicate
        );
        Ok(is_duplicate)
    }

    pub fn configuration(
        &self,
        path: &str,
        disabled_rules: &DisabledRules,
    ) -> StoreResult<Option<ConfigurationRecord>> {
        let sql = format!("{SELECT_CONFIGURATION} AND c.disabled_rules = ?2");
        let raw = self
            .session()
            .query_row(&sql, params![path, disabled_rules.as_str()], raw_configuration)
            .optional()?;
        raw.map(into_record).transpose()
    }

    /// All configurations of a query in registration order
    pub fn configurations(&self, path: &str) -> StoreResult<Vec<ConfigurationRecord>> {
        let sql = format!("{SELECT_CONFIGURATION} ORDER BY c.id");
        let session = self.session();
        let mut stmt = session.prepare(&sql)?;
        let raws = stmt
            .query_map([path], raw_configuration)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(into_record).collect()
    }
}
