//! Optimizer Usage Tracker
//!
//! Records which optimizers and rules matter for a query. Each category is a
//! closed enum variant mapped to its own static statements, so no table name
//! is ever built from caller input.

use crate::error::StoreResult;
use crate::registry::query_id;
use crate::storage::{InsertOutcome, Store};
use rusqlite::params;
use tracing::debug;

/// Usage category of an optimizer or rule for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageCategory {
    /// Must stay enabled for the query to run at all
    Required,
    /// Changes the plan when disabled
    Effective,
}

impl UsageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageCategory::Required => "required",
            UsageCategory::Effective => "effective",
        }
    }

    fn insert_optimizer_sql(&self) -> &'static str {
        match self {
            UsageCategory::Required => {
                "INSERT INTO query_required_optimizers (query_id, optimizer) VALUES (?1, ?2)"
            }
            UsageCategory::Effective => {
                "INSERT INTO query_effective_optimizers (query_id, optimizer) VALUES (?1, ?2)"
            }
        }
    }

    fn select_optimizers_sql(&self) -> &'static str {
        match self {
            UsageCategory::Required => {
                "SELECT o.optimizer FROM queries q JOIN query_required_optimizers o ON o.query_id = q.id
                 WHERE q.query_path = ?1 AND o.optimizer != '' ORDER BY o.rowid"
            }
            UsageCategory::Effective => {
                "SELECT o.optimizer FROM queries q JOIN query_effective_optimizers o ON o.query_id = q.id
                 WHERE q.query_path = ?1 AND o.optimizer != '' ORDER BY o.rowid"
            }
        }
    }

    fn insert_rule_sql(&self) -> &'static str {
        match self {
            UsageCategory::Required => {
                "INSERT INTO query_required_rules (query_id, rule) VALUES (?1, ?2)"
            }
            UsageCategory::Effective => {
                "INSERT INTO query_effective_rules (query_id, rule) VALUES (?1, ?2)"
            }
        }
    }

    fn select_rules_sql(&self) -> &'static str {
        match self {
            UsageCategory::Required => {
                "SELECT r.rule FROM queries q JOIN query_required_rules r ON r.query_id = q.id
                 WHERE q.query_path = ?1 AND r.rule != '' ORDER BY r.rowid"
            }
            UsageCategory::Effective => {
                "SELECT r.rule FROM queries q JOIN query_effective_rules r ON r.query_id = q.id
                 WHERE q.query_path = ?1 AND r.rule != '' ORDER BY r.rowid"
            }
        }
    }
}

/// An effective optimizer together with the optimizer it depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizerDependency {
    pub optimizer: String,
    pub dependent_optimizer: String,
}

impl Store {
    /// 쿼리에 옵티마이저 사용 정보 등록 (중복은 무시)
    pub fn register_optimizer(
        &self,
        path: &str,
        category: UsageCategory,
        optimizer: &str,
    ) -> StoreResult<InsertOutcome> {
        let session = self.session();
        let id = query_id(&session, path)?;
        let outcome = session.insert_if_absent(category.insert_optimizer_sql(), params![id, optimizer])?;
        debug!(
            "register {} optimizer {} for {}: {:?}",
            category.as_str(),
            optimizer,
            path,
            outcome
        );
        Ok(outcome)
    }

    /// Record that `optimizer` is effective for the query only together with `dependency`.
    pub fn register_optimizer_dependency(
        &self,
        path: &str,
        optimizer: &str,
        dependency: &str,
    ) -> StoreResult<InsertOutcome> {
        let session = self.session();
        let id = query_id(&session, path)?;
        let outcome = session.insert_if_absent(
            "INSERT INTO query_effective_optimizers_dependencies (query_id, optimizer, dependent_optimizer)
             VALUES (?1, ?2, ?3)",
            params![id, optimizer, dependency],
        )?;
        debug!(
            "register optimizer dependency {} -> {} for {}: {:?}",
            optimizer, dependency, path, outcome
        );
        Ok(outcome)
    }

    pub fn register_rule(
        &self,
        path: &str,
        category: UsageCategory,
        rule: &str,
    ) -> StoreResult<InsertOutcome> {
        let session = self.session();
        let id = query_id(&session, path)?;
        let outcome = session.insert_if_absent(category.insert_rule_sql(), params![id, rule])?;
        debug!(
            "register {} rule {} for {}: {:?}",
            category.as_str(),
            rule,
            path,
            outcome
        );
        Ok(outcome)
    }

    pub fn required_optimizers(&self, path: &str) -> StoreResult<Vec<String>> {
        self.optimizers(path, UsageCategory::Required)
    }

    pub fn effective_optimizers(&self, path: &str) -> StoreResult<Vec<String>> {
        self.optimizers(path, UsageCategory::Effective)
    }

    /// Optimizers of one category in registration order, empty names skipped
    pub fn optimizers(&self, path: &str, category: UsageCategory) -> StoreResult<Vec<String>> {
        self.select_names(category.select_optimizers_sql(), path)
    }

    pub fn effective_optimizer_dependencies(&self, path: &str) -> StoreResult<Vec<OptimizerDependency>> {
        let session = self.session();
        let mut stmt = session.prepare(
            "SELECT d.optimizer, d.dependent_optimizer
             FROM queries q JOIN query_effective_optimizers_dependencies d ON d.query_id = q.id
             WHERE q.query_path = ?1 AND d.optimizer != ''
             ORDER BY d.rowid",
        )?;
        let deps = stmt
            .query_map([path], |row| {
                Ok(OptimizerDependency {
                    optimizer: row.get(0)?,
                    dependent_optimizer: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(deps)
    }

    pub fn rules(&self, path: &str, category: UsageCategory) -> StoreResult<Vec<String>> {
        self.select_names(category.select_rules_sql(), path)
    }

    fn select_names(&self, sql: &'static str, path: &str) -> StoreResult<Vec<String>> {
        let session = self.session();
        let mut stmt = session.prepare(sql)?;
        let names = stmt
            .query_map([path], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }
}
