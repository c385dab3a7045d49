//! Experience Extractor — train/test data for a learned cost model.
//!
//! Rows are per configuration (plan + median runtime), but the split is per
//! query: all plan variants of one query land on the same side, so a model is
//! never evaluated on a query it has already seen during training.

pub mod export;

use crate::configuration::{DisabledRules, decode_plan};
use crate::error::{StoreError, StoreResult};
use crate::storage::Store;
use rand::Rng;
use rand::seq::SliceRandom;
use rusqlite::params;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Default share of queries that go to the training set
pub const DEFAULT_TRAIN_RATIO: f64 = 0.8;

/// One configuration with its aggregated timings
#[derive(Debug, Clone, PartialEq)]
pub struct ExperienceRecord {
    pub path: String,
    pub query_id: i64,
    pub config_id: i64,
    pub disabled_rules: DisabledRules,
    pub num_disabled_rules: i64,
    pub plan: Value,
    /// Median runtime
    pub runtime: f64,
    /// Median CPU time, when the engine reports it
    pub cpu_time: Option<f64>,
}

/// Query-disjoint train/test split
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperienceSplit {
    pub train: Vec<ExperienceRecord>,
    pub test: Vec<ExperienceRecord>,
}

impl ExperienceSplit {
    pub fn train_queries(&self) -> BTreeSet<i64> {
        self.train.iter().map(|r| r.query_id).collect()
    }

    pub fn test_queries(&self) -> BTreeSet<i64> {
        self.test.iter().map(|r| r.query_id).collect()
    }
}

impl Store {
    /// Experience split with the thread-local RNG.
    pub fn experience(&self, benchmark: Option<&str>, train_ratio: f64) -> StoreResult<ExperienceSplit> {
        self.experience_with_rng(benchmark, train_ratio, &mut rand::thread_rng())
    }

    /// 학습/테스트 데이터 생성 (쿼리 단위 분할)
    ///
    /// Only configurations with a stored plan and at least one runtime sample
    /// take part. The first `floor(train_ratio * queries)` shuffled queries
    /// form the training set, the rest the test set.
    pub fn experience_with_rng<R: Rng + ?Sized>(
        &self,
        benchmark: Option<&str>,
        train_ratio: f64,
        rng: &mut R,
    ) -> StoreResult<ExperienceSplit> {
        if !(0.0..=1.0).contains(&train_ratio) {
            return Err(StoreError::InvalidArguments(format!(
                "train ratio must be within [0, 1], got {train_ratio}"
            )));
        }

        let mut by_query: BTreeMap<i64, Vec<ExperienceRecord>> = BTreeMap::new();
        for record in self.experience_records(benchmark)? {
            by_query.entry(record.query_id).or_default().push(record);
        }

        let mut keys: Vec<i64> = by_query.keys().copied().collect();
        keys.shuffle(rng);
        let split_index = (keys.len() as f64 * train_ratio).floor() as usize;
        let (train_keys, test_keys) = keys.split_at(split_index);

        let mut take = |keys: &[i64]| -> Vec<ExperienceRecord> {
            keys.iter()
                .filter_map(|k| by_query.remove(k))
                .flatten()
                .collect()
        };
        let train = take(train_keys);
        let test = take(test_keys);

        debug!(
            "experience split: {} train queries ({} rows), {} test queries ({} rows)",
            train_keys.len(),
            train.len(),
            test_keys.len(),
            test.len()
        );
        Ok(ExperienceSplit { train, test })
    }

    fn experience_records(&self, benchmark: Option<&str>) -> StoreResult<Vec<ExperienceRecord>> {
        let expr = self.config().runtime_convention.runtime_expr();
        let sql = format!(
            "SELECT q.query_path, c.query_id, c.id, c.disabled_rules, c.num_disabled_rules, c.plan,
                    median({expr}), median(m.cpu_time)
             FROM queries q
             JOIN query_optimizer_configs c ON c.query_id = q.id
             JOIN measurements m ON m.config_id = c.id
             WHERE c.plan IS NOT NULL AND (?1 IS NULL OR instr(q.query_path, ?1) > 0)
             GROUP BY c.id
             HAVING median({expr}) IS NOT NULL
             ORDER BY c.query_id, c.id"
        );

        let session = self.session();
        let mut stmt = session.prepare(&sql)?;
        let raws = stmt
            .query_map(params![benchmark], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, f64>(6)?,
                    row.get::<_, Option<f64>>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(raws.len());
        for (path, query_id, config_id, rules, num_disabled_rules, plan, runtime, cpu_time) in raws {
            let Some(plan) = decode_plan(plan)? else {
                continue;
            };
            records.push(ExperienceRecord {
                path,
                query_id,
                config_id,
                disabled_rules: DisabledRules::parse(&rules),
                num_disabled_rules,
                plan,
                runtime,
                cpu_time,
            });
        }
        Ok(records)
    }
}
