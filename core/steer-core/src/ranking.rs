//! Ranking Engine — best alternative rule set per query.
//!
//! Every non-baseline configuration is compared with its query's baseline
//! median; configurations are dense-ranked by savings and only the top rank
//! is reported. Baselines at or above the configured ceiling are considered
//! unreliable and their queries are not ranked at all.

use crate::configuration::{BASELINE_RULES, DisabledRules};
use crate::error::StoreResult;
use crate::storage::Store;
use rusqlite::params;
use tracing::info;

/// Best alternative configuration of a query
#[derive(Debug, Clone, PartialEq)]
pub struct BestAlternative {
    pub path: String,
    pub num_disabled_rules: i64,
    /// Median runtime of the alternative
    pub runtime: f64,
    /// Median runtime of the baseline
    pub runtime_baseline: f64,
    /// `(runtime_baseline - runtime) / runtime_baseline`
    pub savings: f64,
    pub disabled_rules: DisabledRules,
    /// Dense rank within the query, always 1 in results
    pub rank: i64,
}

impl Store {
    /// 쿼리별 최적의 대안 구성
    ///
    /// `benchmark` restricts the result to paths containing that substring.
    /// Ties share rank 1 and are all returned. Results are ordered by savings,
    /// best first.
    pub fn best_alternative_configuration(&self, benchmark: Option<&str>) -> StoreResult<Vec<BestAlternative>> {
        let convention = self.config().runtime_convention;
        info!(
            "rank alternative configurations using the {} runtime convention",
            convention.as_str()
        );

        let expr = convention.runtime_expr();
        let sql = format!(
            "WITH per_config AS (
                 SELECT q.query_path AS query_path,
                        c.num_disabled_rules AS num_disabled_rules,
                        c.disabled_rules AS disabled_rules,
                        median({expr}) AS runtime
                 FROM queries q
                 JOIN query_optimizer_configs c ON c.query_id = q.id
                 JOIN measurements m ON m.config_id = c.id
                 GROUP BY c.id
             ),
             baselines AS (
                 SELECT query_path, runtime AS runtime_baseline
                 FROM per_config
                 WHERE disabled_rules = ?1 AND num_disabled_rules = 0
                   AND runtime > 0 AND runtime < ?2
             ),
             ranked AS (
                 SELECT p.query_path, p.num_disabled_rules, p.runtime, b.runtime_baseline,
                        (b.runtime_baseline - p.runtime) / b.runtime_baseline AS savings,
                        p.disabled_rules,
                        DENSE_RANK() OVER (
                            PARTITION BY p.query_path
                            ORDER BY (b.runtime_baseline - p.runtime) / b.runtime_baseline DESC
                        ) AS ranking
                 FROM per_config p
                 JOIN baselines b ON b.query_path = p.query_path
                 WHERE p.num_disabled_rules > 0 AND p.runtime IS NOT NULL
             )
             SELECT query_path, num_disabled_rules, runtime, runtime_baseline, savings, disabled_rules, ranking
             FROM ranked
             WHERE ranking = 1 AND (?3 IS NULL OR instr(query_path, ?3) > 0)
             ORDER BY savings DESC, query_path, disabled_rules"
        );

        let session = self.session();
        let mut stmt = session.prepare(&sql)?;
        let results = stmt
            .query_map(
                params![BASELINE_RULES, self.config().baseline_ceiling, benchmark],
                |row| {
                    Ok(BestAlternative {
                        path: row.get(0)?,
                        num_disabled_rules: row.get(1)?,
                        runtime: row.get(2)?,
                        runtime_baseline: row.get(3)?,
                        savings: row.get(4)?,
                        disabled_rules: DisabledRules::parse(&row.get::<_, String>(5)?),
                        rank: row.get(6)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(results)
    }
}
