//! Aggregation Engine — median runtime per configuration.

use crate::configuration::{DisabledRules, decode_plan};
use crate::error::StoreResult;
use crate::storage::Store;
use serde_json::Value;

/// Median runtime of one configuration
#[derive(Debug, Clone, PartialEq)]
pub struct MedianRuntime {
    pub path: String,
    pub num_disabled_rules: i64,
    pub disabled_rules: DisabledRules,
    pub plan: Option<Value>,
    pub runtime: f64,
}

impl Store {
    /// 구성별 런타임 중앙값
    ///
    /// Groups every configuration that has measurements and takes the median
    /// of the runtime expression selected by the configured
    /// [`RuntimeConvention`](crate::config::RuntimeConvention). Configurations
    /// whose samples carry no value for that expression are left out.
    pub fn median_runtimes(&self) -> StoreResult<Vec<MedianRuntime>> {
        let expr = self.config().runtime_convention.runtime_expr();
        let sql = format!(
            "SELECT q.query_path, c.num_disabled_rules, c.disabled_rules, c.plan, median({expr})
             FROM queries q
             JOIN query_optimizer_configs c ON c.query_id = q.id
             JOIN measurements m ON m.config_id = c.id
             GROUP BY q.query_path, c.num_disabled_rules, c.disabled_rules, c.plan
             HAVING median({expr}) IS NOT NULL
             ORDER BY q.query_path, c.num_disabled_rules, c.disabled_rules"
        );

        let session = self.session();
        let mut stmt = session.prepare(&sql)?;
        let raws = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raws.into_iter()
            .map(|(path, num_disabled_rules, rules, plan, runtime)| {
                Ok(MedianRuntime {
                    path,
                    num_disabled_rules,
                    disabled_rules: DisabledRules::parse(&rules),
                    plan: decode_plan(plan)?,
                    runtime,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RuntimeConvention, StoreConfig};
    use crate::measurement::MeasurementSample;
    use serde_json::json;

    #[test]
    fn test_median_of_three() {
        let store = Store::open_in_memory().unwrap();
        let rules = DisabledRules::baseline();
        store.register_query("tpch/q10.sql").unwrap();
        store
            .register_configuration("tpch/q10.sql", &rules, Some(&json!({"op": "Scan"})), 1)
            .unwrap();
        for walltime in [30.0, 10.0, 20.0] {
            store
                .register_measurement("tpch/q10.sql", &rules, walltime, 0, 0)
                .unwrap();
        }

        let medians = store.median_runtimes().unwrap();
        assert_eq!(medians.len(), 1);
        assert_eq!(medians[0].runtime, 20.0);
        assert_eq!(medians[0].num_disabled_rules, 0);
        assert_eq!(medians[0].plan, Some(json!({"op": "Scan"})));

        // one outlier moves the median by at most one position
        store
            .register_measurement("tpch/q10.sql", &rules, 1000.0, 0, 0)
            .unwrap();
        let medians = store.median_runtimes().unwrap();
        assert_eq!(medians[0].runtime, 25.0);
    }

    #[test]
    fn test_configurations_without_measurements_are_skipped() {
        let store = Store::open_in_memory().unwrap();
        store.register_query("tpch/q10.sql").unwrap();
        store
            .register_configuration("tpch/q10.sql", &DisabledRules::parse("r1"), None, 1)
            .unwrap();

        assert!(store.median_runtimes().unwrap().is_empty());
    }

    #[test]
    fn test_running_finishing_convention() {
        let store = Store::open(
            StoreConfig::in_memory().with_runtime_convention(RuntimeConvention::RunningFinishing),
        )
        .unwrap();
        let rules = DisabledRules::parse("JoinReorder");
        store.register_query("tpcds/q3.sql").unwrap();
        store
            .register_configuration("tpcds/q3.sql", &rules, None, 3)
            .unwrap();

        for (running, finishing) in [(10.0, 1.0), (20.0, 2.0), (30.0, 3.0)] {
            let sample = MeasurementSample::walltime(999.0).with_phases(running, finishing);
            store.register_sample("tpcds/q3.sql", &rules, &sample).unwrap();
        }

        let medians = store.median_runtimes().unwrap();
        assert_eq!(medians.len(), 1);
        assert_eq!(medians[0].runtime, 22.0);
        assert_eq!(medians[0].plan, None);
    }
}
