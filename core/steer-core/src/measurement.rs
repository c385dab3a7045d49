//! Measurement Log — append-only timing samples per configuration.
//!
//! Rows are never updated or deleted. Every sample is stamped with the host
//! that produced it and the time it was registered.

use crate::configuration::{DisabledRules, config_id};
use crate::error::StoreResult;
use crate::storage::Store;
use chrono::{SecondsFormat, Utc};
use rusqlite::params;
use tracing::info;

/// One timing sample as reported by the driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementSample {
    /// Elapsed wall time
    pub walltime: Option<f64>,
    pub cpu_time: Option<f64>,
    /// Running phase, for engines that split execution time
    pub running: Option<f64>,
    /// Finishing phase, for engines that split execution time
    pub finishing: Option<f64>,
    pub input_data_size: Option<i64>,
    pub nodes: Option<i64>,
}

impl MeasurementSample {
    pub fn walltime(walltime: f64) -> Self {
        Self {
            walltime: Some(walltime),
            ..Self::default()
        }
    }

    pub fn with_cpu_time(mut self, cpu_time: f64) -> Self {
        self.cpu_time = Some(cpu_time);
        self
    }

    pub fn with_phases(mut self, running: f64, finishing: f64) -> Self {
        self.running = Some(running);
        self.finishing = Some(finishing);
        self
    }

    pub fn with_input(mut self, input_data_size: i64, nodes: i64) -> Self {
        self.input_data_size = Some(input_data_size);
        self.nodes = Some(nodes);
        self
    }
}

/// A stored measurement
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    pub id: i64,
    pub config_id: i64,
    pub sample: MeasurementSample,
    pub machine: String,
    /// RFC 3339, UTC
    pub time: String,
}

/// Host name of this machine, `unknown` when it cannot be read
fn machine_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

impl Store {
    /// 측정값 등록 (wall time만 있는 경우)
    pub fn register_measurement(
        &self,
        path: &str,
        disabled_rules: &DisabledRules,
        walltime: f64,
        input_data_size: i64,
        nodes: i64,
    ) -> StoreResult<i64> {
        let sample = MeasurementSample::walltime(walltime).with_input(input_data_size, nodes);
        self.register_sample(path, disabled_rules, &sample)
    }

    /// Append a sample to the configuration's log and return its row id.
    ///
    /// Fails with `ConfigurationNotFound` when the configuration was not
    /// registered first.
    pub fn register_sample(
        &self,
        path: &str,
        disabled_rules: &DisabledRules,
        sample: &MeasurementSample,
    ) -> StoreResult<i64> {
        info!(
            "register a new measurement for query {} and the disabled rules [{}]",
            path, disabled_rules
        );
        let session = self.session();
        let config = config_id(&session, path, disabled_rules)?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        session.execute(
            "INSERT INTO measurements
                 (config_id, walltime, cpu_time, running, finishing, machine, time, input_data_size, nodes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                config,
                sample.walltime,
                sample.cpu_time,
                sample.running,
                sample.finishing,
                machine_name(),
                now,
                sample.input_data_size,
                sample.nodes
            ],
        )?;
        Ok(session.last_insert_rowid())
    }

    /// Whether the configuration already has at least one measurement.
    ///
    /// An unregistered configuration has none.
    pub fn has_existing_measurements(&self, path: &str, disabled_rules: &DisabledRules) -> StoreResult<bool> {
        let exists: bool = self.session().query_row(
            "SELECT EXISTS (
                 SELECT 1 FROM measurements m
                 JOIN query_optimizer_configs c ON c.id = m.config_id
                 JOIN queries q ON q.id = c.query_id
                 WHERE q.query_path = ?1 AND c.disabled_rules = ?2)",
            params![path, disabled_rules.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Measurements of one configuration in registration order
    pub fn measurements(&self, path: &str, disabled_rules: &DisabledRules) -> StoreResult<Vec<MeasurementRecord>> {
        let session = self.session();
        let mut stmt = session.prepare(
            "SELECT m.id, m.config_id, m.walltime, m.cpu_time, m.running, m.finishing,
                    m.input_data_size, m.nodes, m.machine, m.time
             FROM measurements m
             JOIN query_optimizer_configs c ON c.id = m.config_id
             JOIN queries q ON q.id = c.query_id
             WHERE q.query_path = ?1 AND c.disabled_rules = ?2
             ORDER BY m.id",
        )?;
        let records = stmt
            .query_map(params![path, disabled_rules.as_str()], |row| {
                Ok(MeasurementRecord {
                    id: row.get(0)?,
                    config_id: row.get(1)?,
                    sample: MeasurementSample {
                        walltime: row.get(2)?,
                        cpu_time: row.get(3)?,
                        running: row.get(4)?,
                        finishing: row.get(5)?,
                        input_data_size: row.get(6)?,
                        nodes: row.get(7)?,
                    },
                    machine: row.get(8)?,
                    time: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    fn store_with_config(path: &str, rules: &DisabledRules) -> Store {
        let store = Store::open_in_memory().unwrap();
        store.register_query(path).unwrap();
        store.register_configuration(path, rules, None, 1).unwrap();
        store
    }

    #[test]
    fn test_has_existing_measurements() {
        let rules = DisabledRules::parse("JoinReorder");
        let store = store_with_config("tpch/q09.sql", &rules);

        assert!(!store.has_existing_measurements("tpch/q09.sql", &rules).unwrap());
        store
            .register_measurement("tpch/q09.sql", &rules, 120.0, 1_000, 4)
            .unwrap();
        assert!(store.has_existing_measurements("tpch/q09.sql", &rules).unwrap());
        assert!(
            !store
                .has_existing_measurements("tpch/q09.sql", &DisabledRules::baseline())
                .unwrap()
        );
    }

    #[test]
    fn test_measurements_append() {
        let rules = DisabledRules::baseline();
        let store = store_with_config("tpch/q09.sql", &rules);

        for walltime in [10.0, 20.0, 30.0] {
            store
                .register_measurement("tpch/q09.sql", &rules, walltime, 100, 1)
                .unwrap();
        }
        let sample = MeasurementSample::walltime(40.0)
            .with_cpu_time(35.0)
            .with_phases(30.0, 10.0);
        store.register_sample("tpch/q09.sql", &rules, &sample).unwrap();

        let records = store.measurements("tpch/q09.sql", &rules).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].sample.walltime, Some(10.0));
        assert_eq!(records[0].sample.input_data_size, Some(100));
        assert_eq!(records[3].sample, sample);
        assert!(!records[3].machine.is_empty());
        assert!(records[3].time.ends_with('Z'));
    }

    #[test]
    fn test_missing_configuration_propagates() {
        let store = Store::open_in_memory().unwrap();
        store.register_query("tpch/q09.sql").unwrap();

        let result = store.register_measurement("tpch/q09.sql", &DisabledRules::parse("r1"), 1.0, 0, 0);
        assert!(matches!(result, Err(StoreError::ConfigurationNotFound { .. })));
        assert!(
            store
                .measurements("tpch/q09.sql", &DisabledRules::parse("r1"))
                .unwrap()
                .is_empty()
        );
    }
}
