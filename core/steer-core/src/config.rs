//! Store configuration
//!
//! The baseline ceiling and the runtime convention differ between the engines
//! an experiment targets, so both are configuration rather than constants.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default ceiling for baseline medians; slower baselines are not ranked.
pub const DEFAULT_BASELINE_CEILING: f64 = 1_000_000_000.0;

pub const ENV_DB_PATH: &str = "STEER_DB_PATH";
pub const ENV_BASELINE_CEILING: &str = "STEER_BASELINE_CEILING";
pub const ENV_RUNTIME_CONVENTION: &str = "STEER_RUNTIME_CONVENTION";

/// How a measurement's runtime is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeConvention {
    /// Single elapsed wall time field
    #[default]
    Elapsed,
    /// Engine reports running and finishing phases separately
    RunningFinishing,
}

impl RuntimeConvention {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeConvention::Elapsed => "elapsed",
            RuntimeConvention::RunningFinishing => "running_finishing",
        }
    }

    pub fn parse_convention(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "elapsed" => Some(RuntimeConvention::Elapsed),
            "running_finishing" | "running+finishing" => Some(RuntimeConvention::RunningFinishing),
            _ => None,
        }
    }

    /// SQL expression over the `measurements m` alias.
    pub(crate) fn runtime_expr(&self) -> &'static str {
        match self {
            RuntimeConvention::Elapsed => "m.walltime",
            RuntimeConvention::RunningFinishing => "(m.running + m.finishing)",
        }
    }
}

/// Where the store lives.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreLocation {
    #[default]
    InMemory,
    File(PathBuf),
}

/// Store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub location: StoreLocation,

    /// Queries whose baseline median is not below this value are excluded from ranking
    pub baseline_ceiling: f64,

    pub runtime_convention: RuntimeConvention,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            location: StoreLocation::InMemory,
            baseline_ceiling: DEFAULT_BASELINE_CEILING,
            runtime_convention: RuntimeConvention::Elapsed,
        }
    }
}

impl StoreConfig {
    /// In-memory store with default thresholds
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// File-backed store with default thresholds
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: StoreLocation::File(path.into()),
            ..Self::default()
        }
    }

    pub fn with_baseline_ceiling(mut self, ceiling: f64) -> Self {
        self.baseline_ceiling = ceiling;
        self
    }

    pub fn with_runtime_convention(mut self, convention: RuntimeConvention) -> Self {
        self.runtime_convention = convention;
        self
    }

    /// 환경 변수에서 설정 로드
    ///
    /// 설정되지 않은 변수는 기본값을 사용합니다.
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (environment, test maps, ...)
    pub fn from_lookup<F>(lookup: F) -> StoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_DB_PATH).filter(|p| !p.trim().is_empty()) {
            config.location = StoreLocation::File(PathBuf::from(path));
        }

        if let Some(raw) = lookup(ENV_BASELINE_CEILING) {
            config.baseline_ceiling = raw.trim().parse::<f64>().map_err(|e| {
                StoreError::Config(format!("{ENV_BASELINE_CEILING}='{raw}': {e}"))
            })?;
        }

        if let Some(raw) = lookup(ENV_RUNTIME_CONVENTION) {
            config.runtime_convention = RuntimeConvention::parse_convention(&raw).ok_or_else(
                || StoreError::Config(format!("{ENV_RUNTIME_CONVENTION}='{raw}' is not a runtime convention")),
            )?;
        }

        config.validate()?;
        Ok(config)
    }

    /// JSON 파일에서 설정 로드
    pub fn from_json_file(path: &Path) -> StoreResult<Self> {
        let json = fs::read_to_string(path)?;
        let config: StoreConfig = serde_json::from_str(&json)
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> StoreResult<()> {
        if !self.baseline_ceiling.is_finite() || self.baseline_ceiling <= 0.0 {
            return Err(StoreError::Config(format!(
                "baseline ceiling must be a positive finite number, got {}",
                self.baseline_ceiling
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.location, StoreLocation::InMemory);
        assert_eq!(config.baseline_ceiling, DEFAULT_BASELINE_CEILING);
        assert_eq!(config.runtime_convention, RuntimeConvention::Elapsed);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = StoreConfig::from_lookup(lookup_from(&[
            (ENV_DB_PATH, "/tmp/presto.sqlite"),
            (ENV_BASELINE_CEILING, "5000"),
            (ENV_RUNTIME_CONVENTION, "running_finishing"),
        ]))
        .unwrap();

        assert_eq!(
            config.location,
            StoreLocation::File(PathBuf::from("/tmp/presto.sqlite"))
        );
        assert_eq!(config.baseline_ceiling, 5000.0);
        assert_eq!(config.runtime_convention, RuntimeConvention::RunningFinishing);
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let bad_ceiling = StoreConfig::from_lookup(lookup_from(&[(ENV_BASELINE_CEILING, "fast")]));
        assert!(matches!(bad_ceiling, Err(StoreError::Config(_))));

        let negative = StoreConfig::from_lookup(lookup_from(&[(ENV_BASELINE_CEILING, "-1")]));
        assert!(matches!(negative, Err(StoreError::Config(_))));

        let bad_convention =
            StoreConfig::from_lookup(lookup_from(&[(ENV_RUNTIME_CONVENTION, "cpu")]));
        assert!(matches!(bad_convention, Err(StoreError::Config(_))));
    }

    #[test]
    fn test_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("steer.json");
        fs::write(
            &path,
            r#"{"location": {"file": "results/postgres.sqlite"}, "runtime_convention": "elapsed", "baseline_ceiling": 120000.0}"#,
        )
        .unwrap();

        let config = StoreConfig::from_json_file(&path).unwrap();
        assert_eq!(
            config.location,
            StoreLocation::File(PathBuf::from("results/postgres.sqlite"))
        );
        assert_eq!(config.baseline_ceiling, 120000.0);
    }

    #[test]
    fn test_json_file_partial_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("steer.json");
        fs::write(&path, r#"{"runtime_convention": "running_finishing"}"#).unwrap();

        let config = StoreConfig::from_json_file(&path).unwrap();
        assert_eq!(config.location, StoreLocation::InMemory);
        assert_eq!(config.baseline_ceiling, DEFAULT_BASELINE_CEILING);
        assert_eq!(config.runtime_convention, RuntimeConvention::RunningFinishing);
    }

    #[test]
    fn test_convention_parse_roundtrip() {
        for convention in [RuntimeConvention::Elapsed, RuntimeConvention::RunningFinishing] {
            assert_eq!(
                RuntimeConvention::parse_convention(convention.as_str()),
                Some(convention)
            );
        }
    }
}
