//! # steer-core — Optimizer Exploration Result Store
//!
//! steer-core는 옵티마이저 규칙 탐색 실험의 결과를 저장하고 분석합니다.
//! 각 벤치마크 쿼리를 서로 다른 규칙 집합을 끈 상태로 여러 번 실행하고,
//! 그 실행 계획과 측정값을 SQLite 스토어에 기록합니다.
//!
//! ## 주요 특징
//!
//! - **중복 없는 등록**: 모든 등록은 insert-if-absent ([`InsertOutcome`])
//! - **중복 계획 탐지**: 다른 규칙 집합이 같은 plan hash를 만들면 표시
//! - **중앙값 집계**: SQL `MEDIAN` 집계 함수로 노이즈에 강한 런타임 통계
//! - **베이스라인 대비 순위**: dense rank로 쿼리별 최적의 대안 구성 선택
//! - **쿼리 단위 분할**: 학습/테스트 데이터 사이에 쿼리가 새지 않음
//!
//! ## 빠른 시작
//!
//! ```rust
//! use steer_core::{DisabledRules, Store, StoreConfig};
//! use serde_json::json;
//!
//! # fn main() -> steer_core::StoreResult<()> {
//! let store = Store::open(StoreConfig::in_memory())?;
//! store.register_query("tpch/q01.sql")?;
//!
//! let baseline = DisabledRules::baseline();
//! let plan = json!({"op": "HashAggregate"});
//! store.register_configuration("tpch/q01.sql", &baseline, Some(&plan), 1)?;
//! store.register_measurement("tpch/q01.sql", &baseline, 120.0, 1_000, 1)?;
//!
//! let alternative = DisabledRules::parse("PushDownFilter");
//! store.register_configuration("tpch/q01.sql", &alternative, Some(&plan), 2)?;
//! store.register_measurement("tpch/q01.sql", &alternative, 90.0, 1_000, 1)?;
//!
//! let best = store.best_alternative_configuration(None)?;
//! assert_eq!(best[0].disabled_rules, alternative);
//! # Ok(())
//! # }
//! ```
//!
//! ## 모듈 구조
//!
//! - [`storage`] — 스토어 핸들, 세션, 스키마, MEDIAN 집계
//! - [`registry`] — 쿼리와 fingerprint
//! - [`usage`] — 쿼리별 옵티마이저/규칙 사용 정보
//! - [`configuration`] — 규칙 집합별 구성과 중복 계획 탐지
//! - [`measurement`] — 측정값 로그
//! - [`aggregation`] — 구성별 런타임 중앙값
//! - [`ranking`] — 최적의 대안 구성
//! - [`experience`] — 학습 데이터 추출 및 Parquet 내보내기

pub mod aggregation;
pub mod config;
pub mod configuration;
pub mod error;
pub mod experience;
pub mod measurement;
pub mod ranking;
pub mod registry;
pub mod stats;
pub mod storage;
pub mod usage;

// Logging utilities
pub mod logging;

pub use aggregation::MedianRuntime;
pub use config::{RuntimeConvention, StoreConfig, StoreLocation};
pub use configuration::{ConfigurationRecord, DisabledRules, plan_hash};
pub use error::{StoreError, StoreResult};
pub use experience::{ExperienceRecord, ExperienceSplit};
pub use measurement::{MeasurementRecord, MeasurementSample};
pub use ranking::BestAlternative;
pub use registry::{FingerprintStatus, QueryRecord};
pub use storage::{InsertOutcome, Session, Store};
pub use usage::{OptimizerDependency, UsageCategory};
