//! # PTM Core
//!
//! Statistics engine for the hypertension (HT) and diabetes (DM) chronic-disease programmes.
//!
//! This crate contains the pure classification and aggregation logic plus the stores it reads
//! and the cache it maintains:
//! - **Classifier**: per-patient *standard* (continuous attendance) and *controlled* flags
//! - **Aggregator**: per facility/disease/year(/month) count tuples
//! - **Statistics cache**: materialised monthly rows, in memory or as sharded YAML files
//! - **Ranking**: achievement against yearly targets and facility ranking
//! - **Recompute jobs**: remainder-of-year invalidation after examination writes
//!
//! **No transport concerns**: argument parsing and output formatting belong in `ptm-cli` and
//! the runner.

pub mod aggregator;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod dataset;
pub mod error;
pub mod model;
pub mod percentage;
pub mod ranking;
pub mod recompute;
pub mod service;
pub mod store;
pub mod validation;

pub use aggregator::{Aggregator, Scope, ScopeStatistics, YearlyStatistics};
pub use cache::{CacheEntry, CacheKey, CacheStore, FileCacheStore, MemoryCacheStore};
pub use classifier::Classification;
pub use config::{
    resolve_from_env_values, AchievementBasis, ControlledRule, CoreConfig, EnvValues,
};
pub use dataset::Dataset;
pub use error::{StatsError, StatsResult};
pub use model::{
    BloodPressure, Examination, ExaminationId, Facility, FacilityId, GlucoseReading,
    Measurement, Patient, PatientId, YearlyTarget,
};
pub use ranking::{DiseaseAchievement, DiseaseFilter, FacilityRankRow, Ranking};
pub use recompute::{on_examination_written, RecomputeJob};
pub use service::{Dashboard, StatisticsService};
pub use store::{ExaminationStore, MemoryExaminationStore, MemoryTargetStore, TargetStore};

pub use ptm_types::{DiseaseType, DmExamKind, Gender, Month};
pub use ptm_uuid::ShardableUuid;
