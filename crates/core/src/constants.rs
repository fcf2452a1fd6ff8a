//! Constants used throughout the PTM core crate.
//!
//! Storage names, configuration defaults and the clinical thresholds used by the classifier
//! live here so they are defined exactly once.

/// Default directory for dataset and cache storage when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "ptm_data";

/// Directory name (under the data dir) for persisted statistics-cache year files.
pub const CACHE_DIR_NAME: &str = "cache";

/// Dataset filenames.
pub const FACILITIES_FILENAME: &str = "facilities.yaml";
pub const PATIENTS_FILENAME: &str = "patients.yaml";
pub const EXAMINATIONS_FILENAME: &str = "examinations.yaml";
pub const TARGETS_FILENAME: &str = "targets.yaml";

/// Number of facilities shown in the top and bottom dashboard slices.
pub const DEFAULT_HIGHLIGHT_COUNT: usize = 5;

/// Earliest and latest years accepted as a statistics scope.
pub const MIN_SCOPE_YEAR: i32 = 2000;
pub const MAX_SCOPE_YEAR: i32 = 2100;

/// Readings inside the controlled window needed by the history rule.
pub const CONTROLLED_READINGS_REQUIRED: usize = 3;

/// Blood pressure window (inclusive, mmHg) for a controlled HT reading.
pub const HT_CONTROLLED_SYSTOLIC: std::ops::RangeInclusive<u16> = 90..=139;
pub const HT_CONTROLLED_DIASTOLIC: std::ops::RangeInclusive<u16> = 60..=89;

/// Blood pressure window (inclusive, mmHg) for a single reading flagged as normal.
pub const HT_NORMAL_SYSTOLIC: std::ops::RangeInclusive<u16> = 120..=139;
pub const HT_NORMAL_DIASTOLIC: std::ops::RangeInclusive<u16> = 80..=89;

/// Upper bounds (exclusive) for a controlled/normal DM reading.
pub const DM_HBA1C_LIMIT: f64 = 7.0;
pub const DM_FASTING_GLUCOSE_LIMIT: f64 = 126.0;
pub const DM_POST_PRANDIAL_GLUCOSE_LIMIT: f64 = 200.0;
