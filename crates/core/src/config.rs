//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Request handling never reads process-wide environment variables,
//! which keeps behaviour consistent across threads and test harnesses.

use crate::constants::{CACHE_DIR_NAME, DEFAULT_DATA_DIR, DEFAULT_HIGHLIGHT_COUNT};
use crate::validation::validate_scope_year;
use crate::{StatsError, StatsResult};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which "controlled" definition is published as a patient's `is_controlled` flag.
///
/// Both variants are always computed and reported side by side; this only picks the one
/// aggregated into `controlled_count`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlledRule {
    /// HT: at least three readings inside the controlled window. DM: any HbA1c < 7, or three
    /// fasting readings < 126, or three post-prandial readings < 200.
    #[default]
    History,
    /// Only the most recent qualifying reading is considered.
    Latest,
}

/// Numerator used when turning a facility's counts into an achievement percentage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementBasis {
    /// `standard_count / target`.
    #[default]
    StandardCount,
    /// `total_count / target`.
    TotalPatients,
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    controlled_rule: ControlledRule,
    achievement_basis: AchievementBasis,
    highlight_count: usize,
    current_year: i32,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::InvalidInput`] if `highlight_count` is zero or `current_year` is
    /// outside the supported range.
    pub fn new(
        data_dir: PathBuf,
        controlled_rule: ControlledRule,
        achievement_basis: AchievementBasis,
        highlight_count: usize,
        current_year: i32,
    ) -> StatsResult<Self> {
        if highlight_count == 0 {
            return Err(StatsError::InvalidInput(
                "highlight_count must be at least 1".into(),
            ));
        }
        validate_scope_year(current_year)?;

        Ok(Self {
            data_dir,
            controlled_rule,
            achievement_basis,
            highlight_count,
            current_year,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join(CACHE_DIR_NAME)
    }

    pub fn controlled_rule(&self) -> ControlledRule {
        self.controlled_rule
    }

    pub fn achievement_basis(&self) -> AchievementBasis {
        self.achievement_basis
    }

    pub fn highlight_count(&self) -> usize {
        self.highlight_count
    }

    /// Examinations dated before this year are archived.
    pub fn current_year(&self) -> i32 {
        self.current_year
    }
}

/// Environment values read by [`resolve_from_env_values`].
///
/// Binaries call [`EnvValues::capture`] once at startup, after loading `.env`. Services only
/// ever see the resolved [`CoreConfig`].
#[derive(Clone, Debug, Default)]
pub struct EnvValues {
    pub data_dir: Option<String>,
    pub controlled_rule: Option<String>,
    pub achievement_basis: Option<String>,
    pub highlight_count: Option<String>,
    pub current_year: Option<String>,
}

impl EnvValues {
    /// Snapshot the `PTM_*` variables of the current process.
    pub fn capture() -> Self {
        Self {
            data_dir: std::env::var("PTM_DATA_DIR").ok(),
            controlled_rule: std::env::var("PTM_CONTROLLED_RULE").ok(),
            achievement_basis: std::env::var("PTM_ACHIEVEMENT_BASIS").ok(),
            highlight_count: std::env::var("PTM_HIGHLIGHT_COUNT").ok(),
            current_year: std::env::var("PTM_CURRENT_YEAR").ok(),
        }
    }
}

/// Build a [`CoreConfig`] from raw environment values, applying defaults for absent ones.
pub fn resolve_from_env_values(values: EnvValues) -> StatsResult<CoreConfig> {
    let data_dir = non_blank(values.data_dir)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

    CoreConfig::new(
        data_dir,
        controlled_rule_from_env_value(values.controlled_rule)?,
        achievement_basis_from_env_value(values.achievement_basis)?,
        highlight_count_from_env_value(values.highlight_count)?,
        current_year_from_env_value(values.current_year)?,
    )
}

/// Parse the controlled rule from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`ControlledRule::History`].
pub fn controlled_rule_from_env_value(value: Option<String>) -> StatsResult<ControlledRule> {
    match non_blank(value).as_deref() {
        None => Ok(ControlledRule::default()),
        Some("history") => Ok(ControlledRule::History),
        Some("latest") => Ok(ControlledRule::Latest),
        Some(other) => Err(StatsError::InvalidInput(format!(
            "PTM_CONTROLLED_RULE must be 'history' or 'latest', got '{other}'"
        ))),
    }
}

/// Parse the achievement basis from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`AchievementBasis::StandardCount`].
pub fn achievement_basis_from_env_value(value: Option<String>) -> StatsResult<AchievementBasis> {
    match non_blank(value).as_deref() {
        None => Ok(AchievementBasis::default()),
        Some("standard") => Ok(AchievementBasis::StandardCount),
        Some("total") => Ok(AchievementBasis::TotalPatients),
        Some(other) => Err(StatsError::InvalidInput(format!(
            "PTM_ACHIEVEMENT_BASIS must be 'standard' or 'total', got '{other}'"
        ))),
    }
}

pub fn highlight_count_from_env_value(value: Option<String>) -> StatsResult<usize> {
    match non_blank(value) {
        None => Ok(DEFAULT_HIGHLIGHT_COUNT),
        Some(v) => v.parse::<usize>().map_err(|e| {
            StatsError::InvalidInput(format!("PTM_HIGHLIGHT_COUNT '{v}' is not a count: {e}"))
        }),
    }
}

/// Parse the current year, defaulting to the local calendar year.
pub fn current_year_from_env_value(value: Option<String>) -> StatsResult<i32> {
    match non_blank(value) {
        None => Ok(chrono::Local::now().year()),
        Some(v) => v.parse::<i32>().map_err(|e| {
            StatsError::InvalidInput(format!("PTM_CURRENT_YEAR '{v}' is not a year: {e}"))
        }),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_for_missing_and_blank_values() {
        let cfg = resolve_from_env_values(EnvValues {
            controlled_rule: Some("   ".into()),
            current_year: Some("2024".into()),
            ..EnvValues::default()
        })
        .expect("defaults should resolve");

        assert_eq!(cfg.data_dir(), Path::new(DEFAULT_DATA_DIR));
        assert_eq!(cfg.cache_dir(), Path::new(DEFAULT_DATA_DIR).join(CACHE_DIR_NAME));
        assert_eq!(cfg.controlled_rule(), ControlledRule::History);
        assert_eq!(cfg.achievement_basis(), AchievementBasis::StandardCount);
        assert_eq!(cfg.highlight_count(), DEFAULT_HIGHLIGHT_COUNT);
        assert_eq!(cfg.current_year(), 2024);
    }

    #[test]
    fn parses_explicit_values() {
        let cfg = resolve_from_env_values(EnvValues {
            data_dir: Some("/srv/ptm".into()),
            controlled_rule: Some("latest".into()),
            achievement_basis: Some("total".into()),
            highlight_count: Some("3".into()),
            current_year: Some("2025".into()),
        })
        .expect("explicit values should resolve");

        assert_eq!(cfg.data_dir(), Path::new("/srv/ptm"));
        assert_eq!(cfg.controlled_rule(), ControlledRule::Latest);
        assert_eq!(cfg.achievement_basis(), AchievementBasis::TotalPatients);
        assert_eq!(cfg.highlight_count(), 3);
    }

    #[test]
    fn rejects_unknown_rule_and_zero_highlight() {
        assert!(controlled_rule_from_env_value(Some("newest".into())).is_err());
        assert!(achievement_basis_from_env_value(Some("target".into())).is_err());

        let err = resolve_from_env_values(EnvValues {
            highlight_count: Some("0".into()),
            current_year: Some("2024".into()),
            ..EnvValues::default()
        })
        .expect_err("zero highlight count");
        assert!(matches!(err, StatsError::InvalidInput(_)));
    }

    #[test]
    fn rejects_out_of_range_current_year() {
        assert!(resolve_from_env_values(EnvValues {
            current_year: Some("1890".into()),
            ..EnvValues::default()
        })
        .is_err());
    }
}
