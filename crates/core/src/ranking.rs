//! Facility ranking by achievement against yearly targets.
//!
//! Each facility's achievement per disease is its cached count divided by its yearly target.
//! HT and DM achievements are summed into a combined score, facilities are ordered by that
//! score (highest first, facility id ascending on ties) and numbered from 1.

use crate::cache::{CacheKey, CacheStore};
use crate::config::AchievementBasis;
use crate::model::{Facility, FacilityId};
use crate::percentage::percentage;
use crate::store::TargetStore;
use crate::validation::validate_scope_year;
use crate::StatsResult;
use ptm_types::{DiseaseType, Month, NonEmptyText};
use serde::Serialize;

/// Which diseases contribute to the combined score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DiseaseFilter {
    #[default]
    Both,
    Only(DiseaseType),
}

impl DiseaseFilter {
    pub fn includes(self, disease: DiseaseType) -> bool {
        match self {
            DiseaseFilter::Both => true,
            DiseaseFilter::Only(only) => only == disease,
        }
    }
}

impl From<Option<DiseaseType>> for DiseaseFilter {
    fn from(value: Option<DiseaseType>) -> Self {
        value.map_or(DiseaseFilter::Both, DiseaseFilter::Only)
    }
}

/// One disease's contribution to a facility row.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DiseaseAchievement {
    /// Zero when no target was set.
    pub target: u32,
    pub total_count: u32,
    pub standard_count: u32,
    pub achievement_percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FacilityRankRow {
    pub facility: FacilityId,
    pub name: NonEmptyText,
    /// `None` when HT is filtered out.
    pub ht: Option<DiseaseAchievement>,
    /// `None` when DM is filtered out.
    pub dm: Option<DiseaseAchievement>,
    pub combined: f64,
    pub rank: usize,
}

/// Rows in rank order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Ranking {
    rows: Vec<FacilityRankRow>,
}

impl Ranking {
    pub fn rows(&self) -> &[FacilityRankRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<FacilityRankRow> {
        self.rows
    }

    /// The first `n` rows.
    pub fn top(&self, n: usize) -> &[FacilityRankRow] {
        &self.rows[..n.min(self.rows.len())]
    }

    /// The last `n` rows, still in rank order.
    pub fn bottom(&self, n: usize) -> &[FacilityRankRow] {
        &self.rows[self.rows.len().saturating_sub(n)..]
    }
}

/// Achievement against a target, two decimals. A zero target yields 0.
pub fn achievement_percentage(
    standard_count: u32,
    total_count: u32,
    target: u32,
    basis: AchievementBasis,
) -> f64 {
    let numerator = match basis {
        AchievementBasis::StandardCount => standard_count,
        AchievementBasis::TotalPatients => total_count,
    };
    percentage(numerator, target)
}

/// Rank `facilities` for a year, or for one month of it.
///
/// Yearly ranking reads the cache's year row, which counts each patient once. Monthly ranking
/// reads that month's row. Both compare against the yearly target.
pub fn rank_facilities(
    cache: &dyn CacheStore,
    targets: &dyn TargetStore,
    facilities: &[Facility],
    year: i32,
    month: Option<Month>,
    filter: DiseaseFilter,
    basis: AchievementBasis,
) -> StatsResult<Ranking> {
    validate_scope_year(year)?;

    let mut rows = Vec::with_capacity(facilities.len());
    for facility in facilities {
        let achievement = |disease: DiseaseType| -> StatsResult<Option<DiseaseAchievement>> {
            if !filter.includes(disease) {
                return Ok(None);
            }
            let entry = match month {
                Some(m) => cache.read(&CacheKey::new(facility.id.clone(), disease, year, m))?,
                None => cache.read_year_row(&facility.id, disease, year)?,
            };
            let target = targets
                .get_target(&facility.id, disease, year)?
                .unwrap_or(0);
            Ok(Some(DiseaseAchievement {
                target,
                total_count: entry.total_count(),
                standard_count: entry.standard_count(),
                achievement_percentage: achievement_percentage(
                    entry.standard_count(),
                    entry.total_count(),
                    target,
                    basis,
                ),
            }))
        };

        let ht = achievement(DiseaseType::Ht)?;
        let dm = achievement(DiseaseType::Dm)?;
        let combined: f64 = [ht, dm]
            .iter()
            .flatten()
            .map(|a| a.achievement_percentage)
            .sum();

        rows.push(FacilityRankRow {
            facility: facility.id.clone(),
            name: facility.name.clone(),
            ht,
            dm,
            combined,
            rank: 0,
        });
    }

    rows.sort_by(|a, b| {
        b.combined
            .total_cmp(&a.combined)
            .then_with(|| a.facility.cmp(&b.facility))
    });
    for (position, row) in rows.iter_mut().enumerate() {
        row.rank = position + 1;
    }

    tracing::debug!(
        year,
        month = ?month.map(Month::number),
        facilities = rows.len(),
        "ranked facilities"
    );
    Ok(Ranking { rows })
}
