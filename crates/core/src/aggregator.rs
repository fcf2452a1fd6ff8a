//! Aggregation of classified patients into count tuples.
//!
//! For a (facility, disease, year, optional month) scope the aggregator takes the set of
//! patients with at least one examination in scope, classifies each of them and accumulates
//! gender, standard and controlled counts. Month scopes classify on the examinations of the
//! year up to and including that month.

use crate::cache::CacheEntry;
use crate::classifier::{classify, Classification};
use crate::config::ControlledRule;
use crate::model::{FacilityId, PatientId};
use crate::store::ExaminationStore;
use crate::validation::validate_scope_year;
use crate::StatsResult;
use ptm_types::{DiseaseType, Gender, Month};
use serde::Serialize;
use std::collections::BTreeMap;

/// The unit of aggregation. `month: None` covers the whole year.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Scope {
    pub facility: FacilityId,
    pub disease: DiseaseType,
    pub year: i32,
    pub month: Option<Month>,
}

impl Scope {
    pub fn year(facility: FacilityId, disease: DiseaseType, year: i32) -> Self {
        Self {
            facility,
            disease,
            year,
            month: None,
        }
    }

    pub fn month(facility: FacilityId, disease: DiseaseType, year: i32, month: Month) -> Self {
        Self {
            facility,
            disease,
            year,
            month: Some(month),
        }
    }

    /// Last month whose examinations are visible to the classifier.
    pub fn through(&self) -> Month {
        self.month.unwrap_or(Month::DECEMBER)
    }
}

/// Aggregate for one scope.
///
/// `controlled_count` is published next to the standard counts and is not folded into them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ScopeStatistics {
    #[serde(flatten)]
    pub entry: CacheEntry,
    pub controlled_count: u32,
}

/// Full-year aggregate plus the independently computed monthly breakdown.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct YearlyStatistics {
    pub year: ScopeStatistics,
    pub monthly: BTreeMap<Month, ScopeStatistics>,
}

pub struct Aggregator<'a> {
    store: &'a dyn ExaminationStore,
    rule: ControlledRule,
}

impl<'a> Aggregator<'a> {
    pub fn new(store: &'a dyn ExaminationStore, rule: ControlledRule) -> Self {
        Self { store, rule }
    }

    /// Classify one patient within a year, or within a year up to `month`.
    pub fn classify_patient(
        &self,
        patient: &PatientId,
        disease: DiseaseType,
        year: i32,
        month: Option<Month>,
    ) -> StatsResult<Classification> {
        validate_scope_year(year)?;
        let through = month.unwrap_or(Month::DECEMBER);
        let examinations = self
            .store
            .list_examinations(patient, disease, year, Some(through))?;
        classify(disease, &examinations, through, self.rule)
    }

    /// Aggregate one scope.
    pub fn aggregate(&self, scope: &Scope) -> StatsResult<ScopeStatistics> {
        validate_scope_year(scope.year)?;

        let patients =
            self.store
                .patients_in_scope(&scope.facility, scope.disease, scope.year, scope.month)?;
        let through = scope.through();

        let mut stats = ScopeStatistics::default();
        for patient in &patients {
            let examinations = self.store.list_examinations(
                &patient.id,
                scope.disease,
                scope.year,
                Some(through),
            )?;
            let classification = classify(scope.disease, &examinations, through, self.rule)?;

            if patient.gender == Gender::Unknown {
                tracing::warn!(
                    patient = %patient.id,
                    facility = %scope.facility,
                    "patient has no registered gender, counted in total only"
                );
            }
            stats
                .entry
                .add_patient(patient.gender, classification.is_standard);
            if classification.is_controlled {
                stats.controlled_count += 1;
            }
        }

        tracing::debug!(
            facility = %scope.facility,
            disease = %scope.disease,
            year = scope.year,
            month = ?scope.month.map(Month::number),
            total = stats.entry.total_count(),
            standard = stats.entry.standard_count(),
            controlled = stats.controlled_count,
            "aggregated scope"
        );
        Ok(stats)
    }

    /// Aggregate each month from `from` through December independently.
    pub fn aggregate_months(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
        from: Month,
    ) -> StatsResult<BTreeMap<Month, ScopeStatistics>> {
        from.through(Month::DECEMBER)
            .map(|month| {
                let scope = Scope::month(facility.clone(), disease, year, month);
                Ok((month, self.aggregate(&scope)?))
            })
            .collect()
    }

    /// Aggregate the whole year and its twelve months.
    ///
    /// Monthly rows are not derived from the yearly figures: standard status depends on the
    /// month, so each month is its own scope.
    pub fn aggregate_year(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
    ) -> StatsResult<YearlyStatistics> {
        let yearly = self.aggregate(&Scope::year(facility.clone(), disease, year))?;
        let monthly = self.aggregate_months(facility, disease, year, Month::JANUARY)?;
        Ok(YearlyStatistics {
            year: yearly,
            monthly,
        })
    }
}
