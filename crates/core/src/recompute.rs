//! Cache invalidation after examination writes.
//!
//! Standard status looks forward from a patient's first month to the scope month, so a write
//! in month `m` can change every cached month from `m` to December. Invalidation is therefore
//! expressed as a job that recomputes the remainder of the year, plus the year row, rather
//! than a single row.

use crate::model::{Examination, FacilityId};
use ptm_types::{DiseaseType, Month};
use serde::Serialize;
use std::fmt;

/// Recompute months `from_month..=December` of one (facility, disease, year).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RecomputeJob {
    pub facility: FacilityId,
    pub disease: DiseaseType,
    pub year: i32,
    pub from_month: Month,
}

impl RecomputeJob {
    pub fn full_year(facility: FacilityId, disease: DiseaseType, year: i32) -> Self {
        Self {
            facility,
            disease,
            year,
            from_month: Month::JANUARY,
        }
    }

    /// Merge with another job for the same year, keeping the earlier start month.
    ///
    /// Returns `None` when the jobs cover different years.
    pub fn merge(&self, other: &RecomputeJob) -> Option<RecomputeJob> {
        if self.facility != other.facility || self.disease != other.disease || self.year != other.year
        {
            return None;
        }
        Some(RecomputeJob {
            from_month: self.from_month.min(other.from_month),
            ..self.clone()
        })
    }
}

impl fmt::Display for RecomputeJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} from month {}",
            self.facility, self.disease, self.year, self.from_month
        )
    }
}

/// The job needed after `examination` was recorded or removed.
pub fn on_examination_written(examination: &Examination) -> RecomputeJob {
    RecomputeJob {
        facility: examination.facility.clone(),
        disease: examination.disease(),
        year: examination.year,
        from_month: examination.month,
    }
}
