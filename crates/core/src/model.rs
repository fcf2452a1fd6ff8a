//! Domain entities consumed by the statistics engine.
//!
//! These are built from the `ptm-wire` carriers when a dataset is loaded, or directly by
//! callers recording new examinations.

use crate::constants::{
    DM_FASTING_GLUCOSE_LIMIT, DM_HBA1C_LIMIT, DM_POST_PRANDIAL_GLUCOSE_LIMIT,
    HT_NORMAL_DIASTOLIC, HT_NORMAL_SYSTOLIC,
};
use crate::{StatsError, StatsResult};
use chrono::{Datelike, NaiveDate};
use ptm_types::{DiseaseType, DmExamKind, Gender, Month, NonEmptyText};
use ptm_uuid::ShardableUuid;
use ptm_wire::{ExaminationData, FacilityData, MeasurementData, PatientData, TargetData};
use serde::Serialize;
use std::collections::BTreeSet;

pub type FacilityId = ShardableUuid;
pub type PatientId = ShardableUuid;
pub type ExaminationId = ShardableUuid;

/// Blood pressure reading. Either value may be missing; a missing value never matches a
/// threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BloodPressure {
    pub systolic: Option<u16>,
    pub diastolic: Option<u16>,
}

impl BloodPressure {
    /// True when both values are present and inside the given inclusive windows.
    pub fn within(
        &self,
        systolic: &std::ops::RangeInclusive<u16>,
        diastolic: &std::ops::RangeInclusive<u16>,
    ) -> bool {
        matches!(
            (self.systolic, self.diastolic),
            (Some(s), Some(d)) if systolic.contains(&s) && diastolic.contains(&d)
        )
    }
}

/// Laboratory glucose/HbA1c reading.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GlucoseReading {
    pub kind: DmExamKind,
    pub result: Option<f64>,
}

impl GlucoseReading {
    /// True when the reading is below the control threshold for its test.
    ///
    /// Random glucose readings never qualify.
    pub fn below_threshold(&self) -> bool {
        let Some(value) = self.result else {
            return false;
        };
        match self.kind {
            DmExamKind::HbA1c => value < DM_HBA1C_LIMIT,
            DmExamKind::FastingGlucose => value < DM_FASTING_GLUCOSE_LIMIT,
            DmExamKind::PostPrandialGlucose => value < DM_POST_PRANDIAL_GLUCOSE_LIMIT,
            DmExamKind::RandomGlucose => false,
        }
    }
}

/// Disease-specific payload of an examination.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "disease")]
pub enum Measurement {
    #[serde(rename = "HT")]
    Hypertension(BloodPressure),
    #[serde(rename = "DM")]
    Diabetes(GlucoseReading),
}

impl Measurement {
    pub fn disease(&self) -> DiseaseType {
        match self {
            Measurement::Hypertension(_) => DiseaseType::Ht,
            Measurement::Diabetes(_) => DiseaseType::Dm,
        }
    }
}

/// One clinical measurement event.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Examination {
    pub id: ExaminationId,
    pub patient: PatientId,
    pub facility: FacilityId,
    pub date: NaiveDate,
    pub year: i32,
    pub month: Month,
    /// Set for examinations dated before the current year. Archived examinations are
    /// immutable but still count towards their year's statistics.
    pub archived: bool,
    pub measurement: Measurement,
}

impl Examination {
    /// Build an examination, deriving year, month and the archived flag from `date`.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::MalformedExamination`] for a blood pressure reading with neither
    /// value present.
    pub fn new(
        id: ExaminationId,
        patient: PatientId,
        facility: FacilityId,
        date: NaiveDate,
        measurement: Measurement,
        current_year: i32,
    ) -> StatsResult<Self> {
        if let Measurement::Hypertension(bp) = &measurement {
            if bp.systolic.is_none() && bp.diastolic.is_none() {
                return Err(StatsError::MalformedExamination {
                    id: id.to_string(),
                    reason: "blood pressure reading has neither systolic nor diastolic".into(),
                });
            }
        }

        let year = date.year();
        Ok(Self {
            id,
            patient,
            facility,
            date,
            year,
            month: Month::new(date.month())?,
            archived: year < current_year,
            measurement,
        })
    }

    /// Build from a parsed examination-log entry.
    pub fn from_data(data: ExaminationData, current_year: i32) -> StatsResult<Self> {
        let measurement = match data.measurement {
            MeasurementData::Hypertension {
                systolic,
                diastolic,
            } => Measurement::Hypertension(BloodPressure {
                systolic,
                diastolic,
            }),
            MeasurementData::Diabetes { kind, result } => {
                Measurement::Diabetes(GlucoseReading { kind, result })
            }
        };
        Self::new(
            data.id,
            data.patient,
            data.facility,
            data.date,
            measurement,
            current_year,
        )
    }

    pub fn disease(&self) -> DiseaseType {
        self.measurement.disease()
    }

    /// Per-record "normal" flag shown alongside individual readings.
    ///
    /// HT: systolic 120–139 and diastolic 80–89. DM: the reading is below its test's limit.
    /// This is a single-reading judgement, distinct from the multi-reading controlled rule.
    pub fn is_normal(&self) -> bool {
        match &self.measurement {
            Measurement::Hypertension(bp) => bp.within(&HT_NORMAL_SYSTOLIC, &HT_NORMAL_DIASTOLIC),
            Measurement::Diabetes(reading) => reading.below_threshold(),
        }
    }
}

/// A registered patient together with the years in which they have examinations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Patient {
    pub id: PatientId,
    pub facility: FacilityId,
    pub gender: Gender,
    pub birth_date: Option<NaiveDate>,
    ht_years: BTreeSet<i32>,
    dm_years: BTreeSet<i32>,
}

impl Patient {
    pub fn new(
        id: PatientId,
        facility: FacilityId,
        gender: Gender,
        birth_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            id,
            facility,
            gender,
            birth_date,
            ht_years: BTreeSet::new(),
            dm_years: BTreeSet::new(),
        }
    }

    /// Years with at least one examination of `disease`.
    pub fn active_years(&self, disease: DiseaseType) -> &BTreeSet<i32> {
        match disease {
            DiseaseType::Ht => &self.ht_years,
            DiseaseType::Dm => &self.dm_years,
        }
    }

    /// Returns true if the year was newly added.
    pub(crate) fn add_active_year(&mut self, disease: DiseaseType, year: i32) -> bool {
        self.years_mut(disease).insert(year)
    }

    /// Returns true if the year was present.
    pub(crate) fn remove_active_year(&mut self, disease: DiseaseType, year: i32) -> bool {
        self.years_mut(disease).remove(&year)
    }

    fn years_mut(&mut self, disease: DiseaseType) -> &mut BTreeSet<i32> {
        match disease {
            DiseaseType::Ht => &mut self.ht_years,
            DiseaseType::Dm => &mut self.dm_years,
        }
    }
}

impl From<PatientData> for Patient {
    fn from(data: PatientData) -> Self {
        Patient::new(data.id, data.facility, data.gender, data.birth_date)
    }
}

/// A community health facility.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Facility {
    pub id: FacilityId,
    pub name: NonEmptyText,
}

impl From<FacilityData> for Facility {
    fn from(data: FacilityData) -> Self {
        Facility {
            id: data.id,
            name: data.name,
        }
    }
}

/// A yearly programme target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct YearlyTarget {
    pub facility: FacilityId,
    pub disease: DiseaseType,
    pub year: i32,
    pub target: u32,
}

impl From<TargetData> for YearlyTarget {
    fn from(data: TargetData) -> Self {
        YearlyTarget {
            facility: data.facility,
            disease: data.disease,
            year: data.year,
            target: data.target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ht(systolic: Option<u16>, diastolic: Option<u16>) -> Measurement {
        Measurement::Hypertension(BloodPressure {
            systolic,
            diastolic,
        })
    }

    fn dm(kind: DmExamKind, result: f64) -> Measurement {
        Measurement::Diabetes(GlucoseReading {
            kind,
            result: Some(result),
        })
    }

    fn exam(measurement: Measurement) -> Examination {
        Examination::new(
            ShardableUuid::new(),
            ShardableUuid::new(),
            ShardableUuid::new(),
            date(2024, 5, 17),
            measurement,
            2024,
        )
        .expect("valid examination")
    }

    #[test]
    fn derives_year_month_and_archived_flag() {
        let e = Examination::new(
            ShardableUuid::new(),
            ShardableUuid::new(),
            ShardableUuid::new(),
            date(2023, 11, 2),
            ht(Some(130), Some(85)),
            2024,
        )
        .unwrap();

        assert_eq!(e.year, 2023);
        assert_eq!(e.month.number(), 11);
        assert!(e.archived);
        assert!(!exam(ht(Some(130), Some(85))).archived);
    }

    #[test]
    fn rejects_empty_blood_pressure() {
        let err = Examination::new(
            ShardableUuid::new(),
            ShardableUuid::new(),
            ShardableUuid::new(),
            date(2024, 1, 1),
            ht(None, None),
            2024,
        )
        .expect_err("empty reading is malformed");
        assert!(matches!(err, StatsError::MalformedExamination { .. }));
    }

    #[test]
    fn ht_normal_window() {
        assert!(exam(ht(Some(120), Some(80))).is_normal());
        assert!(exam(ht(Some(139), Some(89))).is_normal());
        assert!(!exam(ht(Some(119), Some(85))).is_normal());
        assert!(!exam(ht(Some(130), Some(90))).is_normal());
        assert!(!exam(ht(Some(130), None)).is_normal());
    }

    #[test]
    fn dm_normal_thresholds() {
        assert!(exam(dm(DmExamKind::HbA1c, 6.9)).is_normal());
        assert!(!exam(dm(DmExamKind::HbA1c, 7.0)).is_normal());
        assert!(exam(dm(DmExamKind::FastingGlucose, 125.0)).is_normal());
        assert!(!exam(dm(DmExamKind::FastingGlucose, 126.0)).is_normal());
        assert!(exam(dm(DmExamKind::PostPrandialGlucose, 199.0)).is_normal());
        assert!(!exam(dm(DmExamKind::RandomGlucose, 90.0)).is_normal());
    }

    #[test]
    fn null_glucose_result_is_not_normal() {
        let e = exam(Measurement::Diabetes(GlucoseReading {
            kind: DmExamKind::HbA1c,
            result: None,
        }));
        assert!(!e.is_normal());
    }

    #[test]
    fn active_year_sets_are_per_disease() {
        let mut p = Patient::new(
            ShardableUuid::new(),
            ShardableUuid::new(),
            Gender::Female,
            None,
        );
        assert!(p.add_active_year(DiseaseType::Ht, 2024));
        assert!(!p.add_active_year(DiseaseType::Ht, 2024));
        assert!(p.active_years(DiseaseType::Dm).is_empty());
        assert!(p.remove_active_year(DiseaseType::Ht, 2024));
        assert!(p.active_years(DiseaseType::Ht).is_empty());
    }
}
