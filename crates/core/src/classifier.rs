//! Patient classification.
//!
//! Pure functions deciding, from one patient's examinations of one disease within one year,
//! whether the patient is *standard* (attending continuously from first contact) and whether
//! they are *controlled* (clinically stable). Nothing here touches a store.
//!
//! Scope is a year plus an inclusive upper month `through`. A full-year scope uses December.
//! Examinations dated after `through` are ignored, which is what lets a cached month be
//! computed without seeing later months.

use crate::config::ControlledRule;
use crate::constants::{
    CONTROLLED_READINGS_REQUIRED, HT_CONTROLLED_DIASTOLIC, HT_CONTROLLED_SYSTOLIC,
};
use crate::model::{Examination, Measurement};
use crate::{StatsError, StatsResult};
use ptm_types::{DiseaseType, DmExamKind, Month};
use serde::Serialize;

/// Outcome of classifying one patient within one scope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub is_standard: bool,
    /// Multi-reading rule (three readings in window, or DM OR-rule).
    pub controlled_by_history: bool,
    /// Most recent reading only.
    pub controlled_by_latest: bool,
    /// The variant selected by [`ControlledRule`].
    pub is_controlled: bool,
}

/// Classify one patient.
///
/// `examinations` must all be of `disease` and of the same year; order does not matter.
/// An empty scope classifies as all-false.
///
/// # Errors
///
/// Returns [`StatsError::DiseaseMismatch`] if an examination of the other disease is passed,
/// and [`StatsError::InvalidInput`] if the examinations span more than one year.
pub fn classify(
    disease: DiseaseType,
    examinations: &[Examination],
    through: Month,
    rule: ControlledRule,
) -> StatsResult<Classification> {
    check_scope(disease, examinations)?;

    let in_scope: Vec<&Examination> = examinations
        .iter()
        .filter(|e| e.month <= through)
        .collect();

    if in_scope.is_empty() {
        return Ok(Classification::default());
    }

    let is_standard = is_standard(&in_scope, through);
    let controlled_by_history = controlled_by_history(disease, &in_scope);
    let controlled_by_latest = controlled_by_latest(disease, &in_scope);
    let is_controlled = match rule {
        ControlledRule::History => controlled_by_history,
        ControlledRule::Latest => controlled_by_latest,
    };

    Ok(Classification {
        is_standard,
        controlled_by_history,
        controlled_by_latest,
        is_controlled,
    })
}

/// Continuity rule: every month from the first examination month through `through` has at
/// least one examination.
pub fn is_standard(examinations: &[&Examination], through: Month) -> bool {
    let mut seen = [false; 12];
    for e in examinations.iter().filter(|e| e.month <= through) {
        seen[e.month.index()] = true;
    }

    let Some(first_month) = Month::all().find(|m| seen[m.index()]) else {
        return false;
    };

    first_month.through(through).all(|m| seen[m.index()])
}

/// History variant of the controlled rule.
///
/// HT: at least three readings with systolic 90–139 and diastolic 60–89.
/// DM: any HbA1c below 7, or at least three fasting readings below 126, or at least three
/// post-prandial readings below 200. Random glucose never counts.
pub fn controlled_by_history(disease: DiseaseType, examinations: &[&Examination]) -> bool {
    match disease {
        DiseaseType::Ht => {
            let qualifying = examinations
                .iter()
                .filter(|e| match &e.measurement {
                    Measurement::Hypertension(bp) => {
                        bp.within(&HT_CONTROLLED_SYSTOLIC, &HT_CONTROLLED_DIASTOLIC)
                    }
                    Measurement::Diabetes(_) => false,
                })
                .count();
            qualifying >= CONTROLLED_READINGS_REQUIRED
        }
        DiseaseType::Dm => {
            let mut fasting = 0usize;
            let mut post_prandial = 0usize;
            for e in examinations {
                let Measurement::Diabetes(reading) = &e.measurement else {
                    continue;
                };
                if !reading.below_threshold() {
                    continue;
                }
                match reading.kind {
                    DmExamKind::HbA1c => return true,
                    DmExamKind::FastingGlucose => fasting += 1,
                    DmExamKind::PostPrandialGlucose => post_prandial += 1,
                    DmExamKind::RandomGlucose => {}
                }
            }
            fasting >= CONTROLLED_READINGS_REQUIRED
                || post_prandial >= CONTROLLED_READINGS_REQUIRED
        }
    }
}

/// Latest-reading variant of the controlled rule.
///
/// HT: the most recent reading falls in the controlled window. DM: the most recent reading
/// other than random glucose is below its test's limit. Same-day ties resolve to the
/// examination that appears last.
pub fn controlled_by_latest(disease: DiseaseType, examinations: &[&Examination]) -> bool {
    let latest = examinations
        .iter()
        .filter(|e| match &e.measurement {
            Measurement::Hypertension(_) => disease == DiseaseType::Ht,
            Measurement::Diabetes(reading) => {
                disease == DiseaseType::Dm && reading.kind != DmExamKind::RandomGlucose
            }
        })
        .max_by_key(|e| e.date);

    match latest.map(|e| &e.measurement) {
        Some(Measurement::Hypertension(bp)) => {
            bp.within(&HT_CONTROLLED_SYSTOLIC, &HT_CONTROLLED_DIASTOLIC)
        }
        Some(Measurement::Diabetes(reading)) => reading.below_threshold(),
        None => false,
    }
}

fn check_scope(disease: DiseaseType, examinations: &[Examination]) -> StatsResult<()> {
    if let Some(other) = examinations.iter().find(|e| e.disease() != disease) {
        return Err(StatsError::DiseaseMismatch {
            expected: disease,
            found: other.disease(),
        });
    }
    if let Some(first) = examinations.first() {
        if examinations.iter().any(|e| e.year != first.year) {
            return Err(StatsError::InvalidInput(
                "classification scope spans more than one year".into(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BloodPressure, GlucoseReading};
    use chrono::NaiveDate;
    use ptm_uuid::ShardableUuid;

    fn month(n: u32) -> Month {
        Month::new(n).unwrap()
    }

    fn exam_on(m: u32, day: u32, measurement: Measurement) -> Examination {
        Examination::new(
            ShardableUuid::new(),
            ShardableUuid::new(),
            ShardableUuid::new(),
            NaiveDate::from_ymd_opt(2024, m, day).unwrap(),
            measurement,
            2024,
        )
        .unwrap()
    }

    fn bp(m: u32, systolic: u16, diastolic: u16) -> Examination {
        exam_on(
            m,
            10,
            Measurement::Hypertension(BloodPressure {
                systolic: Some(systolic),
                diastolic: Some(diastolic),
            }),
        )
    }

    fn lab(m: u32, kind: DmExamKind, result: f64) -> Examination {
        exam_on(
            m,
            10,
            Measurement::Diabetes(GlucoseReading {
                kind,
                result: Some(result),
            }),
        )
    }

    fn classify_year(disease: DiseaseType, exams: &[Examination]) -> Classification {
        classify(disease, exams, Month::DECEMBER, ControlledRule::History).unwrap()
    }

    #[test]
    fn gaps_before_december_are_not_standard() {
        let exams: Vec<_> = [3, 5, 7, 8, 9, 10, 11, 12]
            .into_iter()
            .map(|m| bp(m, 130, 85))
            .collect();

        assert!(!classify_year(DiseaseType::Ht, &exams).is_standard);
    }

    #[test]
    fn continuous_from_first_month_is_standard() {
        for first in 1..=12u32 {
            let exams: Vec<_> = (first..=12).map(|m| bp(m, 150, 95)).collect();
            assert!(
                classify_year(DiseaseType::Ht, &exams).is_standard,
                "first month {first}"
            );
        }
    }

    #[test]
    fn missing_december_is_not_standard_for_year() {
        let exams: Vec<_> = (9..=11).map(|m| bp(m, 130, 85)).collect();
        assert!(!classify_year(DiseaseType::Ht, &exams).is_standard);
    }

    #[test]
    fn month_scope_checks_only_through_that_month() {
        let exams: Vec<_> = [4, 5, 6, 9].into_iter().map(|m| bp(m, 130, 85)).collect();

        let june = classify(DiseaseType::Ht, &exams, month(6), ControlledRule::History).unwrap();
        assert!(june.is_standard);

        let sept = classify(DiseaseType::Ht, &exams, month(9), ControlledRule::History).unwrap();
        assert!(!sept.is_standard);
    }

    #[test]
    fn empty_scope_is_all_false() {
        assert_eq!(classify_year(DiseaseType::Dm, &[]), Classification::default());

        let later = vec![bp(11, 130, 85)];
        let c = classify(DiseaseType::Ht, &later, month(10), ControlledRule::Latest).unwrap();
        assert_eq!(c, Classification::default());
    }

    #[test]
    fn ht_history_needs_three_readings_in_window() {
        let three = vec![bp(1, 130, 85), bp(2, 130, 85), bp(3, 130, 85)];
        assert!(classify_year(DiseaseType::Ht, &three).controlled_by_history);

        let two_plus_high = vec![bp(1, 130, 85), bp(2, 130, 85), bp(3, 150, 95)];
        assert!(!classify_year(DiseaseType::Ht, &two_plus_high).controlled_by_history);
    }

    #[test]
    fn ht_window_edges_are_inclusive() {
        let low: Vec<_> = (1..=3).map(|m| bp(m, 90, 60)).collect();
        assert!(classify_year(DiseaseType::Ht, &low).controlled_by_history);

        let high: Vec<_> = (1..=3).map(|m| bp(m, 139, 89)).collect();
        assert!(classify_year(DiseaseType::Ht, &high).controlled_by_history);
    }

    #[test]
    fn ht_readings_just_outside_window_do_not_qualify() {
        for (systolic, diastolic) in [(140, 85), (130, 90), (89, 70), (130, 59)] {
            let exams: Vec<_> = (1..=3).map(|m| bp(m, systolic, diastolic)).collect();
            let c = classify(DiseaseType::Ht, &exams, Month::DECEMBER, ControlledRule::Latest)
                .unwrap();
            assert!(!c.controlled_by_history, "{systolic}/{diastolic}");
            assert!(!c.controlled_by_latest, "{systolic}/{diastolic}");
        }
    }

    #[test]
    fn ht_missing_value_never_qualifies() {
        let mut exams = vec![bp(1, 130, 85), bp(2, 130, 85)];
        exams.push(exam_on(
            3,
            1,
            Measurement::Hypertension(BloodPressure {
                systolic: Some(130),
                diastolic: None,
            }),
        ));
        assert!(!classify_year(DiseaseType::Ht, &exams).controlled_by_history);
    }

    #[test]
    fn ht_latest_variant_looks_at_most_recent_reading() {
        let exams = vec![bp(1, 160, 100), bp(2, 160, 100), bp(3, 128, 82)];
        let c = classify(DiseaseType::Ht, &exams, Month::DECEMBER, ControlledRule::Latest).unwrap();

        assert!(!c.controlled_by_history);
        assert!(c.controlled_by_latest);
        assert!(c.is_controlled);
    }

    #[test]
    fn dm_single_hba1c_controls() {
        let exams = vec![lab(2, DmExamKind::HbA1c, 6.5)];
        assert!(classify_year(DiseaseType::Dm, &exams).controlled_by_history);
    }

    #[test]
    fn dm_fasting_needs_three_readings() {
        let mut exams = vec![
            lab(1, DmExamKind::FastingGlucose, 100.0),
            lab(2, DmExamKind::FastingGlucose, 100.0),
        ];
        assert!(!classify_year(DiseaseType::Dm, &exams).controlled_by_history);

        exams.push(lab(3, DmExamKind::FastingGlucose, 100.0));
        assert!(classify_year(DiseaseType::Dm, &exams).controlled_by_history);
    }

    #[test]
    fn dm_post_prandial_counts_separately_from_fasting() {
        let exams = vec![
            lab(1, DmExamKind::FastingGlucose, 100.0),
            lab(2, DmExamKind::FastingGlucose, 100.0),
            lab(3, DmExamKind::PostPrandialGlucose, 150.0),
        ];
        assert!(!classify_year(DiseaseType::Dm, &exams).controlled_by_history);

        let pp: Vec<_> = (1..=3)
            .map(|m| lab(m, DmExamKind::PostPrandialGlucose, 199.0))
            .collect();
        assert!(classify_year(DiseaseType::Dm, &pp).controlled_by_history);

        let at_limit: Vec<_> = (1..=3)
            .map(|m| lab(m, DmExamKind::PostPrandialGlucose, 200.0))
            .collect();
        let c = classify_year(DiseaseType::Dm, &at_limit);
        assert!(!c.controlled_by_history);
        assert!(!c.controlled_by_latest);
    }

    #[test]
    fn dm_random_glucose_never_counts() {
        let exams: Vec<_> = (1..=4)
            .map(|m| lab(m, DmExamKind::RandomGlucose, 90.0))
            .collect();
        let c = classify_year(DiseaseType::Dm, &exams);
        assert!(!c.controlled_by_history);
        assert!(!c.controlled_by_latest);
    }

    #[test]
    fn dm_latest_skips_random_glucose() {
        let exams = vec![
            lab(1, DmExamKind::HbA1c, 6.2),
            lab(2, DmExamKind::RandomGlucose, 300.0),
        ];
        assert!(classify_year(DiseaseType::Dm, &exams).controlled_by_latest);
    }

    #[test]
    fn rejects_examinations_of_other_disease() {
        let exams = vec![bp(1, 130, 85)];
        let err = classify(DiseaseType::Dm, &exams, Month::DECEMBER, ControlledRule::History)
            .expect_err("HT examination in DM scope");
        assert!(matches!(
            err,
            StatsError::DiseaseMismatch {
                expected: DiseaseType::Dm,
                found: DiseaseType::Ht
            }
        ));
    }

    #[test]
    fn rejects_multi_year_scope() {
        let mut exams = vec![bp(1, 130, 85)];
        exams.push(
            Examination::new(
                ShardableUuid::new(),
                ShardableUuid::new(),
                ShardableUuid::new(),
                NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
                Measurement::Hypertension(BloodPressure {
                    systolic: Some(130),
                    diastolic: Some(85),
                }),
                2024,
            )
            .unwrap(),
        );
        assert!(matches!(
            classify(DiseaseType::Ht, &exams, Month::DECEMBER, ControlledRule::History),
            Err(StatsError::InvalidInput(_))
        ));
    }
}
