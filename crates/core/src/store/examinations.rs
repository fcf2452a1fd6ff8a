use crate::model::{Examination, ExaminationId, FacilityId, Patient, PatientId};
use crate::{StatsError, StatsResult};
use ptm_types::{DiseaseType, Month};
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

/// Read access to patients and their examinations.
pub trait ExaminationStore: Send + Sync {
    /// Look up a registered patient.
    fn patient(&self, id: &PatientId) -> StatsResult<Option<Patient>>;

    /// Patients of `facility` with at least one examination of `disease` in `year`, restricted
    /// to `month` when given. Ordered by patient id.
    fn patients_in_scope(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
        month: Option<Month>,
    ) -> StatsResult<Vec<Patient>>;

    /// One patient's examinations of `disease` in `year`, dated up to and including `through`
    /// when given. Ordered by date; same-day examinations keep recording order.
    fn list_examinations(
        &self,
        patient: &PatientId,
        disease: DiseaseType,
        year: i32,
        through: Option<Month>,
    ) -> StatsResult<Vec<Examination>>;
}

#[derive(Default)]
struct Inner {
    patients: HashMap<PatientId, Patient>,
    by_facility: HashMap<FacilityId, BTreeSet<PatientId>>,
    examinations: HashMap<ExaminationId, Examination>,
    /// Examination ids per patient in recording order.
    by_patient: HashMap<PatientId, Vec<ExaminationId>>,
}

impl Inner {
    fn examinations_of<'a>(
        &'a self,
        patient: &PatientId,
    ) -> impl Iterator<Item = &'a Examination> + 'a {
        self.by_patient
            .get(patient)
            .into_iter()
            .flatten()
            .filter_map(|id| self.examinations.get(id))
    }
}

/// Examination store held in memory behind a single lock.
///
/// Patient year-sets are maintained here: recording the first examination of a disease in a
/// year adds the year, removing the last one drops it.
#[derive(Default)]
pub struct MemoryExaminationStore {
    inner: RwLock<Inner>,
}

impl MemoryExaminationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a patient.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::InvalidInput`] if the id is already registered.
    pub fn register_patient(&self, patient: Patient) -> StatsResult<()> {
        let mut inner = self.inner.write()?;
        if inner.patients.contains_key(&patient.id) {
            return Err(StatsError::InvalidInput(format!(
                "patient {} is already registered",
                patient.id
            )));
        }
        inner
            .by_facility
            .entry(patient.facility.clone())
            .or_default()
            .insert(patient.id.clone());
        inner.patients.insert(patient.id.clone(), patient);
        Ok(())
    }

    /// Record an examination.
    ///
    /// Returns `true` when this is the patient's first examination of that disease in that
    /// month, i.e. the patient newly enters the month's patient set.
    ///
    /// # Errors
    ///
    /// - [`StatsError::UnknownPatient`] if the patient is not registered.
    /// - [`StatsError::InvalidInput`] if the examination's facility is not the patient's
    ///   facility or the id is already recorded.
    pub fn record(&self, examination: Examination) -> StatsResult<bool> {
        let mut inner = self.inner.write()?;

        let Some(patient) = inner.patients.get(&examination.patient) else {
            return Err(StatsError::UnknownPatient(examination.patient.to_string()));
        };
        if patient.facility != examination.facility {
            return Err(StatsError::InvalidInput(format!(
                "examination {} is recorded at facility {} but patient {} belongs to {}",
                examination.id, examination.facility, patient.id, patient.facility
            )));
        }
        if inner.examinations.contains_key(&examination.id) {
            return Err(StatsError::InvalidInput(format!(
                "examination {} is already recorded",
                examination.id
            )));
        }

        let disease = examination.disease();
        let newly_in_month = !inner.examinations_of(&examination.patient).any(|e| {
            e.disease() == disease && e.year == examination.year && e.month == examination.month
        });

        if let Some(patient) = inner.patients.get_mut(&examination.patient) {
            if patient.add_active_year(disease, examination.year) {
                tracing::debug!(
                    patient = %patient.id,
                    disease = %disease,
                    year = examination.year,
                    "patient became active"
                );
            }
        }
        inner
            .by_patient
            .entry(examination.patient.clone())
            .or_default()
            .push(examination.id.clone());
        inner
            .examinations
            .insert(examination.id.clone(), examination);

        Ok(newly_in_month)
    }

    /// Remove a current-year examination and return it.
    ///
    /// # Errors
    ///
    /// - [`StatsError::UnknownExamination`] if no examination has this id.
    /// - [`StatsError::ArchivedExamination`] if the examination is archived.
    pub fn remove(&self, id: &ExaminationId) -> StatsResult<Examination> {
        let mut inner = self.inner.write()?;

        match inner.examinations.get(id) {
            None => return Err(StatsError::UnknownExamination(id.to_string())),
            Some(e) if e.archived => return Err(StatsError::ArchivedExamination(id.to_string())),
            Some(_) => {}
        }
        let Some(removed) = inner.examinations.remove(id) else {
            return Err(StatsError::UnknownExamination(id.to_string()));
        };
        if let Some(ids) = inner.by_patient.get_mut(&removed.patient) {
            ids.retain(|other| other != id);
        }

        let disease = removed.disease();
        let year_still_active = inner
            .examinations_of(&removed.patient)
            .any(|e| e.disease() == disease && e.year == removed.year);
        if !year_still_active {
            if let Some(patient) = inner.patients.get_mut(&removed.patient) {
                patient.remove_active_year(disease, removed.year);
            }
        }

        Ok(removed)
    }

    pub fn examination(&self, id: &ExaminationId) -> StatsResult<Option<Examination>> {
        Ok(self.inner.read()?.examinations.get(id).cloned())
    }
}

impl ExaminationStore for MemoryExaminationStore {
    fn patient(&self, id: &PatientId) -> StatsResult<Option<Patient>> {
        Ok(self.inner.read()?.patients.get(id).cloned())
    }

    fn patients_in_scope(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
        month: Option<Month>,
    ) -> StatsResult<Vec<Patient>> {
        let inner = self.inner.read()?;
        let Some(members) = inner.by_facility.get(facility) else {
            return Ok(Vec::new());
        };

        let patients = members
            .iter()
            .filter_map(|id| inner.patients.get(id))
            .filter(|p| p.active_years(disease).contains(&year))
            .filter(|p| {
                inner.examinations_of(&p.id).any(|e| {
                    e.disease() == disease
                        && e.year == year
                        && month.map_or(true, |m| e.month == m)
                })
            })
            .cloned()
            .collect();
        Ok(patients)
    }

    fn list_examinations(
        &self,
        patient: &PatientId,
        disease: DiseaseType,
        year: i32,
        through: Option<Month>,
    ) -> StatsResult<Vec<Examination>> {
        let inner = self.inner.read()?;
        let mut examinations: Vec<Examination> = inner
            .examinations_of(patient)
            .filter(|e| e.disease() == disease && e.year == year)
            .filter(|e| through.map_or(true, |m| e.month <= m))
            .cloned()
            .collect();
        examinations.sort_by_key(|e| e.date);
        Ok(examinations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BloodPressure, GlucoseReading, Measurement};
    use chrono::NaiveDate;
    use ptm_types::{DmExamKind, Gender};
    use ptm_uuid::ShardableUuid;

    fn month(n: u32) -> Month {
        Month::new(n).unwrap()
    }

    fn setup() -> (MemoryExaminationStore, Patient) {
        let store = MemoryExaminationStore::new();
        let patient = Patient::new(ShardableUuid::new(), ShardableUuid::new(), Gender::Male, None);
        store.register_patient(patient.clone()).unwrap();
        (store, patient)
    }

    fn ht_exam(patient: &Patient, y: i32, m: u32, d: u32) -> Examination {
        Examination::new(
            ShardableUuid::new(),
            patient.id.clone(),
            patient.facility.clone(),
            NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            Measurement::Hypertension(BloodPressure {
                systolic: Some(130),
                diastolic: Some(85),
            }),
            2024,
        )
        .unwrap()
    }

    fn dm_exam(patient: &Patient, m: u32) -> Examination {
        Examination::new(
            ShardableUuid::new(),
            patient.id.clone(),
            patient.facility.clone(),
            NaiveDate::from_ymd_opt(2024, m, 1).unwrap(),
            Measurement::Diabetes(GlucoseReading {
                kind: DmExamKind::HbA1c,
                result: Some(6.0),
            }),
            2024,
        )
        .unwrap()
    }

    #[test]
    fn record_maintains_year_sets_per_disease() {
        let (store, patient) = setup();
        store.record(ht_exam(&patient, 2024, 3, 1)).unwrap();

        let stored = store.patient(&patient.id).unwrap().unwrap();
        assert!(stored.active_years(DiseaseType::Ht).contains(&2024));
        assert!(stored.active_years(DiseaseType::Dm).is_empty());
    }

    #[test]
    fn record_reports_first_examination_in_month() {
        let (store, patient) = setup();
        assert!(store.record(ht_exam(&patient, 2024, 3, 1)).unwrap());
        assert!(!store.record(ht_exam(&patient, 2024, 3, 20)).unwrap());
        assert!(store.record(dm_exam(&patient, 3)).unwrap());
    }

    #[test]
    fn removing_last_examination_of_year_drops_year() {
        let (store, patient) = setup();
        let first = ht_exam(&patient, 2024, 3, 1);
        let second = ht_exam(&patient, 2024, 4, 1);
        store.record(first.clone()).unwrap();
        store.record(second.clone()).unwrap();

        store.remove(&first.id).unwrap();
        let p = store.patient(&patient.id).unwrap().unwrap();
        assert!(p.active_years(DiseaseType::Ht).contains(&2024));

        store.remove(&second.id).unwrap();
        let p = store.patient(&patient.id).unwrap().unwrap();
        assert!(p.active_years(DiseaseType::Ht).is_empty());
    }

    #[test]
    fn archived_examinations_cannot_be_removed() {
        let (store, patient) = setup();
        let old = ht_exam(&patient, 2023, 6, 1);
        assert!(old.archived);
        store.record(old.clone()).unwrap();

        let err = store.remove(&old.id).expect_err("archived");
        assert!(matches!(err, StatsError::ArchivedExamination(_)));
        assert!(store.examination(&old.id).unwrap().is_some());
    }

    #[test]
    fn rejects_unknown_patient_and_wrong_facility() {
        let (store, patient) = setup();
        let stranger = Patient::new(ShardableUuid::new(), patient.facility.clone(), Gender::Female, None);
        assert!(matches!(
            store.record(ht_exam(&stranger, 2024, 1, 1)),
            Err(StatsError::UnknownPatient(_))
        ));

        let mut moved = ht_exam(&patient, 2024, 1, 1);
        moved.facility = ShardableUuid::new();
        assert!(matches!(store.record(moved), Err(StatsError::InvalidInput(_))));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let (store, patient) = setup();
        let exam = ht_exam(&patient, 2024, 1, 1);
        store.record(exam.clone()).unwrap();
        assert!(matches!(store.record(exam), Err(StatsError::InvalidInput(_))));
        assert!(store.register_patient(patient).is_err());
    }

    #[test]
    fn list_examinations_orders_by_date_and_applies_through() {
        let (store, patient) = setup();
        store.record(ht_exam(&patient, 2024, 5, 2)).unwrap();
        store.record(ht_exam(&patient, 2024, 2, 9)).unwrap();
        store.record(ht_exam(&patient, 2024, 8, 1)).unwrap();
        store.record(dm_exam(&patient, 4)).unwrap();

        let all = store
            .list_examinations(&patient.id, DiseaseType::Ht, 2024, None)
            .unwrap();
        let months: Vec<u32> = all.iter().map(|e| e.month.number()).collect();
        assert_eq!(months, vec![2, 5, 8]);

        let through_may = store
            .list_examinations(&patient.id, DiseaseType::Ht, 2024, Some(month(5)))
            .unwrap();
        assert_eq!(through_may.len(), 2);
    }

    #[test]
    fn patients_in_scope_filters_by_month() {
        let (store, patient) = setup();
        store.record(ht_exam(&patient, 2024, 5, 2)).unwrap();

        let facility = patient.facility.clone();
        assert_eq!(
            store
                .patients_in_scope(&facility, DiseaseType::Ht, 2024, None)
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            store
                .patients_in_scope(&facility, DiseaseType::Ht, 2024, Some(month(5)))
                .unwrap()
                .len(),
            1
        );
        assert!(store
            .patients_in_scope(&facility, DiseaseType::Ht, 2024, Some(month(6)))
            .unwrap()
            .is_empty());
        assert!(store
            .patients_in_scope(&facility, DiseaseType::Dm, 2024, None)
            .unwrap()
            .is_empty());
    }
}
