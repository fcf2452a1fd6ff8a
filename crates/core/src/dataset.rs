//! Dataset loading.
//!
//! A data directory holds the source of truth as YAML files:
//!
//! ```text
//! <data_dir>/
//!   facilities.yaml      # required
//!   patients.yaml        # required
//!   examinations.yaml    # optional, empty log when absent
//!   targets.yaml         # optional, no targets when absent
//!   cache/               # FileCacheStore root
//! ```
//!
//! Loading registers every patient and records every examination, which also builds the
//! patients' activity year-sets.

use crate::constants::{
    EXAMINATIONS_FILENAME, FACILITIES_FILENAME, PATIENTS_FILENAME, TARGETS_FILENAME,
};
use crate::model::{Examination, Facility, Patient, YearlyTarget};
use crate::store::{MemoryExaminationStore, MemoryTargetStore};
use crate::{StatsError, StatsResult};
use ptm_wire::{Examinations, Facilities, Patients, Targets};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A loaded dataset.
pub struct Dataset {
    pub facilities: Vec<Facility>,
    pub examinations: MemoryExaminationStore,
    pub targets: MemoryTargetStore,
}

impl Dataset {
    /// Load a dataset from `data_dir`.
    ///
    /// Examinations dated before `current_year` are marked archived.
    ///
    /// # Errors
    ///
    /// - [`StatsError::DatasetRead`] if a required file is missing or any file is unreadable.
    /// - [`StatsError::Wire`] if a file does not match its schema.
    /// - [`StatsError::InvalidInput`] if a patient, examination or target refers to a facility
    ///   that is not on the roster, or ids repeat.
    pub fn load(data_dir: &Path, current_year: i32) -> StatsResult<Self> {
        let facilities: Vec<Facility> =
            Facilities::parse(&read_required(&data_dir.join(FACILITIES_FILENAME))?)?
                .into_iter()
                .map(Facility::from)
                .collect();
        let known: HashSet<_> = facilities.iter().map(|f| f.id.clone()).collect();

        let examinations = MemoryExaminationStore::new();
        let patients = Patients::parse(&read_required(&data_dir.join(PATIENTS_FILENAME))?)?;
        let patient_count = patients.len();
        for data in patients {
            if !known.contains(&data.facility) {
                return Err(StatsError::InvalidInput(format!(
                    "patient {} is registered at unknown facility {}",
                    data.id, data.facility
                )));
            }
            examinations.register_patient(Patient::from(data))?;
        }

        let mut examination_count = 0usize;
        if let Some(yaml) = read_optional(&data_dir.join(EXAMINATIONS_FILENAME))? {
            for data in Examinations::parse(&yaml)? {
                examinations.record(Examination::from_data(data, current_year)?)?;
                examination_count += 1;
            }
        }

        let targets = MemoryTargetStore::new();
        let mut target_count = 0usize;
        if let Some(yaml) = read_optional(&data_dir.join(TARGETS_FILENAME))? {
            for data in Targets::parse(&yaml)? {
                if !known.contains(&data.facility) {
                    return Err(StatsError::InvalidInput(format!(
                        "target for unknown facility {}",
                        data.facility
                    )));
                }
                targets.set_target(YearlyTarget::from(data))?;
                target_count += 1;
            }
        }

        tracing::info!(
            data_dir = %data_dir.display(),
            facilities = facilities.len(),
            patients = patient_count,
            examinations = examination_count,
            targets = target_count,
            "loaded dataset"
        );

        Ok(Self {
            facilities,
            examinations,
            targets,
        })
    }
}

fn read_required(path: &Path) -> StatsResult<String> {
    fs::read_to_string(path).map_err(|source| StatsError::DatasetRead {
        path: PathBuf::from(path),
        source,
    })
}

fn read_optional(path: &Path) -> StatsResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "optional dataset file absent");
            Ok(None)
        }
        Err(source) => Err(StatsError::DatasetRead {
            path: PathBuf::from(path),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ExaminationStore, TargetStore};
    use ptm_types::DiseaseType;
    use tempfile::TempDir;

    const FACILITY: &str = "550e8400e29b41d4a716446655440000";
    const PATIENT: &str = "90a8d1ea318041d9adb070a834d4e0f6";

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).expect("write dataset file");
    }

    fn write_roster(dir: &Path) {
        write(
            dir,
            FACILITIES_FILENAME,
            &format!("facilities:\n  - id: {FACILITY}\n    name: Puskesmas Sukamaju\n"),
        );
        write(
            dir,
            PATIENTS_FILENAME,
            &format!("patients:\n  - id: {PATIENT}\n    facility: {FACILITY}\n    gender: L\n"),
        );
    }

    #[test]
    fn loads_full_dataset() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        write_roster(temp_dir.path());
        write(
            temp_dir.path(),
            EXAMINATIONS_FILENAME,
            &format!(
                "examinations:\n  - id: 00000000000000000000000000000001\n    patient: {PATIENT}\n    facility: {FACILITY}\n    disease: HT\n    date: 2023-12-05\n    systolic: 130\n    diastolic: 85\n  - id: 00000000000000000000000000000002\n    patient: {PATIENT}\n    facility: {FACILITY}\n    disease: DM\n    date: 2024-01-09\n    examType: HBA1C\n    result: 6.4\n"
            ),
        );
        write(
            temp_dir.path(),
            TARGETS_FILENAME,
            &format!("targets:\n  - facility: {FACILITY}\n    disease: HT\n    year: 2024\n    target: 25\n"),
        );

        let dataset = Dataset::load(temp_dir.path(), 2024).expect("load dataset");
        assert_eq!(dataset.facilities.len(), 1);

        let facility = dataset.facilities[0].id.clone();
        let patient = dataset
            .examinations
            .patient(&PATIENT.parse().unwrap())
            .unwrap()
            .expect("patient registered");
        assert!(patient.active_years(DiseaseType::Ht).contains(&2023));
        assert!(patient.active_years(DiseaseType::Dm).contains(&2024));

        let archived = dataset
            .examinations
            .list_examinations(&patient.id, DiseaseType::Ht, 2023, None)
            .unwrap();
        assert!(archived[0].archived);

        assert_eq!(
            dataset
                .targets
                .get_target(&facility, DiseaseType::Ht, 2024)
                .unwrap(),
            Some(25)
        );
    }

    #[test]
    fn optional_files_may_be_absent() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        write_roster(temp_dir.path());

        let dataset = Dataset::load(temp_dir.path(), 2024).expect("load dataset");
        let facility = dataset.facilities[0].id.clone();
        assert!(dataset
            .examinations
            .patients_in_scope(&facility, DiseaseType::Ht, 2024, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn missing_roster_reports_path() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let err = Dataset::load(temp_dir.path(), 2024).err().expect("missing roster");
        match err {
            StatsError::DatasetRead { path, .. } => {
                assert!(path.ends_with(FACILITIES_FILENAME))
            }
            other => panic!("expected DatasetRead, got {other:?}"),
        }
    }

    #[test]
    fn rejects_patient_at_unknown_facility() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        write_roster(temp_dir.path());
        write(
            temp_dir.path(),
            FACILITIES_FILENAME,
            "facilities:\n  - id: 11111111111111111111111111111111\n    name: Other\n",
        );

        assert!(matches!(
            Dataset::load(temp_dir.path(), 2024),
            Err(StatsError::InvalidInput(_))
        ));
    }
}
