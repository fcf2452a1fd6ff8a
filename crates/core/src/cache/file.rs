use super::{CacheEntry, CacheKey, CacheStore, YearRows};
use crate::model::FacilityId;
use crate::{StatsError, StatsResult};
use ptm_types::{DiseaseType, Gender, Month};
use ptm_wire::{CacheYear, CacheYearData};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Cache rows persisted as one YAML file per (facility, disease, year):
///
/// ```text
/// <root>/<s1>/<s2>/<facility>/<disease>/<year>.yaml
/// ```
///
/// Writers serialise on an in-process lock and replace the file via a temporary file and a
/// rename, so readers never observe a half-written year.
pub struct FileCacheStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the year file for one (facility, disease, year).
    pub fn year_path(&self, facility: &FacilityId, disease: DiseaseType, year: i32) -> PathBuf {
        facility
            .sharded_dir(&self.root)
            .join(disease.code().to_ascii_lowercase())
            .join(format!("{year}.yaml"))
    }

    fn load(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
    ) -> StatsResult<YearRows> {
        let path = self.year_path(facility, disease, year);
        let yaml = match fs::read_to_string(&path) {
            Ok(yaml) => yaml,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(YearRows::default()),
            Err(e) => return Err(StatsError::CacheRead(e)),
        };

        let data = CacheYear::parse(&yaml)?;
        if &data.facility != facility || data.disease != disease || data.year != year {
            return Err(StatsError::InvalidInput(format!(
                "cache file {} holds {} {} {}",
                path.display(),
                data.facility,
                data.disease,
                data.year
            )));
        }

        let mut rows = YearRows::default();
        for (slot, stored) in rows.months.iter_mut().zip(data.months) {
            *slot = stored.map(CacheEntry::from_month_data).transpose()?;
        }
        rows.year = data.year_row.map(CacheEntry::from_month_data).transpose()?;
        Ok(rows)
    }

    fn store(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
        rows: &YearRows,
    ) -> StatsResult<()> {
        let path = self.year_path(facility, disease, year);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(StatsError::CacheDirCreation)?;
        }

        let mut data = CacheYearData::empty(facility.clone(), disease, year);
        data.months = rows.months.map(|m| m.map(CacheEntry::to_month_data));
        data.year_row = rows.year.map(CacheEntry::to_month_data);
        let yaml = CacheYear::render(&data)?;

        let tmp = path.with_extension("yaml.tmp");
        fs::write(&tmp, yaml).map_err(StatsError::CacheWrite)?;
        fs::rename(&tmp, &path).map_err(StatsError::CacheWrite)?;
        Ok(())
    }

    /// Load, modify and store one year file while holding the writer lock.
    fn modify<R>(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
        f: impl FnOnce(&mut YearRows) -> R,
    ) -> StatsResult<R> {
        let _guard = self.write_lock.lock()?;
        let mut rows = self.load(facility, disease, year)?;
        let out = f(&mut rows);
        self.store(facility, disease, year, &rows)?;
        Ok(out)
    }
}

impl CacheStore for FileCacheStore {
    fn read(&self, key: &CacheKey) -> StatsResult<CacheEntry> {
        let rows = self.load(&key.facility, key.disease, key.year)?;
        Ok(rows.months[key.month.index()].unwrap_or_default())
    }

    fn upsert(&self, key: &CacheKey, entry: CacheEntry) -> StatsResult<()> {
        self.modify(&key.facility, key.disease, key.year, |rows| {
            rows.months[key.month.index()] = Some(entry).filter(|e| !e.is_empty());
        })
    }

    fn increment(
        &self,
        key: &CacheKey,
        gender: Gender,
        is_standard: bool,
    ) -> StatsResult<CacheEntry> {
        self.modify(&key.facility, key.disease, key.year, |rows| {
            let slot = &mut rows.months[key.month.index()];
            let mut entry = slot.unwrap_or_default();
            entry.add_patient(gender, is_standard);
            *slot = Some(entry);
            entry
        })
    }

    fn replace_months(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
        from: Month,
        entries: &BTreeMap<Month, CacheEntry>,
        year_row: CacheEntry,
    ) -> StatsResult<()> {
        self.modify(facility, disease, year, |rows| {
            rows.replace(from, entries, year_row)
        })
    }

    fn read_year_row(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
    ) -> StatsResult<CacheEntry> {
        Ok(self.load(facility, disease, year)?.year.unwrap_or_default())
    }

    fn read_year(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
    ) -> StatsResult<BTreeMap<Month, CacheEntry>> {
        Ok(self.load(facility, disease, year)?.month_map())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptm_uuid::ShardableUuid;
    use tempfile::TempDir;

    fn month(n: u32) -> Month {
        Month::new(n).unwrap()
    }

    #[test]
    fn year_path_is_sharded_by_facility() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cache = FileCacheStore::new(temp_dir.path());
        let facility = ShardableUuid::parse("550e8400e29b41d4a716446655440000").unwrap();

        let path = cache.year_path(&facility, DiseaseType::Dm, 2024);
        assert_eq!(
            path,
            temp_dir
                .path()
                .join("55/0e/550e8400e29b41d4a716446655440000/dm/2024.yaml")
        );
    }

    #[test]
    fn missing_file_reads_as_zero_and_is_not_created() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cache = FileCacheStore::new(temp_dir.path());
        let facility = ShardableUuid::new();
        let key = CacheKey::new(facility.clone(), DiseaseType::Ht, 2024, month(1));

        assert!(cache.read(&key).unwrap().is_empty());
        assert!(!cache.year_path(&facility, DiseaseType::Ht, 2024).exists());
    }

    #[test]
    fn rows_survive_reopening_the_store() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let facility = ShardableUuid::new();
        let key = CacheKey::new(facility.clone(), DiseaseType::Ht, 2024, month(3));

        {
            let cache = FileCacheStore::new(temp_dir.path());
            cache.increment(&key, Gender::Male, true).unwrap();
            cache.increment(&key, Gender::Unknown, false).unwrap();
        }

        let reopened = FileCacheStore::new(temp_dir.path());
        let entry = reopened.read(&key).unwrap();
        assert_eq!(entry.total_count(), 2);
        assert_eq!(entry.male_count(), 1);
        assert_eq!(entry.female_count(), 0);
        assert_eq!(entry.standard_percentage(), 50.0);

        let path = reopened.year_path(&facility, DiseaseType::Ht, 2024);
        assert!(!path.with_extension("yaml.tmp").exists());
    }

    #[test]
    fn replace_months_rewrites_tail_of_year() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cache = FileCacheStore::new(temp_dir.path());
        let facility = ShardableUuid::new();
        for m in 1..=12 {
            let key = CacheKey::new(facility.clone(), DiseaseType::Dm, 2024, month(m));
            cache.increment(&key, Gender::Female, false).unwrap();
        }

        let mut entries = BTreeMap::new();
        entries.insert(month(11), CacheEntry::from_counts(0, 3, 3, 0).unwrap());
        let year_row = CacheEntry::from_counts(0, 4, 3, 1).unwrap();
        cache
            .replace_months(&facility, DiseaseType::Dm, 2024, month(10), &entries, year_row)
            .unwrap();

        let year = cache.read_year(&facility, DiseaseType::Dm, 2024).unwrap();
        assert_eq!(year[&month(9)].total_count(), 1);
        assert!(year[&month(10)].is_empty());
        assert_eq!(year[&month(11)].standard_count(), 3);
        assert!(year[&month(12)].is_empty());
        assert_eq!(
            cache.yearly_summary(&facility, DiseaseType::Dm, 2024).unwrap().total_count(),
            12
        );

        let reopened = FileCacheStore::new(temp_dir.path());
        assert_eq!(
            reopened.read_year_row(&facility, DiseaseType::Dm, 2024).unwrap(),
            year_row
        );
    }

    #[test]
    fn hand_edited_gender_counts_are_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cache = FileCacheStore::new(temp_dir.path());
        let facility = ShardableUuid::new();
        let path = cache.year_path(&facility, DiseaseType::Ht, 2024);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            format!(
                "facility: {facility}\ndisease: HT\nyear: 2024\nmonths:\n  - month: 1\n    male: 5\n    female: 0\n    total: 1\n    standard: 1\n    nonStandard: 0\n"
            ),
        )
        .unwrap();

        let key = CacheKey::new(facility, DiseaseType::Ht, 2024, month(1));
        assert!(matches!(cache.read(&key), Err(StatsError::Wire(_))));
    }

    #[test]
    fn corrupt_file_is_reported() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cache = FileCacheStore::new(temp_dir.path());
        let facility = ShardableUuid::new();
        let path = cache.year_path(&facility, DiseaseType::Ht, 2024);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "facility: nope\n").unwrap();

        let key = CacheKey::new(facility, DiseaseType::Ht, 2024, month(1));
        assert!(matches!(cache.read(&key), Err(StatsError::Wire(_))));
    }
}
