use super::{CacheEntry, CacheKey, CacheStore, YearRows};
use crate::model::FacilityId;
use crate::StatsResult;
use ptm_types::{DiseaseType, Gender, Month};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

type YearKey = (FacilityId, DiseaseType, i32);

/// Cache rows held in memory. One lock guards every year, so a months replacement is a
/// single exclusive write.
#[derive(Default)]
pub struct MemoryCacheStore {
    years: RwLock<HashMap<YearKey, YearRows>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
    ) -> StatsResult<YearRows> {
        let years = self.years.read()?;
        Ok(years
            .get(&(facility.clone(), disease, year))
            .copied()
            .unwrap_or_default())
    }
}

fn year_key(key: &CacheKey) -> YearKey {
    (key.facility.clone(), key.disease, key.year)
}

impl CacheStore for MemoryCacheStore {
    fn read(&self, key: &CacheKey) -> StatsResult<CacheEntry> {
        let years = self.years.read()?;
        Ok(years
            .get(&year_key(key))
            .and_then(|rows| rows.months[key.month.index()])
            .unwrap_or_default())
    }

    fn upsert(&self, key: &CacheKey, entry: CacheEntry) -> StatsResult<()> {
        let mut years = self.years.write()?;
        let rows = years.entry(year_key(key)).or_default();
        rows.months[key.month.index()] = Some(entry).filter(|e| !e.is_empty());
        Ok(())
    }

    fn increment(
        &self,
        key: &CacheKey,
        gender: Gender,
        is_standard: bool,
    ) -> StatsResult<CacheEntry> {
        let mut years = self.years.write()?;
        let rows = years.entry(year_key(key)).or_default();
        let slot = &mut rows.months[key.month.index()];
        let mut entry = slot.unwrap_or_default();
        entry.add_patient(gender, is_standard);
        *slot = Some(entry);
        Ok(entry)
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
        let mut years = self.years.write()?;
        years
            .entry((facility.clone(), disease, year))
            .or_default()
            .replace(from, entries, year_row);
        Ok(())
    }

    fn read_year_row(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
    ) -> StatsResult<CacheEntry> {
        Ok(self.rows(facility, disease, year)?.year.unwrap_or_default())
    }

    fn read_year(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
    ) -> StatsResult<BTreeMap<Month, CacheEntry>> {
        Ok(self.rows(facility, disease, year)?.month_map())
    }
}
