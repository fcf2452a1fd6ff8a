//! Statistics cache.
//!
//! A materialised view of aggregator output keyed by (facility, disease, year, month). Readers
//! never create rows: a missing row reads as zero. Writers either replace rows wholesale after a
//! recompute or bump counters on the single-examination fast path.
//!
//! Next to the twelve monthly rows each year keeps a year row, the aggregate of the whole-year
//! scope. It counts each patient once and is only written by a recompute.
//!
//! Two implementations are provided:
//! - [`MemoryCacheStore`] for tests and one-shot runs
//! - [`FileCacheStore`] which keeps one YAML file per (facility, disease, year)

mod file;
mod memory;

pub use file::FileCacheStore;
pub use memory::MemoryCacheStore;

use crate::model::FacilityId;
use crate::percentage::percentage;
use crate::{StatsError, StatsResult};
use ptm_types::{DiseaseType, Gender, Month};
use ptm_wire::CacheMonthData;
use serde::ser::SerializeStruct;
use serde::Serialize;
use std::collections::BTreeMap;

/// Identifies one monthly cache row.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CacheKey {
    pub facility: FacilityId,
    pub disease: DiseaseType,
    pub year: i32,
    pub month: Month,
}

impl CacheKey {
    pub fn new(facility: FacilityId, disease: DiseaseType, year: i32, month: Month) -> Self {
        Self {
            facility,
            disease,
            year,
            month,
        }
    }
}

/// Count tuple held by one cache row.
///
/// `total_count` always equals `standard_count + non_standard_count`. Patients of unknown
/// gender are in the total but in neither gender bucket, so `male + female <= total`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheEntry {
    male_count: u32,
    female_count: u32,
    standard_count: u32,
    non_standard_count: u32,
}

impl CacheEntry {
    /// # Errors
    ///
    /// Returns [`StatsError::InvalidInput`] when the gender buckets exceed the total.
    pub fn from_counts(
        male_count: u32,
        female_count: u32,
        standard_count: u32,
        non_standard_count: u32,
    ) -> StatsResult<Self> {
        let entry = Self {
            male_count,
            female_count,
            standard_count,
            non_standard_count,
        };
        if u64::from(male_count) + u64::from(female_count) > u64::from(entry.total_count()) {
            return Err(StatsError::InvalidInput(format!(
                "gender counts {male_count}+{female_count} exceed total {}",
                entry.total_count()
            )));
        }
        Ok(entry)
    }

    pub fn male_count(&self) -> u32 {
        self.male_count
    }

    pub fn female_count(&self) -> u32 {
        self.female_count
    }

    pub fn total_count(&self) -> u32 {
        self.standard_count.saturating_add(self.non_standard_count)
    }

    pub fn standard_count(&self) -> u32 {
        self.standard_count
    }

    pub fn non_standard_count(&self) -> u32 {
        self.non_standard_count
    }

    /// `standard / total * 100` to two decimals, 0 for an empty row.
    pub fn standard_percentage(&self) -> f64 {
        percentage(self.standard_count, self.total_count())
    }

    pub fn is_empty(&self) -> bool {
        self.total_count() == 0
    }

    /// Count one more patient.
    pub fn add_patient(&mut self, gender: Gender, is_standard: bool) {
        match gender {
            Gender::Male => self.male_count = self.male_count.saturating_add(1),
            Gender::Female => self.female_count = self.female_count.saturating_add(1),
            Gender::Unknown => {}
        }
        if is_standard {
            self.standard_count = self.standard_count.saturating_add(1);
        } else {
            self.non_standard_count = self.non_standard_count.saturating_add(1);
        }
    }

    /// Field-wise sum.
    pub fn merged(self, other: CacheEntry) -> CacheEntry {
        CacheEntry {
            male_count: self.male_count.saturating_add(other.male_count),
            female_count: self.female_count.saturating_add(other.female_count),
            standard_count: self.standard_count.saturating_add(other.standard_count),
            non_standard_count: self.non_standard_count.saturating_add(other.non_standard_count),
        }
    }

    pub(crate) fn from_month_data(data: CacheMonthData) -> StatsResult<Self> {
        Self::from_counts(data.male, data.female, data.standard, data.non_standard)
    }

    pub(crate) fn to_month_data(self) -> CacheMonthData {
        CacheMonthData {
            male: self.male_count,
            female: self.female_count,
            total: self.total_count(),
            standard: self.standard_count,
            non_standard: self.non_standard_count,
        }
    }
}

impl Serialize for CacheEntry {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut s = serializer.serialize_struct("CacheEntry", 6)?;
        s.serialize_field("male_count", &self.male_count)?;
        s.serialize_field("female_count", &self.female_count)?;
        s.serialize_field("total_count", &self.total_count())?;
        s.serialize_field("standard_count", &self.standard_count)?;
        s.serialize_field("non_standard_count", &self.non_standard_count)?;
        s.serialize_field("standard_percentage", &self.standard_percentage())?;
        s.end()
    }
}

/// Durable store of monthly cache rows.
///
/// Implementations must make [`CacheStore::replace_months`] atomic for readers: a reader sees
/// either every replaced month from before the call or every month from after it.
pub trait CacheStore: Send + Sync {
    /// Read one row. Absent rows read as zero.
    fn read(&self, key: &CacheKey) -> StatsResult<CacheEntry>;

    /// Replace one row wholesale.
    fn upsert(&self, key: &CacheKey, entry: CacheEntry) -> StatsResult<()>;

    /// Count one more patient in a row and return the updated row.
    ///
    /// This is only approximate after a backfill: a new examination can flip a patient's
    /// standard status in later months. Follow it with a recompute when exact numbers matter.
    fn increment(&self, key: &CacheKey, gender: Gender, is_standard: bool)
        -> StatsResult<CacheEntry>;

    /// Replace months `from..=December` and the year row of one (facility, disease, year) in a
    /// single write. Months in that range missing from `entries` become empty.
    fn replace_months(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
        from: Month,
        entries: &BTreeMap<Month, CacheEntry>,
        year_row: CacheEntry,
    ) -> StatsResult<()>;

    /// The year row: whole-year scope counts, each patient once. Zero until recomputed.
    fn read_year_row(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
    ) -> StatsResult<CacheEntry>;

    /// All twelve months of one (facility, disease, year), zero where absent.
    fn read_year(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
    ) -> StatsResult<BTreeMap<Month, CacheEntry>>;

    /// Sum of the twelve monthly rows.
    ///
    /// A patient seen in several months is counted once per month. This is a plain sum and
    /// does not re-run the continuity rule. Use [`CacheStore::read_year_row`] for patient
    /// counts.
    fn yearly_summary(
        &self,
        facility: &FacilityId,
        disease: DiseaseType,
        year: i32,
    ) -> StatsResult<CacheEntry> {
        Ok(self
            .read_year(facility, disease, year)?
            .into_values()
            .fold(CacheEntry::default(), CacheEntry::merged))
    }
}

/// Stored rows of one (facility, disease, year). `None` means no row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct YearRows {
    pub months: [Option<CacheEntry>; 12],
    pub year: Option<CacheEntry>,
}

impl YearRows {
    pub fn replace(
        &mut self,
        from: Month,
        entries: &BTreeMap<Month, CacheEntry>,
        year_row: CacheEntry,
    ) {
        for month in from.through(Month::DECEMBER) {
            self.months[month.index()] = entries.get(&month).copied().filter(|e| !e.is_empty());
        }
        self.year = Some(year_row).filter(|e| !e.is_empty());
    }

    pub fn month_map(&self) -> BTreeMap<Month, CacheEntry> {
        Month::all()
            .map(|m| (m, self.months[m.index()].unwrap_or_default()))
            .collect()
    }
}
