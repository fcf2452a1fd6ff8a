//! Persisted statistics-cache year file.
//!
//! One file holds the twelve monthly rows of a single (facility, disease, year) plus a year row
//! counting each patient once. Months with no row are omitted; absence means zero. The
//! standard percentage is derived on read and never stored.
//!
//! ```yaml
//! facility: 550e8400e29b41d4a716446655440000
//! disease: HT
//! year: 2024
//! months:
//!   - month: 3
//!     male: 4
//!     female: 6
//!     total: 10
//!     standard: 7
//!     nonStandard: 3
//! yearRow:
//!   male: 4
//!   female: 6
//!   total: 10
//!   standard: 7
//!   nonStandard: 3
//! ```

use crate::{parse_wire, render_wire, WireError, WireResult};
use ptm_types::{DiseaseType, Month};
use ptm_uuid::ShardableUuid;
use serde::{Deserialize, Serialize};

/// Counts stored for one month.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheMonthData {
    pub male: u32,
    pub female: u32,
    pub total: u32,
    pub standard: u32,
    pub non_standard: u32,
}

/// All stored months of one (facility, disease, year).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheYearData {
    pub facility: ShardableUuid,
    pub disease: DiseaseType,
    pub year: i32,
    /// Indexed by `Month::index()`. `None` means no row.
    pub months: [Option<CacheMonthData>; 12],
    /// Distinct patients over the whole year. `None` until a recompute writes it.
    pub year_row: Option<CacheMonthData>,
}

impl CacheYearData {
    pub fn empty(facility: ShardableUuid, disease: DiseaseType, year: i32) -> Self {
        Self {
            facility,
            disease,
            year,
            months: [None; 12],
            year_row: None,
        }
    }
}

/// Cache year file operations.
pub struct CacheYear;

impl CacheYear {
    /// Parse a cache year file.
    ///
    /// # Errors
    ///
    /// Returns [`WireError`] on schema mismatch, invalid months, duplicated months, when
    /// `total` disagrees with `standard + nonStandard`, or when `male + female` exceeds `total`.
    pub fn parse(yaml_text: &str) -> WireResult<CacheYearData> {
        let wire: CacheYearWire = parse_wire(yaml_text, "CacheYear")?;

        let facility = ShardableUuid::parse(&wire.facility)
            .map_err(|e| WireError::Translation(format!("facility: {e}")))?;
        let mut data = CacheYearData::empty(facility, wire.disease.parse()?, wire.year);

        for row in wire.months {
            let month = Month::new(row.month)?;
            let counts = row.counts().checked(&format!("month {month}"))?;
            let slot = &mut data.months[month.index()];
            if slot.is_some() {
                return Err(WireError::InvalidInput(format!("month {month} appears twice")));
            }
            *slot = Some(counts);
        }
        data.year_row = wire
            .year_row
            .map(|row| row.checked("year row"))
            .transpose()?;

        Ok(data)
    }

    /// Render a cache year file.
    pub fn render(data: &CacheYearData) -> WireResult<String> {
        let months = Month::all()
            .filter_map(|month| {
                data.months[month.index()].map(|m| CacheMonthWire {
                    month: month.number(),
                    male: m.male,
                    female: m.female,
                    total: m.total,
                    standard: m.standard,
                    non_standard: m.non_standard,
                })
            })
            .collect();

        let wire = CacheYearWire {
            facility: data.facility.to_string(),
            disease: data.disease.code().to_string(),
            year: data.year,
            months,
            year_row: data.year_row.map(CacheCountsWire::from),
        };
        render_wire(&wire, "cache year")
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct CacheYearWire {
    pub facility: String,
    pub disease: String,
    pub year: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub months: Vec<CacheMonthWire>,
    #[serde(
        default,
        rename = "yearRow",
        skip_serializing_if = "Option::is_none"
    )]
    pub year_row: Option<CacheCountsWire>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct CacheMonthWire {
    pub month: u32,
    pub male: u32,
    pub female: u32,
    pub total: u32,
    pub standard: u32,
    #[serde(rename = "nonStandard")]
    pub non_standard: u32,
}

impl CacheMonthWire {
    fn counts(&self) -> CacheCountsWire {
        CacheCountsWire {
            male: self.male,
            female: self.female,
            total: self.total,
            standard: self.standard,
            non_standard: self.non_standard,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct CacheCountsWire {
    pub male: u32,
    pub female: u32,
    pub total: u32,
    pub standard: u32,
    #[serde(rename = "nonStandard")]
    pub non_standard: u32,
}

impl CacheCountsWire {
    fn checked(self, label: &str) -> WireResult<CacheMonthData> {
        if self.standard.checked_add(self.non_standard) != Some(self.total) {
            return Err(WireError::InvalidInput(format!(
                "{label}: total {} does not equal standard {} + nonStandard {}",
                self.total, self.standard, self.non_standard
            )));
        }
        if u64::from(self.male) + u64::from(self.female) > u64::from(self.total) {
            return Err(WireError::InvalidInput(format!(
                "{label}: male {} + female {} exceeds total {}",
                self.male, self.female, self.total
            )));
        }
        Ok(CacheMonthData {
            male: self.male,
            female: self.female,
            total: self.total,
            standard: self.standard,
            non_standard: self.non_standard,
        })
    }
}

impl From<CacheMonthData> for CacheCountsWire {
    fn from(m: CacheMonthData) -> Self {
        Self {
            male: m.male,
            female: m.female,
            total: m.total,
            standard: m.standard,
            non_standard: m.non_standard,
        }
    }
}
