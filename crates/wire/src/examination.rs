//! Examination log wire model.
//!
//! `examinations.yaml` is an append-only list of clinical measurement events. Each entry carries
//! exactly one disease-specific field set:
//!
//! ```yaml
//! examinations:
//!   - id: 0f0e...
//!     patient: 90a8...
//!     facility: 550e...
//!     disease: HT
//!     date: 2024-03-05
//!     systolic: 130
//!     diastolic: 85
//!   - id: 1a2b...
//!     patient: 90a8...
//!     facility: 550e...
//!     disease: DM
//!     date: 2024-03-05
//!     examType: GDP
//!     result: 110
//! ```
//!
//! A null reading (for example a missing diastolic value) is preserved as `None`. An entry with
//! no recognised field set for its disease, or with fields of the other disease, is malformed.

use crate::{parse_wire, render_wire, WireError, WireResult};
use chrono::NaiveDate;
use ptm_types::{DiseaseType, DmExamKind};
use ptm_uuid::ShardableUuid;
use serde::{Deserialize, Serialize};

// ============================================================================
// Public domain-level types
// ============================================================================

/// Disease-specific payload of one examination.
#[derive(Clone, Debug, PartialEq)]
pub enum MeasurementData {
    Hypertension {
        systolic: Option<u16>,
        diastolic: Option<u16>,
    },
    Diabetes {
        kind: DmExamKind,
        result: Option<f64>,
    },
}

impl MeasurementData {
    pub fn disease(&self) -> DiseaseType {
        match self {
            MeasurementData::Hypertension { .. } => DiseaseType::Ht,
            MeasurementData::Diabetes { .. } => DiseaseType::Dm,
        }
    }
}

/// One examination as recorded in the log.
#[derive(Clone, Debug, PartialEq)]
pub struct ExaminationData {
    pub id: ShardableUuid,
    pub patient: ShardableUuid,
    pub facility: ShardableUuid,
    pub date: NaiveDate,
    pub measurement: MeasurementData,
}

// ============================================================================
// Facade
// ============================================================================

/// `examinations.yaml` operations.
pub struct Examinations;

impl Examinations {
    /// Parse the examination log from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`WireError`] on schema mismatch, non-canonical ids, bad dates, unknown disease
    /// or exam-type codes, and malformed field sets.
    pub fn parse(yaml_text: &str) -> WireResult<Vec<ExaminationData>> {
        let wire: ExaminationsWire = parse_wire(yaml_text, "Examinations")?;

        wire.examinations
            .into_iter()
            .enumerate()
            .map(|(index, e)| wire_to_domain(index, e))
            .collect()
    }

    /// Render the examination log as YAML text.
    pub fn render(examinations: &[ExaminationData]) -> WireResult<String> {
        let wire = ExaminationsWire {
            examinations: examinations.iter().map(domain_to_wire).collect(),
        };
        render_wire(&wire, "examinations")
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct ExaminationsWire {
    #[serde(default)]
    pub examinations: Vec<ExaminationWire>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct ExaminationWire {
    pub id: String,
    pub patient: String,
    pub facility: String,
    pub disease: String,
    pub date: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub systolic: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diastolic: Option<u16>,

    #[serde(rename = "examType", default, skip_serializing_if = "Option::is_none")]
    pub exam_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<f64>,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn wire_to_domain(index: usize, wire: ExaminationWire) -> WireResult<ExaminationData> {
    let field = |name: &str, e: &dyn std::fmt::Display| {
        WireError::Translation(format!("examinations.{index}.{name}: {e}"))
    };

    let id = ShardableUuid::parse(&wire.id).map_err(|e| field("id", &e))?;
    let patient = ShardableUuid::parse(&wire.patient).map_err(|e| field("patient", &e))?;
    let facility = ShardableUuid::parse(&wire.facility).map_err(|e| field("facility", &e))?;
    let date = NaiveDate::parse_from_str(&wire.date, "%Y-%m-%d").map_err(|e| field("date", &e))?;
    let disease = wire.disease.parse::<DiseaseType>()?;

    let has_ht_fields = wire.systolic.is_some() || wire.diastolic.is_some();
    let has_dm_fields = wire.exam_type.is_some() || wire.result.is_some();

    let measurement = match disease {
        DiseaseType::Ht => {
            if has_dm_fields {
                return Err(malformed(index, "HT examination carries diabetes fields"));
            }
            if !has_ht_fields {
                return Err(malformed(index, "HT examination has neither systolic nor diastolic"));
            }
            MeasurementData::Hypertension {
                systolic: wire.systolic,
                diastolic: wire.diastolic,
            }
        }
        DiseaseType::Dm => {
            if has_ht_fields {
                return Err(malformed(index, "DM examination carries blood pressure fields"));
            }
            let Some(code) = wire.exam_type.as_deref() else {
                return Err(malformed(index, "DM examination has no examType"));
            };
            MeasurementData::Diabetes {
                kind: code.parse::<DmExamKind>()?,
                result: wire.result,
            }
        }
    };

    Ok(ExaminationData {
        id,
        patient,
        facility,
        date,
        measurement,
    })
}

fn malformed(index: usize, reason: &str) -> WireError {
    WireError::InvalidInput(format!("examinations.{index}: {reason}"))
}

fn domain_to_wire(data: &ExaminationData) -> ExaminationWire {
    let mut wire = ExaminationWire {
        id: data.id.to_string(),
        patient: data.patient.to_string(),
        facility: data.facility.to_string(),
        disease: data.measurement.disease().code().to_string(),
        date: data.date.format("%Y-%m-%d").to_string(),
        systolic: None,
        diastolic: None,
        exam_type: None,
        result: None,
    };

    match &data.measurement {
        MeasurementData::Hypertension {
            systolic,
            diastolic,
        } => {
            wire.systolic = *systolic;
            wire.diastolic = *diastolic;
        }
        MeasurementData::Diabetes { kind, result } => {
            wire.exam_type = Some(kind.code().to_string());
            wire.result = *result;
        }
    }

    wire
}
