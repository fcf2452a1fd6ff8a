//! Facility roster and patient register wire models.
//!
//! Responsibilities:
//! - Define public domain-level carriers for facilities and registered patients
//! - Define a strict wire model for `facilities.yaml` and `patients.yaml`
//! - Translate between the two, validating identifiers, genders and dates
//!
//! Patients belong to exactly one facility. The register does not carry the per-year activity
//! sets; those are derived from the examination log when the dataset is loaded.

use crate::{parse_wire, render_wire, WireError, WireResult};
use chrono::NaiveDate;
use ptm_types::{Gender, NonEmptyText};
use ptm_uuid::ShardableUuid;
use serde::{Deserialize, Serialize};

// ============================================================================
// Public domain-level types
// ============================================================================

/// A community health facility.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FacilityData {
    pub id: ShardableUuid,
    pub name: NonEmptyText,
}

/// A registered patient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatientData {
    pub id: ShardableUuid,
    /// Facility the patient is registered at. Fixed for the patient's lifetime.
    pub facility: ShardableUuid,
    pub gender: Gender,
    pub birth_date: Option<NaiveDate>,
}

// ============================================================================
// Facades
// ============================================================================

/// `facilities.yaml` operations.
pub struct Facilities;

impl Facilities {
    /// Parse the facility roster from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`WireError`] if the document does not match the schema, a facility id is not
    /// canonical, a name is blank, or an id appears twice.
    pub fn parse(yaml_text: &str) -> WireResult<Vec<FacilityData>> {
        let wire: FacilitiesWire = parse_wire(yaml_text, "Facilities")?;

        let mut facilities = Vec::with_capacity(wire.facilities.len());
        for (index, f) in wire.facilities.into_iter().enumerate() {
            let id = ShardableUuid::parse(&f.id).map_err(|e| {
                WireError::Translation(format!("facilities.{index}.id: {e}"))
            })?;
            if facilities.iter().any(|existing: &FacilityData| existing.id == id) {
                return Err(WireError::InvalidInput(format!(
                    "duplicate facility id {id}"
                )));
            }
            facilities.push(FacilityData {
                id,
                name: NonEmptyText::new(&f.name)?,
            });
        }
        Ok(facilities)
    }

    /// Render the facility roster as YAML text.
    pub fn render(facilities: &[FacilityData]) -> WireResult<String> {
        let wire = FacilitiesWire {
            facilities: facilities
                .iter()
                .map(|f| FacilityWire {
                    id: f.id.to_string(),
                    name: f.name.to_string(),
                })
                .collect(),
        };
        render_wire(&wire, "facilities")
    }
}

/// `patients.yaml` operations.
pub struct Patients;

impl Patients {
    /// Parse the patient register from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`WireError`] on schema mismatch, non-canonical ids, unknown gender codes or
    /// unparseable birth dates.
    pub fn parse(yaml_text: &str) -> WireResult<Vec<PatientData>> {
        let wire: PatientsWire = parse_wire(yaml_text, "Patients")?;

        wire.patients
            .into_iter()
            .enumerate()
            .map(|(index, p)| wire_to_patient(index, p))
            .collect()
    }

    /// Render the patient register as YAML text.
    pub fn render(patients: &[PatientData]) -> WireResult<String> {
        let wire = PatientsWire {
            patients: patients
                .iter()
                .map(|p| PatientWire {
                    id: p.id.to_string(),
                    facility: p.facility.to_string(),
                    gender: match p.gender {
                        ptm_types::Gender::Unknown => None,
                        g => Some(g.code().to_string()),
                    },
                    birth_date: p.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
                })
                .collect(),
        };
        render_wire(&wire, "patients")
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct FacilitiesWire {
    #[serde(default)]
    pub facilities: Vec<FacilityWire>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct FacilityWire {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct PatientsWire {
    #[serde(default)]
    pub patients: Vec<PatientWire>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct PatientWire {
    pub id: String,

    pub facility: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,

    #[serde(rename = "birthDate", default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn wire_to_patient(index: usize, wire: PatientWire) -> WireResult<PatientData> {
    let id = ShardableUuid::parse(&wire.id)
        .map_err(|e| WireError::Translation(format!("patients.{index}.id: {e}")))?;
    let facility = ShardableUuid::parse(&wire.facility)
        .map_err(|e| WireError::Translation(format!("patients.{index}.facility: {e}")))?;

    let gender = match wire.gender.as_deref() {
        Some(code) => code.parse::<Gender>()?,
        None => Gender::Unknown,
    };

    let birth_date = wire
        .birth_date
        .as_deref()
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .map_err(|e| WireError::Translation(format!("patients.{index}.birthDate: {e}")))?;

    Ok(PatientData {
        id,
        facility,
        gender,
        birth_date,
    })
}
