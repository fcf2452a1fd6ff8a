//! Yearly programme target wire model (`targets.yaml`).
//!
//! One numeric target per facility, disease and year. Targets are set by administrators and
//! are read-only to the statistics engine.

use crate::{parse_wire, render_wire, WireError, WireResult};
use ptm_types::DiseaseType;
use ptm_uuid::ShardableUuid;
use serde::{Deserialize, Serialize};

/// A yearly target for one facility and disease.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetData {
    pub facility: ShardableUuid,
    pub disease: DiseaseType,
    pub year: i32,
    pub target: u32,
}

/// `targets.yaml` operations.
pub struct Targets;

impl Targets {
    /// Parse yearly targets from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`WireError`] on schema mismatch, bad identifiers or disease codes, or when the
    /// same (facility, disease, year) is targeted twice.
    pub fn parse(yaml_text: &str) -> WireResult<Vec<TargetData>> {
        let wire: TargetsWire = parse_wire(yaml_text, "Targets")?;

        let mut targets: Vec<TargetData> = Vec::with_capacity(wire.targets.len());
        for (index, t) in wire.targets.into_iter().enumerate() {
            let facility = ShardableUuid::parse(&t.facility)
                .map_err(|e| WireError::Translation(format!("targets.{index}.facility: {e}")))?;
            let data = TargetData {
                facility,
                disease: t.disease.parse()?,
                year: t.year,
                target: t.target,
            };

            if targets.iter().any(|existing| {
                existing.facility == data.facility
                    && existing.disease == data.disease
                    && existing.year == data.year
            }) {
                return Err(WireError::InvalidInput(format!(
                    "duplicate target for facility {} {} {}",
                    data.facility, data.disease, data.year
                )));
            }
            targets.push(data);
        }
        Ok(targets)
    }

    /// Render yearly targets as YAML text.
    pub fn render(targets: &[TargetData]) -> WireResult<String> {
        let wire = TargetsWire {
            targets: targets
                .iter()
                .map(|t| TargetWire {
                    facility: t.facility.to_string(),
                    disease: t.disease.code().to_string(),
                    year: t.year,
                    target: t.target,
                })
                .collect(),
        };
        render_wire(&wire, "targets")
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct TargetsWire {
    #[serde(default)]
    pub targets: Vec<TargetWire>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct TargetWire {
    pub facility: String,
    pub disease: String,
    pub year: i32,
    pub target: u32,
}
