//! Wire/boundary support for the on-disk statistics dataset.
//!
//! This crate provides **wire models** and **format/translation helpers** for the YAML files
//! the engine reads and writes:
//! - the facility roster and patient register
//! - the examination log (the Examination Store's source of truth)
//! - yearly programme targets
//! - persisted statistics-cache year files
//!
//! Each facade parses strictly (unknown keys rejected, failing field path reported) and hands
//! back domain-level carriers built from validated primitives. Wire structs stay private.

pub mod cache;
pub mod examination;
pub mod roster;
pub mod target;

pub use cache::{CacheMonthData, CacheYear, CacheYearData};
pub use examination::{ExaminationData, Examinations, MeasurementData};
pub use roster::{FacilityData, Facilities, PatientData, Patients};
pub use target::{TargetData, Targets};

/// Errors returned by the `ptm-wire` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("translation error: {0}")]
    Translation(String),

    #[error("invalid identifier: {0}")]
    InvalidUuid(#[from] ptm_uuid::UuidError),

    #[error("invalid value: {0}")]
    InvalidValue(#[from] ptm_types::TypesError),
}

/// Type alias for Results that can fail with a [`WireError`].
pub type WireResult<T> = Result<T, WireError>;

/// Deserialise YAML text into a wire struct, reporting the path of the failing field.
///
/// `label` names the document kind in error messages (for example `Examinations`).
pub(crate) fn parse_wire<T>(yaml_text: &str, label: &str) -> WireResult<T>
where
    T: serde::de::DeserializeOwned,
{
    let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

    serde_path_to_error::deserialize::<_, T>(deserializer).map_err(|err| {
        let path = err.path().to_string();
        let source = err.into_inner();
        let path = if path.is_empty() {
            "<root>"
        } else {
            path.as_str()
        };
        WireError::Translation(format!("{label} schema mismatch at {path}: {source}"))
    })
}

/// Serialise a wire struct to YAML text.
pub(crate) fn render_wire<T>(wire: &T, label: &str) -> WireResult<String>
where
    T: serde::Serialize,
{
    serde_yaml::to_string(wire)
        .map_err(|e| WireError::Translation(format!("Failed to serialise {label}: {e}")))
}
