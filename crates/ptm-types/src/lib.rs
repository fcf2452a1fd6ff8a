//! Validated primitive types shared by every PTM crate.
//!
//! Once one of these values exists it is known to be well-formed, so the
//! statistics engine never re-checks month ranges or disease codes.

use std::fmt;
use std::str::FromStr;

/// Errors that can occur when constructing validated primitives.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TypesError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// Month outside 1..=12
    #[error("month must be between 1 and 12, got {0}")]
    MonthOutOfRange(u32),
    /// Unrecognised disease programme code
    #[error("unknown disease type '{0}' (expected HT or DM)")]
    UnknownDisease(String),
    /// Unrecognised gender code
    #[error("unknown gender '{0}'")]
    UnknownGender(String),
    /// Unrecognised diabetes examination code
    #[error("unknown diabetes examination type '{0}' (expected HBA1C, GDP, GD2JPP or GDSP)")]
    UnknownExamKind(String),
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TypesError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TypesError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// A calendar month, guaranteed to be in `1..=12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month(u8);

impl Month {
    pub const JANUARY: Month = Month(1);
    pub const DECEMBER: Month = Month(12);

    /// Creates a month from its 1-based calendar number.
    pub fn new(number: u32) -> Result<Self, TypesError> {
        if (1..=12).contains(&number) {
            Ok(Self(number as u8))
        } else {
            Err(TypesError::MonthOutOfRange(number))
        }
    }

    /// Returns the 1-based calendar number.
    pub fn number(self) -> u32 {
        u32::from(self.0)
    }

    /// Zero-based position, convenient for indexing twelve-slot arrays.
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    /// All twelve months in calendar order.
    pub fn all() -> impl Iterator<Item = Month> {
        (1..=12u8).map(Month)
    }

    /// Months from `self` through `last`, inclusive. Empty when `last < self`.
    pub fn through(self, last: Month) -> impl Iterator<Item = Month> {
        (self.0..=last.0).map(Month)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl TryFrom<u32> for Month {
    type Error = TypesError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Month::new(value)
    }
}

impl serde::Serialize for Month {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Month {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let n = u32::deserialize(deserializer)?;
        Month::new(n).map_err(serde::de::Error::custom)
    }
}

/// Chronic-disease programme track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiseaseType {
    /// Hypertension.
    Ht,
    /// Diabetes mellitus.
    Dm,
}

impl DiseaseType {
    pub const ALL: [DiseaseType; 2] = [DiseaseType::Ht, DiseaseType::Dm];

    /// Short programme code used on disk and on the command line.
    pub fn code(self) -> &'static str {
        match self {
            DiseaseType::Ht => "HT",
            DiseaseType::Dm => "DM",
        }
    }
}

impl fmt::Display for DiseaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DiseaseType {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HT" => Ok(DiseaseType::Ht),
            "DM" => Ok(DiseaseType::Dm),
            _ => Err(TypesError::UnknownDisease(s.to_string())),
        }
    }
}

/// Laboratory test behind a diabetes examination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DmExamKind {
    /// Glycated haemoglobin, in percent.
    HbA1c,
    /// Fasting plasma glucose (GDP), mg/dL.
    FastingGlucose,
    /// Two-hour post-prandial glucose (GD2JPP), mg/dL.
    PostPrandialGlucose,
    /// Random plasma glucose (GDSP), mg/dL. Never counts towards control.
    RandomGlucose,
}

impl DmExamKind {
    pub fn code(self) -> &'static str {
        match self {
            DmExamKind::HbA1c => "HBA1C",
            DmExamKind::FastingGlucose => "GDP",
            DmExamKind::PostPrandialGlucose => "GD2JPP",
            DmExamKind::RandomGlucose => "GDSP",
        }
    }
}

impl fmt::Display for DmExamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DmExamKind {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HBA1C" => Ok(DmExamKind::HbA1c),
            "GDP" => Ok(DmExamKind::FastingGlucose),
            "GD2JPP" => Ok(DmExamKind::PostPrandialGlucose),
            "GDSP" => Ok(DmExamKind::RandomGlucose),
            _ => Err(TypesError::UnknownExamKind(s.to_string())),
        }
    }
}

/// Registered gender of a patient.
///
/// `Unknown` patients are counted in totals but in neither gender bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Gender {
    pub fn code(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Unknown => "unknown",
        }
    }
}

impl FromStr for Gender {
    type Err = TypesError;

    /// Accepts the English codes as well as the `L`/`P` (laki-laki/perempuan)
    /// codes used on facility registration forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" | "l" | "laki-laki" => Ok(Gender::Male),
            "female" | "f" | "p" | "perempuan" => Ok(Gender::Female),
            "unknown" | "" => Ok(Gender::Unknown),
            _ => Err(TypesError::UnknownGender(s.to_string())),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Serialise coded enums as their wire code.
macro_rules! serialize_as_code {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl serde::Serialize for $ty {
                fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
                where
                    S: serde::Serializer,
                {
                    serializer.serialize_str(self.code())
                }
            }
        )+
    };
}

serialize_as_code!(DiseaseType, DmExamKind, Gender);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_and_rejects_blank() {
        assert_eq!(NonEmptyText::new("  Puskesmas Kota  ").unwrap().as_str(), "Puskesmas Kota");
        assert_eq!(NonEmptyText::new("   "), Err(TypesError::Empty));
    }

    #[test]
    fn month_bounds() {
        assert!(Month::new(0).is_err());
        assert!(Month::new(13).is_err());
        assert_eq!(Month::new(12).unwrap(), Month::DECEMBER);
        assert_eq!(Month::new(3).unwrap().index(), 2);
    }

    #[test]
    fn month_through_is_inclusive_and_empty_when_reversed() {
        let from = Month::new(9).unwrap();
        let months: Vec<u32> = from.through(Month::DECEMBER).map(Month::number).collect();
        assert_eq!(months, vec![9, 10, 11, 12]);
        assert_eq!(Month::DECEMBER.through(from).count(), 0);
    }

    #[test]
    fn month_deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<Month>("13").is_err());
        assert_eq!(serde_json::from_str::<Month>("7").unwrap().number(), 7);
    }

    #[test]
    fn disease_codes_parse_case_insensitively() {
        assert_eq!("ht".parse::<DiseaseType>().unwrap(), DiseaseType::Ht);
        assert_eq!(" DM ".parse::<DiseaseType>().unwrap(), DiseaseType::Dm);
        assert!("TB".parse::<DiseaseType>().is_err());
    }

    #[test]
    fn exam_kind_codes() {
        assert_eq!("hba1c".parse::<DmExamKind>().unwrap(), DmExamKind::HbA1c);
        assert_eq!("GD2JPP".parse::<DmExamKind>().unwrap(), DmExamKind::PostPrandialGlucose);
        assert_eq!(DmExamKind::RandomGlucose.code(), "GDSP");
        assert!("OGTT".parse::<DmExamKind>().is_err());
    }

    #[test]
    fn coded_enums_serialize_as_codes() {
        assert_eq!(serde_json::to_string(&DiseaseType::Ht).unwrap(), "\"HT\"");
        assert_eq!(serde_json::to_string(&DmExamKind::FastingGlucose).unwrap(), "\"GDP\"");
        assert_eq!(serde_json::to_string(&Gender::Unknown).unwrap(), "\"unknown\"");
    }

    #[test]
    fn gender_accepts_registration_codes() {
        assert_eq!("L".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!("p".parse::<Gender>().unwrap(), Gender::Female);
        assert_eq!("".parse::<Gender>().unwrap(), Gender::Unknown);
        assert!("x".parse::<Gender>().is_err());
    }
}
