use ptm_types::DiseaseType;

/// Errors raised by the statistics engine.
///
/// Absence of data (an empty examination scope, a missing target, a missing cache row) is
/// never an error. These variants cover malformed input, unknown references and storage
/// failures only.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("malformed examination {id}: {reason}")]
    MalformedExamination { id: String, reason: String },
    #[error("expected {expected} examinations, found a {found} examination")]
    DiseaseMismatch {
        expected: DiseaseType,
        found: DiseaseType,
    },
    #[error("examination {0} is archived and cannot be changed")]
    ArchivedExamination(String),
    #[error("unknown patient {0}")]
    UnknownPatient(String),
    #[error("unknown examination {0}")]
    UnknownExamination(String),

    #[error("failed to create cache directory: {0}")]
    CacheDirCreation(std::io::Error),
    #[error("failed to read cache file: {0}")]
    CacheRead(std::io::Error),
    #[error("failed to write cache file: {0}")]
    CacheWrite(std::io::Error),
    #[error("failed to read dataset file {path}: {source}", path = path.display())]
    DatasetRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("wire error: {0}")]
    Wire(#[from] ptm_wire::WireError),
    #[error("invalid identifier: {0}")]
    Uuid(#[from] ptm_uuid::UuidError),
    #[error("invalid value: {0}")]
    Types(#[from] ptm_types::TypesError),
}

pub type StatsResult<T> = std::result::Result<T, StatsError>;

impl<T> From<std::sync::PoisonError<T>> for StatsError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        StatsError::LockPoisoned
    }
}
