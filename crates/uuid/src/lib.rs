//! Identifiers for facilities, patients and examinations.
//!
//! Every identifier in the dataset and on the command line is written as 32 lowercase hex
//! characters with no hyphens, for example `550e8400e29b41d4a716446655440000`.
//! [`ShardableUuid`] only ever holds values that were accepted in that form, so its string
//! form can be used directly as a file-system path component.
//!
//! The statistics cache spreads its year files over two levels of shard directories taken
//! from the first four hex characters:
//!
//! ```text
//! ptm_data/cache/55/0e/550e8400e29b41d4a716446655440000/ht/2024.yaml
//! ```

mod service;

pub use service::{ShardableUuid, Uuid};

#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    #[error("invalid identifier: {0}")]
    InvalidInput(String),
}

pub type UuidResult<T> = Result<T, UuidError>;
