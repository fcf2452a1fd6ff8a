//! Input validation utilities.
//!
//! Adapters (CLI, runners) translate user input into scopes; these checks run before any
//! store is touched so nonsense years never reach the aggregator.

use crate::constants::{MAX_SCOPE_YEAR, MIN_SCOPE_YEAR};
use crate::{StatsError, StatsResult};

/// Validates that `year` is a plausible programme year.
///
/// # Errors
///
/// Returns a `StatsError::InvalidInput` if the year is outside
/// `MIN_SCOPE_YEAR..=MAX_SCOPE_YEAR`.
pub fn validate_scope_year(year: i32) -> StatsResult<()> {
    if !(MIN_SCOPE_YEAR..=MAX_SCOPE_YEAR).contains(&year) {
        return Err(StatsError::InvalidInput(format!(
            "year {year} is outside the supported range {MIN_SCOPE_YEAR}..={MAX_SCOPE_YEAR}"
        )));
    }
    Ok(())
}
