// ⚠️ Resolution Errors - Expected, data-dependent outcomes
// None of these abort a batch: the pipeline folds every one into Unmatched.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// RESOLVE ERROR
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ResolveError {
    /// Sender has no `<` delimiter, so there is no address segment to compare
    #[error("sender has no angle-bracket address segment")]
    NoAddressFound,

    /// Roster has no candidates to compare against
    #[error("roster is empty")]
    EmptyRoster,
}

impl ResolveError {
    /// Short code used in CSV/DB columns
    pub fn code(&self) -> &'static str {
        match self {
            ResolveError::NoAddressFound => "no_address",
            ResolveError::EmptyRoster => "empty_roster",
        }
    }
}
