//! Fatal error surface of the match loop.
//!
//! Backtrackable failure (ordinary non-match) is never represented here —
//! see [`crate::vm::MatchOutcome`]. These variants are the tier-2/tier-3
//! conditions from the error handling design: resource exhaustion and
//! contract violations, both of which abort the match outright.

use thiserror::Error;

/// Fatal conditions that abort a match instead of backtracking.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("backtrack stack overflow (current limit is {limit})")]
    StackOverflow { limit: usize },

    #[error("too many captures")]
    TooManyCaptures,

    #[error("too many capture lists")]
    TooManyCaptureLists,

    #[error(
        "invalid position returned by match-time capture: {requested} (current {current}, limit {limit})"
    )]
    InvalidPosition {
        current: usize,
        requested: usize,
        limit: usize,
    },

    #[error("too many results in match-time capture (limit is {limit})")]
    TooManyResults { limit: usize },
}
