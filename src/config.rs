//! Construction-time limits threaded through a [`crate::vm::Matcher`].
//!
//! Mirrors the way the teacher engine threads a `Config` through
//! `Compiler::compile`/`PikeVM::new`: one small value object built once and
//! passed to the constructor, rather than scattered constants.

/// Growth ceilings for the backtrack stack and the capture log.
///
/// Defaults reproduce the reference implementation's `MAXSTACKIDX` /
/// `MAXNEWSIZE` discipline: generous enough that well-formed programs never
/// come close, small enough that a runaway program (e.g. unbounded direct
/// left recursion with a buggy precedence level) fails fast instead of
/// exhausting memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Initial number of frames the backtrack stack is allocated for.
    pub init_stack: usize,
    /// Hard ceiling on backtrack stack depth. Exceeding it is a fatal
    /// [`crate::error::MatchError::StackOverflow`], not a backtrackable
    /// failure.
    pub max_stack: usize,
    /// Initial number of capture-log slots.
    pub init_cap_size: usize,
    /// Hard ceiling on the number of capture-log entries.
    pub max_cap_size: usize,
    /// Hard ceiling on the number of values a single match-time capture may
    /// return in one `CloseRunTime`.
    pub max_dyncap_results: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            init_stack: 32,
            max_stack: 4_000,
            init_cap_size: 32,
            max_cap_size: 1_usize << 24,
            max_dyncap_results: i16::MAX as usize,
        }
    }
}
