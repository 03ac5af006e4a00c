//! The match-time (dynamic capture) host callback boundary.
//!
//! Per Design Note §9 ("model it as a typed callback returning a sum type"),
//! this replaces the reference implementation's polymorphic Lua-value
//! dynamic-capture protocol with a generic trait and a closed result enum.

/// What a [`MatchTimeHost::call`] invocation decides for one `CloseRunTime`.
#[derive(Debug, Clone)]
pub enum DynCaptureResult<V> {
    /// Reject the capture; the match loop falls into backtracking.
    Fail,
    /// Accept, keeping the current cursor position.
    Keep,
    /// Accept, moving the cursor to `pos` (must satisfy `current <= pos <=
    /// limit`, checked by the match loop).
    Advance(usize),
    /// Accept, moving the cursor to `pos` and appending each value as a
    /// `runtime`-kind capture event. An empty `values` is equivalent to
    /// `Advance(pos)` (the open group collapses).
    AdvanceWithValues(usize, Vec<V>),
}

/// Host hook invoked at `CloseRunTime`: given the subject slice and the
/// range covered by the currently-open capture group, decide the outcome.
pub trait MatchTimeHost<V> {
    /// `input` is the whole subject; `open_start` is the position the most
    /// recently opened (still-open) capture group began at; `current` is the
    /// cursor position at the point `CloseRunTime` executed.
    fn call(&mut self, input: &[u8], open_start: usize, current: usize) -> DynCaptureResult<V>;
}

/// A host that never runs match-time captures (`CloseRunTime` never appears
/// in the program). Useful for tests and for patterns with no dynamic
/// captures at all.
#[derive(Debug, Default)]
pub struct NoopHost;

impl<V> MatchTimeHost<V> for NoopHost {
    fn call(&mut self, _input: &[u8], _open_start: usize, _current: usize) -> DynCaptureResult<V> {
        DynCaptureResult::Keep
    }
}
