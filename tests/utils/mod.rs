use pegvm::config::Limits;
use pegvm::vm::Matcher;

/// A fresh [`Matcher`] with the default limits, for black-box scenario tests
/// that don't need to tune growth ceilings.
pub fn matcher<V>() -> Matcher<V> {
    Matcher::new(Limits::default())
}
