mod utils;

use pegvm::asm::ProgramBuilder;
use pegvm::host::{DynCaptureResult, MatchTimeHost, NoopHost};
use pegvm::instr::CaptureKind;
use pegvm::vm::MatchOutcome;

/// A speculative capture opened inside a failed alternative must not survive
/// the backtrack into its sibling (capture balance, §8).
#[test]
fn failed_alternative_leaves_no_capture_behind() {
    let mut b = ProgramBuilder::new();
    let choice_at = b.choice_placeholder();
    b.open_capture(CaptureKind::Simple, 0);
    b.char(b'z');
    b.close_capture();
    let commit_at = b.commit_placeholder();
    b.patch_choice(choice_at);
    b.char(b'b');
    b.patch_commit(commit_at);
    b.end();
    let program = b.build();

    let mut m = utils::matcher::<()>();
    let mut host = NoopHost;

    match m.run(&program, b"b", 0, &mut host).unwrap() {
        MatchOutcome::Matched { end, captures } => {
            assert_eq!(end, 1);
            assert!(captures.is_empty(), "the failed branch's open capture should be gone: {captures:?}");
        }
        MatchOutcome::Unmatched => panic!("expected a match"),
    }
}

/// A host that, on `CloseRunTime`, keeps the current position and replaces
/// the open group's contents with a fixed set of produced values.
struct ProducesValues(Vec<i32>);

impl MatchTimeHost<i32> for ProducesValues {
    fn call(&mut self, _input: &[u8], _open_start: usize, current: usize) -> DynCaptureResult<i32> {
        DynCaptureResult::AdvanceWithValues(current, self.0.clone())
    }
}

/// A host that always keeps the current position and produces no values.
struct AlwaysKeep;

impl<V> MatchTimeHost<V> for AlwaysKeep {
    fn call(&mut self, _input: &[u8], _open_start: usize, _current: usize) -> DynCaptureResult<V> {
        DynCaptureResult::Keep
    }
}

/// When the host produces values, the open group is *kept* (as an anonymous
/// group around its runtime children) and closed afterwards — it does not
/// collapse into bare, unclosed `Runtime` entries. Mirrors `adddyncaptures`
/// in the reference source, which appends a `Cclose` after the new captures.
#[test]
fn match_time_capture_can_replace_the_group_with_host_values() {
    let mut b = ProgramBuilder::new();
    b.open_capture(CaptureKind::Group, 0);
    b.char(b'a');
    b.close_runtime();
    b.end();
    let program = b.build();

    let mut m = utils::matcher::<i32>();
    let mut host = ProducesValues(vec![5, 6]);

    match m.run(&program, b"a", 0, &mut host).unwrap() {
        MatchOutcome::Matched { end, captures } => {
            assert_eq!(end, 1);
            assert_eq!(captures.len(), 4, "open group + 2 runtime values + close: {captures:?}");
            assert_eq!(captures[0].kind, CaptureKind::Group);
            assert!(captures[0].is_open(), "the group stays open around its runtime children");
            assert_eq!(captures[1].kind, CaptureKind::Runtime);
            assert_eq!(captures[1].value, Some(5));
            assert_eq!(captures[2].kind, CaptureKind::Runtime);
            assert_eq!(captures[2].value, Some(6));
            assert_eq!(captures[3].kind, CaptureKind::Close);
        }
        MatchOutcome::Unmatched => panic!("expected a match"),
    }
}

/// When the host keeps the position and produces no values, the open group
/// collapses entirely — no capture is emitted for it at all.
#[test]
fn match_time_capture_keeping_with_no_values_leaves_no_capture() {
    let mut b = ProgramBuilder::new();
    b.open_capture(CaptureKind::Group, 0);
    b.char(b'a');
    b.close_runtime();
    b.end();
    let program = b.build();

    let mut m = utils::matcher::<()>();
    let mut host = AlwaysKeep;

    match m.run(&program, b"a", 0, &mut host).unwrap() {
        MatchOutcome::Matched { end, captures } => {
            assert_eq!(end, 1);
            assert!(captures.is_empty(), "a kept group with no values should vanish: {captures:?}");
        }
        MatchOutcome::Unmatched => panic!("expected a match"),
    }
}

/// A `Matcher` is reusable across unrelated programs: [`Matcher::run`] resets
/// the stack, capture log, and memo table each time, so nothing from one
/// match attempt leaks into the next.
#[test]
fn matcher_is_reusable_across_independent_programs() {
    let mut ab = ProgramBuilder::new();
    ab.char(b'a').char(b'b').end();
    let ab = ab.build();

    let mut cd = ProgramBuilder::new();
    cd.open_capture(CaptureKind::Simple, 0);
    cd.char(b'c').char(b'd');
    cd.close_capture();
    cd.end();
    let cd = cd.build();

    let mut m = utils::matcher::<()>();
    let mut host = NoopHost;

    match m.run(&ab, b"ab", 0, &mut host).unwrap() {
        MatchOutcome::Matched { end, captures } => {
            assert_eq!(end, 2);
            assert!(captures.is_empty());
        }
        MatchOutcome::Unmatched => panic!("expected a match"),
    }

    match m.run(&cd, b"cd", 0, &mut host).unwrap() {
        MatchOutcome::Matched { end, captures } => {
            assert_eq!(end, 2);
            assert_eq!(captures.len(), 1);
            assert_eq!(captures[0].position, 0);
            assert_eq!(captures[0].size, 3);
        }
        MatchOutcome::Unmatched => panic!("expected a match"),
    }
}
