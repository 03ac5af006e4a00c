//! The pattern-matching virtual machine: the core match loop.
//!
//! Grounded on `lpvm.c`'s `match()` function, restructured as an owned
//! `Matcher<V>` the way the teacher's `PikeVM`/`State` pair owns its threads
//! and queues (`thompson/pike_vm.rs`) instead of threading free-floating
//! pointers through a C function. `tracing::trace!` calls stand in for the
//! reference's `#if defined(DEBUG)` printf block, following the logging
//! style the wider example corpus (`NiltonVolpato-melbi`) uses at its own
//! interpreter's hot path.

use tracing::trace;

use crate::capture::{CaptureEvent, CaptureLog};
use crate::config::Limits;
use crate::error::MatchError;
use crate::host::{DynCaptureResult, MatchTimeHost};
use crate::instr::{CaptureKind, Instruction, Program};
use crate::memo::{MemoEntry, MemoTable};
use crate::stack::{BacktrackStack, Frame, Seed};

/// Result of a completed match attempt.
#[derive(Debug)]
pub enum MatchOutcome<V> {
    Matched {
        end: usize,
        captures: Vec<CaptureEvent<V>>,
    },
    Unmatched,
}

/// Owns every piece of growable state a match needs: the backtrack/call
/// stack, the capture log, and the left-recursion memo table. Reusable
/// across calls via [`Matcher::reset`] instead of reallocating, mirroring
/// the teacher's `State::reset` pattern.
pub struct Matcher<V> {
    stack: BacktrackStack<V>,
    log: CaptureLog<V>,
    memo: MemoTable<V>,
    limits: Limits,
}

/// Outcome of one step of the inner loop: either keep going, or the
/// instruction failed and the caller must run the backtracking algorithm.
enum Step {
    Continue,
    Fail,
    Done(usize),
}

/// What [`Matcher::enter_left_recursive`] decided for a `Call(_, k>0)`.
enum LrEntry {
    Enter,
    FailImmediately,
    UseMemoised(usize),
}

impl<V> Matcher<V> {
    pub fn new(limits: Limits) -> Self {
        Matcher {
            stack: BacktrackStack::new(limits.init_stack, limits.max_stack),
            log: CaptureLog::new(limits.init_cap_size, limits.max_cap_size),
            memo: MemoTable::new(),
            limits,
        }
    }

    /// Clears watermarks without shrinking owned buffers, so a `Matcher` can
    /// be reused across many matches.
    pub fn reset(&mut self) {
        self.stack.reset();
        self.log.truncate(0);
        self.memo.reset();
    }

    pub fn run(
        &mut self,
        program: &Program,
        input: &[u8],
        start: usize,
        host: &mut impl MatchTimeHost<V>,
    ) -> Result<MatchOutcome<V>, MatchError>
    where
        V: Clone,
    {
        self.reset();
        let limit = input.len();
        let mut s = start;
        let mut p: usize = 0;

        loop {
            let instr = match program.get(p) {
                Some(i) => i,
                None => {
                    debug_assert!(false, "program counter ran off the end of the program");
                    return Ok(MatchOutcome::Unmatched);
                }
            };
            trace!(pc = p, pos = s, ?instr, "step");

            let step = self.step(instr, program, input, limit, &mut s, &mut p, host)?;
            match step {
                Step::Continue => continue,
                Step::Done(end) => {
                    let captures = self.log.as_slice().to_vec();
                    return Ok(MatchOutcome::Matched { end, captures });
                }
                Step::Fail => {
                    if !self.backtrack(&mut s, &mut p)? {
                        return Ok(MatchOutcome::Unmatched);
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn step(
        &mut self,
        instr: &Instruction,
        program: &Program,
        input: &[u8],
        limit: usize,
        s: &mut usize,
        p: &mut usize,
        host: &mut impl MatchTimeHost<V>,
    ) -> Result<Step, MatchError>
    where
        V: Clone,
    {
        match instr {
            Instruction::Any => {
                if *s < limit {
                    *s += 1;
                    *p += 1;
                    Ok(Step::Continue)
                } else {
                    Ok(Step::Fail)
                }
            }
            Instruction::Char(c) => {
                if *s < limit && input[*s] == *c {
                    *s += 1;
                    *p += 1;
                    Ok(Step::Continue)
                } else {
                    Ok(Step::Fail)
                }
            }
            Instruction::Set(set) => {
                if *s < limit && set.contains(input[*s]) {
                    *s += 1;
                    *p += 1;
                    Ok(Step::Continue)
                } else {
                    Ok(Step::Fail)
                }
            }
            Instruction::Span(set) => {
                while *s < limit && set.contains(input[*s]) {
                    *s += 1;
                }
                *p += 1;
                Ok(Step::Continue)
            }
            Instruction::UtfRange(lo, hi) => match decode_utf8(&input[*s..limit]) {
                Some((cp, len)) if cp >= *lo && cp <= *hi => {
                    *s += len;
                    *p += 1;
                    Ok(Step::Continue)
                }
                _ => Ok(Step::Fail),
            },
            Instruction::Behind(n) => {
                if *s >= *n {
                    *s -= n;
                    *p += 1;
                    Ok(Step::Continue)
                } else {
                    Ok(Step::Fail)
                }
            }
            Instruction::TestAny(off) => {
                if *s < limit {
                    *p += 1;
                } else {
                    *p = (*p as isize + off) as usize;
                }
                Ok(Step::Continue)
            }
            Instruction::TestChar(c, off) => {
                if *s < limit && input[*s] == *c {
                    *p += 1;
                } else {
                    *p = (*p as isize + off) as usize;
                }
                Ok(Step::Continue)
            }
            Instruction::TestSet(set, off) => {
                if *s < limit && set.contains(input[*s]) {
                    *p += 1;
                } else {
                    *p = (*p as isize + off) as usize;
                }
                Ok(Step::Continue)
            }
            Instruction::Jmp(off) => {
                *p = (*p as isize + off) as usize;
                Ok(Step::Continue)
            }
            Instruction::Choice(off) => {
                let alt = (*p as isize + off) as usize;
                self.stack.push(Frame::Choice {
                    s: *s,
                    p: alt,
                    caplevel: self.log.len(),
                })?;
                *p += 1;
                Ok(Step::Continue)
            }
            Instruction::Commit(off) => {
                let popped = self.stack.pop();
                debug_assert!(matches!(popped, Some(Frame::Choice { .. })));
                *p = (*p as isize + off) as usize;
                Ok(Step::Continue)
            }
            Instruction::PartialCommit(off) => {
                let caplevel = self.log.len();
                let cur_s = *s;
                match self.stack.top_mut() {
                    Frame::Choice {
                        s: saved_s,
                        caplevel: saved_cap,
                        ..
                    } => {
                        *saved_s = cur_s;
                        *saved_cap = caplevel;
                    }
                    _ => debug_assert!(false, "PartialCommit with no choice frame on top"),
                }
                *p = (*p as isize + off) as usize;
                Ok(Step::Continue)
            }
            Instruction::BackCommit(off) => {
                let popped = self.stack.pop();
                match popped {
                    Some(Frame::Choice { s: saved_s, caplevel, .. }) => {
                        *s = saved_s;
                        self.log.truncate(caplevel);
                    }
                    _ => debug_assert!(false, "BackCommit with no choice frame on top"),
                }
                *p = (*p as isize + off) as usize;
                Ok(Step::Continue)
            }
            Instruction::Fail | Instruction::FailTwice => {
                if matches!(instr, Instruction::FailTwice) {
                    self.stack.pop();
                }
                Ok(Step::Fail)
            }
            Instruction::End => Ok(Step::Done(*s)),
            Instruction::Giveup => Ok(Step::Fail),
            Instruction::Call(off, k) => {
                let target = (*p as isize + off) as usize;
                if *k == 0 {
                    self.stack.push(Frame::Call { return_p: *p + 1 })?;
                    *p = target;
                    Ok(Step::Continue)
                } else {
                    match self.enter_left_recursive(target, *s, *p, *k)? {
                        LrEntry::Enter => {
                            *p = target;
                            Ok(Step::Continue)
                        }
                        LrEntry::FailImmediately => Ok(Step::Fail),
                        LrEntry::UseMemoised(new_s) => {
                            *s = new_s;
                            *p += 1;
                            Ok(Step::Continue)
                        }
                    }
                }
            }
            Instruction::Ret => self.do_return(s, p),
            Instruction::OpenCapture(kind, key) => {
                self.log.append(CaptureEvent {
                    position: *s,
                    size: 0,
                    kind: *kind,
                    key: *key,
                    value: None,
                })?;
                *p += 1;
                Ok(Step::Continue)
            }
            Instruction::CloseCapture => {
                self.close_capture(*s)?;
                *p += 1;
                Ok(Step::Continue)
            }
            Instruction::FullCapture(size, kind, key) => {
                self.log.append(CaptureEvent {
                    position: s.saturating_sub(*size),
                    size: *size + 1,
                    kind: *kind,
                    key: *key,
                    value: None,
                })?;
                *p += 1;
                Ok(Step::Continue)
            }
            Instruction::CloseRunTime => self.close_runtime(input, s, p, host),
        }
    }

    /// `CloseCapture`'s fold optimisation: if the top of the log is still an
    /// open event, turn it into a full capture in place instead of pushing a
    /// separate close marker.
    fn close_capture(&mut self, s: usize) -> Result<(), MatchError> {
        if let Some(top) = self.log.last_mut() {
            if top.is_open() {
                let size = s - top.position;
                top.size = size + 1;
                return Ok(());
            }
        }
        self.log.append(CaptureEvent {
            position: s,
            size: 1,
            kind: CaptureKind::Close,
            key: 0,
            value: None,
        })
    }

    fn close_runtime(
        &mut self,
        input: &[u8],
        s: &mut usize,
        p: &mut usize,
        host: &mut impl MatchTimeHost<V>,
    ) -> Result<Step, MatchError>
    where
        V: Clone,
    {
        let open_start = self
            .log
            .last()
            .filter(|e| e.is_open())
            .map(|e| e.position)
            .unwrap_or(*s);
        match host.call(input, open_start, *s) {
            DynCaptureResult::Fail => Ok(Step::Fail),
            DynCaptureResult::Keep => {
                // No values produced: the open group collapses entirely,
                // same as `adddyncaptures` with n == 0 (`captop--`).
                self.discard_open_group();
                *p += 1;
                Ok(Step::Continue)
            }
            DynCaptureResult::Advance(pos) => {
                if pos < *s || pos > input.len() {
                    return Err(MatchError::InvalidPosition {
                        current: *s,
                        requested: pos,
                        limit: input.len(),
                    });
                }
                *s = pos;
                self.discard_open_group();
                *p += 1;
                Ok(Step::Continue)
            }
            DynCaptureResult::AdvanceWithValues(pos, values) => {
                if pos < *s || pos > input.len() {
                    return Err(MatchError::InvalidPosition {
                        current: *s,
                        requested: pos,
                        limit: input.len(),
                    });
                }
                *s = pos;
                if values.is_empty() {
                    // collapses to a plain Advance: drop the still-open group.
                    self.discard_open_group();
                } else {
                    let max_results = self.limits.max_dyncap_results;
                    if values.len() > max_results {
                        return Err(MatchError::TooManyResults { limit: max_results });
                    }
                    // The open group is kept (it becomes an anonymous group
                    // around its runtime children, mirroring `adddyncaptures`
                    // leaving `capture[-1].siz == 0`), not dropped.
                    for (i, value) in values.into_iter().enumerate() {
                        self.log.append(CaptureEvent {
                            position: *s,
                            size: 1,
                            kind: CaptureKind::Runtime,
                            key: i as u16,
                            value: Some(value),
                        })?;
                    }
                    self.log.append(CaptureEvent {
                        position: *s,
                        size: 1,
                        kind: CaptureKind::Close,
                        key: 0,
                        value: None,
                    })?;
                }
                *p += 1;
                Ok(Step::Continue)
            }
        }
    }

    /// Drops the still-open capture group at the top of the log, if any —
    /// the "no values produced" collapse shared by `Keep`, `Advance`, and an
    /// empty-`values` `AdvanceWithValues`.
    fn discard_open_group(&mut self) {
        if let Some(top) = self.log.last() {
            if top.is_open() {
                self.log.truncate(self.log.len() - 1);
            }
        }
    }

    /// Entry side of the left-recursion protocol (§4.4.2). Returns what the
    /// caller should do next: branch into the head, fail outright (rules
    /// *lvar.3*/*lvar.5*), or splice in an already-memoised seed and resume
    /// past the call (rule *lvar.4*).
    fn enter_left_recursive(&mut self, pa: usize, s0: usize, p: usize, k: u32) -> Result<LrEntry, MatchError>
    where
        V: Clone,
    {
        match self.memo.get(pa, s0) {
            None => {
                let caplevel = self.log.len();
                let saved_log = self.log.take();
                self.memo.insert(
                    pa,
                    s0,
                    MemoEntry {
                        seed: Seed::Fail,
                        k,
                        snapshot: Vec::new(),
                    },
                );
                self.stack.push(Frame::LeftRecursive {
                    return_p: p + 1,
                    s0,
                    pa,
                    caplevel,
                    saved_log,
                })?;
                Ok(LrEntry::Enter)
            }
            Some(entry) => match entry.seed {
                Seed::Fail => Ok(LrEntry::FailImmediately),
                Seed::Found(x) => {
                    if k < entry.k {
                        Ok(LrEntry::FailImmediately)
                    } else {
                        self.log.splice_in(&entry.snapshot)?;
                        Ok(LrEntry::UseMemoised(x))
                    }
                }
            },
        }
    }

    /// `Ret` while the top frame may or may not be left-recursive; also
    /// handles the sentinel-reaching-empty-stack release-mode fallback from
    /// the error handling design (§7 tier 3).
    fn do_return(&mut self, s: &mut usize, p: &mut usize) -> Result<Step, MatchError>
    where
        V: Clone,
    {
        if self.stack.len() <= 1 {
            // Empty call stack: a well-formed program never reaches this;
            // release builds treat it as whole-match failure rather than
            // indexing out of bounds.
            debug_assert!(false, "Ret with an empty call stack");
            return Ok(Step::Fail);
        }
        match self.stack.top() {
            Frame::Call { .. } => {
                if let Some(Frame::Call { return_p }) = self.stack.pop() {
                    *p = return_p;
                }
                Ok(Step::Continue)
            }
            Frame::LeftRecursive { .. } => self.grow_or_finish_left_recursive(s, p),
            Frame::Choice { .. } => {
                debug_assert!(false, "Ret on top of a choice frame");
                Ok(Step::Fail)
            }
            Frame::Sentinel => unreachable!("guarded by the len() check above"),
        }
    }

    fn grow_or_finish_left_recursive(&mut self, s: &mut usize, p: &mut usize) -> Result<Step, MatchError>
    where
        V: Clone,
    {
        let (return_p, s0, pa, caplevel) = match self.stack.top() {
            Frame::LeftRecursive { return_p, s0, pa, caplevel, .. } => (*return_p, *s0, *pa, *caplevel),
            _ => unreachable!(),
        };
        let s_new = *s;
        let grew = match self.memo.get(pa, s0) {
            Some(entry) => match entry.seed {
                Seed::Fail => true,
                Seed::Found(x) => s_new > x,
            },
            None => true,
        };

        if grew {
            let segment = self.log.as_slice().to_vec();
            self.memo.update_seed(pa, s0, Seed::Found(s_new), segment);
            self.log.truncate(0);
            if let Frame::LeftRecursive { s0, .. } = self.stack.top_mut() {
                *s = *s0;
            }
            *p = pa;
            Ok(Step::Continue)
        } else {
            let frame = self.stack.pop();
            if let Some(Frame::LeftRecursive { saved_log, .. }) = frame {
                self.log.restore(saved_log);
            }
            if let Some(entry) = self.memo.remove(pa, s0) {
                if let Seed::Found(x) = entry.seed {
                    self.log.truncate(caplevel);
                    self.log.splice_in(&entry.snapshot)?;
                    *s = x;
                }
            }
            *p = return_p;
            Ok(Step::Continue)
        }
    }

    /// Unwinds the stack on failure, per §4.4.1. Returns `Ok(true)` if a
    /// resumable frame was found (`s`/`p` updated in place), `Ok(false)` if
    /// the sentinel was reached (whole-match failure).
    fn backtrack(&mut self, s: &mut usize, p: &mut usize) -> Result<bool, MatchError>
    where
        V: Clone,
    {
        loop {
            if self.stack.len() <= 1 {
                return Ok(false);
            }
            match self.stack.top() {
                Frame::Call { .. } => {
                    self.stack.pop();
                }
                Frame::LeftRecursive { .. } => {
                    let (pa, s0) = match self.stack.top() {
                        Frame::LeftRecursive { pa, s0, .. } => (*pa, *s0),
                        _ => unreachable!(),
                    };
                    let still_fresh = matches!(self.memo.get(pa, s0).map(|e| e.seed), Some(Seed::Fail));
                    if still_fresh {
                        let frame = self.stack.pop();
                        self.memo.remove(pa, s0);
                        if let Some(Frame::LeftRecursive { saved_log, .. }) = frame {
                            self.log.restore(saved_log);
                        }
                        continue;
                    } else {
                        let (return_p, caplevel) = match self.stack.top() {
                            Frame::LeftRecursive { return_p, caplevel, .. } => (*return_p, *caplevel),
                            _ => unreachable!(),
                        };
                        let frame = self.stack.pop();
                        if let Some(Frame::LeftRecursive { saved_log, .. }) = frame {
                            self.log.restore(saved_log);
                        }
                        if let Some(entry) = self.memo.remove(pa, s0) {
                            if let Seed::Found(x) = entry.seed {
                                self.log.truncate(caplevel);
                                self.log.splice_in(&entry.snapshot)?;
                                *s = x;
                            }
                        }
                        *p = return_p;
                        return Ok(true);
                    }
                }
                Frame::Choice { .. } => {
                    let (saved_s, alt_p, caplevel) = match self.stack.top() {
                        Frame::Choice { s, p, caplevel } => (*s, *p, *caplevel),
                        _ => unreachable!(),
                    };
                    self.stack.pop();
                    self.log.truncate(caplevel);
                    *s = saved_s;
                    *p = alt_p;
                    return Ok(true);
                }
                Frame::Sentinel => return Ok(false),
            }
        }
    }
}

/// Decodes one UTF-8 code point from the front of `bytes`. Invalid encodings
/// are a local, backtrackable failure — not a host error (§7 tier 3).
fn decode_utf8(bytes: &[u8]) -> Option<(u32, usize)> {
    let first = *bytes.first()?;
    let len = if first < 0x80 {
        1
    } else if first & 0xE0 == 0xC0 {
        2
    } else if first & 0xF0 == 0xE0 {
        3
    } else if first & 0xF8 == 0xF0 {
        4
    } else {
        return None;
    };
    let slice = bytes.get(..len)?;
    std::str::from_utf8(slice).ok().map(|s| {
        let c = s.chars().next().expect("len >= 1");
        (c as u32, len)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::ProgramBuilder;
    use crate::host::NoopHost;
    use crate::instr::CaptureKind;

    fn matcher() -> Matcher<()> {
        Matcher::new(Limits::default())
    }

    #[test]
    fn literal_match() {
        let mut b = ProgramBuilder::new();
        b.char(b'a').char(b'b').end();
        let program = b.build();
        let mut m = matcher();
        let mut host = NoopHost;

        let out = m.run(&program, b"ab", 0, &mut host).unwrap();
        assert!(matches!(out, MatchOutcome::Matched { end: 2, .. }));

        let out = m.run(&program, b"ac", 0, &mut host).unwrap();
        assert!(matches!(out, MatchOutcome::Unmatched));
    }

    #[test]
    fn ordered_choice() {
        let mut b = ProgramBuilder::new();
        let choice_at = b.choice_placeholder();
        b.char(b'a');
        let commit_at = b.commit_placeholder();
        let l1 = b.label();
        b.patch_choice(choice_at);
        b.char(b'b');
        let l2 = b.label();
        let _ = l1;
        b.patch_commit(commit_at);
        let _ = l2;
        b.end();
        let program = b.build();
        let mut m = matcher();
        let mut host = NoopHost;

        assert!(matches!(
            m.run(&program, b"b", 0, &mut host).unwrap(),
            MatchOutcome::Matched { end: 1, .. }
        ));
        assert!(matches!(
            m.run(&program, b"a", 0, &mut host).unwrap(),
            MatchOutcome::Matched { end: 1, .. }
        ));
        assert!(matches!(
            m.run(&program, b"c", 0, &mut host).unwrap(),
            MatchOutcome::Unmatched
        ));
    }

    #[test]
    fn kleene_star_with_partial_commit() {
        let mut b = ProgramBuilder::new();
        let l0 = b.label();
        let choice_at = b.choice_placeholder();
        b.char(b'x');
        b.partial_commit(l0);
        b.patch_choice(choice_at);
        b.end();
        let program = b.build();
        let mut m = matcher();
        let mut host = NoopHost;

        let out = m.run(&program, b"xxxy", 0, &mut host).unwrap();
        assert!(matches!(out, MatchOutcome::Matched { end: 3, .. }));
    }

    #[test]
    fn full_capture_folds_open_into_close() {
        let mut b = ProgramBuilder::new();
        b.open_capture(CaptureKind::Simple, 0);
        b.char(b'a').char(b'b');
        b.close_capture();
        b.end();
        let program = b.build();
        let mut m = matcher();
        let mut host = NoopHost;

        match m.run(&program, b"ab", 0, &mut host).unwrap() {
            MatchOutcome::Matched { end, captures } => {
                assert_eq!(end, 2);
                assert_eq!(captures.len(), 1);
                assert_eq!(captures[0].position, 0);
                assert_eq!(captures[0].size, 3);
                assert_eq!(captures[0].kind, CaptureKind::Simple);
            }
            MatchOutcome::Unmatched => panic!("expected a match"),
        }
    }

    #[test]
    fn match_time_capture_rejecting_backtracks_to_unmatched() {
        struct AlwaysFail;
        impl MatchTimeHost<()> for AlwaysFail {
            fn call(&mut self, _input: &[u8], _open_start: usize, _current: usize) -> DynCaptureResult<()> {
                DynCaptureResult::Fail
            }
        }

        let mut b = ProgramBuilder::new();
        b.open_capture(CaptureKind::Group, 0);
        b.char(b'a');
        b.close_runtime();
        b.end();
        let program = b.build();
        let mut m = matcher();
        let mut host = AlwaysFail;

        let out = m.run(&program, b"a", 0, &mut host).unwrap();
        assert!(matches!(out, MatchOutcome::Unmatched));
    }

    #[test]
    fn direct_left_recursion_grows_a_left_leaning_tree() {
        // E <- E '+' n / n, entered at precedence level k=1. Every call into
        // E — the outer entry and E's own self-reference alike — goes
        // through the same left-recursive `Call(pA, 1)`: there is no plain
        // (k=0) wrapper, since the very first such call is what registers
        // the memo entry the self-reference later looks up.
        let mut b = ProgramBuilder::new();
        let entry_call_at = b.call_placeholder(1);
        b.end();
        let e_label = b.label();
        b.patch_call(entry_call_at);
        let choice_at = b.choice_placeholder();
        b.call(e_label, 1);
        b.char(b'+');
        b.instr(Instruction::UtfRange('0' as u32, '9' as u32));
        let commit_at = b.commit_placeholder();
        b.patch_choice(choice_at);
        b.instr(Instruction::UtfRange('0' as u32, '9' as u32));
        b.patch_commit(commit_at);
        b.ret();
        let program = b.build();

        let mut m = matcher();
        let mut host = NoopHost;
        let out = m.run(&program, b"1+2+3", 0, &mut host).unwrap();
        assert!(matches!(out, MatchOutcome::Matched { end: 5, .. }));
    }
}
