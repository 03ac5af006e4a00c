//! The append-only capture log and its growth policy.
//!
//! Grounded on the reference `growcap`/capture-array discipline in
//! `lpvm.c`: the log always keeps at least one spare slot, and when it must
//! grow it doubles (while that stays under half the ceiling), then grows by
//! 9/8 (while under 8/9 of the ceiling), then gives up. Represented here as
//! an owned `Vec` rather than a host-managed reallocatable buffer — see
//! `SPEC_FULL.md` §4.5.

use crate::error::MatchError;
use crate::instr::{CaptureKey, CaptureKind};

/// One entry in the capture log.
///
/// `size` follows the reference encoding: `0` means still open, `1` means
/// closed with zero length (or produced by a match-time capture), anything
/// greater is `length + 1` of a full capture ending at `position`.
#[derive(Debug, Clone)]
pub struct CaptureEvent<V> {
    pub position: usize,
    pub size: usize,
    pub kind: CaptureKind,
    pub key: CaptureKey,
    /// Payload for `CaptureKind::Runtime` events — the host's returned
    /// value for this particular capture slot. `None` for every other kind.
    pub value: Option<V>,
}

impl<V> CaptureEvent<V> {
    pub fn is_open(&self) -> bool {
        self.size == 0
    }
}

/// Append-only log of capture events plus a rewind watermark (`captop`).
#[derive(Debug, Clone)]
pub struct CaptureLog<V> {
    events: Vec<CaptureEvent<V>>,
    /// Number of entries in `events[0..captop]` that are "live"; entries
    /// beyond `captop` are stale leftovers from a discarded speculative
    /// branch and are overwritten, not reallocated, on the next append.
    captop: usize,
    /// Logical capacity the growth policy has committed to (tracked
    /// separately from `events`'s own allocation so the §4.2 growth
    /// formula, not `Vec`'s amortised doubling, decides when to grow and
    /// when to give up).
    capsize: usize,
    max_size: usize,
}

impl<V> CaptureLog<V> {
    pub fn new(init_size: usize, max_size: usize) -> Self {
        let init_size = init_size.min(max_size).max(1);
        CaptureLog {
            events: Vec::with_capacity(init_size),
            captop: 0,
            capsize: init_size,
            max_size,
        }
    }

    pub fn len(&self) -> usize {
        self.captop
    }

    pub fn is_empty(&self) -> bool {
        self.captop == 0
    }

    pub fn as_slice(&self) -> &[CaptureEvent<V>] {
        &self.events[..self.captop]
    }

    pub fn last(&self) -> Option<&CaptureEvent<V>> {
        self.captop.checked_sub(1).map(|i| &self.events[i])
    }

    pub fn last_mut(&mut self) -> Option<&mut CaptureEvent<V>> {
        self.captop.checked_sub(1).map(|i| &mut self.events[i])
    }

    /// Discards every entry from `level` onward. Used when a choice frame's
    /// alternative is abandoned, or an LR frame's growth attempt fails.
    pub fn truncate(&mut self, level: usize) {
        debug_assert!(level <= self.captop);
        self.captop = level;
    }

    /// Ensures room for `extra` more entries beyond `captop`, applying the
    /// growth policy of §4.2. Called before any append. Mirrors `growcap`:
    /// if the current logical capacity already has more than `extra` free
    /// slots, nothing to do; otherwise grow by doubling while that stays
    /// under half the ceiling, then by 9/8 while under 8/9 of the ceiling,
    /// then give up.
    pub fn reserve(&mut self, extra: usize) -> Result<(), MatchError> {
        if self.capsize.saturating_sub(self.captop) > extra {
            return Ok(());
        }
        let max = self.max_size;
        let mut new_size = self.captop + extra + 1;
        if new_size < max / 2 {
            new_size *= 2;
        } else if new_size < (8 * max) / 9 {
            new_size += new_size / 8;
        } else {
            return Err(MatchError::TooManyCaptures);
        }
        let new_size = new_size.min(max);
        if new_size <= self.capsize {
            return Err(MatchError::TooManyCaptures);
        }
        self.events.reserve(new_size - self.events.len().min(new_size));
        self.capsize = new_size;
        Ok(())
    }

    /// Appends one event at `captop`, growing first if necessary.
    pub fn append(&mut self, event: CaptureEvent<V>) -> Result<(), MatchError> {
        self.reserve(1)?;
        if self.captop < self.events.len() {
            self.events[self.captop] = event;
        } else {
            self.events.push(event);
        }
        self.captop += 1;
        Ok(())
    }

    /// Number of `Runtime`-kind entries currently live. Truncating the log
    /// (e.g. on backtrack past a match-time capture) keeps this correct for
    /// free since it is derived from the live slice, not tracked separately.
    pub fn count_dyncaps(&self) -> usize {
        self.as_slice()
            .iter()
            .filter(|e| matches!(e.kind, CaptureKind::Runtime))
            .count()
    }

    /// Takes the whole live log out, leaving an empty one behind. Used when
    /// entering a left-recursive call, which must start with a fresh log.
    pub fn take(&mut self) -> Vec<CaptureEvent<V>> {
        let events = self.events[..self.captop].to_vec();
        self.events.clear();
        self.captop = 0;
        self.capsize = self.capsize.max(1);
        events
    }

    /// Replaces the live log wholesale (restoring a saved snapshot) and
    /// installs `dyncap_level` as the current count is recomputed by the
    /// caller; used on LR-frame unwind.
    pub fn restore(&mut self, events: Vec<CaptureEvent<V>>) {
        self.captop = events.len();
        self.capsize = self.capsize.max(events.len() + 1);
        self.events = events;
    }

    /// Appends an entire memoised segment atomically, preserving subject
    /// order (§5 ordering guarantees): splicing never interleaves with
    /// concurrent live-log appends because it is one `extend` call.
    pub fn splice_in(&mut self, segment: &[CaptureEvent<V>]) -> Result<(), MatchError>
    where
        V: Clone,
    {
        self.reserve(segment.len())?;
        self.events.truncate(self.captop);
        self.events.extend(segment.iter().cloned());
        self.captop += segment.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_event(position: usize, size: usize) -> CaptureEvent<()> {
        CaptureEvent {
            position,
            size,
            kind: CaptureKind::Simple,
            key: 0,
            value: None,
        }
    }

    #[test]
    fn append_and_truncate() {
        let mut log: CaptureLog<()> = CaptureLog::new(4, 1024);
        log.append(simple_event(0, 0)).unwrap();
        log.append(simple_event(1, 2)).unwrap();
        assert_eq!(log.len(), 2);
        log.truncate(1);
        assert_eq!(log.len(), 1);
        assert_eq!(log.as_slice()[0].position, 0);
    }

    #[test]
    fn grow_doubles_below_half_ceiling() {
        let mut log: CaptureLog<()> = CaptureLog::new(1, 1_000_000);
        for i in 0..100 {
            log.append(simple_event(i, 1)).unwrap();
        }
        assert_eq!(log.len(), 100);
    }

    #[test]
    fn too_many_captures_is_fatal() {
        let mut log: CaptureLog<()> = CaptureLog::new(1, 4);
        let mut appended = 0;
        let err = loop {
            match log.append(simple_event(0, 1)) {
                Ok(()) => {
                    appended += 1;
                    assert!(appended <= 4, "should have failed before exceeding the ceiling");
                }
                Err(e) => break e,
            }
        };
        assert!(matches!(err, MatchError::TooManyCaptures));
        assert!(appended >= 1);
    }

    #[test]
    fn dyncap_accounting() {
        let mut log: CaptureLog<i32> = CaptureLog::new(4, 1024);
        log.append(CaptureEvent {
            position: 0,
            size: 1,
            kind: CaptureKind::Runtime,
            key: 0,
            value: Some(42),
        })
        .unwrap();
        log.append(simple_event(0, 1)).unwrap();
        assert_eq!(log.count_dyncaps(), 1);
    }
}
