//! # pegvm
//!
//! A pattern-matching virtual machine that executes compiled Parsing
//! Expression Grammar (PEG) programs, with direct left-recursion support and
//! match-time (dynamic) captures.
//!
//! Given a [`Program`](instr::Program) and an input byte string, [`vm::Matcher::run`]
//! either reports failure or returns the end position reached, together with
//! an ordered log of [`capture`] events describing the subtrees of the
//! match. Building a `Program` from pattern syntax (a compiler) and turning
//! the capture log into host-facing values (a materialiser) are both out of
//! scope — callers either hand in an already-compiled program, or assemble
//! one directly with [`asm::ProgramBuilder`].
//!
//! ## Usage
//!
//! ```rust
//! use pegvm::asm::ProgramBuilder;
//! use pegvm::config::Limits;
//! use pegvm::host::NoopHost;
//! use pegvm::vm::{MatchOutcome, Matcher};
//!
//! let mut b = ProgramBuilder::new();
//! b.char(b'a').char(b'b').end();
//! let program = b.build();
//!
//! let mut matcher = Matcher::new(Limits::default());
//! let mut host = NoopHost;
//! match matcher.run(&program, b"ab", 0, &mut host).unwrap() {
//!     MatchOutcome::Matched { end, .. } => assert_eq!(end, 2),
//!     MatchOutcome::Unmatched => panic!("expected a match"),
//! }
//! ```
//!
//! ## Crate organization
//!
//! - `instr`: the `Instruction` enum and `Program`, the compiled form the VM runs.
//! - `asm`: hand-assembly helper for building a `Program` with no compiler in scope.
//! - `charset`: the 256-bit bitmap backing `Set`/`Span`/`TestSet`.
//! - `capture`: the append-only capture log and its growth policy.
//! - `stack`: the backtrack/call stack, including left-recursive frames.
//! - `memo`: the left-recursion memoisation table.
//! - `host`: the match-time (dynamic capture) host callback boundary.
//! - `config`: `Limits`, the growth ceilings threaded into a `Matcher`.
//! - `error`: `MatchError`, the fatal (non-backtrackable) conditions.
//! - `vm`: `Matcher`, the match loop itself.
//!
//! ## License
//!
//! Licensed under MIT or Apache-2.0.

pub mod asm;
pub mod capture;
pub mod charset;
pub mod config;
pub mod error;
pub mod host;
pub mod instr;
pub mod memo;
pub mod stack;
pub mod vm;

pub use error::MatchError;
pub use vm::{MatchOutcome, Matcher};
