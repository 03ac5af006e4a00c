//! Hand-assembly helper for building [`Program`]s.
//!
//! With no compiler in scope, tests and examples need a convenient way to
//! write a program directly. This follows the same two-phase emit-then-patch
//! technique the teacher's `Compiler` uses for its own forward jumps: track
//! the current program counter while pushing instructions, remember the
//! indices that need patching, and go back and fix them up once the target
//! is known (`thompson/bytecode.rs`'s `forks_pc`/`jmps` vectors).
//!
//! This performs no semantic validation of the resulting program — see
//! `instr.rs` for why.

use crate::instr::{CaptureKey, CaptureKind, Instruction, Program};

/// An unresolved forward reference: the index of an instruction whose
/// relative offset still needs to be computed against a label defined later.
#[derive(Debug, Clone, Copy)]
pub struct Label(usize);

/// Builds a [`Program`] by pushing instructions and patching forward labels.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    instructions: Vec<Instruction>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        ProgramBuilder::default()
    }

    /// The index the next pushed instruction will land at.
    pub fn here(&self) -> usize {
        self.instructions.len()
    }

    /// Reserves a label pointing at `here()`, to be referenced by an earlier
    /// or later branch via [`Self::offset_to`].
    pub fn label(&self) -> Label {
        Label(self.here())
    }

    /// Relative offset from `from` to `to`, as consumed by branch opcodes.
    fn offset(from: usize, to: usize) -> isize {
        to as isize - from as isize
    }

    /// Offset from the instruction about to be pushed to an already-known
    /// label (backward branch).
    pub fn offset_to(&self, label: Label) -> isize {
        Self::offset(self.here(), label.0)
    }

    fn push(&mut self, instr: Instruction) -> usize {
        let pc = self.here();
        self.instructions.push(instr);
        pc
    }

    /// Pushes a placeholder branch instruction and returns its index, to be
    /// patched later with [`Self::patch_jmp`]/[`Self::patch_choice`]/etc once
    /// the forward target is known.
    pub fn jmp_placeholder(&mut self) -> usize {
        self.push(Instruction::Jmp(0))
    }

    pub fn choice_placeholder(&mut self) -> usize {
        self.push(Instruction::Choice(0))
    }

    pub fn commit_placeholder(&mut self) -> usize {
        self.push(Instruction::Commit(0))
    }

    /// Pushes a placeholder ordinary call (`k = 0`), to be patched later
    /// with [`Self::patch_call`] once the forward target is known.
    pub fn call_placeholder(&mut self, k: u32) -> usize {
        self.push(Instruction::Call(0, k))
    }

    pub fn patch_call(&mut self, at: usize) {
        let off = Self::offset(at, self.here());
        let k = match &self.instructions[at] {
            Instruction::Call(_, k) => *k,
            _ => panic!("patch_call: instruction at {at} is not a Call"),
        };
        self.instructions[at] = Instruction::Call(off, k);
    }

    pub fn patch_jmp(&mut self, at: usize) {
        let off = Self::offset(at, self.here());
        self.instructions[at] = Instruction::Jmp(off);
    }

    pub fn patch_choice(&mut self, at: usize) {
        let off = Self::offset(at, self.here());
        self.instructions[at] = Instruction::Choice(off);
    }

    pub fn patch_commit(&mut self, at: usize) {
        let off = Self::offset(at, self.here());
        self.instructions[at] = Instruction::Commit(off);
    }

    pub fn any(&mut self) -> &mut Self {
        self.push(Instruction::Any);
        self
    }

    pub fn char(&mut self, c: u8) -> &mut Self {
        self.push(Instruction::Char(c));
        self
    }

    pub fn jmp(&mut self, label: Label) -> &mut Self {
        let off = self.offset_to(label);
        self.push(Instruction::Jmp(off));
        self
    }

    pub fn choice(&mut self, label: Label) -> &mut Self {
        let off = self.offset_to(label);
        self.push(Instruction::Choice(off));
        self
    }

    pub fn commit(&mut self, label: Label) -> &mut Self {
        let off = self.offset_to(label);
        self.push(Instruction::Commit(off));
        self
    }

    pub fn partial_commit(&mut self, label: Label) -> &mut Self {
        let off = self.offset_to(label);
        self.push(Instruction::PartialCommit(off));
        self
    }

    pub fn back_commit(&mut self, label: Label) -> &mut Self {
        let off = self.offset_to(label);
        self.push(Instruction::BackCommit(off));
        self
    }

    pub fn call(&mut self, label: Label, k: u32) -> &mut Self {
        let off = self.offset_to(label);
        self.push(Instruction::Call(off, k));
        self
    }

    pub fn ret(&mut self) -> &mut Self {
        self.push(Instruction::Ret);
        self
    }

    pub fn fail(&mut self) -> &mut Self {
        self.push(Instruction::Fail);
        self
    }

    pub fn open_capture(&mut self, kind: CaptureKind, key: CaptureKey) -> &mut Self {
        self.push(Instruction::OpenCapture(kind, key));
        self
    }

    pub fn close_capture(&mut self) -> &mut Self {
        self.push(Instruction::CloseCapture);
        self
    }

    pub fn close_runtime(&mut self) -> &mut Self {
        self.push(Instruction::CloseRunTime);
        self
    }

    pub fn end(&mut self) -> &mut Self {
        self.push(Instruction::End);
        self
    }

    pub fn instr(&mut self, instr: Instruction) -> &mut Self {
        self.push(instr);
        self
    }

    pub fn build(self) -> Program {
        Program::new(self.instructions)
    }
}
