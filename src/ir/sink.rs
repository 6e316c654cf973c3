use crate::ir::op::{BinaryOp, CmpRel, UnaryOp};
use crate::ir::types::Width;
use crate::ir::value::{Flag, FlagMask, Label, Loc, Operand};

/// Target of a jump request: a sink-allocated label or a guest address
/// (the start of another translation unit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpTarget {
    Label(Label),
    Addr(u32),
}

/// Guest-visible trap raised by emitted code when gating rejects an
/// instruction at translation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapKind {
    /// Opcode not implemented, or implemented but absent from the variant.
    Undefined,
    /// Gated on a feature the configured variant does not carry.
    FeatureNotPresent,
    /// Feature present but switched off by the guest's feature registers.
    FeatureDisabled,
}

/// Runtime collaborators reached through `emit_call`. The morphing engine
/// never inspects how these are implemented; argument and return
/// conventions are listed per callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callee {
    /// `(vaddr) -> value`, zero-extended. Alignment faults are the MMU
    /// collaborator's business at guest run time.
    ReadMem(Width),
    /// `(vaddr, value)`.
    WriteMem(Width),
    /// `(pc)`. Raises the guest-visible trap and never returns to the unit.
    RaiseTrap(TrapKind),
    /// `(imm)`. Supervisor call.
    Supervisor,
    /// `(imm)`. Breakpoint.
    Breakpoint,
    /// `(target)`. Indirect branch through the register file/dispatcher;
    /// bit 0 of the target selects the instruction set.
    WritePc,
    /// `() -> psr`. Read the packed primary status register.
    ReadStatus,
    /// `(psr)`. Write the packed primary status register's shadow copy.
    WriteStatus,
    /// `()`. Refresh the backend's named flag locations from the shadow
    /// status register written by `WriteStatus`.
    ReloadStatus,
}

/// The abstract code-generation backend.
///
/// Everything the morphing engine decides is expressed as calls on this
/// trait; nothing observable at guest run time is computed at translation
/// time except values provably constant for the instruction. Implementations
/// include the recording [`Block`](crate::ir::block::Block) sink and the
/// reference interpreter [`Machine`](crate::ir::interp::Machine) executes.
///
/// Flag conventions for `emit_unary`/`emit_binary`: the `flags` mask names
/// which architected flag locations receive results — N and Z from the
/// result value, C the carry/not-borrow/shifter-carry-out, V the signed
/// overflow, and Q OR-accumulated saturation (saturating ops only).
/// `emit_compare` writes only the scratch predicate flag.
pub trait CodeSink {
    fn emit_move(&mut self, dst: Loc, src: Operand);
    fn emit_unary(&mut self, op: UnaryOp, dst: Loc, src: Operand, flags: FlagMask);
    fn emit_binary(&mut self, op: BinaryOp, dst: Loc, lhs: Operand, rhs: Operand, flags: FlagMask);
    /// Test `lhs rel rhs` at `width`, writing the boolean outcome to the
    /// scratch predicate flag.
    fn emit_compare(&mut self, rel: CmpRel, width: Width, lhs: Operand, rhs: Operand);
    /// Copy `src` to `dst` only when `flag == sense` at run time.
    fn emit_cond_move(&mut self, flag: Flag, sense: bool, dst: Loc, src: Operand);
    fn alloc_label(&mut self) -> Label;
    fn emit_label(&mut self, label: Label);
    /// Jump to `target` when `flag == sense` at run time.
    fn emit_jump_if(&mut self, flag: Flag, sense: bool, target: JumpTarget);
    fn emit_jump(&mut self, target: JumpTarget);
    fn emit_call(&mut self, callee: Callee, args: &[Operand], ret: Option<Loc>);
    /// End the current translation unit: emitted state may have changed a
    /// translation invariant (instruction set, endianness), so no emitted
    /// code may follow in this unit.
    fn terminate_unit(&mut self);
}
