use crate::ir::op::{BinaryOp, CmpRel, UnaryOp};
use crate::ir::sink::{Callee, CodeSink, JumpTarget};
use crate::ir::types::Width;
use crate::ir::value::{Flag, FlagMask, Label, Loc, Operand, Reg};
use crate::morph::decoded::DecodedInstruction;
use crate::morph::descriptor::{InstructionDescriptor, Policy};
use crate::morph::flags::{FlagCache, Predicate};
use crate::morph::temp::TempAllocator;

/// Everything one instruction's emission sees: the decoded view and its
/// descriptor (read-only), the sink, the scratch allocator, the derived-flag
/// cache, the predication state and the epilogue request flags.
///
/// Created and destroyed by the dispatcher, one per instruction. All
/// emission goes through the helpers here so primitive-flag writes
/// invalidate the derived-flag cache without each routine remembering to.
pub struct TranslationContext<'a> {
    pub inst: &'a DecodedInstruction,
    pub desc: &'a InstructionDescriptor,
    pub temps: &'a mut TempAllocator,
    pub flags: &'a mut FlagCache,
    pub sink: &'a mut dyn CodeSink,
    /// Guest address of this instruction.
    pub addr: u32,
    /// Address of the next sequential instruction.
    pub next_addr: u32,
    /// Predicate for this instruction, resolved before the body runs.
    pub pred: Predicate,
    /// Skip label for a predicated body. Set once, consumed once.
    skip: Option<Label>,
    /// Body asks the epilogue to refresh flags from the shadow status
    /// register (MSR and friends).
    pub reload_status: bool,
    /// Body may change the active instruction set; the unit must end.
    pub switches_iset: bool,
    /// Body ended with a control transfer; no fall-through jump needed.
    pub terminated: bool,
}

impl<'a> TranslationContext<'a> {
    pub fn new(
        inst: &'a DecodedInstruction,
        desc: &'a InstructionDescriptor,
        temps: &'a mut TempAllocator,
        flags: &'a mut FlagCache,
        sink: &'a mut dyn CodeSink,
        addr: u32,
        pred: Predicate,
    ) -> TranslationContext<'a> {
        TranslationContext {
            inst,
            desc,
            temps,
            flags,
            sink,
            addr,
            next_addr: addr.wrapping_add(4),
            pred,
            skip: None,
            reload_status: false,
            switches_iset: false,
            terminated: false,
        }
    }

    // --- Register access ---

    /// Read a core register by raw index. The PC reads as the architected
    /// current-instruction-plus-8 value, a translation-time constant.
    pub fn reg(&self, idx: u8) -> Operand {
        if idx == 15 {
            Operand::Imm(self.addr.wrapping_add(8) as u64)
        } else {
            Reg::from_u8(idx).into()
        }
    }

    /// A core register as a write destination. Writing the PC goes through
    /// [`write_pc`](Self::write_pc), never through this.
    pub fn reg_loc(&self, idx: u8) -> Loc {
        assert!(idx != 15, "the PC is not a plain destination");
        Loc::Core(Reg::from_u8(idx))
    }

    /// Branch indirectly through the register file/dispatcher and mark the
    /// body as having ended with a control transfer.
    pub fn write_pc(&mut self, target: impl Into<Operand>) {
        self.sink.emit_call(Callee::WritePc, &[target.into()], None);
        self.terminated = true;
    }

    // --- Emission helpers (flag-cache aware) ---

    pub fn mov(&mut self, dst: Loc, src: impl Into<Operand>) {
        self.sink.emit_move(dst, src.into());
    }

    pub fn unary(&mut self, op: UnaryOp, dst: Loc, src: impl Into<Operand>, flags: FlagMask) {
        self.sink.emit_unary(op, dst, src.into(), flags);
        self.flags.note_flag_write(flags);
    }

    pub fn binary(
        &mut self,
        op: BinaryOp,
        dst: Loc,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
        flags: FlagMask,
    ) {
        self.sink.emit_binary(op, dst, lhs.into(), rhs.into(), flags);
        self.flags.note_flag_write(flags);
    }

    pub fn compare(
        &mut self,
        rel: CmpRel,
        width: Width,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) {
        // Writes only the scratch predicate, never the cached flags.
        self.sink.emit_compare(rel, width, lhs.into(), rhs.into());
    }

    pub fn cond_move(&mut self, flag: Flag, sense: bool, dst: Loc, src: impl Into<Operand>) {
        self.sink.emit_cond_move(flag, sense, dst, src.into());
    }

    pub fn call(&mut self, callee: Callee, args: &[Operand], ret: Option<Loc>) {
        self.sink.emit_call(callee, args, ret);
    }

    /// Set a flag location to a translation-time constant.
    pub fn set_flag(&mut self, flag: Flag, value: bool) {
        self.sink.emit_move(Loc::Flag(flag), Operand::imm(value as u64));
        if flag != Flag::Q && flag != Flag::Tst {
            self.flags.invalidate();
        }
    }

    // --- Predication (spec: begin/end predicated region) ---

    /// Emit the conditional skip around the body, unless the predicate is
    /// `Always` or the descriptor fuses the condition into its own branch.
    pub fn begin_predicated(&mut self) {
        if self.desc.policy.contains(Policy::BRANCH) {
            // Single control transfer: fused by the routine itself.
            return;
        }
        self.begin_skip();
    }

    /// Emit the conditional skip regardless of descriptor policy. The
    /// dispatcher uses this around substituted trap bodies, where the
    /// routine that would have fused the condition never runs.
    pub fn begin_skip(&mut self) {
        let Predicate::Test { flag, sense } = self.pred else {
            return;
        };
        let skip = self.sink.alloc_label();
        self.sink.emit_jump_if(flag, !sense, JumpTarget::Label(skip));
        assert!(self.skip.is_none(), "predicated region begun twice");
        self.skip = Some(skip);
    }

    /// Bind the skip label, if one was allocated.
    pub fn end_predicated(&mut self) {
        if let Some(skip) = self.skip.take() {
            self.sink.emit_label(skip);
        }
    }

    /// Was a skip label emitted for this instruction?
    pub fn is_skipped(&self) -> bool {
        self.skip.is_some()
    }
}
