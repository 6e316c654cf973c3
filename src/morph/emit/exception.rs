//! Trap and exception emission: the supervisor call, breakpoints, the
//! permanently undefined encoding, and the trap bodies the dispatcher
//! substitutes when gating rejects an instruction.

use crate::ir::sink::{Callee, TrapKind};
use crate::ir::value::Operand;
use crate::morph::context::TranslationContext;

/// SVC: supervisor call with the decoded immediate.
pub fn emit_svc(ctx: &mut TranslationContext<'_>) {
    let imm = ctx.inst.imm;
    ctx.call(Callee::Supervisor, &[imm.into()], None);
}

/// BKPT: breakpoint with the decoded immediate.
pub fn emit_bkpt(ctx: &mut TranslationContext<'_>) {
    let imm = ctx.inst.imm;
    ctx.call(Callee::Breakpoint, &[imm.into()], None);
    ctx.terminated = true;
}

/// UDF: the permanently undefined encoding.
pub fn emit_udf(ctx: &mut TranslationContext<'_>) {
    emit_trap(ctx, TrapKind::Undefined);
}

/// Emit a guest-visible trap body: raise at this instruction's address and
/// never return to the unit. Used directly by UDF and substituted by the
/// dispatcher when gating fails.
pub fn emit_trap(ctx: &mut TranslationContext<'_>, kind: TrapKind) {
    let pc = ctx.addr;
    ctx.call(Callee::RaiseTrap(kind), &[Operand::imm(pc as u64)], None);
    ctx.terminated = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessorConfig;
    use crate::ir::block::Block;
    use crate::ir::interp::Machine;
    use crate::morph::class::InstClass;
    use crate::morph::decoded::DecodedInstruction;
    use crate::morph::Morpher;

    #[test]
    fn test_svc_reaches_supervisor() {
        let inst = DecodedInstruction::new(InstClass::Svc).with_imm(0x42);
        let mut morpher = Morpher::new(ProcessorConfig::default());
        let mut block = Block::new();
        morpher.morph(&inst, 0, true, &mut block);
        let mut machine = Machine::new();
        machine.run(&block);
        assert_eq!(machine.svc_calls, vec![0x42]);
    }

    #[test]
    fn test_udf_raises() {
        let inst = DecodedInstruction::new(InstClass::Udf);
        let mut morpher = Morpher::new(ProcessorConfig::default());
        let mut block = Block::new();
        let outcome = morpher.morph(&inst, 0x100, true, &mut block);
        assert!(outcome.ends_block());
        let mut machine = Machine::new();
        machine.run(&block);
        assert_eq!(machine.traps, vec![TrapKind::Undefined]);
    }
}
