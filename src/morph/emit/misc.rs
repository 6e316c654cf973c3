//! MOVW/MOVT, bit-field instructions, IT and NOP.

use crate::ir::op::BinaryOp;
use crate::ir::types::Width;
use crate::ir::value::FlagMask;
use crate::morph::context::TranslationContext;

/// MOVW: load a 16-bit immediate, clearing the top half.
pub fn emit_movw(ctx: &mut TranslationContext<'_>) {
    let dst = ctx.reg_loc(ctx.inst.rd);
    ctx.mov(dst, ctx.inst.imm & 0xFFFF);
}

/// MOVT: replace the top half, keeping the bottom.
pub fn emit_movt(ctx: &mut TranslationContext<'_>) {
    let dst = ctx.reg_loc(ctx.inst.rd);
    let rd = ctx.reg(ctx.inst.rd);
    let t = ctx.temps.alloc(Width::W32);
    ctx.binary(BinaryOp::And, t.loc(), rd, 0xFFFFu64, FlagMask::empty());
    ctx.binary(BinaryOp::Orr, dst, t.loc(), (ctx.inst.imm & 0xFFFF) << 16, FlagMask::empty());
    ctx.temps.free(Width::W32);
}

/// BFC: clear `width_field` bits starting at `lsb`.
pub fn emit_bfc(ctx: &mut TranslationContext<'_>) {
    let inst = ctx.inst;
    let mask = field_mask(inst.lsb, inst.width_field);
    let dst = ctx.reg_loc(inst.rd);
    let rd = ctx.reg(inst.rd);
    ctx.binary(BinaryOp::Bic, dst, rd, mask, FlagMask::empty());
}

/// BFI: insert the bottom bits of Rn into the field.
pub fn emit_bfi(ctx: &mut TranslationContext<'_>) {
    let inst = ctx.inst;
    let mask = field_mask(inst.lsb, inst.width_field);
    let dst = ctx.reg_loc(inst.rd);
    let rd = ctx.reg(inst.rd);
    let rn = ctx.reg(inst.rn);
    let t = ctx.temps.alloc(Width::W32);
    ctx.binary(BinaryOp::Shl, t.loc(), rn, inst.lsb as u64, FlagMask::empty());
    ctx.binary(BinaryOp::And, t.loc(), t.loc(), mask, FlagMask::empty());
    let kept = ctx.temps.alloc(Width::W32);
    ctx.binary(BinaryOp::Bic, kept.loc(), rd, mask, FlagMask::empty());
    ctx.binary(BinaryOp::Orr, dst, kept.loc(), t.loc(), FlagMask::empty());
    ctx.temps.free(Width::W32);
    ctx.temps.free(Width::W32);
}

/// SBFX/UBFX: extract a field, sign- or zero-extended per the descriptor's
/// signedness policy. Implemented as a shift-up/shift-down pair.
pub fn emit_bfx(ctx: &mut TranslationContext<'_>) {
    use crate::morph::descriptor::Policy;
    let inst = ctx.inst;
    let signed = !ctx.desc.policy.contains(Policy::UNSIGNED);
    let dst = ctx.reg_loc(inst.rd);
    let rn = ctx.reg(inst.rn);
    assert!(
        inst.width_field >= 1 && inst.lsb as u32 + inst.width_field as u32 <= 32,
        "malformed bit-field"
    );
    let up = 32 - inst.lsb as u64 - inst.width_field as u64;
    let down = 32 - inst.width_field as u64;
    let t = ctx.temps.alloc(Width::W32);
    ctx.binary(BinaryOp::Shl, t.loc(), rn, up, FlagMask::empty());
    let op = if signed { BinaryOp::Sar } else { BinaryOp::Shr };
    ctx.binary(op, dst, t.loc(), down, FlagMask::empty());
    ctx.temps.free(Width::W32);
}

/// IT: no body — the dispatcher's epilogue loads the block state from the
/// immediate.
pub fn emit_it(_ctx: &mut TranslationContext<'_>) {}

/// NOP and the hint space.
pub fn emit_nop(_ctx: &mut TranslationContext<'_>) {}

fn field_mask(lsb: u8, width: u8) -> u64 {
    assert!(width >= 1 && lsb as u32 + width as u32 <= 32, "malformed bit-field");
    (((1u64 << width) - 1) << lsb) & 0xFFFF_FFFF
}

#[cfg(test)]
mod tests {
    use crate::config::ProcessorConfig;
    use crate::ir::block::Block;
    use crate::ir::interp::Machine;
    use crate::morph::class::InstClass;
    use crate::morph::decoded::DecodedInstruction;
    use crate::morph::Morpher;

    fn run(inst: DecodedInstruction, setup: impl FnOnce(&mut Machine)) -> Machine {
        let mut morpher = Morpher::new(ProcessorConfig::default());
        let mut block = Block::new();
        morpher.morph(&inst, 0, true, &mut block);
        let mut machine = Machine::new();
        setup(&mut machine);
        machine.run(&block);
        machine
    }

    #[test]
    fn test_movw_movt_pair() {
        let mut morpher = Morpher::new(ProcessorConfig::default());
        let mut block = Block::new();
        let movw = DecodedInstruction::new(InstClass::Movw).with_regs(0, 0, 0).with_imm(0xBEEF);
        let movt = DecodedInstruction::new(InstClass::Movt).with_regs(0, 0, 0).with_imm(0xDEAD);
        morpher.morph(&movw, 0, true, &mut block);
        morpher.morph(&movt, 4, false, &mut block);
        let mut machine = Machine::new();
        machine.run(&block);
        assert_eq!(machine.core[0], 0xDEAD_BEEF);
    }

    #[test]
    fn test_bfc() {
        let mut inst = DecodedInstruction::new(InstClass::Bfc).with_regs(0, 0, 0);
        inst.lsb = 8;
        inst.width_field = 8;
        let machine = run(inst, |m| m.core[0] = 0xFFFF_FFFF);
        assert_eq!(machine.core[0], 0xFFFF_00FF);
    }

    #[test]
    fn test_bfi() {
        let mut inst = DecodedInstruction::new(InstClass::Bfi).with_regs(0, 1, 0);
        inst.lsb = 4;
        inst.width_field = 8;
        let machine = run(inst, |m| {
            m.core[0] = 0xAAAA_AAAA;
            m.core[1] = 0x5B;
        });
        assert_eq!(machine.core[0], 0xAAAA_A5BA);
    }

    #[test]
    fn test_sbfx_sign_extends() {
        let mut inst = DecodedInstruction::new(InstClass::Sbfx).with_regs(0, 1, 0);
        inst.lsb = 4;
        inst.width_field = 4;
        let machine = run(inst, |m| m.core[1] = 0x0000_00F0);
        assert_eq!(machine.core[0], 0xFFFF_FFFF);
    }

    #[test]
    fn test_ubfx_zero_extends() {
        let mut inst = DecodedInstruction::new(InstClass::Ubfx).with_regs(0, 1, 0);
        inst.lsb = 4;
        inst.width_field = 4;
        let machine = run(inst, |m| m.core[1] = 0x0000_00F0);
        assert_eq!(machine.core[0], 0xF);
    }
}
