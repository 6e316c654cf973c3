//! Multiply, multiply-accumulate, long multiply and the DSP halfword
//! multiply families.

use crate::ir::op::BinaryOp;
use crate::ir::types::Width;
use crate::ir::value::{FlagMask, Operand};
use crate::morph::context::TranslationContext;
use crate::morph::descriptor::Policy;
use crate::morph::emit::helpers;
use crate::morph::saturate;

/// MUL/MLA/MLS: 32-bit product, optionally accumulated into or subtracted
/// from Ra. S forms set N and Z.
pub fn emit_mul(ctx: &mut TranslationContext<'_>) {
    let inst = ctx.inst;
    let desc = ctx.desc;
    let flags = if inst.set_flags { FlagMask::NZ } else { FlagMask::empty() };
    let dst = ctx.reg_loc(inst.rd);
    let rn = ctx.reg(inst.rn);
    let rm = ctx.reg(inst.rm);

    if desc.policy.contains(Policy::ACCUMULATE) {
        let product = ctx.temps.alloc(Width::W32);
        ctx.binary(BinaryOp::Mul, product.loc(), rn, rm, FlagMask::empty());
        let ra = ctx.reg(inst.ra);
        let acc = desc.acc_op.binary();
        // MLA adds the product onto Ra; MLS subtracts it from Ra.
        match acc {
            BinaryOp::Add => ctx.binary(acc, dst, ra, product.loc(), flags),
            BinaryOp::Sub => ctx.binary(acc, dst, ra, product.loc(), flags),
            other => panic!("multiply accumulate cannot use {:?}", other),
        }
        ctx.temps.free(Width::W32);
    } else {
        ctx.binary(BinaryOp::Mul, dst, rn, rm, flags);
    }
}

/// UMULL/UMLAL/SMULL/SMLAL: 64-bit product into RdHi:RdLo. The decoded
/// `rd` is RdLo and `rn` RdHi; sources are `rm` and `ra`.
pub fn emit_mul_long(ctx: &mut TranslationContext<'_>) {
    let inst = ctx.inst;
    let desc = ctx.desc;
    let signed = desc.policy.contains(Policy::SIGN_EXTEND);
    let accumulate = desc.policy.contains(Policy::ACCUMULATE);
    let flags = if inst.set_flags { FlagMask::NZ } else { FlagMask::empty() };

    let rm = ctx.reg(inst.rm);
    let ra = ctx.reg(inst.ra);
    let a = helpers::emit_extend_64(ctx, rm, signed);
    let b = helpers::emit_extend_64(ctx, ra, signed);
    let product = ctx.temps.alloc(Width::D64);
    ctx.binary(BinaryOp::Mul, product.loc(), a.loc(), b.loc(), FlagMask::empty());

    if accumulate {
        let acc = ctx.temps.alloc(Width::D64);
        ctx.mov(acc.view(0, Width::W32), ctx.reg(inst.rd));
        ctx.mov(acc.view(4, Width::W32), ctx.reg(inst.rn));
        ctx.binary(BinaryOp::Add, product.loc(), product.loc(), acc.loc(), FlagMask::empty());
        ctx.temps.free(Width::D64);
    }
    if !flags.is_empty() {
        // N and Z are defined over the whole 64-bit result.
        ctx.binary(BinaryOp::Orr, product.loc(), product.loc(), 0u64, flags);
    }
    ctx.mov(ctx.reg_loc(inst.rd), product.view(0, Width::W32));
    ctx.mov(ctx.reg_loc(inst.rn), product.view(4, Width::W32));
    ctx.temps.free(Width::D64);
    helpers::free_extend_64(ctx);
    helpers::free_extend_64(ctx);
}

/// SMULBB/BT/TB/TT: signed 16x16 product of the selected halfwords.
/// SMLA forms accumulate and flag overflow of the addition.
pub fn emit_mul_half(ctx: &mut TranslationContext<'_>) {
    let inst = ctx.inst;
    let desc = ctx.desc;
    let rn = ctx.reg(inst.rn);
    let rm = ctx.reg(inst.rm);
    let a = helpers::emit_half_sext(ctx, rn, desc.policy.contains(Policy::HALF_HI_A));
    let b = helpers::emit_half_sext(ctx, rm, desc.policy.contains(Policy::HALF_HI_B));
    ctx.binary(BinaryOp::Mul, ctx.reg_loc(inst.rd), a.loc(), b.loc(), FlagMask::empty());
    ctx.temps.free(Width::W32);
    ctx.temps.free(Width::W32);
}

/// SMULWB/WT: 32x16 product, top 32 bits of the 48-bit result.
pub fn emit_mul_word_half(ctx: &mut TranslationContext<'_>) {
    let inst = ctx.inst;
    let desc = ctx.desc;
    let rn = ctx.reg(inst.rn);
    let rm = ctx.reg(inst.rm);
    let a = helpers::emit_extend_64(ctx, rn, true);
    let half = helpers::emit_half_sext(ctx, rm, desc.policy.contains(Policy::HALF_HI_B));
    let b = helpers::emit_extend_64(ctx, half.loc().into(), true);
    let product = ctx.temps.alloc(Width::D64);
    ctx.binary(BinaryOp::Mul, product.loc(), a.loc(), b.loc(), FlagMask::empty());
    ctx.binary(BinaryOp::Sar, product.loc(), product.loc(), 16u64, FlagMask::empty());
    ctx.mov(ctx.reg_loc(inst.rd), product.view(0, Width::W32));
    ctx.temps.free(Width::D64);
    helpers::free_extend_64(ctx);
    ctx.temps.free(Width::W32);
    helpers::free_extend_64(ctx);
}

/// SMUAD/SMUSD (and the X forms): dual signed 16x16 products, summed or
/// differenced. The sum wraps but records overflow in the sticky flag.
pub fn emit_mul_dual(ctx: &mut TranslationContext<'_>) {
    let inst = ctx.inst;
    let desc = ctx.desc;
    let exchange = desc.policy.contains(Policy::EXCHANGE);
    let subtract = desc.policy.contains(Policy::DUAL_SUB);
    let rn = ctx.reg(inst.rn);
    let rm = ctx.reg(inst.rm);

    let lo_a = helpers::emit_half_sext(ctx, rn, false);
    let lo_b = helpers::emit_half_sext(ctx, rm, exchange);
    let wide_a = helpers::emit_extend_64(ctx, lo_a.loc().into(), true);
    let wide_b = helpers::emit_extend_64(ctx, lo_b.loc().into(), true);
    let low = ctx.temps.alloc(Width::D64);
    ctx.binary(BinaryOp::Mul, low.loc(), wide_a.loc(), wide_b.loc(), FlagMask::empty());

    let hi_a = helpers::emit_half_sext(ctx, rn, true);
    let hi_b = helpers::emit_half_sext(ctx, rm, !exchange);
    let wide_c = helpers::emit_extend_64(ctx, hi_a.loc().into(), true);
    let wide_d = helpers::emit_extend_64(ctx, hi_b.loc().into(), true);
    let high = ctx.temps.alloc(Width::D64);
    ctx.binary(BinaryOp::Mul, high.loc(), wide_c.loc(), wide_d.loc(), FlagMask::empty());

    let op = if subtract { BinaryOp::Sub } else { BinaryOp::Add };
    ctx.binary(op, low.loc(), low.loc(), high.loc(), FlagMask::empty());
    if !subtract {
        // Only the addition can leave the 32-bit signed range.
        saturate::sticky_if_outside_signed(
            ctx,
            low.loc(),
            Width::W32.signed_min(),
            Width::W32.signed_max(),
        );
    }
    ctx.mov(ctx.reg_loc(inst.rd), low.view(0, Width::W32));

    ctx.temps.free(Width::D64);
    helpers::free_extend_64(ctx);
    helpers::free_extend_64(ctx);
    ctx.temps.free(Width::W32);
    ctx.temps.free(Width::W32);
    ctx.temps.free(Width::D64);
    helpers::free_extend_64(ctx);
    helpers::free_extend_64(ctx);
    ctx.temps.free(Width::W32);
    ctx.temps.free(Width::W32);
}

#[cfg(test)]
mod tests {
    use crate::config::ProcessorConfig;
    use crate::ir::block::Block;
    use crate::ir::interp::Machine;
    use crate::ir::value::Flag;
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
    fn test_mla() {
        let inst = DecodedInstruction::new(InstClass::Mla).with_regs(0, 1, 2).with_ra(3);
        let machine = run(inst, |m| {
            m.core[1] = 6;
            m.core[2] = 7;
            m.core[3] = 100;
        });
        assert_eq!(machine.core[0], 142);
    }

    #[test]
    fn test_mls() {
        let inst = DecodedInstruction::new(InstClass::Mls).with_regs(0, 1, 2).with_ra(3);
        let machine = run(inst, |m| {
            m.core[1] = 6;
            m.core[2] = 7;
            m.core[3] = 100;
        });
        assert_eq!(machine.core[0], 58);
    }

    #[test]
    fn test_smull_sign() {
        // RdLo = r0, RdHi = r1, sources r2 * r3.
        let inst = DecodedInstruction::new(InstClass::Smull).with_regs(0, 1, 2).with_ra(3);
        let machine = run(inst, |m| {
            m.core[2] = (-2i32) as u32;
            m.core[3] = 3;
        });
        assert_eq!(machine.core[0], (-6i64) as u64 as u32);
        assert_eq!(machine.core[1], ((-6i64) as u64 >> 32) as u32);
    }

    #[test]
    fn test_umlal_accumulates() {
        let inst = DecodedInstruction::new(InstClass::Umlal).with_regs(0, 1, 2).with_ra(3);
        let machine = run(inst, |m| {
            m.core[0] = 0xFFFF_FFFF; // RdLo
            m.core[1] = 1; // RdHi
            m.core[2] = 2;
            m.core[3] = 3;
        });
        // 0x1_FFFF_FFFF + 6 = 0x2_0000_0005
        assert_eq!(machine.core[0], 5);
        assert_eq!(machine.core[1], 2);
    }

    #[test]
    fn test_smulbt_selects_halves() {
        let inst = DecodedInstruction::new(InstClass::Smulbt).with_regs(0, 1, 2);
        let machine = run(inst, |m| {
            m.core[1] = 0x0000_0005; // bottom half 5
            m.core[2] = 0xFFFE_0000; // top half -2
        });
        assert_eq!(machine.core[0] as i32, -10);
    }

    #[test]
    fn test_smulwb() {
        let inst = DecodedInstruction::new(InstClass::Smulwb).with_regs(0, 1, 2);
        let machine = run(inst, |m| {
            m.core[1] = 0x0001_0000; // 65536
            m.core[2] = 0x0000_0003;
        });
        // (65536 * 3) >> 16 = 3
        assert_eq!(machine.core[0], 3);
    }

    #[test]
    fn test_smuad_overflow_sets_sticky() {
        let inst = DecodedInstruction::new(InstClass::Smuad).with_regs(0, 1, 2);
        let machine = run(inst, |m| {
            m.core[1] = 0x8000_8000;
            m.core[2] = 0x8000_8000;
        });
        // 2 * (-32768)^2 = 0x8000_0000 exceeds the signed 32-bit range.
        assert_eq!(machine.core[0], 0x8000_0000, "the sum wraps");
        assert!(machine.flag(Flag::Q));
    }

    #[test]
    fn test_smusd_no_sticky() {
        let inst = DecodedInstruction::new(InstClass::Smusd).with_regs(0, 1, 2);
        let machine = run(inst, |m| {
            m.core[1] = 0x0002_0003; // halves 2, 3
            m.core[2] = 0x0004_0005; // halves 4, 5
        });
        // low 3*5 - high 2*4 = 7
        assert_eq!(machine.core[0], 7);
        assert!(!machine.flag(Flag::Q));
    }
}
