//! Scalar saturating arithmetic: QADD/QSUB/QDADD/QDSUB and SSAT/USAT.

use crate::ir::op::BinaryOp;
use crate::ir::types::Width;
use crate::ir::value::FlagMask;
use crate::morph::context::TranslationContext;
use crate::morph::descriptor::Policy;
use crate::morph::emit::helpers;
use crate::morph::saturate;

/// QADD/QSUB and the doubling QDADD/QDSUB forms. The doubling itself is a
/// saturating addition and participates in the sticky-flag policy.
pub fn emit_qarith(ctx: &mut TranslationContext<'_>) {
    let inst = ctx.inst;
    let op = ctx.desc.op.binary();
    let dst = ctx.reg_loc(inst.rd);
    let rm = ctx.reg(inst.rm);
    let rn = ctx.reg(inst.rn);

    if ctx.desc.policy.contains(Policy::DOUBLING) {
        let doubled = ctx.temps.alloc(Width::W32);
        ctx.binary(BinaryOp::SatAddS, doubled.loc(), rn, rn, FlagMask::Q);
        ctx.binary(op, dst, rm, doubled.loc(), FlagMask::Q);
        ctx.temps.free(Width::W32);
    } else {
        ctx.binary(op, dst, rm, rn, FlagMask::Q);
    }
}

/// SSAT/USAT: saturate a shifted register value to an arbitrary bit
/// position. The guarded clamp sets the sticky flag when it fires.
pub fn emit_sat(ctx: &mut TranslationContext<'_>) {
    let inst = ctx.inst;
    let unsigned = ctx.desc.policy.contains(Policy::UNSIGNED);
    let bits = inst.width_field as u32;
    if unsigned {
        assert!(bits <= 31, "saturate-to width out of range");
    } else {
        assert!((1..=32).contains(&bits), "saturate-to width out of range");
    }

    let rn = ctx.reg(inst.rn);
    let shifted = helpers::emit_imm_shift(ctx, rn, inst.shift, inst.shift_amount, false);
    if unsigned {
        // USAT clamps into [0, 2^bits - 1]; the lower bound needs a signed
        // check because the input is a signed value.
        let max = (1i64 << bits) - 1;
        saturate::clamp_signed(ctx, shifted.loc(), 0, max);
    } else {
        let max = (1i64 << (bits - 1)) - 1;
        saturate::clamp_signed(ctx, shifted.loc(), -max - 1, max);
    }
    ctx.mov(ctx.reg_loc(inst.rd), shifted.loc());
    ctx.temps.free(Width::W32);
}
