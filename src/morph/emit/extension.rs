//! Byte/halfword extend instructions, with and without accumulation.

use crate::ir::op::{BinaryOp, UnaryOp};
use crate::ir::types::Width;
use crate::ir::value::FlagMask;
use crate::morph::context::TranslationContext;
use crate::morph::descriptor::Policy;

/// SXTB/SXTH/UXTB/UXTH and the SXTAB/SXTAH/UXTAB/UXTAH accumulating
/// forms. The descriptor carries the source width, the signedness and the
/// accumulate policy; the decoded shift amount is the rotation (0/8/16/24).
pub fn emit_extend(ctx: &mut TranslationContext<'_>) {
    let inst = ctx.inst;
    let desc = ctx.desc;
    let signed = desc.policy.contains(Policy::SIGN_EXTEND);
    let accumulate = desc.policy.contains(Policy::ACCUMULATE);
    let rotation = inst.shift_amount as u64;

    let rm = ctx.reg(inst.rm);
    let rotated = ctx.temps.alloc(Width::W32);
    if rotation == 0 {
        ctx.mov(rotated.loc(), rm);
    } else {
        ctx.binary(BinaryOp::Ror, rotated.loc(), rm, rotation, FlagMask::empty());
    }

    let extended = ctx.temps.alloc(Width::W32);
    let narrow = rotated.view(0, desc.esize);
    let op = if signed { UnaryOp::SignExtend } else { UnaryOp::ZeroExtend };
    ctx.unary(op, extended.loc(), narrow, FlagMask::empty());

    let dst = ctx.reg_loc(inst.rd);
    if accumulate {
        let rn = ctx.reg(inst.rn);
        ctx.binary(BinaryOp::Add, dst, rn, extended.loc(), FlagMask::empty());
    } else {
        ctx.mov(dst, extended.loc());
    }
    ctx.temps.free(Width::W32);
    ctx.temps.free(Width::W32);
}
