//! Bit and byte reversal, count-leading-zeros.

use crate::ir::op::UnaryOp;
use crate::ir::types::Width;
use crate::ir::value::FlagMask;
use crate::morph::context::TranslationContext;

/// CLZ, RBIT, REV and REV16: a straight unary op at word width, selected
/// by the descriptor.
pub fn emit_unary_word(ctx: &mut TranslationContext<'_>) {
    let op = ctx.desc.op.unary();
    let dst = ctx.reg_loc(ctx.inst.rd);
    let rm = ctx.reg(ctx.inst.rm);
    ctx.unary(op, dst, rm, FlagMask::empty());
}

/// REVSH: byte-reverse the bottom halfword, then sign-extend it.
pub fn emit_revsh(ctx: &mut TranslationContext<'_>) {
    let rm = ctx.reg(ctx.inst.rm);
    let t = ctx.temps.alloc(Width::W32);
    ctx.mov(t.loc(), rm);
    let half = t.view(0, Width::H16);
    ctx.unary(UnaryOp::Rev, half, half, FlagMask::empty());
    let dst = ctx.reg_loc(ctx.inst.rd);
    ctx.unary(UnaryOp::SignExtend, dst, half, FlagMask::empty());
    ctx.temps.free(Width::W32);
}
