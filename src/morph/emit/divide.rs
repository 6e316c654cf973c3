//! Hardware integer divide. Division by zero yields zero, per the
//! architected behavior when trapping is not configured.

use crate::ir::value::FlagMask;
use crate::morph::context::TranslationContext;

/// SDIV/UDIV, descriptor-selected.
pub fn emit_div(ctx: &mut TranslationContext<'_>) {
    let op = ctx.desc.op.binary();
    let dst = ctx.reg_loc(ctx.inst.rd);
    let rn = ctx.reg(ctx.inst.rn);
    let rm = ctx.reg(ctx.inst.rm);
    ctx.binary(op, dst, rn, rm, FlagMask::empty());
}
