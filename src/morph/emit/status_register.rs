//! Status register moves. MSR writes go to the shadow copy and ask the
//! dispatcher's epilogue to refresh the backend's flag locations from it.

use crate::ir::sink::Callee;
use crate::morph::context::TranslationContext;

/// MRS: read the packed status register into Rd.
pub fn emit_mrs(ctx: &mut TranslationContext<'_>) {
    let dst = ctx.reg_loc(ctx.inst.rd);
    ctx.call(Callee::ReadStatus, &[], Some(dst));
}

/// MSR (immediate form).
pub fn emit_msr_imm(ctx: &mut TranslationContext<'_>) {
    let imm = ctx.inst.imm;
    ctx.call(Callee::WriteStatus, &[imm.into()], None);
    ctx.reload_status = true;
}

/// MSR (register form).
pub fn emit_msr_reg(ctx: &mut TranslationContext<'_>) {
    let value = ctx.reg(ctx.inst.rn);
    ctx.call(Callee::WriteStatus, &[value], None);
    ctx.reload_status = true;
}
