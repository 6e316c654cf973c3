//! Branch emission. Direct conditional branches fuse the predicate into
//! the jump itself; indirect branches go through the register-file
//! dispatcher and end the translation unit.

use crate::ir::sink::JumpTarget;
use crate::ir::types::Width;
use crate::ir::value::Reg;
use crate::morph::context::TranslationContext;
use crate::morph::descriptor::Policy;
use crate::morph::flags::Predicate;

/// B and BL. The decoder pre-resolves the target to an absolute guest
/// address. A conditional B is fused into a single conditional jump; the
/// not-taken path falls through into the rest of the unit. BL cannot fuse
/// (it must also write LR) and runs under a skip instead.
pub fn emit_branch(ctx: &mut TranslationContext<'_>) {
    let target = ctx.inst.imm as u32;
    if ctx.desc.policy.contains(Policy::LINK) {
        ctx.mov(ctx.reg_loc(Reg::LR as u8), ctx.next_addr);
        ctx.sink.emit_jump(JumpTarget::Addr(target));
        ctx.terminated = true;
        return;
    }
    match ctx.pred {
        Predicate::Always => {
            ctx.sink.emit_jump(JumpTarget::Addr(target));
            ctx.terminated = true;
        }
        Predicate::Test { flag, sense } => {
            ctx.sink.emit_jump_if(flag, sense, JumpTarget::Addr(target));
        }
    }
}

/// BX and BLX (register): indirect branch through the dispatcher. Bit 0 of
/// the target selects the instruction set, so the unit must end.
pub fn emit_branch_exchange(ctx: &mut TranslationContext<'_>) {
    let target = ctx.reg(ctx.inst.rm);
    if ctx.desc.policy.contains(Policy::LINK) {
        ctx.mov(ctx.reg_loc(Reg::LR as u8), ctx.next_addr);
    }
    let t = ctx.temps.alloc(Width::W32);
    ctx.mov(t.loc(), target);
    ctx.write_pc(t.loc());
    ctx.temps.free(Width::W32);
    ctx.switches_iset = true;
}
