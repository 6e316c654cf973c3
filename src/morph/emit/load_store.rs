//! Load and store emission: word/halfword/byte forms with the three
//! index/writeback addressing combinations, and the whole-register vector
//! load/store structures.
//!
//! Memory is reached through the MMU collaborator's read/write callees;
//! alignment faults are its business at guest run time.

use crate::ir::op::BinaryOp;
use crate::ir::sink::Callee;
use crate::ir::types::Width;
use crate::ir::value::{FlagMask, Loc, Operand};
use crate::morph::context::TranslationContext;
use crate::morph::descriptor::Policy;
use crate::morph::emit::helpers;
use crate::morph::temp::TempHandle;

/// Compute the offset address into a fresh temporary. The caller frees it.
fn offset_addr(ctx: &mut TranslationContext<'_>, offset: Operand) -> TempHandle {
    let base = ctx.reg(ctx.inst.rn);
    let t = ctx.temps.alloc(Width::W32);
    let op = if ctx.inst.add_offset { BinaryOp::Add } else { BinaryOp::Sub };
    ctx.binary(op, t.loc(), base, offset, FlagMask::empty());
    t
}

fn transfer(ctx: &mut TranslationContext<'_>, offset: Operand) {
    let inst = ctx.inst;
    let width = ctx.desc.esize;
    let load = !ctx.desc.policy.contains(Policy::STORE);
    let pre = inst.pre_index;
    let writeback = inst.writeback || !pre;

    let addr_temp = offset_addr(ctx, offset);
    let addr: Operand = if pre { addr_temp.loc().into() } else { ctx.reg(inst.rn) };

    if load {
        // Load into scratch first: with writeback and Rd == Rn the loaded
        // value must win.
        let value = ctx.temps.alloc(Width::W32);
        ctx.call(Callee::ReadMem(width), &[addr], Some(value.loc()));
        if writeback {
            ctx.mov(ctx.reg_loc(inst.rn), addr_temp.loc());
        }
        if inst.rd == 15 {
            ctx.write_pc(value.loc());
        } else {
            ctx.mov(ctx.reg_loc(inst.rd), value.loc());
        }
        ctx.temps.free(Width::W32);
    } else {
        let value = ctx.reg(inst.rd);
        ctx.call(Callee::WriteMem(width), &[addr, value], None);
        if writeback {
            ctx.mov(ctx.reg_loc(inst.rn), addr_temp.loc());
        }
    }
    ctx.temps.free(Width::W32);
}

/// Immediate-offset loads and stores at the descriptor's width.
pub fn emit_imm(ctx: &mut TranslationContext<'_>) {
    let offset = Operand::imm(ctx.inst.imm);
    transfer(ctx, offset);
}

/// Register-offset forms, with the usual immediate-amount shift.
pub fn emit_reg(ctx: &mut TranslationContext<'_>) {
    let inst = ctx.inst;
    let rm = ctx.reg(inst.rm);
    let shifted = helpers::emit_imm_shift(ctx, rm, inst.shift, inst.shift_amount, false);
    transfer(ctx, shifted.loc().into());
    ctx.temps.free(Width::W32);
}

/// VLD1/VST1 whole-register forms: `nelem` consecutive 128-bit registers,
/// moved as 64-bit halves. Writeback advances the base past the structure.
pub fn emit_vector_transfer(ctx: &mut TranslationContext<'_>) {
    let inst = ctx.inst;
    let load = !ctx.desc.policy.contains(Policy::STORE);
    let nelem = inst.nelem.max(1);

    let addr = ctx.temps.alloc(Width::W32);
    ctx.mov(addr.loc(), ctx.reg(inst.rn));
    for reg in 0..nelem {
        for half in 0..2u8 {
            let lane = Loc::vec(inst.rd + reg, half, Width::D64);
            if load {
                ctx.call(Callee::ReadMem(Width::D64), &[addr.loc().into()], Some(lane));
            } else {
                ctx.call(Callee::WriteMem(Width::D64), &[addr.loc().into(), lane.into()], None);
            }
            ctx.binary(BinaryOp::Add, addr.loc(), addr.loc(), 8u64, FlagMask::empty());
        }
    }
    if inst.writeback {
        ctx.mov(ctx.reg_loc(inst.rn), addr.loc());
    }
    ctx.temps.free(Width::W32);
}
