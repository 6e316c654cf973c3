//! Integer data-processing emission: the sixteen classic ALU opcodes in
//! their immediate, register-shift-immediate and register-shift-register
//! addressing modes.

use crate::ir::op::{BinaryOp, OpSelector, UnaryOp};
use crate::ir::types::Width;
use crate::ir::value::{Flag, FlagMask, Operand};
use crate::morph::context::TranslationContext;
use crate::morph::descriptor::Policy;
use crate::morph::emit::helpers;

/// Shifter carry-out source for the flag-setting logical opcodes.
enum ShifterCarry {
    /// Unchanged, or a translation-time constant from an expanded immediate.
    Const(Option<bool>),
    /// Already emitted into the C flag by the shifter.
    InFlag,
}

fn is_logical(op: OpSelector) -> bool {
    match op {
        OpSelector::Binary(b) => matches!(
            b,
            BinaryOp::And | BinaryOp::Eor | BinaryOp::Orr | BinaryOp::Bic
        ),
        // MOV and MVN take the shifter's carry like the logical group.
        OpSelector::None | OpSelector::Unary(_) => true,
    }
}

/// Immediate operand mode. The decoder has already expanded the rotated
/// immediate and reports its carry-out when the rotation defines one.
pub fn emit_imm(ctx: &mut TranslationContext<'_>) {
    let op2 = Operand::imm(ctx.inst.imm);
    let carry = ctx.inst.imm_carry;
    dp_common(ctx, op2, ShifterCarry::Const(carry));
}

/// Register operand with an immediate shift amount.
pub fn emit_reg(ctx: &mut TranslationContext<'_>) {
    let inst = ctx.inst;
    let want_carry = inst.set_flags && is_logical(ctx.desc.op);
    let rm = ctx.reg(inst.rm);
    let shifted = helpers::emit_imm_shift(ctx, rm, inst.shift, inst.shift_amount, want_carry);
    dp_common(ctx, shifted.loc().into(), ShifterCarry::InFlag);
    ctx.temps.free(Width::W32);
}

/// Register operand shifted by the bottom byte of another register.
pub fn emit_rsr(ctx: &mut TranslationContext<'_>) {
    let inst = ctx.inst;
    let want_carry = inst.set_flags && is_logical(ctx.desc.op);
    let rm = ctx.reg(inst.rm);
    let rs = ctx.reg(inst.ra);
    let shifted = helpers::emit_reg_shift(ctx, rm, inst.shift, rs, want_carry);
    dp_common(ctx, shifted.loc().into(), ShifterCarry::InFlag);
    ctx.temps.free(Width::W32);
}

fn dp_common(ctx: &mut TranslationContext<'_>, op2: Operand, carry: ShifterCarry) {
    let inst = ctx.inst;
    let desc = ctx.desc;
    let s = inst.set_flags;
    let logical = is_logical(desc.op);

    // Logical opcodes get C from the shifter; arithmetic ones compute it.
    if s && logical {
        if let ShifterCarry::Const(Some(c)) = carry {
            ctx.set_flag(Flag::C, c);
        }
    }
    let flags = match (s, logical) {
        (false, _) => FlagMask::empty(),
        (true, true) => FlagMask::NZ,
        (true, false) => FlagMask::NZCV,
    };

    let test_only = desc.policy.contains(Policy::TEST_ONLY);
    let to_pc = inst.rd == 15 && !test_only;
    let dst = if test_only || to_pc {
        helpers::scratch_dst(ctx)
    } else {
        ctx.reg_loc(inst.rd)
    };

    let op1 = ctx.reg(inst.rn);
    match desc.op {
        OpSelector::Binary(op) => ctx.binary(op, dst, op1, op2, flags),
        // MOV: no first operand.
        OpSelector::None => ctx.binary(BinaryOp::Orr, dst, op2, 0u64, flags),
        OpSelector::Unary(op) => {
            debug_assert!(matches!(op, UnaryOp::Not));
            ctx.unary(op, dst, op2, flags);
        }
    }

    if to_pc {
        ctx.write_pc(dst);
    }
    if test_only || to_pc {
        ctx.temps.free(Width::W32);
    }
}
