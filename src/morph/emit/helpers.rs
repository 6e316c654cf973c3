//! Shared emission helpers: the barrel shifter and halfword selection.

use crate::ir::op::{BinaryOp, UnaryOp};
use crate::ir::types::Width;
use crate::ir::value::{FlagMask, Loc, Operand};
use crate::morph::context::TranslationContext;
use crate::morph::decoded::ShiftType;
use crate::morph::temp::TempHandle;

/// Apply an immediate-amount shift to `value`, writing the result into a
/// fresh 32-bit temporary. When `want_carry` is set the shifter carry-out
/// is written to the C flag (zero-amount LSL leaves C untouched, matching
/// the architected shifter).
///
/// The caller owns the returned temporary.
pub fn emit_imm_shift(
    ctx: &mut TranslationContext<'_>,
    value: Operand,
    shift: ShiftType,
    amount: u8,
    want_carry: bool,
) -> TempHandle {
    let t = ctx.temps.alloc(Width::W32);
    let carry = if want_carry { FlagMask::C } else { FlagMask::empty() };
    match (shift, amount) {
        (ShiftType::Lsl, 0) => ctx.mov(t.loc(), value),
        (ShiftType::Lsl, n) => ctx.binary(BinaryOp::Shl, t.loc(), value, n as u64, carry),
        // LSR/ASR encode a 32-bit shift as amount zero.
        (ShiftType::Lsr, n) => {
            let n = if n == 0 { 32 } else { n as u32 };
            ctx.binary(BinaryOp::Shr, t.loc(), value, n as u64, carry);
        }
        (ShiftType::Asr, n) => {
            let n = if n == 0 { 32 } else { n as u32 };
            ctx.binary(BinaryOp::Sar, t.loc(), value, n as u64, carry);
        }
        // ROR #0 is RRX.
        (ShiftType::Ror, 0) => ctx.unary(UnaryOp::Rrx, t.loc(), value, carry),
        (ShiftType::Ror, n) => ctx.binary(BinaryOp::Ror, t.loc(), value, n as u64, carry),
    }
    t
}

/// Apply a register-amount shift (bottom byte of `amount`) to `value`.
/// The caller owns the returned temporary.
pub fn emit_reg_shift(
    ctx: &mut TranslationContext<'_>,
    value: Operand,
    shift: ShiftType,
    amount: Operand,
    want_carry: bool,
) -> TempHandle {
    let masked = ctx.temps.alloc(Width::W32);
    ctx.binary(BinaryOp::And, masked.loc(), amount, 0xFFu64, FlagMask::empty());
    let t = ctx.temps.alloc(Width::W32);
    let carry = if want_carry { FlagMask::C } else { FlagMask::empty() };
    let op = match shift {
        ShiftType::Lsl => BinaryOp::Shl,
        ShiftType::Lsr => BinaryOp::Shr,
        ShiftType::Asr => BinaryOp::Sar,
        ShiftType::Ror => BinaryOp::Ror,
    };
    ctx.binary(op, t.loc(), value, masked.loc(), carry);
    // Free the amount temporary by swapping the result below it.
    ctx.mov(masked.loc(), t.loc());
    ctx.temps.free(Width::W32);
    masked
}

/// Sign-extend the selected halfword of `value` into a fresh temporary.
/// `high` picks bits [31:16], otherwise [15:0].
pub fn emit_half_sext(
    ctx: &mut TranslationContext<'_>,
    value: Operand,
    high: bool,
) -> TempHandle {
    let raw = ctx.temps.alloc(Width::W32);
    ctx.mov(raw.loc(), value);
    let t = ctx.temps.alloc(Width::W32);
    let half = raw.view(if high { 2 } else { 0 }, Width::H16);
    ctx.unary(UnaryOp::SignExtend, t.loc(), half, FlagMask::empty());
    ctx.mov(raw.loc(), t.loc());
    ctx.temps.free(Width::W32);
    raw
}

/// Sign- or zero-extend a 32-bit operand into a fresh 64-bit temporary.
pub fn emit_extend_64(
    ctx: &mut TranslationContext<'_>,
    value: Operand,
    signed: bool,
) -> TempHandle {
    let narrow = ctx.temps.alloc(Width::W32);
    ctx.mov(narrow.loc(), value);
    let t = ctx.temps.alloc(Width::D64);
    let op = if signed { UnaryOp::SignExtend } else { UnaryOp::ZeroExtend };
    ctx.unary(op, t.loc(), narrow.view(0, Width::W32), FlagMask::empty());
    t
}

/// Free the pair of temporaries left live by [`emit_extend_64`]:
/// the 64-bit result on top, the 32-bit staging slot beneath it.
pub fn free_extend_64(ctx: &mut TranslationContext<'_>) {
    ctx.temps.free(Width::D64);
    ctx.temps.free(Width::W32);
}

/// Copy `src` into a dead 32-bit temporary destination, for test-only
/// operations that compute flags without writing a register.
pub fn scratch_dst(ctx: &mut TranslationContext<'_>) -> Loc {
    ctx.temps.alloc(Width::W32).loc()
}
