//! Saturation and rounding emission policy.
//!
//! These helpers emit the guarded range checks shared by the scalar
//! saturating instructions and the element iteration engine's narrowing
//! path. All of them follow the sticky-flag rule: the cumulative saturation
//! flag is OR-set on overflow and never cleared by anything here.

use crate::ir::op::{BinaryOp, CmpRel};
use crate::ir::types::Width;
use crate::ir::value::{Flag, FlagMask, Loc, Operand};
use crate::morph::context::TranslationContext;

fn imm_at(value: i64, width: Width) -> Operand {
    Operand::Imm(value as u64 & width.unsigned_max())
}

/// Clamp the signed value in `loc` to `[min, max]`, setting the sticky
/// saturation flag when it was out of range.
pub fn clamp_signed(ctx: &mut TranslationContext<'_>, loc: Loc, min: i64, max: i64) {
    let width = loc.width();
    ctx.compare(CmpRel::GtS, width, loc, imm_at(max, width));
    ctx.cond_move(Flag::Tst, true, loc, imm_at(max, width));
    ctx.cond_move(Flag::Tst, true, Loc::Flag(Flag::Q), Operand::imm(1));
    ctx.compare(CmpRel::LtS, width, loc, imm_at(min, width));
    ctx.cond_move(Flag::Tst, true, loc, imm_at(min, width));
    ctx.cond_move(Flag::Tst, true, Loc::Flag(Flag::Q), Operand::imm(1));
}

/// Clamp the unsigned value in `loc` to `[0, max]`. Only the upper bound
/// needs a check.
pub fn clamp_unsigned(ctx: &mut TranslationContext<'_>, loc: Loc, max: u64) {
    let width = loc.width();
    ctx.compare(CmpRel::GtU, width, loc, Operand::imm(max & width.unsigned_max()));
    ctx.cond_move(Flag::Tst, true, loc, Operand::imm(max & width.unsigned_max()));
    ctx.cond_move(Flag::Tst, true, Loc::Flag(Flag::Q), Operand::imm(1));
}

/// Set the sticky flag if the signed value in `loc` lies outside
/// `[min, max]`, without clamping. The DSP dual multiplies wrap their
/// accumulation but still record the overflow.
pub fn sticky_if_outside_signed(ctx: &mut TranslationContext<'_>, loc: Loc, min: i64, max: i64) {
    let width = loc.width();
    ctx.compare(CmpRel::GtS, width, loc, imm_at(max, width));
    ctx.cond_move(Flag::Tst, true, Loc::Flag(Flag::Q), Operand::imm(1));
    ctx.compare(CmpRel::LtS, width, loc, imm_at(min, width));
    ctx.cond_move(Flag::Tst, true, Loc::Flag(Flag::Q), Operand::imm(1));
}

/// The guarded narrow-with-saturation check: compare the full-width
/// intermediate in `wide` against the representable range of `narrow`'s
/// width, clamp and flag if out of range, then perform the truncating move.
///
/// `src_signed` is the signedness of the intermediate, `dst_unsigned` that
/// of the result; signed-to-unsigned is the VQMOVUN-style combination.
pub fn narrow_with_saturation(
    ctx: &mut TranslationContext<'_>,
    wide: Loc,
    narrow: Loc,
    src_signed: bool,
    dst_unsigned: bool,
) {
    let result_width = narrow.width();
    match (src_signed, dst_unsigned) {
        (true, false) => {
            clamp_signed(ctx, wide, result_width.signed_min(), result_width.signed_max())
        }
        (true, true) => clamp_signed(ctx, wide, 0, result_width.unsigned_max() as i64),
        (false, true) => clamp_unsigned(ctx, wide, result_width.unsigned_max()),
        (false, false) => {
            panic!("unsigned intermediate narrowed to a signed result is not a valid descriptor")
        }
    }
    ctx.mov(narrow, wide);
}

/// Add the rounding constant — half a unit in the last place of the
/// `result_width`-wide result — to the intermediate in `loc` before it is
/// narrowed. When the descriptor also saturates, the addition itself
/// saturates and participates in the sticky-flag policy.
pub fn round_before_narrow(
    ctx: &mut TranslationContext<'_>,
    loc: Loc,
    result_width: Width,
    saturating: bool,
    signed: bool,
) {
    let half_ulp = 1u64 << (result_width.bits() - 1);
    if saturating {
        let op = if signed { BinaryOp::SatAddS } else { BinaryOp::SatAddU };
        ctx.binary(op, loc, loc, Operand::imm(half_ulp), FlagMask::Q);
    } else {
        ctx.binary(BinaryOp::Add, loc, loc, Operand::imm(half_ulp), FlagMask::empty());
    }
}
