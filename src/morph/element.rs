//! Element iteration over vector operand shapes.
//!
//! The generic algorithm behind every vector emission routine: given the
//! descriptor's element width, shape and register-group count, enumerate
//! every element to operate on, resolve its concrete source and destination
//! locations (extending narrower sources to the working width), route the
//! results through a scratch buffer when the destination overlaps a source,
//! and apply the rounding and narrow-with-saturation policies uniformly on
//! the way back out.
//!
//! Vector registers are 128-bit. Widening and pairwise shapes consume the
//! low 64-bit half of their source registers; narrowing and pairwise shapes
//! produce into the low half of their destination registers. This mirrors
//! the guest ISA's double/quad register pairing without modeling a separate
//! half-width register file.

use crate::ir::op::UnaryOp;
use crate::ir::types::Width;
use crate::ir::value::{FlagMask, Loc, Operand};
use crate::morph::context::TranslationContext;
use crate::morph::descriptor::{OperandRole, Policy, Shape};
use crate::morph::saturate;
use crate::morph::temp::TempHandle;

/// One resolved iteration step, handed to the per-element callback.
pub struct Element {
    pub index: usize,
    /// Working destination at the operation width. For narrowing shapes
    /// this is a scratch intermediate; the engine narrows it afterwards.
    pub dst: Loc,
    /// First source, extended to the operation width where the shape
    /// requires it.
    pub a: Operand,
    /// Second source, pair partner, or resolved scalar. Absent for plain
    /// unary operations.
    pub b: Option<Operand>,
    /// The real destination lane's pre-instruction value, for accumulating
    /// callbacks. Valid even when results are routed through scratch.
    pub prev: Operand,
}

/// Iteration geometry derived from a descriptor plus decoded register
/// numbers. Derived at translation time, never stored.
struct Plan {
    shape: Shape,
    esize: Width,
    dst_width: Width,
    src_widths: [Width; 2],
    op_width: Width,
    group: usize,
    /// Output elements per destination register.
    per_reg: usize,
    /// Total output elements.
    count: usize,
    dst: u8,
    src1: u8,
    src2: u8,
    role: OperandRole,
    sign_extend: bool,
    overlap: bool,
}

impl Plan {
    fn build(ctx: &TranslationContext<'_>, unary: bool) -> Plan {
        let desc = ctx.desc;
        let inst = ctx.inst;
        let shape = desc.shape;
        let esize = desc.esize;

        // Shape/width preconditions are descriptor authoring errors, never
        // a property of the guest program.
        match shape {
            Shape::Widen | Shape::WideMixed | Shape::PairwiseWiden | Shape::Pairwise => {
                assert!(esize <= Width::W32, "element width {} incompatible with {:?}", esize, shape)
            }
            Shape::Narrow => {
                assert!(esize >= Width::H16, "element width {} incompatible with narrowing", esize)
            }
            Shape::Same => {}
        }
        assert!(desc.group >= 1, "register-group count must be at least 1");
        match (shape, desc.role) {
            (Shape::Pairwise | Shape::PairwiseWiden, OperandRole::Scalar) => {
                panic!("scalar operand role is meaningless for pairwise shapes")
            }
            _ => {}
        }

        let dst_width = desc.dst_width();
        let src_widths = desc.src_widths();
        let op_width = desc.op_width();
        let group = desc.group as usize;

        let per_reg = if desc.elems != 0 {
            desc.elems as usize
        } else {
            match shape {
                Shape::Same | Shape::Narrow => 16 / esize.bytes() as usize,
                Shape::Widen | Shape::WideMixed => 16 / dst_width.bytes() as usize,
                Shape::Pairwise | Shape::PairwiseWiden => 8 / esize.bytes() as usize,
            }
        };
        assert!(
            per_reg * dst_width.bytes() as usize <= 16,
            "{} outputs of {} overflow a 128-bit register",
            per_reg,
            dst_width
        );
        let count = group * per_reg;

        let (src1, src2) = if shape == Shape::PairwiseWiden || unary {
            (inst.rm, inst.rm)
        } else {
            (inst.rn, inst.rm)
        };
        let dst = inst.rd;

        let plan = Plan {
            shape,
            esize,
            dst_width,
            src_widths,
            op_width,
            group,
            per_reg,
            count,
            dst,
            src1,
            src2,
            role: desc.role,
            sign_extend: desc.policy.contains(Policy::SIGN_EXTEND),
            overlap: false,
        };
        Plan { overlap: plan.detect_overlap(inst.scalar_index, unary), ..plan }
    }

    /// Does the destination byte range intersect a source range it cannot
    /// safely share? The exact coincide case — identical register range
    /// with identical element width, which only the same-width shape can
    /// produce — operates strictly lane-on-lane and is safe in place.
    /// Every other intersection, including the sub/super-range overlaps
    /// produced by mismatched widths, routes through scratch so each
    /// iteration observes only pre-instruction source values.
    fn detect_overlap(&self, scalar_index: u8, unary: bool) -> bool {
        let group_bytes = self.group as u32 * 16;
        let dst_range = (self.dst as u32 * 16, group_bytes);

        let mut ranges: Vec<(u32, u32)> = Vec::new();
        ranges.push((self.src1 as u32 * 16, group_bytes));
        if !unary {
            match self.role {
                OperandRole::None => {}
                OperandRole::PerElement => ranges.push((self.src2 as u32 * 16, group_bytes)),
                OperandRole::Scalar => ranges.push((
                    self.src2 as u32 * 16 + scalar_index as u32 * self.src_widths[1].bytes(),
                    self.src_widths[1].bytes(),
                )),
            }
        }

        ranges.into_iter().any(|src_range| {
            let intersects = dst_range.0 < src_range.0 + src_range.1
                && src_range.0 < dst_range.0 + dst_range.1;
            let coincides = self.shape == Shape::Same
                && dst_range == src_range
                && self.dst_width == self.esize;
            intersects && !coincides
        })
    }
}

/// Resolve one source lane, extending it to the working width when the
/// shape demands it. Returns the operand and leaves any temporary it
/// allocated to the caller's mark/restore bracket.
fn resolve_src(
    ctx: &mut TranslationContext<'_>,
    reg: u8,
    lane: usize,
    lane_width: Width,
    op_width: Width,
    sign_extend: bool,
) -> Operand {
    let loc = Loc::vec(reg, lane as u8, lane_width);
    if lane_width == op_width {
        return loc.into();
    }
    let t = ctx.temps.alloc(op_width.container());
    let wide = t.view(0, op_width);
    let extend = if sign_extend { UnaryOp::SignExtend } else { UnaryOp::ZeroExtend };
    ctx.unary(extend, wide, loc, FlagMask::empty());
    wide.into()
}

/// Run `per_elem` over every element the descriptor's shape names,
/// honoring overlap routing, scalar resolution, per-iteration temporary
/// rollback and the narrowing saturation/rounding policy.
pub fn iterate<'a>(
    ctx: &mut TranslationContext<'a>,
    unary: bool,
    mut per_elem: impl FnMut(&mut TranslationContext<'a>, &Element),
) {
    let plan = Plan::build(ctx, unary);
    let policy = ctx.desc.policy;

    // Overlap hazard: accumulate into scratch sized to the whole
    // destination group, copy back after the loop.
    let dst_bytes = plan.count as u32 * plan.dst_width.bytes();
    let scratch: Option<TempHandle> =
        if plan.overlap { Some(ctx.temps.alloc(Width::containing_bytes(dst_bytes))) } else { None };

    // A scalar second operand is resolved once, outside the loop.
    let mut scalar_temp: Option<Width> = None;
    let scalar: Option<Operand> = if !unary && plan.role == OperandRole::Scalar {
        let lane_width = plan.src_widths[1];
        let loc = Loc::vec(plan.src2, ctx.inst.scalar_index, lane_width);
        if lane_width == plan.op_width {
            Some(loc.into())
        } else {
            let container = plan.op_width.container();
            let t = ctx.temps.alloc(container);
            scalar_temp = Some(container);
            let wide = t.view(0, plan.op_width);
            let extend =
                if plan.sign_extend { UnaryOp::SignExtend } else { UnaryOp::ZeroExtend };
            ctx.unary(extend, wide, loc, FlagMask::empty());
            Some(wide.into())
        }
    } else {
        None
    };

    let mark = ctx.temps.mark();
    for i in 0..plan.count {
        ctx.temps.restore(mark);
        let r = (i / plan.per_reg) as u8;
        let j = i % plan.per_reg;

        let real_dst = Loc::vec(plan.dst + r, j as u8, plan.dst_width);
        let routed_dst = match &scratch {
            Some(s) => s.view(i as u32 * plan.dst_width.bytes(), plan.dst_width),
            None => real_dst,
        };
        // Narrowing shapes compute at the full operation width first.
        let work_dst = if plan.shape == Shape::Narrow {
            ctx.temps.alloc(plan.op_width.container()).view(0, plan.op_width)
        } else {
            routed_dst
        };

        let (a, b) = match plan.shape {
            Shape::Same | Shape::Widen | Shape::WideMixed | Shape::Narrow => {
                let a = resolve_src(
                    ctx,
                    plan.src1 + r,
                    j,
                    plan.src_widths[0],
                    plan.op_width,
                    plan.sign_extend,
                );
                let b = if unary {
                    None
                } else {
                    match plan.role {
                        OperandRole::None => None,
                        OperandRole::Scalar => scalar,
                        OperandRole::PerElement => Some(resolve_src(
                            ctx,
                            plan.src2 + r,
                            j,
                            plan.src_widths[1],
                            plan.op_width,
                            plan.sign_extend,
                        )),
                    }
                };
                (a, b)
            }
            Shape::Pairwise => {
                // Low destination half from the first source, high half
                // from the second; adjacent input pairs.
                let half = plan.per_reg / 2;
                let (reg, base) =
                    if j < half { (plan.src1 + r, 2 * j) } else { (plan.src2 + r, 2 * (j - half)) };
                let a = Loc::vec(reg, base as u8, plan.esize).into();
                let b = Loc::vec(reg, base as u8 + 1, plan.esize).into();
                (a, Some(b))
            }
            Shape::PairwiseWiden => {
                let a = resolve_src(
                    ctx,
                    plan.src1 + r,
                    2 * j,
                    plan.esize,
                    plan.op_width,
                    plan.sign_extend,
                );
                let b = resolve_src(
                    ctx,
                    plan.src1 + r,
                    2 * j + 1,
                    plan.esize,
                    plan.op_width,
                    plan.sign_extend,
                );
                (a, Some(b))
            }
        };

        per_elem(ctx, &Element { index: i, dst: work_dst, a, b, prev: real_dst.into() });

        if plan.shape == Shape::Narrow {
            if policy.contains(Policy::ROUND) {
                saturate::round_before_narrow(
                    ctx,
                    work_dst,
                    plan.dst_width,
                    policy.contains(Policy::SAT_NARROW),
                    plan.sign_extend,
                );
            }
            if policy.contains(Policy::NARROW_HI) {
                ctx.binary(
                    crate::ir::op::BinaryOp::Shr,
                    work_dst,
                    work_dst,
                    Operand::imm(plan.dst_width.bits() as u64),
                    FlagMask::empty(),
                );
            }
            if policy.contains(Policy::SAT_NARROW) {
                saturate::narrow_with_saturation(
                    ctx,
                    work_dst,
                    routed_dst,
                    plan.sign_extend,
                    policy.contains(Policy::UNSIGNED),
                );
            } else {
                ctx.mov(routed_dst, work_dst);
            }
        }
    }
    ctx.temps.restore(mark);

    // Aggregate copy-back: the real destination sees its new value only
    // after every iteration has read its sources.
    if let Some(s) = &scratch {
        for i in 0..plan.count {
            let r = (i / plan.per_reg) as u8;
            let j = (i % plan.per_reg) as u8;
            let lane = Loc::vec(plan.dst + r, j, plan.dst_width);
            ctx.mov(lane, s.view(i as u32 * plan.dst_width.bytes(), plan.dst_width));
        }
    }

    if let Some(width) = scalar_temp {
        ctx.temps.free(width);
    }
    if let Some(s) = scratch {
        ctx.temps.free(s.width());
    }
}
