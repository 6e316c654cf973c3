//! The descriptor table: composable builders, a verification pass, and the
//! process-wide read-only instance.
//!
//! Building the table is data construction, not logic: each family of
//! adjacent slots is populated by one builder call from a handful of
//! arguments. Populating a slot twice panics at build time; width/shape
//! combinations the element iteration engine cannot honor are caught by
//! [`TableBuilder::finish`] before the table is ever used.

use std::sync::LazyLock;

use log::debug;
use thiserror::Error;

use crate::config::{ArchVersion, Features};
use crate::ir::op::{BinaryOp, OpSelector, UnaryOp};
use crate::ir::types::Width;
use crate::ir::value::FlagMask;
use crate::morph::class::{InstClass, NUM_INST_CLASSES};
use crate::morph::descriptor::{EmitFn, InstructionDescriptor, OperandRole, Policy, Shape};
use crate::morph::emit::{
    branch, data_processing, divide, exception, extension, load_store, misc, multiply, reversal,
    saturated, status_register, vector, vfp,
};

/// Violations detected by the verification pass. These are authoring
/// errors in the table data; the process-wide constructor treats any of
/// them as fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("no descriptor populated for {0}")]
    Unpopulated(InstClass),
    #[error("descriptor for {class}: {reason}")]
    Precondition { class: InstClass, reason: &'static str },
}

/// The immutable table, indexed by instruction-class id. Safe to share
/// across concurrently translating threads.
pub struct Table {
    slots: Vec<InstructionDescriptor>,
}

impl Table {
    pub fn lookup(&self, class: InstClass) -> &InstructionDescriptor {
        &self.slots[class.index()]
    }

    pub fn implemented_count(&self) -> usize {
        self.slots.iter().filter(|d| d.is_implemented()).count()
    }
}

/// Accumulates descriptors slot by slot. Builders are pure data
/// transformations; composing two builders over the same slot is a
/// build-time error, not a silent overwrite.
pub struct TableBuilder {
    slots: Vec<Option<InstructionDescriptor>>,
}

// Descriptor templates the family builders specialize.

fn scalar(emit: EmitFn) -> InstructionDescriptor {
    InstructionDescriptor { emit: Some(emit), ..InstructionDescriptor::UNIMPLEMENTED }
}

fn simd(op: OpSelector, shape: Shape, role: OperandRole, policy: Policy) -> InstructionDescriptor {
    let saturating = matches!(op, OpSelector::Binary(b) if b.is_saturating())
        || policy.contains(Policy::SAT_NARROW);
    InstructionDescriptor {
        emit: Some(vector::emit_vector as EmitFn),
        op,
        shape,
        role,
        policy,
        cc_write: if saturating { FlagMask::Q } else { FlagMask::empty() },
        min_version: ArchVersion::V7,
        feature: Some(Features::SIMD),
        ..InstructionDescriptor::UNIMPLEMENTED
    }
}

fn fp(op: OpSelector, esize: Width) -> InstructionDescriptor {
    InstructionDescriptor {
        emit: Some(vfp::emit_fp as EmitFn),
        op,
        esize,
        cc_write: if matches!(op, OpSelector::Binary(BinaryOp::FCmp)) {
            FlagMask::NZCV
        } else {
            FlagMask::empty()
        },
        min_version: ArchVersion::V5Te,
        feature: Some(if esize == Width::D64 { Features::VFP3 } else { Features::VFP2 }),
        ..InstructionDescriptor::UNIMPLEMENTED
    }
}

impl TableBuilder {
    pub fn new() -> TableBuilder {
        TableBuilder { slots: vec![None; NUM_INST_CLASSES] }
    }

    /// Populate one slot. Panics if a previous builder already claimed it.
    pub fn set(&mut self, class: InstClass, desc: InstructionDescriptor) {
        let slot = &mut self.slots[class.index()];
        assert!(slot.is_none(), "descriptor slot {} populated twice", class);
        *slot = Some(desc);
    }

    fn set_index(&mut self, index: usize, desc: InstructionDescriptor) {
        self.set(InstClass::from_index(index), desc);
    }

    /// Data-processing opcode: populate its immediate, register-shift and
    /// register-shifted-register slots, which are table-adjacent.
    fn dp(&mut self, base: InstClass, op: OpSelector, policy: Policy) {
        let cc_read = match op {
            OpSelector::Binary(BinaryOp::Adc | BinaryOp::Sbc | BinaryOp::Rsc) => FlagMask::C,
            _ => FlagMask::empty(),
        };
        let modes: [EmitFn; 3] =
            [data_processing::emit_imm, data_processing::emit_reg, data_processing::emit_rsr];
        for (i, &emit) in modes.iter().enumerate() {
            self.set_index(
                base.index() + i,
                InstructionDescriptor {
                    emit: Some(emit),
                    op,
                    policy,
                    cc_read,
                    cc_write: FlagMask::NZCV,
                    ..InstructionDescriptor::UNIMPLEMENTED
                },
            );
        }
    }

    /// Vector family: one slot per element width, adjacent from `base`.
    fn vec(&mut self, base: InstClass, widths: &[Width], template: InstructionDescriptor) {
        for (i, &esize) in widths.iter().enumerate() {
            self.set_index(base.index() + i, InstructionDescriptor { esize, ..template });
        }
    }

    /// Verify preconditions and completeness, then freeze.
    pub fn finish(self) -> Result<Table, TableError> {
        self.finish_inner(true)
    }

    /// Freeze without requiring every slot to be populated; unpopulated
    /// slots hold the unimplemented sentinel. Tests use this to exercise
    /// the dispatcher's reserved-class path.
    pub fn finish_partial(self) -> Result<Table, TableError> {
        self.finish_inner(false)
    }

    fn finish_inner(self, complete: bool) -> Result<Table, TableError> {
        let mut slots = Vec::with_capacity(NUM_INST_CLASSES);
        for (index, slot) in self.slots.into_iter().enumerate() {
            let class = InstClass::from_index(index);
            match slot {
                Some(desc) => {
                    verify(class, &desc)?;
                    slots.push(desc);
                }
                None if complete => return Err(TableError::Unpopulated(class)),
                None => slots.push(InstructionDescriptor::UNIMPLEMENTED),
            }
        }
        Ok(Table { slots })
    }
}

impl Default for TableBuilder {
    fn default() -> TableBuilder {
        TableBuilder::new()
    }
}

/// Per-descriptor precondition checks against the element iteration
/// engine's contract.
fn verify(class: InstClass, desc: &InstructionDescriptor) -> Result<(), TableError> {
    let fail = |reason| Err(TableError::Precondition { class, reason });
    if desc.group < 1 {
        return fail("register-group count must be at least 1");
    }
    if desc.group as u32 * 16 > 32 {
        return fail("destination group exceeds the maximum scratch temporary");
    }
    match desc.shape {
        Shape::Widen | Shape::WideMixed | Shape::Pairwise | Shape::PairwiseWiden => {
            if desc.esize > Width::W32 {
                return fail("element width too wide for a widening or pairwise shape");
            }
        }
        Shape::Narrow => {
            if desc.esize < Width::H16 {
                return fail("element width too narrow for a narrowing shape");
            }
        }
        Shape::Same => {}
    }
    let narrow_only = Policy::ROUND | Policy::SAT_NARROW | Policy::NARROW_HI;
    if desc.policy.intersects(narrow_only) && desc.shape != Shape::Narrow {
        return fail("narrowing policy flags require the narrowing shape");
    }
    if desc.policy.contains(Policy::SAT_NARROW)
        && !desc.policy.intersects(Policy::SIGN_EXTEND | Policy::UNSIGNED)
    {
        return fail("saturating narrow needs a source or result signedness");
    }
    if desc.role == OperandRole::Scalar
        && !matches!(desc.shape, Shape::Same | Shape::Widen | Shape::WideMixed)
    {
        return fail("scalar operand role is meaningless for this shape");
    }
    if desc.elems as u32 * desc.dst_width().bytes() > 16 {
        return fail("element-count override overflows a 128-bit register");
    }
    Ok(())
}

/// Compose every family builder into the full table.
fn build() -> Result<Table, TableError> {
    use InstClass::*;
    use OperandRole::{None as RoleNone, PerElement, Scalar as RoleScalar};
    use Shape::*;

    let bhw = [Width::B8, Width::H16, Width::W32];
    let bhwd = [Width::B8, Width::H16, Width::W32, Width::D64];
    let hwd = [Width::H16, Width::W32, Width::D64];

    let mut t = TableBuilder::new();

    // --- Integer data processing ---
    t.dp(AndImm, OpSelector::Binary(BinaryOp::And), Policy::empty());
    t.dp(EorImm, OpSelector::Binary(BinaryOp::Eor), Policy::empty());
    t.dp(SubImm, OpSelector::Binary(BinaryOp::Sub), Policy::empty());
    t.dp(RsbImm, OpSelector::Binary(BinaryOp::Rsb), Policy::empty());
    t.dp(AddImm, OpSelector::Binary(BinaryOp::Add), Policy::empty());
    t.dp(AdcImm, OpSelector::Binary(BinaryOp::Adc), Policy::empty());
    t.dp(SbcImm, OpSelector::Binary(BinaryOp::Sbc), Policy::empty());
    t.dp(RscImm, OpSelector::Binary(BinaryOp::Rsc), Policy::empty());
    t.dp(TstImm, OpSelector::Binary(BinaryOp::And), Policy::TEST_ONLY);
    t.dp(TeqImm, OpSelector::Binary(BinaryOp::Eor), Policy::TEST_ONLY);
    t.dp(CmpImm, OpSelector::Binary(BinaryOp::Sub), Policy::TEST_ONLY);
    t.dp(CmnImm, OpSelector::Binary(BinaryOp::Add), Policy::TEST_ONLY);
    t.dp(OrrImm, OpSelector::Binary(BinaryOp::Orr), Policy::empty());
    t.dp(MovImm, OpSelector::None, Policy::empty());
    t.dp(BicImm, OpSelector::Binary(BinaryOp::Bic), Policy::empty());
    t.dp(MvnImm, OpSelector::Unary(UnaryOp::Not), Policy::empty());

    t.set(Movw, InstructionDescriptor {
        min_version: ArchVersion::V6T2,
        ..scalar(misc::emit_movw)
    });
    t.set(Movt, InstructionDescriptor {
        min_version: ArchVersion::V6T2,
        ..scalar(misc::emit_movt)
    });

    // --- Miscellaneous scalar ---
    t.set(Clz, InstructionDescriptor {
        op: OpSelector::Unary(UnaryOp::Clz),
        min_version: ArchVersion::V5Te,
        ..scalar(reversal::emit_unary_word)
    });
    t.set(Rbit, InstructionDescriptor {
        op: OpSelector::Unary(UnaryOp::Rbit),
        min_version: ArchVersion::V6T2,
        ..scalar(reversal::emit_unary_word)
    });
    t.set(Rev, InstructionDescriptor {
        op: OpSelector::Unary(UnaryOp::Rev),
        min_version: ArchVersion::V6,
        ..scalar(reversal::emit_unary_word)
    });
    t.set(Rev16, InstructionDescriptor {
        op: OpSelector::Unary(UnaryOp::Rev16),
        min_version: ArchVersion::V6,
        ..scalar(reversal::emit_unary_word)
    });
    t.set(Revsh, InstructionDescriptor {
        min_version: ArchVersion::V6,
        ..scalar(reversal::emit_revsh)
    });

    for (class, esize, policy) in [
        (Sxtb, Width::B8, Policy::SIGN_EXTEND),
        (Sxth, Width::H16, Policy::SIGN_EXTEND),
        (Uxtb, Width::B8, Policy::empty()),
        (Uxth, Width::H16, Policy::empty()),
        (Sxtab, Width::B8, Policy::SIGN_EXTEND.union(Policy::ACCUMULATE)),
        (Sxtah, Width::H16, Policy::SIGN_EXTEND.union(Policy::ACCUMULATE)),
        (Uxtab, Width::B8, Policy::ACCUMULATE),
        (Uxtah, Width::H16, Policy::ACCUMULATE),
    ] {
        t.set(class, InstructionDescriptor {
            esize,
            policy,
            min_version: ArchVersion::V6,
            ..scalar(extension::emit_extend)
        });
    }

    t.set(Bfc, InstructionDescriptor {
        min_version: ArchVersion::V6T2,
        ..scalar(misc::emit_bfc)
    });
    t.set(Bfi, InstructionDescriptor {
        min_version: ArchVersion::V6T2,
        ..scalar(misc::emit_bfi)
    });
    t.set(Sbfx, InstructionDescriptor {
        min_version: ArchVersion::V6T2,
        ..scalar(misc::emit_bfx)
    });
    t.set(Ubfx, InstructionDescriptor {
        policy: Policy::UNSIGNED,
        min_version: ArchVersion::V6T2,
        ..scalar(misc::emit_bfx)
    });

    // --- Multiply and divide ---
    t.set(Mul, InstructionDescriptor {
        op: OpSelector::Binary(BinaryOp::Mul),
        cc_write: FlagMask::NZ,
        ..scalar(multiply::emit_mul)
    });
    t.set(Mla, InstructionDescriptor {
        op: OpSelector::Binary(BinaryOp::Mul),
        acc_op: OpSelector::Binary(BinaryOp::Add),
        policy: Policy::ACCUMULATE,
        cc_write: FlagMask::NZ,
        ..scalar(multiply::emit_mul)
    });
    t.set(Mls, InstructionDescriptor {
        op: OpSelector::Binary(BinaryOp::Mul),
        acc_op: OpSelector::Binary(BinaryOp::Sub),
        policy: Policy::ACCUMULATE,
        min_version: ArchVersion::V6T2,
        ..scalar(multiply::emit_mul)
    });
    for (class, policy) in [
        (Umull, Policy::empty()),
        (Umlal, Policy::ACCUMULATE),
        (Smull, Policy::SIGN_EXTEND),
        (Smlal, Policy::SIGN_EXTEND.union(Policy::ACCUMULATE)),
    ] {
        t.set(class, InstructionDescriptor {
            op: OpSelector::Binary(BinaryOp::Mul),
            policy,
            cc_write: FlagMask::NZ,
            ..scalar(multiply::emit_mul_long)
        });
    }
    t.set(Sdiv, InstructionDescriptor {
        op: OpSelector::Binary(BinaryOp::DivS),
        min_version: ArchVersion::V7,
        feature: Some(Features::IDIV),
        ..scalar(divide::emit_div)
    });
    t.set(Udiv, InstructionDescriptor {
        op: OpSelector::Binary(BinaryOp::DivU),
        min_version: ArchVersion::V7,
        feature: Some(Features::IDIV),
        ..scalar(divide::emit_div)
    });

    // --- DSP halfword multiplies ---
    for (class, policy) in [
        (Smulbb, Policy::empty()),
        (Smulbt, Policy::HALF_HI_B),
        (Smultb, Policy::HALF_HI_A),
        (Smultt, Policy::HALF_HI_A.union(Policy::HALF_HI_B)),
    ] {
        t.set(class, InstructionDescriptor {
            op: OpSelector::Binary(BinaryOp::Mul),
            policy,
            min_version: ArchVersion::V5Te,
            ..scalar(multiply::emit_mul_half)
        });
    }
    t.set(Smulwb, InstructionDescriptor {
        op: OpSelector::Binary(BinaryOp::Mul),
        min_version: ArchVersion::V5Te,
        ..scalar(multiply::emit_mul_word_half)
    });
    t.set(Smulwt, InstructionDescriptor {
        op: OpSelector::Binary(BinaryOp::Mul),
        policy: Policy::HALF_HI_B,
        min_version: ArchVersion::V5Te,
        ..scalar(multiply::emit_mul_word_half)
    });
    for (class, policy) in [
        (Smuad, Policy::empty()),
        (SmuadX, Policy::EXCHANGE),
        (Smusd, Policy::DUAL_SUB),
        (SmusdX, Policy::DUAL_SUB.union(Policy::EXCHANGE)),
    ] {
        t.set(class, InstructionDescriptor {
            op: OpSelector::Binary(BinaryOp::Mul),
            policy,
            cc_write: FlagMask::Q,
            min_version: ArchVersion::V6,
            ..scalar(multiply::emit_mul_dual)
        });
    }

    // --- Scalar saturating arithmetic ---
    for (class, op, policy) in [
        (Qadd, BinaryOp::SatAddS, Policy::empty()),
        (Qsub, BinaryOp::SatSubS, Policy::empty()),
        (Qdadd, BinaryOp::SatAddS, Policy::DOUBLING),
        (Qdsub, BinaryOp::SatSubS, Policy::DOUBLING),
    ] {
        t.set(class, InstructionDescriptor {
            op: OpSelector::Binary(op),
            policy,
            cc_write: FlagMask::Q,
            min_version: ArchVersion::V5Te,
            ..scalar(saturated::emit_qarith)
        });
    }
    t.set(Ssat, InstructionDescriptor {
        cc_write: FlagMask::Q,
        min_version: ArchVersion::V6,
        ..scalar(saturated::emit_sat)
    });
    t.set(Usat, InstructionDescriptor {
        policy: Policy::UNSIGNED,
        cc_write: FlagMask::Q,
        min_version: ArchVersion::V6,
        ..scalar(saturated::emit_sat)
    });

    // --- Loads and stores ---
    for (class, emit, esize, policy) in [
        (LdrImm, load_store::emit_imm as EmitFn, Width::W32, Policy::empty()),
        (LdrReg, load_store::emit_reg as EmitFn, Width::W32, Policy::empty()),
        (StrImm, load_store::emit_imm as EmitFn, Width::W32, Policy::STORE),
        (StrReg, load_store::emit_reg as EmitFn, Width::W32, Policy::STORE),
        (LdrbImm, load_store::emit_imm as EmitFn, Width::B8, Policy::empty()),
        (LdrbReg, load_store::emit_reg as EmitFn, Width::B8, Policy::empty()),
        (StrbImm, load_store::emit_imm as EmitFn, Width::B8, Policy::STORE),
        (StrbReg, load_store::emit_reg as EmitFn, Width::B8, Policy::STORE),
        (LdrhImm, load_store::emit_imm as EmitFn, Width::H16, Policy::empty()),
        (LdrhReg, load_store::emit_reg as EmitFn, Width::H16, Policy::empty()),
        (StrhImm, load_store::emit_imm as EmitFn, Width::H16, Policy::STORE),
        (StrhReg, load_store::emit_reg as EmitFn, Width::H16, Policy::STORE),
    ] {
        t.set(class, InstructionDescriptor { esize, policy, ..scalar(emit) });
    }
    t.set(Vld1, InstructionDescriptor {
        min_version: ArchVersion::V7,
        feature: Some(Features::SIMD),
        ..scalar(load_store::emit_vector_transfer)
    });
    t.set(Vst1, InstructionDescriptor {
        policy: Policy::STORE,
        min_version: ArchVersion::V7,
        feature: Some(Features::SIMD),
        ..scalar(load_store::emit_vector_transfer)
    });

    // --- Branches ---
    t.set(B, InstructionDescriptor { policy: Policy::BRANCH, ..scalar(branch::emit_branch) });
    t.set(Bl, InstructionDescriptor { policy: Policy::LINK, ..scalar(branch::emit_branch) });
    t.set(Bx, scalar(branch::emit_branch_exchange));
    t.set(BlxReg, InstructionDescriptor {
        policy: Policy::LINK,
        min_version: ArchVersion::V5Te,
        ..scalar(branch::emit_branch_exchange)
    });

    // --- Status register and system ---
    t.set(Mrs, InstructionDescriptor {
        cc_read: FlagMask::NZCV.union(FlagMask::Q),
        ..scalar(status_register::emit_mrs)
    });
    t.set(MsrImm, InstructionDescriptor {
        cc_write: FlagMask::NZCV.union(FlagMask::Q),
        ..scalar(status_register::emit_msr_imm)
    });
    t.set(MsrReg, InstructionDescriptor {
        cc_write: FlagMask::NZCV.union(FlagMask::Q),
        ..scalar(status_register::emit_msr_reg)
    });
    t.set(Svc, scalar(exception::emit_svc));
    t.set(Bkpt, InstructionDescriptor {
        min_version: ArchVersion::V5Te,
        ..scalar(exception::emit_bkpt)
    });
    t.set(Udf, scalar(exception::emit_udf));
    t.set(It, InstructionDescriptor { min_version: ArchVersion::V6T2, ..scalar(misc::emit_it) });
    t.set(Nop, scalar(misc::emit_nop));

    // --- Vector integer, same width ---
    t.vec(VaddI8, &bhwd, simd(OpSelector::Binary(BinaryOp::Add), Same, PerElement, Policy::empty()));
    t.vec(VsubI8, &bhwd, simd(OpSelector::Binary(BinaryOp::Sub), Same, PerElement, Policy::empty()));
    t.vec(VmulI8, &bhw, simd(OpSelector::Binary(BinaryOp::Mul), Same, PerElement, Policy::empty()));
    t.vec(VmlaI8, &bhw, InstructionDescriptor {
        acc_op: OpSelector::Binary(BinaryOp::Add),
        ..simd(OpSelector::Binary(BinaryOp::Mul), Same, PerElement, Policy::ACCUMULATE)
    });
    t.vec(VmlaScalarH16, &[Width::H16], InstructionDescriptor {
        acc_op: OpSelector::Binary(BinaryOp::Add),
        ..simd(OpSelector::Binary(BinaryOp::Mul), Same, RoleScalar, Policy::ACCUMULATE)
    });
    t.vec(VmlaScalarW32, &[Width::W32], InstructionDescriptor {
        acc_op: OpSelector::Binary(BinaryOp::Add),
        ..simd(OpSelector::Binary(BinaryOp::Mul), Same, RoleScalar, Policy::ACCUMULATE)
    });
    t.vec(VmaxS8, &bhw, simd(OpSelector::Binary(BinaryOp::MaxS), Same, PerElement, Policy::empty()));
    t.vec(VmaxU8, &bhw, simd(OpSelector::Binary(BinaryOp::MaxU), Same, PerElement, Policy::empty()));
    t.vec(VminS8, &bhw, simd(OpSelector::Binary(BinaryOp::MinS), Same, PerElement, Policy::empty()));
    t.vec(VminU8, &bhw, simd(OpSelector::Binary(BinaryOp::MinU), Same, PerElement, Policy::empty()));
    t.vec(VabsI8, &bhw, simd(OpSelector::Unary(UnaryOp::Abs), Same, RoleNone, Policy::empty()));
    t.vec(VnegI8, &bhw, simd(OpSelector::Unary(UnaryOp::Neg), Same, RoleNone, Policy::empty()));
    t.vec(Vmvn, &[Width::D64], simd(OpSelector::Unary(UnaryOp::Not), Same, RoleNone, Policy::empty()));

    // --- Vector integer, widening ---
    t.vec(VaddlS8, &bhw, simd(OpSelector::Binary(BinaryOp::Add), Widen, PerElement, Policy::SIGN_EXTEND));
    t.vec(VaddlU8, &bhw, simd(OpSelector::Binary(BinaryOp::Add), Widen, PerElement, Policy::empty()));
    t.vec(VsublS8, &bhw, simd(OpSelector::Binary(BinaryOp::Sub), Widen, PerElement, Policy::SIGN_EXTEND));
    t.vec(VsublU8, &bhw, simd(OpSelector::Binary(BinaryOp::Sub), Widen, PerElement, Policy::empty()));

    // --- Vector integer, mixed width ---
    t.vec(VaddwS8, &bhw, simd(OpSelector::Binary(BinaryOp::Add), WideMixed, PerElement, Policy::SIGN_EXTEND));
    t.vec(VaddwU8, &bhw, simd(OpSelector::Binary(BinaryOp::Add), WideMixed, PerElement, Policy::empty()));

    // --- Vector integer, narrowing high half ---
    t.vec(VaddhnI16, &hwd, simd(OpSelector::Binary(BinaryOp::Add), Narrow, PerElement, Policy::NARROW_HI));
    t.vec(VraddhnI16, &hwd, simd(
        OpSelector::Binary(BinaryOp::Add),
        Narrow,
        PerElement,
        Policy::NARROW_HI.union(Policy::ROUND),
    ));

    // --- Vector saturating ---
    t.vec(VqaddS8, &bhwd, simd(OpSelector::Binary(BinaryOp::SatAddS), Same, PerElement, Policy::empty()));
    t.vec(VqaddU8, &bhwd, simd(OpSelector::Binary(BinaryOp::SatAddU), Same, PerElement, Policy::empty()));
    t.vec(VqsubS8, &bhwd, simd(OpSelector::Binary(BinaryOp::SatSubS), Same, PerElement, Policy::empty()));
    t.vec(VqsubU8, &bhwd, simd(OpSelector::Binary(BinaryOp::SatSubU), Same, PerElement, Policy::empty()));
    t.vec(VqmovnS16, &hwd, simd(
        OpSelector::Unary(UnaryOp::ZeroExtend),
        Narrow,
        RoleNone,
        Policy::SAT_NARROW.union(Policy::SIGN_EXTEND),
    ));
    t.vec(VqmovnU16, &hwd, simd(
        OpSelector::Unary(UnaryOp::ZeroExtend),
        Narrow,
        RoleNone,
        Policy::SAT_NARROW.union(Policy::UNSIGNED),
    ));
    t.vec(VqmovunS16, &hwd, simd(
        OpSelector::Unary(UnaryOp::ZeroExtend),
        Narrow,
        RoleNone,
        Policy::SAT_NARROW.union(Policy::SIGN_EXTEND).union(Policy::UNSIGNED),
    ));

    // --- Vector pairwise ---
    t.vec(VpaddI8, &bhw, simd(OpSelector::Binary(BinaryOp::Add), Pairwise, PerElement, Policy::empty()));
    t.vec(VpaddlS8, &bhw, simd(OpSelector::Binary(BinaryOp::Add), PairwiseWiden, RoleNone, Policy::SIGN_EXTEND));
    t.vec(VpaddlU8, &bhw, simd(OpSelector::Binary(BinaryOp::Add), PairwiseWiden, RoleNone, Policy::empty()));

    // --- Vector permute ---
    t.vec(Vtrn8, &bhw, InstructionDescriptor {
        emit: Some(vector::emit_vtrn as EmitFn),
        ..simd(OpSelector::None, Same, RoleNone, Policy::empty())
    });

    // --- Vector float ---
    t.vec(VaddF32, &[Width::W32], simd(OpSelector::Binary(BinaryOp::FAdd), Same, PerElement, Policy::empty()));
    t.vec(VsubF32, &[Width::W32], simd(OpSelector::Binary(BinaryOp::FSub), Same, PerElement, Policy::empty()));
    t.vec(VmulF32, &[Width::W32], simd(OpSelector::Binary(BinaryOp::FMul), Same, PerElement, Policy::empty()));

    // --- Scalar floating point ---
    for (f32_class, f64_class, op) in [
        (VfpAddF32, VfpAddF64, OpSelector::Binary(BinaryOp::FAdd)),
        (VfpSubF32, VfpSubF64, OpSelector::Binary(BinaryOp::FSub)),
        (VfpMulF32, VfpMulF64, OpSelector::Binary(BinaryOp::FMul)),
        (VfpDivF32, VfpDivF64, OpSelector::Binary(BinaryOp::FDiv)),
        (VfpAbsF32, VfpAbsF64, OpSelector::Unary(UnaryOp::FAbs)),
        (VfpNegF32, VfpNegF64, OpSelector::Unary(UnaryOp::FNeg)),
        (VfpSqrtF32, VfpSqrtF64, OpSelector::Unary(UnaryOp::FSqrt)),
        (VfpCmpF32, VfpCmpF64, OpSelector::Binary(BinaryOp::FCmp)),
    ] {
        t.set(f32_class, fp(op, Width::W32));
        t.set(f64_class, fp(op, Width::D64));
    }

    t.finish()
}

static TABLE: LazyLock<Table> = LazyLock::new(|| {
    let table = build().expect("descriptor table failed verification");
    debug!("descriptor table built: {} classes", table.implemented_count());
    table
});

/// The process-wide table instance.
pub fn table() -> &'static Table {
    &TABLE
}

/// Look up the descriptor for an instruction class.
pub fn lookup(class: InstClass) -> &'static InstructionDescriptor {
    TABLE.lookup(class)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_class_implemented() {
        assert_eq!(table().implemented_count(), NUM_INST_CLASSES);
    }

    #[test]
    fn test_family_slots_adjacent() {
        // The three addressing modes of one opcode share op and policy.
        let imm = lookup(InstClass::AddImm);
        let reg = lookup(InstClass::AddReg);
        let rsr = lookup(InstClass::AddRsr);
        assert_eq!(imm.op, reg.op);
        assert_eq!(reg.op, rsr.op);
        assert_eq!(imm.policy, rsr.policy);
    }

    #[test]
    fn test_vector_width_progression() {
        assert_eq!(lookup(InstClass::VaddI8).esize, Width::B8);
        assert_eq!(lookup(InstClass::VaddI16).esize, Width::H16);
        assert_eq!(lookup(InstClass::VaddI32).esize, Width::W32);
        assert_eq!(lookup(InstClass::VaddI64).esize, Width::D64);
        assert_eq!(lookup(InstClass::VaddlS16).shape, Shape::Widen);
        assert_eq!(lookup(InstClass::VaddlS16).dst_width(), Width::W32);
    }

    #[test]
    fn test_saturating_classes_write_sticky() {
        assert!(lookup(InstClass::VqaddS32).cc_write.contains(FlagMask::Q));
        assert!(lookup(InstClass::VqmovnU32).cc_write.contains(FlagMask::Q));
        assert!(lookup(InstClass::Qadd).cc_write.contains(FlagMask::Q));
        assert!(!lookup(InstClass::VaddI32).cc_write.contains(FlagMask::Q));
    }

    #[test]
    fn test_gating_metadata() {
        assert_eq!(lookup(InstClass::Sdiv).feature, Some(Features::IDIV));
        assert_eq!(lookup(InstClass::VaddI8).feature, Some(Features::SIMD));
        assert_eq!(lookup(InstClass::VfpAddF64).feature, Some(Features::VFP3));
        assert_eq!(lookup(InstClass::Movw).min_version, ArchVersion::V6T2);
        assert_eq!(lookup(InstClass::Clz).min_version, ArchVersion::V5Te);
    }

    #[test]
    #[should_panic(expected = "populated twice")]
    fn test_double_population_panics() {
        let mut t = TableBuilder::new();
        t.set(InstClass::Nop, scalar(misc::emit_nop));
        t.set(InstClass::Nop, scalar(misc::emit_nop));
    }

    #[test]
    fn test_incomplete_table_rejected() {
        let t = TableBuilder::new();
        assert!(matches!(t.finish(), Err(TableError::Unpopulated(_))));
    }

    #[test]
    fn test_partial_table_keeps_sentinel() {
        let mut t = TableBuilder::new();
        t.set(InstClass::Nop, scalar(misc::emit_nop));
        let table = t.finish_partial().unwrap();
        assert!(table.lookup(InstClass::Nop).is_implemented());
        assert!(!table.lookup(InstClass::AddImm).is_implemented());
    }

    #[test]
    fn test_shape_precondition_rejected() {
        let mut t = TableBuilder::new();
        // A byte-wide narrowing shape cannot halve below 8 bits.
        let mut desc = simd(
            OpSelector::Binary(BinaryOp::Add),
            Shape::Narrow,
            OperandRole::PerElement,
            Policy::NARROW_HI,
        );
        desc.esize = Width::B8;
        t.set(InstClass::VaddhnI16, desc);
        assert!(matches!(
            t.finish_partial(),
            Err(TableError::Precondition { class: InstClass::VaddhnI16, .. })
        ));
    }

    #[test]
    fn test_narrow_policy_requires_narrow_shape() {
        let mut t = TableBuilder::new();
        let desc = simd(
            OpSelector::Binary(BinaryOp::Add),
            Shape::Same,
            OperandRole::PerElement,
            Policy::ROUND,
        );
        t.set(InstClass::VaddI8, desc);
        assert!(t.finish_partial().is_err());
    }

    #[test]
    fn test_table_shared_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| {
                    lookup(InstClass::VaddI32).esize
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Width::W32);
        }
    }
}
