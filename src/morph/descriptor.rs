use bitflags::bitflags;

use crate::config::{ArchVersion, Features};
use crate::ir::op::OpSelector;
use crate::ir::types::Width;
use crate::ir::value::FlagMask;
use crate::morph::context::TranslationContext;

/// Relationship between an operation's element width and the widths of its
/// destination and sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Destination and sources all at the element width.
    Same,
    /// Sources at E, destination at 2E; sources extended before the op.
    Widen,
    /// Destination and first source at 2E, second source at E.
    WideMixed,
    /// Sources at E, destination at E/2.
    Narrow,
    /// Adjacent input pairs feed one output element; the low destination
    /// half comes from the first source, the high half from the second.
    Pairwise,
    /// Adjacent pairs of one source feed one doubled-width output element.
    PairwiseWiden,
}

/// Role of the second source operand in an element iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandRole {
    /// Unary operation: no second source.
    None,
    /// Indexed the same as the destination.
    PerElement,
    /// One fixed indexed element reused for every iteration.
    Scalar,
}

bitflags! {
    /// Per-class policy switches consumed by the engines and the shared
    /// emission routines.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Policy: u16 {
        /// Result accumulates onto the destination's prior value.
        const ACCUMULATE = 1 << 0;
        /// Add half a destination ULP before narrowing.
        const ROUND = 1 << 1;
        /// Clamp to the destination range on the narrowing move, setting
        /// the sticky flag when out of range.
        const SAT_NARROW = 1 << 2;
        /// Result (destination) range is unsigned.
        const UNSIGNED = 1 << 3;
        /// Extend narrower sources with their sign, not with zeros.
        const SIGN_EXTEND = 1 << 4;
        /// Narrowing takes the high half of the wide intermediate.
        const NARROW_HI = 1 << 5;
        /// First operand uses its high halfword (DSP multiplies).
        const HALF_HI_A = 1 << 6;
        /// Second operand uses its high halfword (DSP multiplies).
        const HALF_HI_B = 1 << 7;
        /// Exchange the halves of the second operand (DSP dual multiplies).
        const EXCHANGE = 1 << 8;
        /// Saturating op doubles its second operand first (QDADD/QDSUB).
        const DOUBLING = 1 << 9;
        /// Body is a single control transfer: the dispatcher hands the
        /// predicate to the routine for fusing instead of emitting a skip.
        const BRANCH = 1 << 10;
        /// Computes flags only; the destination register is not written.
        const TEST_ONLY = 1 << 11;
        /// Difference, not sum, in dual-multiply routines.
        const DUAL_SUB = 1 << 12;
        /// Memory transfer moves register to memory, not memory to register.
        const STORE = 1 << 13;
        /// Branch-and-link: the return address is written to LR first.
        const LINK = 1 << 14;
    }
}

/// Emission routine invoked for an instruction class.
pub type EmitFn = fn(&mut TranslationContext<'_>);

/// Immutable per-class attributes, one table slot per instruction class.
#[derive(Debug, Clone, Copy)]
pub struct InstructionDescriptor {
    /// The routine that emits this class's body. `None` marks the
    /// distinguished "unimplemented" sentinel; the dispatcher substitutes
    /// an undefined-instruction trap.
    pub emit: Option<EmitFn>,
    /// Primitive operation the routine applies.
    pub op: OpSelector,
    /// Secondary operation for accumulating forms.
    pub acc_op: OpSelector,
    /// Element width (the source width; shapes derive the rest).
    pub esize: Width,
    /// Register-group count: how many consecutive vector registers one
    /// source operand spans.
    pub group: u8,
    /// Element-count override; zero derives `16 bytes / esize` per register.
    pub elems: u8,
    pub shape: Shape,
    pub role: OperandRole,
    pub policy: Policy,
    /// Flags the emitted body reads.
    pub cc_read: FlagMask,
    /// Flags the emitted body may write.
    pub cc_write: FlagMask,
    pub min_version: ArchVersion,
    /// Optional feature gate checked against the configured variant and the
    /// guest's feature registers.
    pub feature: Option<Features>,
}

impl InstructionDescriptor {
    /// The sentinel occupying every slot no builder populated.
    pub const UNIMPLEMENTED: InstructionDescriptor = InstructionDescriptor {
        emit: None,
        op: OpSelector::None,
        acc_op: OpSelector::None,
        esize: Width::W32,
        group: 1,
        elems: 0,
        shape: Shape::Same,
        role: OperandRole::None,
        policy: Policy::empty(),
        cc_read: FlagMask::empty(),
        cc_write: FlagMask::empty(),
        min_version: ArchVersion::V4T,
        feature: None,
    };

    pub fn is_implemented(&self) -> bool {
        self.emit.is_some()
    }

    /// Destination element width under this descriptor's shape.
    pub fn dst_width(&self) -> Width {
        match self.shape {
            Shape::Same | Shape::Pairwise => self.esize,
            Shape::Widen | Shape::WideMixed | Shape::PairwiseWiden => self.esize.doubled(),
            Shape::Narrow => self.esize.halved(),
        }
    }

    /// Widths of the two source operands under this descriptor's shape.
    pub fn src_widths(&self) -> [Width; 2] {
        match self.shape {
            Shape::Same | Shape::Pairwise | Shape::Widen | Shape::Narrow | Shape::PairwiseWiden => {
                [self.esize, self.esize]
            }
            Shape::WideMixed => [self.esize.doubled(), self.esize],
        }
    }

    /// Width the per-element operation runs at.
    pub fn op_width(&self) -> Width {
        match self.shape {
            Shape::Same | Shape::Pairwise | Shape::Narrow => self.esize,
            Shape::Widen | Shape::WideMixed | Shape::PairwiseWiden => self.esize.doubled(),
        }
    }
}
