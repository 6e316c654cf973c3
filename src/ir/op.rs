use std::fmt;

/// Primitive unary operations the backend implements.
///
/// Each operates at the destination's width. The source is read at its own
/// width and zero-extended, except `SignExtend`, which sign-extends from
/// the source width, and `Rrx`, which shifts the carry flag in from the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
    Abs,
    Clz,
    Rbit,
    /// Byte-reverse the whole value.
    Rev,
    /// Byte-reverse each 16-bit half independently.
    Rev16,
    SignExtend,
    ZeroExtend,
    /// Rotate right by one through the carry flag.
    Rrx,
    FAbs,
    FNeg,
    FSqrt,
}

/// Primitive binary operations the backend implements.
///
/// `Adc`/`Sbc`/`Rsc` read the carry flag implicitly. The `Sat*` variants clamp to
/// the destination width's representable range and report overflow by
/// OR-ing into the sticky saturation flag when the emission request names it.
/// The `F*` variants reinterpret both operands as IEEE floats of the
/// operation width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Adc,
    Sub,
    Sbc,
    /// Reverse subtract: `rhs - lhs`.
    Rsb,
    /// Reverse subtract with carry: `rhs - lhs - NOT(C)`.
    Rsc,
    Mul,
    /// High half of the widened signed product.
    MulHiS,
    /// High half of the widened unsigned product.
    MulHiU,
    DivS,
    DivU,
    And,
    Orr,
    Eor,
    /// And-not: `lhs & !rhs`.
    Bic,
    Shl,
    Shr,
    Sar,
    Ror,
    MinS,
    MinU,
    MaxS,
    MaxU,
    SatAddS,
    SatAddU,
    SatSubS,
    SatSubU,
    FAdd,
    FSub,
    FMul,
    FDiv,
    /// IEEE compare; writes N/Z/C/V with the usual less/equal/greater/
    /// unordered encoding when the request names them.
    FCmp,
}

impl BinaryOp {
    /// Does this operation clamp and report into the sticky flag?
    pub fn is_saturating(self) -> bool {
        matches!(
            self,
            BinaryOp::SatAddS | BinaryOp::SatAddU | BinaryOp::SatSubS | BinaryOp::SatSubU
        )
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            BinaryOp::FAdd | BinaryOp::FSub | BinaryOp::FMul | BinaryOp::FDiv | BinaryOp::FCmp
        )
    }
}

/// Relation tested by `emit_compare`. The result is a single boolean written
/// to the scratch predicate flag, leaving guest flags untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpRel {
    Eq,
    Ne,
    LtS,
    LeS,
    GtS,
    GeS,
    LtU,
    LeU,
    GtU,
    GeU,
}

/// Which primitive operation a descriptor selects for its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpSelector {
    None,
    Unary(UnaryOp),
    Binary(BinaryOp),
}

impl OpSelector {
    /// The binary operation, panicking if the descriptor names none.
    /// Emission routines reaching here for a misauthored class is an
    /// internal-consistency failure, not a guest condition.
    pub fn binary(self) -> BinaryOp {
        match self {
            OpSelector::Binary(op) => op,
            other => panic!("descriptor selects {:?} where a binary op is required", other),
        }
    }

    /// The unary operation, with the same failure contract as [`binary`].
    ///
    /// [`binary`]: OpSelector::binary
    pub fn unary(self) -> UnaryOp {
        match self {
            OpSelector::Unary(op) => op,
            other => panic!("descriptor selects {:?} where a unary op is required", other),
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl fmt::Display for CmpRel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
