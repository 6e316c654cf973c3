use std::fmt;

use bitflags::bitflags;

use crate::ir::types::Width;

/// Guest core register (R0-R15). R13 = SP, R14 = LR, R15 = PC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Reg {
    R0 = 0, R1, R2, R3, R4, R5, R6, R7,
    R8, R9, R10, R11, R12, R13, R14, R15,
}

impl Reg {
    pub const SP: Reg = Reg::R13;
    pub const LR: Reg = Reg::R14;
    pub const PC: Reg = Reg::R15;

    pub fn number(self) -> usize {
        self as usize
    }

    pub fn from_u8(val: u8) -> Reg {
        assert!(val < 16, "invalid core register index {}", val);
        // Contiguous discriminants 0..=15.
        unsafe { std::mem::transmute(val) }
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Reg::R13 => write!(f, "sp"),
            Reg::R14 => write!(f, "lr"),
            Reg::R15 => write!(f, "pc"),
            r => write!(f, "r{}", r as u8),
        }
    }
}

/// Named 1-bit flag locations in the backend.
///
/// `N`/`Z`/`C`/`V` are the primitive status flags and `Q` the sticky
/// cumulative-saturation flag. `SLt`/`SLe`/`UHi` are the compound flags the
/// condition engine synthesizes lazily (signed-less-than, signed-less-or-
/// equal, unsigned-higher). `Tst` is a non-architected scratch predicate
/// written by compares so internal range checks never disturb guest flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Flag {
    N = 0,
    Z = 1,
    C = 2,
    V = 3,
    Q = 4,
    SLt = 5,
    SLe = 6,
    UHi = 7,
    Tst = 8,
}

impl Flag {
    pub const COUNT: usize = 9;

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Flag::N => "n",
            Flag::Z => "z",
            Flag::C => "c",
            Flag::V => "v",
            Flag::Q => "q",
            Flag::SLt => "slt",
            Flag::SLe => "sle",
            Flag::UHi => "uhi",
            Flag::Tst => "tst",
        };
        write!(f, "{}", s)
    }
}

bitflags! {
    /// Set of architected flags an operation reads or writes.
    /// Used for descriptor condition-code masks and emission flag requests.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FlagMask: u8 {
        const N = 1 << 0;
        const Z = 1 << 1;
        const C = 1 << 2;
        const V = 1 << 3;
        /// Sticky saturation. Written by OR-accumulation, never cleared
        /// by an emission request.
        const Q = 1 << 4;
    }
}

impl FlagMask {
    pub const NZCV: FlagMask = FlagMask::N.union(FlagMask::Z).union(FlagMask::C).union(FlagMask::V);
    pub const NZ: FlagMask = FlagMask::N.union(FlagMask::Z);
}

/// A backend label, allocated by the sink and bound by `emit_label`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// An operand location the backend can read or write.
///
/// Vector registers are 128-bit; `Vec` addresses one `width`-wide lane of
/// one register. `Temp` addresses a byte-offset view into the translation's
/// scratch pool (slots are 32-bit, so byte address = `slot * 4 + offset`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Loc {
    Core(Reg),
    Vec { reg: u8, lane: u8, width: Width },
    Temp { slot: u16, offset: u16, width: Width },
    Flag(Flag),
}

impl Loc {
    /// Build a vector-lane location, checking the lane fits the register.
    pub fn vec(reg: u8, lane: u8, width: Width) -> Loc {
        assert!(reg < 16, "invalid vector register index {}", reg);
        assert!(
            (lane as u32 + 1) * width.bytes() <= 16,
            "lane {} of width {} exceeds a 128-bit register",
            lane,
            width
        );
        Loc::Vec { reg, lane, width }
    }

    /// Width of the value stored at this location. Flags are 1-bit but
    /// reported as `W32` for arithmetic purposes (they hold 0 or 1).
    pub fn width(self) -> Width {
        match self {
            Loc::Core(_) => Width::W32,
            Loc::Vec { width, .. } => width,
            Loc::Temp { width, .. } => width,
            Loc::Flag(_) => Width::W32,
        }
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Loc::Core(r) => write!(f, "{}", r),
            Loc::Vec { reg, lane, width } => write!(f, "q{}[{}]:{}", reg, lane, width),
            Loc::Temp { slot, offset, width } => {
                if *offset == 0 {
                    write!(f, "t{}:{}", slot, width)
                } else {
                    write!(f, "t{}+{}:{}", slot, offset, width)
                }
            }
            Loc::Flag(flag) => write!(f, "${}", flag),
        }
    }
}

/// An emission-request operand: a location or a translation-time constant.
///
/// Constants are the only values the morphing engine may compute itself;
/// everything else exists at guest run time only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Loc(Loc),
    Imm(u64),
}

impl Operand {
    pub fn imm(value: u64) -> Operand {
        Operand::Imm(value)
    }

    pub fn is_imm(&self) -> bool {
        matches!(self, Operand::Imm(_))
    }
}

impl From<Loc> for Operand {
    fn from(loc: Loc) -> Operand {
        Operand::Loc(loc)
    }
}

impl From<Reg> for Operand {
    fn from(reg: Reg) -> Operand {
        Operand::Loc(Loc::Core(reg))
    }
}

impl From<u64> for Operand {
    fn from(value: u64) -> Operand {
        Operand::Imm(value)
    }
}

impl From<u32> for Operand {
    fn from(value: u32) -> Operand {
        Operand::Imm(value as u64)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Loc(loc) => write!(f, "{}", loc),
            Operand::Imm(value) => write!(f, "#{:#x}", value),
        }
    }
}
