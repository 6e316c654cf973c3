use std::fmt;

/// Operand and storage widths used throughout the morphing engine.
///
/// Vector elements use `B8`..`D64`; the temporary pool hands out
/// `W32`..`O256` (1, 2, 4 or 8 consecutive 32-bit slots).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum Width {
    B8 = 8,
    H16 = 16,
    W32 = 32,
    D64 = 64,
    Q128 = 128,
    O256 = 256,
}

impl Width {
    pub fn bits(self) -> u32 {
        self as u32
    }

    pub fn bytes(self) -> u32 {
        self.bits() / 8
    }

    /// The doubled width. Panics above `Q128` — a descriptor naming a shape
    /// that would double past the pool maximum is an authoring error.
    pub fn doubled(self) -> Width {
        match self {
            Width::B8 => Width::H16,
            Width::H16 => Width::W32,
            Width::W32 => Width::D64,
            Width::D64 => Width::Q128,
            Width::Q128 => Width::O256,
            Width::O256 => panic!("no width above 256 bits"),
        }
    }

    /// The halved width. Panics below `B8` for the same reason as
    /// [`Width::doubled`].
    pub fn halved(self) -> Width {
        match self {
            Width::B8 => panic!("no width below 8 bits"),
            Width::H16 => Width::B8,
            Width::W32 => Width::H16,
            Width::D64 => Width::W32,
            Width::Q128 => Width::D64,
            Width::O256 => Width::Q128,
        }
    }

    /// Smallest width the temporary pool can allocate that holds `self`.
    pub fn container(self) -> Width {
        match self {
            Width::B8 | Width::H16 | Width::W32 => Width::W32,
            w => w,
        }
    }

    /// Smallest pool width covering `bytes` bytes. Panics past 32 bytes.
    pub fn containing_bytes(bytes: u32) -> Width {
        match bytes {
            0..=4 => Width::W32,
            5..=8 => Width::D64,
            9..=16 => Width::Q128,
            17..=32 => Width::O256,
            _ => panic!("no temporary width covers {} bytes", bytes),
        }
    }

    /// Is this a width the temporary allocator accepts?
    pub fn is_pool_width(self) -> bool {
        matches!(self, Width::W32 | Width::D64 | Width::Q128 | Width::O256)
    }

    /// All-ones value of this width, i.e. the unsigned maximum.
    /// Only meaningful up to `D64`.
    pub fn unsigned_max(self) -> u64 {
        match self {
            Width::D64 => u64::MAX,
            w => (1u64 << w.bits()) - 1,
        }
    }

    /// Signed maximum representable at this width. Only meaningful up to `D64`.
    pub fn signed_max(self) -> i64 {
        (self.unsigned_max() >> 1) as i64
    }

    /// Signed minimum representable at this width. Only meaningful up to `D64`.
    pub fn signed_min(self) -> i64 {
        -self.signed_max() - 1
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.bits())
    }
}
