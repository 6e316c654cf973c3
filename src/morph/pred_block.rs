use crate::ir::cond::Cond;

/// Predicated-execution-block state.
///
/// Some guest ISAs chain several following instructions under one condition
/// test (Thumb's IT mechanism). The architected encoding is an 8-bit value:
///   bits [7:5] = base condition, bit [4] joins it for the first slot,
///   bits [3:0] = remaining-slot mask.
/// A zero mask means no block is active. Advancing shifts the mask left;
/// the block ends when the mask empties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PredBlockState(u8);

impl PredBlockState {
    pub fn new() -> PredBlockState {
        PredBlockState(0)
    }

    /// Enter a new block from the opening instruction's immediate.
    pub fn start(&mut self, encoding: u8) {
        self.0 = encoding;
    }

    /// Leave the block unconditionally (taken branch, exception return).
    pub fn reset(&mut self) {
        self.0 = 0;
    }

    pub fn active(self) -> bool {
        self.0 & 0xF != 0
    }

    pub fn is_last(self) -> bool {
        self.0 & 0xF == 0x8
    }

    /// Condition governing the current slot.
    pub fn cond(self) -> Cond {
        Cond::from_u8(self.0 >> 4)
    }

    /// Consume the current slot.
    pub fn advance(&mut self) {
        self.0 = (self.0 & 0xE0) | (self.0 << 1 & 0x1F);
        if self.0 & 0xF == 0 {
            self.0 = 0;
        }
    }
}
