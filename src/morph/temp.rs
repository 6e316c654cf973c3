use crate::ir::types::Width;
use crate::ir::value::Loc;

/// Number of 32-bit slots in the per-translation scratch pool.
pub const POOL_SLOTS: u16 = 64;

/// A live allocation in the scratch pool.
///
/// Handles are plain views: dropping one does not free the storage; the
/// allocator's stack discipline does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempHandle {
    base: u16,
    width: Width,
}

impl TempHandle {
    pub fn width(self) -> Width {
        self.width
    }

    /// The whole allocation as one location.
    pub fn loc(self) -> Loc {
        Loc::Temp { slot: self.base, offset: 0, width: self.width }
    }

    /// A `width`-wide view at `byte_offset` into the allocation.
    pub fn view(self, byte_offset: u32, width: Width) -> Loc {
        assert!(
            byte_offset + width.bytes() <= self.width.bytes(),
            "view of {} bytes at +{} exceeds a {} temporary",
            width.bytes(),
            byte_offset,
            self.width
        );
        Loc::Temp { slot: self.base, offset: byte_offset as u16, width }
    }
}

/// Snapshot of the allocator state, for O(1) rollback of loop bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempMark {
    next: u16,
    depth: usize,
}

/// Stack-discipline allocator over a fixed pool of 32-bit scratch slots.
///
/// 64/128/256-bit requests take 2/4/8 consecutive slots. Frees must occur
/// in reverse allocation order; violations and exhaustion are fatal —
/// they indicate a static nesting bug in an emission routine, never a
/// property of the guest program.
#[derive(Debug, Clone)]
pub struct TempAllocator {
    stack: Vec<(u16, Width)>,
    next: u16,
    high_water: u16,
}

impl TempAllocator {
    pub fn new() -> TempAllocator {
        TempAllocator { stack: Vec::new(), next: 0, high_water: 0 }
    }

    pub fn alloc(&mut self, width: Width) -> TempHandle {
        assert!(width.is_pool_width(), "cannot allocate a {} temporary", width);
        let slots = (width.bytes() / 4) as u16;
        assert!(
            self.next + slots <= POOL_SLOTS,
            "scratch pool exhausted allocating {} ({} slots live)",
            width,
            self.next
        );
        let handle = TempHandle { base: self.next, width };
        self.stack.push((self.next, width));
        self.next += slots;
        self.high_water = self.high_water.max(self.next);
        handle
    }

    pub fn free(&mut self, width: Width) {
        let (base, top_width) = self
            .stack
            .pop()
            .unwrap_or_else(|| panic!("free({}) with no live allocation", width));
        assert_eq!(
            top_width, width,
            "free({}) out of order: top of stack is a {} at slot {}",
            width, top_width, base
        );
        self.next = base;
    }

    pub fn mark(&self) -> TempMark {
        TempMark { next: self.next, depth: self.stack.len() }
    }

    /// Roll back to `mark`, releasing everything allocated since. Restoring
    /// across a mark taken after frees (a non-LIFO pattern) is fatal.
    pub fn restore(&mut self, mark: TempMark) {
        assert!(
            mark.depth <= self.stack.len() && mark.next <= self.next,
            "restore to a mark newer than the current cursor"
        );
        self.stack.truncate(mark.depth);
        self.next = mark.next;
    }

    /// Current cursor, in slots. Zero means no live allocations.
    pub fn cursor(&self) -> u16 {
        self.next
    }

    /// Deepest cursor seen since construction, in slots.
    pub fn high_water(&self) -> u16 {
        self.high_water
    }
}

impl Default for TempAllocator {
    fn default() -> TempAllocator {
        TempAllocator::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_alloc_free_balance() {
        let mut temps = TempAllocator::new();
        let a = temps.alloc(Width::W32);
        let b = temps.alloc(Width::D64);
        assert_eq!(temps.cursor(), 3);
        assert_ne!(a.loc(), b.loc());
        temps.free(Width::D64);
        temps.free(Width::W32);
        assert_eq!(temps.cursor(), 0);
        assert_eq!(temps.high_water(), 3);
    }

    #[test]
    #[should_panic(expected = "out of order")]
    fn test_lifo_violation() {
        let mut temps = TempAllocator::new();
        temps.alloc(Width::W32);
        temps.alloc(Width::D64);
        temps.free(Width::W32);
    }

    #[test]
    #[should_panic(expected = "exhausted")]
    fn test_exhaustion() {
        let mut temps = TempAllocator::new();
        for _ in 0..9 {
            temps.alloc(Width::O256);
        }
    }

    #[test]
    fn test_mark_restore_loop_pattern() {
        let mut temps = TempAllocator::new();
        let outer = temps.alloc(Width::Q128);
        let mark = temps.mark();
        for _ in 0..100 {
            temps.alloc(Width::W32);
            temps.alloc(Width::D64);
            temps.restore(mark);
        }
        assert_eq!(temps.cursor(), 4);
        let _ = outer;
        temps.free(Width::Q128);
        assert_eq!(temps.cursor(), 0);
        assert_eq!(temps.high_water(), 4 + 3);
    }

    #[test]
    fn test_view_bounds() {
        let mut temps = TempAllocator::new();
        let t = temps.alloc(Width::Q128);
        let lane = t.view(12, Width::W32);
        assert_eq!(lane.width(), Width::W32);
        temps.free(Width::Q128);
    }

    #[test]
    #[should_panic(expected = "exceeds")]
    fn test_view_out_of_bounds() {
        let mut temps = TempAllocator::new();
        let t = temps.alloc(Width::W32);
        t.view(4, Width::W32);
    }

    proptest! {
        /// Any sequence of pushes followed by matching pops in reverse
        /// order returns the cursor to zero, regardless of widths.
        #[test]
        fn prop_balanced_sequences_net_zero(widths in prop::collection::vec(0..3usize, 0..12)) {
            let table = [Width::W32, Width::D64, Width::Q128];
            let mut temps = TempAllocator::new();
            let mut picked = Vec::new();
            for &i in &widths {
                // Stay inside the pool: 12 * 4 slots < 64.
                picked.push(table[i]);
                temps.alloc(table[i]);
            }
            for &w in picked.iter().rev() {
                temps.free(w);
            }
            prop_assert_eq!(temps.cursor(), 0);
        }
    }
}
