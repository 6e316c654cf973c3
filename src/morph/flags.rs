use crate::ir::cond::Cond;
use crate::ir::op::BinaryOp;
use crate::ir::sink::CodeSink;
use crate::ir::value::{Flag, FlagMask, Loc};

/// Translation-time predicate for one instruction.
///
/// `Always` means the body is emitted unconditionally. `Test` names the
/// flag location and sense the emitted code must check at guest run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    Always,
    Test { flag: Flag, sense: bool },
}

impl Predicate {
    pub fn is_always(self) -> bool {
        matches!(self, Predicate::Always)
    }
}

/// Which compound flag a cache slot tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compound {
    /// Signed less-than: N xor V.
    SLt = 0,
    /// Signed less-or-equal: Z or (N xor V).
    SLe = 1,
    /// Unsigned higher: C and not Z.
    UHi = 2,
}

/// The derived-flag cache: three validity bits over the compound flag
/// locations in the backend.
///
/// A compound flag's synthesis sequence is emitted at most once per
/// translation block, lazily on first use; any write to the primitive
/// flags invalidates all three bits.
#[derive(Debug, Clone, Default)]
pub struct FlagCache {
    valid: [bool; 3],
    synth_count: u32,
}

impl FlagCache {
    pub fn new() -> FlagCache {
        FlagCache::default()
    }

    /// Start of a new translation block.
    pub fn reset(&mut self) {
        self.valid = [false; 3];
    }

    /// A primitive flag was (or may have been) written.
    pub fn invalidate(&mut self) {
        self.valid = [false; 3];
    }

    /// Invalidate if `written` touches any primitive flag.
    pub fn note_flag_write(&mut self, written: FlagMask) {
        if written.intersects(FlagMask::NZCV) {
            self.invalidate();
        }
    }

    pub fn is_valid(&self, flag: Flag) -> bool {
        match flag {
            Flag::SLt => self.valid[Compound::SLt as usize],
            Flag::SLe => self.valid[Compound::SLe as usize],
            Flag::UHi => self.valid[Compound::UHi as usize],
            _ => panic!("{} is not a compound flag", flag),
        }
    }

    /// Number of synthesis sequences emitted so far (for tests).
    pub fn synth_count(&self) -> u32 {
        self.synth_count
    }

    /// Map a condition code to the flag test the emitted code must perform,
    /// synthesizing the backing compound flag if it is not currently valid.
    pub fn evaluate(&mut self, cond: Cond, sink: &mut dyn CodeSink) -> Predicate {
        let (flag, sense) = match cond {
            Cond::AL | Cond::NV => return Predicate::Always,
            Cond::EQ => (Flag::Z, true),
            Cond::NE => (Flag::Z, false),
            Cond::CS => (Flag::C, true),
            Cond::CC => (Flag::C, false),
            Cond::MI => (Flag::N, true),
            Cond::PL => (Flag::N, false),
            Cond::VS => (Flag::V, true),
            Cond::VC => (Flag::V, false),
            Cond::HI => {
                self.require(Compound::UHi, sink);
                (Flag::UHi, true)
            }
            Cond::LS => {
                self.require(Compound::UHi, sink);
                (Flag::UHi, false)
            }
            Cond::GE => {
                self.require(Compound::SLt, sink);
                (Flag::SLt, false)
            }
            Cond::LT => {
                self.require(Compound::SLt, sink);
                (Flag::SLt, true)
            }
            Cond::GT => {
                self.require(Compound::SLe, sink);
                (Flag::SLe, false)
            }
            Cond::LE => {
                self.require(Compound::SLe, sink);
                (Flag::SLe, true)
            }
        };
        Predicate::Test { flag, sense }
    }

    fn require(&mut self, which: Compound, sink: &mut dyn CodeSink) {
        if self.valid[which as usize] {
            return;
        }
        match which {
            Compound::SLt => {
                sink.emit_binary(
                    BinaryOp::Eor,
                    Loc::Flag(Flag::SLt),
                    Loc::Flag(Flag::N).into(),
                    Loc::Flag(Flag::V).into(),
                    FlagMask::empty(),
                );
            }
            Compound::SLe => {
                // Built on SLt, which may itself need synthesizing first.
                self.require(Compound::SLt, sink);
                sink.emit_binary(
                    BinaryOp::Orr,
                    Loc::Flag(Flag::SLe),
                    Loc::Flag(Flag::Z).into(),
                    Loc::Flag(Flag::SLt).into(),
                    FlagMask::empty(),
                );
            }
            Compound::UHi => {
                sink.emit_binary(
                    BinaryOp::Bic,
                    Loc::Flag(Flag::UHi),
                    Loc::Flag(Flag::C).into(),
                    Loc::Flag(Flag::Z).into(),
                    FlagMask::empty(),
                );
            }
        }
        self.valid[which as usize] = true;
        self.synth_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::block::Block;
    use crate::ir::interp::Machine;

    /// Run `evaluate` for `cond` under every primitive flag combination and
    /// check the emitted predicate agrees with the architectural truth table.
    #[test]
    fn test_condition_truth_table() {
        for raw in 0..16u8 {
            let cond = Cond::from_u8(raw);
            for bits in 0..16u8 {
                let (n, z, c, v) = (bits & 8 != 0, bits & 4 != 0, bits & 2 != 0, bits & 1 != 0);

                let mut cache = FlagCache::new();
                let mut block = Block::new();
                let predicate = cache.evaluate(cond, &mut block);

                let mut machine = Machine::new();
                machine.set_nzcv(n, z, c, v);
                machine.run(&block); // materialize any compound flags

                let outcome = match predicate {
                    Predicate::Always => true,
                    Predicate::Test { flag, sense } => machine.flag(flag) == sense,
                };
                assert_eq!(
                    outcome,
                    cond.holds(n, z, c, v),
                    "cond {} with N={} Z={} C={} V={}",
                    cond,
                    n,
                    z,
                    c,
                    v
                );
            }
        }
    }

    #[test]
    fn test_synthesis_emitted_once_per_block() {
        let mut cache = FlagCache::new();
        let mut block = Block::new();
        cache.evaluate(Cond::GE, &mut block);
        let after_first = block.len();
        assert_eq!(after_first, 1);
        cache.evaluate(Cond::LT, &mut block);
        cache.evaluate(Cond::GE, &mut block);
        assert_eq!(block.len(), after_first, "re-evaluation must not re-synthesize");
    }

    #[test]
    fn test_sle_reuses_slt() {
        let mut cache = FlagCache::new();
        let mut block = Block::new();
        cache.evaluate(Cond::GT, &mut block);
        // SLt then SLe.
        assert_eq!(block.len(), 2);
        assert!(cache.is_valid(Flag::SLt));
        assert!(cache.is_valid(Flag::SLe));
        // GE is now free.
        cache.evaluate(Cond::GE, &mut block);
        assert_eq!(block.len(), 2);
    }

    #[test]
    fn test_invalidation_on_primitive_write() {
        let mut cache = FlagCache::new();
        let mut block = Block::new();
        cache.evaluate(Cond::HI, &mut block);
        assert!(cache.is_valid(Flag::UHi));
        cache.note_flag_write(FlagMask::NZCV);
        assert!(!cache.is_valid(Flag::UHi));
        assert!(!cache.is_valid(Flag::SLt));
        assert!(!cache.is_valid(Flag::SLe));
        // Q alone is not a primitive flag write.
        cache.evaluate(Cond::HI, &mut block);
        assert!(cache.is_valid(Flag::UHi));
        cache.note_flag_write(FlagMask::Q);
        assert!(cache.is_valid(Flag::UHi));
    }
}
