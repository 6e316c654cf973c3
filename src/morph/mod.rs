//! The morphing engine: descriptor table, translation context, temporary
//! allocator, condition/predication engine, element iteration engine and
//! the dispatcher tying them together.

pub mod class;
pub mod context;
pub mod decoded;
pub mod descriptor;
pub mod element;
pub mod emit;
pub mod flags;
pub mod pred_block;
pub mod saturate;
pub mod table;
pub mod temp;

pub use class::InstClass;
pub use context::TranslationContext;
pub use decoded::{DecodedInstruction, ShiftType};
pub use descriptor::{InstructionDescriptor, OperandRole, Policy, Shape};
pub use flags::{FlagCache, Predicate};
pub use pred_block::PredBlockState;
pub use table::{Table, TableBuilder, TableError};
pub use temp::{TempAllocator, TempHandle, TempMark};

use log::debug;

use crate::config::ProcessorConfig;
use crate::ir::sink::{Callee, CodeSink, JumpTarget, TrapKind};

/// What the caller should do after one instruction has been morphed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphOutcome {
    /// The unit falls through; keep appending instructions.
    Continue,
    /// Every path out of this instruction leaves the unit; start a new
    /// translation block at whatever address execution reaches.
    EndBlock,
}

impl MorphOutcome {
    pub fn ends_block(self) -> bool {
        self == MorphOutcome::EndBlock
    }
}

/// The morph dispatcher: one instance per translation thread.
///
/// Holds no state across instructions except the derived-flag cache and
/// the predicated-execution-block state, both reset at the start of each
/// new translation block. The descriptor table is process-wide and shared.
pub struct Morpher {
    config: ProcessorConfig,
    table: &'static Table,
    temps: TempAllocator,
    flags: FlagCache,
    pred_block: PredBlockState,
}

impl Morpher {
    pub fn new(config: ProcessorConfig) -> Morpher {
        Morpher::with_table(config, table::table())
    }

    /// Use a non-default descriptor table. Tests route partial tables
    /// through here to exercise the reserved-class path.
    pub fn with_table(config: ProcessorConfig, table: &'static Table) -> Morpher {
        Morpher {
            config,
            table,
            temps: TempAllocator::new(),
            flags: FlagCache::new(),
            pred_block: PredBlockState::new(),
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// The three independent gating checks. Any failure substitutes a
    /// trap-raising body for the instruction's own.
    fn gate(&self, desc: &InstructionDescriptor) -> Option<TrapKind> {
        if !desc.is_implemented() {
            return Some(TrapKind::Undefined);
        }
        if self.config.version < desc.min_version {
            return Some(TrapKind::Undefined);
        }
        if let Some(feature) = desc.feature {
            if !self.config.has_feature(feature) {
                return Some(TrapKind::FeatureNotPresent);
            }
            if !self.config.feature_enabled(feature) {
                return Some(TrapKind::FeatureDisabled);
            }
        }
        None
    }

    /// Morph the instruction at `addr`. `first_in_block` marks the start
    /// of a new translation block, resetting the derived-flag cache and
    /// the predicated-execution-block state.
    pub fn morph(
        &mut self,
        inst: &DecodedInstruction,
        addr: u32,
        first_in_block: bool,
        sink: &mut dyn CodeSink,
    ) -> MorphOutcome {
        if first_in_block {
            self.flags.reset();
            self.pred_block.reset();
        }

        // DECODE: descriptor lookup and effective condition.
        let desc = self.table.lookup(inst.class);
        let cond = if self.pred_block.active() && inst.class != InstClass::It {
            self.pred_block.cond()
        } else {
            inst.cond
        };

        // GATE.
        let gate = self.gate(desc);

        // PREDICATE-BEGIN: condition evaluation may synthesize and cache a
        // compound flag before any body code is emitted.
        let pred = self.flags.evaluate(cond, &mut *sink);

        let cursor_before = self.temps.cursor();
        let mut ctx = TranslationContext::new(
            inst,
            desc,
            &mut self.temps,
            &mut self.flags,
            &mut *sink,
            addr,
            pred,
        );

        // EMIT-BODY, or the substituted trap body.
        match gate {
            Some(kind) => {
                debug!("gating rejected {} at {:#x}: {:?}", inst.class, addr, kind);
                ctx.begin_skip();
                emit::exception::emit_trap(&mut ctx, kind);
            }
            None => {
                ctx.begin_predicated();
                let emit = desc.emit.expect("gate admits only implemented descriptors");
                emit(&mut ctx);
                if ctx.reload_status {
                    ctx.call(Callee::ReloadStatus, &[], None);
                    ctx.flags.invalidate();
                }
            }
        }
        if inst.set_flags {
            // Table-driven backstop for routines emitting through the raw
            // sink: any flag-writing class invalidates the compound cache.
            ctx.flags.note_flag_write(desc.cc_write);
        }

        let ends_unit = ctx.terminated || ctx.switches_iset;
        let skipped = ctx.is_skipped();
        let switches = ctx.switches_iset;
        let next_addr = ctx.next_addr;
        ctx.end_predicated();

        // A predicated body that leaves the unit still needs the not-taken
        // path to reach the next instruction.
        if ends_unit && skipped {
            sink.emit_jump(JumpTarget::Addr(next_addr));
        }
        if switches {
            sink.terminate_unit();
        }

        assert_eq!(
            self.temps.cursor(),
            cursor_before,
            "emission routine for {} leaked temporaries",
            inst.class
        );

        // CONDITIONAL-EPILOGUE: advance or load the predicated-execution-
        // block state machine.
        let outcome = if ends_unit { MorphOutcome::EndBlock } else { MorphOutcome::Continue };
        if inst.class == InstClass::It {
            self.pred_block.start(inst.imm as u8);
        } else if self.pred_block.active() {
            if outcome.ends_block() {
                self.pred_block.reset();
            } else {
                self.pred_block.advance();
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArchVersion, Features, ProcessorConfig};
    use crate::ir::block::Block;
    use crate::ir::cond::Cond;
    use crate::ir::interp::Machine;
    use crate::ir::value::Flag;
    use crate::morph::class::NUM_INST_CLASSES;

    #[test]
    fn test_scenario_not_equal_with_zero_set_skips() {
        // Condition NE with Z = 1: the instruction's effect must be routed
        // through a skip rather than committed.
        let inst = DecodedInstruction::new(InstClass::MovImm)
            .with_regs(0, 0, 0)
            .with_imm(0xAA)
            .with_cond(Cond::NE);
        let mut morpher = Morpher::new(ProcessorConfig::default());
        let mut block = Block::new();
        morpher.morph(&inst, 0, true, &mut block);

        let mut machine = Machine::new();
        machine.set_nzcv(false, true, false, false);
        machine.run(&block);
        assert_eq!(machine.core[0], 0, "NE fails when Z is set");

        let mut machine = Machine::new();
        machine.run(&block);
        assert_eq!(machine.core[0], 0xAA, "NE passes when Z is clear");
    }

    #[test]
    fn test_allocator_net_zero_for_every_class() {
        // Every emission routine, exercised in isolation, must leave the
        // allocator cursor where it found it. The dispatcher asserts this
        // internally; the morph calls here would panic on a leak.
        let mut morpher = Morpher::new(ProcessorConfig::default());
        for index in 0..NUM_INST_CLASSES {
            let class = InstClass::from_index(index);
            let mut inst = DecodedInstruction::new(class).with_regs(1, 2, 3).with_ra(4);
            inst.width_field = 8;
            inst.set_flags = true;
            let mut block = Block::new();
            morpher.morph(&inst, 0x1000, true, &mut block);
            assert!(!block.is_empty() || matches!(class, InstClass::It | InstClass::Nop));
        }
    }

    #[test]
    fn test_version_gating_substitutes_undefined() {
        let config = ProcessorConfig {
            version: ArchVersion::V4T,
            features: Features::empty(),
            enabled: Features::empty(),
        };
        let inst = DecodedInstruction::new(InstClass::Clz).with_regs(0, 0, 1);
        let mut morpher = Morpher::new(config);
        let mut block = Block::new();
        let outcome = morpher.morph(&inst, 0x100, true, &mut block);
        assert!(outcome.ends_block());
        let mut machine = Machine::new();
        machine.run(&block);
        assert_eq!(machine.traps, vec![crate::ir::sink::TrapKind::Undefined]);
    }

    #[test]
    fn test_predicated_gated_trap_respects_condition() {
        // A conditional undefined instruction traps only when the
        // condition passes; predication bookkeeping survives gating.
        let config = ProcessorConfig {
            version: ArchVersion::V4T,
            features: Features::empty(),
            enabled: Features::empty(),
        };
        let inst = DecodedInstruction::new(InstClass::Clz).with_regs(0, 0, 1).with_cond(Cond::EQ);
        let mut morpher = Morpher::new(config);
        let mut block = Block::new();
        morpher.morph(&inst, 0x100, true, &mut block);

        let mut not_taken = Machine::new();
        not_taken.run(&block); // Z clear
        assert!(not_taken.traps.is_empty());
        assert_eq!(not_taken.pc, Some(0x104), "skip path reaches the next instruction");

        let mut taken = Machine::new();
        taken.set_nzcv(false, true, false, false);
        taken.run(&block);
        assert_eq!(taken.traps, vec![crate::ir::sink::TrapKind::Undefined]);
    }

    #[test]
    fn test_reserved_class_raises_undefined() {
        let mut builder = TableBuilder::new();
        builder.set(
            InstClass::Nop,
            InstructionDescriptor {
                emit: Some(emit::misc::emit_nop as descriptor::EmitFn),
                ..InstructionDescriptor::UNIMPLEMENTED
            },
        );
        let table: &'static Table = Box::leak(Box::new(builder.finish_partial().unwrap()));
        let mut morpher = Morpher::with_table(ProcessorConfig::default(), table);
        let inst = DecodedInstruction::new(InstClass::AddImm).with_regs(0, 1, 0);
        let mut block = Block::new();
        morpher.morph(&inst, 0, true, &mut block);
        let mut machine = Machine::new();
        machine.run(&block);
        assert_eq!(machine.traps, vec![crate::ir::sink::TrapKind::Undefined]);
    }

    #[test]
    fn test_block_reset_clears_flag_cache() {
        let ge_add = DecodedInstruction::new(InstClass::AddImm)
            .with_regs(0, 0, 0)
            .with_imm(1)
            .with_cond(Cond::GE);
        let mut morpher = Morpher::new(ProcessorConfig::default());

        let mut block = Block::new();
        morpher.morph(&ge_add, 0, true, &mut block);
        morpher.morph(&ge_add, 4, false, &mut block);
        let one_block_synths = count_slt_synth(&block);
        assert_eq!(one_block_synths, 1, "one synthesis per block");

        let mut block2 = Block::new();
        morpher.morph(&ge_add, 8, true, &mut block2);
        assert_eq!(count_slt_synth(&block2), 1, "new block synthesizes afresh");
    }

    fn count_slt_synth(block: &Block) -> usize {
        block.count_matching(|r| {
            matches!(r, crate::ir::block::Request::Binary { dst, .. }
                if *dst == crate::ir::value::Loc::Flag(Flag::SLt))
        })
    }

    #[test]
    fn test_it_block_chains_condition() {
        // IT EQ; then an ADD whose own condition field says AL: the block
        // state must impose EQ on it.
        let it = DecodedInstruction::new(InstClass::It).with_imm(0x08); // one slot, EQ
        let add = DecodedInstruction::new(InstClass::AddImm).with_regs(0, 0, 0).with_imm(5);
        let mut morpher = Morpher::new(ProcessorConfig::default());
        let mut block = Block::new();
        morpher.morph(&it, 0, true, &mut block);
        morpher.morph(&add, 4, false, &mut block);

        let mut machine = Machine::new();
        machine.run(&block); // Z clear: EQ fails
        assert_eq!(machine.core[0], 0);

        let mut machine = Machine::new();
        machine.set_nzcv(false, true, false, false);
        machine.run(&block);
        assert_eq!(machine.core[0], 5);
    }

    #[test]
    fn test_it_block_expires() {
        let it = DecodedInstruction::new(InstClass::It).with_imm(0x08);
        let add = DecodedInstruction::new(InstClass::AddImm).with_regs(0, 0, 0).with_imm(5);
        let mut morpher = Morpher::new(ProcessorConfig::default());
        let mut block = Block::new();
        morpher.morph(&it, 0, true, &mut block);
        morpher.morph(&add, 4, false, &mut block);
        // The block is spent: this one runs unconditionally.
        let add2 = DecodedInstruction::new(InstClass::AddImm).with_regs(1, 1, 0).with_imm(9);
        morpher.morph(&add2, 8, false, &mut block);

        let mut machine = Machine::new();
        machine.run(&block); // Z clear
        assert_eq!(machine.core[0], 0);
        assert_eq!(machine.core[1], 9);
    }

    #[test]
    fn test_msr_epilogue_reload() {
        let msr = DecodedInstruction::new(InstClass::MsrImm).with_imm(0x8000_0000);
        let mut morpher = Morpher::new(ProcessorConfig::default());
        let mut block = Block::new();
        let outcome = morpher.morph(&msr, 0, true, &mut block);
        assert!(!outcome.ends_block());
        let mut machine = Machine::new();
        machine.run(&block);
        assert!(machine.flag(Flag::N), "reload must follow the shadow write");
    }

    #[test]
    fn test_scenario_widening_vector_add() {
        // Widening 16-to-32 signed add: inputs [5, -3], no saturation, no
        // overlap routing, exact sign extension.
        let inst = DecodedInstruction::new(InstClass::VaddlS16).with_regs(0, 1, 2);
        let mut morpher = Morpher::new(ProcessorConfig::default());
        let mut block = Block::new();
        morpher.morph(&inst, 0, true, &mut block);
        let mut machine = Machine::new();
        machine.set_vec_elem(1, 0, crate::ir::types::Width::H16, 5);
        machine.set_vec_elem(1, 1, crate::ir::types::Width::H16, (-3i16) as u16 as u64);
        machine.run(&block);
        assert_eq!(machine.vec_elem(0, 0, crate::ir::types::Width::W32), 5);
        assert_eq!(
            machine.vec_elem(0, 1, crate::ir::types::Width::W32) as u32 as i32,
            -3
        );
        assert!(!machine.flag(Flag::Q));
    }

    #[test]
    fn test_scenario_narrowing_saturation() {
        // A 64-bit intermediate 0x1_0000_0000 narrowed to an unsigned
        // 32-bit destination clamps to 0xFFFF_FFFF and sets the sticky flag.
        let inst = DecodedInstruction::new(InstClass::VqmovnU64).with_regs(0, 0, 1);
        let mut morpher = Morpher::new(ProcessorConfig::default());
        let mut block = Block::new();
        morpher.morph(&inst, 0, true, &mut block);
        let mut machine = Machine::new();
        machine.set_vec_elem(1, 0, crate::ir::types::Width::D64, 0x1_0000_0000);
        machine.run(&block);
        assert_eq!(machine.vec_elem(0, 0, crate::ir::types::Width::W32), 0xFFFF_FFFF);
        assert!(machine.flag(Flag::Q));
    }
}
