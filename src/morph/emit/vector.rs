//! Vector emission: every integer and float lane operation funnels through
//! the element iteration engine; only the permutes are hand-rolled.

use crate::ir::op::OpSelector;
use crate::ir::types::Width;
use crate::ir::value::{FlagMask, Loc};
use crate::morph::context::TranslationContext;
use crate::morph::descriptor::Policy;
use crate::morph::element::{self, Element};

/// The generic vector routine: same-width, widening, mixed-width,
/// narrowing, saturating and pairwise classes are all instances of the
/// iteration engine parameterized by the descriptor.
pub fn emit_vector(ctx: &mut TranslationContext<'_>) {
    match ctx.desc.op {
        OpSelector::Unary(op) => {
            element::iterate(ctx, true, |ctx, el: &Element| {
                ctx.unary(op, el.dst, el.a, FlagMask::empty());
            });
        }
        OpSelector::Binary(op) => {
            let accumulate = ctx.desc.policy.contains(Policy::ACCUMULATE);
            let flags = if op.is_saturating() { FlagMask::Q } else { FlagMask::empty() };
            element::iterate(ctx, false, |ctx, el: &Element| {
                let b = el.b.expect("binary vector element");
                if accumulate {
                    let product = ctx.temps.alloc(el.dst.width().container());
                    let p = product.view(0, el.dst.width());
                    ctx.binary(op, p, el.a, b, FlagMask::empty());
                    let acc = ctx.desc.acc_op.binary();
                    ctx.binary(acc, el.dst, el.prev, p, flags);
                    // Released by the engine's per-iteration rollback.
                } else {
                    ctx.binary(op, el.dst, el.a, b, flags);
                }
            });
        }
        OpSelector::None => panic!("vector descriptor selects no operation"),
    }
}

/// VTRN: exchange the odd lanes of Vd with the even lanes of Vm.
pub fn emit_vtrn(ctx: &mut TranslationContext<'_>) {
    let inst = ctx.inst;
    let width = ctx.desc.esize;
    let lanes = (16 / width.bytes()) as u8;
    let d = inst.rd;
    let m = inst.rm;

    let t = ctx.temps.alloc(Width::W32);
    let hold = t.view(0, width);
    if d == m {
        // Architecturally unspecified combination. The reference simulator
        // performs the element exchanges sequentially, which for Vd == Vm
        // leaves each adjacent lane pair swapped; preserve that observable
        // behavior rather than treating it as a no-op.
        for j in (0..lanes).step_by(2) {
            let even = Loc::vec(d, j, width);
            let odd = Loc::vec(d, j + 1, width);
            ctx.mov(hold, even);
            ctx.mov(even, odd);
            ctx.mov(odd, hold);
        }
    } else {
        for j in (0..lanes).step_by(2) {
            let d_odd = Loc::vec(d, j + 1, width);
            let m_even = Loc::vec(m, j, width);
            ctx.mov(hold, d_odd);
            ctx.mov(d_odd, m_even);
            ctx.mov(m_even, hold);
        }
    }
    ctx.temps.free(Width::W32);
}

#[cfg(test)]
mod tests {
    use crate::config::ProcessorConfig;
    use crate::ir::block::Block;
    use crate::ir::interp::Machine;
    use crate::ir::types::Width;
    use crate::ir::value::Flag;
    use crate::morph::class::InstClass;
    use crate::morph::decoded::DecodedInstruction;
    use crate::morph::Morpher;

    fn run(inst: DecodedInstruction, setup: impl FnOnce(&mut Machine)) -> Machine {
        let mut morpher = Morpher::new(ProcessorConfig::default());
        let mut block = Block::new();
        morpher.morph(&inst, 0, true, &mut block);
        let mut machine = Machine::new();
        setup(&mut machine);
        machine.run(&block);
        machine
    }

    #[test]
    fn test_vadd_i32_lanes() {
        let inst = DecodedInstruction::new(InstClass::VaddI32).with_regs(0, 1, 2);
        let machine = run(inst, |m| {
            for lane in 0..4 {
                m.set_vec_elem(1, lane, Width::W32, 10 * lane as u64);
                m.set_vec_elem(2, lane, Width::W32, 5);
            }
        });
        for lane in 0..4 {
            assert_eq!(machine.vec_elem(0, lane, Width::W32), 10 * lane as u64 + 5);
        }
    }

    #[test]
    fn test_vqadd_saturates_lane() {
        let inst = DecodedInstruction::new(InstClass::VqaddS16).with_regs(0, 1, 2);
        let machine = run(inst, |m| {
            m.set_vec_elem(1, 0, Width::H16, 0x7FFF);
            m.set_vec_elem(2, 0, Width::H16, 1);
            m.set_vec_elem(1, 1, Width::H16, 100);
            m.set_vec_elem(2, 1, Width::H16, 1);
        });
        assert_eq!(machine.vec_elem(0, 0, Width::H16), 0x7FFF);
        assert_eq!(machine.vec_elem(0, 1, Width::H16), 101);
        assert!(machine.flag(Flag::Q));
    }

    #[test]
    fn test_vmla_accumulates() {
        let inst = DecodedInstruction::new(InstClass::VmlaI32).with_regs(0, 1, 2);
        let machine = run(inst, |m| {
            for lane in 0..4 {
                m.set_vec_elem(0, lane, Width::W32, 1000);
                m.set_vec_elem(1, lane, Width::W32, lane as u64);
                m.set_vec_elem(2, lane, Width::W32, 3);
            }
        });
        for lane in 0..4 {
            assert_eq!(machine.vec_elem(0, lane, Width::W32), 1000 + 3 * lane as u64);
        }
    }

    #[test]
    fn test_vmla_by_scalar() {
        let inst = DecodedInstruction::new(InstClass::VmlaScalarW32)
            .with_regs(0, 1, 2)
            .with_scalar_index(1);
        let machine = run(inst, |m| {
            m.set_vec_elem(2, 1, Width::W32, 7);
            for lane in 0..4 {
                m.set_vec_elem(0, lane, Width::W32, 1);
                m.set_vec_elem(1, lane, Width::W32, lane as u64);
            }
        });
        for lane in 0..4 {
            assert_eq!(machine.vec_elem(0, lane, Width::W32), 1 + 7 * lane as u64);
        }
    }

    #[test]
    fn test_vmvn_inverts() {
        let inst = DecodedInstruction::new(InstClass::Vmvn).with_regs(0, 0, 1);
        let machine = run(inst, |m| {
            m.set_vec_elem(1, 0, Width::D64, 0x00FF_00FF_00FF_00FF);
            m.set_vec_elem(1, 1, Width::D64, 0);
        });
        assert_eq!(machine.vec_elem(0, 0, Width::D64), 0xFF00_FF00_FF00_FF00);
        assert_eq!(machine.vec_elem(0, 1, Width::D64), u64::MAX);
    }

    #[test]
    fn test_vqmovun_signed_to_unsigned() {
        let inst = DecodedInstruction::new(InstClass::VqmovunS16).with_regs(0, 0, 1);
        let machine = run(inst, |m| {
            m.set_vec_elem(1, 0, Width::H16, (-5i16) as u16 as u64);
            m.set_vec_elem(1, 1, Width::H16, 300);
            m.set_vec_elem(1, 2, Width::H16, 77);
        });
        assert_eq!(machine.vec_elem(0, 0, Width::B8), 0, "negative clamps to zero");
        assert_eq!(machine.vec_elem(0, 1, Width::B8), 255, "overflow clamps to max");
        assert_eq!(machine.vec_elem(0, 2, Width::B8), 77);
        assert!(machine.flag(Flag::Q));
    }

    #[test]
    fn test_vtrn_distinct_registers() {
        let inst = DecodedInstruction::new(InstClass::Vtrn32).with_regs(0, 0, 1);
        let machine = run(inst, |m| {
            for lane in 0..4 {
                m.set_vec_elem(0, lane, Width::W32, lane as u64); // 0 1 2 3
                m.set_vec_elem(1, lane, Width::W32, 10 + lane as u64); // 10 11 12 13
            }
        });
        // d: [0, 10, 2, 12]; m: [1, 11, 3, 13]
        assert_eq!(machine.vec_elem(0, 0, Width::W32), 0);
        assert_eq!(machine.vec_elem(0, 1, Width::W32), 10);
        assert_eq!(machine.vec_elem(0, 2, Width::W32), 2);
        assert_eq!(machine.vec_elem(0, 3, Width::W32), 12);
        assert_eq!(machine.vec_elem(1, 0, Width::W32), 1);
        assert_eq!(machine.vec_elem(1, 1, Width::W32), 11);
        assert_eq!(machine.vec_elem(1, 2, Width::W32), 3);
        assert_eq!(machine.vec_elem(1, 3, Width::W32), 13);
    }

    #[test]
    fn test_vtrn_same_register_swaps_pairs() {
        let inst = DecodedInstruction::new(InstClass::Vtrn16).with_regs(4, 0, 4);
        let machine = run(inst, |m| {
            for lane in 0..8 {
                m.set_vec_elem(4, lane, Width::H16, lane as u64);
            }
        });
        for pair in 0..4u8 {
            assert_eq!(machine.vec_elem(4, 2 * pair, Width::H16), 2 * pair as u64 + 1);
            assert_eq!(machine.vec_elem(4, 2 * pair + 1, Width::H16), 2 * pair as u64);
        }
    }

    #[test]
    fn test_vaddf32_lanes() {
        let inst = DecodedInstruction::new(InstClass::VaddF32).with_regs(0, 1, 2);
        let machine = run(inst, |m| {
            m.set_vec_elem(1, 0, Width::W32, 1.5f32.to_bits() as u64);
            m.set_vec_elem(2, 0, Width::W32, 2.25f32.to_bits() as u64);
        });
        assert_eq!(f32::from_bits(machine.vec_elem(0, 0, Width::W32) as u32), 3.75);
    }

    #[test]
    fn test_vpaddl_unsigned() {
        let inst = DecodedInstruction::new(InstClass::VpaddlU8).with_regs(0, 0, 1);
        let machine = run(inst, |m| {
            m.set_vec_elem(1, 0, Width::B8, 0xFF);
            m.set_vec_elem(1, 1, Width::B8, 0xFF);
        });
        assert_eq!(machine.vec_elem(0, 0, Width::H16), 0x1FE);
    }
}
