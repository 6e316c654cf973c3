//! Scalar floating point. Single-precision registers are lanes of the
//! 128-bit vector file (S[i] maps to lane i%4 of Q[i/4]); double-precision
//! registers map to 64-bit lanes the same way.

use crate::ir::op::OpSelector;
use crate::ir::types::Width;
use crate::ir::value::{FlagMask, Loc};
use crate::morph::context::TranslationContext;

fn fp_reg(index: u8, width: Width) -> Loc {
    match width {
        Width::W32 => {
            assert!(index < 32, "invalid single-precision register {}", index);
            Loc::vec(index / 4, index % 4, Width::W32)
        }
        Width::D64 => {
            assert!(index < 32, "invalid double-precision register {}", index);
            Loc::vec(index / 2, index % 2, Width::D64)
        }
        w => panic!("no floating-point register bank at {}", w),
    }
}

/// VADD/VSUB/VMUL/VDIV at the descriptor's precision.
pub fn emit_fp_binary(ctx: &mut TranslationContext<'_>) {
    let width = ctx.desc.esize;
    let op = ctx.desc.op.binary();
    let dst = fp_reg(ctx.inst.rd, width);
    let a = fp_reg(ctx.inst.rn, width);
    let b = fp_reg(ctx.inst.rm, width);
    ctx.binary(op, dst, a, b, FlagMask::empty());
}

/// VABS/VNEG/VSQRT at the descriptor's precision.
pub fn emit_fp_unary(ctx: &mut TranslationContext<'_>) {
    let width = ctx.desc.esize;
    let op = ctx.desc.op.unary();
    let dst = fp_reg(ctx.inst.rd, width);
    let src = fp_reg(ctx.inst.rm, width);
    ctx.unary(op, dst, src, FlagMask::empty());
}

/// VCMP: IEEE compare of Vd with Vm, writing the N/Z/C/V flag locations
/// with the architected less/equal/greater/unordered encoding.
pub fn emit_fp_compare(ctx: &mut TranslationContext<'_>) {
    let width = ctx.desc.esize;
    let op = ctx.desc.op.binary();
    let a = fp_reg(ctx.inst.rd, width);
    let b = fp_reg(ctx.inst.rm, width);
    // The compare writes no data result; the destination is ignored.
    ctx.binary(op, a, a, b, FlagMask::NZCV);
}

/// Route VFP classes by operation arity.
pub fn emit_fp(ctx: &mut TranslationContext<'_>) {
    use crate::ir::op::BinaryOp;
    match ctx.desc.op {
        OpSelector::Unary(_) => emit_fp_unary(ctx),
        OpSelector::Binary(BinaryOp::FCmp) => emit_fp_compare(ctx),
        OpSelector::Binary(_) => emit_fp_binary(ctx),
        OpSelector::None => panic!("floating-point descriptor selects no operation"),
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{ArchVersion, Features, ProcessorConfig};
    use crate::ir::block::Block;
    use crate::ir::cond::Cond;
    use crate::ir::interp::Machine;
    use crate::ir::sink::TrapKind;
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
    fn test_vadd_f64() {
        // D1 = D2 + D3.
        let inst = DecodedInstruction::new(InstClass::VfpAddF64).with_regs(1, 2, 3);
        let machine = run(inst, |m| {
            m.set_vec_elem(1, 0, Width::D64, 0.5f64.to_bits());
            m.set_vec_elem(1, 1, Width::D64, 0.25f64.to_bits());
        });
        // D1 is lane 1 of Q0.
        assert_eq!(f64::from_bits(machine.vec_elem(0, 1, Width::D64)), 0.75);
    }

    #[test]
    fn test_vdiv_f32() {
        // S0 = S1 / S2.
        let inst = DecodedInstruction::new(InstClass::VfpDivF32).with_regs(0, 1, 2);
        let machine = run(inst, |m| {
            m.set_vec_elem(0, 1, Width::W32, 7.0f32.to_bits() as u64);
            m.set_vec_elem(0, 2, Width::W32, 2.0f32.to_bits() as u64);
        });
        assert_eq!(f32::from_bits(machine.vec_elem(0, 0, Width::W32) as u32), 3.5);
    }

    #[test]
    fn test_vsqrt_f32() {
        let inst = DecodedInstruction::new(InstClass::VfpSqrtF32).with_regs(0, 0, 1);
        let machine = run(inst, |m| {
            m.set_vec_elem(0, 1, Width::W32, 9.0f32.to_bits() as u64);
        });
        assert_eq!(f32::from_bits(machine.vec_elem(0, 0, Width::W32) as u32), 3.0);
    }

    #[test]
    fn test_vcmp_orders_flags() {
        let inst = DecodedInstruction::new(InstClass::VfpCmpF32).with_regs(0, 0, 1);
        let machine = run(inst, |m| {
            m.set_vec_elem(0, 0, Width::W32, 1.0f32.to_bits() as u64);
            m.set_vec_elem(0, 1, Width::W32, 2.0f32.to_bits() as u64);
        });
        // 1.0 < 2.0: N set, Z/C/V clear.
        assert!(machine.flag(Flag::N));
        assert!(!machine.flag(Flag::Z));
        assert!(!machine.flag(Flag::C));
        assert!(!machine.flag(Flag::V));
    }

    #[test]
    fn test_vcmp_unordered() {
        let inst = DecodedInstruction::new(InstClass::VfpCmpF32).with_regs(0, 0, 1);
        let machine = run(inst, |m| {
            m.set_vec_elem(0, 0, Width::W32, f32::NAN.to_bits() as u64);
            m.set_vec_elem(0, 1, Width::W32, 2.0f32.to_bits() as u64);
        });
        assert!(machine.flag(Flag::C));
        assert!(machine.flag(Flag::V));
        assert!(!machine.flag(Flag::N));
        assert!(!machine.flag(Flag::Z));
    }

    #[test]
    fn test_vcmp_feeds_conditional() {
        // VCMP then a GT-predicated add: the compound flag synthesizes
        // from the float flags.
        let mut morpher = Morpher::new(ProcessorConfig::default());
        let mut block = Block::new();
        let cmp = DecodedInstruction::new(InstClass::VfpCmpF32).with_regs(0, 0, 1);
        let add = DecodedInstruction::new(InstClass::AddImm)
            .with_regs(0, 0, 0)
            .with_imm(1)
            .with_cond(Cond::GT);
        morpher.morph(&cmp, 0, true, &mut block);
        morpher.morph(&add, 4, false, &mut block);
        let mut machine = Machine::new();
        machine.set_vec_elem(0, 0, Width::W32, 3.0f32.to_bits() as u64);
        machine.set_vec_elem(0, 1, Width::W32, 2.0f32.to_bits() as u64);
        machine.run(&block);
        assert_eq!(machine.core[0], 1, "3.0 > 2.0 passes GT");
    }

    #[test]
    fn test_f64_gated_on_vfp3() {
        let config = ProcessorConfig {
            version: ArchVersion::V7,
            features: Features::VFP2,
            enabled: Features::VFP2,
        };
        let inst = DecodedInstruction::new(InstClass::VfpAddF64).with_regs(0, 1, 2);
        let mut morpher = Morpher::new(config);
        let mut block = Block::new();
        morpher.morph(&inst, 0, true, &mut block);
        let mut machine = Machine::new();
        machine.run(&block);
        assert_eq!(machine.traps, vec![TrapKind::FeatureNotPresent]);
    }

    #[test]
    fn test_vfp_disabled_by_feature_registers() {
        let config = ProcessorConfig {
            version: ArchVersion::V7,
            features: Features::all(),
            enabled: Features::empty(),
        };
        let inst = DecodedInstruction::new(InstClass::VfpAddF32).with_regs(0, 1, 2);
        let mut morpher = Morpher::new(config);
        let mut block = Block::new();
        morpher.morph(&inst, 0, true, &mut block);
        let mut machine = Machine::new();
        machine.run(&block);
        assert_eq!(machine.traps, vec![TrapKind::FeatureDisabled]);
    }
}
