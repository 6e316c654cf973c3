use bitflags::bitflags;

/// Guest architecture version the simulated processor implements.
///
/// Ordered: a descriptor's `min_version` gates an instruction class out of
/// any configuration older than it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ArchVersion {
    V4T = 0,
    V5Te = 1,
    V6 = 2,
    V6T2 = 3,
    V7 = 4,
}

bitflags! {
    /// Optional architecture extensions a processor variant may carry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Features: u32 {
        /// Scalar floating point, single precision.
        const VFP2 = 1 << 0;
        /// Scalar floating point, double precision and short-vector forms.
        const VFP3 = 1 << 1;
        /// Advanced SIMD (128-bit vector) integer and float operations.
        const SIMD = 1 << 2;
        /// Hardware integer divide.
        const IDIV = 1 << 3;
    }
}

/// Static configuration of the simulated processor.
///
/// `features` describes what the configured variant implements at all;
/// `enabled` describes what the guest's feature registers (coprocessor
/// access controls and the like) currently permit. An instruction gated on
/// a feature the variant lacks raises an undefined-instruction trap; one
/// gated on a feature that is merely disabled raises the
/// feature-disabled trap so the guest OS can lazily enable the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorConfig {
    pub version: ArchVersion,
    pub features: Features,
    pub enabled: Features,
}

impl ProcessorConfig {
    /// A fully featured v7 processor with every unit enabled.
    pub fn all_features() -> Self {
        Self {
            version: ArchVersion::V7,
            features: Features::all(),
            enabled: Features::all(),
        }
    }

    /// Does the configured variant implement `feature` at all?
    pub fn has_feature(&self, feature: Features) -> bool {
        self.features.contains(feature)
    }

    /// Is `feature` currently switched on by the guest's feature registers?
    pub fn feature_enabled(&self, feature: Features) -> bool {
        self.enabled.contains(feature)
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self::all_features()
    }
}
