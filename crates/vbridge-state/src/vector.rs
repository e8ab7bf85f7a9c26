//! Vector register file with a build-time width tier.
//!
//! Storage is always 32 registers of 8 × 64-bit words. The tier decides how many words and
//! registers are architecturally visible: reads zero-fill everything above the tier, writes
//! above it are discarded. Narrowing is silent.

use bytemuck::Zeroable;

/// Words exchanged per vector register at the bridge boundary, independent of the tier.
pub const VECTOR_WORDS: usize = 8;
/// Storage capacity in registers, independent of the tier.
pub const VECTOR_SLOTS: usize = 32;

/// 8 × 64-bit words, least significant word first.
pub type VectorRegister = [u64; VECTOR_WORDS];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VectorTier {
    /// 128-bit XMM0..XMM15.
    Sse,
    /// 256-bit YMM0..YMM15.
    Avx,
    /// 512-bit ZMM0..ZMM31.
    Evex,
}

impl VectorTier {
    pub const CURRENT: VectorTier = if cfg!(feature = "evex") {
        VectorTier::Evex
    } else if cfg!(feature = "avx") {
        VectorTier::Avx
    } else {
        VectorTier::Sse
    };

    /// Meaningful 64-bit words per register.
    pub const fn words(self) -> usize {
        match self {
            VectorTier::Sse => 2,
            VectorTier::Avx => 4,
            VectorTier::Evex => 8,
        }
    }

    /// Architecturally visible registers.
    pub const fn registers(self) -> usize {
        match self {
            VectorTier::Sse | VectorTier::Avx => 16,
            VectorTier::Evex => 32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Zeroable)]
pub struct VectorFile {
    regs: [VectorRegister; VECTOR_SLOTS],
}

impl Default for VectorFile {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl VectorFile {
    /// Returns all 8 words of register `index`; words above the tier and registers above the
    /// tier's count read as zero.
    ///
    /// Panics if `index >= VECTOR_SLOTS`.
    #[track_caller]
    pub fn get(&self, index: usize) -> VectorRegister {
        assert!(index < VECTOR_SLOTS, "vector register index {index} out of range");
        let mut out = [0u64; VECTOR_WORDS];
        if index < VectorTier::CURRENT.registers() {
            let words = VectorTier::CURRENT.words();
            out[..words].copy_from_slice(&self.regs[index][..words]);
        }
        out
    }

    /// Stores the words of `val` that the tier can hold and discards the rest.
    #[track_caller]
    pub fn set(&mut self, index: usize, val: &VectorRegister) {
        assert!(index < VECTOR_SLOTS, "vector register index {index} out of range");
        if index >= VectorTier::CURRENT.registers() {
            return;
        }
        let words = VectorTier::CURRENT.words();
        self.regs[index][..words].copy_from_slice(&val[..words]);
    }

    /// Low 128 bits of register `index`.
    pub fn xmm(&self, index: usize) -> u128 {
        let reg = self.get(index);
        u128::from(reg[0]) | (u128::from(reg[1]) << 64)
    }

    pub fn set_xmm(&mut self, index: usize, val: u128) {
        let mut reg = self.get(index);
        reg[0] = val as u64;
        reg[1] = (val >> 64) as u64;
        self.set(index, &reg);
    }
}
