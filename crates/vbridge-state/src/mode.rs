//! Execution state derived from control, segment and flag registers.
//!
//! Nothing in here is architecturally visible on its own; it is cached so the executor does not
//! re-decode CR0/CR4/EFER/CS on every instruction, and it goes stale whenever those registers
//! are written from outside. See `CpuState::sync_derived_state`.

use crate::control::{Cr0, Cr4, Efer, Xcr0};
use crate::regs::{RFLAGS_AC, RFLAGS_VM};
use crate::segment::SegmentDescriptor;
use crate::vector::VectorTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuMode {
    /// CR0.PE clear.
    Real,
    /// Protected mode with RFLAGS.VM set.
    V8086,
    Protected,
    /// EFER.LMA set and CS.L clear.
    LongCompat,
    /// EFER.LMA set and CS.L set.
    Long64,
}

impl CpuMode {
    pub fn is_long(self) -> bool {
        matches!(self, CpuMode::LongCompat | CpuMode::Long64)
    }

    pub fn is_protected_or_long(self) -> bool {
        matches!(
            self,
            CpuMode::Protected | CpuMode::LongCompat | CpuMode::Long64
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingMode {
    Disabled,
    Legacy32,
    Pae,
    Long4,
}

impl PagingMode {
    pub fn derive(cr0: Cr0, cr4: Cr4, efer: Efer) -> Self {
        if !cr0.contains(Cr0::PG) {
            PagingMode::Disabled
        } else if !cr4.contains(Cr4::PAE) {
            PagingMode::Legacy32
        } else if efer.contains(Efer::LME) {
            PagingMode::Long4
        } else {
            PagingMode::Pae
        }
    }
}

/// Whether each class of floating-point/vector instruction may execute, or raises #NM/#UD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FpuGates {
    pub fpu: bool,
    pub sse: bool,
    pub avx: bool,
    pub evex: bool,
}

impl FpuGates {
    pub fn derive(mode: CpuMode, cr0: Cr0, cr4: Cr4, xcr0: Xcr0, tier: VectorTier) -> Self {
        let ts = cr0.contains(Cr0::TS);
        let em = cr0.contains(Cr0::EM);

        let fpu = !em && !ts;
        let sse = !ts && !em && cr4.contains(Cr4::OSFXSR);
        let avx = !ts
            && mode.is_protected_or_long()
            && cr4.contains(Cr4::OSXSAVE)
            && xcr0.contains(Xcr0::AVX_STATE)
            && tier >= VectorTier::Avx;
        let evex = avx && xcr0.contains(Xcr0::EVEX_STATE) && tier >= VectorTier::Evex;

        FpuGates {
            fpu,
            sse,
            avx,
            evex,
        }
    }
}

/// Cached execution context, recomputed by the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedMode {
    pub mode: CpuMode,
    /// Default operand/address size of the current code segment: 16, 32 or 64.
    pub bitness: u32,
    pub cpl: u8,
    /// CR0.AM && RFLAGS.AC && CPL == 3.
    pub alignment_check: bool,
    pub paging: PagingMode,
    pub gates: FpuGates,
}

impl Default for DerivedMode {
    /// Matches an all-zero architectural image.
    fn default() -> Self {
        DerivedMode {
            mode: CpuMode::Real,
            bitness: 16,
            cpl: 0,
            alignment_check: false,
            paging: PagingMode::Disabled,
            gates: FpuGates {
                fpu: true,
                sse: false,
                avx: false,
                evex: false,
            },
        }
    }
}

pub fn alignment_check(cr0: Cr0, rflags: u64, cpl: u8) -> bool {
    cr0.contains(Cr0::AM) && rflags & RFLAGS_AC != 0 && cpl == 3
}

/// Returns `(mode, bitness, cpl)`.
pub fn execution_mode(
    cr0: Cr0,
    efer: Efer,
    rflags: u64,
    cs: &SegmentDescriptor,
) -> (CpuMode, u32, u8) {
    let size_from_d = if cs.default_size_32() { 32 } else { 16 };

    if efer.contains(Efer::LMA) {
        if cs.long() {
            (CpuMode::Long64, 64, cs.rpl())
        } else {
            (CpuMode::LongCompat, size_from_d, cs.rpl())
        }
    } else if !cr0.contains(Cr0::PE) {
        (CpuMode::Real, 16, 0)
    } else if rflags & RFLAGS_VM != 0 {
        (CpuMode::V8086, 16, 3)
    } else {
        (CpuMode::Protected, size_from_d, cs.rpl())
    }
}
