use bytemuck::Zeroable;

use crate::control::{ApicState, ControlState, DebugState};
use crate::fpu::FpState;
use crate::mode::{
    alignment_check, execution_mode, CpuMode, DerivedMode, FpuGates, PagingMode,
};
use crate::msr::MsrState;
use crate::regs::{RegisterFile, RFLAGS_MODE_BITS};
use crate::segment::{DescriptorTableRegister, SegReg, SegmentDescriptor};
use crate::tlb::TranslationCache;
use crate::vector::{VectorFile, VectorTier};

/// Complete architectural image of one core.
///
/// The all-zero bit pattern is the only default: `ArchState::default()` is `zeroed()`, and a
/// freshly created core holds exactly this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Zeroable)]
pub struct ArchState {
    pub regs: RegisterFile,
    /// Indexed by [`SegReg`].
    pub segs: [SegmentDescriptor; 6],
    pub ldtr: SegmentDescriptor,
    pub tr: SegmentDescriptor,
    pub gdtr: DescriptorTableRegister,
    pub idtr: DescriptorTableRegister,
    pub control: ControlState,
    pub debug: DebugState,
    pub apic: ApicState,
    pub msrs: MsrState,
    pub vector: VectorFile,
    pub fp: FpState,
}

impl Default for ArchState {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl ArchState {
    #[inline]
    pub fn seg(&self, reg: SegReg) -> &SegmentDescriptor {
        &self.segs[reg as usize]
    }

    #[inline]
    pub fn seg_mut(&mut self, reg: SegReg) -> &mut SegmentDescriptor {
        &mut self.segs[reg as usize]
    }

    pub fn is_zeroed(&self) -> bool {
        *self == Self::zeroed()
    }
}

/// Per-core identity bound at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreIdentity {
    pub apic_id: u32,
    /// 0xff for xAPIC/x2APIC, 0xf for the legacy APIC.
    pub apic_id_mask: u32,
    /// Vector width the configured CPUID model advertises.
    pub simd: VectorTier,
}

impl Default for CoreIdentity {
    fn default() -> Self {
        CoreIdentity {
            apic_id: 0,
            apic_id_mask: 0xff,
            simd: VectorTier::Sse,
        }
    }
}

/// One emulated core: architectural state plus the caches derived from it.
#[derive(Debug, Clone)]
pub struct CpuState {
    id: usize,
    arch: ArchState,
    derived: DerivedMode,
    tlb: TranslationCache,
    identity: CoreIdentity,
    retired: u64,
}

impl CpuState {
    /// Zero-filled core with no identity bound yet.
    pub fn new(id: usize) -> Self {
        Self {
            id,
            arch: ArchState::zeroed(),
            derived: DerivedMode::default(),
            tlb: TranslationCache::new(),
            identity: CoreIdentity::default(),
            retired: 0,
        }
    }

    /// Binds identity. Leaves architectural state untouched.
    pub fn initialize(&mut self, identity: CoreIdentity) {
        self.identity = identity;
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn identity(&self) -> &CoreIdentity {
        &self.identity
    }

    #[inline]
    pub fn arch(&self) -> &ArchState {
        &self.arch
    }

    /// Raw access for bulk loads. Derived state is not touched; call
    /// [`CpuState::sync_derived_state`] before resuming execution.
    #[inline]
    pub fn arch_mut(&mut self) -> &mut ArchState {
        &mut self.arch
    }

    #[inline]
    pub fn derived(&self) -> &DerivedMode {
        &self.derived
    }

    #[inline]
    pub fn tlb(&self) -> &TranslationCache {
        &self.tlb
    }

    #[inline]
    pub fn tlb_mut(&mut self) -> &mut TranslationCache {
        &mut self.tlb
    }

    #[inline]
    pub fn retired(&self) -> u64 {
        self.retired
    }

    #[inline]
    pub fn record_retired(&mut self) {
        self.retired += 1;
    }

    /// Writes RFLAGS. A change to VM or AC re-derives the execution mode and alignment check;
    /// the translation cache is left alone.
    pub fn set_rflags(&mut self, val: u64) {
        let changed = self.arch.regs.rflags() ^ val;
        self.arch.regs.set_rflags_raw(val);
        if changed & RFLAGS_MODE_BITS != 0 {
            self.update_execution_mode();
            self.update_alignment_check();
        }
    }

    /// Re-derives every cached mode after external register writes, in order: flush the
    /// translation cache, alignment check, execution mode, FPU/vector gates.
    pub fn sync_derived_state(&mut self) {
        self.tlb.flush_all();
        self.update_alignment_check();
        self.update_execution_mode();
        self.update_fpu_gates();
    }

    fn update_alignment_check(&mut self) {
        let (_, _, cpl) = self.current_mode();
        self.derived.alignment_check = alignment_check(
            self.arch.control.cr0_flags(),
            self.arch.regs.rflags(),
            cpl,
        );
    }

    fn current_mode(&self) -> (CpuMode, u32, u8) {
        let control = &self.arch.control;
        execution_mode(
            control.cr0_flags(),
            control.efer_flags(),
            self.arch.regs.rflags(),
            self.arch.seg(SegReg::Cs),
        )
    }

    fn update_execution_mode(&mut self) {
        let (mode, bitness, cpl) = self.current_mode();
        let control = &self.arch.control;
        self.derived.mode = mode;
        self.derived.bitness = bitness;
        self.derived.cpl = cpl;
        self.derived.paging = PagingMode::derive(
            control.cr0_flags(),
            control.cr4_flags(),
            control.efer_flags(),
        );
    }

    fn update_fpu_gates(&mut self) {
        let control = &self.arch.control;
        self.derived.gates = FpuGates::derive(
            self.derived.mode,
            control.cr0_flags(),
            control.cr4_flags(),
            control.xcr0_flags(),
            VectorTier::CURRENT,
        );
    }
}
