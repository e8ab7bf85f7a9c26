//! Control, extended-control, feature-enable and debug registers.
//!
//! Writes go through accessors that drop bits the architecture defines as reserved, so a
//! value read back is always the masked form of what was written. Round-trips are exact for
//! every value that only uses defined bits.

use bitflags::bitflags;
use bytemuck::Zeroable;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Cr0: u32 {
        const PE = 1 << 0;
        const MP = 1 << 1;
        const EM = 1 << 2;
        const TS = 1 << 3;
        const ET = 1 << 4;
        const NE = 1 << 5;
        const WP = 1 << 16;
        const AM = 1 << 18;
        const NW = 1 << 29;
        const CD = 1 << 30;
        const PG = 1 << 31;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Cr4: u32 {
        const VME = 1 << 0;
        const PVI = 1 << 1;
        const TSD = 1 << 2;
        const DE = 1 << 3;
        const PSE = 1 << 4;
        const PAE = 1 << 5;
        const MCE = 1 << 6;
        const PGE = 1 << 7;
        const PCE = 1 << 8;
        const OSFXSR = 1 << 9;
        const OSXMMEXCPT = 1 << 10;
        const UMIP = 1 << 11;
        const LA57 = 1 << 12;
        const VMXE = 1 << 13;
        const SMXE = 1 << 14;
        const FSGSBASE = 1 << 16;
        const PCIDE = 1 << 17;
        const OSXSAVE = 1 << 18;
        const SMEP = 1 << 20;
        const SMAP = 1 << 21;
        const PKE = 1 << 22;
        const CET = 1 << 23;
        const PKS = 1 << 24;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Efer: u32 {
        const SCE = 1 << 0;
        const LME = 1 << 8;
        const LMA = 1 << 10;
        const NXE = 1 << 11;
        const SVME = 1 << 12;
        const LMSLE = 1 << 13;
        const FFXSR = 1 << 14;
        const TCE = 1 << 15;
    }
}

bitflags! {
    /// XCR0 state-component bitmap.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Xcr0: u32 {
        const X87 = 1 << 0;
        const SSE = 1 << 1;
        const YMM = 1 << 2;
        const BNDREGS = 1 << 3;
        const BNDCSR = 1 << 4;
        const OPMASK = 1 << 5;
        const ZMM_HI256 = 1 << 6;
        const HI16_ZMM = 1 << 7;
        const PKRU = 1 << 9;
    }
}

impl Xcr0 {
    pub const AVX_STATE: Xcr0 = Xcr0::SSE.union(Xcr0::YMM);
    pub const EVEX_STATE: Xcr0 = Xcr0::OPMASK
        .union(Xcr0::ZMM_HI256)
        .union(Xcr0::HI16_ZMM);
}

/// CR0/CR2/CR3/CR4 plus XCR0 and EFER.
///
/// CR8 is not stored here: it is a view onto the local APIC task-priority register, see
/// [`ApicState`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Zeroable)]
pub struct ControlState {
    cr0: u32,
    cr2: u64,
    cr3: u64,
    cr4: u32,
    xcr0: u32,
    efer: u32,
}

impl ControlState {
    #[inline]
    pub fn cr0(&self) -> u32 {
        self.cr0
    }

    pub fn set_cr0(&mut self, val: u32) {
        self.cr0 = Cr0::from_bits_truncate(val).bits();
    }

    #[inline]
    pub fn cr0_flags(&self) -> Cr0 {
        Cr0::from_bits_truncate(self.cr0)
    }

    #[inline]
    pub fn cr2(&self) -> u64 {
        self.cr2
    }

    #[inline]
    pub fn set_cr2(&mut self, val: u64) {
        self.cr2 = val;
    }

    #[inline]
    pub fn cr3(&self) -> u64 {
        self.cr3
    }

    #[inline]
    pub fn set_cr3(&mut self, val: u64) {
        self.cr3 = val;
    }

    #[inline]
    pub fn cr4(&self) -> u32 {
        self.cr4
    }

    pub fn set_cr4(&mut self, val: u32) {
        self.cr4 = Cr4::from_bits_truncate(val).bits();
    }

    #[inline]
    pub fn cr4_flags(&self) -> Cr4 {
        Cr4::from_bits_truncate(self.cr4)
    }

    #[inline]
    pub fn xcr0(&self) -> u32 {
        self.xcr0
    }

    pub fn set_xcr0(&mut self, val: u32) {
        self.xcr0 = Xcr0::from_bits_truncate(val).bits();
    }

    #[inline]
    pub fn xcr0_flags(&self) -> Xcr0 {
        Xcr0::from_bits_truncate(self.xcr0)
    }

    #[inline]
    pub fn efer(&self) -> u32 {
        self.efer
    }

    pub fn set_efer(&mut self, val: u32) {
        self.efer = Efer::from_bits_truncate(val).bits();
    }

    #[inline]
    pub fn efer_flags(&self) -> Efer {
        Efer::from_bits_truncate(self.efer)
    }
}

/// DR6 bits that hold state: B0..B3, BLD, BD, BS, BT, RTM.
pub const DR6_DEFINED: u32 = 0x0001_F80F;
/// DR7 bits that hold state: L0..G3, LE/GE, bit 10, RTM, GD, and the R/W + LEN fields.
pub const DR7_DEFINED: u32 = 0xFFFF_2FFF;

/// DR0..DR3 breakpoint addresses plus DR6/DR7.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Zeroable)]
pub struct DebugState {
    dr: [u64; 4],
    dr6: u32,
    dr7: u32,
}

impl DebugState {
    /// Panics if `index > 3`.
    #[inline]
    #[track_caller]
    pub fn dr(&self, index: usize) -> u64 {
        self.dr[index]
    }

    #[inline]
    #[track_caller]
    pub fn set_dr(&mut self, index: usize, val: u64) {
        self.dr[index] = val;
    }

    #[inline]
    pub fn dr6(&self) -> u32 {
        self.dr6
    }

    pub fn set_dr6(&mut self, val: u32) {
        self.dr6 = val & DR6_DEFINED;
    }

    #[inline]
    pub fn dr7(&self) -> u32 {
        self.dr7
    }

    pub fn set_dr7(&mut self, val: u32) {
        self.dr7 = val & DR7_DEFINED;
    }
}

/// The slice of local APIC state the CPU reads directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Zeroable)]
pub struct ApicState {
    /// Task-priority register: priority class in bits 7:4, sub-class in bits 3:0.
    pub tpr: u8,
}

impl ApicState {
    /// CR8 reads the TPR priority class.
    #[inline]
    pub fn cr8(&self) -> u64 {
        u64::from(self.tpr >> 4)
    }

    /// CR8 writes replace the priority class and clear the sub-class. Bits above 3 are ignored.
    #[inline]
    pub fn set_cr8(&mut self, val: u64) {
        self.tpr = ((val & 0xF) as u8) << 4;
    }
}
