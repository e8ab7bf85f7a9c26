use bytemuck::Zeroable;

pub const RFLAGS_CF: u64 = 1 << 0;
pub const RFLAGS_RESERVED1: u64 = 1 << 1;
pub const RFLAGS_PF: u64 = 1 << 2;
pub const RFLAGS_AF: u64 = 1 << 4;
pub const RFLAGS_ZF: u64 = 1 << 6;
pub const RFLAGS_SF: u64 = 1 << 7;
pub const RFLAGS_TF: u64 = 1 << 8;
pub const RFLAGS_IF: u64 = 1 << 9;
pub const RFLAGS_DF: u64 = 1 << 10;
pub const RFLAGS_OF: u64 = 1 << 11;
pub const RFLAGS_IOPL_MASK: u64 = 0b11 << 12;
pub const RFLAGS_NT: u64 = 1 << 14;
pub const RFLAGS_RF: u64 = 1 << 16;
pub const RFLAGS_VM: u64 = 1 << 17;
pub const RFLAGS_AC: u64 = 1 << 18;
pub const RFLAGS_VIF: u64 = 1 << 19;
pub const RFLAGS_VIP: u64 = 1 << 20;
pub const RFLAGS_ID: u64 = 1 << 21;

/// Flag bits whose change affects derived execution state (alignment checking, V8086 mode).
pub const RFLAGS_MODE_BITS: u64 = RFLAGS_VM | RFLAGS_AC;

/// Number of general-purpose registers in the register file.
pub const GPR_COUNT: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gpr {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl Gpr {
    pub const ALL: [Gpr; GPR_COUNT] = [
        Gpr::Rax,
        Gpr::Rcx,
        Gpr::Rdx,
        Gpr::Rbx,
        Gpr::Rsp,
        Gpr::Rbp,
        Gpr::Rsi,
        Gpr::Rdi,
        Gpr::R8,
        Gpr::R9,
        Gpr::R10,
        Gpr::R11,
        Gpr::R12,
        Gpr::R13,
        Gpr::R14,
        Gpr::R15,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// General-purpose registers, instruction pointer and flags.
///
/// Two shadow copies are maintained alongside the canonical values:
/// - `prev_rip` holds the instruction pointer as it was before the most recent write, so an
///   executor can restart a faulting instruction.
/// - `speculative_rsp` mirrors RSP and is rewritten on every RSP write, whether the write goes
///   through [`RegisterFile::set_rsp`] or through [`RegisterFile::set_gpr`] with index 4.
///
/// Both shadows are updated inside the same call as the canonical register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Zeroable)]
pub struct RegisterFile {
    gpr: [u64; GPR_COUNT],
    rip: u64,
    prev_rip: u64,
    speculative_rsp: u64,
    rflags: u64,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl RegisterFile {
    /// Reads a general-purpose register by encoding index (0 = RAX .. 15 = R15).
    ///
    /// Panics if `index` is not a valid register index.
    #[inline]
    #[track_caller]
    pub fn gpr(&self, index: usize) -> u64 {
        self.gpr[index]
    }

    #[inline]
    #[track_caller]
    pub fn set_gpr(&mut self, index: usize, val: u64) {
        self.gpr[index] = val;
        if index == Gpr::Rsp as usize {
            self.speculative_rsp = val;
        }
    }

    #[inline]
    pub fn reg(&self, reg: Gpr) -> u64 {
        self.gpr[reg as usize]
    }

    #[inline]
    pub fn set_reg(&mut self, reg: Gpr, val: u64) {
        self.set_gpr(reg as usize, val);
    }

    #[inline]
    pub fn rip(&self) -> u64 {
        self.rip
    }

    pub fn set_rip(&mut self, val: u64) {
        self.prev_rip = self.rip;
        self.rip = val;
    }

    /// Instruction pointer before the most recent [`RegisterFile::set_rip`].
    #[inline]
    pub fn prev_rip(&self) -> u64 {
        self.prev_rip
    }

    #[inline]
    pub fn rsp(&self) -> u64 {
        self.gpr[Gpr::Rsp as usize]
    }

    pub fn set_rsp(&mut self, val: u64) {
        self.set_gpr(Gpr::Rsp as usize, val);
    }

    #[inline]
    pub fn speculative_rsp(&self) -> u64 {
        self.speculative_rsp
    }

    #[inline]
    pub fn rflags(&self) -> u64 {
        self.rflags
    }

    /// Raw flags write. Derived-mode bookkeeping for [`RFLAGS_MODE_BITS`] is handled by
    /// `CpuState::set_rflags`.
    #[inline]
    pub fn set_rflags_raw(&mut self, val: u64) {
        self.rflags = val;
    }

    #[inline]
    pub fn flag(&self, mask: u64) -> bool {
        self.rflags & mask != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rip_shadow_tracks_previous_value() {
        let mut regs = RegisterFile::default();
        regs.set_rip(0x1000);
        regs.set_rip(0x0000_0000_0040_1000);
        assert_eq!(regs.rip(), 0x0040_1000);
        assert_eq!(regs.prev_rip(), 0x1000);
    }

    #[test]
    fn rsp_shadow_follows_both_write_paths() {
        let mut regs = RegisterFile::default();
        regs.set_rsp(0x7fff_0000);
        assert_eq!(regs.speculative_rsp(), 0x7fff_0000);

        regs.set_gpr(Gpr::Rsp as usize, 0x7ffe_fff8);
        assert_eq!(regs.rsp(), 0x7ffe_fff8);
        assert_eq!(regs.speculative_rsp(), 0x7ffe_fff8);

        regs.set_reg(Gpr::Rbp, 0x1234);
        assert_eq!(regs.speculative_rsp(), 0x7ffe_fff8);
    }

    #[test]
    fn gpr_index_maps_to_named_register() {
        let mut regs = RegisterFile::default();
        for (i, reg) in Gpr::ALL.iter().enumerate() {
            regs.set_gpr(i, 0x100 + i as u64);
            assert_eq!(regs.reg(*reg), 0x100 + i as u64);
        }
        assert_eq!(Gpr::from_index(15), Some(Gpr::R15));
        assert_eq!(Gpr::from_index(16), None);
    }
}
