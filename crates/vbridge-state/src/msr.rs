use bytemuck::Zeroable;

pub const IA32_TSC: u32 = 0x0000_0010;
pub const IA32_APIC_BASE: u32 = 0x0000_001B;
pub const IA32_SYSENTER_CS: u32 = 0x0000_0174;
pub const IA32_SYSENTER_ESP: u32 = 0x0000_0175;
pub const IA32_SYSENTER_EIP: u32 = 0x0000_0176;
pub const IA32_PAT: u32 = 0x0000_0277;
pub const IA32_EFER: u32 = 0xC000_0080;
pub const IA32_STAR: u32 = 0xC000_0081;
pub const IA32_LSTAR: u32 = 0xC000_0082;
pub const IA32_CSTAR: u32 = 0xC000_0083;
pub const IA32_FMASK: u32 = 0xC000_0084;
pub const IA32_FS_BASE: u32 = 0xC000_0100;
pub const IA32_GS_BASE: u32 = 0xC000_0101;
pub const IA32_KERNEL_GS_BASE: u32 = 0xC000_0102;
pub const IA32_TSC_AUX: u32 = 0xC000_0103;

/// Power-on value of IA32_PAT (WB, WT, UC-, UC repeated). Not applied automatically: a fresh
/// core reads zero until the driver loads state.
pub const PAT_POWER_ON: u64 = 0x0007_0406_0007_0406;

/// Named model-specific registers.
///
/// Fields are public; the bridge applies no masking to MSR values beyond the 32-bit width of
/// `sfmask`, `sysenter_cs` and `tsc_aux`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Zeroable)]
pub struct MsrState {
    pub kernel_gs_base: u64,
    pub star: u64,
    pub lstar: u64,
    pub cstar: u64,
    pub sfmask: u32,
    pub sysenter_cs: u32,
    pub sysenter_esp: u64,
    pub sysenter_eip: u64,
    pub tsc: u64,
    pub tsc_aux: u32,
    pub pat: u64,
    pub apic_base: u64,
}

impl MsrState {
    /// Reads an MSR held in this group by its architectural index.
    ///
    /// EFER and the FS/GS base MSRs live with the control and segment state; they are not
    /// handled here and return `None`, as does any unknown index.
    pub fn read(&self, index: u32) -> Option<u64> {
        let val = match index {
            IA32_TSC => self.tsc,
            IA32_APIC_BASE => self.apic_base,
            IA32_SYSENTER_CS => u64::from(self.sysenter_cs),
            IA32_SYSENTER_ESP => self.sysenter_esp,
            IA32_SYSENTER_EIP => self.sysenter_eip,
            IA32_PAT => self.pat,
            IA32_STAR => self.star,
            IA32_LSTAR => self.lstar,
            IA32_CSTAR => self.cstar,
            IA32_FMASK => u64::from(self.sfmask),
            IA32_KERNEL_GS_BASE => self.kernel_gs_base,
            IA32_TSC_AUX => u64::from(self.tsc_aux),
            _ => return None,
        };
        Some(val)
    }

    /// Writes an MSR by index. Returns `false` for indices this group does not hold.
    pub fn write(&mut self, index: u32, val: u64) -> bool {
        match index {
            IA32_TSC => self.tsc = val,
            IA32_APIC_BASE => self.apic_base = val,
            IA32_SYSENTER_CS => self.sysenter_cs = val as u32,
            IA32_SYSENTER_ESP => self.sysenter_esp = val,
            IA32_SYSENTER_EIP => self.sysenter_eip = val,
            IA32_PAT => self.pat = val,
            IA32_STAR => self.star = val,
            IA32_LSTAR => self.lstar = val,
            IA32_CSTAR => self.cstar = val,
            IA32_FMASK => self.sfmask = val as u32,
            IA32_KERNEL_GS_BASE => self.kernel_gs_base = val,
            IA32_TSC_AUX => self.tsc_aux = val as u32,
            _ => return false,
        }
        true
    }
}
