//! Register access surface.
//!
//! Getters have no side effects. Setters write one register group and nothing else, with one
//! exception: [`Bridge::set_rflags`] re-derives the execution mode when VM or AC change. All
//! other mode changes take effect at [`Bridge::sync_derived_state`].

use vbridge_state::msr::{IA32_EFER, IA32_FS_BASE, IA32_GS_BASE};
use vbridge_state::{DescriptorTableRegister, SegReg, SegmentDescriptor, VectorRegister};

use crate::bridge::Bridge;
use crate::error::{BridgeError, Result};

/// Accessors that forward to a register group's own getter/setter pair.
macro_rules! group_accessors {
    ($group:ident { $($get:ident, $set:ident: $ty:ty;)* }) => {
        impl Bridge {
            $(
                #[track_caller]
                pub fn $get(&self, id: usize) -> $ty {
                    self.cpu(id).arch().$group.$get()
                }

                #[track_caller]
                pub fn $set(&mut self, id: usize, val: $ty) {
                    self.cpu_mut(id).arch_mut().$group.$set(val);
                }
            )*
        }
    };
}

/// Accessors over plain public fields of a register group.
macro_rules! field_accessors {
    ($group:ident { $($field:ident, $set:ident: $ty:ty;)* }) => {
        impl Bridge {
            $(
                #[track_caller]
                pub fn $field(&self, id: usize) -> $ty {
                    self.cpu(id).arch().$group.$field
                }

                #[track_caller]
                pub fn $set(&mut self, id: usize, val: $ty) {
                    self.cpu_mut(id).arch_mut().$group.$field = val;
                }
            )*
        }
    };
}

macro_rules! segment_accessors {
    ($($get:ident, $set:ident => $reg:ident;)*) => {
        impl Bridge {
            $(
                #[track_caller]
                pub fn $get(&self, id: usize) -> SegmentDescriptor {
                    self.segment(id, SegReg::$reg)
                }

                #[track_caller]
                pub fn $set(&mut self, id: usize, desc: SegmentDescriptor) {
                    self.set_segment(id, SegReg::$reg, desc);
                }
            )*
        }
    };
}

group_accessors!(control {
    cr0, set_cr0: u32;
    cr2, set_cr2: u64;
    cr3, set_cr3: u64;
    cr4, set_cr4: u32;
    xcr0, set_xcr0: u32;
    efer, set_efer: u32;
});

group_accessors!(debug {
    dr6, set_dr6: u32;
    dr7, set_dr7: u32;
});

// CR8 is a view onto the APIC task-priority register.
group_accessors!(apic {
    cr8, set_cr8: u64;
});

field_accessors!(msrs {
    kernel_gs_base, set_kernel_gs_base: u64;
    star, set_star: u64;
    lstar, set_lstar: u64;
    cstar, set_cstar: u64;
    sfmask, set_sfmask: u32;
    sysenter_cs, set_sysenter_cs: u32;
    sysenter_esp, set_sysenter_esp: u64;
    sysenter_eip, set_sysenter_eip: u64;
    tsc, set_tsc: u64;
    tsc_aux, set_tsc_aux: u32;
    pat, set_pat: u64;
    apic_base, set_apic_base: u64;
});

field_accessors!(fp {
    fcw, set_fcw: u16;
    fsw, set_fsw: u16;
    ftw, set_ftw: u16;
    fop, set_fop: u16;
    mxcsr, set_mxcsr: u32;
    mxcsr_mask, set_mxcsr_mask: u32;
});

segment_accessors! {
    es, set_es => Es;
    cs, set_cs => Cs;
    ss, set_ss => Ss;
    ds, set_ds => Ds;
    fs, set_fs => Fs;
    gs, set_gs => Gs;
}

impl Bridge {
    #[track_caller]
    pub fn rip(&self, id: usize) -> u64 {
        self.cpu(id).arch().regs.rip()
    }

    /// Also records the old value as the previous instruction pointer.
    #[track_caller]
    pub fn set_rip(&mut self, id: usize, val: u64) {
        self.cpu_mut(id).arch_mut().regs.set_rip(val);
    }

    #[track_caller]
    pub fn prev_rip(&self, id: usize) -> u64 {
        self.cpu(id).arch().regs.prev_rip()
    }

    #[track_caller]
    pub fn rsp(&self, id: usize) -> u64 {
        self.cpu(id).arch().regs.rsp()
    }

    #[track_caller]
    pub fn set_rsp(&mut self, id: usize, val: u64) {
        self.cpu_mut(id).arch_mut().regs.set_rsp(val);
    }

    #[track_caller]
    pub fn speculative_rsp(&self, id: usize) -> u64 {
        self.cpu(id).arch().regs.speculative_rsp()
    }

    /// General-purpose register by encoding index, 0 (RAX) through 15 (R15).
    #[track_caller]
    pub fn gpr(&self, id: usize, index: usize) -> u64 {
        self.cpu(id).arch().regs.gpr(index)
    }

    #[track_caller]
    pub fn set_gpr(&mut self, id: usize, index: usize, val: u64) {
        self.cpu_mut(id).arch_mut().regs.set_gpr(index, val);
    }

    #[track_caller]
    pub fn rflags(&self, id: usize) -> u64 {
        self.cpu(id).arch().regs.rflags()
    }

    #[track_caller]
    pub fn set_rflags(&mut self, id: usize, val: u64) {
        self.cpu_mut(id).set_rflags(val);
    }

    #[track_caller]
    pub fn segment(&self, id: usize, reg: SegReg) -> SegmentDescriptor {
        *self.cpu(id).arch().seg(reg)
    }

    /// Stores the descriptor cache exactly as given; attribute bits are not validated.
    #[track_caller]
    pub fn set_segment(&mut self, id: usize, reg: SegReg, desc: SegmentDescriptor) {
        *self.cpu_mut(id).arch_mut().seg_mut(reg) = desc;
    }

    /// Loads every segment register from one packed table. Not supported; load them
    /// individually with [`Bridge::set_segment`].
    #[track_caller]
    pub fn set_segments_legacy(
        &mut self,
        id: usize,
        _segs: &[SegmentDescriptor; 6],
    ) -> Result<()> {
        self.cpu(id);
        tracing::warn!(core = id, "bulk segment load is not supported");
        Err(BridgeError::Unsupported {
            op: "set_segments_legacy",
        })
    }

    #[track_caller]
    pub fn ldtr(&self, id: usize) -> SegmentDescriptor {
        self.cpu(id).arch().ldtr
    }

    #[track_caller]
    pub fn set_ldtr(&mut self, id: usize, desc: SegmentDescriptor) {
        self.cpu_mut(id).arch_mut().ldtr = desc;
    }

    #[track_caller]
    pub fn tr(&self, id: usize) -> SegmentDescriptor {
        self.cpu(id).arch().tr
    }

    #[track_caller]
    pub fn set_tr(&mut self, id: usize, desc: SegmentDescriptor) {
        self.cpu_mut(id).arch_mut().tr = desc;
    }

    #[track_caller]
    pub fn gdtr(&self, id: usize) -> DescriptorTableRegister {
        self.cpu(id).arch().gdtr
    }

    #[track_caller]
    pub fn set_gdtr(&mut self, id: usize, dtr: DescriptorTableRegister) {
        self.cpu_mut(id).arch_mut().gdtr = dtr;
    }

    #[track_caller]
    pub fn idtr(&self, id: usize) -> DescriptorTableRegister {
        self.cpu(id).arch().idtr
    }

    #[track_caller]
    pub fn set_idtr(&mut self, id: usize, dtr: DescriptorTableRegister) {
        self.cpu_mut(id).arch_mut().idtr = dtr;
    }

    /// DR0..DR3. Panics if `index > 3`.
    #[track_caller]
    pub fn dr(&self, id: usize, index: usize) -> u64 {
        self.cpu(id).arch().debug.dr(index)
    }

    #[track_caller]
    pub fn set_dr(&mut self, id: usize, index: usize, val: u64) {
        self.cpu_mut(id).arch_mut().debug.set_dr(index, val);
    }

    #[track_caller]
    pub fn apic_tpr(&self, id: usize) -> u8 {
        self.cpu(id).arch().apic.tpr
    }

    #[track_caller]
    pub fn set_apic_tpr(&mut self, id: usize, val: u8) {
        self.cpu_mut(id).arch_mut().apic.tpr = val;
    }

    /// Reads an MSR by architectural index, including EFER and the FS/GS bases. `None` for
    /// MSRs the bridge does not model.
    #[track_caller]
    pub fn rdmsr(&self, id: usize, index: u32) -> Option<u64> {
        let arch = self.cpu(id).arch();
        match index {
            IA32_EFER => Some(u64::from(arch.control.efer())),
            IA32_FS_BASE => Some(arch.seg(SegReg::Fs).base),
            IA32_GS_BASE => Some(arch.seg(SegReg::Gs).base),
            _ => arch.msrs.read(index),
        }
    }

    /// Writes an MSR by index. Returns `false`, leaving state untouched, for unmodelled MSRs.
    #[track_caller]
    pub fn wrmsr(&mut self, id: usize, index: u32, val: u64) -> bool {
        let arch = self.cpu_mut(id).arch_mut();
        match index {
            IA32_EFER => arch.control.set_efer(val as u32),
            IA32_FS_BASE => arch.seg_mut(SegReg::Fs).base = val,
            IA32_GS_BASE => arch.seg_mut(SegReg::Gs).base = val,
            _ => {
                let handled = arch.msrs.write(index, val);
                if !handled {
                    tracing::debug!(
                        core = id,
                        msr = format_args!("{index:#x}"),
                        "unmodelled MSR write"
                    );
                }
                return handled;
            }
        }
        true
    }

    /// Vector register `index` as 8 words; words and registers above the build's vector tier
    /// read as zero.
    #[track_caller]
    pub fn zmm(&self, id: usize, index: usize) -> VectorRegister {
        self.cpu(id).arch().vector.get(index)
    }

    /// Writes the words the build's vector tier can hold and drops the rest.
    #[track_caller]
    pub fn set_zmm(&mut self, id: usize, index: usize, val: &VectorRegister) {
        self.cpu_mut(id).arch_mut().vector.set(index, val);
    }

    /// FP stack slot (physical register R0..R7) converted to an integer.
    #[track_caller]
    pub fn fp_st(&self, id: usize, index: usize) -> i64 {
        self.cpu(id).arch().fp.st(index)
    }

    #[track_caller]
    pub fn set_fp_st(&mut self, id: usize, index: usize, val: i64) {
        self.cpu_mut(id).arch_mut().fp.set_st(index, val);
    }
}
