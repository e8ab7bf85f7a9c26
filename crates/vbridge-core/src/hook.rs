use vbridge_mem::MemAccess;

/// Why the translation cache was flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TlbCntrl {
    MovCr0,
    MovCr3,
    MovCr4,
    TaskSwitch,
    /// Bulk state load followed by a derived-state sync.
    ContextSwitch,
    InvLpg,
    InvPcid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheCntrl {
    Invd,
    Wbinvd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResetSource {
    Software,
    Hardware,
}

/// Kind of control transfer reported by the branch hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Branch {
    Jmp,
    JmpIndirect,
    Call,
    CallIndirect,
    Ret,
    Iret,
    Int,
    Syscall,
    Sysret,
    Sysenter,
    Sysexit,
}

/// Instrumentation callbacks. Every method defaults to a no-op.
///
/// Hooks run on the thread driving the core. The bridge itself raises `before_execution`,
/// `after_execution`, `hlt`, `tlb_cntrl(ContextSwitch)`, `phy_access` and `lin_access`; every
/// other callback is raised by the [`crate::Executor`] through the `hooks` argument of
/// [`crate::Executor::step`].
///
/// To stop the core from inside a hook, keep a [`crate::StopHandle`] in the hook and call
/// `request_stop`; `run` returns at the next instruction boundary.
pub trait Hooks {
    fn reset(&mut self, _id: usize, _source: ResetSource) {}

    fn hlt(&mut self, _id: usize) {}

    fn mwait(&mut self, _id: usize, _paddr: u64, _len: usize, _flags: u32) {}

    fn cnear_branch_taken(&mut self, _id: usize, _branch_rip: u64, _new_rip: u64) {}

    fn cnear_branch_not_taken(&mut self, _id: usize, _branch_rip: u64, _new_rip: u64) {}

    fn ucnear_branch(&mut self, _id: usize, _what: Branch, _branch_rip: u64, _new_rip: u64) {}

    /// Far transfers carry `(cs selector, rip)` pairs.
    fn far_branch(&mut self, _id: usize, _what: Branch, _from: (u16, u64), _to: (u16, u64)) {}

    /// Raw bytes of the instruction about to execute and the code size it decodes at.
    fn opcode(&mut self, _id: usize, _rip: u64, _bytes: &[u8], _bitness: u32) {}

    fn interrupt(&mut self, _id: usize, _vector: u32) {}

    fn exception(&mut self, _id: usize, _vector: u32, _error_code: u32) {}

    fn hw_interrupt(&mut self, _id: usize, _vector: u32, _at: (u16, u64)) {}

    fn tlb_cntrl(&mut self, _id: usize, _what: TlbCntrl, _new_cr3: Option<u64>) {}

    fn cache_cntrl(&mut self, _id: usize, _what: CacheCntrl) {}

    fn clflush(&mut self, _id: usize, _vaddr: u64, _paddr: u64) {}

    fn before_execution(&mut self, _id: usize, _rip: u64) {}

    fn after_execution(&mut self, _id: usize, _rip: u64) {}

    fn repeat_iteration(&mut self, _id: usize, _rip: u64) {}

    fn lin_access(&mut self, _id: usize, _vaddr: u64, _paddr: u64, _len: usize, _access: MemAccess) {
    }

    fn phy_access(&mut self, _id: usize, _paddr: u64, _len: usize, _access: MemAccess) {}

    fn cpuid(&mut self, _id: usize) {}

    fn wrmsr(&mut self, _id: usize, _msr: u32, _val: u64) {}
}

/// Every registered hook, invoked in registration order.
pub(crate) struct HookChain<'a> {
    hooks: &'a mut [Box<dyn Hooks + Send>],
}

impl<'a> HookChain<'a> {
    pub(crate) fn new(hooks: &'a mut [Box<dyn Hooks + Send>]) -> Self {
        Self { hooks }
    }
}

macro_rules! fan_out {
    ($(fn $name:ident(&mut self $(, $arg:ident: $ty:ty)*);)*) => {
        impl Hooks for HookChain<'_> {
            $(
                fn $name(&mut self $(, $arg: $ty)*) {
                    for hook in self.hooks.iter_mut() {
                        hook.$name($($arg),*);
                    }
                }
            )*
        }
    };
}

fan_out! {
    fn reset(&mut self, id: usize, source: ResetSource);
    fn hlt(&mut self, id: usize);
    fn mwait(&mut self, id: usize, paddr: u64, len: usize, flags: u32);
    fn cnear_branch_taken(&mut self, id: usize, branch_rip: u64, new_rip: u64);
    fn cnear_branch_not_taken(&mut self, id: usize, branch_rip: u64, new_rip: u64);
    fn ucnear_branch(&mut self, id: usize, what: Branch, branch_rip: u64, new_rip: u64);
    fn far_branch(&mut self, id: usize, what: Branch, from: (u16, u64), to: (u16, u64));
    fn opcode(&mut self, id: usize, rip: u64, bytes: &[u8], bitness: u32);
    fn interrupt(&mut self, id: usize, vector: u32);
    fn exception(&mut self, id: usize, vector: u32, error_code: u32);
    fn hw_interrupt(&mut self, id: usize, vector: u32, at: (u16, u64));
    fn tlb_cntrl(&mut self, id: usize, what: TlbCntrl, new_cr3: Option<u64>);
    fn cache_cntrl(&mut self, id: usize, what: CacheCntrl);
    fn clflush(&mut self, id: usize, vaddr: u64, paddr: u64);
    fn before_execution(&mut self, id: usize, rip: u64);
    fn after_execution(&mut self, id: usize, rip: u64);
    fn repeat_iteration(&mut self, id: usize, rip: u64);
    fn lin_access(&mut self, id: usize, vaddr: u64, paddr: u64, len: usize, access: MemAccess);
    fn phy_access(&mut self, id: usize, paddr: u64, len: usize, access: MemAccess);
    fn cpuid(&mut self, id: usize);
    fn wrmsr(&mut self, id: usize, msr: u32, val: u64);
}
