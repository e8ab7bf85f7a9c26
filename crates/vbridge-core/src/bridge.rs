use std::sync::Arc;

use vbridge_mem::{HostSpan, MemAccess, PhysMemory, PAGE_SIZE};
use vbridge_state::{ArchState, CoreIdentity, CpuState, VectorTier};

use crate::config::BridgeConfig;
use crate::diag::{self, Severity};
use crate::disasm::DecodedInstr;
use crate::error::{BridgeError, Result, WalkError};
use crate::exec::{Executor, HaltExecutor, RunExit, StepOutcome, StopHandle, StopSignals};
use crate::hook::{HookChain, Hooks, TlbCntrl};
use crate::params::{simd_tier, SimParams};
use crate::registry::{CoreRegistry, MAX_CORES};
use crate::virt;

/// Owner of every core, the guest physical memory they share and the execution machinery.
///
/// Calls that take a core id require that core to exist; passing any other id panics at the
/// call site. Use [`Bridge::is_live`] to test first.
pub struct Bridge {
    registry: CoreRegistry,
    mem: PhysMemory,
    hooks: Vec<Box<dyn Hooks + Send>>,
    executor: Box<dyn Executor + Send>,
    stop: Arc<StopSignals>,
    params: SimParams,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("registry", &self.registry)
            .field("mem", &self.mem)
            .field("hooks", &self.hooks.len())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self::with_executor(config, HaltExecutor)
    }

    pub fn with_executor(
        config: BridgeConfig,
        executor: impl Executor + Send + 'static,
    ) -> Self {
        Self {
            registry: CoreRegistry::new(),
            mem: PhysMemory::new(config.memory),
            hooks: Vec::new(),
            executor: Box::new(executor),
            stop: Arc::new(StopSignals::default()),
            params: config.params,
        }
    }

    pub fn set_executor(&mut self, executor: impl Executor + Send + 'static) {
        self.executor = Box::new(executor);
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Parameters are read when a core is created; changes do not affect existing cores.
    pub fn params_mut(&mut self) -> &mut SimParams {
        &mut self.params
    }

    pub fn memory(&self) -> &PhysMemory {
        &self.mem
    }

    pub fn memory_mut(&mut self) -> &mut PhysMemory {
        &mut self.mem
    }

    pub fn register_hooks(&mut self, hooks: impl Hooks + Send + 'static) {
        self.hooks.push(Box::new(hooks));
    }

    pub fn clear_hooks(&mut self) {
        self.hooks.clear();
    }

    pub fn is_live(&self, id: usize) -> bool {
        self.registry.is_live(id)
    }

    pub fn live_cores(&self) -> impl Iterator<Item = usize> + '_ {
        self.registry.live_ids()
    }

    #[track_caller]
    pub fn cpu(&self, id: usize) -> &CpuState {
        match self.registry.lookup(id) {
            Ok(cpu) => cpu,
            Err(err) => panic!("{err}"),
        }
    }

    #[track_caller]
    pub fn cpu_mut(&mut self, id: usize) -> &mut CpuState {
        match self.registry.lookup_mut(id) {
            Ok(cpu) => cpu,
            Err(err) => panic!("{err}"),
        }
    }

    // Lifecycle

    /// Creates core `id` with all-zero architectural state.
    ///
    /// Fails if `id` is out of range or already in use. A core that fails its self-checks is a
    /// configuration error and aborts through the fatal diagnostic path.
    pub fn create(&mut self, id: usize) -> Result<()> {
        self.registry.check_vacant(id)?;

        let mut cpu = Box::new(CpuState::new(id));
        let simd = self.params.get_enum("cpuid.simd")?;
        cpu.initialize(CoreIdentity {
            apic_id: id as u32,
            apic_id_mask: self.params.apic_id_mask(),
            simd: simd_tier(simd),
        });

        if let Err(msg) = self.sanity_checks(&cpu) {
            diag::forward(Severity::Fatal, &format!("cpu{id}"), &msg);
        }

        self.registry.allocate(id, cpu)?;
        tracing::debug!(
            core = id,
            model = ?self.params.get_enum("cpu.model").ok(),
            "core created"
        );
        Ok(())
    }

    fn sanity_checks(&self, cpu: &CpuState) -> std::result::Result<(), String> {
        if !cpu.arch().is_zeroed() {
            return Err("architectural state is not zero after construction".to_string());
        }

        let identity = cpu.identity();
        if identity.simd > VectorTier::CURRENT {
            return Err(format!(
                "cpuid.simd needs {:?} vectors but this build supports {:?}",
                identity.simd,
                VectorTier::CURRENT
            ));
        }
        if identity.apic_id & !identity.apic_id_mask != 0 {
            return Err(format!(
                "APIC id {:#x} does not fit mask {:#x}",
                identity.apic_id, identity.apic_id_mask
            ));
        }

        let processors = self
            .params
            .get_num("cpu.n_processors")
            .map_err(|err| err.to_string())?;
        if processors > MAX_CORES as u64 {
            return Err(format!(
                "cpu.n_processors {processors} exceeds {MAX_CORES} cores"
            ));
        }
        Ok(())
    }

    /// Tears down core `id` and frees its slot.
    ///
    /// Panics if the core does not exist.
    #[track_caller]
    pub fn destroy(&mut self, id: usize) {
        match self.registry.release(id) {
            Ok(cpu) => {
                tracing::debug!(core = id, retired = cpu.retired(), "core destroyed");
            }
            Err(err) => panic!("{err}"),
        }
    }

    /// Re-derives cached execution state after external register writes. Must run before the
    /// next [`Bridge::run`] whenever control, segment or mode-affecting state was loaded.
    #[track_caller]
    pub fn sync_derived_state(&mut self, id: usize) {
        let cpu = self.cpu_mut(id);
        cpu.sync_derived_state();
        let cr3 = cpu.arch().control.cr3();
        let derived = *cpu.derived();
        tracing::trace!(
            core = id,
            mode = ?derived.mode,
            cpl = derived.cpl,
            "derived state synchronized"
        );
        HookChain::new(&mut self.hooks).tlb_cntrl(id, TlbCntrl::ContextSwitch, Some(cr3));
    }

    // Bulk state

    #[track_caller]
    pub fn state(&self, id: usize) -> ArchState {
        *self.cpu(id).arch()
    }

    /// Replaces the whole architectural image without synchronizing derived state.
    #[track_caller]
    pub fn set_state(&mut self, id: usize, state: &ArchState) {
        *self.cpu_mut(id).arch_mut() = *state;
    }

    /// [`Bridge::set_state`] followed by [`Bridge::sync_derived_state`].
    #[track_caller]
    pub fn load_state(&mut self, id: usize, state: &ArchState) {
        self.set_state(id, state);
        self.sync_derived_state(id);
    }

    // Execution

    /// Runs core `id` until a stop is requested or the executor halts.
    ///
    /// Stop requests are observed only between instructions.
    #[track_caller]
    pub fn run(&mut self, id: usize) -> RunExit {
        let Self {
            registry,
            mem,
            hooks,
            executor,
            stop,
            ..
        } = self;
        let cpu = match registry.lookup_mut(id) {
            Ok(cpu) => cpu,
            Err(err) => panic!("{err}"),
        };
        let mut hooks = HookChain::new(hooks);

        loop {
            if stop.poll(id) {
                tracing::debug!(core = id, retired = cpu.retired(), "stopping at boundary");
                return RunExit::StopRequested;
            }

            hooks.before_execution(id, cpu.arch().regs.rip());

            match executor.step(id, cpu, mem, &mut hooks) {
                StepOutcome::Retired => {
                    cpu.record_retired();
                    hooks.after_execution(id, cpu.arch().regs.rip());
                }
                StepOutcome::Halted => {
                    hooks.hlt(id);
                    return RunExit::Halted;
                }
            }
        }
    }

    #[track_caller]
    pub fn request_stop(&self, id: usize) {
        self.cpu(id);
        self.stop_handle().request_stop(id);
    }

    #[track_caller]
    pub fn clear_stop(&self, id: usize) {
        self.cpu(id);
        self.stop_handle().clear_stop(id);
    }

    /// Handle for stopping cores from another thread or from inside a hook.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(self.stop.clone())
    }

    // Physical memory

    /// Direct host view of `paddr`, or `None` if the caller must use the page-copy path.
    #[track_caller]
    pub fn translate(
        &mut self,
        id: usize,
        paddr: u64,
        access: MemAccess,
    ) -> Option<HostSpan<'_>> {
        self.cpu(id);
        self.mem.translate(paddr, access)
    }

    #[track_caller]
    pub fn read_page(&mut self, id: usize, paddr: u64, out: &mut [u8]) -> Result<()> {
        self.cpu(id);
        tracing::trace!(
            core = id,
            paddr = format_args!("{paddr:#x}"),
            len = out.len(),
            "page read"
        );
        self.mem.read_page(paddr, out)?;
        HookChain::new(&mut self.hooks).phy_access(id, paddr, out.len(), MemAccess::Read);
        Ok(())
    }

    #[track_caller]
    pub fn write_page(&mut self, id: usize, paddr: u64, data: &[u8]) -> Result<()> {
        self.cpu(id);
        tracing::trace!(
            core = id,
            paddr = format_args!("{paddr:#x}"),
            len = data.len(),
            "page write"
        );
        self.mem.write_page(paddr, data)?;
        HookChain::new(&mut self.hooks).phy_access(id, paddr, data.len(), MemAccess::Write);
        Ok(())
    }

    /// Debugger fetch that must not disturb guest-visible state. Not supported.
    #[track_caller]
    pub fn fetch_no_side_effects(
        &mut self,
        id: usize,
        paddr: u64,
        _out: &mut [u8],
    ) -> Result<()> {
        self.cpu(id);
        tracing::warn!(
            core = id,
            paddr = format_args!("{paddr:#x}"),
            "side-effect-free fetch is not supported"
        );
        Err(BridgeError::Unsupported {
            op: "fetch_no_side_effects",
        })
    }

    // Guest-virtual memory

    /// Translates `vaddr` through core `id`'s page tables, filling its translation cache.
    #[track_caller]
    pub fn virt_translate(
        &mut self,
        id: usize,
        vaddr: u64,
    ) -> std::result::Result<u64, WalkError> {
        let cpu = match self.registry.lookup_mut(id) {
            Ok(cpu) => cpu,
            Err(err) => panic!("{err}"),
        };
        virt::translate(cpu, &mut self.mem, vaddr)
    }

    /// Reads `out.len()` bytes at `vaddr`, translating each 4 KiB piece separately.
    #[track_caller]
    pub fn virt_read(&mut self, id: usize, vaddr: u64, out: &mut [u8]) -> Result<()> {
        let mut done = 0;
        while done < out.len() {
            let addr = vaddr.wrapping_add(done as u64);
            let chunk = (PAGE_SIZE - (addr & 0xFFF) as usize).min(out.len() - done);
            let paddr = self.virt_translate(id, addr)?;
            self.mem.read_page(paddr, &mut out[done..done + chunk])?;
            let mut hooks = HookChain::new(&mut self.hooks);
            hooks.lin_access(id, addr, paddr, chunk, MemAccess::Read);
            hooks.phy_access(id, paddr, chunk, MemAccess::Read);
            done += chunk;
        }
        Ok(())
    }

    #[track_caller]
    pub fn virt_write(&mut self, id: usize, vaddr: u64, data: &[u8]) -> Result<()> {
        let mut done = 0;
        while done < data.len() {
            let addr = vaddr.wrapping_add(done as u64);
            let chunk = (PAGE_SIZE - (addr & 0xFFF) as usize).min(data.len() - done);
            let paddr = self.virt_translate(id, addr)?;
            self.mem.write_page(paddr, &data[done..done + chunk])?;
            let mut hooks = HookChain::new(&mut self.hooks);
            hooks.lin_access(id, addr, paddr, chunk, MemAccess::Write);
            hooks.phy_access(id, paddr, chunk, MemAccess::Write);
            done += chunk;
        }
        Ok(())
    }

    // Decoding

    /// Decodes one instruction from `bytes` at the core's current RIP and code-segment size.
    #[track_caller]
    pub fn disassemble(&self, id: usize, bytes: &[u8]) -> Option<DecodedInstr> {
        let cpu = self.cpu(id);
        DecodedInstr::decode(cpu.derived().bitness, cpu.arch().regs.rip(), bytes)
    }
}
