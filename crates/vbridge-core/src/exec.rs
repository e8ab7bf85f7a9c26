//! Instruction-stream execution and cooperative stop.
//!
//! Instruction semantics live behind [`Executor`]. The bridge's `run` loop owns the instruction
//! boundary: it polls the stop request, brackets each step with hooks and counts retirements.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use vbridge_mem::PhysMemory;
use vbridge_state::CpuState;

use crate::hook::Hooks;
use crate::registry::MAX_CORES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// One instruction retired; keep going.
    Retired,
    /// The core executed HLT (or otherwise idled) and has nothing to do until an external event.
    Halted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    StopRequested,
    Halted,
}

/// Instruction semantics for one core.
///
/// `hooks` fans out to every registered [`Hooks`]; executors raise the events the bridge cannot
/// see itself (branches, exceptions, CR writes, CPUID, WRMSR and the rest). Guest-virtual
/// fetches go through [`crate::virt::translate`].
pub trait Executor {
    fn step(
        &mut self,
        id: usize,
        cpu: &mut CpuState,
        mem: &mut PhysMemory,
        hooks: &mut dyn Hooks,
    ) -> StepOutcome;
}

/// Executor used when none is installed: every step halts.
#[derive(Debug, Default, Clone, Copy)]
pub struct HaltExecutor;

impl Executor for HaltExecutor {
    fn step(
        &mut self,
        _id: usize,
        _cpu: &mut CpuState,
        _mem: &mut PhysMemory,
        _hooks: &mut dyn Hooks,
    ) -> StepOutcome {
        StepOutcome::Halted
    }
}

/// Process-wide stop request plus one asynchronous-event flag per core.
///
/// The process-wide flag is the stop condition every core obeys. The per-core flag marks which
/// core the request was addressed to and is consumed when that core reaches a boundary.
#[derive(Debug, Default)]
pub(crate) struct StopSignals {
    stop: AtomicBool,
    async_event: [AtomicBool; MAX_CORES],
}

impl StopSignals {
    fn request(&self, id: usize) {
        self.async_event[id].store(true, Ordering::Release);
        self.stop.store(true, Ordering::Release);
    }

    fn clear(&self, id: usize) {
        self.async_event[id].store(false, Ordering::Release);
        self.stop.store(false, Ordering::Release);
    }

    /// Instruction-boundary check for core `id`.
    pub(crate) fn poll(&self, id: usize) -> bool {
        let addressed = self.async_event[id].swap(false, Ordering::AcqRel);
        let stop = self.stop.load(Ordering::Acquire);
        if addressed && !stop {
            tracing::trace!(core = id, "stale async event");
        }
        stop
    }
}

/// Clonable handle for requesting a stop from any thread.
#[derive(Debug, Clone)]
pub struct StopHandle {
    signals: Arc<StopSignals>,
}

impl StopHandle {
    pub(crate) fn new(signals: Arc<StopSignals>) -> Self {
        Self { signals }
    }

    /// Panics if `id >= MAX_CORES`.
    #[track_caller]
    pub fn request_stop(&self, id: usize) {
        assert!(id < MAX_CORES, "core id {id} out of range (max {MAX_CORES})");
        tracing::debug!(core = id, "stop requested");
        self.signals.request(id);
    }

    #[track_caller]
    pub fn clear_stop(&self, id: usize) {
        assert!(id < MAX_CORES, "core id {id} out of range (max {MAX_CORES})");
        self.signals.clear(id);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.signals.stop.load(Ordering::Acquire)
    }
}
