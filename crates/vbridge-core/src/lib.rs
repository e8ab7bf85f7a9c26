//! Driver-facing bridge to emulated x86-64 cores.
//!
//! A [`Bridge`] owns up to [`MAX_CORES`] cores and the guest physical memory they share. The
//! expected call order for a core is:
//!
//! 1. [`Bridge::create`]
//! 2. register setters or [`Bridge::set_state`]
//! 3. [`Bridge::sync_derived_state`] (or [`Bridge::load_state`], which combines 2 and 3)
//! 4. [`Bridge::run`], stopped cooperatively through [`Bridge::request_stop`] or a
//!    [`StopHandle`]
//! 5. [`Bridge::destroy`]
//!
//! Using an id that does not name a live core is a caller bug and panics.

#![forbid(unsafe_code)]

mod bridge;
mod config;
pub mod diag;
mod disasm;
mod error;
mod exec;
mod hook;
pub mod params;
mod registry;
mod regs;
pub mod virt;

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use disasm::DecodedInstr;
pub use error::{BridgeError, Result, WalkError};
pub use exec::{Executor, HaltExecutor, RunExit, StepOutcome, StopHandle};
pub use hook::{Branch, CacheCntrl, Hooks, ResetSource, TlbCntrl};
pub use params::{SimParam, SimParams};
pub use registry::{CoreRegistry, MAX_CORES};

pub use vbridge_mem as mem;
pub use vbridge_state as state;
