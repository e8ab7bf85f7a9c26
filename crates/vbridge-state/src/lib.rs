//! Architectural state of an emulated x86-64 core.
//!
//! - [`ArchState`]: the complete register image, all-zero by default
//! - [`CpuState`]: one core, pairing the image with its derived execution mode and
//!   [`TranslationCache`]
//! - [`VectorTier`]: the build-time vector width (`avx` / `evex` features)
//!
//! Register groups apply the architectural reserved-bit masks on write; see [`control`].

pub mod control;
pub mod fpu;
pub mod mode;
pub mod msr;
pub mod regs;
pub mod segment;
mod state;
pub mod tlb;
pub mod vector;

pub use control::{ApicState, ControlState, Cr0, Cr4, DebugState, Efer, Xcr0};
pub use fpu::{Float80, FpState};
pub use mode::{CpuMode, DerivedMode, FpuGates, PagingMode};
pub use msr::MsrState;
pub use regs::{Gpr, RegisterFile};
pub use segment::{DescriptorTableRegister, SegReg, SegmentDescriptor};
pub use state::{ArchState, CoreIdentity, CpuState};
pub use tlb::{TlbEntryFlags, TlbHit, TranslationCache};
pub use vector::{VectorFile, VectorRegister, VectorTier, VECTOR_WORDS};
