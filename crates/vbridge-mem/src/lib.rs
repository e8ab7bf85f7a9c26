//! Guest physical memory as seen by an emulated core.
//!
//! [`PhysMemory`] holds sparse host-backed 4 KiB pages and MMIO windows. Two access paths sit on
//! top of the same pages:
//!
//! - [`PhysMemory::translate`]: a direct host slice for RAM (or ROM, for reads), or `None`
//! - [`PhysMemory::read_page`] / [`PhysMemory::write_page`]: bounded copies that also reach MMIO
//!   handlers and the missing-page handler
//!
//! A `None` from `translate` is a normal outcome; callers fall back to the copy path.

#![forbid(unsafe_code)]

mod error;
mod mmio;
mod phys;

pub use error::{MemoryError, Result};
pub use mmio::MmioHandler;
pub use phys::{
    zeroed_page, HostSpan, MemAccess, MemoryOptions, MissingPageHandler, Page, PhysMemory,
    PAGE_SIZE,
};
