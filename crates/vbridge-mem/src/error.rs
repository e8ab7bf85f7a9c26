use thiserror::Error;

pub type Result<T> = std::result::Result<T, MemoryError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("access at {paddr:#x} of {len} bytes crosses a page boundary")]
    CrossesPage { paddr: u64, len: usize },

    #[error("no page backs physical address {paddr:#x}")]
    Unmapped { paddr: u64 },

    #[error("write to read-only page at {paddr:#x}")]
    ReadOnly { paddr: u64 },

    #[error("physical address {paddr:#x} is not page aligned")]
    Misaligned { paddr: u64 },

    #[error("access at {paddr:#x} of {len} bytes straddles the edge of an MMIO window")]
    MmioBoundary { paddr: u64, len: usize },

    #[error("MMIO window {start:#x}..{end:#x} overlaps an existing window")]
    Overlap { start: u64, end: u64 },
}
