use thiserror::Error;
use vbridge_mem::MemoryError;
use vbridge_state::PagingMode;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("core id {id} out of range (max {max})")]
    CoreIdOutOfRange { id: usize, max: usize },

    #[error("core {id} already exists")]
    SlotOccupied { id: usize },

    #[error("core {id} does not exist")]
    CoreNotFound { id: usize },

    #[error("unsupported operation: {op}")]
    Unsupported { op: &'static str },

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error("unknown simulator parameter {name:?}")]
    UnknownParam { name: String },

    #[error("simulator parameter {name:?} is not a {expected} parameter")]
    ParamKind { name: String, expected: &'static str },

    #[error("value {value} for {name:?} outside {min}..={max}")]
    ParamOutOfRange {
        name: String,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("{choice:?} is not a valid choice for {name:?}")]
    InvalidChoice { name: String, choice: String },

    #[error(transparent)]
    Walk(#[from] WalkError),
}

/// Failure to translate a guest-virtual address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalkError {
    #[error("PML4E not present for {vaddr:#x}")]
    Pml4eNotPresent { vaddr: u64 },

    #[error("PDPTE not present for {vaddr:#x}")]
    PdpteNotPresent { vaddr: u64 },

    #[error("PDE not present for {vaddr:#x}")]
    PdeNotPresent { vaddr: u64 },

    #[error("PTE not present for {vaddr:#x}")]
    PteNotPresent { vaddr: u64 },

    #[error("{vaddr:#x} is not canonical")]
    NonCanonical { vaddr: u64 },

    #[error("{mode:?} paging is not walked")]
    UnsupportedPaging { mode: PagingMode },

    #[error(transparent)]
    Memory(#[from] MemoryError),
}
