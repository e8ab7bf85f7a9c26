use std::ops::Range;
use std::sync::Arc;

/// Device model behind a physical MMIO window. Offsets are relative to the window start.
pub trait MmioHandler: Send + Sync {
    fn read(&self, offset: u64, data: &mut [u8]);
    fn write(&self, offset: u64, data: &[u8]);
}

#[derive(Clone)]
pub(crate) struct MmioRegion {
    pub(crate) range: Range<u64>,
    pub(crate) handler: Arc<dyn MmioHandler>,
}

impl MmioRegion {
    pub(crate) fn overlaps(&self, other: &Range<u64>) -> bool {
        self.range.start < other.end && other.start < self.range.end
    }

    /// True if any byte of `[paddr, paddr + len)` falls inside the window.
    pub(crate) fn touches(&self, paddr: u64, len: usize) -> bool {
        let end = paddr.saturating_add(len.max(1) as u64);
        self.overlaps(&(paddr..end))
    }
}

impl std::fmt::Debug for MmioRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmioRegion")
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}
