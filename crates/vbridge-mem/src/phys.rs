use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use crate::error::{MemoryError, Result};
use crate::mmio::{MmioHandler, MmioRegion};

pub const PAGE_SIZE: usize = 4096;
const PAGE_SHIFT: u32 = 12;
const PAGE_MASK: u64 = PAGE_SIZE as u64 - 1;

/// Host backing for one guest page.
pub type Page = Box<[u8; PAGE_SIZE]>;

/// Supplies a page for a guest physical page number the first time the copy path touches it.
/// Returning `None` leaves the page unmapped.
pub type MissingPageHandler = Box<dyn FnMut(u64) -> Option<Page> + Send>;

pub fn zeroed_page() -> Page {
    Box::new([0u8; PAGE_SIZE])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemAccess {
    Read,
    Write,
    Execute,
}

/// Direct view of host memory backing a guest physical address, running to the end of its
/// page.
#[derive(Debug)]
pub enum HostSpan<'a> {
    Read(&'a [u8]),
    Write(&'a mut [u8]),
}

impl HostSpan<'_> {
    pub fn len(&self) -> usize {
        match self {
            HostSpan::Read(s) => s.len(),
            HostSpan::Write(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        match self {
            HostSpan::Read(s) => s,
            HostSpan::Write(s) => s,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryOptions {
    /// Physical address width. Addresses at or above `1 << max_phys_bits` are never backed.
    pub max_phys_bits: u32,
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self { max_phys_bits: 52 }
    }
}

#[derive(Debug)]
struct MappedPage {
    data: Page,
    writable: bool,
}

/// Sparse guest physical memory made of host-backed 4 KiB pages plus MMIO windows.
///
/// [`PhysMemory::read_page`] / [`PhysMemory::write_page`] are the authoritative access path and
/// reach MMIO handlers and the missing-page handler. [`PhysMemory::translate`] is a shortcut that
/// only ever hands out pages that are already mapped as plain RAM (or ROM for reads).
pub struct PhysMemory {
    pages: HashMap<u64, MappedPage>,
    mmio: Vec<MmioRegion>,
    missing_page: Option<MissingPageHandler>,
    options: MemoryOptions,
}

impl std::fmt::Debug for PhysMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysMemory")
            .field("pages", &self.pages.len())
            .field("mmio", &self.mmio)
            .field("missing_page", &self.missing_page.is_some())
            .field("options", &self.options)
            .finish()
    }
}

impl Default for PhysMemory {
    fn default() -> Self {
        Self::new(MemoryOptions::default())
    }
}

impl PhysMemory {
    pub fn new(options: MemoryOptions) -> Self {
        Self {
            pages: HashMap::new(),
            mmio: Vec::new(),
            missing_page: None,
            options,
        }
    }

    pub fn options(&self) -> &MemoryOptions {
        &self.options
    }

    #[inline]
    fn in_range(&self, paddr: u64) -> bool {
        self.options.max_phys_bits >= 64 || paddr >> self.options.max_phys_bits == 0
    }

    fn check_page_base(&self, gpa: u64) -> Result<u64> {
        if gpa & PAGE_MASK != 0 {
            return Err(MemoryError::Misaligned { paddr: gpa });
        }
        if !self.in_range(gpa) {
            return Err(MemoryError::Unmapped { paddr: gpa });
        }
        Ok(gpa >> PAGE_SHIFT)
    }

    /// Maps a writable page at `gpa`, replacing any previous mapping.
    pub fn map_page(&mut self, gpa: u64, data: Page) -> Result<()> {
        let pfn = self.check_page_base(gpa)?;
        self.pages.insert(
            pfn,
            MappedPage {
                data,
                writable: true,
            },
        );
        Ok(())
    }

    pub fn map_rom_page(&mut self, gpa: u64, data: Page) -> Result<()> {
        let pfn = self.check_page_base(gpa)?;
        self.pages.insert(
            pfn,
            MappedPage {
                data,
                writable: false,
            },
        );
        Ok(())
    }

    pub fn unmap_page(&mut self, gpa: u64) -> Option<Page> {
        self.pages.remove(&(gpa >> PAGE_SHIFT)).map(|p| p.data)
    }

    pub fn is_mapped(&self, paddr: u64) -> bool {
        self.pages.contains_key(&(paddr >> PAGE_SHIFT))
    }

    pub fn mapped_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn register_mmio(
        &mut self,
        range: Range<u64>,
        handler: Arc<dyn MmioHandler>,
    ) -> Result<()> {
        if range.is_empty() || self.mmio.iter().any(|r| r.overlaps(&range)) {
            return Err(MemoryError::Overlap {
                start: range.start,
                end: range.end,
            });
        }
        self.mmio.push(MmioRegion { range, handler });
        Ok(())
    }

    pub fn set_missing_page_handler(&mut self, handler: MissingPageHandler) {
        self.missing_page = Some(handler);
    }

    pub fn clear_missing_page_handler(&mut self) {
        self.missing_page = None;
    }

    fn mmio_at(&self, paddr: u64, len: usize) -> Option<&MmioRegion> {
        self.mmio.iter().find(|r| r.touches(paddr, len))
    }

    /// Direct host view of `paddr` through the end of its page, or up to the first MMIO window
    /// that starts later in the same page.
    ///
    /// Returns `None` for MMIO, unmapped pages, writes to ROM and addresses beyond the
    /// physical address width. The caller then falls back to the page-copy path. This never
    /// consults the missing-page handler.
    pub fn translate(&mut self, paddr: u64, access: MemAccess) -> Option<HostSpan<'_>> {
        if !self.in_range(paddr) || self.mmio_at(paddr, 1).is_some() {
            return None;
        }
        let offset = (paddr & PAGE_MASK) as usize;
        let end = offset + self.ram_run(paddr);
        let page = self.pages.get_mut(&(paddr >> PAGE_SHIFT))?;
        match access {
            MemAccess::Read | MemAccess::Execute => {
                Some(HostSpan::Read(&page.data[offset..end]))
            }
            MemAccess::Write if page.writable => {
                Some(HostSpan::Write(&mut page.data[offset..end]))
            }
            MemAccess::Write => None,
        }
    }

    /// Bytes from `paddr` to the end of its page or the next MMIO window, whichever is first.
    fn ram_run(&self, paddr: u64) -> usize {
        let page_end = (paddr & !PAGE_MASK) + PAGE_SIZE as u64;
        let end = self
            .mmio
            .iter()
            .map(|r| r.range.start)
            .filter(|&start| start > paddr && start < page_end)
            .min()
            .unwrap_or(page_end);
        (end - paddr) as usize
    }

    fn check_copy(&self, paddr: u64, len: usize) -> Result<()> {
        let offset = (paddr & PAGE_MASK) as usize;
        if offset + len > PAGE_SIZE {
            return Err(MemoryError::CrossesPage { paddr, len });
        }
        if !self.in_range(paddr) {
            return Err(MemoryError::Unmapped { paddr });
        }
        Ok(())
    }

    fn page_for_copy(&mut self, paddr: u64) -> Result<&mut MappedPage> {
        let pfn = paddr >> PAGE_SHIFT;
        if !self.pages.contains_key(&pfn) {
            let supplied = self.missing_page.as_mut().and_then(|handler| handler(pfn));
            let Some(data) = supplied else {
                tracing::trace!(paddr = format_args!("{paddr:#x}"), "unbacked physical page");
                return Err(MemoryError::Unmapped { paddr });
            };
            tracing::trace!(pfn = format_args!("{pfn:#x}"), "missing page supplied");
            self.pages.insert(
                pfn,
                MappedPage {
                    data,
                    writable: true,
                },
            );
        }
        self.pages
            .get_mut(&pfn)
            .ok_or(MemoryError::Unmapped { paddr })
    }

    /// Copies `out.len()` bytes starting at `paddr`. The range must stay within one page.
    pub fn read_page(&mut self, paddr: u64, out: &mut [u8]) -> Result<()> {
        self.check_copy(paddr, out.len())?;
        if let Some(region) = self.mmio_at(paddr, out.len()) {
            if paddr < region.range.start || paddr + out.len() as u64 > region.range.end {
                return Err(MemoryError::MmioBoundary {
                    paddr,
                    len: out.len(),
                });
            }
            region.handler.read(paddr - region.range.start, out);
            return Ok(());
        }
        let offset = (paddr & PAGE_MASK) as usize;
        let page = self.page_for_copy(paddr)?;
        out.copy_from_slice(&page.data[offset..offset + out.len()]);
        Ok(())
    }

    /// Copies `data` to `paddr`. The range must stay within one page.
    pub fn write_page(&mut self, paddr: u64, data: &[u8]) -> Result<()> {
        self.check_copy(paddr, data.len())?;
        if let Some(region) = self.mmio_at(paddr, data.len()) {
            if paddr < region.range.start || paddr + data.len() as u64 > region.range.end {
                return Err(MemoryError::MmioBoundary {
                    paddr,
                    len: data.len(),
                });
            }
            region.handler.write(paddr - region.range.start, data);
            return Ok(());
        }
        let offset = (paddr & PAGE_MASK) as usize;
        let page = self.page_for_copy(paddr)?;
        if !page.writable {
            return Err(MemoryError::ReadOnly { paddr });
        }
        page.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Like [`PhysMemory::read_page`] but splits at page boundaries.
    pub fn read_bytes(&mut self, paddr: u64, out: &mut [u8]) -> Result<()> {
        let mut done = 0;
        while done < out.len() {
            let addr = paddr.wrapping_add(done as u64);
            let chunk = (PAGE_SIZE - (addr & PAGE_MASK) as usize).min(out.len() - done);
            self.read_page(addr, &mut out[done..done + chunk])?;
            done += chunk;
        }
        Ok(())
    }

    pub fn write_bytes(&mut self, paddr: u64, data: &[u8]) -> Result<()> {
        let mut done = 0;
        while done < data.len() {
            let addr = paddr.wrapping_add(done as u64);
            let chunk = (PAGE_SIZE - (addr & PAGE_MASK) as usize).min(data.len() - done);
            self.write_page(addr, &data[done..done + chunk])?;
            done += chunk;
        }
        Ok(())
    }

    pub fn read_u64(&mut self, paddr: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_bytes(paddr, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    pub fn write_u64(&mut self, paddr: u64, val: u64) -> Result<()> {
        self.write_bytes(paddr, &val.to_le_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_spans_to_end_of_page() {
        let mut mem = PhysMemory::default();
        mem.map_page(0x3000, zeroed_page()).unwrap();

        let span = mem.translate(0x3FF0, MemAccess::Read).unwrap();
        assert_eq!(span.len(), 0x10);

        match mem.translate(0x3000, MemAccess::Write).unwrap() {
            HostSpan::Write(bytes) => bytes[5] = 0xAB,
            HostSpan::Read(_) => panic!("expected a writable span"),
        }
        let mut b = [0u8; 1];
        mem.read_page(0x3005, &mut b).unwrap();
        assert_eq!(b[0], 0xAB);
    }

    #[test]
    fn rom_is_readable_but_never_writable() {
        let mut page = zeroed_page();
        page[0] = 0xEA;
        let mut mem = PhysMemory::default();
        mem.map_rom_page(0xF_F000, page).unwrap();

        assert!(mem.translate(0xF_F000, MemAccess::Execute).is_some());
        assert!(mem.translate(0xF_F000, MemAccess::Write).is_none());
        assert_eq!(
            mem.write_page(0xF_F000, &[0]),
            Err(MemoryError::ReadOnly { paddr: 0xF_F000 })
        );
        assert_eq!(mem.read_u64(0xF_F000).unwrap(), 0xEA);
    }

    #[test]
    fn page_copies_reject_boundary_crossings() {
        let mut mem = PhysMemory::default();
        mem.map_page(0x1000, zeroed_page()).unwrap();
        mem.map_page(0x2000, zeroed_page()).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(
            mem.read_page(0x1FFC, &mut buf),
            Err(MemoryError::CrossesPage {
                paddr: 0x1FFC,
                len: 8
            })
        );
        mem.write_bytes(0x1FFC, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        mem.read_bytes(0x1FFC, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn addresses_beyond_phys_width_are_unbacked() {
        let mut mem = PhysMemory::new(MemoryOptions { max_phys_bits: 36 });
        assert_eq!(
            mem.map_page(1 << 36, zeroed_page()),
            Err(MemoryError::Unmapped { paddr: 1 << 36 })
        );
        assert!(mem.translate(1 << 36, MemAccess::Read).is_none());
        let mut buf = [0u8; 4];
        assert_eq!(
            mem.read_page(1 << 36, &mut buf),
            Err(MemoryError::Unmapped { paddr: 1 << 36 })
        );
    }

    #[test]
    fn map_requires_page_alignment() {
        let mut mem = PhysMemory::default();
        assert_eq!(
            mem.map_page(0x1001, zeroed_page()),
            Err(MemoryError::Misaligned { paddr: 0x1001 })
        );
    }
}
