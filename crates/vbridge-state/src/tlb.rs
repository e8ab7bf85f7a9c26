//! Linear-to-physical translation cache.
//!
//! A small direct-mapped cache of 4 KiB translations. The long-mode page walker fills it;
//! the synchronizer empties it whenever control state changes under it.

pub const TLB_ENTRIES: usize = 64;

const PAGE_SHIFT: u32 = 12;
const PAGE_MASK: u64 = (1 << PAGE_SHIFT) - 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TlbEntryFlags {
    pub writable: bool,
    pub user: bool,
    pub nx: bool,
    pub global: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TlbEntry {
    vbase: u64,
    pbase: u64,
    flags: TlbEntryFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlbHit {
    pub paddr: u64,
    pub flags: TlbEntryFlags,
}

#[derive(Debug, Clone)]
pub struct TranslationCache {
    entries: [Option<TlbEntry>; TLB_ENTRIES],
    flushes: u64,
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn slot(vaddr: u64) -> usize {
    ((vaddr >> PAGE_SHIFT) as usize) % TLB_ENTRIES
}

impl TranslationCache {
    pub fn new() -> Self {
        Self {
            entries: [None; TLB_ENTRIES],
            flushes: 0,
        }
    }

    pub fn lookup(&self, vaddr: u64) -> Option<TlbHit> {
        let entry = self.entries[slot(vaddr)]?;
        if entry.vbase != vaddr & !PAGE_MASK {
            return None;
        }
        Some(TlbHit {
            paddr: entry.pbase | (vaddr & PAGE_MASK),
            flags: entry.flags,
        })
    }

    /// Caches the translation of the 4 KiB page containing `vaddr`, evicting whatever shared its
    /// slot.
    pub fn insert(&mut self, vaddr: u64, paddr: u64, flags: TlbEntryFlags) {
        self.entries[slot(vaddr)] = Some(TlbEntry {
            vbase: vaddr & !PAGE_MASK,
            pbase: paddr & !PAGE_MASK,
            flags,
        });
    }

    /// INVLPG.
    pub fn invalidate(&mut self, vaddr: u64) {
        let idx = slot(vaddr);
        if matches!(self.entries[idx], Some(e) if e.vbase == vaddr & !PAGE_MASK) {
            self.entries[idx] = None;
        }
    }

    pub fn flush_all(&mut self) {
        self.entries = [None; TLB_ENTRIES];
        self.flushes += 1;
    }

    /// MOV to CR3 without PCID: global pages survive.
    pub fn flush_non_global(&mut self) {
        for entry in &mut self.entries {
            if matches!(entry, Some(e) if !e.flags.global) {
                *entry = None;
            }
        }
        self.flushes += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of full or non-global flushes since the cache was created.
    pub fn flush_count(&self) -> u64 {
        self.flushes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_preserves_page_offset() {
        let mut tlb = TranslationCache::new();
        tlb.insert(0x7FFF_1234, 0x0020_0000, TlbEntryFlags::default());
        let hit = tlb.lookup(0x7FFF_1ABC).unwrap();
        assert_eq!(hit.paddr, 0x0020_0ABC);
        assert!(tlb.lookup(0x7FFF_2000).is_none());
    }

    #[test]
    fn aliasing_pages_evict_each_other() {
        let mut tlb = TranslationCache::new();
        let stride = (TLB_ENTRIES as u64) << PAGE_SHIFT;
        tlb.insert(0x1000, 0xA000, TlbEntryFlags::default());
        tlb.insert(0x1000 + stride, 0xB000, TlbEntryFlags::default());
        assert!(tlb.lookup(0x1000).is_none());
        assert_eq!(tlb.lookup(0x1000 + stride).unwrap().paddr, 0xB000);
    }

    #[test]
    fn invalidate_only_drops_matching_page() {
        let mut tlb = TranslationCache::new();
        let stride = (TLB_ENTRIES as u64) << PAGE_SHIFT;
        tlb.insert(0x1000, 0xA000, TlbEntryFlags::default());
        tlb.invalidate(0x1000 + stride);
        assert!(tlb.lookup(0x1000).is_some());
        tlb.invalidate(0x1FFF);
        assert!(tlb.is_empty());
    }

    #[test]
    fn non_global_flush_keeps_global_pages() {
        let mut tlb = TranslationCache::new();
        let global = TlbEntryFlags {
            global: true,
            ..TlbEntryFlags::default()
        };
        tlb.insert(0xFFFF_8000_0000_0000, 0x1000, global);
        tlb.insert(0x0000_0000_0040_1000, 0x2000, TlbEntryFlags::default());

        tlb.flush_non_global();
        assert_eq!(tlb.len(), 1);
        assert!(tlb.lookup(0xFFFF_8000_0000_0000).is_some());

        tlb.flush_all();
        assert!(tlb.is_empty());
        assert_eq!(tlb.flush_count(), 2);
    }
}
