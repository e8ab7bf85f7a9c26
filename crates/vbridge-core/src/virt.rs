//! Guest-virtual to guest-physical translation.
//!
//! Only 4-level long-mode paging is walked. Successful walks are cached in the core's
//! [`vbridge_state::TranslationCache`] at 4 KiB granularity, including pieces of 2 MiB and 1 GiB
//! pages. Accessed and dirty bits are not updated and permissions are not checked.

use vbridge_mem::PhysMemory;
use vbridge_state::{CpuState, Cr4, Efer, PagingMode, TlbEntryFlags};

use crate::error::WalkError;

const PTE_P: u64 = 1 << 0;
const PTE_RW: u64 = 1 << 1;
const PTE_US: u64 = 1 << 2;
const PTE_PS: u64 = 1 << 7;
const PTE_G: u64 = 1 << 8;
const PTE_NX: u64 = 1 << 63;

const ADDR_MASK: u64 = 0x000F_FFFF_FFFF_F000;

#[inline]
fn is_canonical_48(vaddr: u64) -> bool {
    (((vaddr >> 47).wrapping_add(1)) & 0x1fffe) == 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Pml4,
    Pdpt,
    Pd,
    Pt,
}

impl Level {
    fn shift(self) -> u32 {
        match self {
            Level::Pml4 => 39,
            Level::Pdpt => 30,
            Level::Pd => 21,
            Level::Pt => 12,
        }
    }

    fn not_present(self, vaddr: u64) -> WalkError {
        match self {
            Level::Pml4 => WalkError::Pml4eNotPresent { vaddr },
            Level::Pdpt => WalkError::PdpteNotPresent { vaddr },
            Level::Pd => WalkError::PdeNotPresent { vaddr },
            Level::Pt => WalkError::PteNotPresent { vaddr },
        }
    }
}

/// Effective permissions accumulated down the walk.
struct Walk {
    vaddr: u64,
    nx_enabled: bool,
    pge: bool,
    flags: TlbEntryFlags,
}

impl Walk {
    fn entry(
        &mut self,
        mem: &mut PhysMemory,
        table: u64,
        level: Level,
    ) -> Result<u64, WalkError> {
        let index = (self.vaddr >> level.shift()) & 0x1ff;
        let entry = mem.read_u64((table & ADDR_MASK) + index * 8)?;
        if entry & PTE_P == 0 {
            return Err(level.not_present(self.vaddr));
        }
        self.flags.writable &= entry & PTE_RW != 0;
        self.flags.user &= entry & PTE_US != 0;
        self.flags.nx |= self.nx_enabled && entry & PTE_NX != 0;
        Ok(entry)
    }

    fn leaf(&mut self, entry: u64, level: Level) -> u64 {
        self.flags.global = self.pge && entry & PTE_G != 0;
        let mask = (1u64 << level.shift()) - 1;
        (entry & ADDR_MASK & !mask) | (self.vaddr & mask)
    }
}

fn walk_long4(
    cpu: &CpuState,
    mem: &mut PhysMemory,
    vaddr: u64,
) -> Result<(u64, TlbEntryFlags), WalkError> {
    let control = &cpu.arch().control;
    let mut walk = Walk {
        vaddr,
        nx_enabled: control.efer_flags().contains(Efer::NXE),
        pge: control.cr4_flags().contains(Cr4::PGE),
        flags: TlbEntryFlags {
            writable: true,
            user: true,
            nx: false,
            global: false,
        },
    };

    let pml4e = walk.entry(mem, control.cr3(), Level::Pml4)?;
    let pdpte = walk.entry(mem, pml4e, Level::Pdpt)?;
    if pdpte & PTE_PS != 0 {
        return Ok((walk.leaf(pdpte, Level::Pdpt), walk.flags));
    }
    let pde = walk.entry(mem, pdpte, Level::Pd)?;
    if pde & PTE_PS != 0 {
        return Ok((walk.leaf(pde, Level::Pd), walk.flags));
    }
    let pte = walk.entry(mem, pde, Level::Pt)?;
    Ok((walk.leaf(pte, Level::Pt), walk.flags))
}

/// Translates `vaddr` under the core's current paging mode.
///
/// With paging disabled the address is truncated to 32 bits. Legacy and PAE paging are not
/// walked and report [`WalkError::UnsupportedPaging`].
pub fn translate(
    cpu: &mut CpuState,
    mem: &mut PhysMemory,
    vaddr: u64,
) -> Result<u64, WalkError> {
    match cpu.derived().paging {
        PagingMode::Disabled => return Ok(vaddr & 0xFFFF_FFFF),
        PagingMode::Long4 => {}
        mode => return Err(WalkError::UnsupportedPaging { mode }),
    }
    if !is_canonical_48(vaddr) {
        return Err(WalkError::NonCanonical { vaddr });
    }
    if let Some(hit) = cpu.tlb().lookup(vaddr) {
        return Ok(hit.paddr);
    }

    let (paddr, flags) = walk_long4(cpu, mem, vaddr)?;
    tracing::trace!(
        core = cpu.id(),
        vaddr = format_args!("{vaddr:#x}"),
        paddr = format_args!("{paddr:#x}"),
        "page walk"
    );
    cpu.tlb_mut().insert(vaddr, paddr, flags);
    Ok(paddr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_boundaries() {
        assert!(is_canonical_48(0x0000_7FFF_FFFF_FFFF));
        assert!(is_canonical_48(0xFFFF_8000_0000_0000));
        assert!(!is_canonical_48(0x0000_8000_0000_0000));
        assert!(!is_canonical_48(0xFFFF_7FFF_FFFF_FFFF));
    }

    #[test]
    fn leaf_keeps_offset_below_page_size() {
        let mut walk = Walk {
            vaddr: 0x0000_0040_1234_5678,
            nx_enabled: false,
            pge: true,
            flags: TlbEntryFlags::default(),
        };
        // 1 GiB leaf at 0x8000_0000 with G set.
        let paddr = walk.leaf(0x8000_0000 | PTE_P | PTE_PS | PTE_G, Level::Pdpt);
        assert_eq!(paddr, 0x8000_0000 | 0x1234_5678);
        assert!(walk.flags.global);
    }
}
