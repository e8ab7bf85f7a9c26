use vbridge_state::CpuState;

use crate::error::{BridgeError, Result};

/// Number of core slots. Core ids are `0..MAX_CORES`.
pub const MAX_CORES: usize = 16;

/// Fixed table of owned per-core state.
///
/// A slot is either empty or holds the only `CpuState` for that id. Nothing outside the
/// registry keeps a reference across calls.
#[derive(Debug)]
pub struct CoreRegistry {
    slots: [Option<Box<CpuState>>; MAX_CORES],
}

impl Default for CoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreRegistry {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    fn check_range(id: usize) -> Result<()> {
        if id >= MAX_CORES {
            return Err(BridgeError::CoreIdOutOfRange { id, max: MAX_CORES });
        }
        Ok(())
    }

    /// Fails if `id` is out of range or already occupied.
    pub fn check_vacant(&self, id: usize) -> Result<()> {
        Self::check_range(id)?;
        if self.slots[id].is_some() {
            return Err(BridgeError::SlotOccupied { id });
        }
        Ok(())
    }

    pub fn allocate(&mut self, id: usize, cpu: Box<CpuState>) -> Result<&mut CpuState> {
        self.check_vacant(id)?;
        Ok(self.slots[id].insert(cpu))
    }

    pub fn lookup(&self, id: usize) -> Result<&CpuState> {
        Self::check_range(id)?;
        self.slots[id]
            .as_deref()
            .ok_or(BridgeError::CoreNotFound { id })
    }

    pub fn lookup_mut(&mut self, id: usize) -> Result<&mut CpuState> {
        Self::check_range(id)?;
        self.slots[id]
            .as_deref_mut()
            .ok_or(BridgeError::CoreNotFound { id })
    }

    /// Empties the slot and hands back its state for teardown.
    pub fn release(&mut self, id: usize) -> Result<Box<CpuState>> {
        Self::check_range(id)?;
        self.slots[id].take().ok_or(BridgeError::CoreNotFound { id })
    }

    pub fn is_live(&self, id: usize) -> bool {
        self.lookup(id).is_ok()
    }

    /// Ids of occupied slots, ascending.
    pub fn live_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|_| id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_rejects_bad_ids() {
        let mut reg = CoreRegistry::new();
        reg.allocate(1, Box::new(CpuState::new(1))).unwrap();
        assert_eq!(
            reg.allocate(1, Box::new(CpuState::new(1))).err(),
            Some(BridgeError::SlotOccupied { id: 1 })
        );
        assert_eq!(
            reg.allocate(MAX_CORES, Box::new(CpuState::new(MAX_CORES)))
                .err(),
            Some(BridgeError::CoreIdOutOfRange {
                id: MAX_CORES,
                max: MAX_CORES
            })
        );
    }

    #[test]
    fn release_empties_slot() {
        let mut reg = CoreRegistry::new();
        reg.allocate(0, Box::new(CpuState::new(0))).unwrap();
        reg.allocate(5, Box::new(CpuState::new(5))).unwrap();
        assert_eq!(reg.live_ids().collect::<Vec<_>>(), vec![0, 5]);

        let cpu = reg.release(5).unwrap();
        assert_eq!(cpu.id(), 5);
        assert!(!reg.is_live(5));
        assert_eq!(
            reg.lookup(5).err(),
            Some(BridgeError::CoreNotFound { id: 5 })
        );
        assert_eq!(
            reg.release(5).err(),
            Some(BridgeError::CoreNotFound { id: 5 })
        );
    }
}
