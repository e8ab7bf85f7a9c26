use vbridge_mem::MemoryOptions;

use crate::params::SimParams;

/// Construction-time settings for a [`crate::Bridge`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeConfig {
    pub params: SimParams,
    pub memory: MemoryOptions,
}
