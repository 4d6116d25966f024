//! FAT16 file allocation table entry

use super::constants::{END_OF_CHAIN, END_OF_CHAIN_MIN, FIRST_DATA_CLUSTER};

/// Represents a 16-bit FAT entry pointing to the next cluster in a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatEntry {
    /// Cluster number or special value (0=free, >=0xFFF0=end)
    pub cluster: u16,
}

impl FatEntry {
    pub const FREE: FatEntry = FatEntry { cluster: 0 };
    pub const END: FatEntry = FatEntry {
        cluster: END_OF_CHAIN,
    };

    /// Returns true if this entry marks the end of a cluster chain
    pub fn is_end_of_chain(&self) -> bool {
        self.cluster >= END_OF_CHAIN_MIN
    }

    /// Returns true if this cluster is unused/free
    pub fn is_free(&self) -> bool {
        self.cluster == 0
    }

    /// Returns the next cluster if this entry links to one
    pub fn next(&self) -> Option<u16> {
        if self.is_end_of_chain() || self.cluster < FIRST_DATA_CLUSTER {
            None
        } else {
            Some(self.cluster)
        }
    }
}

impl From<u16> for FatEntry {
    fn from(cluster: u16) -> Self {
        FatEntry { cluster }
    }
}
