//! Open file handle on a FAT16 volume

use super::name::ShortName;
use crate::filesys::{FsError, SeekFrom};

/// Cluster reached while following a chain, with its position in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ClusterCursor {
    pub cluster: u16,
    pub index: u32,
}

/// Represents an open file on a FAT16 filesystem
///
/// Handles are plain values owned by the caller; every operation on them goes
/// through the [`Fat16`](super::Fat16) session that opened them.
#[derive(Debug, Clone)]
pub struct Fat16File {
    /// Normalized 8.3 name
    pub(crate) name: ShortName,

    /// Head of the cluster chain, 0 for an empty file without clusters
    pub(crate) first_cluster: u16,

    /// Tail of the cluster chain
    pub(crate) last_cluster: u16,

    /// Total file size in bytes
    pub(crate) size: u32,

    /// Current read position in file
    pub(crate) position: u32,

    /// Slot of the directory entry in the root directory
    pub(crate) dir_index: u16,

    /// Last cluster visited by a read
    pub(crate) cursor: ClusterCursor,
}

impl Fat16File {
    pub(crate) fn new(
        name: ShortName,
        first_cluster: u16,
        last_cluster: u16,
        size: u32,
        dir_index: u16,
    ) -> Self {
        Self {
            name,
            first_cluster,
            last_cluster,
            size,
            position: 0,
            dir_index,
            cursor: ClusterCursor {
                cluster: first_cluster,
                index: 0,
            },
        }
    }

    pub fn name(&self) -> &ShortName {
        &self.name
    }

    pub fn first_cluster(&self) -> u16 {
        self.first_cluster
    }

    pub fn last_cluster(&self) -> u16 {
        self.last_cluster
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn dir_index(&self) -> u16 {
        self.dir_index
    }

    /// Moves the read position; targets past the end of file are rejected
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u32, FsError> {
        self.position = pos.resolve(self.position, self.size)?;
        Ok(self.position)
    }
}
