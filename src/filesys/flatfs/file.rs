use super::record::FlatName;
use crate::filesys::{FsError, SeekFrom};

/// Open file of the flat filesystem
///
/// The handle caches the header of its sector. `close` and `delete` take
/// it by value, so a handle can't outlive its file through the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatFile {
    pub(crate) name: FlatName,
    pub(crate) timestamp: u32,
    pub(crate) sector: u32,
    pub(crate) size: u32,
    /// Read cursor
    pub(crate) position: u32,
}

impl FlatFile {
    pub fn name(&self) -> &FlatName {
        &self.name
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn sector(&self) -> u32 {
        self.sector
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<u32, FsError> {
        self.position = pos.resolve(self.position, self.size)?;
        Ok(self.position)
    }
}
