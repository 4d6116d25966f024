//! Single-sector working buffer owned by a filesystem session

use super::{BlockDevice, FsError, SECTOR_SIZE};

/// Holds at most one sector and remembers which sector that is.
///
/// Every filesystem operation goes through its session's buffer, so an
/// instance never needs more than `SECTOR_SIZE` bytes of working memory.
pub struct SectorBuffer {
    data: [u8; SECTOR_SIZE],
    /// Sector whose on-disk contents equal `data`, if any
    resident: Option<u32>,
}

impl Default for SectorBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SectorBuffer {
    pub const fn new() -> Self {
        Self {
            data: [0; SECTOR_SIZE],
            resident: None,
        }
    }

    pub fn resident(&self) -> Option<u32> {
        self.resident
    }

    /// Returns `sector`, reading it from the device unless already resident
    pub fn load<D: BlockDevice>(
        &mut self,
        device: &mut D,
        sector: u32,
    ) -> Result<&[u8; SECTOR_SIZE], FsError> {
        if self.resident != Some(sector) {
            self.resident = None;
            device.read_sector(sector, &mut self.data)?;
            self.resident = Some(sector);
        }
        Ok(&self.data)
    }

    /// Loads `sector`, applies `f` to it and writes it back
    pub fn update<D, F, R>(&mut self, device: &mut D, sector: u32, f: F) -> Result<R, FsError>
    where
        D: BlockDevice,
        F: FnOnce(&mut [u8; SECTOR_SIZE]) -> R,
    {
        self.load(device, sector)?;
        self.resident = None;
        let result = f(&mut self.data);
        self.store(device, sector)?;
        Ok(result)
    }

    /// Fills the buffer with `byte`, applies `f` and writes it to `sector`
    /// without reading the old contents first
    pub fn overwrite<D, F>(&mut self, device: &mut D, sector: u32, byte: u8, f: F) -> Result<(), FsError>
    where
        D: BlockDevice,
        F: FnOnce(&mut [u8; SECTOR_SIZE]),
    {
        self.resident = None;
        self.data.fill(byte);
        f(&mut self.data);
        self.store(device, sector)
    }

    /// Writes the buffer to `sector` as-is
    ///
    /// Used to mirror a freshly written sector to another location, e.g. the
    /// second allocation table.
    pub fn store<D: BlockDevice>(&mut self, device: &mut D, sector: u32) -> Result<(), FsError> {
        let previous = self.resident.take();
        device.write_sector(sector, &self.data)?;
        // A mirror write leaves the originally resident sector valid as well
        self.resident = match previous {
            Some(resident) if resident != sector => Some(resident),
            _ => Some(sector),
        };
        Ok(())
    }
}
