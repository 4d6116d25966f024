//! In-memory block device implementation

use crate::filesys::{BlockDevice, FsError, SECTOR_SIZE};
use alloc::vec;
use alloc::vec::Vec;
use core::result::Result;

/// Block device that stores sectors in memory
///
/// Besides backing host tools and tests, it can be told to fail specific
/// operations so error paths can be exercised.
pub struct MemoryBlockDevice {
    /// Sector contents
    sectors: Vec<[u8; SECTOR_SIZE]>,

    /// Value reported by `is_ready`
    ready: bool,

    /// Sector whose reads fail
    fail_read_sector: Option<u32>,

    /// Sector whose writes fail
    fail_write_sector: Option<u32>,

    /// Number of writes that still succeed before every write fails
    writes_left: Option<usize>,

    /// Completed sector reads
    reads: usize,

    /// Completed sector writes
    writes: usize,
}

impl MemoryBlockDevice {
    /// Creates a zero-filled device with given number of sectors
    pub fn new(total_sectors: u32) -> Self {
        Self {
            sectors: vec![[0; SECTOR_SIZE]; total_sectors as usize],
            ready: true,
            fail_read_sector: None,
            fail_write_sector: None,
            writes_left: None,
            reads: 0,
            writes: 0,
        }
    }

    /// Creates a device from a raw image, zero-padding the final sector
    pub fn from_image(image: &[u8]) -> Self {
        let mut device = Self::new(image.len().div_ceil(SECTOR_SIZE) as u32);
        for (sector, chunk) in device.sectors.iter_mut().zip(image.chunks(SECTOR_SIZE)) {
            sector[..chunk.len()].copy_from_slice(chunk);
        }
        device
    }

    pub fn total_sectors(&self) -> u32 {
        self.sectors.len() as u32
    }

    /// Direct view of a sector, bypassing fault injection
    pub fn sector(&self, sector: u32) -> &[u8; SECTOR_SIZE] {
        &self.sectors[sector as usize]
    }

    /// Direct mutable view of a sector, bypassing fault injection
    pub fn sector_mut(&mut self, sector: u32) -> &mut [u8; SECTOR_SIZE] {
        &mut self.sectors[sector as usize]
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Makes every read of `sector` fail
    pub fn fail_reads_of(&mut self, sector: Option<u32>) {
        self.fail_read_sector = sector;
    }

    /// Makes every write of `sector` fail
    pub fn fail_writes_of(&mut self, sector: Option<u32>) {
        self.fail_write_sector = sector;
    }

    /// Lets `count` more writes through, then fails all following writes
    pub fn fail_writes_after(&mut self, count: Option<usize>) {
        self.writes_left = count;
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Validates sector number is within bounds
    fn validate_sector(&self, sector: u32) -> Result<usize, FsError> {
        if sector as usize >= self.sectors.len() {
            return Err(FsError::Io);
        }
        Ok(sector as usize)
    }
}

impl BlockDevice for MemoryBlockDevice {
    fn read_sector(&mut self, sector: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<(), FsError> {
        let index = self.validate_sector(sector)?;
        if self.fail_read_sector == Some(sector) {
            return Err(FsError::Io);
        }
        buf.copy_from_slice(&self.sectors[index]);
        self.reads += 1;
        Ok(())
    }

    fn write_sector(&mut self, sector: u32, buf: &[u8; SECTOR_SIZE]) -> Result<(), FsError> {
        let index = self.validate_sector(sector)?;
        if self.fail_write_sector == Some(sector) {
            return Err(FsError::Io);
        }
        match self.writes_left {
            Some(0) => return Err(FsError::Io),
            Some(ref mut left) => *left -= 1,
            None => {}
        }
        self.sectors[index].copy_from_slice(buf);
        self.writes += 1;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}
