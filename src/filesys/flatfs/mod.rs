//! Flat filesystem: one file per sector
//!
//! Every sector after the reserved sector 0 either holds a whole file of up
//! to 494 bytes or is free. There is no table and no directory; lookups scan
//! the sectors in order.

use super::buffer::SectorBuffer;
use super::{BlockDevice, FsError, OpenFlags};
use log::{debug, trace};

mod constants;
mod file;
mod record;

pub use constants::{DEFAULT_SECTOR_COUNT, MAX_FILE_SIZE};
use constants::*;
pub use file::FlatFile;
pub use record::{FlatName, RecordHeader, SectorKind};

/// Runtime layout of a flat volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatFsConfig {
    /// Number of sectors the filesystem may use, including sector 0
    pub sector_count: u32,
}

impl Default for FlatFsConfig {
    fn default() -> Self {
        Self {
            sector_count: DEFAULT_SECTOR_COUNT,
        }
    }
}

pub struct FlatFs<D: BlockDevice> {
    device: D,
    buffer: SectorBuffer,
    config: FlatFsConfig,
}

impl<D: BlockDevice> FlatFs<D> {
    pub fn new(device: D) -> Result<Self, FsError> {
        Self::with_config(device, FlatFsConfig::default())
    }

    pub fn with_config(device: D, config: FlatFsConfig) -> Result<Self, FsError> {
        if !device.is_ready() {
            return Err(FsError::NotReady);
        }
        debug!("flatfs: {} sectors", config.sector_count);
        Ok(FlatFs {
            device,
            buffer: SectorBuffer::new(),
            config,
        })
    }

    pub fn config(&self) -> &FlatFsConfig {
        &self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }

    /// Opens the file stored under `name`, creating an empty one unless
    /// [`OpenFlags::DONT_CREATE`] is given
    pub fn open(&mut self, name: &FlatName, flags: OpenFlags) -> Result<FlatFile, FsError> {
        if let Some(sector) = self.find(name)? {
            // find leaves the matching sector resident
            let header = self.header(sector)?;
            let (_, size) = header.validate()?;
            debug!("flatfs: opened {} at sector {}, {} bytes", name, sector, size);
            return Ok(FlatFile {
                name: name.clone(),
                timestamp: header.timestamp,
                sector,
                size,
                position: 0,
            });
        }

        if flags.contains(OpenFlags::DONT_CREATE) {
            return Err(FsError::NotFound);
        }

        let sector = self.find_free_sector()?.ok_or(FsError::NoSpace)?;
        let header = RecordHeader::new_file(name);
        self.buffer
            .overwrite(&mut self.device, sector, 0, |data| header.encode(data))?;
        debug!("flatfs: created {} at sector {}", name, sector);

        Ok(FlatFile {
            name: name.clone(),
            timestamp: 0,
            sector,
            size: 0,
            position: 0,
        })
    }

    /// Returns the sector holding `name`
    pub fn find(&mut self, name: &FlatName) -> Result<Option<u32>, FsError> {
        for sector in self.file_sectors(0) {
            if self.header(sector)?.holds(name) {
                return Ok(Some(sector));
            }
        }
        Ok(None)
    }

    /// Returns the first sector not holding a file
    pub fn find_free_sector(&mut self) -> Result<Option<u32>, FsError> {
        for sector in self.file_sectors(0) {
            if !self.header(sector)?.is_file() {
                return Ok(Some(sector));
            }
        }
        Ok(None)
    }

    /// Appends `data` to the file
    ///
    /// Nothing is written when the result would not fit in the sector.
    pub fn write(&mut self, file: &mut FlatFile, data: &[u8]) -> Result<usize, FsError> {
        if data.is_empty() {
            return Ok(0);
        }

        let mut header = self.record(file)?;
        let (_, size) = header.validate()?;
        let start = size as usize;
        let end = start + data.len();
        if end > MAX_FILE_SIZE {
            return Err(FsError::FileTooLarge);
        }

        header.size = end as u32;
        // record() left the sector resident, so this doesn't read it again
        self.buffer.update(&mut self.device, file.sector, |sector| {
            sector[DATA_OFFSET + start..DATA_OFFSET + end].copy_from_slice(data);
            header.encode(sector);
        })?;
        trace!("flatfs: {} += {} bytes", file.name, data.len());

        file.size = header.size;
        Ok(data.len())
    }

    /// Fills `buf` from the read cursor
    ///
    /// The whole of `buf` must lie within the file.
    pub fn read(&mut self, file: &mut FlatFile, buf: &mut [u8]) -> Result<usize, FsError> {
        if buf.is_empty() {
            return Ok(0);
        }

        let start = file.position as usize;
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= file.size as usize)
            .ok_or(FsError::InvalidOffset)?;

        self.record(file)?;
        let sector = self.buffer.load(&mut self.device, file.sector)?;
        buf.copy_from_slice(&sector[DATA_OFFSET + start..DATA_OFFSET + end]);

        file.position = end as u32;
        Ok(buf.len())
    }

    /// Records the time the file was saved in its header
    pub fn set_timestamp(&mut self, file: &mut FlatFile, timestamp: u32) -> Result<(), FsError> {
        let mut header = self.record(file)?;
        header.timestamp = timestamp;
        self.buffer
            .update(&mut self.device, file.sector, |sector| header.encode(sector))?;
        file.timestamp = timestamp;
        Ok(())
    }

    /// Releases the handle; writes are already on the medium
    pub fn close(&mut self, file: FlatFile) {
        trace!("flatfs: closed {}", file.name);
    }

    /// Erases the file's sector
    pub fn delete(&mut self, file: FlatFile) -> Result<(), FsError> {
        self.record(&file)?;
        self.buffer
            .overwrite(&mut self.device, file.sector, ERASED_BYTE, |_| {})?;
        debug!("flatfs: deleted {} at sector {}", file.name, file.sector);
        Ok(())
    }

    /// Returns the first file at or after sector `from` together with the
    /// cursor to pass on the next call, or `None` once every sector was seen
    ///
    /// A cursor of 0 starts at the first usable sector.
    pub fn list_files(&mut self, from: u32) -> Result<Option<(FlatFile, u32)>, FsError> {
        for sector in self.file_sectors(from) {
            let header = self.header(sector)?;
            if !header.is_file() {
                continue;
            }
            let (name, size) = header.validate()?;
            let file = FlatFile {
                name,
                timestamp: header.timestamp,
                sector,
                size,
                position: 0,
            };
            return Ok(Some((file, sector + 1)));
        }
        Ok(None)
    }

    /// Iterates over every stored file in sector order
    pub fn files(&mut self) -> Files<'_, D> {
        Files {
            fs: self,
            cursor: Some(0),
        }
    }

    fn file_sectors(&self, from: u32) -> core::ops::Range<u32> {
        from.max(RESERVED_SECTOR + 1)..self.config.sector_count
    }

    fn header(&mut self, sector: u32) -> Result<RecordHeader, FsError> {
        let data = self.buffer.load(&mut self.device, sector)?;
        Ok(RecordHeader::decode(data))
    }

    /// Loads the header behind `file`, failing if the sector no longer
    /// holds that file
    fn record(&mut self, file: &FlatFile) -> Result<RecordHeader, FsError> {
        if !self.file_sectors(0).contains(&file.sector) {
            return Err(FsError::NotFound);
        }
        let header = self.header(file.sector)?;
        if !header.holds(&file.name) {
            return Err(FsError::NotFound);
        }
        Ok(header)
    }
}

/// Iterator returned by [`FlatFs::files`]
///
/// Stops after yielding the first error.
pub struct Files<'a, D: BlockDevice> {
    fs: &'a mut FlatFs<D>,
    cursor: Option<u32>,
}

impl<D: BlockDevice> Iterator for Files<'_, D> {
    type Item = Result<FlatFile, FsError>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor.take()?;
        match self.fs.list_files(cursor) {
            Ok(Some((file, next))) => {
                self.cursor = Some(next);
                Some(Ok(file))
            }
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
