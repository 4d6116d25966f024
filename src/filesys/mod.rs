use bitflags::bitflags;
use core::result::Result;

pub mod block;
pub mod buffer;
pub mod fat16;
pub mod flatfs;

/// Size of a device sector in bytes. Both filesystems assume it.
pub const SECTOR_SIZE: usize = 512;

// Define error types for the filesystem operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// A sector read or write failed
    Io,
    /// The medium reported it is not ready
    NotReady,
    NotFound,
    /// No free slot left in the root directory
    DirectoryFull,
    /// No free cluster or sector left on the medium
    NoSpace,
    FileTooLarge,
    InvalidOffset,
    InvalidName,
    /// A cluster chain loops or points outside the table
    CorruptChain,
    /// A sector header carries values the format cannot hold
    CorruptRecord,
    /// The boot sector describes a layout the driver can't address
    UnsupportedGeometry,
}

impl core::fmt::Display for FsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FsError::Io => write!(f, "Sector I/O failed"),
            FsError::NotReady => write!(f, "Medium not ready"),
            FsError::NotFound => write!(f, "File not found"),
            FsError::DirectoryFull => write!(f, "Root directory is full"),
            FsError::NoSpace => write!(f, "No free space on medium"),
            FsError::FileTooLarge => write!(f, "File size limit exceeded"),
            FsError::InvalidOffset => write!(f, "Offset past end of file"),
            FsError::InvalidName => write!(f, "Invalid file name"),
            FsError::CorruptChain => write!(f, "Corrupt cluster chain"),
            FsError::CorruptRecord => write!(f, "Corrupt sector record"),
            FsError::UnsupportedGeometry => write!(f, "Unsupported volume geometry"),
        }
    }
}

/// Represents a sector-addressed storage medium such as an SD card.
///
/// Implementations do no buffering of their own; every call runs to completion
/// before returning.
pub trait BlockDevice {
    fn read_sector(&mut self, sector: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<(), FsError>;
    fn write_sector(&mut self, sector: u32, buf: &[u8; SECTOR_SIZE]) -> Result<(), FsError>;
    fn is_ready(&self) -> bool;
}

impl<D: BlockDevice + ?Sized> BlockDevice for &mut D {
    fn read_sector(&mut self, sector: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<(), FsError> {
        (**self).read_sector(sector, buf)
    }

    fn write_sector(&mut self, sector: u32, buf: &[u8; SECTOR_SIZE]) -> Result<(), FsError> {
        (**self).write_sector(sector, buf)
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

bitflags! {
    /// Options accepted by the `open` calls of both filesystems
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u8 {
        /// Fail with `NotFound` instead of creating a missing file
        const DONT_CREATE = 1;
    }
}

/// Seek positions for file operations
#[derive(Debug, Clone, Copy)]
pub enum SeekFrom {
    Start(u32),
    Current(i32),
    End(i32),
}

impl SeekFrom {
    /// Resolves the target against the current position and file size.
    pub(crate) fn resolve(self, position: u32, size: u32) -> Result<u32, FsError> {
        let new_pos = match self {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(offset) => position.checked_add_signed(offset),
            SeekFrom::End(offset) => size.checked_add_signed(offset),
        }
        .ok_or(FsError::InvalidOffset)?;

        if new_pos > size {
            return Err(FsError::InvalidOffset);
        }
        Ok(new_pos)
    }
}
