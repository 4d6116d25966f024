//! On-disk sector record of the flat filesystem
//!
//! ```text
//! 0      1          10          14     18          512
//! | flag | name[9]  | timestamp | size | data[494] |
//! ```
//! Integers are little endian; the name is NUL terminated.

use super::constants::*;
use crate::filesys::FsError;
use arrayvec::ArrayVec;
use bytes::{Buf, BufMut};
use core::fmt;

/// What a sector holds, according to its flag byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorKind {
    Empty,
    File,
    End,
    /// Deleted sectors are filled with 0xFF
    Erased,
    Unknown(u8),
}

impl From<u8> for SectorKind {
    fn from(flag: u8) -> Self {
        match flag {
            FLAG_EMPTY => SectorKind::Empty,
            FLAG_FILE => SectorKind::File,
            FLAG_END => SectorKind::End,
            ERASED_BYTE => SectorKind::Erased,
            other => SectorKind::Unknown(other),
        }
    }
}

/// Non-empty file name of at most 8 bytes without NUL
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FlatName(ArrayVec<u8, MAX_NAME_LENGTH>);

impl FlatName {
    /// Builds a name from `raw`, cut at the first NUL and truncated to
    /// [`MAX_NAME_LENGTH`] bytes
    pub fn new(raw: &[u8]) -> Result<Self, FsError> {
        let end = raw.iter().position(|&c| c == 0).unwrap_or(raw.len());
        let name: ArrayVec<u8, MAX_NAME_LENGTH> =
            raw[..end].iter().copied().take(MAX_NAME_LENGTH).collect();
        if name.is_empty() {
            return Err(FsError::InvalidName);
        }
        Ok(FlatName(name))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn encode(&self, field: &mut [u8]) {
        field[..NAME_FIELD_SIZE].fill(0);
        field[..self.0.len()].copy_from_slice(&self.0);
    }

    /// Compares against a stored NUL terminated name field
    fn matches(&self, field: &[u8; NAME_FIELD_SIZE]) -> bool {
        let end = field.iter().position(|&c| c == 0).unwrap_or(NAME_FIELD_SIZE);
        field[..end] == self.0[..]
    }
}

impl TryFrom<&str> for FlatName {
    type Error = FsError;

    fn try_from(name: &str) -> Result<Self, FsError> {
        FlatName::new(name.as_bytes())
    }
}

impl fmt::Display for FlatName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &c in self.0.iter() {
            if c.is_ascii_graphic() || c == b' ' {
                write!(f, "{}", c as char)?;
            } else {
                write!(f, "\\x{:02x}", c)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FlatName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FlatName({})", self)
    }
}

/// First 18 bytes of a sector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub flag: u8,
    pub name: [u8; NAME_FIELD_SIZE],
    pub timestamp: u32,
    pub size: u32,
}

impl RecordHeader {
    /// Header of a freshly created, empty file
    pub fn new_file(name: &FlatName) -> Self {
        let mut field = [0u8; NAME_FIELD_SIZE];
        name.encode(&mut field);
        Self {
            flag: FLAG_FILE,
            name: field,
            timestamp: 0,
            size: 0,
        }
    }

    pub fn decode(sector: &[u8; SECTOR_SIZE]) -> Self {
        let mut buf = &sector[..DATA_OFFSET];
        let flag = buf.get_u8();
        let mut name = [0u8; NAME_FIELD_SIZE];
        buf.copy_to_slice(&mut name);
        let timestamp = buf.get_u32_le();
        let size = buf.get_u32_le();
        Self {
            flag,
            name,
            timestamp,
            size,
        }
    }

    /// Writes the header, leaving the data area untouched
    pub fn encode(&self, sector: &mut [u8; SECTOR_SIZE]) {
        let mut buf = &mut sector[..DATA_OFFSET];
        buf.put_u8(self.flag);
        buf.put_slice(&self.name);
        buf.put_u32_le(self.timestamp);
        buf.put_u32_le(self.size);
    }

    pub fn kind(&self) -> SectorKind {
        SectorKind::from(self.flag)
    }

    pub fn is_file(&self) -> bool {
        self.kind() == SectorKind::File
    }

    /// True for a file record stored under `name`
    pub fn holds(&self, name: &FlatName) -> bool {
        self.is_file() && name.matches(&self.name)
    }

    /// Name and size of a file record, rejecting values the format can't hold
    pub fn validate(&self) -> Result<(FlatName, u32), FsError> {
        if self.size as usize > MAX_FILE_SIZE {
            return Err(FsError::CorruptRecord);
        }
        let name = FlatName::new(&self.name).map_err(|_| FsError::CorruptRecord)?;
        Ok((name, self.size))
    }
}
