//! Flat filesystem layout constants

pub use crate::filesys::SECTOR_SIZE;

/// Sector never used for files
pub const RESERVED_SECTOR: u32 = 0;

/// Sectors scanned when no count is configured
pub const DEFAULT_SECTOR_COUNT: u32 = 128;

// Sector flags
pub const FLAG_EMPTY: u8 = 0x00;
pub const FLAG_FILE: u8 = 0x01;
pub const FLAG_END: u8 = 0x0F;

/// Fill byte of a deleted sector
pub const ERASED_BYTE: u8 = 0xFF;

/// Longest name a record holds, excluding the terminating NUL
pub const MAX_NAME_LENGTH: usize = 8;
pub const NAME_FIELD_SIZE: usize = MAX_NAME_LENGTH + 1;

// Record header offsets
pub const NAME_OFFSET: usize = 1;
pub const TIMESTAMP_OFFSET: usize = NAME_OFFSET + NAME_FIELD_SIZE;
pub const SIZE_OFFSET: usize = TIMESTAMP_OFFSET + 4;
pub const DATA_OFFSET: usize = SIZE_OFFSET + 4;

/// Data bytes a single-sector file can hold
pub const MAX_FILE_SIZE: usize = SECTOR_SIZE - DATA_OFFSET;
