//! FAT16 filesystem constants

pub use crate::filesys::SECTOR_SIZE;

/// Size of FAT entry in bytes (16-bit)
pub const FAT_ENTRY_SIZE: usize = 2;

/// FAT entries held by one table sector
pub const FAT_ENTRIES_PER_SECTOR: u32 = (SECTOR_SIZE / FAT_ENTRY_SIZE) as u32;

/// Size of an on-disk directory entry
pub const DIR_ENTRY_SIZE: usize = 32;

pub const DIR_ENTRIES_PER_SECTOR: usize = SECTOR_SIZE / DIR_ENTRY_SIZE;

/// Maximum length of filename excluding extension
pub const MAX_FILENAME_LENGTH: usize = 8;

/// Maximum length of file extension
pub const MAX_EXTENSION_LENGTH: usize = 3;

/// Table values at or above this mark the last cluster of a chain
pub const END_OF_CHAIN_MIN: u16 = 0xFFF0;

/// Value written to terminate a chain, also returned when no cluster is free
pub const END_OF_CHAIN: u16 = 0xFFFF;

/// First cluster number that maps to the data region
pub const FIRST_DATA_CLUSTER: u16 = 2;

/// Largest size the directory entry can record; the top size byte stays zero
pub const MAX_FILE_SIZE: u32 = (1 << 24) - 1;

/// File attribute: Volume label
pub const ATTR_VOLUME_ID: u8 = 0x08;

/// File attribute: Directory
pub const ATTR_DIRECTORY: u8 = 0x10;

/// File attribute: Archive
pub const ATTR_ARCHIVE: u8 = 0x20;

/// Attribute combination used by long file name entries
pub const ATTR_LONG_NAME: u8 = 0x0F;

/// Marker for deleted directory entries
pub const DELETED_ENTRY_MARKER: u8 = 0xE5;

/// Marker for a never used directory entry; nothing follows it
pub const FREE_ENTRY_MARKER: u8 = 0x00;

/// Bytes at offset 3 of a volume boot sector written by DOS-style formatters
pub const BOOT_SECTOR_SIGNATURE: &[u8; 5] = b"MSDOS";
pub const BOOT_SECTOR_SIGNATURE_OFFSET: usize = 0x03;

/// Filesystem type string of a FAT16 volume
pub const FAT16_SIGNATURE: &[u8; 5] = b"FAT16";
pub const FS_TYPE_OFFSET: usize = 0x36;

/// First partition table entry in a master boot record
pub const MBR_PARTITION_TYPE_OFFSET: usize = 0x1C2;
pub const MBR_PARTITION_START_OFFSET: usize = 0x1C6;

/// Boot signature closing both MBR and boot sector
pub const BOOT_SIGNATURE_OFFSET: usize = 0x1FE;
pub const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xAA];

/// MBR partition type for FAT16 volumes of 32 MiB and above
pub const PARTITION_TYPE_FAT16: u8 = 0x06;
