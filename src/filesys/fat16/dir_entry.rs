//! FAT16 directory entry structure and operations

use super::constants::*;
use super::name::ShortName;
use bytes::{Buf, BufMut};

const ATTRIBUTE_OFFSET: usize = 0x0B;
const FIRST_CLUSTER_OFFSET: usize = 0x1A;
const SIZE_OFFSET: usize = 0x1C;

/// 8.3 format directory entry (32 bytes on disk)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry83 {
    /// 8 character filename and 3 character extension
    pub name: ShortName,

    /// File attributes (read-only, directory, etc)
    pub attributes: u8,

    /// First cluster number
    pub start_cluster: u16,

    /// File size in bytes
    pub file_size: u32,
}

impl DirEntry83 {
    /// Creates a new file entry with given name and starting cluster
    pub fn new_file(name: ShortName, start_cluster: u16) -> Self {
        Self {
            name,
            attributes: ATTR_ARCHIVE,
            start_cluster,
            file_size: 0,
        }
    }

    /// Decodes the entry stored at `raw[..32]`
    pub fn decode(raw: &[u8]) -> Self {
        let mut name = [0u8; MAX_FILENAME_LENGTH];
        let mut ext = [0u8; MAX_EXTENSION_LENGTH];
        name.copy_from_slice(&raw[..MAX_FILENAME_LENGTH]);
        ext.copy_from_slice(&raw[MAX_FILENAME_LENGTH..ATTRIBUTE_OFFSET]);

        let mut cluster = &raw[FIRST_CLUSTER_OFFSET..];
        let start_cluster = cluster.get_u16_le();
        let file_size = cluster.get_u32_le();

        Self {
            name: ShortName::from_raw(name, ext),
            attributes: raw[ATTRIBUTE_OFFSET],
            start_cluster,
            file_size,
        }
    }

    /// Writes the entry into `raw[..32]`, clearing timestamps and reserved bytes
    pub fn encode(&self, raw: &mut [u8]) {
        raw[..DIR_ENTRY_SIZE].fill(0);
        raw[..MAX_FILENAME_LENGTH].copy_from_slice(self.name.name());
        raw[MAX_FILENAME_LENGTH..ATTRIBUTE_OFFSET].copy_from_slice(self.name.ext());
        raw[ATTRIBUTE_OFFSET] = self.attributes;

        let mut buf = &mut raw[FIRST_CLUSTER_OFFSET..DIR_ENTRY_SIZE];
        buf.put_u16_le(self.start_cluster);
        buf.put_u32_le(self.file_size & MAX_FILE_SIZE);
    }

    /// Rewrites only the size field of the entry stored at `raw[..32]`
    pub fn encode_size(size: u32, raw: &mut [u8]) {
        let mut buf = &mut raw[SIZE_OFFSET..DIR_ENTRY_SIZE];
        buf.put_u32_le(size & MAX_FILE_SIZE);
    }

    pub fn encode_start_cluster(cluster: u16, raw: &mut [u8]) {
        let mut buf = &mut raw[FIRST_CLUSTER_OFFSET..SIZE_OFFSET];
        buf.put_u16_le(cluster);
    }

    /// Returns true if the raw entry marks a slot that can be reused
    pub fn is_free_slot(raw: &[u8]) -> bool {
        raw[0] == FREE_ENTRY_MARKER || raw[0] == DELETED_ENTRY_MARKER
    }

    /// Returns true if entry is a directory
    pub fn is_directory(&self) -> bool {
        self.attributes & ATTR_DIRECTORY != 0
    }

    /// Returns true for entries that describe a regular file
    pub fn is_file(&self) -> bool {
        self.attributes & ATTR_LONG_NAME != ATTR_LONG_NAME
            && !self.is_directory()
            && self.attributes & ATTR_VOLUME_ID == 0
    }
}
