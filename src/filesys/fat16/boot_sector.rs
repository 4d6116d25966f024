//! FAT16 boot sector and master boot record layouts

use super::constants::*;
use bytes::{Buf, BufMut};

/// Parameters of a FAT16 volume, decoded from its boot sector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootSector {
    /// Name of the system that formatted the volume
    pub oem_name: [u8; 8],

    /// Number of bytes per sector
    pub bytes_per_sector: u16,

    /// Number of sectors per cluster
    pub sectors_per_cluster: u8,

    /// Number of reserved sectors at start of volume
    /// Including the boot sector. Typically 1 for FAT16
    pub reserved_sectors: u16,

    /// Number of FAT copies
    pub fat_count: u8,

    /// Maximum number of root directory entries
    pub root_dir_entries: u16,

    /// Total number of sectors (16-bit)
    /// Zero when the volume needs `total_sectors_32`
    pub total_sectors_16: u16,

    /// Media type descriptor
    pub media_type: u8,

    /// Sectors per FAT
    pub sectors_per_fat: u16,

    /// Number of sectors preceding the volume on the medium
    pub hidden_sectors: u32,

    /// Total number of sectors (32-bit)
    pub total_sectors_32: u32,

    /// Volume serial number
    pub volume_id: u32,

    /// Volume label
    pub volume_label: [u8; 11],

    /// Filesystem type string
    pub fs_type: [u8; 8],
}

impl BootSector {
    /// Returns true if `sector` looks like a volume boot sector rather than
    /// a master boot record
    pub fn is_boot_sector(sector: &[u8; SECTOR_SIZE]) -> bool {
        let start = BOOT_SECTOR_SIGNATURE_OFFSET;
        &sector[start..start + BOOT_SECTOR_SIGNATURE.len()] == BOOT_SECTOR_SIGNATURE
    }

    pub fn decode(sector: &[u8; SECTOR_SIZE]) -> Self {
        let mut oem_name = [0u8; 8];
        let mut volume_label = [0u8; 11];
        let mut fs_type = [0u8; 8];

        let mut buf = &sector[BOOT_SECTOR_SIGNATURE_OFFSET..];
        buf.copy_to_slice(&mut oem_name);
        let bytes_per_sector = buf.get_u16_le();
        let sectors_per_cluster = buf.get_u8();
        let reserved_sectors = buf.get_u16_le();
        let fat_count = buf.get_u8();
        let root_dir_entries = buf.get_u16_le();
        let total_sectors_16 = buf.get_u16_le();
        let media_type = buf.get_u8();
        let sectors_per_fat = buf.get_u16_le();
        // sectors per track, head count
        buf.advance(4);
        let hidden_sectors = buf.get_u32_le();
        let total_sectors_32 = buf.get_u32_le();
        // drive number, reserved, extended boot signature
        buf.advance(3);
        let volume_id = buf.get_u32_le();
        buf.copy_to_slice(&mut volume_label);
        fs_type.copy_from_slice(&sector[FS_TYPE_OFFSET..FS_TYPE_OFFSET + 8]);

        Self {
            oem_name,
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            fat_count,
            root_dir_entries,
            total_sectors_16,
            media_type,
            sectors_per_fat,
            hidden_sectors,
            total_sectors_32,
            volume_id,
            volume_label,
            fs_type,
        }
    }

    /// Writes the boot sector fields and boot signature into `sector`
    pub fn encode(&self, sector: &mut [u8; SECTOR_SIZE]) {
        let mut buf = &mut sector[..];
        buf.put_slice(&[0xEB, 0x3C, 0x90]); // Standard boot jump
        buf.put_slice(&self.oem_name);
        buf.put_u16_le(self.bytes_per_sector);
        buf.put_u8(self.sectors_per_cluster);
        buf.put_u16_le(self.reserved_sectors);
        buf.put_u8(self.fat_count);
        buf.put_u16_le(self.root_dir_entries);
        buf.put_u16_le(self.total_sectors_16);
        buf.put_u8(self.media_type);
        buf.put_u16_le(self.sectors_per_fat);
        buf.put_u16_le(63); // sectors per track
        buf.put_u16_le(255); // heads
        buf.put_u32_le(self.hidden_sectors);
        buf.put_u32_le(self.total_sectors_32);
        buf.put_u8(0x80); // Hard disk
        buf.put_u8(0);
        buf.put_u8(0x29); // Extended boot signature
        buf.put_u32_le(self.volume_id);
        buf.put_slice(&self.volume_label);
        buf.put_slice(&self.fs_type);

        sector[BOOT_SIGNATURE_OFFSET..].copy_from_slice(&BOOT_SIGNATURE);
    }

    pub fn is_fat16(&self) -> bool {
        &self.fs_type[..FAT16_SIGNATURE.len()] == FAT16_SIGNATURE
    }

    pub fn total_sectors(&self) -> u32 {
        if self.total_sectors_16 != 0 {
            self.total_sectors_16 as u32
        } else {
            self.total_sectors_32
        }
    }
}

/// First entry of a master boot record partition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionEntry {
    pub partition_type: u8,
    pub start_sector: u32,
}

impl PartitionEntry {
    pub fn decode(mbr: &[u8; SECTOR_SIZE]) -> Self {
        let mut start = &mbr[MBR_PARTITION_START_OFFSET..];
        Self {
            partition_type: mbr[MBR_PARTITION_TYPE_OFFSET],
            start_sector: start.get_u32_le(),
        }
    }

    /// Writes a single-partition table spanning `sector_count` sectors
    pub fn encode(&self, sector_count: u32, mbr: &mut [u8; SECTOR_SIZE]) {
        mbr[MBR_PARTITION_TYPE_OFFSET] = self.partition_type;
        let mut buf = &mut mbr[MBR_PARTITION_START_OFFSET..];
        buf.put_u32_le(self.start_sector);
        buf.put_u32_le(sector_count);
        mbr[BOOT_SIGNATURE_OFFSET..].copy_from_slice(&BOOT_SIGNATURE);
    }
}
