//! Geometry and derived offsets of a mounted FAT16 volume

use super::boot_sector::BootSector;
use super::constants::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsType {
    Fat16,
    /// The boot sector did not carry the FAT16 type string
    Unknown,
}

/// Describes where the parts of a volume live on the medium.
///
/// Built once at mount time from the boot sector; all sector numbers are
/// absolute, i.e. they already include `partition_start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub fs_type: FsType,
    /// Type byte from the MBR partition table, if the medium had one
    pub partition_type: Option<u8>,
    /// Sector holding the volume boot sector
    pub partition_start: u32,

    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub fat_count: u8,
    pub root_dir_entries: u16,
    pub sectors_per_fat: u16,
    pub total_sectors: u32,

    /// First sector of the first allocation table
    pub fat_off: u32,
    /// First sector of the root directory
    pub root_dir_off: u32,
    pub root_dir_sectors: u32,
    /// Sector that cluster 0 would start at; cluster `c` starts at
    /// `first_cluster_off + c * sectors_per_cluster`
    pub first_cluster_off: u32,
}

impl Partition {
    pub fn new(boot: &BootSector, partition_start: u32, partition_type: Option<u8>) -> Self {
        let fs_type = if boot.is_fat16() {
            FsType::Fat16
        } else {
            FsType::Unknown
        };

        // A zero sector size would make the root directory size meaningless
        let bytes_per_sector = match boot.bytes_per_sector {
            0 => SECTOR_SIZE as u32,
            bps => bps as u32,
        };
        let root_dir_sectors =
            (boot.root_dir_entries as u32 * DIR_ENTRY_SIZE as u32).div_ceil(bytes_per_sector);

        let fat_off = partition_start + boot.reserved_sectors as u32;
        let root_dir_off = fat_off + boot.fat_count as u32 * boot.sectors_per_fat as u32;
        let first_cluster_off = (root_dir_off + root_dir_sectors)
            .wrapping_sub(2 * boot.sectors_per_cluster as u32);

        Self {
            fs_type,
            partition_type,
            partition_start,
            bytes_per_sector: boot.bytes_per_sector,
            sectors_per_cluster: boot.sectors_per_cluster,
            reserved_sectors: boot.reserved_sectors,
            fat_count: boot.fat_count,
            root_dir_entries: boot.root_dir_entries,
            sectors_per_fat: boot.sectors_per_fat,
            total_sectors: boot.total_sectors(),
            fat_off,
            root_dir_off,
            root_dir_sectors,
            first_cluster_off,
        }
    }

    /// First sector of the data region (cluster 2)
    pub fn data_start(&self) -> u32 {
        self.root_dir_off + self.root_dir_sectors
    }

    /// Absolute sector where `cluster` begins
    pub fn cluster_to_sector(&self, cluster: u16) -> u32 {
        self.first_cluster_off
            .wrapping_add(cluster as u32 * self.sectors_per_cluster as u32)
    }

    pub fn cluster_bytes(&self) -> u32 {
        self.sectors_per_cluster as u32 * SECTOR_SIZE as u32
    }

    /// Exclusive upper bound of usable cluster numbers.
    ///
    /// Limited by what the table can describe, by the data region size when
    /// the boot sector records one, and by the end-of-chain range.
    pub fn cluster_limit(&self) -> u32 {
        let table_limit = self.sectors_per_fat as u32 * FAT_ENTRIES_PER_SECTOR;
        let data_sectors = self
            .total_sectors
            .saturating_sub(self.data_start() - self.partition_start);
        let limit = match self.sectors_per_cluster {
            0 => table_limit,
            _ if self.total_sectors == 0 => table_limit,
            spc => table_limit.min(FIRST_DATA_CLUSTER as u32 + data_sectors / spc as u32),
        };
        limit.min(END_OF_CHAIN_MIN as u32)
    }

    /// Table sector and byte offset holding the entry of `cluster`
    pub fn fat_entry_location(&self, cluster: u16) -> (u32, usize) {
        let offset = (cluster as usize * FAT_ENTRY_SIZE) % SECTOR_SIZE;
        let sector = self.fat_off + (cluster as u32 >> 8);
        (sector, offset)
    }

    /// Root directory sector and byte offset of directory entry `index`
    pub fn dir_entry_location(&self, index: u16) -> (u32, usize) {
        let sector = self.root_dir_off + index as u32 / DIR_ENTRIES_PER_SECTOR as u32;
        let offset = (index as usize % DIR_ENTRIES_PER_SECTOR) * DIR_ENTRY_SIZE;
        (sector, offset)
    }

    /// Number of directory slots actually backed by root directory sectors
    pub fn dir_slots(&self) -> u16 {
        let slots = self.root_dir_sectors * DIR_ENTRIES_PER_SECTOR as u32;
        slots.min(self.root_dir_entries as u32) as u16
    }
}
