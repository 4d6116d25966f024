//! FAT16 filesystem implementation
//!
//! Supports a single flat root directory. Files are located by their 8.3
//! name, created on demand and grown by appending; there is no deletion.

use super::buffer::SectorBuffer;
use super::{BlockDevice, FsError, OpenFlags};
use core::cmp::min;
use log::{debug, trace, warn};

mod boot_sector;
mod constants;
mod dir_entry;
mod fat_entry;
mod file;
mod name;
mod partition;

pub use boot_sector::{BootSector, PartitionEntry};
use constants::*;
pub use constants::{END_OF_CHAIN, END_OF_CHAIN_MIN, MAX_FILE_SIZE};
pub use dir_entry::DirEntry83;
pub use fat_entry::FatEntry;
use file::ClusterCursor;
pub use file::Fat16File;
pub use name::{validate_char, ShortName};
pub use partition::{FsType, Partition};

/// Layout of a volume created by [`Fat16::format`]
#[derive(Debug, Clone, Copy)]
pub struct FormatOptions {
    /// Sectors given to the volume, excluding any MBR gap
    pub total_sectors: u32,
    /// Wrap the volume in an MBR whose single partition starts here
    pub partition_start: Option<u32>,
    pub sectors_per_cluster: u8,
    pub root_dir_entries: u16,
    pub fat_count: u8,
    pub volume_id: u32,
}

impl FormatOptions {
    pub fn new(total_sectors: u32) -> Self {
        Self {
            total_sectors,
            partition_start: None,
            sectors_per_cluster: 4, // Typically 4 for small drives
            root_dir_entries: 512,
            fat_count: 2,
            volume_id: 0x1234_5678,
        }
    }
}

/// FAT16 filesystem driver
///
/// Owns the block device and the one sector buffer every operation works
/// through. Operations take `&mut self`, so two of them can never overlap.
pub struct Fat16<D: BlockDevice> {
    /// Underlying block device
    device: D,
    /// Working sector buffer
    buffer: SectorBuffer,
    /// Geometry read at mount time
    partition: Partition,
}

impl<D: BlockDevice> Fat16<D> {
    /// Lays down an empty FAT16 volume and mounts it
    pub fn format(mut device: D, options: FormatOptions) -> Result<Self, FsError> {
        if !device.is_ready() {
            return Err(FsError::NotReady);
        }
        let mut buffer = SectorBuffer::new();

        let start = options.partition_start.unwrap_or(0);
        let reserved_sectors: u16 = 1; // Boot sector
        let spc = options.sectors_per_cluster.max(1);
        let root_dir_sectors = (options.root_dir_entries as u32 * DIR_ENTRY_SIZE as u32)
            .div_ceil(SECTOR_SIZE as u32);

        // Calculate sectors per FAT
        let total_clusters = options
            .total_sectors
            .saturating_sub(reserved_sectors as u32 + root_dir_sectors)
            / spc as u32;
        let sectors_per_fat = ((total_clusters + FIRST_DATA_CLUSTER as u32)
            * FAT_ENTRY_SIZE as u32)
            .div_ceil(SECTOR_SIZE as u32)
            .min(u16::MAX as u32) as u16;

        if let Some(start) = options.partition_start {
            let entry = PartitionEntry {
                partition_type: PARTITION_TYPE_FAT16,
                start_sector: start,
            };
            buffer.overwrite(&mut device, 0, 0, |mbr| {
                entry.encode(options.total_sectors, mbr)
            })?;
        }

        let boot = BootSector {
            oem_name: *b"MSDOS5.0",
            bytes_per_sector: SECTOR_SIZE as u16,
            sectors_per_cluster: spc,
            reserved_sectors,
            fat_count: options.fat_count,
            root_dir_entries: options.root_dir_entries,
            total_sectors_16: if options.total_sectors < 65536 {
                options.total_sectors as u16
            } else {
                0
            },
            media_type: 0xF8, // Fixed disk
            sectors_per_fat,
            hidden_sectors: start,
            total_sectors_32: if options.total_sectors >= 65536 {
                options.total_sectors
            } else {
                0
            },
            volume_id: options.volume_id,
            volume_label: *b"NO NAME    ",
            fs_type: *b"FAT16   ",
        };
        buffer.overwrite(&mut device, start, 0, |sector| boot.encode(sector))?;

        let partition_type = options.partition_start.map(|_| PARTITION_TYPE_FAT16);
        let partition = Partition::new(&boot, start, partition_type);
        for copy in 0..options.fat_count as u32 {
            let fat_start = partition.fat_off + copy * sectors_per_fat as u32;
            // First two FAT entries are reserved
            buffer.overwrite(&mut device, fat_start, 0, |fat| {
                fat[..2].copy_from_slice(&(0xFF00 | boot.media_type as u16).to_le_bytes());
                fat[2..4].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
            })?;
            for sector in 1..sectors_per_fat as u32 {
                buffer.overwrite(&mut device, fat_start + sector, 0, |_| {})?;
            }
        }

        // Initialize empty root directory
        for sector in 0..root_dir_sectors {
            buffer.overwrite(&mut device, partition.root_dir_off + sector, 0, |_| {})?;
        }

        debug!(
            "fat16: formatted {} sectors at {}, {} sectors per FAT",
            options.total_sectors, start, sectors_per_fat
        );
        Fat16::mount(device)
    }

    /// Reads the boot sector, following the MBR if sector 0 holds one
    pub fn mount(mut device: D) -> Result<Self, FsError> {
        if !device.is_ready() {
            return Err(FsError::NotReady);
        }
        let mut buffer = SectorBuffer::new();

        let sector0 = buffer.load(&mut device, 0)?;
        let (start, partition_type) = if BootSector::is_boot_sector(sector0) {
            (0, None)
        } else {
            let entry = PartitionEntry::decode(sector0);
            debug!(
                "fat16: MBR found, partition type {:#04x} at sector {}",
                entry.partition_type, entry.start_sector
            );
            (entry.start_sector, Some(entry.partition_type))
        };

        let boot = BootSector::decode(buffer.load(&mut device, start)?);
        let partition = Partition::new(&boot, start, partition_type);
        if partition.fs_type == FsType::Unknown {
            warn!("fat16: volume at sector {} is not marked FAT16", start);
        }
        debug!(
            "fat16: {} bytes/sector, {} sectors/cluster, {} FATs of {} sectors, {} root entries",
            partition.bytes_per_sector,
            partition.sectors_per_cluster,
            partition.fat_count,
            partition.sectors_per_fat,
            partition.root_dir_entries
        );
        debug!(
            "fat16: fat at {}, root dir at {}, first cluster offset {}",
            partition.fat_off, partition.root_dir_off, partition.first_cluster_off
        );

        Ok(Fat16 {
            device,
            buffer,
            partition,
        })
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Ends the session and hands back the device
    pub fn into_device(self) -> D {
        self.device
    }

    /// Reads FAT entry for given cluster
    pub fn read_entry(&mut self, cluster: u16) -> Result<FatEntry, FsError> {
        let (sector, offset) = self.partition.fat_entry_location(cluster);
        let data = self.buffer.load(&mut self.device, sector)?;
        let entry = u16::from_le_bytes([data[offset], data[offset + 1]]);
        trace!("fat16: entry {} = {:#06x}", cluster, entry);
        Ok(FatEntry { cluster: entry })
    }

    /// Writes FAT entry for given cluster and mirrors it into every table copy
    pub fn write_entry(&mut self, cluster: u16, entry: FatEntry) -> Result<(), FsError> {
        let (sector, offset) = self.partition.fat_entry_location(cluster);
        trace!("fat16: entry {} <- {:#06x}", cluster, entry.cluster);

        self.buffer.update(&mut self.device, sector, |data| {
            data[offset..offset + FAT_ENTRY_SIZE].copy_from_slice(&entry.cluster.to_le_bytes());
        })?;

        // Write to the other FAT tables if they exist
        for copy in 1..self.partition.fat_count as u32 {
            let mirror = sector + copy * self.partition.sectors_per_fat as u32;
            self.buffer.store(&mut self.device, mirror)?;
        }
        Ok(())
    }

    /// Returns the first free cluster, or [`END_OF_CHAIN`] if the table is full
    pub fn find_free_cluster(&mut self) -> Result<u16, FsError> {
        for cluster in FIRST_DATA_CLUSTER as u32..self.partition.cluster_limit() {
            if self.read_entry(cluster as u16)?.is_free() {
                return Ok(cluster as u16);
            }
        }
        Ok(END_OF_CHAIN)
    }

    /// Opens `name` in the root directory, creating it unless
    /// [`OpenFlags::DONT_CREATE`] is given
    pub fn open(&mut self, name: ShortName, flags: OpenFlags) -> Result<Fat16File, FsError> {
        if let Some((index, entry)) = self.find_entry(&name)? {
            let last_cluster = if entry.start_cluster < FIRST_DATA_CLUSTER {
                entry.start_cluster
            } else {
                self.data_tail(entry.start_cluster, entry.file_size)?
            };
            debug!(
                "fat16: opened {} (slot {}, clusters {}..{}, {} bytes)",
                name, index, entry.start_cluster, last_cluster, entry.file_size
            );
            return Ok(Fat16File::new(
                name,
                entry.start_cluster,
                last_cluster,
                entry.file_size,
                index,
            ));
        }

        if flags.contains(OpenFlags::DONT_CREATE) {
            return Err(FsError::NotFound);
        }
        self.create(name)
    }

    /// Appends `data` to the end of the file, growing its cluster chain as needed
    ///
    /// Returns the number of bytes written. The directory entry is updated
    /// once all data is on the medium, so a failed write leaves the recorded
    /// size unchanged.
    pub fn write(&mut self, file: &mut Fat16File, data: &[u8]) -> Result<usize, FsError> {
        if data.is_empty() {
            return Ok(0);
        }
        let new_size = u32::try_from(data.len())
            .ok()
            .and_then(|len| file.size.checked_add(len))
            .filter(|&size| size <= MAX_FILE_SIZE)
            .ok_or(FsError::FileTooLarge)?;

        let cluster_bytes = self.cluster_bytes()?;

        let mut first_cluster = file.first_cluster;
        if first_cluster < FIRST_DATA_CLUSTER {
            // Empty file created without a cluster, e.g. by another system
            first_cluster = self.allocate_cluster()?;
        }

        match self.append(file, first_cluster, data, cluster_bytes, new_size) {
            Ok(last_cluster) => {
                if file.first_cluster != first_cluster {
                    file.first_cluster = first_cluster;
                    file.cursor = ClusterCursor {
                        cluster: first_cluster,
                        index: 0,
                    };
                }
                file.last_cluster = last_cluster;
                file.size = new_size;
                file.position = new_size;
                Ok(data.len())
            }
            Err(err) => {
                // Cut the chain back to what the recorded size covers
                let rollback = if file.first_cluster < FIRST_DATA_CLUSTER {
                    self.release_chain(first_cluster)
                } else {
                    self.truncate_chain(file.last_cluster)
                };
                if let Err(rollback_err) = rollback {
                    warn!(
                        "fat16: clusters of {} not released after failed write: {}",
                        file.name, rollback_err
                    );
                }
                Err(err)
            }
        }
    }

    /// Writes `data` after the last byte of `file` and records the new size
    ///
    /// Returns the cluster holding the last byte written.
    fn append(
        &mut self,
        file: &Fat16File,
        first_cluster: u16,
        data: &[u8],
        cluster_bytes: u32,
        new_size: u32,
    ) -> Result<u16, FsError> {
        let mut last_cluster = if file.first_cluster < FIRST_DATA_CLUSTER {
            first_cluster
        } else {
            file.last_cluster
        };
        let mut size = file.size;
        let mut written = 0;

        while written < data.len() {
            let cluster_offset = size % cluster_bytes;
            if cluster_offset == 0 && size > 0 {
                last_cluster = self.extend_chain(last_cluster)?;
            }

            let sector = self.partition.cluster_to_sector(last_cluster)
                + cluster_offset / SECTOR_SIZE as u32;
            let offset = cluster_offset as usize % SECTOR_SIZE;
            let chunk_size = min(SECTOR_SIZE - offset, data.len() - written);
            let chunk = &data[written..written + chunk_size];

            if offset == 0 {
                self.buffer.overwrite(&mut self.device, sector, 0, |buf| {
                    buf[..chunk_size].copy_from_slice(chunk)
                })?;
            } else {
                self.buffer.update(&mut self.device, sector, |buf| {
                    buf[offset..offset + chunk_size].copy_from_slice(chunk)
                })?;
            }

            written += chunk_size;
            size += chunk_size as u32;
        }

        self.update_dir_entry(file.dir_index, first_cluster, new_size)?;
        Ok(last_cluster)
    }

    /// Reads from the file's current position, following its cluster chain
    ///
    /// Returns 0 at end of file.
    pub fn read(&mut self, file: &mut Fat16File, buf: &mut [u8]) -> Result<usize, FsError> {
        if file.position >= file.size {
            return Ok(0);
        }

        let cluster_bytes = self.cluster_bytes()?;
        let bytes_to_read = min(buf.len(), (file.size - file.position) as usize);
        let mut position = file.position;
        let mut cursor = file.cursor;
        let mut bytes_read = 0;

        while bytes_read < bytes_to_read {
            cursor = self.seek_cluster(file.first_cluster, cursor, position / cluster_bytes)?;

            let cluster_offset = position % cluster_bytes;
            let sector = self.partition.cluster_to_sector(cursor.cluster)
                + cluster_offset / SECTOR_SIZE as u32;
            let offset = cluster_offset as usize % SECTOR_SIZE;
            let chunk_size = min(SECTOR_SIZE - offset, bytes_to_read - bytes_read);

            let data = self.buffer.load(&mut self.device, sector)?;
            buf[bytes_read..bytes_read + chunk_size].copy_from_slice(&data[offset..offset + chunk_size]);

            bytes_read += chunk_size;
            position += chunk_size as u32;
        }

        file.position = position;
        file.cursor = cursor;
        Ok(bytes_read)
    }

    /// Returns the next in-use file entry at or after slot `from`, with the
    /// slot to resume from
    pub fn next_entry(&mut self, from: u16) -> Result<Option<(DirEntry83, u16)>, FsError> {
        for index in from..self.partition.dir_slots() {
            let (sector, offset) = self.partition.dir_entry_location(index);
            let data = self.buffer.load(&mut self.device, sector)?;
            let raw = &data[offset..offset + DIR_ENTRY_SIZE];

            if raw[0] == FREE_ENTRY_MARKER {
                // Nothing follows a never used slot
                return Ok(None);
            }
            if raw[0] == DELETED_ENTRY_MARKER {
                continue;
            }
            let entry = DirEntry83::decode(raw);
            if entry.is_file() {
                return Ok(Some((entry, index + 1)));
            }
        }
        Ok(None)
    }

    /// Looks up `name` among the root directory entries
    fn find_entry(&mut self, name: &ShortName) -> Result<Option<(u16, DirEntry83)>, FsError> {
        for index in 0..self.partition.dir_slots() {
            let (sector, offset) = self.partition.dir_entry_location(index);
            let data = self.buffer.load(&mut self.device, sector)?;
            let raw = &data[offset..offset + DIR_ENTRY_SIZE];

            if name.matches(raw) {
                let entry = DirEntry83::decode(raw);
                if entry.is_file() {
                    return Ok(Some((index, entry)));
                }
            }
        }
        Ok(None)
    }

    fn find_free_slot(&mut self) -> Result<Option<u16>, FsError> {
        for index in 0..self.partition.dir_slots() {
            let (sector, offset) = self.partition.dir_entry_location(index);
            let data = self.buffer.load(&mut self.device, sector)?;
            if DirEntry83::is_free_slot(&data[offset..]) {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    fn create(&mut self, name: ShortName) -> Result<Fat16File, FsError> {
        let index = self.find_free_slot()?.ok_or(FsError::DirectoryFull)?;
        let cluster = self.allocate_cluster()?;

        let entry = DirEntry83::new_file(name, cluster);
        let (sector, offset) = self.partition.dir_entry_location(index);
        let result = self.buffer.update(&mut self.device, sector, |data| {
            entry.encode(&mut data[offset..offset + DIR_ENTRY_SIZE])
        });
        if let Err(err) = result {
            // Hand the cluster back; the entry never made it to the medium
            if let Err(rollback_err) = self.write_entry(cluster, FatEntry::FREE) {
                warn!("fat16: cluster {} lost: {}", cluster, rollback_err);
            }
            return Err(err);
        }

        debug!("fat16: created {} in slot {} at cluster {}", name, index, cluster);
        Ok(Fat16File::new(name, cluster, cluster, 0, index))
    }

    /// Claims the first free cluster as a one-cluster chain
    fn allocate_cluster(&mut self) -> Result<u16, FsError> {
        let cluster = self.find_free_cluster()?;
        if cluster >= END_OF_CHAIN_MIN {
            warn!("fat16: no free cluster left");
            return Err(FsError::NoSpace);
        }
        self.write_entry(cluster, FatEntry::END)?;
        Ok(cluster)
    }

    /// Returns the cluster following `tail`, linking a newly allocated one
    /// if `tail` ends the chain
    fn extend_chain(&mut self, tail: u16) -> Result<u16, FsError> {
        let entry = self.read_entry(tail)?;
        if !entry.is_end_of_chain() {
            // Left behind by a failed write whose rollback failed too
            return self.link(tail, entry);
        }

        let next = self.allocate_cluster()?;
        if let Err(err) = self.write_entry(tail, FatEntry::from(next)) {
            if let Err(rollback_err) = self.write_entry(next, FatEntry::FREE) {
                warn!("fat16: cluster {} lost: {}", next, rollback_err);
            }
            return Err(err);
        }
        debug!("fat16: chain extended {} -> {}", tail, next);
        Ok(next)
    }

    /// Ends the chain at `tail` and frees every cluster after it
    fn truncate_chain(&mut self, tail: u16) -> Result<(), FsError> {
        let entry = self.read_entry(tail)?;
        if entry.is_end_of_chain() {
            return Ok(());
        }
        self.write_entry(tail, FatEntry::END)?;
        match entry.next() {
            Some(next) => self.release_chain(next),
            None => Ok(()),
        }
    }

    /// Frees the chain starting at `first`
    fn release_chain(&mut self, first: u16) -> Result<(), FsError> {
        let limit = self.partition.cluster_limit();
        let mut cluster = first;
        // Freed clusters read back as free, so a looping chain stops too
        for _ in 0..limit {
            let entry = self.read_entry(cluster)?;
            self.write_entry(cluster, FatEntry::FREE)?;
            match entry.next() {
                Some(next) if (next as u32) < limit => cluster = next,
                _ => break,
            }
        }
        debug!("fat16: released chain starting at {}", first);
        Ok(())
    }

    /// Walks the whole chain starting at `first` and returns the cluster
    /// holding the last of `size` bytes
    ///
    /// Clusters linked past that one are tolerated; appends reuse them.
    fn data_tail(&mut self, first: u16, size: u32) -> Result<u16, FsError> {
        let target = match size {
            0 => 0,
            size => (size - 1) / self.cluster_bytes()?,
        };
        let mut tail = None;
        let mut cluster = first;
        // A chain can't be longer than the number of clusters
        for index in 0..self.partition.cluster_limit() {
            if index == target {
                tail = Some(cluster);
            }
            let entry = self.read_entry(cluster)?;
            if entry.is_end_of_chain() {
                return tail.ok_or_else(|| {
                    warn!("fat16: chain starting at {} is shorter than {} bytes", first, size);
                    FsError::CorruptChain
                });
            }
            cluster = self.link(cluster, entry)?;
        }
        warn!("fat16: chain starting at {} does not terminate", first);
        Err(FsError::CorruptChain)
    }

    fn cluster_bytes(&self) -> Result<u32, FsError> {
        match self.partition.cluster_bytes() {
            0 => {
                warn!("fat16: volume has no sectors per cluster");
                Err(FsError::UnsupportedGeometry)
            }
            bytes => Ok(bytes),
        }
    }

    /// Walks from `cursor` (or from the chain head when `index` lies behind
    /// it) to the `index`-th cluster of the chain
    fn seek_cluster(
        &mut self,
        first: u16,
        cursor: ClusterCursor,
        index: u32,
    ) -> Result<ClusterCursor, FsError> {
        let mut cursor = if index < cursor.index {
            ClusterCursor {
                cluster: first,
                index: 0,
            }
        } else {
            cursor
        };
        while cursor.index < index {
            let entry = self.read_entry(cursor.cluster)?;
            cursor = ClusterCursor {
                cluster: self.link(cursor.cluster, entry)?,
                index: cursor.index + 1,
            };
        }
        Ok(cursor)
    }

    /// Validates the link stored for `from`
    fn link(&self, from: u16, entry: FatEntry) -> Result<u16, FsError> {
        match entry.next() {
            Some(next) if (next as u32) < self.partition.cluster_limit() => Ok(next),
            _ => {
                warn!("fat16: cluster {} has invalid link {:#06x}", from, entry.cluster);
                Err(FsError::CorruptChain)
            }
        }
    }

    fn update_dir_entry(&mut self, index: u16, first_cluster: u16, size: u32) -> Result<(), FsError> {
        let (sector, offset) = self.partition.dir_entry_location(index);
        self.buffer.update(&mut self.device, sector, |data| {
            let raw = &mut data[offset..offset + DIR_ENTRY_SIZE];
            DirEntry83::encode_start_cluster(first_cluster, raw);
            DirEntry83::encode_size(size, raw);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesys::block::MemoryBlockDevice;
    use crate::filesys::SeekFrom;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    const DISK_SECTORS: u32 = 8192;

    fn formatted(options: FormatOptions) -> Fat16<MemoryBlockDevice> {
        let device = MemoryBlockDevice::new(DISK_SECTORS);
        Fat16::format(device, options).unwrap()
    }

    fn small_volume() -> Fat16<MemoryBlockDevice> {
        let mut options = FormatOptions::new(4096);
        options.sectors_per_cluster = 1;
        options.root_dir_entries = 32;
        formatted(options)
    }

    fn pattern(len: usize) -> std::vec::Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    #[test]
    fn mounts_raw_volume() {
        let fs = formatted(FormatOptions::new(4096));
        let p = fs.partition();

        assert_eq!(p.fs_type, FsType::Fat16);
        assert_eq!(p.partition_type, None);
        assert_eq!(p.partition_start, 0);
        assert_eq!(p.bytes_per_sector, 512);
        assert_eq!(p.sectors_per_cluster, 4);
        assert_eq!(p.reserved_sectors, 1);
        assert_eq!(p.fat_count, 2);
        assert_eq!(p.root_dir_entries, 512);
        assert_eq!(p.total_sectors, 4096);
        assert_eq!(p.root_dir_off, 1 + 2 * p.sectors_per_fat as u32);
        assert_eq!(p.first_cluster_off, p.root_dir_off + 32 - 2 * 4);
    }

    #[test]
    fn mounts_mbr_wrapped_volume() {
        let mut options = FormatOptions::new(4000);
        options.partition_start = Some(63);
        let fs = formatted(options);
        let p = fs.partition();

        assert_eq!(p.partition_type, Some(PARTITION_TYPE_FAT16));
        assert_eq!(p.partition_start, 63);
        assert_eq!(p.fs_type, FsType::Fat16);
        assert_eq!(p.fat_off, 63 + 1);
        assert_eq!(p.root_dir_off, 63 + 1 + 2 * p.sectors_per_fat as u32);
        assert_eq!(p.first_cluster_off, p.root_dir_off + 32 - 8);
    }

    #[test]
    fn unknown_type_still_mounts() {
        let mut device = MemoryBlockDevice::new(64);
        device.sector_mut(0)[3..8].copy_from_slice(b"MSDOS");
        device.sector_mut(0)[0x0B..0x0D].copy_from_slice(&512u16.to_le_bytes());
        device.sector_mut(0)[0x36..0x3B].copy_from_slice(b"FAT32");

        let fs = Fat16::mount(device).unwrap();
        assert_eq!(fs.partition().fs_type, FsType::Unknown);
    }

    #[test]
    fn mount_fails_on_read_error() {
        let mut device = MemoryBlockDevice::new(64);
        device.fail_reads_of(Some(0));
        assert_eq!(Fat16::mount(device).err(), Some(FsError::Io));

        let mut device = formatted(FormatOptions {
            partition_start: Some(16),
            ..FormatOptions::new(4000)
        })
        .into_device();
        device.fail_reads_of(Some(16));
        assert_eq!(Fat16::mount(device).err(), Some(FsError::Io));
    }

    #[test]
    fn mount_requires_ready_device() {
        let mut device = MemoryBlockDevice::new(64);
        device.set_ready(false);
        assert_eq!(Fat16::mount(device).err(), Some(FsError::NotReady));
    }

    #[test]
    fn entry_write_then_read_returns_value() {
        let mut fs = formatted(FormatOptions::new(4096));
        let limit = fs.partition().cluster_limit();
        let mut rng = SmallRng::seed_from_u64(0x5EED);

        for _ in 0..200 {
            let cluster = rng.gen_range(0..limit) as u16;
            let value: u16 = rng.gen();
            fs.write_entry(cluster, FatEntry::from(value)).unwrap();
            assert_eq!(fs.read_entry(cluster).unwrap().cluster, value);
        }
    }

    #[test]
    fn entry_writes_reach_every_fat_copy() {
        let mut fs = formatted(FormatOptions::new(4096));
        fs.write_entry(300, FatEntry::from(0xBEEF)).unwrap();

        let p = *fs.partition();
        let (sector, offset) = p.fat_entry_location(300);
        let mirror = sector + p.sectors_per_fat as u32;
        assert_eq!(fs.device().sector(sector)[offset..offset + 2], [0xEFu8, 0xBE]);
        assert_eq!(fs.device().sector(mirror)[offset..offset + 2], [0xEFu8, 0xBE]);
    }

    #[test]
    fn table_reads_reuse_resident_sector() {
        let mut fs = formatted(FormatOptions::new(4096));
        fs.read_entry(2).unwrap();
        let reads = fs.device().reads();
        for cluster in 3..200 {
            fs.read_entry(cluster).unwrap();
        }
        assert_eq!(fs.device().reads(), reads);
    }

    #[test]
    fn create_then_reopen_in_new_session() {
        let mut device = MemoryBlockDevice::new(DISK_SECTORS);
        let (first, size) = {
            let mut fs = Fat16::format(&mut device, FormatOptions::new(4096)).unwrap();
            let mut file = fs.open(ShortName::parse("temp.csv"), OpenFlags::empty()).unwrap();
            fs.write(&mut file, b"21.5;22.0;\n").unwrap();
            (file.first_cluster(), file.size())
        };

        let mut fs = Fat16::mount(&mut device).unwrap();
        let file = fs
            .open(ShortName::parse("TEMP.CSV"), OpenFlags::DONT_CREATE)
            .unwrap();
        assert_eq!(file.first_cluster(), first);
        assert_eq!(file.size(), size);
        assert_eq!(file.size(), 11);
    }

    #[test]
    fn new_file_entry_layout() {
        let mut fs = small_volume();
        let file = fs.open(ShortName::new(b"log", b"txt"), OpenFlags::empty()).unwrap();

        assert_eq!(file.first_cluster(), 2);
        assert_eq!(file.last_cluster(), 2);
        assert_eq!(fs.read_entry(2).unwrap(), FatEntry::END);

        let root = fs.partition().root_dir_off;
        let raw = fs.device().sector(root);
        assert_eq!(&raw[..11], b"LOG     TXT");
        assert_eq!(raw[0x0B], ATTR_ARCHIVE);
        assert_eq!(raw[0x1A..0x20], [2u8, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn open_without_create_fails_for_missing_file() {
        let mut fs = small_volume();
        let result = fs.open(ShortName::parse("none.dat"), OpenFlags::DONT_CREATE);
        assert_eq!(result.err(), Some(FsError::NotFound));
    }

    #[test]
    fn create_reuses_deleted_slot() {
        let mut fs = small_volume();
        fs.open(ShortName::parse("a.txt"), OpenFlags::empty()).unwrap();
        fs.open(ShortName::parse("b.txt"), OpenFlags::empty()).unwrap();
        let root = fs.partition().root_dir_off;
        fs.device_mut().sector_mut(root)[0] = DELETED_ENTRY_MARKER;

        // The buffer still holds the old root sector
        let mut fs = Fat16::mount(fs.into_device()).unwrap();
        let file = fs.open(ShortName::parse("c.txt"), OpenFlags::empty()).unwrap();
        assert_eq!(file.dir_index(), 0);
    }

    #[test]
    fn directory_full_fails_create() {
        let mut fs = small_volume();
        for i in 0..32u8 {
            let name = [b'F', b'A' + i / 26, b'A' + i % 26];
            fs.open(ShortName::new(&name, b""), OpenFlags::empty()).unwrap();
        }
        let free = fs.find_free_cluster().unwrap();

        let result = fs.open(ShortName::parse("extra.txt"), OpenFlags::empty());
        assert_eq!(result.err(), Some(FsError::DirectoryFull));
        // No cluster was claimed for the failed file
        assert_eq!(fs.find_free_cluster().unwrap(), free);
    }

    #[test]
    fn failed_entry_write_releases_cluster() {
        let mut fs = small_volume();
        let root = fs.partition().root_dir_off;
        fs.device_mut().fail_writes_of(Some(root));

        let result = fs.open(ShortName::parse("lost.txt"), OpenFlags::empty());
        assert_eq!(result.err(), Some(FsError::Io));
        assert_eq!(fs.find_free_cluster().unwrap(), 2);
    }

    #[test]
    fn writes_stop_when_device_fails() {
        let mut fs = small_volume();
        let mut file = fs.open(ShortName::parse("w.bin"), OpenFlags::empty()).unwrap();
        fs.device_mut().fail_writes_after(Some(0));

        assert_eq!(fs.write(&mut file, b"abc"), Err(FsError::Io));
        assert_eq!(file.size(), 0);
        assert_eq!(file.position(), 0);
    }

    #[test]
    fn full_table_fails_create() {
        let mut fs = small_volume();
        let limit = fs.partition().cluster_limit();
        for cluster in 2..limit {
            fs.write_entry(cluster as u16, FatEntry::END).unwrap();
        }

        assert_eq!(fs.find_free_cluster().unwrap(), END_OF_CHAIN);
        let result = fs.open(ShortName::parse("full.log"), OpenFlags::empty());
        assert_eq!(result.err(), Some(FsError::NoSpace));
        assert_eq!(fs.next_entry(0).unwrap(), None);
    }

    #[test]
    fn write_grows_chain_across_clusters() {
        let mut fs = small_volume();
        let mut file = fs.open(ShortName::parse("big.bin"), OpenFlags::empty()).unwrap();
        let data = pattern(1300);

        // Uneven chunks so appends straddle sector boundaries
        for chunk in data.chunks(100) {
            assert_eq!(fs.write(&mut file, chunk).unwrap(), chunk.len());
        }
        assert_eq!(file.size(), 1300);
        assert_eq!(file.position(), 1300);
        assert_eq!(file.first_cluster(), 2);
        assert_eq!(file.last_cluster(), 4);
        assert_eq!(fs.read_entry(2).unwrap().cluster, 3);
        assert_eq!(fs.read_entry(3).unwrap().cluster, 4);
        assert!(fs.read_entry(4).unwrap().is_end_of_chain());

        let mut file = fs.open(ShortName::parse("big.bin"), OpenFlags::DONT_CREATE).unwrap();
        assert_eq!(file.last_cluster(), 4);
        let mut out = std::vec![0u8; 2000];
        assert_eq!(fs.read(&mut file, &mut out).unwrap(), 1300);
        assert_eq!(&out[..1300], &data[..]);
        assert_eq!(fs.read(&mut file, &mut out).unwrap(), 0);
    }

    #[test]
    fn interleaved_files_keep_separate_chains() {
        let mut fs = small_volume();
        let mut a = fs.open(ShortName::parse("a.log"), OpenFlags::empty()).unwrap();
        let mut b = fs.open(ShortName::parse("b.log"), OpenFlags::empty()).unwrap();
        let data_a = pattern(1024);
        let data_b: std::vec::Vec<u8> = pattern(1024).iter().map(|b| !b).collect();

        for (ca, cb) in data_a.chunks(256).zip(data_b.chunks(256)) {
            fs.write(&mut a, ca).unwrap();
            fs.write(&mut b, cb).unwrap();
        }

        let mut out = std::vec![0u8; 1024];
        let mut a = fs.open(ShortName::parse("a.log"), OpenFlags::DONT_CREATE).unwrap();
        fs.read(&mut a, &mut out).unwrap();
        assert_eq!(out, data_a);
        let mut b = fs.open(ShortName::parse("b.log"), OpenFlags::DONT_CREATE).unwrap();
        fs.read(&mut b, &mut out).unwrap();
        assert_eq!(out, data_b);
    }

    #[test]
    fn seek_and_read_back() {
        let mut fs = small_volume();
        let mut file = fs.open(ShortName::parse("s.bin"), OpenFlags::empty()).unwrap();
        let data = pattern(1500);
        fs.write(&mut file, &data).unwrap();

        let mut out = [0u8; 10];
        file.seek(SeekFrom::Start(1020)).unwrap();
        assert_eq!(fs.read(&mut file, &mut out).unwrap(), 10);
        assert_eq!(&out, &data[1020..1030]);

        // Backwards seek restarts the chain walk
        file.seek(SeekFrom::Start(5)).unwrap();
        fs.read(&mut file, &mut out).unwrap();
        assert_eq!(&out, &data[5..15]);

        file.seek(SeekFrom::End(-4)).unwrap();
        assert_eq!(fs.read(&mut file, &mut out).unwrap(), 4);
        assert_eq!(file.seek(SeekFrom::Current(1)), Err(FsError::InvalidOffset));
    }

    #[test]
    fn write_rejects_size_overflow() {
        let mut fs = small_volume();
        let mut file = fs.open(ShortName::parse("x.bin"), OpenFlags::empty()).unwrap();
        file.size = MAX_FILE_SIZE;
        assert_eq!(fs.write(&mut file, b"a"), Err(FsError::FileTooLarge));
        assert_eq!(fs.write(&mut file, b""), Ok(0));
    }

    #[test]
    fn failed_write_keeps_recorded_size() {
        let mut fs = small_volume();
        let mut file = fs.open(ShortName::parse("f.bin"), OpenFlags::empty()).unwrap();
        fs.write(&mut file, b"hello").unwrap();

        let data_sector = fs.partition().cluster_to_sector(file.first_cluster());
        fs.device_mut().fail_writes_of(Some(data_sector));
        assert_eq!(fs.write(&mut file, b" world"), Err(FsError::Io));
        assert_eq!(file.size(), 5);

        fs.device_mut().fail_writes_of(None);
        let file = fs.open(ShortName::parse("f.bin"), OpenFlags::DONT_CREATE).unwrap();
        assert_eq!(file.size(), 5);
    }

    #[test]
    fn failed_append_releases_new_clusters() {
        let mut fs = small_volume();
        let mut file = fs.open(ShortName::parse("t.bin"), OpenFlags::empty()).unwrap();
        fs.write(&mut file, &[0xAA; 512]).unwrap();

        let root = fs.partition().root_dir_off;
        fs.device_mut().fail_writes_of(Some(root));
        assert_eq!(fs.write(&mut file, &[0xBB; 600]), Err(FsError::Io));
        assert_eq!(fs.read_entry(2).unwrap(), FatEntry::END);
        assert!(fs.read_entry(3).unwrap().is_free());
        assert!(fs.read_entry(4).unwrap().is_free());

        fs.device_mut().fail_writes_of(None);
        let mut fs = Fat16::mount(fs.into_device()).unwrap();
        let mut file = fs.open(ShortName::parse("t.bin"), OpenFlags::DONT_CREATE).unwrap();
        assert_eq!(file.size(), 512);
        assert_eq!(file.last_cluster(), 2);
        fs.write(&mut file, b"0123456789").unwrap();

        let mut file = fs.open(ShortName::parse("t.bin"), OpenFlags::DONT_CREATE).unwrap();
        let mut out = [0u8; 522];
        assert_eq!(fs.read(&mut file, &mut out).unwrap(), 522);
        assert!(out[..512].iter().all(|&b| b == 0xAA));
        assert_eq!(&out[512..], b"0123456789");
    }

    #[test]
    fn append_reuses_cluster_linked_past_size() {
        let mut fs = small_volume();
        let mut file = fs.open(ShortName::parse("r.bin"), OpenFlags::empty()).unwrap();
        fs.write(&mut file, &[0xAA; 512]).unwrap();
        // Chain longer than the recorded size, holding stale data
        fs.write_entry(2, FatEntry::from(3)).unwrap();
        fs.write_entry(3, FatEntry::END).unwrap();
        let stale = fs.partition().cluster_to_sector(3);
        fs.device_mut().sector_mut(stale).fill(0xBB);

        let mut fs = Fat16::mount(fs.into_device()).unwrap();
        let mut file = fs.open(ShortName::parse("r.bin"), OpenFlags::DONT_CREATE).unwrap();
        assert_eq!(file.last_cluster(), 2);
        fs.write(&mut file, b"tail").unwrap();
        assert_eq!(file.last_cluster(), 3);
        assert_eq!(fs.find_free_cluster().unwrap(), 4);

        file.seek(SeekFrom::Start(512)).unwrap();
        let mut out = [0u8; 4];
        fs.read(&mut file, &mut out).unwrap();
        assert_eq!(&out, b"tail");
    }

    #[test]
    fn chain_shorter_than_size_is_reported() {
        let mut fs = small_volume();
        let mut file = fs.open(ShortName::parse("short.bin"), OpenFlags::empty()).unwrap();
        fs.write(&mut file, &[1; 100]).unwrap();
        let (sector, offset) = fs.partition().dir_entry_location(file.dir_index());
        fs.device_mut().sector_mut(sector)[offset + 0x1D] = 0x04;

        let mut fs = Fat16::mount(fs.into_device()).unwrap();
        let result = fs.open(ShortName::parse("short.bin"), OpenFlags::DONT_CREATE);
        assert_eq!(result.err(), Some(FsError::CorruptChain));
    }

    #[test]
    fn zero_sized_clusters_fail_io_calls() {
        let mut device = MemoryBlockDevice::new(64);
        BootSector {
            oem_name: *b"MSDOS5.0",
            bytes_per_sector: 512,
            sectors_per_cluster: 0,
            reserved_sectors: 1,
            fat_count: 1,
            root_dir_entries: 16,
            total_sectors_16: 64,
            media_type: 0xF8,
            sectors_per_fat: 1,
            hidden_sectors: 0,
            total_sectors_32: 0,
            volume_id: 1,
            volume_label: *b"NO NAME    ",
            fs_type: *b"FAT16   ",
        }
        .encode(device.sector_mut(0));

        let mut fs = Fat16::mount(device).unwrap();
        let mut file = fs.open(ShortName::parse("z.bin"), OpenFlags::empty()).unwrap();
        assert_eq!(fs.write(&mut file, b"abc"), Err(FsError::UnsupportedGeometry));
        assert_eq!(file.size(), 0);
        assert_eq!(fs.read_entry(file.first_cluster()).unwrap(), FatEntry::END);

        file.size = 3;
        let mut out = [0u8; 3];
        assert_eq!(fs.read(&mut file, &mut out), Err(FsError::UnsupportedGeometry));
    }

    #[test]
    fn write_allocates_cluster_for_chainless_file() {
        let mut fs = small_volume();
        let file = fs.open(ShortName::parse("e.txt"), OpenFlags::empty()).unwrap();
        let (sector, offset) = fs.partition().dir_entry_location(file.dir_index());
        // Empty files written elsewhere carry cluster 0
        fs.device_mut().sector_mut(sector)[offset + 0x1A] = 0;
        fs.write_entry(2, FatEntry::FREE).unwrap();

        let mut fs = Fat16::mount(fs.into_device()).unwrap();
        let mut file = fs.open(ShortName::parse("e.txt"), OpenFlags::DONT_CREATE).unwrap();
        assert_eq!(file.first_cluster(), 0);
        fs.write(&mut file, b"data").unwrap();
        assert_eq!(file.first_cluster(), 2);

        let mut file = fs.open(ShortName::parse("e.txt"), OpenFlags::DONT_CREATE).unwrap();
        assert_eq!(file.first_cluster(), 2);
        let mut out = [0u8; 4];
        fs.read(&mut file, &mut out).unwrap();
        assert_eq!(&out, b"data");
    }

    #[test]
    fn looping_chain_is_reported() {
        let mut fs = small_volume();
        let file = fs.open(ShortName::parse("loop.bin"), OpenFlags::empty()).unwrap();
        let first = file.first_cluster();
        fs.write_entry(first, FatEntry::from(first + 1)).unwrap();
        fs.write_entry(first + 1, FatEntry::from(first)).unwrap();

        let result = fs.open(ShortName::parse("loop.bin"), OpenFlags::DONT_CREATE);
        assert_eq!(result.err(), Some(FsError::CorruptChain));
    }

    #[test]
    fn chain_into_free_cluster_is_reported() {
        let mut fs = small_volume();
        let file = fs.open(ShortName::parse("bad.bin"), OpenFlags::empty()).unwrap();
        fs.write_entry(file.first_cluster(), FatEntry::from(50)).unwrap();

        let result = fs.open(ShortName::parse("bad.bin"), OpenFlags::DONT_CREATE);
        assert_eq!(result.err(), Some(FsError::CorruptChain));
    }

    #[test]
    fn lists_root_directory() {
        let mut fs = small_volume();
        for name in ["one.csv", "two.csv", "three.csv"] {
            fs.open(ShortName::parse(name), OpenFlags::empty()).unwrap();
        }

        let mut names = std::vec::Vec::new();
        let mut cursor = 0;
        while let Some((entry, next)) = fs.next_entry(cursor).unwrap() {
            names.push(entry.name.to_string());
            cursor = next;
        }
        assert_eq!(names, ["ONE.CSV", "TWO.CSV", "THREE.CSV"]);
    }
}
