//! Path resolution over a DVD-Video UDF volume

use crate::ad::AllocationDescriptor;
use crate::cache::{CacheLevel, CacheStats, UdfCache};
use crate::descriptor::{AnchorPointer, file_set_root, tag, tag_identifier};
use crate::directory::{entries, lookup};
use crate::error::{Result, UdfError};
use crate::icb::{DataExtent, FileEntry, FileType, MappedIcb, is_file_entry};
use crate::volume::{
    Partition, VolumeIdentifiers, find_anchor, find_partition, find_primary_volume, read_blocks,
};
use dvdread_input::{BLOCK_SIZE, BlockInput};
use tracing::debug;

/// Directory whose entries are all resolved on its first scan
const PRELOAD_DIRECTORY: &str = "VIDEO_TS";

/// Where a file's data lives on the disc
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileLocation {
    /// Absolute first block
    pub block: u32,
    /// Length in bytes
    pub length: u64,
}

impl FileLocation {
    /// Number of blocks the data occupies, rounding up
    pub fn blocks(&self) -> u32 {
        let blocks = self.length.div_ceil(BLOCK_SIZE as u64);
        u32::try_from(blocks).unwrap_or(u32::MAX)
    }
}

/// A UDF volume being read from some block device
///
/// Holds no device itself; every call takes the device to read from, so
/// one reader can share its device between file reads and lookups.
#[derive(Debug, Default)]
pub struct UdfFs {
    cache: UdfCache,
}

impl UdfFs {
    /// Create a walker with an empty cache at `level`
    pub fn new(level: CacheLevel) -> Self {
        Self {
            cache: UdfCache::new(level),
        }
    }

    /// Current cache level
    pub const fn cache_level(&self) -> CacheLevel {
        self.cache.level()
    }

    /// Change the cache level
    pub fn set_cache_level(&mut self, level: CacheLevel) {
        self.cache.set_level(level);
    }

    /// Cache entry counts
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Resolve an absolute path such as `/VIDEO_TS/VTS_01_1.VOB`
    ///
    /// Components match case-insensitively. Returns `Ok(None)` when a
    /// component does not exist or the file has no data block. Errors are
    /// reserved for unreadable or malformed volumes.
    pub fn find_file<D: BlockInput + ?Sized>(
        &mut self,
        device: &mut D,
        path: &str,
    ) -> Result<Option<FileLocation>> {
        let partition = self.partition(device)?;
        let root = self.root_icb(device, &partition)?;

        let Some(mut file) = self.map_icb(device, &partition, root)? else {
            debug!("root directory ICB does not resolve");
            return Ok(None);
        };
        if file.file_type != FileType::Directory {
            debug!("root ICB is not a directory");
            return Ok(None);
        }

        let mut preload = false;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            if file.file_type != FileType::Directory {
                return Ok(None);
            }
            let Some(icb) = self.scan_directory(device, &partition, file.data, component, preload)?
            else {
                return Ok(None);
            };
            let Some(next) = self.map_icb(device, &partition, icb)? else {
                return Ok(None);
            };
            file = next;
            preload = component.eq_ignore_ascii_case(PRELOAD_DIRECTORY);
        }

        if file.data.partition != partition.number || file.data.location == 0 {
            return Ok(None);
        }

        Ok(Some(FileLocation {
            block: partition.start.saturating_add(file.data.location),
            length: file.data.length,
        }))
    }

    /// Volume identifier from the Primary Volume Descriptor
    pub fn volume_identifier<D: BlockInput + ?Sized>(
        &mut self,
        device: &mut D,
    ) -> Result<Option<String>> {
        Ok(self
            .primary_volume(device)?
            .map(|ids| ids.identifier))
    }

    /// Raw 128-byte volume set identifier
    pub fn volume_set_identifier<D: BlockInput + ?Sized>(
        &mut self,
        device: &mut D,
    ) -> Result<Option<[u8; 128]>> {
        Ok(self
            .primary_volume(device)?
            .map(|ids| ids.set_identifier))
    }

    /// Partition 0 of the volume
    pub fn partition<D: BlockInput + ?Sized>(&mut self, device: &mut D) -> Result<Partition> {
        if let Some(partition) = self.cache.partition() {
            return Ok(partition);
        }
        let anchor = self.anchor(device)?;
        let partition = find_partition(device, &anchor, 0)?;
        debug!(
            "partition {} ({}) at block {}, {} blocks",
            partition.number, partition.contents, partition.start, partition.length
        );
        self.cache.set_partition(partition.clone());
        Ok(partition)
    }

    fn anchor<D: BlockInput + ?Sized>(&mut self, device: &mut D) -> Result<AnchorPointer> {
        if let Some(anchor) = self.cache.anchor() {
            return Ok(anchor);
        }
        let anchor = find_anchor(device)?;
        self.cache.set_anchor(anchor);
        Ok(anchor)
    }

    fn primary_volume<D: BlockInput + ?Sized>(
        &mut self,
        device: &mut D,
    ) -> Result<Option<VolumeIdentifiers>> {
        if let Some(ids) = self.cache.primary_volume() {
            return Ok(Some(ids.clone()));
        }
        let anchor = self.anchor(device)?;
        let ids = find_primary_volume(device, &anchor)?;
        if let Some(ids) = &ids {
            self.cache.set_primary_volume(ids.clone());
        }
        Ok(ids)
    }

    fn root_icb<D: BlockInput + ?Sized>(
        &mut self,
        device: &mut D,
        partition: &Partition,
    ) -> Result<AllocationDescriptor> {
        if let Some(root) = self.cache.root_icb() {
            return Ok(root);
        }

        let end = partition.start.saturating_add(partition.length);
        let mut root = None;
        for block in partition.start..end {
            let Some(data) = read_blocks(device, block, 1)? else {
                continue;
            };
            match tag_identifier(&data) {
                Some(tag::FILE_SET) => {
                    root = Some(AllocationDescriptor::from(file_set_root(&data)?));
                    break;
                }
                Some(tag::TERMINATING) => break,
                _ => {}
            }
        }

        let root = root.ok_or(UdfError::FileSetNotFound)?;
        if root.partition != 0 {
            return Err(UdfError::InvalidRootIcb {
                partition: root.partition,
            });
        }
        self.cache.set_root_icb(root);
        Ok(root)
    }

    /// Read the File Entry an ICB points at
    ///
    /// The whole ICB extent is searched for the first (Extended) File
    /// Entry.
    fn map_icb<D: BlockInput + ?Sized>(
        &mut self,
        device: &mut D,
        partition: &Partition,
        icb: AllocationDescriptor,
    ) -> Result<Option<MappedIcb>> {
        if let Some(mapped) = self.cache.icb(icb.location) {
            return Ok(Some(mapped));
        }

        let first = partition.start.saturating_add(icb.location);
        let blocks = icb.length.div_ceil(BLOCK_SIZE as u32).max(1);
        for block in first..first.saturating_add(blocks) {
            let Some(data) = read_blocks(device, block, 1)? else {
                continue;
            };
            if is_file_entry(&data) {
                let entry = FileEntry::parse(&data, partition.number)?;
                let mapped = MappedIcb::from(&entry);
                self.cache.set_icb(icb.location, mapped);
                return Ok(Some(mapped));
            }
        }

        debug!("no file entry in ICB at {}", icb.location);
        Ok(None)
    }

    /// Raw contents of a directory, truncated to its length
    fn directory_data<D: BlockInput + ?Sized>(
        &mut self,
        device: &mut D,
        partition: &Partition,
        directory: DataExtent,
    ) -> Result<Option<Vec<u8>>> {
        if let Some(data) = self.cache.directory(directory.location) {
            return Ok(Some(data.to_vec()));
        }

        let length = usize::try_from(directory.length).unwrap_or(usize::MAX);
        let blocks = length.div_ceil(BLOCK_SIZE).max(1);
        let start = partition.start.saturating_add(directory.location);
        let Some(mut data) = read_blocks(device, start, blocks)? else {
            return Ok(None);
        };
        data.truncate(length);
        self.cache.set_directory(directory.location, data.clone());
        Ok(Some(data))
    }

    /// Find `name` in a directory, returning the ICB of the entry
    ///
    /// With `preload`, the first scan of the directory also resolves every
    /// entry into the ICB cache.
    fn scan_directory<D: BlockInput + ?Sized>(
        &mut self,
        device: &mut D,
        partition: &Partition,
        directory: DataExtent,
        name: &str,
        preload: bool,
    ) -> Result<Option<AllocationDescriptor>> {
        let first_visit = self.cache.directory(directory.location).is_none();
        let Some(data) = self.directory_data(device, partition, directory)? else {
            return Ok(None);
        };

        if preload && first_visit && self.cache.level() == CacheLevel::Enabled {
            for entry in entries(&data) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        debug!("stopping preload at bad directory record: {e}");
                        break;
                    }
                };
                if entry.is_deleted() || entry.is_parent() {
                    continue;
                }
                if let Err(e) = self.map_icb(device, partition, entry.icb) {
                    debug!("cannot preload ICB at {}: {e}", entry.icb.location);
                }
            }
            debug!("preloaded {} entries", self.cache.stats().icbs);
        }

        Ok(lookup(&data, name)?.map(|entry| entry.icb))
    }
}
