//! Per-reader cache of decoded UDF structures
//!
//! Volume structures are read once and reused for every lookup. ICBs are
//! cached by partition-relative location, directories by the location of
//! their first block. There is no eviction: a DVD has a few dozen files.
//! The cache belongs to one reader and is freed with it.

use crate::ad::AllocationDescriptor;
use crate::descriptor::AnchorPointer;
use crate::icb::MappedIcb;
use crate::volume::{Partition, VolumeIdentifiers};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Whether decoded structures are kept between lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheLevel {
    /// Every lookup rereads the disc
    Disabled,
    /// Keep everything that was decoded
    #[default]
    Enabled,
}

impl CacheLevel {
    /// Map a numeric level: any positive value enables caching
    pub const fn from_level(level: i32) -> Self {
        if level > 0 {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }

    /// Numeric level, 1 or 0
    pub const fn as_level(self) -> i32 {
        match self {
            Self::Disabled => 0,
            Self::Enabled => 1,
        }
    }
}

/// Entry counts, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Anchor pointer is cached
    pub anchor: bool,
    /// Primary volume identifiers are cached
    pub primary_volume: bool,
    /// Partition 0 is cached
    pub partition: bool,
    /// Root directory ICB is cached
    pub root_icb: bool,
    /// Number of resolved ICBs
    pub icbs: usize,
    /// Number of directories held as raw blocks
    pub directories: usize,
}

/// Cache owned by one reader
#[derive(Debug, Default)]
pub struct UdfCache {
    level: CacheLevel,
    anchor: Option<AnchorPointer>,
    primary_volume: Option<VolumeIdentifiers>,
    partition: Option<Partition>,
    root_icb: Option<AllocationDescriptor>,
    icbs: HashMap<u32, MappedIcb>,
    directories: HashMap<u32, Vec<u8>>,
}

impl UdfCache {
    /// Create an empty cache at `level`
    pub fn new(level: CacheLevel) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    /// Current level
    pub const fn level(&self) -> CacheLevel {
        self.level
    }

    /// Change the level; disabling drops everything cached so far
    pub fn set_level(&mut self, level: CacheLevel) {
        if level == CacheLevel::Disabled {
            self.clear();
        }
        self.level = level;
    }

    fn enabled(&self) -> bool {
        self.level == CacheLevel::Enabled
    }

    /// Drop every entry, keeping the level
    pub fn clear(&mut self) {
        self.anchor = None;
        self.primary_volume = None;
        self.partition = None;
        self.root_icb = None;
        self.icbs = HashMap::new();
        self.directories = HashMap::new();
    }

    /// Entry counts
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            anchor: self.anchor.is_some(),
            primary_volume: self.primary_volume.is_some(),
            partition: self.partition.is_some(),
            root_icb: self.root_icb.is_some(),
            icbs: self.icbs.len(),
            directories: self.directories.len(),
        }
    }

    pub(crate) fn anchor(&self) -> Option<AnchorPointer> {
        self.anchor.filter(|_| self.enabled())
    }

    pub(crate) fn set_anchor(&mut self, anchor: AnchorPointer) {
        if self.enabled() {
            self.anchor = Some(anchor);
        }
    }

    pub(crate) fn primary_volume(&self) -> Option<&VolumeIdentifiers> {
        self.primary_volume.as_ref().filter(|_| self.enabled())
    }

    pub(crate) fn set_primary_volume(&mut self, identifiers: VolumeIdentifiers) {
        if self.enabled() {
            self.primary_volume = Some(identifiers);
        }
    }

    pub(crate) fn partition(&self) -> Option<Partition> {
        self.partition.clone().filter(|_| self.enabled())
    }

    pub(crate) fn set_partition(&mut self, partition: Partition) {
        if self.enabled() {
            self.partition = Some(partition);
        }
    }

    pub(crate) fn root_icb(&self) -> Option<AllocationDescriptor> {
        self.root_icb.filter(|_| self.enabled())
    }

    pub(crate) fn set_root_icb(&mut self, icb: AllocationDescriptor) {
        if self.enabled() {
            self.root_icb = Some(icb);
        }
    }

    pub(crate) fn icb(&self, location: u32) -> Option<MappedIcb> {
        if !self.enabled() {
            return None;
        }
        self.icbs.get(&location).copied()
    }

    pub(crate) fn set_icb(&mut self, location: u32, icb: MappedIcb) {
        if self.enabled() {
            self.icbs.insert(location, icb);
        }
    }

    pub(crate) fn directory(&self, location: u32) -> Option<&[u8]> {
        if !self.enabled() {
            return None;
        }
        self.directories.get(&location).map(Vec::as_slice)
    }

    pub(crate) fn set_directory(&mut self, location: u32, data: Vec<u8>) {
        if self.enabled() {
            self.directories.insert(location, data);
        }
    }
}
