//! Directory contents: File Identifier Descriptors

use crate::ad::{AllocationDescriptor, LongAd};
use crate::descriptor::{DescriptorTag, dchars, decode_at, tag, tag_identifier};
use crate::error::{Result, UdfError};
use binrw::{BinRead, BinWrite};
use tracing::debug;

/// Size of the fixed part of a File Identifier Descriptor
pub const FID_HEADER_SIZE: usize = 38;

/// File characteristics bits (ECMA-167 4/14.4.3)
pub mod characteristics {
    /// Hidden from the user
    pub const HIDDEN: u8 = 0x01;
    /// The entry is a directory
    pub const DIRECTORY: u8 = 0x02;
    /// The entry was deleted
    pub const DELETED: u8 = 0x04;
    /// The entry names the parent directory
    pub const PARENT: u8 = 0x08;
}

/// Fixed part of a File Identifier Descriptor (ECMA-167 4/14.4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct FileIdentifierHeader {
    /// Descriptor tag
    pub tag: DescriptorTag,
    /// File version number
    pub version: u16,
    /// See [`characteristics`]
    pub characteristics: u8,
    /// Length of the name in bytes (L_FI)
    pub name_length: u8,
    /// ICB of the named file
    pub icb: LongAd,
    /// Length of the implementation use area (L_IU)
    pub implementation_use_length: u16,
}

/// Bytes occupied by a descriptor with the given name and implementation
/// use lengths, padded to a multiple of four
pub const fn record_size(name_length: usize, implementation_use_length: usize) -> usize {
    4 * ((FID_HEADER_SIZE + name_length + implementation_use_length + 3) / 4)
}

/// One directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentifier {
    /// Characteristics bits
    pub characteristics: u8,
    /// Decoded name, empty for the parent entry
    pub name: String,
    /// ICB of the named file
    pub icb: AllocationDescriptor,
}

impl FileIdentifier {
    /// Entry was deleted
    pub const fn is_deleted(&self) -> bool {
        self.characteristics & characteristics::DELETED != 0
    }

    /// Entry names the parent directory
    pub const fn is_parent(&self) -> bool {
        self.characteristics & characteristics::PARENT != 0
    }

    /// Entry names a directory
    pub const fn is_directory(&self) -> bool {
        self.characteristics & characteristics::DIRECTORY != 0
    }

    /// Whether this entry is a live file or directory called `name`,
    /// ignoring ASCII case
    pub fn matches(&self, name: &str) -> bool {
        !self.is_deleted() && !self.is_parent() && self.name.eq_ignore_ascii_case(name)
    }
}

/// Iterator over the File Identifier Descriptors of a directory
///
/// Stops at the end of the data or at the first block that is not a File
/// Identifier Descriptor.
#[derive(Debug, Clone)]
pub struct Entries<'a> {
    data: &'a [u8],
    offset: usize,
}

/// Iterate the entries of a directory whose contents are `data`
pub fn entries(data: &[u8]) -> Entries<'_> {
    Entries { data, offset: 0 }
}

impl Entries<'_> {
    fn parse_next(&mut self) -> Result<Option<FileIdentifier>> {
        let remaining = &self.data[self.offset..];
        if remaining.len() < FID_HEADER_SIZE {
            return Ok(None);
        }
        if tag_identifier(remaining) != Some(tag::FILE_IDENTIFIER) {
            debug!(
                "directory scan stopped at offset {} on a non-FID descriptor",
                self.offset
            );
            return Ok(None);
        }

        let header: FileIdentifierHeader = decode_at(remaining, 0)?;
        let name_length = usize::from(header.name_length);
        let implementation_use_length = usize::from(header.implementation_use_length);

        let name_start = FID_HEADER_SIZE + implementation_use_length;
        let name_bytes = remaining
            .get(name_start..name_start + name_length)
            .ok_or(UdfError::Truncated {
                offset: self.offset + name_start,
                needed: name_length,
                available: remaining.len().saturating_sub(name_start),
            })?;

        self.offset += record_size(name_length, implementation_use_length);

        Ok(Some(FileIdentifier {
            characteristics: header.characteristics,
            name: dchars(name_bytes),
            icb: header.icb.into(),
        }))
    }
}

impl Iterator for Entries<'_> {
    type Item = Result<FileIdentifier>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.data.len() {
            return None;
        }
        match self.parse_next() {
            Ok(entry) => entry.map(Ok),
            Err(e) => {
                self.offset = self.data.len();
                Some(Err(e))
            }
        }
    }
}

/// Find the live entry called `name`, ignoring ASCII case
pub fn lookup(data: &[u8], name: &str) -> Result<Option<FileIdentifier>> {
    for entry in entries(data) {
        let entry = entry?;
        if entry.matches(name) {
            return Ok(Some(entry));
        }
    }
    Ok(None)
}
