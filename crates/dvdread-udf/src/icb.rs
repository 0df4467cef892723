//! File Entries and their ICB tags

use crate::ad::{AdForm, AllocationDescriptor};
use crate::descriptor::{DescriptorTag, decode_at, tag, tag_identifier};
use crate::error::{Result, UdfError};
use binrw::{BinRead, BinWrite};
use tracing::debug;

/// Offset of the ICB tag inside a File Entry
pub const ICB_TAG_OFFSET: usize = 16;

/// Offset of the information length inside a File Entry
pub const INFORMATION_LENGTH_OFFSET: usize = 56;

/// Offsets of (L_EA, L_AD, first AD) in a File Entry
pub const FILE_ENTRY_LAYOUT: (usize, usize, usize) = (168, 172, 176);

/// Offsets of (L_EA, L_AD, first AD) in an Extended File Entry
pub const EXTENDED_FILE_ENTRY_LAYOUT: (usize, usize, usize) = (208, 212, 216);

/// ICB tag (ECMA-167 4/14.6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct IcbTag {
    /// Prior recorded number of direct entries
    pub prior_entries: u32,
    /// Strategy type
    pub strategy_type: u16,
    /// Strategy parameter
    pub strategy_parameter: u16,
    /// Maximum number of entries
    pub max_entries: u16,
    /// File type, see [`FileType`]
    #[brw(pad_before = 1)]
    pub file_type: u8,
    /// Parent ICB location
    pub parent: [u8; 6],
    /// Flags, the low three bits select the [`AdForm`]
    pub flags: u16,
}

/// What a File Entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// A directory of File Identifier Descriptors
    Directory,
    /// A regular file
    File,
    /// Anything else, with the raw type value
    Other(u8),
}

impl FileType {
    /// Decode the ICB tag file type byte
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            4 => Self::Directory,
            5 => Self::File,
            other => Self::Other(other),
        }
    }

    /// Raw ICB tag value
    pub const fn to_raw(self) -> u8 {
        match self {
            Self::Directory => 4,
            Self::File => 5,
            Self::Other(raw) => raw,
        }
    }
}

/// The data of a file as one partition-relative extent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataExtent {
    /// Partition-relative first block, 0 for empty or embedded data
    pub location: u32,
    /// Length in bytes
    pub length: u64,
    /// Partition reference number
    pub partition: u16,
}

/// What an ICB resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedIcb {
    /// File type from the ICB tag
    pub file_type: FileType,
    /// File data
    pub data: DataExtent,
}

/// A decoded File Entry or Extended File Entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// ICB tag
    pub icb_tag: IcbTag,
    /// Information length in bytes
    pub information_length: u64,
    /// Allocation descriptor encoding, `None` for reserved values
    pub form: Option<AdForm>,
    /// Data extents in recorded order
    pub extents: Vec<AllocationDescriptor>,
}

impl FileEntry {
    /// Decode the (Extended) File Entry at the start of `block`
    ///
    /// Short descriptors are taken to be relative to `partition`.
    pub fn parse(block: &[u8], partition: u16) -> Result<Self> {
        let header: DescriptorTag = decode_at(block, 0)?;
        let (ea_offset, ad_offset, base) = match header.identifier {
            tag::FILE_ENTRY => FILE_ENTRY_LAYOUT,
            tag::EXTENDED_FILE_ENTRY => EXTENDED_FILE_ENTRY_LAYOUT,
            found => {
                return Err(UdfError::UnexpectedTag {
                    expected: tag::FILE_ENTRY,
                    found,
                });
            }
        };

        let icb_tag: IcbTag = decode_at(block, ICB_TAG_OFFSET)?;
        let information_length: u64 = decode_at(block, INFORMATION_LENGTH_OFFSET)?;
        let ea_length: u32 = decode_at(block, ea_offset)?;
        let ad_length: u32 = decode_at(block, ad_offset)?;

        let start = base.saturating_add(ea_length as usize);
        let end = start.saturating_add(ad_length as usize);
        let area = block.get(start..end).ok_or(UdfError::Truncated {
            offset: start,
            needed: ad_length as usize,
            available: block.len().saturating_sub(start),
        })?;

        let form = AdForm::from_icb_flags(icb_tag.flags);
        let extents = match form {
            Some(AdForm::Embedded) => vec![AdForm::Embedded.decode(area, partition)?],
            Some(form) => {
                let mut extents = Vec::new();
                for chunk in area.chunks_exact(form.size()) {
                    let ad = form.decode(chunk, partition)?;
                    if ad.length == 0 {
                        break;
                    }
                    if ad.flags == 3 {
                        debug!("allocation extent continuation not followed");
                        break;
                    }
                    extents.push(ad);
                }
                extents
            }
            None => {
                debug!("reserved allocation descriptor type {}", icb_tag.flags & 7);
                Vec::new()
            }
        };

        Ok(Self {
            icb_tag,
            information_length,
            form,
            extents,
        })
    }

    /// Type of the described file
    pub const fn file_type(&self) -> FileType {
        FileType::from_raw(self.icb_tag.file_type)
    }

    /// Collapse the extents into one
    ///
    /// Starts at the first extent and keeps adding lengths while each
    /// following extent continues directly after the previous one. A file
    /// without extents reports its information length at location 0.
    pub fn data_extent(&self) -> DataExtent {
        let Some(first) = self.extents.first() else {
            return DataExtent {
                location: 0,
                length: self.information_length,
                partition: 0,
            };
        };

        let mut length = u64::from(first.length);
        let mut previous = first;
        for next in &self.extents[1..] {
            let contiguous = next.partition == previous.partition
                && previous.length % dvdread_input::BLOCK_SIZE as u32 == 0
                && next.location == previous.end_block();
            if !contiguous {
                debug!(
                    "extent at {} does not follow {}, ignoring the rest",
                    next.location, previous.location
                );
                break;
            }
            length += u64::from(next.length);
            previous = next;
        }

        DataExtent {
            location: first.location,
            length,
            partition: first.partition,
        }
    }
}

impl From<&FileEntry> for MappedIcb {
    fn from(entry: &FileEntry) -> Self {
        Self {
            file_type: entry.file_type(),
            data: entry.data_extent(),
        }
    }
}

/// Whether `block` starts with a File Entry of either kind
pub fn is_file_entry(block: &[u8]) -> bool {
    matches!(
        tag_identifier(block),
        Some(tag::FILE_ENTRY | tag::EXTENDED_FILE_ENTRY)
    )
}
