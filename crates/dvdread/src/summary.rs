//! One-shot description of a disc, as printed by `dvdread-info`

use crate::domain::{Domain, MAX_TITLE};
use crate::error::{DvdError, Result};
use crate::reader::{DvdReader, DvdStat, ReaderMode, VolumeInfo};
use serde::Serialize;
use std::fmt;

/// What can be learned about a disc without parsing IFO files
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscSummary {
    /// How the disc was read
    pub mode: ReaderMode,
    /// UDF volume identifiers, in image mode
    pub udf_volume: Option<VolumeSummary>,
    /// ISO 9660 volume identifiers, in image mode
    pub iso_volume: Option<VolumeSummary>,
    /// Disc ID as lowercase hex
    pub disc_id: Option<String>,
    /// Title sets from the video manager up to the first missing one
    pub title_sets: Vec<TitleSetSummary>,
}

/// Volume identifiers ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeSummary {
    /// Volume identifier
    pub identifier: String,
    /// Volume set identifier as hex
    pub set_identifier: String,
}

impl From<VolumeInfo> for VolumeSummary {
    fn from(info: VolumeInfo) -> Self {
        Self {
            identifier: info.identifier,
            set_identifier: hex::encode(info.set_identifier),
        }
    }
}

/// File sizes of one title set; title 0 is the video manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TitleSetSummary {
    /// Title set number
    pub title: u8,
    /// Info file
    pub info: Option<DvdStat>,
    /// Info backup file
    pub backup: Option<DvdStat>,
    /// Menu VOBs
    pub menu_vobs: Option<DvdStat>,
    /// Title VOBs
    pub title_vobs: Option<DvdStat>,
}

impl DvdReader {
    /// Describe the disc
    ///
    /// Anything missing, or needing block access in directory tree mode, is
    /// left out rather than failing the summary.
    pub fn summary(&self) -> Result<DiscSummary> {
        let mut title_sets = Vec::new();
        for title in 0..=MAX_TITLE {
            let stat = |domain| optional(self.file_stat(title, domain));
            let set = TitleSetSummary {
                title,
                info: stat(Domain::InfoFile)?,
                backup: stat(Domain::InfoBackupFile)?,
                menu_vobs: stat(Domain::MenuVobs)?,
                title_vobs: stat(Domain::TitleVobs)?,
            };
            if title > 0 && set.info.is_none() {
                break;
            }
            title_sets.push(set);
        }

        Ok(DiscSummary {
            mode: self.mode(),
            udf_volume: optional(self.udf_volume_info())?.map(VolumeSummary::from),
            iso_volume: optional(self.iso_volume_info())?.map(VolumeSummary::from),
            disc_id: optional(self.disc_id())?.map(hex::encode),
            title_sets,
        })
    }
}

/// Treat absence as `None`
fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(
            DvdError::NotFound(_) | DvdError::NoBlockAccess | DvdError::InvalidTitle { .. },
        ) => Ok(None),
        Err(e) => Err(e),
    }
}

impl fmt::Display for DiscSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            ReaderMode::Image => "image",
            ReaderMode::DirectoryTree => "directory tree",
        };
        writeln!(f, "Mode:            {mode}")?;
        if let Some(udf) = &self.udf_volume {
            writeln!(f, "UDF volume:      {}", udf.identifier)?;
        }
        if let Some(iso) = &self.iso_volume {
            writeln!(f, "ISO volume:      {}", iso.identifier)?;
        }
        if let Some(id) = &self.disc_id {
            writeln!(f, "Disc ID:         {id}")?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>5} {:>12} {:>12} {:>12} {:>14} {:>5}",
            "title", "ifo", "bup", "menu", "title vobs", "parts"
        )?;
        for set in &self.title_sets {
            let size = |stat: &Option<DvdStat>| {
                stat.as_ref()
                    .map_or_else(|| "-".to_string(), |stat| stat.size.to_string())
            };
            let parts = set.title_vobs.as_ref().map_or(0, |stat| stat.parts.len());
            writeln!(
                f,
                "{:>5} {:>12} {:>12} {:>12} {:>14} {:>5}",
                set.title,
                size(&set.info),
                size(&set.backup),
                size(&set.menu_vobs),
                size(&set.title_vobs),
                parts
            )?;
        }
        Ok(())
    }
}
