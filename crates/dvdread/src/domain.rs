//! File domains and the fixed DVD-Video file names

use crate::error::DvdError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest title set number a VTS file name can carry
pub const MAX_TITLE: u8 = 99;

/// Most parts a title VOB set can be split into
pub const MAX_VOB_PARTS: u8 = 9;

/// Which kind of file of a title set to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Domain {
    /// `VIDEO_TS.IFO` or `VTS_NN_0.IFO`
    InfoFile = 0,
    /// `VIDEO_TS.BUP` or `VTS_NN_0.BUP`
    InfoBackupFile = 1,
    /// `VIDEO_TS.VOB` or `VTS_NN_0.VOB`
    MenuVobs = 2,
    /// `VTS_NN_1.VOB` to `VTS_NN_9.VOB`, read as one file
    TitleVobs = 3,
}

impl Domain {
    /// Every domain, in raw value order
    pub const ALL: [Self; 4] = [
        Self::InfoFile,
        Self::InfoBackupFile,
        Self::MenuVobs,
        Self::TitleVobs,
    ];

    /// Whether files of this domain are VOBs and carry a CSS title
    pub const fn is_vob(self) -> bool {
        matches!(self, Self::MenuVobs | Self::TitleVobs)
    }

    /// Name of the single file backing `title` in this domain
    ///
    /// Title VOBs are split; this returns part 1. Use [`title_vob_name`]
    /// for the others. Returns `None` for title VOBs of title 0, which do
    /// not exist.
    pub fn file_name(self, title: u8) -> Option<String> {
        let extension = match self {
            Self::InfoFile => "IFO",
            Self::InfoBackupFile => "BUP",
            Self::MenuVobs => "VOB",
            Self::TitleVobs => return (title > 0).then(|| title_vob_name(title, 1)),
        };
        if title == 0 {
            Some(format!("VIDEO_TS.{extension}"))
        } else {
            Some(format!("VTS_{title:02}_0.{extension}"))
        }
    }
}

impl TryFrom<u8> for Domain {
    type Error = DvdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::InfoFile),
            1 => Ok(Self::InfoBackupFile),
            2 => Ok(Self::MenuVobs),
            3 => Ok(Self::TitleVobs),
            other => Err(DvdError::UnsupportedDomain(other)),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InfoFile => "info file",
            Self::InfoBackupFile => "info backup file",
            Self::MenuVobs => "menu VOBs",
            Self::TitleVobs => "title VOBs",
        };
        f.write_str(name)
    }
}

/// `VTS_NN_P.VOB`
pub fn title_vob_name(title: u8, part: u8) -> String {
    format!("VTS_{title:02}_{part}.VOB")
}

/// Decryption context of a VOB set: `title << 1 | menu`
///
/// IFO and BUP files are never encrypted and have no tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CssTag(u16);

impl CssTag {
    /// Tag for the menu or title VOBs of `title`
    pub const fn new(title: u8, menu: bool) -> Self {
        let menu = if menu { 1 } else { 0 };
        Self(((title as u16) << 1) | menu)
    }

    /// Title set number
    pub const fn title(self) -> u8 {
        (self.0 >> 1) as u8
    }

    /// Whether the tag belongs to menu VOBs
    pub const fn is_menu(self) -> bool {
        self.0 & 1 == 1
    }

    /// Packed value
    pub const fn raw(self) -> u16 {
        self.0
    }
}
