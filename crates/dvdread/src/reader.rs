//! Opening a disc and the files on it
//!
//! A [`DvdReader`] works in one of two modes:
//!
//! - **image**: an ISO file or DVD device, read block by block through a
//!   [`BlockInput`]. Files are found by walking the UDF filesystem, and CSS
//!   title keys can be switched.
//! - **directory tree**: a copy of the disc on a regular filesystem. Each
//!   file is opened on its own and nothing is descrambled.
//!
//! Opening a directory first looks for a DVD device mounted there and uses
//! it as an image when it can.

use crate::config::{CssMode, NO_KEYS_ENV, ReaderConfig};
use crate::domain::{CssTag, Domain, MAX_TITLE, MAX_VOB_PARTS, title_vob_name};
use crate::error::{DvdError, Result};
use crate::file::{DvdFile, FilePart};
use crate::{mount, tree};
use dvdread_input::{BLOCK_SIZE, BlockInput, InputBackend, ReadFlags};
use dvdread_udf::{CacheLevel, FileLocation, UdfFs};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell, RefMut};
use std::fmt;
use std::fs::FileType;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Block holding the ISO 9660 primary volume descriptor
pub const ISO_VOLUME_BLOCK: u32 = 16;

/// Info files hashed into the disc ID
const DISC_ID_TITLES: u8 = 10;

/// How the reader reaches the disc
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderMode {
    /// Image file or device, read through the UDF filesystem
    Image,
    /// Files copied to a directory
    DirectoryTree,
}

/// Progress of the up-front CSS key cracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CssState {
    /// No decryption in play
    #[default]
    None,
    /// Keys have not been cracked yet
    NeedsInit,
    /// Keys have been cracked, or cracking was skipped
    Done,
}

/// Volume identifiers of a disc
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInfo {
    /// Volume identifier, decoded
    pub identifier: String,
    /// Raw volume set identifier
    pub set_identifier: Vec<u8>,
}

/// Byte sizes of the file or files behind a title and domain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DvdStat {
    /// Total size in bytes
    pub size: u64,
    /// Size of each part, in order
    pub parts: Vec<u64>,
}

enum Storage {
    Image {
        device: RefCell<Box<dyn BlockInput>>,
        path: Option<PathBuf>,
    },
    Tree {
        root: PathBuf,
    },
}

/// An open DVD-Video disc
///
/// Not `Sync`: the current CSS title is shared by every file opened from
/// the reader, so reads must be serialized by the caller.
pub struct DvdReader {
    storage: Storage,
    backend: InputBackend,
    udf: RefCell<UdfFs>,
    css_state: Cell<CssState>,
    css_title: Cell<Option<CssTag>>,
    config: ReaderConfig,
}

impl DvdReader {
    /// Open a device, image file or directory with settings from the
    /// environment
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, ReaderConfig::from_env())
    }

    /// Open a device, image file or directory
    ///
    /// Images must hold a UDF filesystem with a resolvable root directory.
    /// Directories are read through the device mounted on them when there
    /// is one, else file by file.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: ReaderConfig) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        let file_type = metadata.file_type();
        let backend = config.backend();

        if file_type.is_file() || is_device(&file_type) {
            let device = mount::raw_device(path);
            return Self::open_image(&device, backend, config);
        }

        if file_type.is_dir() {
            let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
            match mount::resolve_underlying_device(&absolute) {
                Some(device) => {
                    info!(
                        "Attempting to use device {} mounted on {}{}",
                        device.display(),
                        absolute.display(),
                        if backend.has_css() {
                            " for CSS authentication"
                        } else {
                            ""
                        }
                    );
                    match Self::open_image(&device, backend.clone(), config.clone()) {
                        Ok(reader) => return Ok(reader),
                        Err(e) => info!("Device {} inaccessible: {e}", device.display()),
                    }
                }
                None => debug!("no device mounted on {}", absolute.display()),
            }
            return Ok(Self::tree(path.to_path_buf(), backend, config));
        }

        Err(DvdError::UnsupportedFileType(path.to_path_buf()))
    }

    /// Read an image through an already opened block input
    ///
    /// CSS title switching is issued on `device` unless the configuration
    /// disables decryption.
    pub fn from_device(device: Box<dyn BlockInput>, config: ReaderConfig) -> Result<Self> {
        let css = config.css != CssMode::Disabled;
        let reader = Self::image(device, None, InputBackend::plain(), css, config);
        reader.check_root()?;
        Ok(reader)
    }

    fn open_image(path: &Path, backend: InputBackend, config: ReaderConfig) -> Result<Self> {
        let device = backend.open(path)?;
        let css = backend.has_css();
        let reader = Self::image(device, Some(path.to_path_buf()), backend, css, config);
        reader.check_root()?;
        debug!("opened {} as an image", path.display());
        Ok(reader)
    }

    fn image(
        device: Box<dyn BlockInput>,
        path: Option<PathBuf>,
        backend: InputBackend,
        css: bool,
        config: ReaderConfig,
    ) -> Self {
        Self {
            storage: Storage::Image {
                device: RefCell::new(device),
                path,
            },
            backend,
            udf: RefCell::new(UdfFs::new(config.cache_level)),
            css_state: Cell::new(if css {
                CssState::NeedsInit
            } else {
                CssState::None
            }),
            css_title: Cell::new(None),
            config,
        }
    }

    fn tree(root: PathBuf, backend: InputBackend, config: ReaderConfig) -> Self {
        debug!("reading {} as a directory tree", root.display());
        Self {
            storage: Storage::Tree { root },
            backend,
            udf: RefCell::new(UdfFs::new(config.cache_level)),
            css_state: Cell::new(CssState::None),
            css_title: Cell::new(None),
            config,
        }
    }

    /// An image is only usable if its root directory resolves
    fn check_root(&self) -> Result<()> {
        let path = self.path().map_or_else(|| PathBuf::from("<device>"), Path::to_path_buf);
        let mut device = self.device()?;
        match self.udf.borrow_mut().find_file(&mut **device, "/") {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(DvdError::NotUdf {
                path,
                reason: "root directory does not resolve".to_string(),
            }),
            Err(e) => Err(DvdError::NotUdf {
                path,
                reason: e.to_string(),
            }),
        }
    }

    /// Close the disc, releasing the device and cache
    pub fn close(self) {
        debug!("closing {:?}", self.mode());
    }

    /// How the disc is being read
    pub const fn mode(&self) -> ReaderMode {
        match self.storage {
            Storage::Image { .. } => ReaderMode::Image,
            Storage::Tree { .. } => ReaderMode::DirectoryTree,
        }
    }

    /// Image or directory the reader was opened on
    pub fn path(&self) -> Option<&Path> {
        match &self.storage {
            Storage::Image { path, .. } => path.as_deref(),
            Storage::Tree { root } => Some(root),
        }
    }

    /// Configuration the reader was opened with
    pub const fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Progress of up-front key cracking
    pub fn css_state(&self) -> CssState {
        self.css_state.get()
    }

    /// Decryption context of the last block read
    pub fn css_title(&self) -> Option<CssTag> {
        self.css_title.get()
    }

    /// Record the context `tag` as current, returning whether it changed
    pub(crate) fn switch_css_title(&self, tag: CssTag) -> bool {
        self.css_title.replace(Some(tag)) != Some(tag)
    }

    /// Change the UDF cache level; disabling drops everything cached
    pub fn set_udf_cache_level(&self, level: CacheLevel) {
        self.udf.borrow_mut().set_cache_level(level);
    }

    /// Current UDF cache level
    pub fn udf_cache_level(&self) -> CacheLevel {
        self.udf.borrow().cache_level()
    }

    /// The block device, in image mode
    pub(crate) fn device(&self) -> Result<RefMut<'_, Box<dyn BlockInput>>> {
        match &self.storage {
            Storage::Image { device, .. } => Ok(device.borrow_mut()),
            Storage::Tree { .. } => Err(DvdError::NoBlockAccess),
        }
    }

    fn find_udf(&self, device: &mut dyn BlockInput, name: &str) -> Result<Option<FileLocation>> {
        let path = format!("/VIDEO_TS/{name}");
        Ok(self.udf.borrow_mut().find_file(device, &path)?)
    }

    fn lookup(&self, name: &str) -> Result<Option<FileLocation>> {
        let mut device = self.device()?;
        self.find_udf(&mut **device, name)
    }

    /// Open the file or files of `title` in `domain`
    ///
    /// Title 0 is the video manager (`VIDEO_TS.*`), which has no title
    /// VOBs. Title VOBs split over `VTS_NN_1.VOB` to `VTS_NN_9.VOB` are read
    /// as one file.
    pub fn open_file(&self, title: u8, domain: Domain) -> Result<DvdFile<'_>> {
        if title > MAX_TITLE {
            return Err(DvdError::InvalidTitle { title, domain });
        }
        let Some(name) = domain.file_name(title) else {
            return Err(DvdError::InvalidTitle { title, domain });
        };

        match (&self.storage, domain) {
            (Storage::Image { .. }, Domain::InfoFile | Domain::InfoBackupFile) => {
                let location = self.lookup(&name)?.ok_or(DvdError::NotFound(name))?;
                Ok(DvdFile::image(self, location.block, location.blocks(), None))
            }
            (Storage::Image { .. }, Domain::MenuVobs) => {
                let location = self.lookup(&name)?.ok_or(DvdError::NotFound(name))?;
                let tag = CssTag::new(title, true);
                Ok(DvdFile::image(self, location.block, location.blocks(), Some(tag)))
            }
            (Storage::Image { .. }, Domain::TitleVobs) => {
                if self.config.preload_css_keys && self.css_state.get() == CssState::NeedsInit {
                    self.init_all_css_keys()?;
                }
                let location = self.lookup(&name)?.ok_or(DvdError::NotFound(name))?;
                let mut size = location.blocks();
                for part in 2..=MAX_VOB_PARTS {
                    let Some(next) = self.lookup(&title_vob_name(title, part))? else {
                        break;
                    };
                    size = size.saturating_add(next.blocks());
                }
                let tag = CssTag::new(title, false);
                Ok(DvdFile::image(self, location.block, size, Some(tag)))
            }
            (Storage::Tree { root }, Domain::InfoFile | Domain::InfoBackupFile) => {
                let path = tree::find_dvd_file(root, &name).ok_or(DvdError::NotFound(name))?;
                Ok(DvdFile::tree(self, vec![self.open_part(&path)?], None))
            }
            (Storage::Tree { root }, Domain::MenuVobs | Domain::TitleVobs) => {
                let menu = domain == Domain::MenuVobs;
                let names = if menu {
                    vec![name.clone()]
                } else {
                    (1..=MAX_VOB_PARTS)
                        .map(|part| title_vob_name(title, part))
                        .collect()
                };

                let mut parts = Vec::new();
                for part_name in &names {
                    let Some(path) = tree::find_dvd_file(root, part_name) else {
                        break;
                    };
                    let mut part = self.open_part(&path)?;
                    part.input.title(0)?;
                    parts.push(part);
                }
                if parts.is_empty() {
                    return Err(DvdError::NotFound(name));
                }
                Ok(DvdFile::tree(self, parts, Some(CssTag::new(title, menu))))
            }
        }
    }

    fn open_part(&self, path: &Path) -> Result<FilePart> {
        let length = std::fs::metadata(path)?.len();
        let size = u32::try_from(length / BLOCK_SIZE as u64).unwrap_or(u32::MAX);
        let input = self.backend.open(path)?;
        Ok(FilePart { size, input })
    }

    /// Byte sizes of the files behind `title` in `domain`
    pub fn file_stat(&self, title: u8, domain: Domain) -> Result<DvdStat> {
        if title > MAX_TITLE {
            return Err(DvdError::InvalidTitle { title, domain });
        }
        let Some(first) = domain.file_name(title) else {
            return Err(DvdError::InvalidTitle { title, domain });
        };
        let names = if domain == Domain::TitleVobs {
            (1..=MAX_VOB_PARTS)
                .map(|part| title_vob_name(title, part))
                .collect()
        } else {
            vec![first.clone()]
        };

        let mut parts = Vec::new();
        for name in &names {
            let size = match &self.storage {
                Storage::Image { .. } => self.lookup(name)?.map(|location| location.length),
                Storage::Tree { root } => tree::find_dvd_file(root, name)
                    .map(|path| std::fs::metadata(path).map(|m| m.len()))
                    .transpose()?,
            };
            let Some(size) = size else {
                break;
            };
            parts.push(size);
        }

        if parts.is_empty() {
            return Err(DvdError::NotFound(first));
        }
        Ok(DvdStat {
            size: parts.iter().sum(),
            parts,
        })
    }

    /// MD5 over the info files of titles 0 to 9, in order
    ///
    /// Missing info files are skipped. Identifies a disc without relying on
    /// its (often generic) volume labels.
    pub fn disc_id(&self) -> Result<[u8; 16]> {
        let mut data = Vec::new();
        let mut hashed = 0;

        for title in 0..DISC_ID_TITLES {
            let mut file = match self.open_file(title, Domain::InfoFile) {
                Ok(file) => file,
                Err(DvdError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            let length = file.size() as usize * BLOCK_SIZE;
            let start = data.len();
            data.resize(start + length, 0);
            let read = file.read_bytes(&mut data[start..])?;
            if read != length {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("read {read} of {length} bytes of the info file of title {title}"),
                )
                .into());
            }
            hashed += 1;
        }

        if hashed == 0 {
            return Err(DvdError::NotFound("info files".to_string()));
        }
        debug!("disc ID over {hashed} info files, {} bytes", data.len());
        Ok(md5::compute(&data).0)
    }

    /// Volume identifiers from the UDF primary volume descriptor
    pub fn udf_volume_info(&self) -> Result<VolumeInfo> {
        let mut device = self.device()?;
        let mut udf = self.udf.borrow_mut();
        let missing = || DvdError::NotFound("UDF primary volume descriptor".to_string());

        let identifier = udf.volume_identifier(&mut **device)?.ok_or_else(missing)?;
        let set_identifier = udf.volume_set_identifier(&mut **device)?.ok_or_else(missing)?;
        Ok(VolumeInfo {
            identifier,
            set_identifier: set_identifier.to_vec(),
        })
    }

    /// Volume identifiers from the ISO 9660 primary volume descriptor
    ///
    /// The identifier is cut at its first space.
    pub fn iso_volume_info(&self) -> Result<VolumeInfo> {
        let mut device = self.device()?;
        let mut block = vec![0u8; BLOCK_SIZE];
        if device.read_at(ISO_VOLUME_BLOCK, &mut block, 1, ReadFlags::NoDecrypt)? != 1 {
            return Err(DvdError::NotFound(
                "ISO 9660 primary volume descriptor".to_string(),
            ));
        }

        let raw = &block[40..72];
        let end = raw.iter().position(|&b| b == b' ').unwrap_or(raw.len());
        let identifier = String::from_utf8_lossy(&raw[..end])
            .trim_end_matches('\0')
            .to_string();
        Ok(VolumeInfo {
            identifier,
            set_identifier: block[190..318].to_vec(),
        })
    }

    /// Have the decryption library crack the key of every VOB set
    ///
    /// Issues a title switch at `VIDEO_TS.VOB` and at each `VTS_NN_0.VOB`
    /// and `VTS_NN_1.VOB`, stopping at the first title set without title
    /// VOBs. Failures for a single title are logged, not returned. Does
    /// nothing when `no_keys` is configured.
    pub fn init_all_css_keys(&self) -> Result<()> {
        self.css_state.set(CssState::Done);
        if self.config.no_keys {
            debug!("{NO_KEYS_ENV} set, not cracking CSS keys");
            return Ok(());
        }

        let mut device = self.device()?;
        info!("Attempting to retrieve all CSS keys, this can take a long time");
        let started = Instant::now();

        for title in 0..=MAX_TITLE {
            let menu = if title == 0 {
                "VIDEO_TS.VOB".to_string()
            } else {
                title_vob_name(title, 0)
            };
            if let Some(location) = self.find_udf(&mut **device, &menu)? {
                crack_key(&mut **device, &menu, location.block);
            }
            if title == 0 {
                continue;
            }

            let name = title_vob_name(title, 1);
            let Some(location) = self.find_udf(&mut **device, &name)? else {
                break;
            };
            crack_key(&mut **device, &name, location.block);
        }

        info!("Retrieved CSS keys in {:?}", started.elapsed());
        Ok(())
    }
}

impl fmt::Debug for DvdReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DvdReader")
            .field("mode", &self.mode())
            .field("path", &self.path())
            .field("has_css", &self.backend.has_css())
            .field("css_state", &self.css_state.get())
            .field("css_title", &self.css_title.get())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn crack_key(device: &mut dyn BlockInput, name: &str, block: u32) {
    let started = Instant::now();
    debug!("Get key for {name} at {block:#010x}");
    match device.title(block) {
        Ok(()) => debug!("Key for {name} took {:?}", started.elapsed()),
        Err(e) => warn!("Error cracking CSS key for {name} ({block:#010x}): {e}"),
    }
}

#[cfg(unix)]
fn is_device(file_type: &FileType) -> bool {
    use std::os::unix::fs::FileTypeExt;
    file_type.is_block_device() || file_type.is_char_device()
}

#[cfg(not(unix))]
fn is_device(_file_type: &FileType) -> bool {
    false
}
