//! CSS decryption through a dynamically loaded library
//!
//! The descrambling algorithm and key recovery live in an external shared
//! library exposing the `libdvdcss` ABI. [`CssLibrary::load`] resolves the
//! whole function set up front, so a [`CssInput`] never calls a symbol that
//! was not found.
//!
//! Required symbols:
//!
//! | Symbol | Signature |
//! |--------|-----------|
//! | `dvdcss_open` | `dvdcss_t (const char *target)` |
//! | `dvdcss_close` | `int (dvdcss_t)` |
//! | `dvdcss_seek` | `int (dvdcss_t, int blocks, int flags)` |
//! | `dvdcss_title` | `int (dvdcss_t, int block)` |
//! | `dvdcss_read` | `int (dvdcss_t, void *buffer, int blocks, int flags)` |
//! | `dvdcss_error` | `const char *(dvdcss_t)` |
//! | `dvdcss_interface_2` | version marker (data symbol) |
//!
//! Libraries that still export `dvdcss_crack` implement the 0.0.x interface
//! and are rejected.

use crate::file::probe_block_count;
use crate::{BlockInput, InputError, ReadFlags, Result, check_buffer};
use libc::{c_char, c_int, c_void};
use libloading::Library;
use std::ffi::{CStr, CString, OsStr};
use std::fmt;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::Arc;
use tracing::{debug, warn};

type DvdcssOpen = unsafe extern "C" fn(*const c_char) -> *mut c_void;
type DvdcssClose = unsafe extern "C" fn(*mut c_void) -> c_int;
type DvdcssSeek = unsafe extern "C" fn(*mut c_void, c_int, c_int) -> c_int;
type DvdcssTitle = unsafe extern "C" fn(*mut c_void, c_int) -> c_int;
type DvdcssRead = unsafe extern "C" fn(*mut c_void, *mut c_void, c_int, c_int) -> c_int;
type DvdcssError = unsafe extern "C" fn(*mut c_void) -> *const c_char;

const DVDCSS_NOFLAGS: c_int = 0;
const DVDCSS_READ_DECRYPT: c_int = 1;

/// Version marker every supported library exports
const INTERFACE_SYMBOL: &str = "dvdcss_interface_2";

/// Present only in the 0.0.x interface
const LEGACY_SYMBOL: &str = "dvdcss_crack";

/// A loaded and verified CSS decryption library
pub struct CssLibrary {
    open: DvdcssOpen,
    close: DvdcssClose,
    seek: DvdcssSeek,
    title: DvdcssTitle,
    read: DvdcssRead,
    error: DvdcssError,
    name: String,
    // Keeps the function pointers above valid; dropped last.
    _library: Library,
}

impl CssLibrary {
    /// Load a library by file name or path and resolve its symbols
    ///
    /// # Errors
    ///
    /// Returns error if the library cannot be loaded, misses a required
    /// symbol, or implements the legacy 0.0.x interface
    pub fn load(name: impl AsRef<OsStr>) -> Result<Self> {
        let name = name.as_ref();
        let library_name = name.to_string_lossy().into_owned();

        // Loading runs the library's initialisers.
        #[allow(unsafe_code)]
        let library = unsafe { Library::new(name) }.map_err(|e| InputError::Library {
            name: library_name.clone(),
            reason: e.to_string(),
        })?;

        if has_symbol(&library, LEGACY_SYMBOL) {
            return Err(InputError::IncompatibleLibrary(format!(
                "{library_name} implements the 0.0.x interface ({LEGACY_SYMBOL})"
            )));
        }
        if !has_symbol(&library, INTERFACE_SYMBOL) {
            return Err(InputError::MissingSymbol(INTERFACE_SYMBOL));
        }

        let open = resolve::<DvdcssOpen>(&library, "dvdcss_open")?;
        let close = resolve::<DvdcssClose>(&library, "dvdcss_close")?;
        let seek = resolve::<DvdcssSeek>(&library, "dvdcss_seek")?;
        let title = resolve::<DvdcssTitle>(&library, "dvdcss_title")?;
        let read = resolve::<DvdcssRead>(&library, "dvdcss_read")?;
        let error = resolve::<DvdcssError>(&library, "dvdcss_error")?;

        debug!("Resolved decryption library {library_name}");

        Ok(Self {
            open,
            close,
            seek,
            title,
            read,
            error,
            name: library_name,
            _library: library,
        })
    }

    /// Name or path the library was loaded from
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for CssLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CssLibrary")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[allow(unsafe_code)]
fn has_symbol(library: &Library, name: &str) -> bool {
    // Only the address is looked up, it is never dereferenced.
    unsafe { library.get::<*const c_void>(name.as_bytes()) }.is_ok()
}

#[allow(unsafe_code)]
fn resolve<T: Copy>(library: &Library, name: &'static str) -> Result<T> {
    // SAFETY: every `T` used here is the documented signature of `name`.
    let symbol = unsafe { library.get::<T>(name.as_bytes()) }
        .map_err(|_| InputError::MissingSymbol(name))?;
    Ok(*symbol)
}

/// A device opened through the decryption library
pub struct CssInput {
    library: Arc<CssLibrary>,
    handle: NonNull<c_void>,
    path: PathBuf,
    blocks: Option<u32>,
}

impl CssInput {
    /// Open `path` (device node, image file or directory) with `library`
    ///
    /// # Errors
    ///
    /// Returns error if the path is not representable as a C string or the
    /// library refuses to open it
    pub fn open(library: Arc<CssLibrary>, path: &Path) -> Result<Self> {
        let target = path_to_cstring(path)?;

        #[allow(unsafe_code)]
        let raw = unsafe { (library.open)(target.as_ptr()) };
        let handle = NonNull::new(raw).ok_or_else(|| InputError::Css(format!(
            "{} could not open {}",
            library.name,
            path.display()
        )))?;

        // The library has no size query; the node itself is asked so the
        // backup anchors near the end of the disc can be found.
        let blocks = probe_block_count(path);
        debug!(
            "Opened {} through {} ({:?} blocks)",
            path.display(),
            library.name,
            blocks
        );

        Ok(Self {
            library,
            handle,
            path: path.to_path_buf(),
            blocks,
        })
    }

    /// Path this input was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn last_error(&self) -> String {
        #[allow(unsafe_code)]
        unsafe {
            let message = (self.library.error)(self.handle.as_ptr());
            if message.is_null() {
                return String::from("unknown error");
            }
            CStr::from_ptr(message).to_string_lossy().into_owned()
        }
    }
}

impl fmt::Debug for CssInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CssInput")
            .field("library", &self.library.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl BlockInput for CssInput {
    fn seek(&mut self, block: u32) -> Result<u32> {
        let target = c_int::try_from(block).map_err(|_| InputError::Seek { block })?;

        #[allow(unsafe_code)]
        let reached = unsafe { (self.library.seek)(self.handle.as_ptr(), target, DVDCSS_NOFLAGS) };
        if reached < 0 {
            return Err(InputError::Css(self.last_error()));
        }
        Ok(reached as u32)
    }

    fn read(&mut self, buf: &mut [u8], blocks: usize, flags: ReadFlags) -> Result<usize> {
        check_buffer(buf, blocks)?;
        let count = c_int::try_from(blocks).map_err(|_| InputError::BufferTooSmall {
            len: buf.len(),
            blocks,
        })?;
        let mode = match flags {
            ReadFlags::NoDecrypt => DVDCSS_NOFLAGS,
            ReadFlags::Decrypt => DVDCSS_READ_DECRYPT,
        };

        // SAFETY: `buf` was checked to hold `blocks` whole blocks.
        #[allow(unsafe_code)]
        let read = unsafe {
            (self.library.read)(
                self.handle.as_ptr(),
                buf.as_mut_ptr().cast::<c_void>(),
                count,
                mode,
            )
        };
        if read < 0 {
            return Err(InputError::Css(self.last_error()));
        }
        Ok(read as usize)
    }

    fn title(&mut self, block: u32) -> Result<()> {
        let target = c_int::try_from(block).map_err(|_| InputError::Seek { block })?;

        #[allow(unsafe_code)]
        let status = unsafe { (self.library.title)(self.handle.as_ptr(), target) };
        if status < 0 {
            return Err(InputError::Css(self.last_error()));
        }
        Ok(())
    }

    fn block_count(&self) -> Option<u32> {
        self.blocks
    }
}

impl Drop for CssInput {
    fn drop(&mut self) {
        #[allow(unsafe_code)]
        let status = unsafe { (self.library.close)(self.handle.as_ptr()) };
        if status < 0 {
            warn!("Closing {} failed", self.path.display());
        }
    }
}

#[cfg(unix)]
fn path_to_cstring(path: &Path) -> Result<CString> {
    use std::os::unix::ffi::OsStrExt;
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| InputError::InvalidPath(path.display().to_string()))
}

#[cfg(not(unix))]
fn path_to_cstring(path: &Path) -> Result<CString> {
    CString::new(path.to_string_lossy().into_owned())
        .map_err(|_| InputError::InvalidPath(path.display().to_string()))
}
