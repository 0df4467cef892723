//! Backend selection
//!
//! The decryption library is probed once per process. Whatever the probe
//! decides is handed to every reader as an [`InputBackend`] value, so a
//! reader never has to know whether decryption is available.

use crate::{BlockInput, CssInput, CssLibrary, FileInput, InputError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::sync::{Arc, LazyLock, OnceLock};
use tracing::{debug, info};

/// Environment variable naming the decryption library to load
pub const LIBRARY_ENV: &str = "DVDREAD_CSS_LIBRARY";

static DETECTED: OnceLock<InputBackend> = OnceLock::new();

/// Outcome of every explicit load, by library name
type LoadCache = Mutex<HashMap<OsString, std::result::Result<Arc<CssLibrary>, String>>>;

static LOADED: LazyLock<LoadCache> = LazyLock::new(|| Mutex::new(HashMap::new()));

/// Which block input implementation readers should open devices with
#[derive(Debug, Clone, Default)]
pub enum InputBackend {
    /// Reads go through a verified CSS decryption library
    Css(Arc<CssLibrary>),
    /// Plain block I/O, data is assumed to be unscrambled
    #[default]
    Plain,
}

impl InputBackend {
    /// Probe for the decryption library, at most once per process
    ///
    /// Later calls return the first result. Falls back to [`Self::Plain`]
    /// when no candidate loads.
    pub fn detect() -> Self {
        DETECTED
            .get_or_init(|| Self::probe(&default_library_names()))
            .clone()
    }

    /// Try each candidate in order and keep the first usable library
    pub fn probe<S: AsRef<OsStr>>(candidates: &[S]) -> Self {
        for candidate in candidates {
            match CssLibrary::load(candidate) {
                Ok(library) => {
                    info!("Using CSS decryption library {}", library.name());
                    return Self::Css(Arc::new(library));
                }
                Err(e) => debug!("{e}"),
            }
        }
        info!("No usable CSS decryption library, reading without decryption");
        Self::Plain
    }

    /// Load a specific library, without touching the process-wide probe
    ///
    /// Each name is loaded and verified at most once per process; later
    /// calls return the first outcome.
    ///
    /// # Errors
    ///
    /// Returns error if the library cannot be loaded or verified
    pub fn load(path: impl AsRef<OsStr>) -> Result<Self> {
        load_once(&LOADED, path.as_ref(), |name| CssLibrary::load(name)).map(Self::Css)
    }

    /// Plain block I/O
    pub const fn plain() -> Self {
        Self::Plain
    }

    /// Whether reads can be descrambled
    pub const fn has_css(&self) -> bool {
        matches!(self, Self::Css(_))
    }

    /// Open a device, image file or VOB with the selected implementation
    ///
    /// # Errors
    ///
    /// Returns error if the path cannot be opened
    pub fn open(&self, path: &Path) -> Result<Box<dyn BlockInput>> {
        match self {
            Self::Css(library) => Ok(Box::new(CssInput::open(Arc::clone(library), path)?)),
            Self::Plain => Ok(Box::new(FileInput::open(path)?)),
        }
    }
}

fn load_once(
    cache: &LoadCache,
    name: &OsStr,
    load: impl FnOnce(&OsStr) -> Result<CssLibrary>,
) -> Result<Arc<CssLibrary>> {
    let mut loaded = cache.lock();
    let outcome = loaded
        .entry(name.to_os_string())
        .or_insert_with(|| load(name).map(Arc::new).map_err(|e| e.to_string()));
    match outcome {
        Ok(library) => Ok(Arc::clone(library)),
        Err(reason) => Err(InputError::Library {
            name: name.to_string_lossy().into_owned(),
            reason: reason.clone(),
        }),
    }
}

/// Library names tried by [`InputBackend::detect`]
///
/// `DVDREAD_CSS_LIBRARY` replaces the list when set.
pub fn default_library_names() -> Vec<OsString> {
    if let Some(name) = std::env::var_os(LIBRARY_ENV) {
        return vec![name];
    }

    let names: &[&str] = if cfg!(target_os = "windows") {
        &["libdvdcss-2.dll", "libdvdcss.dll"]
    } else if cfg!(target_os = "macos") {
        &["libdvdcss.2.dylib", "libdvdcss.dylib"]
    } else {
        &["libdvdcss.so.2", "libdvdcss.so"]
    };
    names.iter().map(OsString::from).collect()
}
