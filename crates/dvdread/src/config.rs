//! Reader configuration
//!
//! Settings can be built in code, loaded from the environment variables
//! libdvdread users already know, or filled in by the `dvdread-info`
//! command line.

use dvdread_input::InputBackend;
use dvdread_udf::CacheLevel;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Set to skip CSS key cracking when a disc is opened
pub const NO_KEYS_ENV: &str = "DVDREAD_NOKEYS";

/// Set to never load the decryption library
pub const NO_CSS_ENV: &str = "DVDREAD_NOCSS";

/// How the decryption library is chosen
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CssMode {
    /// Probe the usual library names once per process
    #[default]
    Auto,
    /// Plain reads only
    Disabled,
    /// Load this library, falling back to plain reads if it is unusable
    Library(PathBuf),
}

/// Configuration for a [`crate::DvdReader`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Whether decoded UDF structures are cached
    pub cache_level: CacheLevel,

    /// Decryption library selection
    pub css: CssMode,

    /// Never crack keys for every title up front
    pub no_keys: bool,

    /// Crack keys for every title on the first VOB open of an image
    pub preload_css_keys: bool,
}

impl ReaderConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration from `DVDREAD_NOCSS` and `DVDREAD_NOKEYS`
    ///
    /// `DVDREAD_CSS_LIBRARY` is honoured by the once-per-process probe
    /// behind [`CssMode::Auto`], so it needs no entry here.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var_os(name))
    }

    fn from_vars(var: impl Fn(&str) -> Option<OsString>) -> Self {
        let css = if var(NO_CSS_ENV).is_some() {
            CssMode::Disabled
        } else {
            CssMode::Auto
        };

        Self {
            css,
            no_keys: var(NO_KEYS_ENV).is_some(),
            ..Self::default()
        }
    }

    /// Set the UDF cache level
    #[must_use]
    pub const fn with_cache_level(mut self, level: CacheLevel) -> Self {
        self.cache_level = level;
        self
    }

    /// Set how the decryption library is chosen
    #[must_use]
    pub fn with_css(mut self, css: CssMode) -> Self {
        self.css = css;
        self
    }

    /// Use a specific decryption library
    #[must_use]
    pub fn with_css_library<P: AsRef<Path>>(self, path: P) -> Self {
        self.with_css(CssMode::Library(path.as_ref().to_path_buf()))
    }

    /// Skip up-front key cracking
    #[must_use]
    pub const fn with_no_keys(mut self, no_keys: bool) -> Self {
        self.no_keys = no_keys;
        self
    }

    /// Crack every title key on the first VOB open
    #[must_use]
    pub const fn with_preload_css_keys(mut self, preload: bool) -> Self {
        self.preload_css_keys = preload;
        self
    }

    /// Resolve the block input backend this configuration asks for
    pub fn backend(&self) -> InputBackend {
        match &self.css {
            CssMode::Auto => InputBackend::detect(),
            CssMode::Disabled => InputBackend::plain(),
            CssMode::Library(path) => InputBackend::load(path).unwrap_or_else(|e| {
                warn!("{e}, reading without decryption");
                InputBackend::plain()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvdread_input::LIBRARY_ENV;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let map: HashMap<String, OsString> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), OsString::from(v)))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ReaderConfig::new();
        assert_eq!(config.cache_level, CacheLevel::Enabled);
        assert_eq!(config.css, CssMode::Auto);
        assert!(!config.no_keys);
        assert!(!config.preload_css_keys);
    }

    #[test]
    fn test_environment() {
        assert_eq!(ReaderConfig::from_vars(vars(&[])), ReaderConfig::default());

        let config = ReaderConfig::from_vars(vars(&[
            (LIBRARY_ENV, "/opt/lib/libdvdcss.so.2"),
            (NO_KEYS_ENV, "1"),
        ]));
        assert_eq!(config.css, CssMode::Auto);
        assert!(config.no_keys);

        let config = ReaderConfig::from_vars(vars(&[
            (LIBRARY_ENV, "/opt/lib/libdvdcss.so.2"),
            (NO_CSS_ENV, ""),
        ]));
        assert_eq!(config.css, CssMode::Disabled);
    }

    #[test]
    fn test_builders() {
        let config = ReaderConfig::new()
            .with_cache_level(CacheLevel::Disabled)
            .with_css_library("libdvdcss.so.2")
            .with_no_keys(true)
            .with_preload_css_keys(true);
        assert_eq!(config.cache_level, CacheLevel::Disabled);
        assert_eq!(config.css, CssMode::Library(PathBuf::from("libdvdcss.so.2")));
        assert!(config.no_keys);
        assert!(config.preload_css_keys);
    }

    #[test]
    fn test_unusable_library_falls_back() {
        let config = ReaderConfig::new().with_css_library("libdvdread-test-missing.so");
        assert!(!config.backend().has_css());
        assert!(!ReaderConfig::new().with_css(CssMode::Disabled).backend().has_css());
    }

    #[test]
    fn test_serde_shape() {
        let config: ReaderConfig =
            serde_json::from_str(r#"{"cache_level":"disabled","css":"disabled"}"#)
                .unwrap_or_default();
        assert_eq!(config.cache_level, CacheLevel::Disabled);
        assert_eq!(config.css, CssMode::Disabled);
        assert!(!config.no_keys);
    }
}
