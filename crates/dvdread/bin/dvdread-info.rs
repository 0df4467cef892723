//! `dvdread-info`: print what a DVD-Video disc holds
//!
//! Opens a device, image or directory, then prints its volume
//! identifiers, disc ID and the size of every title set's files.

use anyhow::{Context, Result};
use clap::Parser;
use dvdread::{CacheLevel, CssMode, DvdReader, ReaderConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Command line of `dvdread-info`
#[derive(Debug, Parser)]
#[command(
    name = "dvdread-info",
    about = "Show volume identifiers, disc ID and title set files of a DVD-Video disc",
    version
)]
struct Args {
    /// DVD device, image file or directory
    path: PathBuf,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Never load the CSS decryption library
    #[arg(long, env = "DVDREAD_NOCSS")]
    no_css: bool,

    /// CSS decryption library to load instead of probing
    #[arg(long, env = "DVDREAD_CSS_LIBRARY", conflicts_with = "no_css")]
    css_library: Option<PathBuf>,

    /// Skip cracking every title key up front
    #[arg(long, env = "DVDREAD_NOKEYS")]
    no_keys: bool,

    /// Do not cache UDF structures
    #[arg(long)]
    no_cache: bool,

    /// Debug logging, unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn reader_config(&self) -> ReaderConfig {
        let css = if self.no_css {
            CssMode::Disabled
        } else if let Some(library) = &self.css_library {
            CssMode::Library(library.clone())
        } else {
            CssMode::Auto
        };
        let cache_level = if self.no_cache {
            CacheLevel::Disabled
        } else {
            CacheLevel::Enabled
        };

        ReaderConfig::new()
            .with_css(css)
            .with_cache_level(cache_level)
            .with_no_keys(self.no_keys)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let reader = DvdReader::open_with_config(&args.path, args.reader_config())
        .with_context(|| format!("cannot open {}", args.path.display()))?;
    tracing::debug!("{reader:?}");

    let summary = reader
        .summary()
        .with_context(|| format!("cannot read {}", args.path.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{summary}");
    }

    reader.close();
    Ok(())
}
