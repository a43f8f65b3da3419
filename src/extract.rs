//! Extract.
//!
//! This module contains the code to unpack the downloaded tar archive.

use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tar::Archive;
use tracing::{instrument, trace};

// Magic bytes at the start of a gzip stream.
#[doc(hidden)]
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Unpacks the tar archive (optionally gzip compressed) into the given directory.
#[instrument(err, level = "trace")]
pub(crate) fn extract(archive: &Path, output_dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(output_dir)?;

    let mut reader = BufReader::new(File::open(archive)?);
    let compressed = reader.fill_buf()?.starts_with(&GZIP_MAGIC);
    trace!(compressed);

    let reader: Box<dyn Read> = if compressed { Box::new(GzDecoder::new(reader)) } else { Box::new(reader) };
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);
    // entries with absolute paths or `..` are skipped by `unpack`
    archive.unpack(output_dir)?;

    Ok(())
}
