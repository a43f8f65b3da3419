//! Download.
//!
//! This module contains the code to download the archive or installer.

use anyhow::anyhow;
use reqwest::StatusCode;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{instrument, trace};

/// Downloads the given URL to the given file.
///
/// Anything but `200 OK` is an error. The body is streamed to disk, a partial file may be left behind on failure.
/// There is no timeout, a slow transfer runs until it completes or the connection fails.
#[instrument(err, level = "trace")]
pub(crate) fn download(url: &str, dest: &Path) -> anyhow::Result<u64> {
    // make request (the blocking client defaults to a total timeout of 30s)
    let client = reqwest::blocking::Client::builder().timeout(None).build()?;
    let mut response = client
        .get(url) //
        .header(reqwest::header::ACCEPT, "application/octet-stream") //
        .send()?;

    let status = response.status();
    trace!(%status);
    if status != StatusCode::OK {
        return Err(anyhow!("Unable to download {url}. Got status code {}", status.as_u16()));
    }

    // download file
    let dest_file = File::create(dest)?;
    let mut writer = BufWriter::new(dest_file);
    let bytes_written = response.copy_to(&mut writer)?;
    writer.into_inner().map_err(|err| err.into_error())?.sync_all()?;
    trace!(bytes_written);

    Ok(bytes_written)
}
