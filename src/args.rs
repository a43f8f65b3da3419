//! Arguments.
//!
//! This module contains the definition for the available command-line parameter.

use clap::Parser;

#[derive(Debug, Parser)]
#[clap(author, about)]
pub(crate) struct Args {
    /// Sets a custom config file
    #[clap(short, long, value_name = "file")]
    pub(crate) config: Option<String>,
    /// Sets the base directory (nrfjprog gets downloaded into a subdirectory)
    #[clap(short, long, value_name = "dir", env = "NRFJPROG_FETCH_DIR")]
    pub(crate) directory: Option<String>,
    /// Only probe and report what would be fetched
    #[clap(short = 'n', long, action)]
    pub(crate) dry_run: bool,
    /// Overrides the detected platform (linux, darwin or win32)
    #[clap(short, long, value_name = "id")]
    pub(crate) platform: Option<String>,
    /// Suppress unnecessary information
    #[clap(short = 'q', long, action)]
    pub(crate) quiet: bool,
    /// Sets the number of threads used to install files
    #[clap(short, long, value_name = "n")]
    pub(crate) threads: Option<usize>,
    /// Change level of verbosity (apply multiple times to increase level)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub(crate) verbose: u8,
    /// Print version information
    #[clap(short = 'V', long, action)]
    pub(crate) version: bool,
}
