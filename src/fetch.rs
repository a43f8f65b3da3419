//! Fetch.
//!
//! This module contains the probe-and-recover flow: probe the nrfjprog library and, if it is missing,
//! download, extract and install it for the selected platform.

use crate::colors::*;
use crate::download::download;
use crate::extract::extract;
use crate::install::{self, Selection};
use crate::launch::Launcher;
use crate::platform::PlatformConfig;
use crate::probe::{self, Assessment, FailureKind, Probe, ProbeError};
use anyhow::Context;
use std::fs;
use std::path::PathBuf;
use threadpool::ThreadPool;
use tracing::{debug, error, instrument, trace};

/// The outcome of a run.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// The library works, nothing was fetched.
    Available(String),
    /// The vendor headers are installed system-wide, nothing was fetched.
    HeaderOverride(PathBuf),
    /// Nothing was fetched because of a dry-run.
    DryRun(FailureKind),
    /// Fetched, and probing again reported the given version.
    Verified(String),
    /// Fetched, the rest is up to the user (installer, instructions or building the bindings).
    Fetched,
    /// Fetching failed, the error has been reported.
    Failed(anyhow::Error),
}

/// The fetcher runs the probe and, if needed, the fetch-and-install pipeline for one platform.
#[derive(Debug)]
pub(crate) struct Fetcher<'a> {
    config: &'a PlatformConfig,
    probe: &'a dyn Probe,
    launcher: &'a dyn Launcher,
    pool: &'a ThreadPool,
    dry_run: bool,
}

impl<'a> Fetcher<'a> {
    /// Creates a new `Fetcher`.
    pub(crate) fn new(config: &'a PlatformConfig, probe: &'a dyn Probe, launcher: &'a dyn Launcher, pool: &'a ThreadPool) -> Self {
        Self {
            config,
            probe,
            launcher,
            pool,
            dry_run: false,
        }
    }

    /// Whether to only report what would be fetched.
    pub(crate) fn dry_run(&mut self, dry_run: bool) -> &mut Self {
        self.dry_run = dry_run;

        self
    }

    /// Probes the library and fetches it if that can help.
    ///
    /// Failures of the pipeline are reported and swallowed, only probe failures unrelated to a missing
    /// nrfjprog library are returned as error.
    pub(crate) fn run(&self) -> Result<Outcome, ProbeError> {
        let kind = match probe::assess(self.probe, self.config) {
            Assessment::Available(version) => {
                println!("nrfjprog libraries at version {}, no need to fetch them", INFO_COLOR.paint(&version));
                return Ok(Outcome::Available(version));
            }
            Assessment::HeaderOverride(header) => {
                println!("Found {}, assuming the nrfjprog libraries are installed", PATH_COLOR.paint(header.to_string_lossy()));
                return Ok(Outcome::HeaderOverride(header));
            }
            Assessment::Unrelated(err) => return Err(err),
            Assessment::Fetch(kind) => kind,
        };
        debug!(?kind, reprobe = kind.reprobe());

        println!("nrf-jprog libraries seem to be missing.");
        if self.dry_run {
            let not = ATTENTION_COLOR.paint("NOT");
            println!("dry-run: {not} downloading nrfjprog from {}", URL_COLOR.paint(&self.config.url));
            return Ok(Outcome::DryRun(kind));
        }

        match self.fetch(kind) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                error!(?err, "fetching nrfjprog failed");
                let err_str = ATTENTION_COLOR.paint(format!("{err:#}"));
                println!("Error when getting nrfjprog: {err_str}");
                Ok(Outcome::Failed(err))
            }
        }
    }

    // Runs the fetch-and-install pipeline.
    #[instrument(level = "trace", skip(self))]
    fn fetch(&self, kind: FailureKind) -> anyhow::Result<Outcome> {
        let config = self.config;

        fs::create_dir_all(&config.download_dir).with_context(|| format!("failed to create {}", config.download_dir.display()))?;

        println!(
            "Downloading nrfjprog from {} to {}",
            URL_COLOR.paint(&config.url),
            PATH_COLOR.paint(config.destination_file.to_string_lossy())
        );
        let bytes = download(&config.url, &config.destination_file)?;
        trace!(bytes);

        if let Some(extract_to) = &config.extract_to {
            println!(
                "Extracting nrfjprog from {} to {}",
                PATH_COLOR.paint(config.destination_file.to_string_lossy()),
                PATH_COLOR.paint(extract_to.to_string_lossy())
            );
            extract(&config.destination_file, extract_to).with_context(|| format!("failed to extract {}", config.destination_file.display()))?;
        }

        if let Some(rule) = &config.copy_files {
            let selection = Selection::scan(rule)?;
            let source = PATH_COLOR.paint(rule.source.to_string_lossy());
            println!("Copying nrfjprog libs from {source} to {}", PATH_COLOR.paint(rule.library_destination.to_string_lossy()));
            println!("Copying nrfjprog header files from {source} to {}", PATH_COLOR.paint(rule.header_destination.to_string_lossy()));
            let installed = install::install(rule, selection, self.pool)?;
            trace!(installed);
        }

        // the installer is not awaited, whatever it does happens after this process is gone
        if let Some(child) = &config.spawn_child {
            println!("Installation of nrfjprog requires running {}", PATH_COLOR.paint(child.to_string_lossy()));
            self.launcher.launch(child)?;
            return Ok(Outcome::Fetched);
        }

        if let Some(instructions) = &config.instructions {
            println!("{}", ATTENTION_COLOR.paint(instructions));
            return Ok(Outcome::Fetched);
        }

        if !kind.reprobe() {
            return Ok(Outcome::Fetched);
        }

        let version = self.verify()?;
        println!("Automated fetch of nrfjprog seems to have worked, now at {}", INFO_COLOR.paint(&version));

        Ok(Outcome::Verified(version))
    }

    // Probes the library once more.
    #[instrument(err, level = "trace", skip(self))]
    fn verify(&self) -> anyhow::Result<String> {
        Ok(self.probe.library_version()?)
    }
}
