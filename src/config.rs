//! Configuration.
//!
//! This module contains the optional configuration read from a YAML file and how it is applied to the
//! built-in [`PlatformConfig`].

use crate::platform::{Platform, PlatformConfig};
use crate::vars::VarExpander;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Name of the default configuration file.
pub(crate) const CONFIG_FILENAME: &str = "nrfjprog-fetch.yml";

/// The struct that holds the configuration loaded from a YAML file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    /// The base directory (the download directory is created within).
    pub(crate) directory: Option<String>,
    /// The compiled bindings that have to exist before the library can be probed.
    pub(crate) bindings: Option<String>,
    /// Additional directories to search the nrfjprog library in.
    #[serde(default, rename = "library-dirs")]
    pub(crate) library_dirs: Vec<String>,
    /// Per-platform overrides, keyed by platform id.
    #[serde(default)]
    pub(crate) platforms: HashMap<String, PlatformOverride>,
}

impl Config {
    /// Loads the configuration from the given filename.
    #[instrument(err, level = "trace")]
    pub(crate) fn load_from_file<P>(filename: P) -> anyhow::Result<Self>
    where
        P: AsRef<Path> + std::fmt::Debug,
    {
        let config_file = File::open(filename)?;

        let de = serde_yaml::Deserializer::from_reader(config_file);
        let value = serde_yaml::Value::deserialize(de)?;
        // an empty file deserializes to null
        if value.is_null() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_value(value)?;

        Ok(config)
    }

    /// Loads the configuration, tolerating a missing file unless it was requested explicitly.
    pub(crate) fn load(filename: &Path, explicit: bool) -> anyhow::Result<Self> {
        if !explicit && !filename.exists() {
            return Ok(Self::default());
        }

        Self::load_from_file(filename)
    }

    /// Resolves the base directory, falling back to the given default.
    pub(crate) fn resolve_directory(&self, expander: &VarExpander, default: &Path) -> anyhow::Result<PathBuf> {
        let Some(directory) = &self.directory else {
            return Ok(default.to_path_buf());
        };
        let directory = expander.expand(directory)?;

        Ok(default.join(directory.as_ref()))
    }

    /// Resolves the bindings file relative to the given base directory.
    pub(crate) fn resolve_bindings(&self, expander: &VarExpander, basedir: &Path) -> anyhow::Result<Option<PathBuf>> {
        let Some(bindings) = &self.bindings else {
            return Ok(None);
        };
        let bindings = expander.expand(bindings)?;

        Ok(Some(basedir.join(bindings.as_ref())))
    }

    /// Resolves the additional library directories relative to the given base directory.
    pub(crate) fn resolve_library_dirs(&self, expander: &VarExpander, basedir: &Path) -> anyhow::Result<Vec<PathBuf>> {
        self.library_dirs
            .iter()
            .map(|dir| -> anyhow::Result<PathBuf> { Ok(basedir.join(expander.expand(dir)?.as_ref())) })
            .collect()
    }

    /// Applies the overrides for the platform of the given configuration.
    pub(crate) fn apply(&self, expander: &VarExpander, config: &mut PlatformConfig) -> anyhow::Result<()> {
        let Some(overrides) = self.platforms.get(config.platform.id()) else {
            return Ok(());
        };

        if let Some(url) = &overrides.url {
            config.url = expander.expand(url)?.into_owned();
        }
        if let Some(instructions) = &overrides.instructions {
            config.instructions = Some(instructions.clone());
        }
        if let Some(header) = &overrides.header {
            config.header_override = Some(PathBuf::from(expander.expand(header)?.as_ref()));
        }

        Ok(())
    }

    /// Returns the ids of overridden platforms that are not supported (sorted).
    pub(crate) fn unknown_platforms(&self) -> Vec<&str> {
        let mut unknown: Vec<_> = self.platforms.keys().map(String::as_str).filter(|id| Platform::try_from(*id).is_err()).collect();
        unknown.sort_unstable();
        unknown
    }
}

/// Overrides for a single platform.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PlatformOverride {
    /// The URL to download from instead of the built-in one.
    pub(crate) url: Option<String>,
    /// Text printed after fetching instead of probing again.
    pub(crate) instructions: Option<String>,
    /// The vendor header whose presence means nothing needs to be fetched.
    pub(crate) header: Option<String>,
}
