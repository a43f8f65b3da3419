//! Probe.
//!
//! This module contains the capability probe (asking the nrfjprog library for its version) and the
//! classification of probe failures into the ones that fetching nrfjprog can fix and the ones it can't.

use crate::platform::PlatformConfig;
use libloading::{Library, Symbol};
use std::ffi::{c_char, c_int};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{instrument, trace};

/// Error number reported when the nrfjprog library could not be found.
pub(crate) const ERRNO_LIBRARY_NOT_FOUND: i32 = 2;

/// Error code reported when the nrfjprog library could not be found.
pub(crate) const ERRCODE_LIBRARY_NOT_FOUND: &str = "CouldNotFindJprogDLL";

/// Error number reported when the nrfjprog library could not be loaded.
pub(crate) const ERRNO_LIBRARY_NOT_LOADED: i32 = 3;

/// Error code reported when the nrfjprog library could not be loaded.
pub(crate) const ERRCODE_LIBRARY_NOT_LOADED: &str = "CouldNotLoadDLL";

/// Error number reported when a call into the nrfjprog library failed.
pub(crate) const ERRNO_CALL_FAILED: i32 = 13;

/// Error code reported when a call into the nrfjprog library failed.
pub(crate) const ERRCODE_CALL_FAILED: &str = "NrfjprogError";

/// Prefix of the message reported when the bindings have not been built yet.
pub(crate) const BINDINGS_NOT_FOUND: &str = "Could not locate the bindings file";

// Name of the version function exported by the nrfjprog library.
#[doc(hidden)]
const DLL_VERSION_SYMBOL: &[u8] = b"NRFJPROG_dll_version\0";

/// The failure value returned by a probe.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub(crate) struct ProbeError {
    /// The numeric error code, if any.
    pub(crate) errno: Option<i32>,
    /// The name of the error code, if any.
    pub(crate) errcode: Option<String>,
    /// The human readable message.
    pub(crate) message: String,
}

impl ProbeError {
    /// Creates a `ProbeError` carrying an error code and its name.
    pub(crate) fn coded(errno: i32, errcode: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errno: Some(errno),
            errcode: Some(errcode.into()),
            message: message.into(),
        }
    }

    /// Creates a `ProbeError` carrying just a message.
    pub(crate) fn message(message: impl Into<String>) -> Self {
        Self {
            errno: None,
            errcode: None,
            message: message.into(),
        }
    }
}

/// The kinds of probe failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FailureKind {
    /// The bindings are built but the nrfjprog library is missing.
    LibraryMissing,
    /// The bindings are not built yet.
    BindingsMissing,
    /// Anything else, e.g. problems with the J-Link libraries.
    Unrelated,
}

impl FailureKind {
    /// Whether fetching nrfjprog can fix this failure.
    pub(crate) fn is_fixable(&self) -> bool {
        !matches!(self, Self::Unrelated)
    }

    /// Whether the probe should run again after a successful fetch.
    ///
    /// Missing bindings still need to be compiled afterwards, so probing again would fail anyway.
    pub(crate) fn reprobe(&self) -> bool {
        matches!(self, Self::LibraryMissing)
    }
}

/// Classifies the given probe failure.
pub(crate) fn classify(err: &ProbeError) -> FailureKind {
    match (err.errno, err.errcode.as_deref()) {
        (Some(ERRNO_LIBRARY_NOT_FOUND), Some(ERRCODE_LIBRARY_NOT_FOUND)) => FailureKind::LibraryMissing,
        _ if err.message.starts_with(BINDINGS_NOT_FOUND) => FailureKind::BindingsMissing,
        _ => FailureKind::Unrelated,
    }
}

/// Trait for capability probes.
pub(crate) trait Probe: fmt::Debug {
    /// Queries the version of the nrfjprog library.
    fn library_version(&self) -> Result<String, ProbeError>;
}

/// The outcome of assessing the current installation.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Assessment {
    /// The library works.
    Available(String),
    /// The probe failed, but the vendor headers are installed system-wide.
    HeaderOverride(PathBuf),
    /// The library is missing and fetching it should help.
    Fetch(FailureKind),
    /// The probe failed for a reason fetching won't fix.
    Unrelated(ProbeError),
}

/// Probes the library and decides what to do about the result.
#[instrument(level = "trace", skip(probe, config), fields(platform = %config.platform))]
pub(crate) fn assess(probe: &dyn Probe, config: &PlatformConfig) -> Assessment {
    let err = match probe.library_version() {
        Ok(version) => return Assessment::Available(version),
        Err(err) => err,
    };
    trace!(?err, "probe failed");

    if let Some(header) = &config.header_override {
        if header.is_file() {
            return Assessment::HeaderOverride(header.clone());
        }
    }

    let kind = classify(&err);
    if kind.is_fixable() { Assessment::Fetch(kind) } else { Assessment::Unrelated(err) }
}

/// [`Probe`] implementation that loads the nrfjprog library and asks it for its version.
#[derive(Debug)]
pub(crate) struct NativeProbe {
    bindings: Option<PathBuf>,
    library_dirs: Vec<PathBuf>,
    library_name: &'static str,
}

impl NativeProbe {
    /// Creates a new `NativeProbe` searching the library dirs of the given configuration.
    pub(crate) fn new(config: &PlatformConfig) -> Self {
        Self {
            bindings: None,
            library_dirs: config.library_dirs.clone(),
            library_name: config.platform.library_name(),
        }
    }

    /// The compiled bindings that have to exist before the library can be used.
    pub(crate) fn bindings(&mut self, bindings: Option<PathBuf>) -> &mut Self {
        self.bindings = bindings;

        self
    }

    /// Adds more directories to search the library in.
    pub(crate) fn library_dirs<I>(&mut self, dirs: I) -> &mut Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.library_dirs.extend(dirs);

        self
    }

    // Finds the library within the library dirs.
    fn find_library(&self) -> Option<PathBuf> {
        self.library_dirs.iter().map(|dir| dir.join(self.library_name)).find(|path| path.is_file())
    }

    // Loads the library and calls its version function.
    fn query_version(path: &Path) -> Result<String, ProbeError> {
        type DllVersion = unsafe extern "C" fn(*mut u32, *mut u32, *mut c_char) -> c_int;

        // SAFETY: loading nrfjprog runs its initialisers, which have no preconditions
        let library = unsafe { Library::new(path) }.map_err(|err| {
            ProbeError::coded(ERRNO_LIBRARY_NOT_LOADED, ERRCODE_LIBRARY_NOT_LOADED, format!("Could not load {}: {err}", path.display()))
        })?;

        // SAFETY: the signature matches the declaration in nrfjprogdll.h
        let dll_version: Symbol<DllVersion> = unsafe { library.get(DLL_VERSION_SYMBOL) }.map_err(|err| {
            ProbeError::coded(ERRNO_LIBRARY_NOT_LOADED, ERRCODE_LIBRARY_NOT_LOADED, format!("Could not load NRFJPROG_dll_version: {err}"))
        })?;

        let mut major = 0u32;
        let mut minor = 0u32;
        let mut revision: c_char = 0;
        // SAFETY: all out-pointers are valid for the duration of the call
        let rc = unsafe { dll_version(&mut major, &mut minor, &mut revision) };
        if rc != 0 {
            return Err(ProbeError::coded(ERRNO_CALL_FAILED, ERRCODE_CALL_FAILED, format!("NRFJPROG_dll_version failed with {rc}")));
        }

        Ok(format_version(major, minor, revision as u8))
    }
}

impl Probe for NativeProbe {
    #[instrument(level = "trace", ret, err)]
    fn library_version(&self) -> Result<String, ProbeError> {
        if let Some(bindings) = &self.bindings {
            if !bindings.is_file() {
                return Err(ProbeError::message(format!("{BINDINGS_NOT_FOUND}. Tried:\n → {}", bindings.display())));
            }
        }

        let Some(library) = self.find_library() else {
            let tried: Vec<_> = self.library_dirs.iter().map(|dir| dir.display().to_string()).collect();
            return Err(ProbeError::coded(
                ERRNO_LIBRARY_NOT_FOUND,
                ERRCODE_LIBRARY_NOT_FOUND,
                format!("Could not find {} in [{}]", self.library_name, tried.join(", ")),
            ));
        };
        trace!(library = %library.display());

        Self::query_version(&library)
    }
}

// Formats the version as reported by NRFJPROG_dll_version.
#[doc(hidden)]
fn format_version(major: u32, minor: u32, revision: u8) -> String {
    if revision.is_ascii_graphic() {
        format!("{major}.{minor}.{}", revision as char)
    } else {
        format!("{major}.{minor}.{revision}")
    }
}
