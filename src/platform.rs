//! Platform.
//!
//! This module contains the supported platforms and the static configuration used to fetch nrfjprog for each of them.

use regex::Regex;
use std::env;
use std::path::{Path, PathBuf};

// The id for Linux as platform.
#[doc(hidden)]
const LINUX_ID: &str = "linux";

// The id for macOS as platform.
#[doc(hidden)]
const DARWIN_ID: &str = "darwin";

// The id for Windows as platform.
#[doc(hidden)]
const WIN32_ID: &str = "win32";

/// Name of the download directory within the base directory.
pub(crate) const DOWNLOAD_DIR: &str = "nrfjprog";

// See https://www.nordicsemi.com/eng/nordic/Products/nRF51822/nRF5x-Command-Line-Tools-Linux64/51386
#[doc(hidden)]
const LINUX_URL: &str = "https://www.nordicsemi.com/eng/nordic/download_resource/51386/27/17243451/94917";

// See https://www.nordicsemi.com/eng/nordic/Products/nRF51822/nRF5x-Command-Line-Tools-OSX/53402
#[doc(hidden)]
const DARWIN_URL: &str = "https://www.nordicsemi.com/eng/nordic/download_resource/53402/19/93375824/99977";

// See https://www.nordicsemi.com/eng/nordic/Products/nRF51822/nRF5x-Command-Line-Tools-Win32/33444
#[doc(hidden)]
const WIN32_URL: &str = "https://www.nordicsemi.com/eng/nordic/download_resource/33444/47/97153666/53210";

// Pattern for header files.
#[doc(hidden)]
const HEADER_PATTERN: &str = r"\.h$";

/// The error type for resolving a platform.
#[derive(Debug, thiserror::Error)]
pub(crate) enum PlatformError {
    /// The platform is not supported.
    #[error("Unsupported platform: '{0}'. Cannot get nrfjprog command-line tools.")]
    Unsupported(String),
}

/// Enumeration of supported platforms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Platform {
    /// Linux (64 bit)
    Linux,
    /// macOS
    Darwin,
    /// Windows
    Win32,
}

impl Platform {
    /// Returns the id of the platform running this process.
    ///
    /// Unsupported operating systems are passed through as-is so that resolving them names the culprit.
    pub(crate) fn host_id() -> &'static str {
        match env::consts::OS {
            "macos" => DARWIN_ID,
            "windows" => WIN32_ID,
            os => os,
        }
    }

    /// Resolves the requested platform id, falling back to the platform running this process.
    pub(crate) fn resolve(requested: Option<&str>) -> Result<Self, PlatformError> {
        let id = match requested {
            Some(id) => id,
            None => Self::host_id(),
        };
        Self::try_from(id)
    }

    /// Returns the id of the platform.
    pub(crate) fn id(&self) -> &'static str {
        match self {
            Self::Linux => LINUX_ID,
            Self::Darwin => DARWIN_ID,
            Self::Win32 => WIN32_ID,
        }
    }

    /// Returns the file name of the nrfjprog library on this platform.
    pub(crate) fn library_name(&self) -> &'static str {
        match self {
            Self::Linux => "libnrfjprogdll.so",
            Self::Darwin => "libnrfjprogdll.dylib",
            Self::Win32 => "nrfjprog.dll",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl TryFrom<&str> for Platform {
    type Error = PlatformError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            LINUX_ID => Ok(Self::Linux),
            DARWIN_ID => Ok(Self::Darwin),
            WIN32_ID => Ok(Self::Win32),
            _ => Err(PlatformError::Unsupported(value.to_string())),
        }
    }
}

/// Rule describing which extracted files get installed where.
#[derive(Clone, Debug)]
pub(crate) struct CopyRule {
    /// The directory that is searched (recursively) for files.
    pub(crate) source: PathBuf,
    /// The directory receiving the shared libraries.
    pub(crate) library_destination: PathBuf,
    /// The directory receiving the header files.
    pub(crate) header_destination: PathBuf,
    /// Matches shared library files.
    pub(crate) library_pattern: Regex,
    /// Matches header files.
    pub(crate) header_pattern: Regex,
}

/// The static per-platform configuration.
#[derive(Clone, Debug)]
pub(crate) struct PlatformConfig {
    /// The platform this configuration belongs to.
    pub(crate) platform: Platform,
    /// The directory all downloads end up in.
    pub(crate) download_dir: PathBuf,
    /// The URL to download the archive or installer from.
    pub(crate) url: String,
    /// The local file the download is written to.
    pub(crate) destination_file: PathBuf,
    /// The directory the archive gets extracted to, if any.
    pub(crate) extract_to: Option<PathBuf>,
    /// What to install after extraction, if anything.
    pub(crate) copy_files: Option<CopyRule>,
    /// The file to hand off to the host's default handler, if any.
    pub(crate) spawn_child: Option<PathBuf>,
    /// Text printed instead of re-probing, if any.
    pub(crate) instructions: Option<String>,
    /// A vendor header whose presence means the tools are already installed.
    pub(crate) header_override: Option<PathBuf>,
    /// The directories searched for the nrfjprog library.
    pub(crate) library_dirs: Vec<PathBuf>,
}

impl PlatformConfig {
    /// Creates the configuration for the given platform.
    pub(crate) fn for_platform(platform: Platform, basedir: &Path) -> Self {
        let download_dir = basedir.join(DOWNLOAD_DIR);
        match platform {
            Platform::Linux => {
                let unpacked = download_dir.join("unpacked");
                let lib = download_dir.join("lib");
                Self {
                    platform,
                    url: LINUX_URL.to_string(),
                    destination_file: download_dir.join("nrfjprog-linux64.tar"),
                    extract_to: Some(unpacked.clone()),
                    copy_files: Some(CopyRule {
                        source: unpacked.join("nrfjprog"),
                        library_destination: lib.clone(),
                        header_destination: download_dir.join("include"),
                        library_pattern: static_regex(r"\.so"),
                        header_pattern: static_regex(HEADER_PATTERN),
                    }),
                    spawn_child: None,
                    instructions: None,
                    header_override: None,
                    library_dirs: vec![lib],
                    download_dir,
                }
            }
            Platform::Darwin => {
                let unpacked = download_dir.join("unpacked");
                Self {
                    platform,
                    url: DARWIN_URL.to_string(),
                    destination_file: download_dir.join("nrfjprog-darwin.tar"),
                    extract_to: Some(unpacked.clone()),
                    copy_files: Some(CopyRule {
                        source: unpacked.join("nrfjprog"),
                        library_destination: basedir.to_path_buf(),
                        header_destination: download_dir.join("include"),
                        library_pattern: static_regex(r"\.dylib"),
                        header_pattern: static_regex(HEADER_PATTERN),
                    }),
                    spawn_child: None,
                    instructions: None,
                    header_override: None,
                    library_dirs: vec![basedir.to_path_buf()],
                    download_dir,
                }
            }
            Platform::Win32 => {
                let installer = download_dir.join("nrfjprog-win32.exe");
                let vendor_dir = env::var_os("ProgramFiles(x86)").map(|dir| PathBuf::from(dir).join("Nordic Semiconductor").join("nrf5x").join("bin"));
                let header_override = vendor_dir.as_ref().map(|dir| dir.join("headers").join("nrfjprog.h"));
                Self {
                    platform,
                    url: WIN32_URL.to_string(),
                    destination_file: installer.clone(),
                    extract_to: None,
                    copy_files: None,
                    spawn_child: Some(installer),
                    instructions: None,
                    header_override,
                    library_dirs: vendor_dir.into_iter().collect(),
                    download_dir,
                }
            }
        }
    }
}

// Compiles one of the built-in patterns.
#[doc(hidden)]
fn static_regex(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(err) => unreachable!("invalid built-in pattern {pattern}: {err}"),
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use test_log::test;

    #[test]
    fn resolve_supported_platforms() {
        let basedir = Path::new("/opt/tools");
        for id in [LINUX_ID, DARWIN_ID, WIN32_ID] {
            let platform = Platform::resolve(Some(id)).unwrap();
            let config = PlatformConfig::for_platform(platform, basedir);
            assert_eq!(config.platform.id(), id);
            assert!(config.url.starts_with("https://"));
            assert!(config.destination_file.starts_with(basedir.join(DOWNLOAD_DIR)));
            assert!(config.destination_file.file_name().is_some());
            if let Some(extract_to) = &config.extract_to {
                assert!(extract_to.starts_with(&config.download_dir));
            }
            if let Some(rule) = &config.copy_files {
                assert!(rule.source.starts_with(&config.download_dir));
                assert!(!rule.library_destination.as_os_str().is_empty());
                assert!(!rule.header_destination.as_os_str().is_empty());
            }
        }
    }

    #[test]
    fn resolve_unsupported_platform() {
        let err = Platform::resolve(Some("sunos")).unwrap_err();
        assert!(matches!(&err, PlatformError::Unsupported(id) if id == "sunos"));
        assert!(err.to_string().contains("'sunos'"));
    }

    #[test]
    fn resolve_is_exact() {
        assert!(Platform::try_from("Linux").is_err());
        assert!(Platform::try_from("linux64").is_err());
        assert!(Platform::try_from("").is_err());
    }

    #[test]
    fn linux_layout() {
        let basedir = Path::new("base");
        let config = PlatformConfig::for_platform(Platform::Linux, basedir);
        let download_dir = basedir.join(DOWNLOAD_DIR);
        assert_eq!(config.destination_file, download_dir.join("nrfjprog-linux64.tar"));
        assert_eq!(config.extract_to, Some(download_dir.join("unpacked")));
        let rule = config.copy_files.unwrap();
        assert_eq!(rule.library_destination, download_dir.join("lib"));
        assert_eq!(rule.header_destination, download_dir.join("include"));
        assert!(rule.library_pattern.is_match("libnrfjprogdll.so"));
        assert!(!rule.library_pattern.is_match("libnrfjprogdll.dylib"));
        assert!(config.spawn_child.is_none());
        assert!(config.header_override.is_none());
    }

    #[test]
    fn darwin_layout() {
        let basedir = Path::new("base");
        let config = PlatformConfig::for_platform(Platform::Darwin, basedir);
        let rule = config.copy_files.unwrap();
        assert_eq!(rule.library_destination, basedir);
        assert!(rule.library_pattern.is_match("libnrfjprogdll.dylib"));
        assert!(rule.header_pattern.is_match("nrfjprogdll.h"));
        assert!(!rule.header_pattern.is_match("nrfjprogdll.hpp"));
    }

    #[test]
    fn win32_layout() {
        let basedir = Path::new("base");
        let config = PlatformConfig::for_platform(Platform::Win32, basedir);
        let installer = basedir.join(DOWNLOAD_DIR).join("nrfjprog-win32.exe");
        assert_eq!(config.destination_file, installer);
        assert_eq!(config.spawn_child, Some(installer));
        assert!(config.extract_to.is_none());
        assert!(config.copy_files.is_none());
    }

    #[test]
    fn host_id_maps_rust_names() {
        let id = Platform::host_id();
        assert_ne!(id, "macos");
        assert_ne!(id, "windows");
    }

    #[test]
    fn resolve_requested_platform_from_owned_string() {
        let requested = Some(String::from("darwin"));
        let platform = Platform::resolve(requested.as_deref()).unwrap();
        assert_eq!(platform, Platform::Darwin);
    }

    #[test]
    fn resolve_falls_back_to_host() {
        match Platform::resolve(None) {
            Ok(platform) => assert_eq!(platform.id(), Platform::host_id()),
            Err(PlatformError::Unsupported(id)) => assert_eq!(id, Platform::host_id()),
        }
    }
}
