//! Version.
//!
//! This module contains the build information of this program (not to be confused with the nrfjprog version).

use std::fmt;

/// Structure to hold the build information.
#[derive(Debug)]
pub(crate) struct BuildInfo {
    pkg_name: &'static str,
    pkg_version: &'static str,
    git_describe: &'static str,
    rustc_semver: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            pkg_name: env!("CARGO_PKG_NAME"),
            pkg_version: env!("CARGO_PKG_VERSION"),
            git_describe: env!("VERGEN_GIT_DESCRIBE"),
            rustc_semver: env!("VERGEN_RUSTC_SEMVER"),
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            pkg_name,
            pkg_version,
            git_describe,
            rustc_semver,
        } = self;
        write!(f, "{pkg_name} {pkg_version} (git/{git_describe}) (rustc/{rustc_semver})")
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use test_log::test;

    #[test]
    fn display_starts_with_package() {
        let info = BuildInfo::default().to_string();
        assert!(info.starts_with(concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))));
    }
}
