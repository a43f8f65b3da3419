//! Install.
//!
//! This module contains the code to install the extracted libraries and headers where the bindings look for them.

use crate::platform::CopyRule;
use anyhow::{Context, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use threadpool::ThreadPool;
use tracing::{instrument, trace};
use walkdir::WalkDir;

/// The files selected by a [`CopyRule`], relative to its source directory.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Selection {
    /// Shared libraries.
    pub(crate) libraries: Vec<PathBuf>,
    /// Header files.
    pub(crate) headers: Vec<PathBuf>,
}

impl Selection {
    /// Enumerates the source directory of the given rule and partitions its files.
    #[instrument(err, level = "trace", skip(rule), fields(source = %rule.source.display()))]
    pub(crate) fn scan(rule: &CopyRule) -> anyhow::Result<Self> {
        let mut selection = Self::default();
        for entry in WalkDir::new(&rule.source).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&rule.source) else {
                continue;
            };
            let name = relative.to_string_lossy();
            let library = rule.library_pattern.is_match(&name);
            let header = rule.header_pattern.is_match(&name);
            if library {
                selection.libraries.push(relative.to_path_buf());
            }
            if header {
                selection.headers.push(relative.to_path_buf());
            }
            if !library && !header {
                trace!(%name, "skipping");
            }
        }

        Ok(selection)
    }
}

/// Installs the files selected by the given rule.
///
/// Libraries and headers are installed concurrently; the first failure is returned after all jobs finished.
#[instrument(err, level = "trace", skip(rule, pool))]
pub(crate) fn install(rule: &CopyRule, selection: Selection, pool: &ThreadPool) -> anyhow::Result<usize> {
    let jobs = selection
        .libraries
        .into_iter()
        .map(|file| (file, &rule.library_destination))
        .chain(selection.headers.into_iter().map(|file| (file, &rule.header_destination)));

    let (tx, rx) = mpsc::channel();
    let mut num_jobs = 0;
    for (file, destination) in jobs {
        let from = rule.source.join(&file);
        let to = destination.join(&file);
        let tx = tx.clone();
        pool.execute(move || {
            let result = symlink_or_copy(&from, &to).with_context(|| format!("failed to install {} to {}", from.display(), to.display()));
            let _ = tx.send(result);
        });
        num_jobs += 1;
    }
    drop(tx);

    // join
    let mut first_err = None;
    let mut installed = 0;
    for result in rx.iter().take(num_jobs) {
        match result {
            Ok(()) => installed += 1,
            Err(err) => {
                first_err.get_or_insert(err);
            }
        }
    }
    if let Some(err) = first_err {
        return Err(err);
    }
    if installed != num_jobs {
        return Err(anyhow!("only {installed} of {num_jobs} files were installed"));
    }

    Ok(installed)
}

/// Places `from` at `to`, as a symbolic link where supported, as a copy otherwise.
pub(crate) fn symlink_or_copy(from: &Path, to: &Path) -> anyhow::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }

    // replace whatever a previous run left behind
    if fs::symlink_metadata(to).is_ok() {
        fs::remove_file(to)?;
    }

    #[cfg(unix)]
    {
        let target = std::path::absolute(from)?;
        match std::os::unix::fs::symlink(&target, to) {
            Ok(()) => return Ok(()),
            Err(err) => tracing::debug!(?err, "symlink failed, falling back to copy"),
        }
    }

    fs::copy(from, to)?;

    Ok(())
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::platform::{Platform, PlatformConfig};
    use regex::Regex;
    use tempfile::tempdir;
    use test_log::test;

    fn rule(root: &Path, library_pattern: &str) -> CopyRule {
        CopyRule {
            source: root.join("src"),
            library_destination: root.join("lib"),
            header_destination: root.join("include"),
            library_pattern: Regex::new(library_pattern).unwrap(),
            header_pattern: Regex::new(r"\.h$").unwrap(),
        }
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, path.file_name().unwrap().to_string_lossy().as_bytes()).unwrap();
    }

    #[test]
    fn scan_partitions_files() {
        let tempdir = tempdir().unwrap();
        let rule = rule(tempdir.path(), r"\.so");
        for name in ["a.so", "b.txt", "c.h"] {
            touch(&rule.source.join(name));
        }

        let selection = Selection::scan(&rule).unwrap();
        assert_eq!(selection.libraries, vec![PathBuf::from("a.so")]);
        assert_eq!(selection.headers, vec![PathBuf::from("c.h")]);
    }

    #[test]
    fn scan_is_recursive() {
        let tempdir = tempdir().unwrap();
        let rule = rule(tempdir.path(), r"\.so");
        touch(&rule.source.join("x86").join("libjlinkarm.so.6"));
        touch(&rule.source.join("headers").join("DllCommonDefinitions.h"));

        let selection = Selection::scan(&rule).unwrap();
        assert_eq!(selection.libraries, vec![Path::new("x86").join("libjlinkarm.so.6")]);
        assert_eq!(selection.headers, vec![Path::new("headers").join("DllCommonDefinitions.h")]);
    }

    #[test]
    fn scan_missing_source() {
        let tempdir = tempdir().unwrap();
        let rule = rule(tempdir.path(), r"\.so");
        assert!(Selection::scan(&rule).is_err());
    }

    #[test]
    fn install_places_files() {
        let tempdir = tempdir().unwrap();
        let rule = rule(tempdir.path(), r"\.so");
        for name in ["a.so", "b.txt", "c.h"] {
            touch(&rule.source.join(name));
        }

        let selection = Selection::scan(&rule).unwrap();
        let pool = ThreadPool::new(4);
        let installed = install(&rule, selection, &pool).unwrap();

        assert_eq!(installed, 2);
        assert_eq!(fs::read_to_string(rule.library_destination.join("a.so")).unwrap(), "a.so");
        assert_eq!(fs::read_to_string(rule.header_destination.join("c.h")).unwrap(), "c.h");
        assert!(!rule.library_destination.join("b.txt").exists());
        assert!(!rule.header_destination.join("b.txt").exists());
        assert!(!rule.library_destination.join("c.h").exists());
        assert!(!rule.header_destination.join("a.so").exists());
    }

    #[test]
    fn install_twice_overwrites() {
        let tempdir = tempdir().unwrap();
        let rule = rule(tempdir.path(), r"\.dylib");
        touch(&rule.source.join("libnrfjprogdll.dylib"));
        let pool = ThreadPool::new(2);

        install(&rule, Selection::scan(&rule).unwrap(), &pool).unwrap();
        install(&rule, Selection::scan(&rule).unwrap(), &pool).unwrap();

        assert!(rule.library_destination.join("libnrfjprogdll.dylib").is_file());
    }

    #[test]
    fn install_failure_when_destination_is_a_file() {
        let tempdir = tempdir().unwrap();
        let rule = rule(tempdir.path(), r"\.so");
        touch(&rule.source.join("a.so"));
        // a file where the destination directory should be
        touch(&rule.library_destination);

        let pool = ThreadPool::new(2);
        let err = install(&rule, Selection::scan(&rule).unwrap(), &pool).unwrap_err();
        assert!(err.to_string().contains("a.so"));
    }

    #[test]
    fn linux_rule_selects_vendor_files() {
        let tempdir = tempdir().unwrap();
        let config = PlatformConfig::for_platform(Platform::Linux, tempdir.path());
        let rule = config.copy_files.unwrap();
        for name in ["libnrfjprogdll.so", "libjlinkarm_nrf52_nrfjprog.so", "nrfjprogdll.h", "DllCommonDefinitions.h", "nrfjprog.ini", "readme.txt"] {
            touch(&rule.source.join(name));
        }

        let selection = Selection::scan(&rule).unwrap();
        assert_eq!(selection.libraries.len(), 2);
        assert_eq!(selection.headers.len(), 2);
    }
}
