//! Launch.
//!
//! This module contains the hand-off to an external installer.

use anyhow::Context;
use std::fmt;
use std::path::Path;
use tracing::instrument;

/// Trait for launching files with whatever the host uses to open them.
pub(crate) trait Launcher: fmt::Debug {
    /// Launches the given file without waiting for it to finish.
    fn launch(&self, path: &Path) -> anyhow::Result<()>;
}

/// [`Launcher`] implementation using the default handler of the host.
#[derive(Debug)]
pub(crate) struct OsLauncher;

impl Launcher for OsLauncher {
    // detached: the installer keeps running after this process exited
    #[instrument(err, level = "trace")]
    fn launch(&self, path: &Path) -> anyhow::Result<()> {
        open::that_detached(path).with_context(|| format!("failed to open {}", path.display()))
    }
}

#[cfg(test)]
pub(crate) mod tests {

    use super::*;
    use std::cell::RefCell;
    use std::path::PathBuf;

    /// [`Launcher`] remembering what it was asked to launch.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingLauncher {
        pub(crate) launched: RefCell<Vec<PathBuf>>,
    }

    impl Launcher for RecordingLauncher {
        fn launch(&self, path: &Path) -> anyhow::Result<()> {
            self.launched.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }
}
