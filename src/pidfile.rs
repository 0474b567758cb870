//! Pid-file handling with a single-instance lock.
//!
//! Two monitors fencing ports against each other would flap rules forever,
//! so the pid file doubles as an flock-based exclusion lock.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use fs2::FileExt;
use tracing::{info, warn};

/// Holds the pid file for the process lifetime. The file is removed and the
/// lock released when the guard drops, on every exit path.
pub struct PidFile {
    path: PathBuf,
    _file: File,
}

impl PidFile {
    /// Write the pid file, refusing to start if another instance holds it.
    ///
    /// Opened with create+read+write and no truncate so there is no window
    /// between creation and lock acquisition.
    pub fn create(path: PathBuf) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("failed to open pid file {}", path.display()))?;

        fs::set_permissions(&path, fs::Permissions::from_mode(0o644))
            .context("failed to set pid file permissions")?;

        file.try_lock_exclusive().map_err(|_| {
            anyhow::anyhow!("another instance already holds {}", path.display())
        })?;

        file.set_len(0)?;
        write!(file, "{}", std::process::id())?;
        file.flush()?;
        info!("wrote pid to {}", path.display());

        Ok(Self { path, _file: file })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => info!("removed pidfile {}", self.path.display()),
            Err(err) => warn!("failed to remove pidfile {}: {}", self.path.display(), err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_pid_and_cleans_up() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("monitor.pid");

        let guard = PidFile::create(path.clone()).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, std::process::id().to_string());

        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn second_instance_is_refused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("monitor.pid");

        let _guard = PidFile::create(path.clone()).unwrap();
        assert!(PidFile::create(path).is_err());
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("monitor.pid");

        drop(PidFile::create(path.clone()).unwrap());
        let _guard = PidFile::create(path).unwrap();
    }
}
