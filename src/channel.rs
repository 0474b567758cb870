//! The heartbeat FIFO: creation, keep-alive open, bounded line reads.

use std::fs::{File, OpenOptions};
use std::io::Read;
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use nix::sys::stat::Mode;
use nix::unistd;
use tokio::io::unix::AsyncFd;
use tokio::time::timeout_at;
use tracing::info;

/// The monitor's end of the heartbeat FIFO.
///
/// The FIFO is opened read+write: holding a write capability means the
/// reader never observes end-of-file when the last reporter disconnects, so
/// one handle stays valid for the daemon's whole lifetime. The descriptor is
/// released when the channel is dropped, on every exit path.
pub struct HeartbeatChannel {
    fd: AsyncFd<File>,
    pending: Vec<u8>,
}

impl HeartbeatChannel {
    /// Create the FIFO if it does not exist, along with its parent
    /// directory. An existing FIFO is reused; any other kind of file at the
    /// path is a setup error.
    pub fn create(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }

        match std::fs::symlink_metadata(path) {
            Ok(meta) if meta.file_type().is_fifo() => {
                info!("fifo {} already exists", path.display());
                Ok(())
            }
            Ok(_) => anyhow::bail!("{} exists but is not a fifo", path.display()),
            Err(_) => {
                info!("making fifo {}", path.display());
                unistd::mkfifo(path, Mode::from_bits_truncate(0o622))
                    .with_context(|| format!("failed to create fifo {}", path.display()))?;
                Ok(())
            }
        }
    }

    /// Open the FIFO for the daemon's lifetime and register it with the
    /// runtime's reactor.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .with_context(|| format!("failed to open fifo {}", path.display()))?;
        let fd = AsyncFd::new(file).context("failed to register fifo with the reactor")?;
        Ok(Self {
            fd,
            pending: Vec::new(),
        })
    }

    /// Wait up to `wait` for one newline-terminated message. Returns
    /// `Ok(None)` when the wait elapses without a complete line; a partial
    /// write stays buffered for the next call.
    pub async fn recv(&mut self, wait: Duration) -> std::io::Result<Option<String>> {
        if let Some(line) = take_line(&mut self.pending) {
            return Ok(Some(line));
        }

        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let mut guard = match timeout_at(deadline, self.fd.readable()).await {
                Err(_) => return Ok(None),
                Ok(ready) => ready?,
            };

            let mut buf = [0u8; 4096];
            match guard.try_io(|inner| {
                let mut file = inner.get_ref();
                file.read(&mut buf)
            }) {
                Ok(Ok(0)) => return Ok(None),
                Ok(Ok(n)) => {
                    self.pending.extend_from_slice(&buf[..n]);
                    if let Some(line) = take_line(&mut self.pending) {
                        return Ok(Some(line));
                    }
                }
                Ok(Err(err)) => return Err(err),
                // Spurious readiness: cleared by try_io, wait again.
                Err(_would_block) => continue,
            }
        }
    }
}

fn take_line(pending: &mut Vec<u8>) -> Option<String> {
    let pos = pending.iter().position(|&b| b == b'\n')?;
    let line: Vec<u8> = pending.drain(..=pos).collect();
    Some(String::from_utf8_lossy(&line[..pos]).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn fifo_in(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("heartbeat.fifo");
        HeartbeatChannel::create(&path).unwrap();
        path
    }

    #[test]
    fn create_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = fifo_in(&dir);
        HeartbeatChannel::create(&path).unwrap();
    }

    #[test]
    fn create_makes_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/run/heartbeat.fifo");
        HeartbeatChannel::create(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn create_rejects_non_fifo() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain");
        std::fs::write(&path, b"not a fifo").unwrap();
        assert!(HeartbeatChannel::create(&path).is_err());
    }

    #[tokio::test]
    async fn recv_returns_written_line() {
        let dir = tempdir().unwrap();
        let path = fifo_in(&dir);
        let mut channel = HeartbeatChannel::open(&path).unwrap();

        // The channel's own write capability keeps this open from blocking.
        let mut writer = OpenOptions::new().write(true).open(&path).unwrap();
        writer.write_all(b"app1,80,443\n").unwrap();
        drop(writer);

        let line = channel.recv(Duration::from_secs(2)).await.unwrap();
        assert_eq!(line.as_deref(), Some("app1,80,443"));
    }

    #[tokio::test]
    async fn recv_times_out_without_data() {
        let dir = tempdir().unwrap();
        let path = fifo_in(&dir);
        let mut channel = HeartbeatChannel::open(&path).unwrap();

        let line = channel.recv(Duration::from_millis(50)).await.unwrap();
        assert_eq!(line, None);
    }

    #[tokio::test]
    async fn recv_survives_writer_disconnects() {
        let dir = tempdir().unwrap();
        let path = fifo_in(&dir);
        let mut channel = HeartbeatChannel::open(&path).unwrap();

        for i in 0..3 {
            let mut writer = OpenOptions::new().write(true).open(&path).unwrap();
            writer.write_all(format!("app{},80\n", i).as_bytes()).unwrap();
            drop(writer);

            let line = channel.recv(Duration::from_secs(2)).await.unwrap();
            assert_eq!(line, Some(format!("app{},80", i)));
        }
    }

    #[tokio::test]
    async fn recv_splits_batched_lines() {
        let dir = tempdir().unwrap();
        let path = fifo_in(&dir);
        let mut channel = HeartbeatChannel::open(&path).unwrap();

        let mut writer = OpenOptions::new().write(true).open(&path).unwrap();
        writer.write_all(b"a,80\nb,443\n").unwrap();
        drop(writer);

        assert_eq!(channel.recv(Duration::from_secs(2)).await.unwrap().as_deref(), Some("a,80"));
        assert_eq!(channel.recv(Duration::from_secs(2)).await.unwrap().as_deref(), Some("b,443"));
    }

    #[tokio::test]
    async fn partial_line_stays_buffered() {
        let dir = tempdir().unwrap();
        let path = fifo_in(&dir);
        let mut channel = HeartbeatChannel::open(&path).unwrap();

        let mut writer = OpenOptions::new().write(true).open(&path).unwrap();
        writer.write_all(b"app1,8").unwrap();

        assert_eq!(channel.recv(Duration::from_millis(50)).await.unwrap(), None);

        writer.write_all(b"0\n").unwrap();
        let line = channel.recv(Duration::from_secs(2)).await.unwrap();
        assert_eq!(line.as_deref(), Some("app1,80"));
    }
}
