//! Persisted recovery-attempt flag.
//!
//! The flag is a zero-byte file whose existence means "a warm reboot was
//! already spent on this failure streak". Its content is never read.
//!
//! ```text
//! cold boot, device missing  → Absent  → mark()  → Present → reboot
//! warm boot, device present  → Present → clear() → Absent
//! warm boot, device missing  → Present → (fatal, left in place)
//! ```

use crate::error::{KioskError, Result};
use fs_err as fs;
use fs_err::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelState {
    Present,
    Absent,
}

impl SentinelState {
    pub fn is_present(self) -> bool {
        self == SentinelState::Present
    }
}

/// Handle on the sentinel file at a fixed path.
#[derive(Debug, Clone)]
pub struct Sentinel {
    path: PathBuf,
}

impl Sentinel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> Result<SentinelState> {
        match fs::symlink_metadata(&self.path) {
            Ok(_) => Ok(SentinelState::Present),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(SentinelState::Absent),
            Err(e) => Err(KioskError::io("Failed to stat sentinel", e)),
        }
    }

    /// Creates the sentinel and flushes it to disk before returning.
    ///
    /// Both the file and its parent directory are fsynced: the reboot that
    /// follows must observe the flag or the guard could loop.
    pub fn mark(&self) -> Result<()> {
        let parent = self.parent_dir();
        fs::create_dir_all(&parent)
            .map_err(|e| KioskError::io("Failed to create sentinel directory", e))?;

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| KioskError::io("Failed to create sentinel", e))?;
        file.sync_all()
            .map_err(|e| KioskError::io("Failed to sync sentinel", e))?;
        drop(file);

        sync_dir(&parent)
    }

    /// Removes the sentinel. Returns whether a file was actually removed.
    pub fn clear(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                sync_dir(&self.parent_dir())?;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(KioskError::io("Failed to remove sentinel", e)),
        }
    }

    fn parent_dir(&self) -> PathBuf {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn sync_dir(dir: &Path) -> Result<()> {
    let handle = fs::File::open(dir)
        .map_err(|e| KioskError::io("Failed to open sentinel directory", e))?;
    handle
        .sync_all()
        .map_err(|e| KioskError::io("Failed to sync sentinel directory", e))
}
