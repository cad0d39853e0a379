use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock '{}' is held by another process", path.display())]
    Busy { path: PathBuf },

    #[error("failed to acquire lock '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Exclusive advisory lock guarding one target file across processes.
///
/// The lock lives in a sibling `<target>.lock` file and is released on drop.
/// The lock file is left in place afterwards, so a directory that is
/// committed to version control should ignore `*.lock`.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    pub fn lock_path_for(target: &Path) -> PathBuf {
        let mut name = target
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("history"));
        name.push(".lock");
        target.with_file_name(name)
    }

    /// Takes the lock without waiting.
    pub fn acquire(target: &Path) -> Result<Self, LockError> {
        let path = Self::lock_path_for(target);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| LockError::Io {
                    path: path.clone(),
                    source,
                })?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::Io {
                path: path.clone(),
                source,
            })?;

        if let Err(err) = file.try_lock_exclusive() {
            if err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
                || err.kind() == io::ErrorKind::WouldBlock
            {
                return Err(LockError::Busy { path });
            }
            return Err(LockError::Io { path, source: err });
        }

        debug!(path = %path.display(), "run lock acquired");
        Ok(Self { file, path })
    }

}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!(path = %self.path.display(), "run lock released");
    }
}
