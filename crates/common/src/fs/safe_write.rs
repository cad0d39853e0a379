use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Ceiling for one serialized record (64 KiB).
pub const DEFAULT_MAX_RECORD_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum SafeWriteError {
    #[error("I/O error during {operation} on '{}': {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("record of {size} bytes exceeds maximum {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("record contains a line break")]
    MultiLine,
}

impl SafeWriteError {
    fn io(operation: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What an append did to the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendReceipt {
    /// File length before the append.
    pub offset: u64,
    pub bytes_written: usize,
    /// The file did not end with a newline, so one was written first.
    pub repaired_tail: bool,
}

/// Writer for line-oriented, append-only files.
///
/// Each record goes out in a single `write_all` on a handle opened in append
/// mode and is flushed with `sync_all` before returning. Bytes already in the
/// file are never modified.
#[derive(Debug, Clone)]
pub struct SafeFileWriter {
    max_record_size: Option<usize>,
}

impl Default for SafeFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl SafeFileWriter {
    pub fn new() -> Self {
        Self {
            max_record_size: Some(DEFAULT_MAX_RECORD_BYTES),
        }
    }

    /// Creates the parent directories and an empty file when `path` does not
    /// exist yet. Returns `true` when the file was created.
    pub fn ensure_file(&self, path: &Path) -> Result<bool, SafeWriteError> {
        if path.exists() {
            return Ok(false);
        }
        create_parent(path)?;
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => {
                file.sync_all()
                    .map_err(|e| SafeWriteError::io("sync new file", path, e))?;
                Ok(true)
            }
            // Another process created it in the meantime.
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(SafeWriteError::io("create file", path, e)),
        }
    }

    /// Appends `record` followed by `\n`.
    pub fn append_line(&self, path: &Path, record: &str) -> Result<AppendReceipt, SafeWriteError> {
        self.validate_record(record)?;
        create_parent(path)?;

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)
            .map_err(|e| SafeWriteError::io("open for append", path, e))?;

        let offset = file
            .metadata()
            .map_err(|e| SafeWriteError::io("read metadata", path, e))?
            .len();
        let repaired_tail = offset > 0 && !ends_with_newline(&mut file, offset, path)?;

        let mut buf = Vec::with_capacity(record.len() + 2);
        if repaired_tail {
            buf.push(b'\n');
        }
        buf.extend_from_slice(record.as_bytes());
        buf.push(b'\n');

        file.write_all(&buf)
            .map_err(|e| SafeWriteError::io("append record", path, e))?;
        file.sync_all()
            .map_err(|e| SafeWriteError::io("sync record", path, e))?;

        Ok(AppendReceipt {
            offset,
            bytes_written: buf.len(),
            repaired_tail,
        })
    }

    fn validate_record(&self, record: &str) -> Result<(), SafeWriteError> {
        if record.contains('\n') || record.contains('\r') {
            return Err(SafeWriteError::MultiLine);
        }
        if let Some(limit) = self.max_record_size {
            if record.len() > limit {
                return Err(SafeWriteError::TooLarge {
                    size: record.len(),
                    limit,
                });
            }
        }
        Ok(())
    }
}

fn create_parent(path: &Path) -> Result<(), SafeWriteError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            fs::create_dir_all(parent)
                .map_err(|e| SafeWriteError::io("create parent directories", parent, e))
        }
        _ => Ok(()),
    }
}

fn ends_with_newline(file: &mut File, len: u64, path: &Path) -> Result<bool, SafeWriteError> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))
        .map_err(|e| SafeWriteError::io("seek to file end", path, e))?;
    file.read_exact(&mut last)
        .map_err(|e| SafeWriteError::io("read last byte", path, e))?;
    Ok(last[0] == b'\n')
}
