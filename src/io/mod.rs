//! Bounded file access.
//!
//! Input files are memory-mapped read-only after their size has been checked
//! against `IoLimits`, so a hostile multi-gigabyte file is rejected before any
//! parsing starts.

pub mod error;

use crate::io::error::{IoError, Result};
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};

/// Default ceiling on input file size (256 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 256 * 1024 * 1024;

/// Defines the resource limits for I/O operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoLimits {
    /// The absolute maximum file size that can be opened.
    pub max_file_size: u64,
}

impl Default for IoLimits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// A read-only view of a file's bytes
pub struct MappedFile {
    // None when the file size is zero; memmap cannot map empty files.
    mmap: Option<Mmap>,
}

impl MappedFile {
    pub fn as_bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AsRef<[u8]> for MappedFile {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Memory-map `path` after checking it against `limits`.
pub fn read_file<P: AsRef<Path>>(path: P, limits: &IoLimits) -> Result<MappedFile> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let file_size = file.metadata()?.len();

    debug!(
        path = %path.display(),
        size = file_size,
        limit = limits.max_file_size,
        "mapping input file"
    );

    if file_size > limits.max_file_size {
        warn!(
            path = %path.display(),
            size = file_size,
            limit = limits.max_file_size,
            "File is too large"
        );
        return Err(IoError::FileTooLarge {
            limit: limits.max_file_size,
            found: file_size,
        });
    }

    let mmap = if file_size == 0 {
        None
    } else {
        // Safety: read-only map of a regular file; callers only borrow the bytes.
        Some(unsafe { Mmap::map(&file)? })
    };

    Ok(MappedFile { mmap })
}
