//! File-backed storage medium.
//!
//! Writes are staged in memory; a commit replaces the image file through a
//! temporary file and a rename so a crash never leaves a half-written image.

use std::path::{Path, PathBuf};

use tracing::debug;
use wifimgr_core::{StorageError, StorageMedium};

pub struct FileMedium {
    path: PathBuf,
    staged: Vec<u8>,
}

impl FileMedium {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            staged: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling of the image that receives a commit before the rename.
    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StorageMedium for FileMedium {
    fn begin(&mut self, capacity: usize) -> Result<(), StorageError> {
        self.staged = match std::fs::read(&self.path) {
            Ok(image) => image,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No image at {}, starting blank", self.path.display());
                Vec::new()
            }
            Err(e) => {
                return Err(StorageError::Medium(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        self.staged.resize(capacity, 0);
        Ok(())
    }

    fn read_byte(&self, addr: usize) -> u8 {
        self.staged.get(addr).copied().unwrap_or(0)
    }

    fn write_byte(&mut self, addr: usize, value: u8) {
        if let Some(byte) = self.staged.get_mut(addr) {
            *byte = value;
        }
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        let tmp = self.tmp_path();
        let written =
            std::fs::write(&tmp, &self.staged).and_then(|_| std::fs::rename(&tmp, &self.path));
        if let Err(e) = written {
            // a failed write or rename must not leave the partial image behind
            let _ = std::fs::remove_file(&tmp);
            return Err(StorageError::Medium(format!(
                "failed to write {}: {}",
                self.path.display(),
                e
            )));
        }
        debug!("Committed {} bytes to {}", self.staged.len(), self.path.display());
        Ok(())
    }
}
