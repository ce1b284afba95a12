//! Local file range reader.
//!
//! Slides are read with positional reads (`pread` on Unix, `seek_read` on
//! Windows) so the file handle can be shared without a seek cursor. Reads run
//! on tokio's blocking pool.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::RangeReader;
use crate::error::IoError;

/// Range reader over a file on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFileReader {
    file: Arc<File>,
    path: PathBuf,
    size: u64,
    identifier: String,
}

impl LocalFileReader {
    /// Open a local file for positional reads.
    ///
    /// Fails with [`IoError::NotFound`] when the path does not exist and with
    /// [`IoError::Io`] when it is not a regular file or cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref().to_path_buf();
        let identifier = path.display().to_string();

        let open_path = path.clone();
        let open_id = identifier.clone();
        let (file, size) = tokio::task::spawn_blocking(move || open_regular_file(&open_path, &open_id))
            .await
            .map_err(|e| IoError::Io {
                path: identifier.clone(),
                message: e.to_string(),
            })??;

        debug!(path = %identifier, size, "opened local slide file");

        Ok(Self {
            file: Arc::new(file),
            path,
            size,
            identifier,
        })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_regular_file(path: &Path, identifier: &str) -> Result<(File, u64), IoError> {
    let file = File::open(path).map_err(|e| IoError::from_std(identifier, e))?;
    let metadata = file
        .metadata()
        .map_err(|e| IoError::from_std(identifier, e))?;

    if !metadata.is_file() {
        return Err(IoError::Io {
            path: identifier.to_string(),
            message: "not a regular file".to_string(),
        });
    }

    Ok((file, metadata.len()))
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.seek_read(&mut buf[filled..], offset + filled as u64)?;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        filled += n;
    }
    Ok(())
}

#[async_trait]
impl RangeReader for LocalFileReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let in_bounds = offset
            .checked_add(len as u64)
            .map(|end| end <= self.size)
            .unwrap_or(false);
        if !in_bounds {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.size,
            });
        }

        if len == 0 {
            return Ok(Bytes::new());
        }

        let file = Arc::clone(&self.file);
        let identifier = self.identifier.clone();
        tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; len];
            read_at(&file, &mut buf, offset).map_err(|e| IoError::from_std(&identifier, e))?;
            Ok(Bytes::from(buf))
        })
        .await
        .map_err(|e| IoError::Io {
            path: self.identifier.clone(),
            message: e.to_string(),
        })?
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
