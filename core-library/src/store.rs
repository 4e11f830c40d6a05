//! Whole-file JSON persistence.
//!
//! Every store in this crate keeps its full contents in one JSON document that
//! is rewritten on each mutation. Writes go to a sibling temp file that is
//! flushed and then renamed over the target, so concurrent readers see either
//! the previous or the next snapshot and never a torn one. Missing or
//! unreadable documents are replaced with an empty value instead of failing.

use crate::error::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Typed handle to a JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document.
    ///
    /// A missing file or one that does not parse as `T` is reset to
    /// `T::default()` and that empty value is written back. Only genuine I/O
    /// failures are returned as errors.
    pub async fn load(&self) -> Result<T> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "store file missing, creating empty store");
                return self.reset().await;
            }
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "store file is corrupt, resetting to empty"
                );
                self.reset().await
            }
        }
    }

    /// Atomically replace the document with `value`.
    ///
    /// Returns only after the new contents are flushed and renamed into place.
    pub async fn save(&self, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let temp_path = self.temp_path();
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err.into());
        }

        Ok(())
    }

    async fn reset(&self) -> Result<T> {
        let value = T::default();
        self.save(&value).await?;
        Ok(value)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| OsString::from("store"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
