// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Directory-backed [`BlobStore`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use sqlkeep_core::{BlobStore, ClientError};

/// Stores each blob as a file directly under `root`.
///
/// Names are plain filenames; anything containing a path separator is refused.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> Result<PathBuf, ClientError> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ClientError::blob(name, "invalid blob name"));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn read_bytes(&self, name: &str) -> Result<Vec<u8>, ClientError> {
        let path = self.path(name)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| ClientError::blob(name, e))
    }

    async fn write_bytes(&self, name: &str, bytes: &[u8]) -> Result<(), ClientError> {
        let path = self.path(name)?;
        // Write beside the target and rename over it so readers never see a
        // partial file.
        let staging = self.root.join(format!(".{name}.partial"));
        tokio::fs::write(&staging, bytes)
            .await
            .map_err(|e| ClientError::blob(name, e))?;
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(ClientError::blob(name, e));
        }
        debug!(blob = name, size = bytes.len(), "blob written");
        Ok(())
    }

    async fn delete_bytes(&self, name: &str) -> Result<(), ClientError> {
        let path = self.path(name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| ClientError::blob(name, e))
    }

    async fn exists(&self, name: &str) -> Result<bool, ClientError> {
        let path = self.path(name)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ClientError::blob(name, e)),
        }
    }
}
