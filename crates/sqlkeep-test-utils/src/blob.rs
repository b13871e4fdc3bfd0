// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Blob store doubles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use sqlkeep_core::{BlobStore, ClientError};

/// Blob store holding everything in a map.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted names of every stored blob.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.blobs.lock().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read_bytes(&self, name: &str) -> Result<Vec<u8>, ClientError> {
        self.blobs
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ClientError::blob(name, "not found"))
    }

    async fn write_bytes(&self, name: &str, bytes: &[u8]) -> Result<(), ClientError> {
        self.blobs
            .lock()
            .await
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete_bytes(&self, name: &str) -> Result<(), ClientError> {
        self.blobs
            .lock()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ClientError::blob(name, "not found"))
    }

    async fn exists(&self, name: &str) -> Result<bool, ClientError> {
        Ok(self.blobs.lock().await.contains_key(name))
    }
}

/// Wraps a store so that every delete fails while reads and writes pass through.
pub struct FlakyBlobStore<B> {
    inner: B,
    failed_deletes: AtomicUsize,
}

impl<B: BlobStore> FlakyBlobStore<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            failed_deletes: AtomicUsize::new(0),
        }
    }

    pub fn failed_deletes(&self) -> usize {
        self.failed_deletes.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }
}

#[async_trait]
impl<B: BlobStore> BlobStore for FlakyBlobStore<B> {
    async fn read_bytes(&self, name: &str) -> Result<Vec<u8>, ClientError> {
        self.inner.read_bytes(name).await
    }

    async fn write_bytes(&self, name: &str, bytes: &[u8]) -> Result<(), ClientError> {
        self.inner.write_bytes(name, bytes).await
    }

    async fn delete_bytes(&self, name: &str) -> Result<(), ClientError> {
        self.failed_deletes.fetch_add(1, Ordering::SeqCst);
        Err(ClientError::blob(name, "injected delete failure"))
    }

    async fn exists(&self, name: &str) -> Result<bool, ClientError> {
        self.inner.exists(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trips_and_overwrites() {
        let store = MemoryBlobStore::new();
        store.write_bytes("a.sqlite3", b"one").await.unwrap();
        store.write_bytes("a.sqlite3", b"two").await.unwrap();
        assert_eq!(store.read_bytes("a.sqlite3").await.unwrap(), b"two");
        assert!(store.exists("a.sqlite3").await.unwrap());

        store.delete_bytes("a.sqlite3").await.unwrap();
        assert!(!store.exists("a.sqlite3").await.unwrap());
        assert!(store.read_bytes("a.sqlite3").await.is_err());
    }

    #[tokio::test]
    async fn flaky_store_fails_only_deletes() {
        let store = FlakyBlobStore::new(MemoryBlobStore::new());
        store.write_bytes("b", b"x").await.unwrap();
        assert!(store.delete_bytes("b").await.is_err());
        assert_eq!(store.failed_deletes(), 1);
        assert!(store.exists("b").await.unwrap());
    }
}
