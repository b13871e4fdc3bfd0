// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery and restart doubles.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use sqlkeep_core::{ClientError, Delivery, Restart};

/// Captures every delivered `(filename, bytes)` pair.
#[derive(Default)]
pub struct RecordingDelivery {
    delivered: Mutex<Vec<(String, Vec<u8>)>>,
    fail: AtomicBool,
}

impl RecordingDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    /// A delivery that always fails.
    pub fn failing() -> Self {
        let delivery = Self::default();
        delivery.fail.store(true, Ordering::SeqCst);
        delivery
    }

    pub async fn delivered(&self) -> Vec<(String, Vec<u8>)> {
        self.delivered.lock().await.clone()
    }
}

#[async_trait]
impl Delivery for RecordingDelivery {
    async fn deliver(&self, filename: &str, bytes: &[u8]) -> Result<(), ClientError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ClientError::Delivery {
                filename: filename.to_string(),
                source: "injected delivery failure".into(),
            });
        }
        self.delivered
            .lock()
            .await
            .push((filename.to_string(), bytes.to_vec()));
        Ok(())
    }
}

/// Counts restarts.
#[derive(Default)]
pub struct CountingRestart {
    restarts: AtomicUsize,
}

impl CountingRestart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Restart for CountingRestart {
    async fn restart(&self) -> Result<(), ClientError> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("restart requested");
        Ok(())
    }
}
