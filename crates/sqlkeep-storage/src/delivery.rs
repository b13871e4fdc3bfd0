// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivers backup artifacts into an output directory.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use sqlkeep_core::{ClientError, Delivery};

#[derive(Debug, Clone)]
pub struct DirectoryDelivery {
    output_dir: PathBuf,
}

impl DirectoryDelivery {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Where `filename` ends up once delivered.
    pub fn destination(&self, filename: &str) -> PathBuf {
        self.output_dir.join(filename)
    }
}

#[async_trait]
impl Delivery for DirectoryDelivery {
    async fn deliver(&self, filename: &str, bytes: &[u8]) -> Result<(), ClientError> {
        let failed = |e: std::io::Error| ClientError::Delivery {
            filename: filename.to_string(),
            source: Box::new(e),
        };
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(failed)?;
        let destination = self.destination(filename);
        tokio::fs::write(&destination, bytes).await.map_err(failed)?;

        let size_mb = bytes.len() as f64 / (1024.0 * 1024.0);
        info!(path = %destination.display(), "backup delivered ({size_mb:.1} MB)");
        Ok(())
    }
}
