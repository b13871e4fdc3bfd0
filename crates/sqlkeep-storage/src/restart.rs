// SPDX-FileCopyrightText: 2026 Sqlkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Restart by cancellation: the embedding application awaits the token and
//! rebuilds its state when it fires.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use sqlkeep_core::{ClientError, Restart};

#[derive(Debug, Clone, Default)]
pub struct SignalRestart {
    token: CancellationToken,
}

impl SignalRestart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an existing token, e.g. the application's shutdown token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[async_trait]
impl Restart for SignalRestart {
    async fn restart(&self) -> Result<(), ClientError> {
        info!("restart requested");
        self.token.cancel();
        Ok(())
    }
}
