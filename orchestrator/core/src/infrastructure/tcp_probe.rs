// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

use crate::domain::runtime::ReachabilityCheck;

/// A completed TCP handshake within `timeout` counts as open. Anything else,
/// including resolution failures, is closed. No retries.
pub struct TcpReachability {
    timeout: Duration,
}

impl TcpReachability {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ReachabilityCheck for TcpReachability {
    async fn is_open(&self, host: &str, port: u16) -> bool {
        let open = matches!(
            tokio::time::timeout(self.timeout, TcpStream::connect((host, port))).await,
            Ok(Ok(_))
        );
        debug!("hostport {}:{} open: {}", host, port, open);
        open
    }
}
