use std::collections::BTreeMap;

use fairsoil_gateway::{ChainClient, GatewayError};
use tracing::debug;

/// Block-number to block-time lookups, one RPC per distinct block for the
/// lifetime of the cache. A cache lives for a single build pass.
#[derive(Debug, Default)]
pub struct BlockTimestampCache {
    resolved: BTreeMap<u64, u64>,
}

impl BlockTimestampCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, block_number: u64) -> Option<u64> {
        self.resolved.get(&block_number).copied()
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    pub async fn resolve(
        &mut self,
        chain: &dyn ChainClient,
        block_number: u64,
    ) -> Result<u64, GatewayError> {
        if let Some(timestamp) = self.get(block_number) {
            return Ok(timestamp);
        }
        let timestamp = chain.block_timestamp(block_number).await?;
        debug!(block_number, timestamp, "resolved block timestamp");
        self.resolved.insert(block_number, timestamp);
        Ok(timestamp)
    }

    /// Resolves every listed block; duplicates cost nothing.
    pub async fn resolve_all(
        &mut self,
        chain: &dyn ChainClient,
        block_numbers: impl IntoIterator<Item = u64>,
    ) -> Result<(), GatewayError> {
        for block_number in block_numbers {
            self.resolve(chain, block_number).await?;
        }
        Ok(())
    }
}
