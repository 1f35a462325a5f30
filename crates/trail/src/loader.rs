use std::sync::Arc;

use fairsoil_gateway::{ChainClient, GatewayError, LogFilter, RawLog, decode_logs};
use fairsoil_types::{Address, TrailItem};
use tracing::{debug, info};

use crate::builder::{TrailEvent, build_trail_item};
use crate::cursor::LogCursor;
use crate::timestamps::BlockTimestampCache;
use crate::TrailError;

pub const DEFAULT_MAX_LOG_SPAN: u64 = 50_000;

/// Result of a full backfill, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalTrail {
    pub head: u64,
    pub items: Vec<TrailItem>,
}

/// Reads trail logs from the covenant and treasury contracts and turns them
/// into trail items. Any failed fetch or timestamp lookup aborts the pass.
#[derive(Clone)]
pub struct TrailLoader {
    chain: Arc<dyn ChainClient>,
    sources: Vec<Address>,
    from_block: u64,
    max_log_span: u64,
}

impl TrailLoader {
    pub fn new(chain: Arc<dyn ChainClient>, sources: Vec<Address>) -> Self {
        Self {
            chain,
            sources,
            from_block: 0,
            max_log_span: DEFAULT_MAX_LOG_SPAN,
        }
    }

    pub fn with_from_block(mut self, from_block: u64) -> Self {
        self.from_block = from_block;
        self
    }

    pub fn with_max_log_span(mut self, max_log_span: u64) -> Self {
        self.max_log_span = max_log_span.max(1);
        self
    }

    pub fn has_sources(&self) -> bool {
        !self.sources.is_empty()
    }

    pub async fn load_historical(&self) -> Result<HistoricalTrail, TrailError> {
        let head = self.chain.block_number().await?;
        if !self.has_sources() {
            return Ok(HistoricalTrail {
                head,
                items: Vec::new(),
            });
        }
        let logs = self.fetch_range(self.from_block, head).await?;
        let mut items = self.build_items(&logs).await?;
        items.sort_by(|left, right| right.timestamp.cmp(&left.timestamp));
        info!(head, logs = logs.len(), items = items.len(), "historical trail loaded");
        Ok(HistoricalTrail { head, items })
    }

    /// One live polling round: scans whatever the cursor plans next.
    pub async fn poll_live(&self, cursor: &mut LogCursor) -> Result<Vec<TrailItem>, TrailError> {
        let head = self.chain.block_number().await?;
        let Some(range) = cursor.plan(head) else {
            return Ok(Vec::new());
        };
        let (from_block, to_block) = (*range.start(), *range.end());
        if !self.has_sources() {
            cursor.mark_processed(to_block);
            return Ok(Vec::new());
        }
        let logs = self.fetch_range(from_block, to_block).await?;
        let items = self.build_items(&logs).await?;
        cursor.mark_processed(to_block);
        debug!(from_block, to_block, items = items.len(), "live trail batch");
        Ok(items)
    }

    /// Fetches logs in spans of at most `max_log_span` blocks.
    pub async fn fetch_range(&self, from_block: u64, to_block: u64) -> Result<Vec<RawLog>, TrailError> {
        let mut logs = Vec::new();
        let mut start = from_block;
        while start <= to_block {
            let end = start
                .saturating_add(self.max_log_span - 1)
                .min(to_block);
            let batch = self
                .chain
                .get_logs(LogFilter {
                    addresses: self.sources.clone(),
                    from_block: start,
                    to_block: end,
                })
                .await?;
            logs.extend(batch);
            if end == u64::MAX {
                break;
            }
            start = end + 1;
        }
        Ok(logs)
    }

    /// Decodes and renders a batch. Timestamps are looked up once per distinct
    /// block, and only for logs that will become trail items.
    pub async fn build_items(&self, logs: &[RawLog]) -> Result<Vec<TrailItem>, TrailError> {
        let decoded: Vec<_> = decode_logs(logs)
            .into_iter()
            .filter(|log| {
                TrailEvent::from_event_name(log.event_name.as_deref()) != TrailEvent::Unrecognized
            })
            .collect();
        let block_numbers: Vec<u64> = decoded.iter().map(|log| log.block_number).collect();
        let mut timestamps = BlockTimestampCache::new();
        timestamps
            .resolve_all(self.chain.as_ref(), block_numbers)
            .await?;
        let mut items = Vec::with_capacity(decoded.len());
        for log in &decoded {
            let timestamp = timestamps
                .get(log.block_number)
                .ok_or(GatewayError::BlockNotFound(log.block_number))?;
            items.extend(build_trail_item(log, timestamp));
        }
        Ok(items)
    }
}
