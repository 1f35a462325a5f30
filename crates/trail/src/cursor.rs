use std::ops::RangeInclusive;

/// Tracks which blocks the live poller has already scanned for logs.
///
/// The cursor starts unanchored; [`LogCursor::anchor`] pins it just past the
/// head covered by the historical load so live polling never rescans it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCursor {
    next_block: Option<u64>,
    max_span: u64,
}

impl LogCursor {
    pub fn new(max_span: u64) -> Self {
        Self {
            next_block: None,
            max_span: max_span.max(1),
        }
    }

    pub fn anchor(&mut self, covered_head: u64) {
        self.next_block = Some(covered_head.saturating_add(1));
    }

    /// Next inclusive block range to scan, bounded by the configured span.
    /// An unanchored cursor anchors at `head` and scans nothing this round.
    pub fn plan(&mut self, head: u64) -> Option<RangeInclusive<u64>> {
        let Some(start) = self.next_block else {
            self.anchor(head);
            return None;
        };
        if start > head {
            return None;
        }
        let end = start
            .saturating_add(self.max_span.saturating_sub(1))
            .min(head);
        Some(start..=end)
    }

    pub fn mark_processed(&mut self, last_block: u64) {
        self.next_block = Some(last_block.saturating_add(1));
    }

    pub fn next_block(&self) -> Option<u64> {
        self.next_block
    }
}
