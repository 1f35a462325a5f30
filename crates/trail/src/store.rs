use std::collections::HashSet;

use fairsoil_types::TrailItem;

pub const DEFAULT_TRAIL_CAPACITY: usize = 12;

/// Ids already shown. Evicted ids stay known so a late duplicate cannot re-enter.
pub trait TrailIdSet: Send + Sync {
    fn has(&self, id: &str) -> bool;
    fn add(&mut self, id: String);
    fn list(&self) -> Vec<String>;
    fn reset(&mut self, ids: Vec<String>);
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryIdSet {
    ids: HashSet<String>,
}

impl TrailIdSet for InMemoryIdSet {
    fn has(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    fn add(&mut self, id: String) {
        self.ids.insert(id);
    }

    fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.ids.iter().cloned().collect();
        ids.sort();
        ids
    }

    fn reset(&mut self, ids: Vec<String>) {
        self.ids = ids.into_iter().collect();
    }
}

/// Handed out when a historical backfill starts. Only the most recently issued
/// ticket may replace the store contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillTicket {
    epoch: u64,
}

pub struct TrailStore {
    items: Vec<TrailItem>,
    ids: Box<dyn TrailIdSet>,
    capacity: usize,
    backfill_epoch: u64,
    backfill_in_flight: bool,
    live_since_backfill: Vec<TrailItem>,
}

impl Default for TrailStore {
    fn default() -> Self {
        Self::new(DEFAULT_TRAIL_CAPACITY)
    }
}

impl TrailStore {
    pub fn new(capacity: usize) -> Self {
        Self::with_id_set(capacity, Box::new(InMemoryIdSet::default()))
    }

    pub fn with_id_set(capacity: usize, ids: Box<dyn TrailIdSet>) -> Self {
        Self {
            items: Vec::new(),
            ids,
            capacity: capacity.max(1),
            backfill_epoch: 0,
            backfill_in_flight: false,
            live_since_backfill: Vec::new(),
        }
    }

    pub fn items(&self) -> &[TrailItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn known_ids(&self) -> Vec<String> {
        self.ids.list()
    }

    pub fn begin_backfill(&mut self) -> BackfillTicket {
        self.backfill_epoch = self.backfill_epoch.saturating_add(1);
        self.backfill_in_flight = true;
        self.live_since_backfill.clear();
        BackfillTicket {
            epoch: self.backfill_epoch,
        }
    }

    /// Replaces the contents with a backfill result. Live items appended since
    /// the ticket was issued are kept. Returns `false` for a superseded ticket,
    /// in which case nothing changes.
    pub fn replace_historical(&mut self, ticket: BackfillTicket, items: Vec<TrailItem>) -> bool {
        if ticket.epoch != self.backfill_epoch || !self.backfill_in_flight {
            return false;
        }
        let mut seen = HashSet::new();
        let mut merged = Vec::with_capacity(items.len() + self.live_since_backfill.len());
        for item in items
            .into_iter()
            .chain(std::mem::take(&mut self.live_since_backfill))
        {
            if seen.insert(item.id.clone()) {
                merged.push(item);
            }
        }
        sort_newest_first(&mut merged);
        merged.truncate(self.capacity);
        self.ids
            .reset(merged.iter().map(|item| item.id.clone()).collect());
        self.items = merged;
        self.backfill_in_flight = false;
        true
    }

    /// Ends a failed backfill. Live items stay; buffering stops. A superseded
    /// ticket changes nothing.
    pub fn abort_backfill(&mut self, ticket: BackfillTicket) -> bool {
        if ticket.epoch != self.backfill_epoch || !self.backfill_in_flight {
            return false;
        }
        self.backfill_in_flight = false;
        self.live_since_backfill.clear();
        true
    }

    pub fn backfill_in_flight(&self) -> bool {
        self.backfill_in_flight
    }

    /// Merges live items, skipping ids already seen. Returns how many were new.
    pub fn append_live(&mut self, items: Vec<TrailItem>) -> usize {
        let mut added = 0;
        for item in items {
            if self.ids.has(&item.id) {
                continue;
            }
            self.ids.add(item.id.clone());
            if self.backfill_in_flight {
                self.live_since_backfill.push(item.clone());
            }
            self.items.push(item);
            added += 1;
        }
        if added > 0 {
            sort_newest_first(&mut self.items);
            self.items.truncate(self.capacity);
        }
        added
    }
}

fn sort_newest_first(items: &mut [TrailItem]) {
    items.sort_by(|left, right| right.timestamp.cmp(&left.timestamp));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, timestamp: u64) -> TrailItem {
        TrailItem {
            id: id.to_string(),
            timestamp,
            title: format!("item {id}"),
            body: None,
            links: Vec::new(),
            block_number: timestamp,
            covenant_id: None,
        }
    }

    fn ids(store: &TrailStore) -> Vec<&str> {
        store.items().iter().map(|item| item.id.as_str()).collect()
    }

    fn assert_sorted(store: &TrailStore) {
        assert!(
            store
                .items()
                .windows(2)
                .all(|pair| pair[0].timestamp >= pair[1].timestamp)
        );
    }

    #[test]
    fn duplicate_ids_are_inserted_once() {
        let mut store = TrailStore::default();
        assert_eq!(store.append_live(vec![item("a-0", 10), item("a-0", 10)]), 1);
        let batch: Vec<TrailItem> = (0..5).map(|n| item(&format!("b-{n}"), n)).collect();
        assert_eq!(store.append_live(batch.clone()), 5);
        assert_eq!(store.append_live(batch), 0);
        assert_eq!(store.len(), 6);
    }

    #[test]
    fn overflow_keeps_most_recent_items() {
        let mut store = TrailStore::default();
        let batch: Vec<TrailItem> = (0..20).map(|n| item(&format!("x-{n}"), 100 + n)).collect();
        store.append_live(batch);
        assert_eq!(store.len(), DEFAULT_TRAIL_CAPACITY);
        assert_eq!(store.items()[0].timestamp, 119);
        assert_eq!(store.items()[11].timestamp, 108);
        assert_sorted(&store);
    }

    #[test]
    fn evicted_ids_do_not_come_back() {
        let mut store = TrailStore::new(2);
        store.append_live(vec![item("old", 1), item("mid", 2), item("new", 3)]);
        assert_eq!(ids(&store), vec!["new", "mid"]);
        assert_eq!(store.append_live(vec![item("old", 1)]), 0);
        assert_eq!(ids(&store), vec!["new", "mid"]);
    }

    #[test]
    fn historical_replace_is_wholesale() {
        let mut store = TrailStore::default();
        store.append_live(vec![item("stale", 50)]);
        let ticket = store.begin_backfill();
        assert!(store.replace_historical(ticket, vec![item("h-1", 1), item("h-2", 2)]));
        assert_eq!(ids(&store), vec!["h-2", "h-1"]);
        assert!(!store.known_ids().contains(&"stale".to_string()));
    }

    #[test]
    fn live_items_during_backfill_survive_the_replace() {
        let mut store = TrailStore::default();
        let ticket = store.begin_backfill();
        store.append_live(vec![item("live", 30)]);
        assert!(store.replace_historical(ticket, vec![item("h-1", 10), item("live", 30)]));
        assert_eq!(ids(&store), vec!["live", "h-1"]);
        assert_sorted(&store);
    }

    #[test]
    fn superseded_backfill_is_ignored() {
        let mut store = TrailStore::default();
        let first = store.begin_backfill();
        let second = store.begin_backfill();
        assert!(store.replace_historical(second, vec![item("new", 2)]));
        assert!(!store.replace_historical(first, vec![item("old", 1)]));
        assert_eq!(ids(&store), vec!["new"]);
    }

    #[test]
    fn aborted_backfill_stops_buffering_live_items() {
        let mut store = TrailStore::default();
        store.append_live(vec![item("before", 1)]);
        let ticket = store.begin_backfill();
        store.append_live(vec![item("during", 2)]);
        assert_eq!(store.live_since_backfill.len(), 1);

        assert!(store.abort_backfill(ticket));
        assert!(!store.backfill_in_flight());
        assert!(store.live_since_backfill.is_empty());

        let batch: Vec<TrailItem> = (0..500).map(|n| item(&format!("after-{n}"), 10 + n)).collect();
        assert_eq!(store.append_live(batch), 500);
        assert!(store.live_since_backfill.is_empty());
        assert_eq!(store.len(), DEFAULT_TRAIL_CAPACITY);
        assert!(!store.replace_historical(ticket, vec![item("late", 0)]));
    }

    #[test]
    fn stale_abort_leaves_the_newer_backfill_running() {
        let mut store = TrailStore::default();
        let first = store.begin_backfill();
        let second = store.begin_backfill();
        assert!(!store.abort_backfill(first));
        assert!(store.backfill_in_flight());
        store.append_live(vec![item("live", 5)]);
        assert!(store.replace_historical(second, vec![item("h-1", 1)]));
        assert_eq!(ids(&store), vec!["live", "h-1"]);
    }

    #[test]
    fn interleaved_sequences_stay_sorted() {
        let mut store = TrailStore::new(4);
        store.append_live(vec![item("l-1", 5), item("l-2", 1)]);
        assert_sorted(&store);
        let ticket = store.begin_backfill();
        store.append_live(vec![item("l-3", 9)]);
        store.replace_historical(ticket, vec![item("h-1", 7), item("h-2", 3), item("h-3", 8)]);
        assert_sorted(&store);
        store.append_live(vec![item("l-4", 4), item("l-5", 10)]);
        assert_sorted(&store);
        assert_eq!(ids(&store), vec!["l-5", "l-3", "h-3", "h-1"]);
    }

    #[test]
    fn equal_timestamps_keep_insertion_order() {
        let mut store = TrailStore::default();
        store.append_live(vec![item("first", 5), item("second", 5)]);
        assert_eq!(ids(&store), vec!["first", "second"]);
    }
}
