use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::TrailError;

pub const TAG_KEY_PREFIX: &str = "covenant-tags:";
const PENDING_PREFIX: &str = "pending-";

/// Key under which a covenant's free-text tags are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagKey {
    Covenant(u64),
    /// Tags entered before the creating transaction revealed the id.
    Pending(u64),
}

impl TagKey {
    pub fn storage_key(self) -> String {
        match self {
            Self::Covenant(id) => format!("{TAG_KEY_PREFIX}{id}"),
            Self::Pending(seq) => format!("{TAG_KEY_PREFIX}{PENDING_PREFIX}{seq}"),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let rest = raw.strip_prefix(TAG_KEY_PREFIX)?;
        match rest.strip_prefix(PENDING_PREFIX) {
            Some(seq) => seq.parse().ok().map(Self::Pending),
            None => rest.parse().ok().map(Self::Covenant),
        }
    }
}

/// Last write wins. No cross-process locking.
pub trait TagStore: Send + Sync {
    fn get(&self, key: TagKey) -> Option<String>;
    fn set(&mut self, key: TagKey, tags: String) -> Result<(), TrailError>;
    fn remove(&mut self, key: TagKey) -> Result<Option<String>, TrailError>;
    fn list(&self) -> BTreeMap<TagKey, String>;

    fn tags_for(&self, covenant_id: u64) -> Option<String> {
        self.get(TagKey::Covenant(covenant_id))
    }

    /// Stages tags for a covenant that does not exist yet. Blank input stages nothing.
    fn stage_pending(&mut self, tags: &str) -> Result<Option<TagKey>, TrailError> {
        let trimmed = tags.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let next = self
            .list()
            .keys()
            .filter_map(|key| match key {
                TagKey::Pending(seq) => Some(seq.saturating_add(1)),
                TagKey::Covenant(_) => None,
            })
            .max()
            .unwrap_or(0);
        let key = TagKey::Pending(next);
        self.set(key, trimmed.to_string())?;
        Ok(Some(key))
    }

    /// Moves staged tags onto the real covenant id.
    fn promote(&mut self, pending: TagKey, covenant_id: u64) -> Result<bool, TrailError> {
        let Some(tags) = self.remove(pending)? else {
            return Ok(false);
        };
        self.set(TagKey::Covenant(covenant_id), tags)?;
        debug!(covenant_id, "promoted staged covenant tags");
        Ok(true)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryTagStore {
    entries: BTreeMap<TagKey, String>,
}

impl TagStore for InMemoryTagStore {
    fn get(&self, key: TagKey) -> Option<String> {
        self.entries.get(&key).cloned()
    }

    fn set(&mut self, key: TagKey, tags: String) -> Result<(), TrailError> {
        self.entries.insert(key, tags);
        Ok(())
    }

    fn remove(&mut self, key: TagKey) -> Result<Option<String>, TrailError> {
        Ok(self.entries.remove(&key))
    }

    fn list(&self) -> BTreeMap<TagKey, String> {
        self.entries.clone()
    }
}

/// Tags persisted as a flat JSON object of storage key to tag text.
#[derive(Debug, Clone)]
pub struct JsonFileTagStore {
    path: PathBuf,
    entries: BTreeMap<TagKey, String>,
}

impl JsonFileTagStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, TrailError> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) => parse_entries(&path, &bytes)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(error) => return Err(io_error(&path, error)),
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), TrailError> {
        let raw: BTreeMap<String, &String> = self
            .entries
            .iter()
            .map(|(key, tags)| (key.storage_key(), tags))
            .collect();
        let bytes = serde_json::to_vec_pretty(&raw).map_err(|error| TrailError::TagFormat {
            path: self.path.display().to_string(),
            message: error.to_string(),
        })?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|error| io_error(&self.path, error))?;
        }
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, bytes).map_err(|error| io_error(&staging, error))?;
        fs::rename(&staging, &self.path).map_err(|error| io_error(&self.path, error))
    }
}

impl TagStore for JsonFileTagStore {
    fn get(&self, key: TagKey) -> Option<String> {
        self.entries.get(&key).cloned()
    }

    fn set(&mut self, key: TagKey, tags: String) -> Result<(), TrailError> {
        self.entries.insert(key, tags);
        self.flush()
    }

    fn remove(&mut self, key: TagKey) -> Result<Option<String>, TrailError> {
        let removed = self.entries.remove(&key);
        if removed.is_some() {
            self.flush()?;
        }
        Ok(removed)
    }

    fn list(&self) -> BTreeMap<TagKey, String> {
        self.entries.clone()
    }
}

fn parse_entries(path: &Path, bytes: &[u8]) -> Result<BTreeMap<TagKey, String>, TrailError> {
    let raw: BTreeMap<String, String> =
        serde_json::from_slice(bytes).map_err(|error| TrailError::TagFormat {
            path: path.display().to_string(),
            message: error.to_string(),
        })?;
    let mut entries = BTreeMap::new();
    for (key, tags) in raw {
        match TagKey::parse(&key) {
            Some(parsed) if !tags.is_empty() => {
                entries.insert(parsed, tags);
            }
            Some(_) => {}
            None => warn!(key, path = %path.display(), "ignoring unrecognized tag key"),
        }
    }
    Ok(entries)
}

fn io_error(path: &Path, error: std::io::Error) -> TrailError {
    TrailError::TagIo {
        path: path.display().to_string(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip_through_storage_form() {
        assert_eq!(TagKey::Covenant(4).storage_key(), "covenant-tags:4");
        assert_eq!(TagKey::Pending(0).storage_key(), "covenant-tags:pending-0");
        assert_eq!(TagKey::parse("covenant-tags:pending-3"), Some(TagKey::Pending(3)));
        assert_eq!(TagKey::parse("covenant-tags:12"), Some(TagKey::Covenant(12)));
        assert_eq!(TagKey::parse("other:12"), None);
        assert_eq!(TagKey::parse("covenant-tags:pending-x"), None);
    }

    #[test]
    fn staged_tags_are_promoted_to_the_created_covenant() {
        let mut store = InMemoryTagStore::default();
        assert_eq!(store.stage_pending("   ").expect("blank stage"), None);
        let first = store
            .stage_pending(" harvest ")
            .expect("stage")
            .expect("non-blank");
        let second = store.stage_pending("soil").expect("stage").expect("non-blank");
        assert_eq!(first, TagKey::Pending(0));
        assert_eq!(second, TagKey::Pending(1));

        assert!(store.promote(first, 9).expect("promote"));
        assert_eq!(store.tags_for(9).as_deref(), Some("harvest"));
        assert_eq!(store.get(first), None);
        assert!(!store.promote(first, 9).expect("second promote is a no-op"));
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("tags.json");
        {
            let mut store = JsonFileTagStore::open(&path).expect("open empty");
            store
                .set(TagKey::Covenant(2), "irrigation".to_string())
                .expect("set");
            store.stage_pending("fence").expect("stage");
        }
        let reopened = JsonFileTagStore::open(&path).expect("reopen");
        assert_eq!(reopened.tags_for(2).as_deref(), Some("irrigation"));
        assert_eq!(reopened.get(TagKey::Pending(0)).as_deref(), Some("fence"));

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).expect("read")).expect("json");
        assert_eq!(raw["covenant-tags:2"], "irrigation");
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tags.json");
        fs::write(&path, b"[not json").expect("write");
        let error = JsonFileTagStore::open(&path).expect_err("corrupt file");
        assert!(matches!(error, TrailError::TagFormat { .. }));
    }
}
