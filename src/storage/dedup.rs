//! Snapshot of the unique keys already persisted when a run starts

use crate::record::UniqueKey;
use crate::storage::{Storage, StorageResult};
use std::collections::HashSet;
use std::sync::Arc;

/// Read-only set of known keys, captured once per run
///
/// Cloning is cheap; every task of a run shares the same snapshot. Keys
/// written during the run are not added here, the result sink's atomic insert
/// catches those.
#[derive(Debug, Clone, Default)]
pub struct DedupIndex {
    keys: Arc<HashSet<UniqueKey>>,
}

impl DedupIndex {
    pub fn new(keys: impl IntoIterator<Item = UniqueKey>) -> Self {
        Self {
            keys: Arc::new(keys.into_iter().collect()),
        }
    }

    /// Captures every key currently in `storage`
    pub fn snapshot<S: Storage + ?Sized>(storage: &S) -> StorageResult<Self> {
        let keys = storage.list_unique_keys()?;
        tracing::debug!("Dedup snapshot holds {} known keys", keys.len());
        Ok(Self::new(keys))
    }

    /// Returns true if the key was persisted before the run started
    pub fn exists(&self, key: &UniqueKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::sample_course;
    use crate::record::CourseRecord;
    use crate::storage::SqliteStorage;

    #[test]
    fn test_exists() {
        let index = DedupIndex::new(vec![UniqueKey::new("a"), UniqueKey::new("b")]);
        assert!(index.exists(&UniqueKey::new("a")));
        assert!(!index.exists(&UniqueKey::new("c")));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_empty_index() {
        let index = DedupIndex::default();
        assert!(index.is_empty());
        assert!(!index.exists(&UniqueKey::new("a")));
    }

    #[test]
    fn test_snapshot_is_not_live() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("h").unwrap();
        let record = |key: &str| CourseRecord {
            key: UniqueKey::new(key),
            source_url: format!("https://www.udemy.com/course/{}", key),
            search_term: None,
            course: sample_course(key, "Sample"),
            instructor_profile: None,
        };

        storage.insert_course(&record("before"), run_id).unwrap();
        let index = DedupIndex::snapshot(&storage).unwrap();
        storage.insert_course(&record("after"), run_id).unwrap();

        assert!(index.exists(&UniqueKey::new("before")));
        assert!(!index.exists(&UniqueKey::new("after")));
    }
}
