//! Process-local read-through cache over a [`TaskRepository`].
//!
//! Reads are served from memory after the first load.  Every write this
//! process performs goes to the backend first and then drops (task lists) or
//! overwrites (values) the cached entry.  Writes made by other processes are
//! never observed until the entry is dropped; the backend stays
//! authoritative.
//!
//! A load that overlaps one of our own writes is returned to its caller but
//! not cached: each map carries a generation that writers bump under the
//! map's lock, and a fill only lands if the generation it started from is
//! still current.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use tickler_shared::ProfileId;
use tracing::trace;

use crate::error::{Result, StoreError};
use crate::repository::TaskRepository;

pub struct CachedRepository<R> {
    inner: R,
    lists: RwLock<HashMap<ProfileId, Vec<String>>>,
    values: RwLock<HashMap<String, String>>,
    list_generation: AtomicU64,
    value_generation: AtomicU64,
}

impl<R: TaskRepository> CachedRepository<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            lists: RwLock::new(HashMap::new()),
            values: RwLock::new(HashMap::new()),
            list_generation: AtomicU64::new(0),
            value_generation: AtomicU64::new(0),
        }
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    fn invalidate(&self, profile: &ProfileId) -> Result<()> {
        let mut lists = self.lists.write().map_err(|_| StoreError::LockPoisoned)?;
        self.list_generation.fetch_add(1, Ordering::SeqCst);
        lists.remove(profile);
        Ok(())
    }
}

impl<R: TaskRepository> TaskRepository for CachedRepository<R> {
    fn list_tasks(&self, profile: &ProfileId) -> Result<Vec<String>> {
        {
            let lists = self.lists.read().map_err(|_| StoreError::LockPoisoned)?;
            if let Some(records) = lists.get(profile) {
                trace!(profile_id = %profile, "task list served from cache");
                return Ok(records.clone());
            }
        }

        let generation = self.list_generation.load(Ordering::SeqCst);
        let records = self.inner.list_tasks(profile)?;
        let mut lists = self.lists.write().map_err(|_| StoreError::LockPoisoned)?;
        if self.list_generation.load(Ordering::SeqCst) == generation {
            lists.insert(profile.clone(), records.clone());
        } else {
            trace!(profile_id = %profile, "task list changed during load, not cached");
        }
        Ok(records)
    }

    fn append(&self, profile: &ProfileId, record: &str) -> Result<()> {
        let result = self.inner.append(profile, record);
        self.invalidate(profile)?;
        result
    }

    fn replace_at(&self, profile: &ProfileId, index: usize, record: &str) -> Result<()> {
        let result = self.inner.replace_at(profile, index, record);
        self.invalidate(profile)?;
        result
    }

    fn remove(&self, profile: &ProfileId, record: &str) -> Result<bool> {
        let result = self.inner.remove(profile, record);
        self.invalidate(profile)?;
        result
    }

    fn replace_record(&self, profile: &ProfileId, old: &str, new: &str) -> Result<bool> {
        let result = self.inner.replace_record(profile, old, new);
        self.invalidate(profile)?;
        result
    }

    fn task_profiles(&self) -> Result<Vec<ProfileId>> {
        self.inner.task_profiles()
    }

    fn get_value(&self, key: &str) -> Result<Option<String>> {
        {
            let values = self.values.read().map_err(|_| StoreError::LockPoisoned)?;
            if let Some(value) = values.get(key) {
                return Ok(Some(value.clone()));
            }
        }

        let generation = self.value_generation.load(Ordering::SeqCst);
        let value = self.inner.get_value(key)?;
        if let Some(value) = &value {
            let mut values = self.values.write().map_err(|_| StoreError::LockPoisoned)?;
            if self.value_generation.load(Ordering::SeqCst) == generation {
                values.insert(key.to_string(), value.clone());
            }
        }
        Ok(value)
    }

    fn set_value(&self, key: &str, value: &str) -> Result<()> {
        let result = self.inner.set_value(key, value);
        let mut values = self.values.write().map_err(|_| StoreError::LockPoisoned)?;
        self.value_generation.fetch_add(1, Ordering::SeqCst);
        match &result {
            Ok(()) => {
                values.insert(key.to_string(), value.to_string());
            }
            Err(_) => {
                values.remove(key);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::Barrier;
    use std::thread;

    use super::*;
    use crate::memory::InMemoryRepository;

    /// Backend whose next task list read parks after loading until released.
    struct Gated {
        inner: InMemoryRepository,
        armed: AtomicBool,
        loaded: Barrier,
        release: Barrier,
    }

    impl Gated {
        fn new() -> Self {
            Self {
                inner: InMemoryRepository::new(),
                armed: AtomicBool::new(false),
                loaded: Barrier::new(2),
                release: Barrier::new(2),
            }
        }
    }

    impl TaskRepository for Gated {
        fn list_tasks(&self, profile: &ProfileId) -> Result<Vec<String>> {
            let records = self.inner.list_tasks(profile)?;
            if self.armed.swap(false, Ordering::SeqCst) {
                self.loaded.wait();
                self.release.wait();
            }
            Ok(records)
        }

        fn append(&self, profile: &ProfileId, record: &str) -> Result<()> {
            self.inner.append(profile, record)
        }

        fn replace_at(&self, profile: &ProfileId, index: usize, record: &str) -> Result<()> {
            self.inner.replace_at(profile, index, record)
        }

        fn remove(&self, profile: &ProfileId, record: &str) -> Result<bool> {
            self.inner.remove(profile, record)
        }

        fn replace_record(&self, profile: &ProfileId, old: &str, new: &str) -> Result<bool> {
            self.inner.replace_record(profile, old, new)
        }

        fn task_profiles(&self) -> Result<Vec<ProfileId>> {
            self.inner.task_profiles()
        }

        fn get_value(&self, key: &str) -> Result<Option<String>> {
            self.inner.get_value(key)
        }

        fn set_value(&self, key: &str, value: &str) -> Result<()> {
            self.inner.set_value(key, value)
        }
    }

    #[test]
    fn load_overlapping_a_write_is_not_cached() {
        let repo = CachedRepository::new(Gated::new());
        let profile = ProfileId::new();
        repo.append(&profile, "old").unwrap();
        repo.inner().armed.store(true, Ordering::SeqCst);

        thread::scope(|s| {
            let reader = s.spawn(|| repo.list_tasks(&profile).unwrap());

            // The reader holds the pre-write list while the write lands.
            repo.inner().loaded.wait();
            assert!(repo.replace_record(&profile, "old", "new").unwrap());
            repo.inner().release.wait();

            assert_eq!(reader.join().unwrap(), vec!["old"]);
        });

        assert_eq!(repo.list_tasks(&profile).unwrap(), vec!["new"]);
    }

    #[test]
    fn serves_stale_reads_until_own_write() {
        let repo = CachedRepository::new(InMemoryRepository::new());
        let profile = ProfileId::new();
        repo.append(&profile, "a").unwrap();
        assert_eq!(repo.list_tasks(&profile).unwrap(), vec!["a"]);

        // A write behind the cache's back is not observed.
        repo.inner().append(&profile, "foreign").unwrap();
        assert_eq!(repo.list_tasks(&profile).unwrap(), vec!["a"]);

        // Our own write drops the entry, so the next read reloads.
        repo.append(&profile, "b").unwrap();
        assert_eq!(
            repo.list_tasks(&profile).unwrap(),
            vec!["b", "foreign", "a"]
        );
    }

    #[test]
    fn writes_update_cached_views() {
        let repo = CachedRepository::new(InMemoryRepository::new());
        let profile = ProfileId::new();
        repo.append(&profile, "a").unwrap();
        repo.list_tasks(&profile).unwrap();

        assert!(repo.replace_record(&profile, "a", "A").unwrap());
        assert_eq!(repo.list_tasks(&profile).unwrap(), vec!["A"]);

        assert!(repo.remove(&profile, "A").unwrap());
        assert!(repo.list_tasks(&profile).unwrap().is_empty());

        repo.set_value("k", "1").unwrap();
        repo.inner().set_value("k", "2").unwrap();
        assert_eq!(repo.get_value("k").unwrap().as_deref(), Some("1"));
        repo.set_value("k", "3").unwrap();
        assert_eq!(repo.get_value("k").unwrap().as_deref(), Some("3"));
    }
}
