//! The repository seam between the task book and a storage backend.

use std::sync::{Mutex, MutexGuard};

use tickler_shared::ProfileId;
use tracing::warn;

use crate::database::Database;
use crate::error::{Result, StoreError};

/// Per-profile ordered collections of task records plus a key/value space.
///
/// Collections are newest first.  Calls are synchronous and short; callers
/// on an async runtime invoke them directly.
pub trait TaskRepository: Send + Sync {
    /// Records of `profile`, most recently appended first.
    fn list_tasks(&self, profile: &ProfileId) -> Result<Vec<String>>;

    /// Insert `record` at the head of the collection.
    fn append(&self, profile: &ProfileId, record: &str) -> Result<()>;

    /// Overwrite the record at `index` without reordering.
    fn replace_at(&self, profile: &ProfileId, index: usize, record: &str) -> Result<()>;

    /// Remove the first record equal to `record`.  Returns `true` if one was
    /// removed.
    fn remove(&self, profile: &ProfileId, record: &str) -> Result<bool>;

    /// Replace the first record equal to `old` with `new`.  Returns `false`
    /// when nothing matched.
    ///
    /// The default locates then overwrites in two calls; backends that can
    /// do it atomically override this.
    fn replace_record(&self, profile: &ProfileId, old: &str, new: &str) -> Result<bool> {
        let records = self.list_tasks(profile)?;
        match records.iter().position(|r| r == old) {
            Some(index) => {
                self.replace_at(profile, index, new)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Every profile that owns at least one record.
    fn task_profiles(&self) -> Result<Vec<ProfileId>>;

    fn get_value(&self, key: &str) -> Result<Option<String>>;

    fn set_value(&self, key: &str, value: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

/// [`TaskRepository`] over a single SQLite connection.
pub struct SqliteRepository {
    db: Mutex<Database>,
}

impl SqliteRepository {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    fn db(&self) -> Result<MutexGuard<'_, Database>> {
        self.db.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl TaskRepository for SqliteRepository {
    fn list_tasks(&self, profile: &ProfileId) -> Result<Vec<String>> {
        self.db()?.list_task_records(profile)
    }

    fn append(&self, profile: &ProfileId, record: &str) -> Result<()> {
        self.db()?.push_task_record(profile, record)
    }

    fn replace_at(&self, profile: &ProfileId, index: usize, record: &str) -> Result<()> {
        self.db()?.set_task_record_at(profile, index, record)
    }

    fn remove(&self, profile: &ProfileId, record: &str) -> Result<bool> {
        self.db()?.remove_task_record(profile, record)
    }

    fn replace_record(&self, profile: &ProfileId, old: &str, new: &str) -> Result<bool> {
        self.db()?.swap_task_record(profile, old, new)
    }

    fn task_profiles(&self) -> Result<Vec<ProfileId>> {
        let raw = self.db()?.task_profile_ids()?;
        Ok(raw
            .into_iter()
            .filter_map(|id| match ProfileId::parse(&id) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    warn!(profile_id = %id, error = %e, "skipping malformed profile id");
                    None
                }
            })
            .collect())
    }

    fn get_value(&self, key: &str) -> Result<Option<String>> {
        self.db()?.get_value(key)
    }

    fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.db()?.set_value(key, value)
    }
}
