//! Typed view over the raw record repository.
//!
//! The repository stores opaque JSON strings; the book decodes them into
//! [`Task`]s, keeps the exact stored text alongside each decoded task so
//! writes can target it, and owns the profile key layout.

use std::sync::Arc;

use tracing::{debug, warn};

use tickler_shared::{Completion, Profile, ProfileId, Task, TaskId, Timestamp, UserId};
use tickler_store::TaskRepository;

use crate::error::Result;

/// A decoded task with the record it was decoded from.
#[derive(Debug, Clone)]
pub struct StoredTask {
    pub record: String,
    pub task: Task,
}

#[derive(Clone)]
pub struct TaskBook {
    repo: Arc<dyn TaskRepository>,
}

fn profile_key(id: &ProfileId) -> String {
    format!("profile:{id}")
}

fn user_key(user: UserId) -> String {
    format!("user:{user}:profile")
}

impl TaskBook {
    pub fn new(repo: Arc<dyn TaskRepository>) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &Arc<dyn TaskRepository> {
        &self.repo
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    /// Every decodable task of `profile`, newest first.  Records that fail
    /// to decode are logged and skipped.
    pub fn load(&self, profile: &ProfileId) -> Result<Vec<StoredTask>> {
        let records = self.repo.list_tasks(profile)?;
        let mut tasks = Vec::with_capacity(records.len());
        for record in records {
            match Task::from_record(&record) {
                Ok(task) => tasks.push(StoredTask { record, task }),
                Err(e) => {
                    warn!(profile_id = %profile, error = %e, "skipping corrupt task record");
                }
            }
        }
        Ok(tasks)
    }

    pub fn find_by_title(&self, profile: &ProfileId, title: &str) -> Result<Option<StoredTask>> {
        let title = title.trim();
        Ok(self
            .load(profile)?
            .into_iter()
            .find(|s| s.task.title().as_str() == title))
    }

    pub fn find_by_id(&self, profile: &ProfileId, id: &TaskId) -> Result<Option<StoredTask>> {
        Ok(self.load(profile)?.into_iter().find(|s| s.task.id() == id))
    }

    /// Add a new task at the head of the profile's collection.
    pub fn insert(&self, profile: &ProfileId, task: &Task) -> Result<String> {
        let record = task.to_record()?;
        self.repo.append(profile, &record)?;
        Ok(record)
    }

    /// Overwrite the stored form of `task`.
    ///
    /// `old` is the record the caller read.  If it is no longer stored
    /// verbatim (someone else wrote in between), the current record with the
    /// same uuid is overwritten instead.  Returns the new record, or `None`
    /// when the task no longer exists at all.
    pub fn replace(&self, profile: &ProfileId, old: &str, task: &Task) -> Result<Option<String>> {
        let record = task.to_record()?;
        if self.repo.replace_record(profile, old, &record)? {
            return Ok(Some(record));
        }

        let Some(current) = self.find_by_id(profile, task.id())? else {
            debug!(task_id = %task.id(), "task vanished before write-back");
            return Ok(None);
        };
        debug!(task_id = %task.id(), "record changed concurrently, overwriting by id");
        if self.repo.replace_record(profile, &current.record, &record)? {
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }

    /// Remove the stored form of a task, by record first and by id second.
    pub fn remove(&self, profile: &ProfileId, old: &str, id: &TaskId) -> Result<bool> {
        if self.repo.remove(profile, old)? {
            return Ok(true);
        }
        match self.find_by_id(profile, id)? {
            Some(current) => Ok(self.repo.remove(profile, &current.record)?),
            None => Ok(false),
        }
    }

    /// Record a completion at `at` and persist it: recurring tasks are kept,
    /// everything else is removed.
    pub fn complete(&self, profile: &ProfileId, stored: &StoredTask, at: Timestamp) -> Result<Task> {
        let mut task = stored.task.clone();
        match task.complete(at)? {
            Completion::Retained => {
                self.replace(profile, &stored.record, &task)?;
            }
            Completion::Removed => {
                self.remove(profile, &stored.record, task.id())?;
            }
        }
        Ok(task)
    }

    /// Profiles owning at least one task.
    pub fn task_profiles(&self) -> Result<Vec<ProfileId>> {
        Ok(self.repo.task_profiles()?)
    }

    // ------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------

    pub fn load_profile(&self, id: &ProfileId) -> Result<Option<Profile>> {
        match self.repo.get_value(&profile_key(id))? {
            Some(record) => Ok(Some(Profile::from_record(&record)?)),
            None => Ok(None),
        }
    }

    pub fn save_profile(&self, profile: &Profile) -> Result<()> {
        self.repo
            .set_value(&profile_key(profile.uuid()), &profile.to_record()?)?;
        Ok(())
    }

    pub fn profile_for_user(&self, user: UserId) -> Result<Option<Profile>> {
        let Some(raw) = self.repo.get_value(&user_key(user))? else {
            return Ok(None);
        };
        let id = ProfileId::parse(&raw)?;
        self.load_profile(&id)
    }

    pub fn bind_user(&self, user: UserId, profile: &ProfileId) -> Result<()> {
        self.repo.set_value(&user_key(user), profile.as_str())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use tickler_shared::{TaskBase, TaskCategory, TaskTitle};
    use tickler_store::InMemoryRepository;

    use super::*;

    fn now() -> Timestamp {
        Timestamp::new(DateTime::parse_from_rfc3339("2026-10-19T00:00:00Z").unwrap().with_timezone(&Utc))
            .unwrap()
    }

    fn task(profile: &ProfileId, title: &str) -> Task {
        Task::Simple(TaskBase::new(
            profile.clone(),
            TaskTitle::new(title).unwrap(),
            TaskCategory::new("misc").unwrap(),
            UserId::new(100_000_000_000_000_001).unwrap(),
            now(),
        ))
    }

    fn book() -> (TaskBook, Arc<InMemoryRepository>) {
        let repo = Arc::new(InMemoryRepository::new());
        (TaskBook::new(repo.clone()), repo)
    }

    #[test]
    fn skips_corrupt_records() {
        let (book, repo) = book();
        let profile = ProfileId::new();
        book.insert(&profile, &task(&profile, "good")).unwrap();
        repo.append(&profile, "{not json").unwrap();

        let loaded = book.load(&profile).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].task.title().as_str(), "good");
    }

    #[test]
    fn replace_falls_back_to_id() {
        let (book, _) = book();
        let profile = ProfileId::new();
        let original = task(&profile, "a");
        let record = book.insert(&profile, &original).unwrap();

        // Concurrent edit changes the stored text.
        let mut edited = original.clone();
        edited.base_mut().category = TaskCategory::new("edited").unwrap();
        book.replace(&profile, &record, &edited).unwrap();

        // A writer holding the stale record still lands on the same task.
        let mut ours = original.clone();
        ours.base_mut().category = TaskCategory::new("ours").unwrap();
        assert!(book.replace(&profile, &record, &ours).unwrap().is_some());

        let loaded = book.load(&profile).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].task.category().as_str(), "ours");
    }

    #[test]
    fn replace_skips_deleted_task() {
        let (book, _) = book();
        let profile = ProfileId::new();
        let t = task(&profile, "a");
        let record = book.insert(&profile, &t).unwrap();
        assert!(book.remove(&profile, &record, t.id()).unwrap());

        assert!(book.replace(&profile, &record, &t).unwrap().is_none());
        assert!(book.load(&profile).unwrap().is_empty());
    }

    #[test]
    fn profile_binding() {
        let (book, _) = book();
        let user = UserId::new(100_000_000_000_000_001).unwrap();
        assert!(book.profile_for_user(user).unwrap().is_none());

        let profile = Profile::new(user, tickler_shared::UtcOffset::UTC, None, now());
        book.save_profile(&profile).unwrap();
        book.bind_user(user, profile.uuid()).unwrap();

        assert_eq!(book.profile_for_user(user).unwrap(), Some(profile));
    }
}
