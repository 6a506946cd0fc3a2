//! In-process [`TaskRepository`], used by tests and ephemeral runs.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tickler_shared::ProfileId;

use crate::error::{Result, StoreError};
use crate::repository::TaskRepository;

#[derive(Default)]
struct State {
    lists: HashMap<ProfileId, Vec<String>>,
    values: HashMap<String, String>,
}

/// Collections held in memory behind a single lock.
#[derive(Default)]
pub struct InMemoryRepository {
    state: Mutex<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl TaskRepository for InMemoryRepository {
    fn list_tasks(&self, profile: &ProfileId) -> Result<Vec<String>> {
        Ok(self.state()?.lists.get(profile).cloned().unwrap_or_default())
    }

    fn append(&self, profile: &ProfileId, record: &str) -> Result<()> {
        self.state()?
            .lists
            .entry(profile.clone())
            .or_default()
            .insert(0, record.to_string());
        Ok(())
    }

    fn replace_at(&self, profile: &ProfileId, index: usize, record: &str) -> Result<()> {
        let mut state = self.state()?;
        let list = state.lists.entry(profile.clone()).or_default();
        let len = list.len();
        let slot = list
            .get_mut(index)
            .ok_or(StoreError::IndexOutOfRange { index, len })?;
        *slot = record.to_string();
        Ok(())
    }

    fn remove(&self, profile: &ProfileId, record: &str) -> Result<bool> {
        let mut state = self.state()?;
        let Some(list) = state.lists.get_mut(profile) else {
            return Ok(false);
        };
        let Some(index) = list.iter().position(|r| r == record) else {
            return Ok(false);
        };
        list.remove(index);
        if list.is_empty() {
            state.lists.remove(profile);
        }
        Ok(true)
    }

    fn replace_record(&self, profile: &ProfileId, old: &str, new: &str) -> Result<bool> {
        let mut state = self.state()?;
        let slot = state
            .lists
            .get_mut(profile)
            .and_then(|list| list.iter_mut().find(|r| r.as_str() == old));
        match slot {
            Some(slot) => {
                *slot = new.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn task_profiles(&self) -> Result<Vec<ProfileId>> {
        let mut profiles: Vec<ProfileId> = self
            .state()?
            .lists
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        profiles.sort();
        Ok(profiles)
    }

    fn get_value(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state()?.values.get(key).cloned())
    }

    fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.state()?
            .values
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
