//! Profile and task entities.
//!
//! A [`Task`] is a tagged union over a shared [`TaskBase`]: `Simple` tasks
//! carry nothing else, `Scheduled` tasks add a [`Due`] specification,
//! reminder flags and the dispatcher's `next_reminder` cursor.  Every field
//! is one of the validated wrappers from [`crate::value`], so a task that
//! deserializes is a task that is valid.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{InvalidData, TaskError};
use crate::recurrence::Recurrence;
use crate::types::{ChannelId, ProfileId, TaskId, UserId};
use crate::value::{Importance, TaskCategory, TaskDescription, TaskTitle, Timestamp, UtcOffset};

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Timezone-scoped ownership context for a set of tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    uuid: ProfileId,
    utc_offset: UtcOffset,
    created_at: Timestamp,
    created_by: UserId,
    channel_id: Option<ChannelId>,
}

impl Profile {
    pub fn new(
        created_by: UserId,
        utc_offset: UtcOffset,
        channel_id: Option<ChannelId>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            uuid: ProfileId::new(),
            utc_offset,
            created_at,
            created_by,
            channel_id,
        }
    }

    pub fn uuid(&self) -> &ProfileId {
        &self.uuid
    }

    pub fn utc_offset(&self) -> UtcOffset {
        self.utc_offset
    }

    /// The profile's offset as a chrono timezone.
    pub fn offset(&self) -> FixedOffset {
        self.utc_offset.fixed()
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn channel_id(&self) -> Option<ChannelId> {
        self.channel_id
    }

    pub fn set_utc_offset(&mut self, hours: f64) -> Result<(), InvalidData> {
        self.utc_offset = UtcOffset::new(hours)?;
        Ok(())
    }

    pub fn bind_channel(&mut self, channel_id: Option<ChannelId>) {
        self.channel_id = channel_id;
    }

    pub fn to_record(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_record(record: &str) -> serde_json::Result<Self> {
        serde_json::from_str(record)
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Fields shared by every task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskBase {
    pub uuid: TaskId,
    /// Lookup-only back reference; the repository owns the task.
    pub profile_id: ProfileId,
    pub title: TaskTitle,
    pub category: TaskCategory,
    pub importance: Importance,
    pub description: Option<TaskDescription>,
    pub last_done: Option<Timestamp>,
    pub created_at: Timestamp,
    pub created_by: UserId,
    pub channel_id: Option<ChannelId>,
}

impl TaskBase {
    pub fn new(
        profile_id: ProfileId,
        title: TaskTitle,
        category: TaskCategory,
        created_by: UserId,
        created_at: Timestamp,
    ) -> Self {
        Self {
            uuid: TaskId::new(),
            profile_id,
            title,
            category,
            importance: Importance::NORMAL,
            description: None,
            last_done: None,
            created_at,
            created_by,
            channel_id: None,
        }
    }
}

/// When a scheduled task is due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Due {
    /// A single fixed instant.
    At(Timestamp),
    /// A repeating schedule.
    Recurring(Recurrence),
}

/// A task with a due specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    #[serde(flatten)]
    pub base: TaskBase,
    pub due: Due,
    pub has_reminder: bool,
    pub is_auto_done: bool,
    pub next_reminder: Option<Timestamp>,
}

impl ScheduledTask {
    /// Wrap `base` with a schedule.  The reminder cursor starts at the
    /// current due occurrence.
    pub fn new(base: TaskBase, due: Due, has_reminder: bool, is_auto_done: bool) -> Self {
        let mut task = Self {
            base,
            due,
            has_reminder,
            is_auto_done,
            next_reminder: None,
        };
        task.next_reminder = task.due_date();
        task
    }

    pub fn recurrence(&self) -> Option<&Recurrence> {
        match &self.due {
            Due::Recurring(rec) => Some(rec),
            Due::At(_) => None,
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence().is_some()
    }

    /// The occurrence the task is currently due at.
    ///
    /// Fixed tasks return their instant.  Recurring tasks return the first
    /// occurrence at or after the anchor until they are first completed,
    /// then the first occurrence strictly after the last completion.
    /// `None` once a recurrence is exhausted.
    pub fn due_date(&self) -> Option<Timestamp> {
        match &self.due {
            Due::At(at) => Some(*at),
            Due::Recurring(rec) => rec
                .current_due(self.base.last_done.map(|t| t.as_datetime()))
                .and_then(|d| Timestamp::new(d).ok()),
        }
    }

    pub fn is_done(&self) -> bool {
        if self.base.last_done.is_none() {
            return false;
        }
        if !self.is_recurring() {
            return true;
        }
        match self.next_reminder {
            None => true,
            Some(next) => self.due_date() == Some(next),
        }
    }

    /// Whether the occurrence at `occurrence` has already been completed.
    ///
    /// For recurring tasks a completion covers the first occurrence at or
    /// after it, so a completion made exactly when one occurrence fires does
    /// not also cover the next one.
    pub fn is_done_for(&self, occurrence: Timestamp) -> bool {
        let Some(last_done) = self.base.last_done else {
            return false;
        };
        match &self.due {
            Due::At(_) => true,
            Due::Recurring(rec) => {
                rec.at_or_after(last_done.as_datetime()) == Some(occurrence.as_datetime())
            }
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.due_date().is_some_and(|due| due.as_datetime() < now)
    }

    /// Move the reminder cursor past `now`: recurring tasks advance to the
    /// next occurrence, fixed tasks clear it.
    pub fn advance_reminder(&mut self, now: DateTime<Utc>) {
        self.next_reminder = match &self.due {
            Due::Recurring(rec) => rec.after(now).and_then(|d| Timestamp::new(d).ok()),
            Due::At(_) => None,
        };
    }
}

/// Outcome of completing a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Recurring task, kept with its completion recorded.
    Retained,
    /// Everything else, to be removed from the collection.
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Task {
    Simple(TaskBase),
    Scheduled(ScheduledTask),
}

impl Task {
    pub fn base(&self) -> &TaskBase {
        match self {
            Self::Simple(base) => base,
            Self::Scheduled(task) => &task.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut TaskBase {
        match self {
            Self::Simple(base) => base,
            Self::Scheduled(task) => &mut task.base,
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.base().uuid
    }

    pub fn title(&self) -> &TaskTitle {
        &self.base().title
    }

    pub fn category(&self) -> &TaskCategory {
        &self.base().category
    }

    pub fn as_scheduled(&self) -> Option<&ScheduledTask> {
        match self {
            Self::Scheduled(task) => Some(task),
            Self::Simple(_) => None,
        }
    }

    pub fn as_scheduled_mut(&mut self) -> Option<&mut ScheduledTask> {
        match self {
            Self::Scheduled(task) => Some(task),
            Self::Simple(_) => None,
        }
    }

    pub fn recurrence(&self) -> Option<&Recurrence> {
        self.as_scheduled().and_then(ScheduledTask::recurrence)
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence().is_some()
    }

    pub fn due_date(&self) -> Option<Timestamp> {
        self.as_scheduled().and_then(ScheduledTask::due_date)
    }

    pub fn next_reminder(&self) -> Option<Timestamp> {
        self.as_scheduled().and_then(|t| t.next_reminder)
    }

    pub fn has_reminder(&self) -> bool {
        self.as_scheduled().is_some_and(|t| t.has_reminder)
    }

    pub fn is_done(&self) -> bool {
        match self {
            Self::Simple(base) => base.last_done.is_some(),
            Self::Scheduled(task) => task.is_done(),
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.as_scheduled().is_some_and(|t| t.is_overdue(now))
    }

    /// Record a completion at `now`.
    ///
    /// Fails without touching the task when it is already done.
    pub fn complete(&mut self, now: Timestamp) -> Result<Completion, TaskError> {
        if self.is_done() {
            return Err(TaskError::AlreadyDone(self.title().to_string()));
        }
        self.base_mut().last_done = Some(now);
        Ok(if self.is_recurring() {
            Completion::Retained
        } else {
            Completion::Removed
        })
    }

    pub fn to_record(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_record(record: &str) -> serde_json::Result<Self> {
        serde_json::from_str(record)
    }
}
