//! Task lifecycle operations exposed to the chat front end.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{debug, info};

use tickler_shared::{
    ChannelId, Clock, DueParser, Importance, Profile, ScheduledTask, Task, TaskBase,
    TaskCategory, TaskDescription, TaskEmbed, TaskError, TaskTitle, Timestamp, UserId, UtcOffset,
};

use crate::book::{StoredTask, TaskBook};
use crate::confirm::{Confirmation, ConfirmationBroker, ConfirmationRequest};
use crate::error::{Result, ServiceError};

/// User input for creating or updating a task.  Strings are validated when
/// the draft is applied.
#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub title: String,
    pub category: String,
    pub importance: bool,
    pub due: Option<String>,
    pub description: Option<String>,
    pub has_reminder: bool,
    pub is_auto_done: bool,
    /// Channel the command came from; `None` for direct messages.
    pub channel_id: Option<ChannelId>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            category: category.into(),
            importance: false,
            due: None,
            description: None,
            has_reminder: true,
            is_auto_done: false,
            channel_id: None,
        }
    }

    pub fn important(mut self, importance: bool) -> Self {
        self.importance = importance;
        self
    }

    pub fn due(mut self, due: impl Into<String>) -> Self {
        self.due = Some(due.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn reminder(mut self, has_reminder: bool) -> Self {
        self.has_reminder = has_reminder;
        self
    }

    pub fn auto_done(mut self, is_auto_done: bool) -> Self {
        self.is_auto_done = is_auto_done;
        self
    }

    pub fn in_channel(mut self, channel_id: ChannelId) -> Self {
        self.channel_id = Some(channel_id);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Added,
    Updated,
}

/// Counts over a profile's tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub important: usize,
    pub overdue: usize,
    pub recurring: usize,
    pub one_time: usize,
    pub done: usize,
    /// Tasks per category, in first-seen order.
    pub categories: Vec<(String, usize)>,
}

/// Actions that ask the user before running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatedAction {
    Done,
    Cancel,
}

/// A gated action waiting for its confirmation.
#[derive(Debug)]
pub struct PendingAction {
    pub action: GatedAction,
    pub task: Task,
    pub request: ConfirmationRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed(Task),
    Deleted(Task),
    /// Declined or timed out; nothing was changed.
    Cancelled(Confirmation),
}

pub struct TaskService {
    book: TaskBook,
    parser: Arc<dyn DueParser>,
    clock: Arc<dyn Clock>,
    broker: ConfirmationBroker,
}

impl TaskService {
    pub fn new(
        book: TaskBook,
        parser: Arc<dyn DueParser>,
        clock: Arc<dyn Clock>,
        broker: ConfirmationBroker,
    ) -> Self {
        Self {
            book,
            parser,
            clock,
            broker,
        }
    }

    pub fn book(&self) -> &TaskBook {
        &self.book
    }

    pub fn broker(&self) -> &ConfirmationBroker {
        &self.broker
    }

    fn now(&self) -> Result<Timestamp> {
        Ok(Timestamp::new(self.clock.now())?)
    }

    // ------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------

    /// Create the user's profile, or update the offset and channel of the
    /// existing one.
    pub fn register_profile(
        &self,
        user: UserId,
        utc_offset: f64,
        channel_id: Option<ChannelId>,
    ) -> Result<Profile> {
        let offset = UtcOffset::new(utc_offset)?;

        let profile = match self.book.profile_for_user(user)? {
            Some(mut existing) => {
                existing.set_utc_offset(offset.hours())?;
                existing.bind_channel(channel_id);
                existing
            }
            None => {
                let profile = Profile::new(user, offset, channel_id, self.now()?);
                info!(user = %user, profile_id = %profile.uuid(), "registered profile");
                profile
            }
        };

        self.book.save_profile(&profile)?;
        self.book.bind_user(user, profile.uuid())?;
        Ok(profile)
    }

    pub fn profile_for_user(&self, user: UserId) -> Result<Profile> {
        self.book
            .profile_for_user(user)?
            .ok_or(ServiceError::UnknownUser(user))
    }

    pub fn set_utc_offset(&self, user: UserId, hours: f64) -> Result<Profile> {
        let mut profile = self.profile_for_user(user)?;
        profile.set_utc_offset(hours)?;
        self.book.save_profile(&profile)?;
        Ok(profile)
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    /// Create a task, or replace the profile's task with the same title in
    /// place.  A replaced task keeps its uuid, creation stamp, creator and
    /// last completion.
    pub fn add_or_update(&self, profile: &Profile, user: UserId, draft: TaskDraft) -> Result<(Task, Upsert)> {
        let now = self.now()?;
        let title = TaskTitle::new(&draft.title)?;
        let category = TaskCategory::new(&draft.category)?;
        let description = draft
            .description
            .as_deref()
            .map(TaskDescription::new)
            .transpose()?;
        let due = draft
            .due
            .as_deref()
            .map(|text| self.parser.parse(text, profile.offset(), now.as_datetime()))
            .transpose()?;

        let existing = self.book.find_by_title(profile.uuid(), title.as_str())?;

        let mut base = match &existing {
            Some(stored) => {
                let mut base = stored.task.base().clone();
                base.title = title;
                base.category = category;
                base
            }
            None => TaskBase::new(profile.uuid().clone(), title, category, user, now),
        };
        base.importance = Importance::new(draft.importance);
        base.description = description;
        base.channel_id = draft.channel_id;

        let task = match due {
            Some(due) => Task::Scheduled(ScheduledTask::new(
                base,
                due,
                draft.has_reminder,
                draft.is_auto_done,
            )),
            None => Task::Simple(base),
        };

        let upsert = match existing {
            Some(stored) => {
                if self.book.replace(profile.uuid(), &stored.record, &task)?.is_none() {
                    self.book.insert(profile.uuid(), &task)?;
                }
                Upsert::Updated
            }
            None => {
                self.book.insert(profile.uuid(), &task)?;
                Upsert::Added
            }
        };

        debug!(profile_id = %profile.uuid(), task_id = %task.id(), ?upsert, "saved task");
        Ok((task, upsert))
    }

    pub fn get_by_title(&self, profile: &Profile, title: &str) -> Result<Task> {
        Ok(self.stored_by_title(profile, title)?.task)
    }

    fn stored_by_title(&self, profile: &Profile, title: &str) -> Result<StoredTask> {
        self.book
            .find_by_title(profile.uuid(), title)?
            .ok_or_else(|| TaskError::NotFound(title.trim().to_string()).into())
    }

    /// The profile's tasks, newest first, optionally restricted to one
    /// category and to tasks that are not done.
    pub fn list_for_profile(
        &self,
        profile: &Profile,
        category: Option<&str>,
        ignore_done: bool,
    ) -> Result<Vec<Task>> {
        let category = category.map(str::trim);
        Ok(self
            .book
            .load(profile.uuid())?
            .into_iter()
            .map(|s| s.task)
            .filter(|t| category.map_or(true, |c| t.category().as_str() == c))
            .filter(|t| !(ignore_done && t.is_done()))
            .collect())
    }

    /// Pending tasks in the order they should be worked on: oldest last
    /// completion first (never completed last), then earliest due date
    /// (undated last), then important before normal.
    pub fn priority(&self, profile: &Profile, category: Option<&str>) -> Result<Vec<Task>> {
        let mut tasks = self.list_for_profile(profile, category, true)?;
        tasks.sort_by(|a, b| {
            nones_last(a.base().last_done, b.base().last_done)
                .then_with(|| nones_last(a.due_date(), b.due_date()))
                .then_with(|| {
                    b.base()
                        .importance
                        .is_important()
                        .cmp(&a.base().importance.is_important())
                })
        });
        Ok(tasks)
    }

    pub fn summary(&self, profile: &Profile) -> Result<Summary> {
        let now = self.clock.now();
        let mut summary = Summary::default();

        for task in self.list_for_profile(profile, None, false)? {
            summary.total += 1;
            if task.base().importance.is_important() {
                summary.important += 1;
            }
            if task.is_overdue(now) {
                summary.overdue += 1;
            }
            if task.is_recurring() {
                summary.recurring += 1;
            } else {
                summary.one_time += 1;
            }
            if task.is_done() {
                summary.done += 1;
            }

            let name = task.category().as_str();
            match summary.categories.iter_mut().find(|(c, _)| c == name) {
                Some((_, count)) => *count += 1,
                None => summary.categories.push((name.to_string(), 1)),
            }
        }
        Ok(summary)
    }

    /// Complete `task`.  Fails with `AlreadyDone` without writing anything
    /// if it is already done, including a one-time task whose completion
    /// already removed it.
    pub fn mark_done(&self, profile: &Profile, task: &Task) -> Result<Task> {
        if task.is_done() {
            return Err(TaskError::AlreadyDone(task.title().to_string()).into());
        }
        let stored = match self.book.find_by_id(profile.uuid(), task.id())? {
            Some(stored) => stored,
            None if !task.is_recurring() => {
                return Err(TaskError::AlreadyDone(task.title().to_string()).into())
            }
            None => return Err(TaskError::NotFound(task.title().to_string()).into()),
        };
        let done = self.book.complete(profile.uuid(), &stored, self.now()?)?;
        info!(profile_id = %profile.uuid(), task_id = %done.id(), "task done");
        Ok(done)
    }

    /// Remove `task` unconditionally.  Returns `false` if it was already
    /// gone.
    pub fn delete(&self, profile: &Profile, task: &Task) -> Result<bool> {
        let record = task.to_record()?;
        let removed = self.book.remove(profile.uuid(), &record, task.id())?;
        if removed {
            info!(profile_id = %profile.uuid(), task_id = %task.id(), "task deleted");
        }
        Ok(removed)
    }

    pub fn embed(&self, profile: &Profile, task: &Task) -> TaskEmbed {
        TaskEmbed::new(task, profile.utc_offset(), self.clock.now())
    }

    // ------------------------------------------------------------------
    // Categories
    // ------------------------------------------------------------------

    /// Move every task in category `from` to `to`.  Returns the number of
    /// tasks changed.
    pub fn rename_category(&self, profile: &Profile, from: &str, to: &str) -> Result<usize> {
        let from = from.trim();
        TaskCategory::new(to)?;

        let mut renamed = 0;
        for stored in self.book.load(profile.uuid())? {
            if stored.task.category().as_str() != from {
                continue;
            }
            let mut task = stored.task.clone();
            task.base_mut().category.set(to)?;
            if self.book.replace(profile.uuid(), &stored.record, &task)?.is_some() {
                renamed += 1;
            }
        }

        if renamed == 0 {
            return Err(TaskError::CategoryNotFound(from.to_string()).into());
        }
        Ok(renamed)
    }

    /// Delete every task in `category`.  Returns the number removed.
    pub fn delete_category(&self, profile: &Profile, category: &str) -> Result<usize> {
        let category = category.trim();
        let mut removed = 0;
        for stored in self.book.load(profile.uuid())? {
            if stored.task.category().as_str() == category
                && self.book.remove(profile.uuid(), &stored.record, stored.task.id())?
            {
                removed += 1;
            }
        }

        if removed == 0 {
            return Err(TaskError::CategoryNotFound(category.to_string()).into());
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Confirmation-gated actions
    // ------------------------------------------------------------------

    /// Look up the task named `title` and open a confirmation request for
    /// `action` on it.
    pub fn request_action(&self, profile: &Profile, title: &str, action: GatedAction) -> Result<PendingAction> {
        let task = self.get_by_title(profile, title)?;
        let request = self.broker.request();
        debug!(request_id = %request.id(), ?action, task_id = %task.id(), "awaiting confirmation");
        Ok(PendingAction {
            action,
            task,
            request,
        })
    }

    /// Wait for the confirmation and run the action if it was given.
    pub async fn resolve_action(&self, profile: &Profile, pending: PendingAction) -> Result<ActionOutcome> {
        let PendingAction {
            action,
            task,
            request,
        } = pending;

        match request.wait().await {
            Confirmation::Confirmed => match action {
                GatedAction::Done => Ok(ActionOutcome::Completed(self.mark_done(profile, &task)?)),
                GatedAction::Cancel => {
                    self.delete(profile, &task)?;
                    Ok(ActionOutcome::Deleted(task))
                }
            },
            other => Ok(ActionOutcome::Cancelled(other)),
        }
    }
}

fn nones_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{DateTime, Utc};
    use tickler_shared::{BasicDueParser, ManualClock};
    use tickler_store::{InMemoryRepository, TaskRepository};

    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn user() -> UserId {
        UserId::new(100_000_000_000_000_001).unwrap()
    }

    fn service() -> (TaskService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(utc("2026-10-19T10:00:00Z")));
        let service = TaskService::new(
            TaskBook::new(Arc::new(InMemoryRepository::new())),
            Arc::new(BasicDueParser),
            clock.clone(),
            ConfirmationBroker::new(Duration::from_secs(60)),
        );
        (service, clock)
    }

    #[test]
    fn update_preserves_identity() {
        let (service, clock) = service();
        let profile = service.register_profile(user(), 0.0, None).unwrap();

        let (first, upsert) = service
            .add_or_update(&profile, user(), TaskDraft::new("gym", "health").due("every day at 7am"))
            .unwrap();
        assert_eq!(upsert, Upsert::Added);
        let first = service.mark_done(&profile, &first).unwrap();

        clock.advance(chrono::Duration::hours(1));
        let (second, upsert) = service
            .add_or_update(
                &profile,
                user(),
                TaskDraft::new("  gym ", "sport").important(true).due("every day at 8am"),
            )
            .unwrap();
        assert_eq!(upsert, Upsert::Updated);
        assert_eq!(second.id(), first.id());
        assert_eq!(second.base().created_at, first.base().created_at);
        assert_eq!(second.base().last_done, first.base().last_done);
        assert_eq!(second.category().as_str(), "sport");
        assert_eq!(service.list_for_profile(&profile, None, false).unwrap().len(), 1);
    }

    #[test]
    fn invalid_input_is_rejected_before_saving() {
        let (service, _) = service();
        let profile = service.register_profile(user(), 0.0, None).unwrap();

        let err = service
            .add_or_update(&profile, user(), TaskDraft::new("", "x"))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Task(TaskError::Validation(_))));

        let err = service
            .add_or_update(&profile, user(), TaskDraft::new("t", "x").due("whenever"))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Task(TaskError::Parse(_))));

        assert!(service.list_for_profile(&profile, None, false).unwrap().is_empty());
    }

    #[test]
    fn mark_done_removes_one_time_tasks() {
        let (service, _) = service();
        let profile = service.register_profile(user(), 0.0, None).unwrap();
        let (task, _) = service
            .add_or_update(&profile, user(), TaskDraft::new("read", "books"))
            .unwrap();

        let done = service.mark_done(&profile, &task).unwrap();
        assert!(done.is_done());
        assert!(service.book().load(profile.uuid()).unwrap().is_empty());

        // Completing it again, from the stale handle or the returned one.
        for handle in [&task, &done] {
            let err = service.mark_done(&profile, handle).unwrap_err();
            assert!(matches!(err, ServiceError::Task(TaskError::AlreadyDone(_))));
        }
    }

    #[test]
    fn completing_a_done_recurring_task_fails_without_writing() {
        let (service, clock) = service();
        let profile = service.register_profile(user(), 0.0, None).unwrap();
        let (task, _) = service
            .add_or_update(&profile, user(), TaskDraft::new("walk", "health").due("daily"))
            .unwrap();

        // The reminder for today's occurrence has gone out.
        let stored = service.book().find_by_id(profile.uuid(), task.id()).unwrap().unwrap();
        let mut fired = stored.task.clone();
        fired.as_scheduled_mut().unwrap().advance_reminder(clock.now());
        service.book().replace(profile.uuid(), &stored.record, &fired).unwrap();

        clock.advance(chrono::Duration::minutes(5));
        let done = service.mark_done(&profile, &fired).unwrap();
        assert!(done.is_done());

        let before = service.book().repo().list_tasks(profile.uuid()).unwrap();
        let err = service.mark_done(&profile, &done).unwrap_err();
        assert!(matches!(err, ServiceError::Task(TaskError::AlreadyDone(_))));
        assert_eq!(service.book().repo().list_tasks(profile.uuid()).unwrap(), before);
    }

    #[test]
    fn listing_filters_and_priority() {
        let (service, _) = service();
        let profile = service.register_profile(user(), 0.0, None).unwrap();
        for draft in [
            TaskDraft::new("undated", "a"),
            TaskDraft::new("later", "a").due("in 3 days"),
            TaskDraft::new("soon", "b").due("in 1 hour"),
            TaskDraft::new("soon important", "b").due("in 1 hour").important(true),
        ] {
            service.add_or_update(&profile, user(), draft).unwrap();
        }

        let only_a = service.list_for_profile(&profile, Some("a"), false).unwrap();
        assert_eq!(only_a.len(), 2);
        assert_eq!(only_a[0].title().as_str(), "later");

        let ordered: Vec<String> = service
            .priority(&profile, None)
            .unwrap()
            .iter()
            .map(|t| t.title().to_string())
            .collect();
        assert_eq!(ordered, vec!["soon important", "soon", "later", "undated"]);
    }

    #[test]
    fn summary_counts() {
        let (service, clock) = service();
        let profile = service.register_profile(user(), 0.0, None).unwrap();
        service
            .add_or_update(&profile, user(), TaskDraft::new("a", "home").important(true))
            .unwrap();
        service
            .add_or_update(&profile, user(), TaskDraft::new("b", "home").due("in 1 hour"))
            .unwrap();
        let (c, _) = service
            .add_or_update(&profile, user(), TaskDraft::new("c", "work").due("daily"))
            .unwrap();
        service.mark_done(&profile, &c).unwrap();
        clock.advance(chrono::Duration::hours(2));

        let summary = service.summary(&profile).unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.important, 1);
        assert_eq!(summary.overdue, 1);
        assert_eq!(summary.recurring, 1);
        assert_eq!(summary.one_time, 2);
        assert_eq!(
            summary.categories,
            vec![("work".to_string(), 1), ("home".to_string(), 2)]
        );
    }

    #[test]
    fn category_management() {
        let (service, _) = service();
        let profile = service.register_profile(user(), 0.0, None).unwrap();
        for (title, category) in [("a", "old"), ("b", "old"), ("c", "keep")] {
            service
                .add_or_update(&profile, user(), TaskDraft::new(title, category))
                .unwrap();
        }

        assert_eq!(service.rename_category(&profile, "old", "new").unwrap(), 2);
        assert!(matches!(
            service.rename_category(&profile, "old", "x"),
            Err(ServiceError::Task(TaskError::CategoryNotFound(_)))
        ));
        assert!(service.rename_category(&profile, "keep", &"x".repeat(51)).is_err());

        assert_eq!(service.delete_category(&profile, "new").unwrap(), 2);
        assert!(matches!(
            service.delete_category(&profile, "new"),
            Err(ServiceError::Task(TaskError::CategoryNotFound(_)))
        ));
        assert_eq!(service.list_for_profile(&profile, None, false).unwrap().len(), 1);
    }

    #[test]
    fn profile_registration() {
        let (service, _) = service();
        assert!(matches!(
            service.profile_for_user(user()),
            Err(ServiceError::UnknownUser(_))
        ));
        assert!(service.register_profile(user(), 24.0, None).is_err());

        let profile = service.register_profile(user(), 8.0, None).unwrap();
        let again = service.register_profile(user(), 5.5, None).unwrap();
        assert_eq!(again.uuid(), profile.uuid());
        assert_eq!(again.utc_offset().hours(), 5.5);

        let updated = service.set_utc_offset(user(), -3.0).unwrap();
        assert_eq!(service.profile_for_user(user()).unwrap(), updated);
        assert!(service.set_utc_offset(user(), f64::NAN).is_err());
    }

    #[tokio::test]
    async fn gated_actions() {
        let (service, _) = service();
        let profile = service.register_profile(user(), 0.0, None).unwrap();
        service
            .add_or_update(&profile, user(), TaskDraft::new("trash", "home"))
            .unwrap();

        let pending = service
            .request_action(&profile, "trash", GatedAction::Cancel)
            .unwrap();
        service.broker().respond(pending.request.id(), false);
        assert_eq!(
            service.resolve_action(&profile, pending).await.unwrap(),
            ActionOutcome::Cancelled(Confirmation::Declined)
        );

        let pending = service
            .request_action(&profile, "trash", GatedAction::Done)
            .unwrap();
        service.broker().respond(pending.request.id(), true);
        assert!(matches!(
            service.resolve_action(&profile, pending).await.unwrap(),
            ActionOutcome::Completed(_)
        ));
        assert!(matches!(
            service.request_action(&profile, "trash", GatedAction::Done),
            Err(ServiceError::Task(TaskError::NotFound(_)))
        ));
    }
}
