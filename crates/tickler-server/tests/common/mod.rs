#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tickler_server::{ConfirmationBroker, DeliveryError, Dispatcher, Notifier, TaskBook, TaskService};
use tickler_shared::{BasicDueParser, ManualClock, ProfileId, Target, TaskEmbed, UserId};
use tickler_store::{Result, TaskRepository};

pub fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

pub fn user(n: u64) -> UserId {
    UserId::new(100_000_000_000_000_000 + n).unwrap()
}

/// Counts task-collection writes made through it.
pub struct CountingRepository<R> {
    inner: R,
    writes: AtomicUsize,
}

impl<R: TaskRepository> CountingRepository<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            writes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.writes.store(0, Ordering::SeqCst);
    }

    fn bump(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl<R: TaskRepository> TaskRepository for CountingRepository<R> {
    fn list_tasks(&self, profile: &ProfileId) -> Result<Vec<String>> {
        self.inner.list_tasks(profile)
    }

    fn append(&self, profile: &ProfileId, record: &str) -> Result<()> {
        self.bump();
        self.inner.append(profile, record)
    }

    fn replace_at(&self, profile: &ProfileId, index: usize, record: &str) -> Result<()> {
        self.bump();
        self.inner.replace_at(profile, index, record)
    }

    fn remove(&self, profile: &ProfileId, record: &str) -> Result<bool> {
        self.bump();
        self.inner.remove(profile, record)
    }

    fn replace_record(&self, profile: &ProfileId, old: &str, new: &str) -> Result<bool> {
        self.bump();
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

/// Accepts every notification and remembers it.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(Target, String)>>,
}

impl RecordingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, target: Target, _text: &str, embed: &TaskEmbed) -> std::result::Result<(), DeliveryError> {
        self.sent.lock().unwrap().push((target, embed.title.clone()));
        Ok(())
    }
}

/// Rejects every notification.
#[derive(Default)]
pub struct FailingNotifier {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _: Target, _: &str, _: &TaskEmbed) -> std::result::Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(DeliveryError::Rejected(500))
    }
}

pub struct Harness<R> {
    pub repo: Arc<CountingRepository<R>>,
    pub clock: Arc<ManualClock>,
    pub service: TaskService,
    pub dispatcher: Dispatcher,
}

impl<R: TaskRepository + 'static> Harness<R> {
    pub fn new(inner: R, notifier: Arc<dyn Notifier>, start: &str) -> Self {
        let repo = Arc::new(CountingRepository::new(inner));
        let clock = Arc::new(ManualClock::new(utc(start)));
        let book = TaskBook::new(repo.clone());
        let service = TaskService::new(
            book.clone(),
            Arc::new(BasicDueParser),
            clock.clone(),
            ConfirmationBroker::new(Duration::from_secs(60)),
        );
        let dispatcher = Dispatcher::new(book, notifier, clock.clone());
        Self {
            repo,
            clock,
            service,
            dispatcher,
        }
    }
}
