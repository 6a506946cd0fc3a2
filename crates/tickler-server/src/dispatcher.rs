//! Reminder dispatcher.
//!
//! Once per interval the dispatcher walks every profile's tasks and picks out
//! those whose reminder cursor has come due.  Each one is handed to its own
//! fire unit, which re-reads the task, delivers the reminder, moves the
//! cursor past now, writes the task back and, for auto-done tasks, records
//! the completion.  A unit whose task no longer sits on the scanned
//! occurrence does nothing.
//! Units run concurrently on a [`JoinSet`] so a slow delivery never holds up
//! the next scan.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use tickler_shared::constants::{DEFAULT_DELIVERY_TIMEOUT_SECS, DEFAULT_DISPATCH_INTERVAL_MS};
use tickler_shared::{Clock, Profile, Target, Task, TaskEmbed, TaskError, TaskId, Timestamp};

use crate::book::{StoredTask, TaskBook};
use crate::error::ServiceError;
use crate::notifier::{DeliveryError, Notifier};

/// Text sent alongside every reminder embed.
pub const REMINDER_TEXT: &str = "Please do this task!!";

/// What happened to the reminder of one fired task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent(Target),
    Failed,
    /// Reminders disabled, the occurrence already completed, or the task
    /// changed after the scan picked it.
    Skipped,
}

/// Result of one fire unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FireOutcome {
    pub task_id: TaskId,
    pub occurrence: Timestamp,
    pub delivery: Delivery,
    /// The advanced schedule was written back.
    pub persisted: bool,
    pub auto_done: bool,
}

/// Counters for one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub profiles: usize,
    pub tasks: usize,
    pub fired: usize,
    pub skipped_in_flight: usize,
}

/// A finished scan and the fire units it spawned.
pub struct Scan {
    pub report: ScanReport,
    pub units: JoinSet<FireOutcome>,
}

impl Scan {
    /// Wait for every unit of this scan.  Panicked units are logged and
    /// left out.
    pub async fn join(mut self) -> Vec<FireOutcome> {
        let mut outcomes = Vec::with_capacity(self.report.fired);
        while let Some(joined) = self.units.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!(error = %e, "fire unit panicked"),
            }
        }
        outcomes
    }
}

type InFlightSet = Arc<Mutex<HashSet<TaskId>>>;

/// Marks a task as being fired; released when the unit finishes.
struct InFlight {
    set: InFlightSet,
    id: TaskId,
}

impl InFlight {
    fn claim(set: &InFlightSet, id: &TaskId) -> Option<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone());
        inserted.then(|| Self {
            set: set.clone(),
            id: id.clone(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    book: TaskBook,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    delivery_timeout: Duration,
    in_flight: InFlightSet,
}

impl Dispatcher {
    pub fn new(book: TaskBook, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            book,
            notifier,
            clock,
            interval: Duration::from_millis(DEFAULT_DISPATCH_INTERVAL_MS),
            delivery_timeout: Duration::from_secs(DEFAULT_DELIVERY_TIMEOUT_SECS),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Run the loop on a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Scan, sleep, repeat.  Never returns.
    pub async fn run(&self) {
        info!(interval = ?self.interval, "reminder dispatcher started");
        loop {
            let scan = self.scan_once();
            if scan.report.fired > 0 {
                // The loop does not wait for delivery; a reaper collects the
                // units so panics still get logged.
                tokio::spawn(async move {
                    scan.join().await;
                });
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One pass over every profile.  Due tasks are spawned as fire units on
    /// the returned [`Scan`]; must be called from within a Tokio runtime.
    pub fn scan_once(&self) -> Scan {
        let now = self.clock.now();
        let mut report = ScanReport::default();
        let mut units = JoinSet::new();

        let profiles = match self.book.task_profiles() {
            Ok(profiles) => profiles,
            Err(e) => {
                error!(error = %e, "failed to enumerate task profiles");
                return Scan { report, units };
            }
        };

        for profile_id in profiles {
            let profile = match self.book.load_profile(&profile_id) {
                Ok(Some(profile)) => profile,
                Ok(None) => {
                    debug!(profile_id = %profile_id, "skipping tasks of unregistered profile");
                    continue;
                }
                Err(e) => {
                    warn!(profile_id = %profile_id, error = %e, "failed to load profile");
                    continue;
                }
            };
            let tasks = match self.book.load(&profile_id) {
                Ok(tasks) => tasks,
                Err(e) => {
                    warn!(profile_id = %profile_id, error = %e, "failed to load tasks");
                    continue;
                }
            };
            report.profiles += 1;

            for stored in tasks {
                report.tasks += 1;
                let Some(occurrence) = stored.task.next_reminder() else {
                    continue;
                };
                if occurrence.as_datetime() > now {
                    continue;
                }
                let Some(claim) = InFlight::claim(&self.in_flight, stored.task.id()) else {
                    report.skipped_in_flight += 1;
                    continue;
                };

                report.fired += 1;
                let unit = self.clone();
                let profile = profile.clone();
                let task_id = stored.task.id().clone();
                units.spawn(async move {
                    let outcome = unit.fire(&profile, task_id, occurrence).await;
                    drop(claim);
                    outcome
                });
            }
        }

        debug!(
            profiles = report.profiles,
            tasks = report.tasks,
            fired = report.fired,
            skipped_in_flight = report.skipped_in_flight,
            "scan finished"
        );
        Scan { report, units }
    }

    /// Re-read, deliver, advance, persist, then auto-complete, in that order.
    async fn fire(&self, profile: &Profile, task_id: TaskId, occurrence: Timestamp) -> FireOutcome {
        let mut outcome = FireOutcome {
            task_id,
            occurrence,
            delivery: Delivery::Skipped,
            persisted: false,
            auto_done: false,
        };
        let stored = match self.book.find_by_id(profile.uuid(), &outcome.task_id) {
            Ok(Some(stored)) if stored.task.next_reminder() == Some(occurrence) => stored,
            Ok(Some(_)) => {
                debug!(task_id = %outcome.task_id, %occurrence, "reminder moved since scan, not firing");
                return outcome;
            }
            Ok(None) => {
                debug!(task_id = %outcome.task_id, "task removed since scan");
                return outcome;
            }
            Err(e) => {
                error!(task_id = %outcome.task_id, error = %e, "failed to re-read task before firing");
                return outcome;
            }
        };
        let Some(scheduled) = stored.task.as_scheduled() else {
            return outcome;
        };
        let is_auto_done = scheduled.is_auto_done;

        if scheduled.has_reminder && !scheduled.is_done_for(occurrence) {
            outcome.delivery = self.deliver(profile, &stored.task).await;
        }

        let mut task = stored.task.clone();
        if let Some(scheduled) = task.as_scheduled_mut() {
            scheduled.advance_reminder(self.clock.now());
        }

        let record = match self.book.replace(profile.uuid(), &stored.record, &task) {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(task_id = %outcome.task_id, "task removed while firing");
                return outcome;
            }
            Err(e) => {
                error!(task_id = %outcome.task_id, error = %e, "failed to persist reminder advance");
                return outcome;
            }
        };
        outcome.persisted = true;

        if is_auto_done {
            let current = StoredTask { record, task };
            match self.book.complete(profile.uuid(), &current, occurrence) {
                Ok(_) => outcome.auto_done = true,
                Err(ServiceError::Task(TaskError::AlreadyDone(_))) => {
                    debug!(task_id = %outcome.task_id, "already done, auto-done skipped");
                }
                Err(e) => {
                    warn!(task_id = %outcome.task_id, error = %e, "auto-done failed");
                }
            }
        }

        outcome
    }

    /// Send the reminder to the task's channel, falling back to the
    /// creator's direct messages.
    async fn deliver(&self, profile: &Profile, task: &Task) -> Delivery {
        let embed = TaskEmbed::new(task, profile.utc_offset(), self.clock.now());
        let creator = Target::User(task.base().created_by);
        let targets = match task.base().channel_id {
            Some(channel) => vec![Target::Channel(channel), creator],
            None => vec![creator],
        };

        for target in targets {
            match self.send(target, &embed).await {
                Ok(()) => {
                    debug!(task_id = %task.id(), %target, "reminder delivered");
                    return Delivery::Sent(target);
                }
                Err(e) => {
                    warn!(task_id = %task.id(), %target, error = %e, "reminder delivery failed");
                }
            }
        }
        Delivery::Failed
    }

    async fn send(&self, target: Target, embed: &TaskEmbed) -> Result<(), DeliveryError> {
        tokio::time::timeout(
            self.delivery_timeout,
            self.notifier.send(target, REMINDER_TEXT, embed),
        )
        .await
        .map_err(|_| DeliveryError::TimedOut(self.delivery_timeout))?
    }
}
